//! 클라이언트 오케스트레이터
//!
//! 탐색 1회 → TCP/UDP 워커 병렬 실행 → 결과 보고 → 다시 탐색

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::discovery::{bind_discovery_socket, wait_for_offer, ServerOffer};
use crate::receiver::udp_transfer;
use crate::stats::{Protocol, TransferResult};
use crate::tcp::tcp_transfer;
use crate::{Config, Result};

/// 한 라운드의 측정 계획
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    /// 요청 바이트 수
    pub file_size: u64,

    /// TCP 워커 수
    pub tcp_count: usize,

    /// UDP 워커 수
    pub udp_count: usize,
}

impl RoundPlan {
    pub fn new(file_size: u64, tcp_count: usize, udp_count: usize) -> Self {
        Self {
            file_size,
            tcp_count,
            udp_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.tcp_count + self.udp_count
    }
}

/// 속도 측정 클라이언트
pub struct SpeedTestClient {
    config: Config,
}

impl SpeedTestClient {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 첫 번째 유효 Offer 대기 (매번 탐색 소켓을 새로 바인딩)
    pub async fn discover(&self) -> Result<ServerOffer> {
        let socket = bind_discovery_socket(self.config.discovery_bind_addr())?;
        info!(
            "Client started, listening for offer requests on port {}...",
            self.config.discovery_port
        );
        wait_for_offer(&socket, self.config.recv_buffer_size).await
    }

    /// 워커 전체를 동시에 실행하고 모두 끝날 때까지 대기
    ///
    /// 실패한 워커는 로그만 남기고 결과에서 빠짐
    pub async fn run_round(&self, server: &ServerOffer, plan: RoundPlan) -> Vec<TransferResult> {
        let mut workers = JoinSet::new();

        for index in 1..=plan.tcp_count {
            let config = self.config.clone();
            let addr = server.tcp_addr();
            workers.spawn(async move {
                (
                    Protocol::Tcp,
                    index,
                    tcp_transfer(addr, plan.file_size, index, &config).await,
                )
            });
        }

        for index in 1..=plan.udp_count {
            let config = self.config.clone();
            let addr = server.udp_addr();
            workers.spawn(async move {
                (
                    Protocol::Udp,
                    index,
                    udp_transfer(addr, plan.file_size, index, &config).await,
                )
            });
        }

        let mut results = Vec::with_capacity(plan.worker_count());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, _, Ok(result))) => results.push(result),
                Ok((protocol, index, Err(e))) => {
                    warn!("{} transfer #{} failed: {}", protocol, index, e);
                }
                Err(e) => warn!("워커 태스크 실패: {}", e),
            }
        }

        results.sort_by_key(|r| (r.protocol == Protocol::Udp, r.index));
        results
    }

    /// 탐색 + 측정 라운드 반복
    ///
    /// rounds가 None이면 무한 반복
    pub async fn run(&self, plan: RoundPlan, rounds: Option<usize>) -> Result<()> {
        let mut completed = 0usize;

        while rounds.map_or(true, |limit| completed < limit) {
            let server = self.discover().await?;
            info!(
                "Server {}: udp port {}, tcp port {}",
                server.server_ip, server.udp_port, server.tcp_port
            );

            for result in self.run_round(&server, plan).await {
                info!("{}", result.summary());
            }

            info!("All transfers complete, listening to offer requests...");
            completed += 1;
        }

        Ok(())
    }
}
