//! 서버 오케스트레이터
//!
//! Beacon, UDP 요청 리스너, TCP accept 루프를 동시에 실행.
//! 소켓 확보 실패만 치명적, 나머지 에러는 각 태스크 안에서 끝남.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::info;

use crate::discovery::Beacon;
use crate::message::OfferMessage;
use crate::sender::UdpRequestListener;
use crate::stats::{ServerStats, SharedServerStats};
use crate::tcp::TcpRequestListener;
use crate::{Config, Error, Result};

/// 속도 측정 서버
pub struct SpeedTestServer {
    config: Config,
    beacon: Beacon,
    udp_socket: Arc<UdpSocket>,
    tcp_listener: TcpListener,
    stats: SharedServerStats,
}

impl SpeedTestServer {
    /// 모든 소켓 바인딩
    ///
    /// 포트 0은 OS가 고른 실제 포트를 Offer에 담음
    pub async fn bind(config: Config) -> Result<Self> {
        let tcp_addr = config.tcp_bind_addr();
        let tcp_listener = TcpListener::bind(tcp_addr)
            .await
            .map_err(|source| Error::SocketBind { addr: tcp_addr, source })?;

        let udp_addr = config.udp_bind_addr();
        let udp_socket = UdpSocket::bind(udp_addr)
            .await
            .map_err(|source| Error::SocketBind { addr: udp_addr, source })?;

        let offer = OfferMessage::new(
            udp_socket.local_addr()?.port(),
            tcp_listener.local_addr()?.port(),
        );
        let beacon = Beacon::bind(&config, offer).await?;

        Ok(Self {
            config,
            beacon,
            udp_socket: Arc::new(udp_socket),
            tcp_listener,
            stats: SharedServerStats::default(),
        })
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp_socket.local_addr()?)
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        Ok(self.tcp_listener.local_addr()?)
    }

    /// 광고할 Offer
    pub fn offer(&self) -> OfferMessage {
        self.beacon.offer()
    }

    /// 공유 통계 핸들
    pub fn stats_handle(&self) -> SharedServerStats {
        self.stats.clone()
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ServerStats {
        self.stats.lock().clone()
    }

    /// 세 활동을 동시에 실행 (어느 하나가 실패할 때까지)
    pub async fn run(self) -> Result<()> {
        info!(
            "Server running: udp={}, tcp={}",
            self.udp_addr()?,
            self.tcp_addr()?
        );

        let udp = UdpRequestListener::new(self.udp_socket, self.config.clone(), self.stats.clone());
        let tcp = TcpRequestListener::new(self.tcp_listener, self.config, self.stats);

        tokio::try_join!(self.beacon.run(), udp.run(), tcp.run())?;
        Ok(())
    }
}
