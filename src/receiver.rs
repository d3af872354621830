//! UDP 수신자 (클라이언트측)
//!
//! - 워커마다 전용 소켓
//! - 유휴 타임아웃(기본 1초) 동안 아무것도 안 오면 전송 종료
//! - 도착 순서가 아니라 segment_index로 집계
//!
//! 유휴 타임아웃 종료는 느린 네트워크에서 진행 중인 전송을 일찍 끊을 수 있음.
//! 재전송 없이 측정만 하는 도구이므로 그대로 둠.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::message::{PayloadSegment, RequestMessage, PAYLOAD_HEADER_LEN};
use crate::stats::{TransferResult, UdpTally};
use crate::{Config, Error, Result, SEGMENT_PAYLOAD_BYTES};

/// UDP 수신 워커
pub struct UdpReceiver {
    socket: UdpSocket,
    server_addr: SocketAddr,
    idle_timeout: Duration,
    buf: Vec<u8>,
}

impl UdpReceiver {
    /// 서버 주소 계열에 맞는 임시 포트로 바인딩
    pub async fn bind(server_addr: SocketAddr, config: &Config) -> Result<Self> {
        let bind_ip = match server_addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let bind_addr = SocketAddr::new(bind_ip, 0);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| Error::SocketBind { addr: bind_addr, source })?;

        Ok(Self {
            socket,
            server_addr,
            idle_timeout: config.udp_idle_timeout(),
            buf: vec![0u8; config.recv_buffer_size.max(PAYLOAD_HEADER_LEN + SEGMENT_PAYLOAD_BYTES)],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 요청 전송 후 유휴 타임아웃까지 수신
    pub async fn transfer(mut self, file_size: u64, index: usize) -> Result<TransferResult> {
        let request = RequestMessage::new(file_size);
        self.socket.send_to(&request.to_bytes(), self.server_addr).await?;
        debug!("UDP #{} 요청 전송: {} bytes → {}", index, file_size, self.server_addr);

        self.collect(index).await
    }

    /// 유휴 타임아웃까지 세그먼트 수집
    pub async fn collect(&mut self, index: usize) -> Result<TransferResult> {
        let start = Instant::now();
        let mut tally = UdpTally::new(start);

        loop {
            let received =
                tokio::time::timeout(self.idle_timeout, self.socket.recv_from(&mut self.buf)).await;

            let (len, addr) = match received {
                Ok(result) => result?,
                Err(_) => break,
            };

            match PayloadSegment::from_bytes(&self.buf[..len]) {
                Ok(segment) => {
                    if !tally.record(&segment) {
                        trace!(
                            "UDP #{} 범위 밖 세그먼트 {} (total {})",
                            index,
                            segment.segment_index,
                            segment.total_segments
                        );
                    }
                }
                Err(e) => {
                    debug!("UDP #{} 데이터그램 무시 ({}): {}", index, addr, e);
                }
            }
        }

        let result = tally.finish(index, Instant::now());
        debug!(
            "UDP #{} 종료: {}/{} 세그먼트, {} bytes",
            index,
            result.distinct_segments,
            result.total_segments.unwrap_or(0),
            result.total_bytes
        );
        Ok(result)
    }
}

/// UDP 워커 하나 실행
pub async fn udp_transfer(
    server_addr: SocketAddr,
    file_size: u64,
    index: usize,
    config: &Config,
) -> Result<TransferResult> {
    UdpReceiver::bind(server_addr, config)
        .await?
        .transfer(file_size, index)
        .await
}
