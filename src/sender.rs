//! UDP 송신자 (서버측)
//!
//! - 요청 하나당 독립 태스크 (세그먼트 번호는 세션 내부 상태)
//! - 재전송/흐름 제어/ACK 없음, 손실은 클라이언트가 측정
//! - 모든 세션이 리스너 소켓 하나를 공유 (send_to는 &self)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::{PayloadSegment, RequestMessage, PAYLOAD_HEADER_LEN};
use crate::stats::SharedServerStats;
use crate::{segment_count, Config, Result, FILLER_BYTE, SEGMENT_PAYLOAD_BYTES};

/// 세그먼트 데이터로 쓰는 필러
static FILLER: [u8; SEGMENT_PAYLOAD_BYTES] = [FILLER_BYTE; SEGMENT_PAYLOAD_BYTES];

/// 세션 전송 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub segments_sent: u64,
    pub bytes_sent: u64,
}

/// UDP 전송 세션 (요청 하나)
#[derive(Debug, Clone)]
pub struct TransferSession {
    /// 요청자 주소
    peer: SocketAddr,

    /// 요청 바이트 수
    file_size: u64,

    /// 총 세그먼트 수
    total_segments: u64,
}

impl TransferSession {
    pub fn new(peer: SocketAddr, file_size: u64) -> Self {
        Self {
            peer,
            file_size,
            total_segments: segment_count(file_size),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn total_segments(&self) -> u64 {
        self.total_segments
    }

    /// 세그먼트 데이터 길이 (마지막 세그먼트만 나머지)
    pub fn segment_len(&self, index: u64) -> usize {
        let offset = index.saturating_mul(SEGMENT_PAYLOAD_BYTES as u64);
        self.file_size
            .saturating_sub(offset)
            .min(SEGMENT_PAYLOAD_BYTES as u64) as usize
    }

    /// (번호, 길이) 순서대로
    pub fn segments(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        (0..self.total_segments).map(move |index| (index, self.segment_len(index)))
    }

    /// 모든 세그먼트를 번호 순서대로 전송
    pub async fn run(self, socket: &UdpSocket, interval: Option<Duration>) -> Result<SessionReport> {
        let start = Instant::now();
        let mut buf = BytesMut::with_capacity(PAYLOAD_HEADER_LEN + SEGMENT_PAYLOAD_BYTES);
        let mut report = SessionReport {
            segments_sent: 0,
            bytes_sent: 0,
        };

        for (index, len) in self.segments() {
            buf.clear();
            PayloadSegment::encode_into(self.total_segments, index, &FILLER[..len], &mut buf);
            socket.send_to(&buf, self.peer).await?;

            report.segments_sent += 1;
            report.bytes_sent += len as u64;

            if let Some(interval) = interval {
                tokio::time::sleep(interval).await;
            }
        }

        debug!(
            "UDP 세션 완료 {}: {} 세그먼트, {} bytes, {:.2}ms",
            self.peer,
            report.segments_sent,
            report.bytes_sent,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(report)
    }
}

/// UDP 요청 리스너
pub struct UdpRequestListener {
    socket: Arc<UdpSocket>,
    config: Config,
    stats: SharedServerStats,
}

impl UdpRequestListener {
    pub fn new(socket: Arc<UdpSocket>, config: Config, stats: SharedServerStats) -> Self {
        Self {
            socket,
            config,
            stats,
        }
    }

    /// 수신 루프 (종료하지 않음)
    ///
    /// 유효한 Request마다 세션 태스크 하나 생성, 나머지는 버림
    pub async fn run(self) -> Result<()> {
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let interval = self.config.segment_interval();

        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    // 예: 이전 전송 대상의 ICMP unreachable
                    warn!("UDP 수신 에러: {}", e);
                    continue;
                }
            };

            let request = match RequestMessage::from_bytes(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    debug!("UDP 요청 무시 ({}): {}", addr, e);
                    self.stats.lock().rejected_requests += 1;
                    continue;
                }
            };

            info!("UDP request from {}: {} bytes", addr, request.file_size);
            self.stats.lock().udp_sessions += 1;

            let session = TransferSession::new(addr, request.file_size);
            let socket = self.socket.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                match session.run(&socket, interval).await {
                    Ok(report) => {
                        let mut stats = stats.lock();
                        stats.segments_sent += report.segments_sent;
                        stats.bytes_sent += report.bytes_sent;
                    }
                    Err(e) => {
                        warn!("UDP 세션 실패 ({}): {}", addr, e);
                        stats.lock().failed_sessions += 1;
                    }
                }
            });
        }
    }
}
