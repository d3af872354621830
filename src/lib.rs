//! # netspeed
//!
//! 브로드캐스트 탐색 기반 TCP/UDP 처리량 측정 도구
//!
//! ## 핵심 특징
//! - **브로드캐스트 탐색**: 서버가 1초마다 Offer 광고, 클라이언트는 첫 Offer만 수신
//! - **UDP 세그먼트 전송**: 번호 붙은 1024 bytes 세그먼트, 재전송 없음, 손실은 측정값
//! - **TCP 스트림 전송**: 요청 크기만큼 스트리밍, EOF가 완료 신호
//! - **병렬 측정**: 클라이언트는 N개 TCP + M개 UDP 워커를 동시에 실행
//! - **요청당 태스크**: 서버는 요청마다 독립 태스크 생성 (공유 상태 없음)

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod stats;
pub mod tcp;

pub use client::{RoundPlan, SpeedTestClient};
pub use config::Config;
pub use discovery::{Beacon, ServerOffer};
pub use error::{Error, Result};
pub use message::{Message, MessageType, OfferMessage, PayloadSegment, RequestMessage};
pub use server::SpeedTestServer;
pub use stats::{Protocol, ServerStats, TransferResult};

/// 매직 쿠키 (패킷 식별용)
pub const MAGIC_COOKIE: u32 = 0xABCD_DCBA;

/// 세그먼트당 최대 페이로드 (바이트)
pub const SEGMENT_PAYLOAD_BYTES: usize = 1024;

/// 기본 탐색(브로드캐스트) 포트
pub const DEFAULT_DISCOVERY_PORT: u16 = 13117;

/// 기본 서버 UDP 전송 포트
pub const DEFAULT_UDP_PORT: u16 = 60000;

/// 기본 서버 TCP 포트
pub const DEFAULT_TCP_PORT: u16 = 12345;

/// 필러 바이트 (전송 내용은 의미 없음)
pub const FILLER_BYTE: u8 = b'a';

/// 요청 크기에 필요한 세그먼트 수 (올림)
pub fn segment_count(file_size: u64) -> u64 {
    file_size.div_ceil(SEGMENT_PAYLOAD_BYTES as u64)
}
