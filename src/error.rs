//! 에러 타입 정의

use std::net::SocketAddr;

use thiserror::Error;

use crate::message::MessageType;

/// netspeed 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘린 메시지: {kind:?} 최소 {needed} bytes 필요, {got} bytes 수신")]
    MalformedMessage {
        kind: Option<MessageType>,
        needed: usize,
        got: usize,
    },

    #[error("페이로드 크기 초과: {len} bytes (최대 {max})")]
    OversizedPayload { len: usize, max: usize },

    #[error("알 수 없는 메시지: magic={magic:08X}, type={msg_type:#04x}")]
    UnrecognizedMessage { magic: u32, msg_type: u8 },

    #[error("유효하지 않은 크기 요청: {0:?}")]
    InvalidSizeRequest(String),

    #[error("소켓 바인드 실패: {addr}: {source}")]
    SocketBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("소켓 설정 실패: {0}")]
    SocketSetup(String),

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    /// 프로세스를 계속할 수 없는 에러 (시작 시 소켓 확보 실패)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::SocketBind { .. } | Error::SocketSetup(_))
    }

    /// 수신측이 조용히 버리고 다음 데이터그램을 기다려야 하는 에러
    pub fn is_discardable(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage { .. }
                | Error::OversizedPayload { .. }
                | Error::UnrecognizedMessage { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
