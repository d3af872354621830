//! 프로토콜 메시지 정의
//!
//! 모든 메시지는 고정 레이아웃, 네트워크 바이트 순서(big-endian)
//!
//! ```text
//! Offer   : u32 magic | u8 type(0x2) | u16 udp_port | u16 tcp_port
//! Request : u32 magic | u8 type(0x3) | u64 file_size
//! Payload : u32 magic | u8 type(0x4) | u64 total_segments | u64 segment_index | data(<= 1024)
//! ```
//!
//! UDP 데이터그램 하나가 메시지 하나이므로 스트리밍 디코드는 없음

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result, MAGIC_COOKIE, SEGMENT_PAYLOAD_BYTES};

/// 공통 헤더 길이 (magic + type)
pub const HEADER_LEN: usize = 5;

/// Offer 메시지 길이
pub const OFFER_LEN: usize = HEADER_LEN + 2 + 2;

/// Request 메시지 길이
pub const REQUEST_LEN: usize = HEADER_LEN + 8;

/// Payload 세그먼트 헤더 길이 (데이터 제외)
pub const PAYLOAD_HEADER_LEN: usize = HEADER_LEN + 8 + 8;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// 서버 광고 (브로드캐스트)
    Offer = 0x2,

    /// 전송 요청 (클라이언트 → 서버)
    Request = 0x3,

    /// 데이터 세그먼트 (서버 → 클라이언트)
    Payload = 0x4,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x2 => Some(Self::Offer),
            0x3 => Some(Self::Request),
            0x4 => Some(Self::Payload),
            _ => None,
        }
    }

    /// 이 타입의 최소 메시지 길이
    pub fn min_len(self) -> usize {
        match self {
            Self::Offer => OFFER_LEN,
            Self::Request => REQUEST_LEN,
            Self::Payload => PAYLOAD_HEADER_LEN,
        }
    }
}

/// 공통 헤더 기록
fn put_header(buf: &mut BytesMut, msg_type: MessageType) {
    buf.put_u32(MAGIC_COOKIE);
    buf.put_u8(msg_type as u8);
}

/// 공통 헤더를 읽어 (magic, type) 반환
fn read_header(buf: &[u8], kind: Option<MessageType>) -> Result<(u32, u8)> {
    if buf.len() < HEADER_LEN {
        return Err(Error::MalformedMessage {
            kind,
            needed: HEADER_LEN,
            got: buf.len(),
        });
    }

    let mut cur = buf;
    Ok((cur.get_u32(), cur.get_u8()))
}

/// 헤더 검증 후 본문 슬라이스 반환
///
/// 길이 < 5 → MalformedMessage, magic/type 불일치 → UnrecognizedMessage,
/// 타입별 고정 길이 미달 → MalformedMessage
fn expect_kind(buf: &[u8], expected: MessageType) -> Result<&[u8]> {
    let (magic, msg_type) = read_header(buf, Some(expected))?;

    if magic != MAGIC_COOKIE || msg_type != expected as u8 {
        return Err(Error::UnrecognizedMessage { magic, msg_type });
    }

    if buf.len() < expected.min_len() {
        return Err(Error::MalformedMessage {
            kind: Some(expected),
            needed: expected.min_len(),
            got: buf.len(),
        });
    }

    Ok(&buf[HEADER_LEN..])
}

/// 서버 광고 메시지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferMessage {
    /// 서버 UDP 전송 포트
    pub udp_port: u16,

    /// 서버 TCP 포트
    pub tcp_port: u16,
}

impl OfferMessage {
    pub fn new(udp_port: u16, tcp_port: u16) -> Self {
        Self { udp_port, tcp_port }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(OFFER_LEN);
        put_header(&mut buf, MessageType::Offer);
        buf.put_u16(self.udp_port);
        buf.put_u16(self.tcp_port);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut body = expect_kind(bytes, MessageType::Offer)?;
        Ok(Self {
            udp_port: body.get_u16(),
            tcp_port: body.get_u16(),
        })
    }
}

/// 전송 요청 메시지 (UDP 경로)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMessage {
    /// 요청 바이트 수
    pub file_size: u64,
}

impl RequestMessage {
    pub fn new(file_size: u64) -> Self {
        Self { file_size }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_LEN);
        put_header(&mut buf, MessageType::Request);
        buf.put_u64(self.file_size);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut body = expect_kind(bytes, MessageType::Request)?;
        Ok(Self {
            file_size: body.get_u64(),
        })
    }
}

/// 데이터 세그먼트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSegment {
    /// 이 세션의 총 세그먼트 수
    pub total_segments: u64,

    /// 세그먼트 번호 (0부터)
    pub segment_index: u64,

    /// 데이터 (최대 SEGMENT_PAYLOAD_BYTES)
    pub data: Bytes,
}

impl PayloadSegment {
    pub fn new(total_segments: u64, segment_index: u64, data: Bytes) -> Self {
        Self {
            total_segments,
            segment_index,
            data,
        }
    }

    /// 헤더 + 데이터를 버퍼에 기록 (송신 루프에서 버퍼 재사용)
    pub fn encode_into(total_segments: u64, segment_index: u64, data: &[u8], buf: &mut BytesMut) {
        buf.reserve(PAYLOAD_HEADER_LEN + data.len());
        put_header(buf, MessageType::Payload);
        buf.put_u64(total_segments);
        buf.put_u64(segment_index);
        buf.put_slice(data);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PAYLOAD_HEADER_LEN + self.data.len());
        Self::encode_into(self.total_segments, self.segment_index, &self.data, &mut buf);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut body = expect_kind(bytes, MessageType::Payload)?;
        let total_segments = body.get_u64();
        let segment_index = body.get_u64();

        if body.len() > SEGMENT_PAYLOAD_BYTES {
            return Err(Error::OversizedPayload {
                len: body.len(),
                max: SEGMENT_PAYLOAD_BYTES,
            });
        }

        Ok(Self {
            total_segments,
            segment_index,
            data: Bytes::copy_from_slice(body),
        })
    }
}

/// 타입 바이트로 분기하는 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Offer(OfferMessage),
    Request(RequestMessage),
    Payload(PayloadSegment),
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::Offer(_) => MessageType::Offer,
            Message::Request(_) => MessageType::Request,
            Message::Payload(_) => MessageType::Payload,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Message::Offer(m) => m.to_bytes(),
            Message::Request(m) => m.to_bytes(),
            Message::Payload(m) => m.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (magic, msg_type) = read_header(bytes, None)?;
        if magic != MAGIC_COOKIE {
            return Err(Error::UnrecognizedMessage { magic, msg_type });
        }

        match MessageType::from_u8(msg_type) {
            Some(MessageType::Offer) => OfferMessage::from_bytes(bytes).map(Message::Offer),
            Some(MessageType::Request) => RequestMessage::from_bytes(bytes).map(Message::Request),
            Some(MessageType::Payload) => PayloadSegment::from_bytes(bytes).map(Message::Payload),
            None => Err(Error::UnrecognizedMessage { magic, msg_type }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_malformed(result: Result<impl std::fmt::Debug>) {
        match result {
            Err(Error::MalformedMessage { .. }) => {}
            other => panic!("expected MalformedMessage, got {:?}", other),
        }
    }

    fn assert_unrecognized(result: Result<impl std::fmt::Debug>) {
        match result {
            Err(Error::UnrecognizedMessage { .. }) => {}
            other => panic!("expected UnrecognizedMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_offer_layout_is_big_endian() {
        let bytes = OfferMessage::new(60000, 12345).to_bytes();
        assert_eq!(
            bytes.as_ref(),
            &[0xAB, 0xCD, 0xDC, 0xBA, 0x02, 0xEA, 0x60, 0x30, 0x39]
        );
    }

    #[test]
    fn test_offer_port_extremes() {
        for (udp, tcp) in [(0, 0), (0, 65535), (65535, 0), (65535, 65535), (60000, 12345)] {
            let offer = OfferMessage::new(udp, tcp);
            let restored = OfferMessage::from_bytes(&offer.to_bytes()).unwrap();
            assert_eq!(restored, offer);
        }
    }

    #[test]
    fn test_request_layout() {
        let bytes = RequestMessage::new(100_000).to_bytes();
        assert_eq!(bytes.len(), REQUEST_LEN);
        assert_eq!(bytes[4], 0x03);
        assert_eq!(&bytes[5..], &100_000u64.to_be_bytes());
        assert_eq!(RequestMessage::from_bytes(&bytes).unwrap().file_size, 100_000);
    }

    #[test]
    fn test_payload_segment() {
        let segment = PayloadSegment::new(98, 97, Bytes::from(vec![b'a'; 672]));
        let bytes = segment.to_bytes();
        assert_eq!(bytes.len(), PAYLOAD_HEADER_LEN + 672);

        let restored = PayloadSegment::from_bytes(&bytes).unwrap();
        assert_eq!(restored, segment);
    }

    #[test]
    fn test_payload_header_only() {
        let bytes = PayloadSegment::new(0, 0, Bytes::new()).to_bytes();
        let restored = PayloadSegment::from_bytes(&bytes).unwrap();
        assert!(restored.data.is_empty());
    }

    #[test]
    fn test_truncated_buffers_are_malformed() {
        let offer = OfferMessage::new(1, 2).to_bytes();
        let request = RequestMessage::new(3).to_bytes();
        let payload = PayloadSegment::new(4, 5, Bytes::from_static(b"xyz")).to_bytes();

        for len in 0..OFFER_LEN {
            assert_malformed(OfferMessage::from_bytes(&offer[..len]));
            assert_malformed(Message::from_bytes(&offer[..len]));
        }
        for len in 0..REQUEST_LEN {
            assert_malformed(RequestMessage::from_bytes(&request[..len]));
            assert_malformed(Message::from_bytes(&request[..len]));
        }
        for len in 0..PAYLOAD_HEADER_LEN {
            assert_malformed(PayloadSegment::from_bytes(&payload[..len]));
            assert_malformed(Message::from_bytes(&payload[..len]));
        }
    }

    #[test]
    fn test_wrong_magic_is_unrecognized() {
        let mut bytes = OfferMessage::new(1, 2).to_bytes().to_vec();
        bytes[0] = 0x00;
        assert_unrecognized(OfferMessage::from_bytes(&bytes));
        assert_unrecognized(Message::from_bytes(&bytes));
    }

    #[test]
    fn test_wrong_type_is_unrecognized() {
        let request = RequestMessage::new(1024).to_bytes();
        assert_unrecognized(OfferMessage::from_bytes(&request));
        assert_unrecognized(PayloadSegment::from_bytes(&request));

        let mut unknown = request.to_vec();
        unknown[4] = 0x7F;
        assert_unrecognized(Message::from_bytes(&unknown));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let segment = PayloadSegment::new(1, 0, Bytes::from(vec![0u8; SEGMENT_PAYLOAD_BYTES + 1]));
        match PayloadSegment::from_bytes(&segment.to_bytes()) {
            Err(Error::OversizedPayload { len, max }) => {
                assert_eq!(len, SEGMENT_PAYLOAD_BYTES + 1);
                assert_eq!(max, SEGMENT_PAYLOAD_BYTES);
            }
            other => panic!("expected OversizedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_dispatch() {
        let messages = [
            Message::Offer(OfferMessage::new(60000, 12345)),
            Message::Request(RequestMessage::new(u64::MAX)),
            Message::Payload(PayloadSegment::new(2, 1, Bytes::from_static(b"hello"))),
        ];

        for message in messages {
            let decoded = Message::from_bytes(&message.to_bytes()).unwrap();
            assert_eq!(decoded.kind(), message.kind());
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_offer_ignores_trailing_bytes() {
        let mut bytes = OfferMessage::new(7, 8).to_bytes().to_vec();
        bytes.extend_from_slice(b"trailing");
        assert_eq!(OfferMessage::from_bytes(&bytes).unwrap(), OfferMessage::new(7, 8));
    }
}
