//! 전송 통계

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::message::PayloadSegment;

/// 전송 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

/// 워커 하나의 측정 결과
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// 전송 경로
    pub protocol: Protocol,

    /// 워커 번호 (1부터)
    pub index: usize,

    /// 경과 시간
    pub elapsed: Duration,

    /// 수신 바이트 (UDP는 중복 포함)
    pub total_bytes: u64,

    /// 서버가 알려준 총 세그먼트 수 (UDP, 첫 세그먼트 기준)
    pub total_segments: Option<u64>,

    /// 중복 제외 수신 세그먼트 수 (UDP)
    pub distinct_segments: u64,

    /// 수신 데이터그램 수 (UDP, 중복 포함)
    pub datagrams: u64,
}

impl TransferResult {
    /// TCP 결과
    pub fn tcp(index: usize, elapsed: Duration, total_bytes: u64) -> Self {
        Self {
            protocol: Protocol::Tcp,
            index,
            elapsed,
            total_bytes,
            total_segments: None,
            distinct_segments: 0,
            datagrams: 0,
        }
    }

    /// 처리율 (bits/sec)
    /// 경과 시간이 0이면 측정 불가 (None)
    pub fn throughput_bps(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return None;
        }
        Some(self.total_bytes as f64 * 8.0 / secs)
    }

    /// 수신률 (%) = 100 × 고유 세그먼트 / 총 세그먼트
    /// 총 세그먼트를 모르거나 0이면 0
    pub fn received_percent(&self) -> f64 {
        match self.total_segments {
            Some(total) if total > 0 => self.distinct_segments as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// 손실률 (%)
    /// 총 세그먼트를 모르거나 0이면 0
    pub fn loss_percent(&self) -> f64 {
        match self.total_segments {
            Some(total) if total > 0 => (100.0 - self.received_percent()).max(0.0),
            _ => 0.0,
        }
    }

    /// 결과 요약 한 줄
    pub fn summary(&self) -> String {
        let speed = match self.throughput_bps() {
            Some(bps) => format!("{:.2} bits/second", bps),
            None => "too fast to measure".to_string(),
        };

        let mut line = format!(
            "{} transfer #{} finished, total time: {:.2} seconds, speed: {}",
            self.protocol,
            self.index,
            self.elapsed.as_secs_f64(),
            speed,
        );

        if self.protocol == Protocol::Udp {
            line.push_str(&format!(
                ", percentage received: {:.2}% ({}/{} segments, loss {:.2}%)",
                self.received_percent(),
                self.distinct_segments,
                self.total_segments.unwrap_or(0),
                self.loss_percent(),
            ));
        }

        line
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// UDP 세그먼트 수신 집계
///
/// 도착 순서는 믿지 않고 segment_index로만 기록
#[derive(Debug)]
pub struct UdpTally {
    start: Instant,
    total_bytes: u64,
    seen: HashSet<u64>,
    total_segments: Option<u64>,
    datagrams: u64,
    duplicates: u64,
}

impl UdpTally {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            total_bytes: 0,
            seen: HashSet::new(),
            total_segments: None,
            datagrams: 0,
            duplicates: 0,
        }
    }

    /// 세그먼트 기록
    ///
    /// 바이트와 데이터그램은 항상 집계
    /// 총 세그먼트 수는 자기 범위 안의 첫 세그먼트에서 확정,
    /// 그 범위를 벗어난 번호는 seen에 넣지 않음 (false 반환)
    pub fn record(&mut self, segment: &PayloadSegment) -> bool {
        self.datagrams += 1;
        self.total_bytes += segment.data.len() as u64;

        if self.total_segments.is_none() && segment.segment_index < segment.total_segments {
            self.total_segments = Some(segment.total_segments);
        }
        match self.total_segments {
            Some(total) if segment.segment_index < total => {}
            _ => return false,
        }

        if !self.seen.insert(segment.segment_index) {
            self.duplicates += 1;
        }
        true
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn distinct_segments(&self) -> u64 {
        self.seen.len() as u64
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn total_segments(&self) -> Option<u64> {
        self.total_segments
    }

    /// 집계 종료
    pub fn finish(self, index: usize, end: Instant) -> TransferResult {
        TransferResult {
            protocol: Protocol::Udp,
            index,
            elapsed: end.saturating_duration_since(self.start),
            total_bytes: self.total_bytes,
            total_segments: self.total_segments,
            distinct_segments: self.seen.len() as u64,
            datagrams: self.datagrams,
        }
    }
}

/// 서버 전체 통계 (세션 간 공유, 뮤텍스로 보호)
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// 시작된 UDP 세션 수
    pub udp_sessions: u64,

    /// 처리한 TCP 연결 수
    pub tcp_sessions: u64,

    /// 전송 세그먼트 수
    pub segments_sent: u64,

    /// 전송 바이트 (TCP + UDP 페이로드)
    pub bytes_sent: u64,

    /// 버려진 요청 수 (디코드 실패, 잘못된 크기 줄)
    pub rejected_requests: u64,

    /// 도중에 실패한 세션 수
    pub failed_sessions: u64,
}

impl ServerStats {
    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "UDP sessions: {} | TCP sessions: {} | Segments: {} | Bytes: {} | Rejected: {} | Failed: {}",
            self.udp_sessions,
            self.tcp_sessions,
            self.segments_sent,
            self.bytes_sent,
            self.rejected_requests,
            self.failed_sessions,
        )
    }
}

/// 공유 서버 통계 핸들
pub type SharedServerStats = Arc<Mutex<ServerStats>>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn segment(total: u64, index: u64, len: usize) -> PayloadSegment {
        PayloadSegment::new(total, index, Bytes::from(vec![b'a'; len]))
    }

    #[test]
    fn test_tally_counts_duplicates_once() {
        let start = Instant::now();
        let mut tally = UdpTally::new(start);

        assert!(tally.record(&segment(4, 2, 1024)));
        assert!(tally.record(&segment(4, 0, 1024)));
        assert!(tally.record(&segment(4, 2, 1024)));

        assert_eq!(tally.distinct_segments(), 2);
        assert_eq!(tally.duplicates(), 1);
        assert_eq!(tally.total_bytes(), 3 * 1024);

        let result = tally.finish(1, start + Duration::from_secs(1));
        assert_eq!(result.total_segments, Some(4));
        assert_eq!(result.received_percent(), 50.0);
        assert_eq!(result.loss_percent(), 50.0);
        assert_eq!(result.datagrams, 3);
        assert_eq!(result.throughput_bps(), Some(3.0 * 1024.0 * 8.0));
    }

    #[test]
    fn test_tally_keeps_first_total() {
        let start = Instant::now();
        let mut tally = UdpTally::new(start);

        assert!(tally.record(&segment(2, 1, 10)));
        // 다른 세션의 세그먼트 (범위 밖)
        assert!(!tally.record(&segment(50, 40, 10)));
        assert!(tally.record(&segment(50, 0, 10)));

        assert_eq!(tally.total_segments(), Some(2));
        let result = tally.finish(1, start);
        assert_eq!(result.distinct_segments, 2);
        assert_eq!(result.received_percent(), 100.0);
        assert_eq!(result.loss_percent(), 0.0);
    }

    #[test]
    fn test_out_of_range_segment_still_counts_bytes() {
        let start = Instant::now();
        let mut tally = UdpTally::new(start);

        assert!(tally.record(&segment(2, 0, 100)));
        assert!(!tally.record(&segment(2, 5, 100)));

        assert_eq!(tally.total_bytes(), 200);
        assert_eq!(tally.distinct_segments(), 1);

        let result = tally.finish(1, start + Duration::from_secs(1));
        assert_eq!(result.datagrams, 2);
        assert_eq!(result.total_segments, Some(2));
        assert_eq!(result.received_percent(), 50.0);
    }

    #[test]
    fn test_total_not_taken_from_inconsistent_segment() {
        let start = Instant::now();
        let mut tally = UdpTally::new(start);

        // index >= total 인 첫 세그먼트로는 총 수를 정하지 않음
        assert!(!tally.record(&segment(3, 7, 10)));
        assert_eq!(tally.total_segments(), None);
        assert_eq!(tally.total_bytes(), 10);

        assert!(tally.record(&segment(4, 1, 10)));
        assert_eq!(tally.total_segments(), Some(4));
        assert_eq!(tally.total_bytes(), 20);
        assert_eq!(tally.distinct_segments(), 1);
    }

    #[test]
    fn test_empty_transfer_reports_zero() {
        let start = Instant::now();
        let result = UdpTally::new(start).finish(3, start + Duration::from_secs(1));

        assert_eq!(result.total_segments, None);
        assert_eq!(result.received_percent(), 0.0);
        assert_eq!(result.loss_percent(), 0.0);
        assert_eq!(result.throughput_bps(), Some(0.0));
    }

    #[test]
    fn test_shared_server_stats() {
        let stats = SharedServerStats::default();
        let handle = stats.clone();

        {
            let mut guard = handle.lock();
            guard.udp_sessions += 2;
            guard.segments_sent += 98;
        }

        let snapshot = stats.lock().clone();
        assert_eq!(snapshot.udp_sessions, 2);
        assert!(snapshot.summary().contains("Segments: 98"));
    }

    #[test]
    fn test_zero_elapsed_sentinel() {
        let result = TransferResult::tcp(1, Duration::ZERO, 100);
        assert!(result.throughput_bps().is_none());
        assert!(result.summary().contains("too fast to measure"));
    }

    #[test]
    fn test_summary_lines() {
        let tcp = TransferResult::tcp(2, Duration::from_secs(2), 1000);
        assert_eq!(
            tcp.summary(),
            "TCP transfer #2 finished, total time: 2.00 seconds, speed: 4000.00 bits/second"
        );

        let start = Instant::now();
        let mut tally = UdpTally::new(start);
        tally.record(&segment(1, 0, 1000));
        let udp = tally.finish(1, start + Duration::from_secs(1));
        assert!(udp.summary().starts_with("UDP transfer #1 finished"));
        assert!(udp.summary().contains("percentage received: 100.00%"));
    }
}
