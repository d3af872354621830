//! 서버/클라이언트 공통 설정

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::{DEFAULT_DISCOVERY_PORT, DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};

/// netspeed 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 탐색(브로드캐스트) 포트
    pub discovery_port: u16,

    /// Offer를 보낼 주소 (보통 브로드캐스트 주소)
    pub broadcast_addr: IpAddr,

    /// 서버 바인드 IP
    pub bind_ip: IpAddr,

    /// 서버 UDP 전송 포트 (0이면 OS가 선택, 실제 포트를 광고)
    pub udp_port: u16,

    /// 서버 TCP 포트 (0이면 OS가 선택)
    pub tcp_port: u16,

    /// Offer 광고 주기 (밀리초)
    pub offer_interval_ms: u64,

    /// UDP 수신 유휴 타임아웃 (밀리초)
    /// 이 시간 동안 아무것도 안 오면 전송 종료로 간주
    pub udp_idle_timeout_ms: u64,

    /// 세그먼트 전송 간격 (마이크로초)
    /// 0이면 최대 속도로 전송
    pub segment_interval_us: u64,

    /// UDP 수신 버퍼 크기
    pub recv_buffer_size: usize,

    /// TCP 송수신 버퍼 크기
    pub tcp_buffer_size: usize,

    /// TCP 크기 요청 줄 최대 길이 (개행 제외)
    pub max_size_line: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: DEFAULT_DISCOVERY_PORT,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            udp_port: DEFAULT_UDP_PORT,
            tcp_port: DEFAULT_TCP_PORT,
            offer_interval_ms: 1000,          // 1초
            udp_idle_timeout_ms: 1000,        // 1초
            segment_interval_us: 0,           // 최대 속도
            recv_buffer_size: 4096,
            tcp_buffer_size: 64 * 1024,       // 64KB
            max_size_line: 32,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 한 대의 기기에서 서버/클라이언트를 함께 돌릴 때
    /// (루프백 유니캐스트로 Offer 전송, 포트는 OS 선택)
    pub fn loopback() -> Self {
        Self {
            broadcast_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            udp_port: 0,
            tcp_port: 0,
            offer_interval_ms: 100,
            udp_idle_timeout_ms: 300,
            ..Self::default()
        }
    }

    /// 손실이 심한 링크용 설정 (세그먼트 간격 + 긴 유휴 타임아웃)
    pub fn lossy_link() -> Self {
        Self {
            udp_idle_timeout_ms: 2000,
            segment_interval_us: 20,
            ..Self::default()
        }
    }

    pub fn offer_interval(&self) -> Duration {
        Duration::from_millis(self.offer_interval_ms)
    }

    pub fn udp_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.udp_idle_timeout_ms)
    }

    pub fn segment_interval(&self) -> Option<Duration> {
        (self.segment_interval_us > 0).then(|| Duration::from_micros(self.segment_interval_us))
    }

    /// Offer 목적지 주소
    pub fn broadcast_target(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast_addr, self.discovery_port)
    }

    pub fn udp_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.udp_port)
    }

    pub fn tcp_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.tcp_port)
    }

    /// 클라이언트 탐색 소켓 바인드 주소 (항상 모든 인터페이스)
    pub fn discovery_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.discovery_port)
    }
}
