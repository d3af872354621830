//! 서버 탐색
//!
//! - 서버: Offer를 주기적으로 브로드캐스트 (Beacon)
//! - 클라이언트: 탐색 포트에서 첫 번째 유효 Offer를 받고 반환 (1회성)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::message::OfferMessage;
use crate::{Config, Error, Result};

/// 클라이언트가 받은 서버 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOffer {
    /// Offer를 보낸 주소
    pub server_ip: IpAddr,

    /// 서버 UDP 전송 포트
    pub udp_port: u16,

    /// 서버 TCP 포트
    pub tcp_port: u16,
}

impl ServerOffer {
    pub fn from_message(server_ip: IpAddr, offer: OfferMessage) -> Self {
        Self {
            server_ip,
            udp_port: offer.udp_port,
            tcp_port: offer.tcp_port,
        }
    }

    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.udp_port)
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.tcp_port)
    }
}

/// Offer 광고기 (서버측)
pub struct Beacon {
    socket: UdpSocket,
    offer: OfferMessage,
    target: SocketAddr,
    interval: Duration,
}

impl Beacon {
    /// 브로드캐스트 가능한 소켓 생성
    pub async fn bind(config: &Config, offer: OfferMessage) -> Result<Self> {
        let bind_addr = SocketAddr::new(config.bind_ip, 0);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| Error::SocketBind { addr: bind_addr, source })?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::SocketSetup(format!("SO_BROADCAST: {}", e)))?;

        Ok(Self {
            socket,
            offer,
            target: config.broadcast_target(),
            interval: config.offer_interval(),
        })
    }

    pub fn offer(&self) -> OfferMessage {
        self.offer
    }

    /// 광고 루프 (종료하지 않음)
    ///
    /// 전송 실패는 로그만 남기고 다음 주기에 재시도
    pub async fn run(self) -> Result<()> {
        let packet = self.offer.to_bytes();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Broadcasting offers to {} every {:?} (udp={}, tcp={})",
            self.target, self.interval, self.offer.udp_port, self.offer.tcp_port
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.socket.send_to(&packet, self.target).await {
                warn!("Offer 전송 실패: {}", e);
            }
        }
    }
}

/// 탐색 포트 수신 소켓 생성
///
/// 같은 기기의 여러 클라이언트가 포트를 공유하도록 SO_REUSEADDR 설정
/// (BSD/macOS는 SO_REUSEPORT도 있어야 함)
pub fn bind_discovery_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::SocketSetup(format!("socket: {}", e)))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::SocketSetup(format!("SO_REUSEADDR: {}", e)))?;
    #[cfg(unix)]
    socket
        .set_reuse_port(true)
        .map_err(|e| Error::SocketSetup(format!("SO_REUSEPORT: {}", e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::SocketSetup(format!("nonblocking: {}", e)))?;
    socket
        .bind(&addr.into())
        .map_err(|source| Error::SocketBind { addr, source })?;

    UdpSocket::from_std(socket.into()).map_err(|e| Error::SocketSetup(format!("tokio: {}", e)))
}

/// 첫 번째 유효 Offer 대기
///
/// 다른 프로그램의 브로드캐스트도 같은 포트로 올 수 있으므로
/// 디코드 실패는 버리고 계속 대기
pub async fn wait_for_offer(socket: &UdpSocket, buf_size: usize) -> Result<ServerOffer> {
    let mut buf = vec![0u8; buf_size.max(crate::message::OFFER_LEN)];

    loop {
        let (len, addr) = socket.recv_from(&mut buf).await?;

        match OfferMessage::from_bytes(&buf[..len]) {
            Ok(offer) => {
                let server = ServerOffer::from_message(addr.ip(), offer);
                info!("Received offer from {}", addr.ip());
                return Ok(server);
            }
            Err(e) if e.is_discardable() => {
                debug!("탐색 포트의 외부 데이터그램 무시 ({}): {}", addr, e);
            }
            Err(e) => return Err(e),
        }
    }
}

/// 외부에서 보이는 로컬 IPv4 추정
///
/// 라우팅 테이블만 조회 (connect는 패킷을 보내지 않음)
pub async fn local_ip() -> IpAddr {
    async fn probe() -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
        Ok(socket.local_addr()?.ip())
    }

    probe().await.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
