//! TCP 전송 경로
//!
//! - 요청: ASCII 10진수 크기 + '\n'
//! - 응답: 정확히 그 크기만큼 필러 후 연결 종료
//! - 길이 확인 메시지가 없으므로 클라이언트는 EOF만 완료 신호로 사용

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::stats::{SharedServerStats, TransferResult};
use crate::{Config, Error, Result, FILLER_BYTE};

/// 크기 요청 줄 읽기
///
/// 개행 전 EOF는 받은 내용으로 파싱, 아무것도 없으면 ConnectionClosed
pub async fn read_size_request<R>(reader: R, max_line: usize) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader.take(max_line as u64 + 1));
    let mut line = Vec::with_capacity(max_line + 1);
    reader.read_until(b'\n', &mut line).await?;

    if line.is_empty() {
        return Err(Error::ConnectionClosed);
    }
    if line.last() != Some(&b'\n') && line.len() > max_line {
        return Err(Error::InvalidSizeRequest(
            String::from_utf8_lossy(&line).into_owned(),
        ));
    }

    parse_size(&line)
}

/// 크기 문자열 파싱 (앞뒤 공백 허용)
pub fn parse_size(line: &[u8]) -> Result<u64> {
    std::str::from_utf8(line)
        .ok()
        .map(str::trim)
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::InvalidSizeRequest(String::from_utf8_lossy(line).into_owned()))
}

/// 필러를 정확히 size 바이트 기록
pub async fn write_filler<W>(writer: &mut W, size: u64, buffer_size: usize) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let chunk = vec![FILLER_BYTE; buffer_size.max(1)];
    let mut remaining = size;

    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        writer.write_all(&chunk[..n]).await?;
        remaining -= n as u64;
    }

    writer.flush().await?;
    Ok(size)
}

/// 연결 하나 처리: 크기 읽기 → 필러 전송 → 종료
pub async fn handle_connection(mut stream: TcpStream, config: &Config) -> Result<u64> {
    let (read_half, mut write_half) = stream.split();
    let size = read_size_request(read_half, config.max_size_line).await?;

    let sent = write_filler(&mut write_half, size, config.tcp_buffer_size).await?;
    write_half.shutdown().await?;
    Ok(sent)
}

/// TCP 리스너 (서버측)
pub struct TcpRequestListener {
    listener: TcpListener,
    config: Config,
    stats: SharedServerStats,
}

impl TcpRequestListener {
    pub fn new(listener: TcpListener, config: Config, stats: SharedServerStats) -> Self {
        Self {
            listener,
            config,
            stats,
        }
    }

    /// accept 루프 (종료하지 않음)
    ///
    /// 연결마다 태스크 하나, 에러는 해당 연결에서 끝남
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // 예: 파일 디스크립터 고갈
                    warn!("TCP accept 에러: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            debug!("TCP 연결: {}", peer);
            let config = self.config.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                let start = Instant::now();
                match handle_connection(stream, &config).await {
                    Ok(sent) => {
                        info!(
                            "TCP transfer to {} done: {} bytes in {:.2}s",
                            peer,
                            sent,
                            start.elapsed().as_secs_f64()
                        );
                        let mut stats = stats.lock();
                        stats.tcp_sessions += 1;
                        stats.bytes_sent += sent;
                    }
                    Err(e @ Error::InvalidSizeRequest(_)) => {
                        warn!("TCP 요청 거부 ({}): {}", peer, e);
                        stats.lock().rejected_requests += 1;
                    }
                    Err(e) => {
                        warn!("TCP 연결 실패 ({}): {}", peer, e);
                        stats.lock().failed_sessions += 1;
                    }
                }
            });
        }
    }
}

/// TCP 워커 하나 실행 (클라이언트측)
pub async fn tcp_transfer(
    server_addr: SocketAddr,
    file_size: u64,
    index: usize,
    config: &Config,
) -> Result<TransferResult> {
    let mut stream = TcpStream::connect(server_addr).await?;
    stream.write_all(format!("{}\n", file_size).as_bytes()).await?;

    let start = Instant::now();
    let mut buf = vec![0u8; config.tcp_buffer_size.max(1)];
    let mut total_bytes = 0u64;

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total_bytes += n as u64;
    }

    let elapsed = start.elapsed();
    debug!("TCP #{} 종료: {} bytes", index, total_bytes);
    Ok(TransferResult::tcp(index, elapsed, total_bytes))
}
