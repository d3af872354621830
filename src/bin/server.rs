//! netspeed 서버
//!
//! 1초마다 Offer를 브로드캐스트하고, 요청마다 TCP/UDP로 필러 데이터를 전송
//!
//! 사용법:
//!   cargo run --release --bin netspeed-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 포트 (탐색 13117, UDP 60000, TCP 12345)
//!   cargo run --release --bin netspeed-server
//!
//!   # 특정 서브넷 브로드캐스트 + 세그먼트 간격
//!   cargo run --release --bin netspeed-server -- --broadcast 192.168.1.255 --segment-interval 10

use std::str::FromStr;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netspeed::discovery::local_ip;
use netspeed::{Config, SpeedTestServer};

/// 서버 실행 옵션
struct ServerArgs {
    config: Config,
    stats_interval_secs: u64,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            config: Config::default(),
            stats_interval_secs: 30,
        }
    }
}

fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    args.get(i + 1)
        .ok_or_else(|| format!("{} 값 필요", flag))?
        .parse()
        .map_err(|_| format!("{} 값이 유효하지 않음: {}", flag, args[i + 1]))
}

fn print_help() {
    println!(
        r#"netspeed Server - 브로드캐스트 탐색 TCP/UDP 처리량 측정 서버

사용법:
  cargo run --release --bin netspeed-server -- [OPTIONS]

옵션:
  --loopback                  같은 기기 테스트용 (127.0.0.1로 Offer, 포트 자동)
  -b, --bind <IP>             바인드 IP (기본: 0.0.0.0)
  --udp-port <PORT>           UDP 전송 포트 (기본: 60000, 0 = 자동)
  --tcp-port <PORT>           TCP 포트 (기본: 12345, 0 = 자동)
  --discovery-port <PORT>     탐색 포트 (기본: 13117)
  --broadcast <IP>            Offer 목적지 (기본: 255.255.255.255)
  --offer-interval <MS>       Offer 주기 밀리초 (기본: 1000)
  --segment-interval <US>     세그먼트 전송 간격 마이크로초 (기본: 0 = 최대 속도)
  --stats-interval <SECS>     통계 로그 주기 초 (기본: 30, 0 = 끔)
  -h, --help                  이 도움말 출력

로그 레벨은 RUST_LOG로 조정 (기본: info)
"#
    );
}

fn parse_args() -> Result<ServerArgs, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = ServerArgs::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--loopback" => {
                let discovery_port = parsed.config.discovery_port;
                parsed.config = Config {
                    discovery_port,
                    ..Config::loopback()
                };
            }
            "--bind" | "-b" => {
                parsed.config.bind_ip = value(&args, i, flag)?;
                i += 1;
            }
            "--udp-port" => {
                parsed.config.udp_port = value(&args, i, flag)?;
                i += 1;
            }
            "--tcp-port" => {
                parsed.config.tcp_port = value(&args, i, flag)?;
                i += 1;
            }
            "--discovery-port" => {
                parsed.config.discovery_port = value(&args, i, flag)?;
                i += 1;
            }
            "--broadcast" => {
                parsed.config.broadcast_addr = value(&args, i, flag)?;
                i += 1;
            }
            "--offer-interval" => {
                parsed.config.offer_interval_ms = value(&args, i, flag)?;
                i += 1;
            }
            "--segment-interval" => {
                parsed.config.segment_interval_us = value(&args, i, flag)?;
                i += 1;
            }
            "--stats-interval" => {
                parsed.stats_interval_secs = value(&args, i, flag)?;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
        }
        i += 1;
    }

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args()?;
    let config = args.config.clone();

    info!("netspeed Server starting...");
    info!("Discovery: {}", config.broadcast_target());
    info!(
        "Offer interval: {}ms, segment interval: {}us",
        config.offer_interval_ms, config.segment_interval_us
    );

    // 소켓 확보 실패는 여기서 종료 (exit code != 0)
    let server = SpeedTestServer::bind(config).await?;
    info!(
        "Server started, listening on IP address {} (udp {}, tcp {})",
        local_ip().await,
        server.udp_addr()?.port(),
        server.tcp_addr()?.port()
    );

    // 주기적 통계 로그
    if args.stats_interval_secs > 0 {
        let stats = server.stats_handle();
        let period = Duration::from_secs(args.stats_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!("Stats: {}", stats.lock().summary());
            }
        });
    }

    let stats = server.stats_handle();
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            info!("Final stats: {}", stats.lock().summary());
        }
    }

    Ok(())
}
