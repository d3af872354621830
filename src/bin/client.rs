//! netspeed 클라이언트
//!
//! 서버 Offer를 기다린 뒤 TCP/UDP 워커를 병렬로 실행해 처리량 측정, 반복
//!
//! 사용법:
//!   cargo run --release --bin netspeed-client -- [OPTIONS]
//!
//! 예시:
//!   # 대화형 (크기, TCP 수, UDP 수 입력)
//!   cargo run --release --bin netspeed-client
//!
//!   # 1MB, TCP 2개 + UDP 2개, 3라운드
//!   cargo run --release --bin netspeed-client -- --size 1048576 --tcp 2 --udp 2 --rounds 3

use std::io::Write;
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netspeed::{Config, RoundPlan, SpeedTestClient};

/// 클라이언트 실행 옵션
#[derive(Default)]
struct ClientArgs {
    config: Config,
    file_size: Option<u64>,
    tcp_count: Option<usize>,
    udp_count: Option<usize>,
    rounds: Option<usize>,
}

fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    args.get(i + 1)
        .ok_or_else(|| format!("{} 값 필요", flag))?
        .parse()
        .map_err(|_| format!("{} 값이 유효하지 않음: {}", flag, args[i + 1]))
}

fn print_help() {
    println!(
        r#"netspeed Client - 브로드캐스트 탐색 TCP/UDP 처리량 측정 클라이언트

사용법:
  cargo run --release --bin netspeed-client -- [OPTIONS]

옵션:
  --size <BYTES>              요청 크기 (없으면 입력 받음)
  --tcp <N>                   TCP 연결 수 (없으면 입력 받음)
  --udp <N>                   UDP 연결 수 (없으면 입력 받음)
  --rounds <N>                N 라운드 후 종료 (기본: 0 = 무한)
  --discovery-port <PORT>     탐색 포트 (기본: 13117)
  --idle-timeout <MS>         UDP 유휴 타임아웃 밀리초 (기본: 1000)
  -h, --help                  이 도움말 출력

로그 레벨은 RUST_LOG로 조정 (기본: info)
"#
    );
}

fn parse_args() -> Result<ClientArgs, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = ClientArgs::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--size" => {
                parsed.file_size = Some(value(&args, i, flag)?);
                i += 1;
            }
            "--tcp" => {
                parsed.tcp_count = Some(value(&args, i, flag)?);
                i += 1;
            }
            "--udp" => {
                parsed.udp_count = Some(value(&args, i, flag)?);
                i += 1;
            }
            "--rounds" => {
                let rounds: usize = value(&args, i, flag)?;
                parsed.rounds = (rounds > 0).then_some(rounds);
                i += 1;
            }
            "--discovery-port" => {
                parsed.config.discovery_port = value(&args, i, flag)?;
                i += 1;
            }
            "--idle-timeout" => {
                parsed.config.udp_idle_timeout_ms = value(&args, i, flag)?;
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

/// 숫자를 입력 받을 때까지 반복
async fn prompt<T: FromStr>(
    lines: &mut Lines<BufReader<Stdin>>,
    question: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    loop {
        print!("{}: ", question);
        std::io::stdout().flush()?;

        let line = lines
            .next_line()
            .await?
            .ok_or("stdin closed before input was given")?;
        match line.trim().parse() {
            Ok(value) => return Ok(value),
            Err(_) => println!("Invalid number: {:?}", line.trim()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let file_size = match args.file_size {
        Some(size) => size,
        None => prompt(&mut lines, "Enter file size (bytes)").await?,
    };
    let tcp_count = match args.tcp_count {
        Some(count) => count,
        None => prompt(&mut lines, "Enter number of TCP connections").await?,
    };
    let udp_count = match args.udp_count {
        Some(count) => count,
        None => prompt(&mut lines, "Enter number of UDP connections").await?,
    };

    let plan = RoundPlan::new(file_size, tcp_count, udp_count);
    info!(
        "netspeed Client: {} bytes, {} TCP, {} UDP, idle timeout {}ms",
        plan.file_size, plan.tcp_count, plan.udp_count, args.config.udp_idle_timeout_ms
    );

    let client = SpeedTestClient::new(args.config);
    tokio::select! {
        result = client.run(plan, args.rounds) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
