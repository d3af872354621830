use std::net::SocketAddr;
use std::time::Duration;

use netspeed::discovery::{bind_discovery_socket, wait_for_offer};
use netspeed::receiver::udp_transfer;
use netspeed::{segment_count, Config, Protocol, RoundPlan, SpeedTestClient, SpeedTestServer};

/// 서버를 띄우고 루프백 Offer로 찾아냄
async fn start_and_discover() -> (netspeed::ServerOffer, netspeed::stats::SharedServerStats) {
    let listener = bind_discovery_socket("127.0.0.1:0".parse().unwrap()).unwrap();
    let discovery_port = listener.local_addr().unwrap().port();

    // 세그먼트 간격을 두어 루프백에서도 손실 없이 받도록 함
    let config = Config {
        discovery_port,
        segment_interval_us: 20,
        ..Config::loopback()
    };
    let server = SpeedTestServer::bind(config).await.unwrap();
    let stats = server.stats_handle();
    tokio::spawn(server.run());

    let offer = tokio::time::timeout(Duration::from_secs(5), wait_for_offer(&listener, 1024))
        .await
        .expect("no offer within 5s")
        .unwrap();
    (offer, stats)
}

fn client_config() -> Config {
    Config {
        udp_idle_timeout_ms: 500,
        ..Config::loopback()
    }
}

#[tokio::test]
async fn test_end_to_end_round() {
    let (offer, stats) = start_and_discover().await;
    let client = SpeedTestClient::new(client_config());

    let results = client.run_round(&offer, RoundPlan::new(100_000, 1, 1)).await;
    assert_eq!(results.len(), 2);

    let tcp = &results[0];
    assert_eq!(tcp.protocol, Protocol::Tcp);
    assert_eq!(tcp.total_bytes, 100_000);

    let udp = &results[1];
    assert_eq!(udp.protocol, Protocol::Udp);
    let expected_segments = segment_count(100_000);
    assert_eq!(expected_segments, 98);
    assert_eq!(udp.total_segments, Some(expected_segments));
    assert_eq!(udp.distinct_segments, expected_segments);
    assert_eq!(udp.total_bytes, 100_000);
    assert_eq!(udp.received_percent(), 100.0);
    assert!(udp.summary().contains("percentage received"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = stats.lock().clone();
    assert_eq!(stats.tcp_sessions, 1);
    assert_eq!(stats.udp_sessions, 1);
    assert_eq!(stats.segments_sent, expected_segments);
    assert_eq!(stats.bytes_sent, 200_000);
}

#[tokio::test]
async fn test_zero_size_round() {
    let (offer, _stats) = start_and_discover().await;
    let client = SpeedTestClient::new(client_config());

    let results = client.run_round(&offer, RoundPlan::new(0, 1, 1)).await;
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].total_bytes, 0);
    assert!(results[0].elapsed >= Duration::ZERO);

    // 세그먼트 0개: 유휴 타임아웃 후 종료, 손실률 0
    let udp = &results[1];
    assert!(udp.elapsed >= Duration::from_millis(500));
    assert_eq!(udp.total_segments, None);
    assert_eq!(udp.distinct_segments, 0);
    assert_eq!(udp.loss_percent(), 0.0);
    assert_eq!(udp.received_percent(), 0.0);
}

#[tokio::test]
async fn test_concurrent_udp_sessions_are_isolated() {
    let (offer, _stats) = start_and_discover().await;
    let config = client_config();
    let server_addr: SocketAddr = offer.udp_addr();

    let sizes = [5_000u64, 20_000, 50_000, 1];
    let mut handles = Vec::new();
    for (i, size) in sizes.into_iter().enumerate() {
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            (size, udp_transfer(server_addr, size, i + 1, &config).await.unwrap())
        }));
    }

    let mut received = Vec::new();
    for handle in handles {
        let (size, result) = handle.await.unwrap();
        let expected = segment_count(size);

        // 세션마다 총 세그먼트 수가 달라 다른 세션의 스트림이 섞이면 드러남
        assert!(result.distinct_segments > 0, "size {}: nothing received", size);
        assert_eq!(result.total_segments, Some(expected));
        assert_eq!(result.distinct_segments, expected);
        assert_eq!(result.total_bytes, size);
        received.push(result.total_bytes);
    }
    assert_eq!(received, sizes.to_vec());
}

#[tokio::test]
async fn test_client_run_single_round() {
    // 클라이언트가 바인딩할 탐색 포트 확보
    let probe = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
    let discovery_port = probe.local_addr().unwrap().port();
    drop(probe);

    let server_config = Config {
        discovery_port,
        ..Config::loopback()
    };
    let server = SpeedTestServer::bind(server_config).await.unwrap();
    tokio::spawn(server.run());

    let client = SpeedTestClient::new(Config {
        discovery_port,
        udp_idle_timeout_ms: 200,
        ..Config::loopback()
    });

    tokio::time::timeout(
        Duration::from_secs(10),
        client.run(RoundPlan::new(4096, 1, 1), Some(1)),
    )
    .await
    .expect("single round should finish")
    .unwrap();
}
