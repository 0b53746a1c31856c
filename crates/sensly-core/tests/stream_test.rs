#![allow(clippy::unwrap_used)]
// Streaming client tests against a local WebSocket server.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;
use wiremock::MockServer;

use chrono::Utc;
use secrecy::SecretString;

use sensly_core::{
    ActiveDevice, AuthCache, CachedAuth, ClientConfig, CoreError, Credentials, ReconnectConfig,
    SenseEvent, SenseMonitor, StreamState,
};

use common::{auth_mock, config, monitor, next_event};

#[tokio::test]
async fn test_open_requires_authentication() {
    let server = MockServer::start().await;
    let monitor = monitor(config(&server));

    let err = monitor.open_stream().await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthenticated), "got: {err:?}");
    assert_eq!(monitor.stream_state(), StreamState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_emits_samples_then_schedules_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let feed = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        ws.send(Message::text(r#"{"type":"hello"}"#)).await.unwrap();
        ws.send(Message::text("definitely not json")).await.unwrap();
        ws.send(Message::text(
            r#"{"type":"realtime_update","payload":{"w":812.4,"devices":[
                {"name":"Fridge","w":12},{"name":"","w":20},{"name":"Fan","w":3}]}}"#,
        ))
        .await
        .unwrap();
        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let server = MockServer::start().await;
    auth_mock("tok-1").mount(&server).await;

    let mut config = config(&server);
    config.realtime_url = Url::parse(&format!("ws://{addr}/monitors/")).unwrap();
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(300),
    };
    let monitor = monitor(config);
    let mut events = monitor.subscribe();
    let mut states = monitor.watch_stream_state();

    monitor.authenticate().await.unwrap();
    monitor.open_stream().await.unwrap();
    // A second open while running is a no-op.
    monitor.open_stream().await.unwrap();

    next_event(&mut events, "websocket_open").await;

    let data = next_event(&mut events, "data").await;
    let SenseEvent::Data(sample) = &*data else {
        panic!("expected data event, got {data:?}");
    };
    assert!((sample.power_w - 812.0).abs() < f64::EPSILON);
    assert_eq!(sample.voltage, vec![120.0]);
    assert!((sample.frequency_hz - 60.0).abs() < f64::EPSILON);
    assert_eq!(
        sample.devices,
        vec![ActiveDevice {
            name: "Fridge".into(),
            power_w: 12.0
        }]
    );

    let close = next_event(&mut events, "websocket_close").await;
    assert!(matches!(
        &*close,
        SenseEvent::WebSocketClose { code: 1000, reason } if reason == "bye"
    ));

    let reconnecting = tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| matches!(s, StreamState::Reconnecting { .. })),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(
        reconnecting,
        StreamState::Reconnecting {
            delay: Duration::from_secs(60)
        }
    );

    monitor.close_stream().await;
    assert_eq!(monitor.stream_state(), StreamState::Closed);
    feed.await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_reports_error_and_backs_off() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let server = MockServer::start().await;
    auth_mock("tok-1").mount(&server).await;

    let mut config = config(&server);
    config.realtime_url = Url::parse(&format!("ws://{addr}/monitors/")).unwrap();
    let monitor = monitor(config);
    let mut events = monitor.subscribe();
    let mut states = monitor.watch_stream_state();

    monitor.authenticate().await.unwrap();
    monitor.open_stream().await.unwrap();

    let event = next_event(&mut events, "websocket_error").await;
    assert!(matches!(
        &*event,
        SenseEvent::WebSocketError {
            error: CoreError::Transport { .. }
        }
    ));

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == StreamState::Reconnecting { delay: Duration::from_secs(30) }),
    )
    .await
    .unwrap()
    .unwrap();

    monitor.shutdown().await;
    assert_eq!(monitor.stream_state(), StreamState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_then_resets_after_open() {
    // Two refused handshakes, then one session that the server closes.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let feed = tokio::spawn(async move {
        for _ in 0..2 {
            let (tcp, _) = listener.accept().await.unwrap();
            drop(tcp);
        }
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let _ = ws.close(None).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    // A fresh cached session, so nothing goes over HTTP.
    let dir = tempfile::tempdir().unwrap();
    AuthCache::new(Some(dir.path())).unwrap().save(&CachedAuth {
        access_token: "tok-cached".into(),
        user_id: None,
        account_id: None,
        monitor_id: Some("1001".into()),
        last_auth_time: Utc::now(),
        monitors: Vec::new(),
    });
    let mut config = ClientConfig::new(Credentials::new(
        "me@example.com",
        SecretString::from("hunter2".to_string()),
    ));
    config.storage_path = Some(dir.path().to_path_buf());
    config.realtime_url = Url::parse(&format!("ws://{addr}/monitors/")).unwrap();
    let monitor = SenseMonitor::new(config).unwrap();
    let mut events = monitor.subscribe();
    let mut states = monitor.watch_stream_state();

    monitor.open_stream().await.unwrap();

    let secs = |n| StreamState::Reconnecting {
        delay: Duration::from_secs(n),
    };
    states.wait_for(|s| *s == secs(30)).await.unwrap();
    // Opening again while a reconnect is pending schedules nothing new.
    monitor.open_stream().await.unwrap();
    states.wait_for(|s| *s == secs(60)).await.unwrap();
    states.wait_for(|s| *s == secs(30)).await.unwrap();

    monitor.close_stream().await;
    assert_eq!(monitor.stream_state(), StreamState::Closed);
    feed.await.unwrap();

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "websocket_error",
            "websocket_error",
            "websocket_open",
            "websocket_close"
        ]
    );
}
