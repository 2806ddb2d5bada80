mod common;

use std::fs;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use axum::http::{StatusCode, header};
use axum::routing::get;
use common::{ServerBuilder, StreamScript};
use rfscan_engine::Engine;
use rfscan_messages::{
    Command, ConfigUpdate, ConnectionState, Event, ReconnectPolicy, SourceConfig,
};
use tempfile::TempDir;

const FRAME_A: &str = r#"{"frequencies":[100,200,300],"values":[-50,-60,-55]}"#;
const FRAME_B: &str = r#"{"frequencies":[400,500],"values":[-70,-65]}"#;
const FRAME_LATE: &str = r#"{"frequencies":[1],"values":[-99]}"#;

// Test helpers to reduce boilerplate

fn stream_config(server: String) -> SourceConfig {
    SourceConfig::Stream {
        server,
        reconnect: ReconnectPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            multiplier: 2,
            max_attempts: None,
        },
    }
}

fn setup_engine(
    source_config: SourceConfig,
) -> (
    flume::Sender<Command>,
    flume::Receiver<Event>,
    JoinHandle<anyhow::Result<()>>,
) {
    let (cmd_tx, cmd_rx) = flume::unbounded::<Command>();
    let (event_tx, event_rx) = flume::unbounded::<Event>();

    let handle = thread::spawn(move || {
        let engine = Engine::new(cmd_rx, event_tx, source_config);
        engine.run()
    });

    (cmd_tx, event_rx, handle)
}

fn teardown_engine(cmd_tx: flume::Sender<Command>, handle: JoinHandle<anyhow::Result<()>>) {
    cmd_tx.send(Command::Stop).unwrap();
    let result = handle.join().expect("Engine thread should not panic");
    assert!(result.is_ok(), "Engine should stop cleanly: {:?}", result);
}

/// Receive events until `pick` accepts one, skipping everything else.
fn wait_for<T>(event_rx: &flume::Receiver<Event>, mut pick: impl FnMut(Event) -> Option<T>) -> T {
    loop {
        let event = event_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("Timed out waiting for event");
        if let Some(found) = pick(event) {
            return found;
        }
    }
}

fn next_frame_values(event_rx: &flume::Receiver<Event>) -> Vec<f64> {
    wait_for(event_rx, |event| match event {
        Event::Frame(frame) => Some(frame.values),
        _ => None,
    })
}

fn replay_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("scan_20250301_120000.json"),
        r#"{"timestamp":"20250301_120000","frequencies":[518000000,518500000],"power_levels":[-88.0,-72.5]}"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_engine_construction() {
    let (cmd_tx, cmd_rx) = flume::unbounded::<Command>();
    let (event_tx, event_rx) = flume::unbounded::<Event>();

    // Construct engine - should not panic or connect anywhere
    let _engine = Engine::new(cmd_rx, event_tx, SourceConfig::default());

    drop(cmd_tx);
    assert!(event_rx.is_empty());
}

fn quiet_stream() -> StreamScript {
    StreamScript::new().hold_open()
}

#[test]
fn test_engine_sends_state_snapshot() {
    let server = ServerBuilder::new().stream(quiet_stream()).spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url.clone()));

    let first_event = event_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("Should receive StateSnapshot");

    match first_event {
        Event::StateSnapshot(state) => {
            assert_eq!(state.endpoint, format!("{}/scan/stream", server.url));
            assert_eq!(state.source_config, stream_config(server.url));
        }
        _ => panic!("First event should be StateSnapshot, got {:?}", first_event),
    }

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_forwards_stream_frames_in_order() {
    let server = ServerBuilder::new()
        .stream(StreamScript::new().event(FRAME_A).event(FRAME_B).hold_open())
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    assert_eq!(next_frame_values(&event_rx), vec![-50.0, -60.0, -55.0]);
    assert_eq!(next_frame_values(&event_rx), vec![-70.0, -65.0]);

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_sends_event_stream_headers() {
    let server = ServerBuilder::new()
        .stream(StreamScript::new().event(FRAME_A).with_id("42"))
        .stream(StreamScript::new().event(FRAME_B).hold_open())
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url.clone()));

    assert_eq!(next_frame_values(&event_rx), vec![-50.0, -60.0, -55.0]);
    assert_eq!(next_frame_values(&event_rx), vec![-70.0, -65.0]);
    teardown_engine(cmd_tx, handle);

    let requests = server.stream_requests();
    assert!(requests.len() >= 2);
    assert_eq!(requests[0][header::ACCEPT], "text/event-stream");
    assert_eq!(requests[0][header::CACHE_CONTROL], "no-cache");
    assert!(requests[0].get("last-event-id").is_none());
    assert_eq!(requests[1]["last-event-id"], "42");
}

#[test]
fn test_engine_reports_decode_failures() {
    let server = ServerBuilder::new()
        .stream(StreamScript::new().event("not json").event(FRAME_A).hold_open())
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    let message = wait_for(&event_rx, |event| match event {
        Event::DecodeFailed(message) => Some(message),
        _ => None,
    });
    assert!(message.contains("malformed"));
    assert_eq!(next_frame_values(&event_rx), vec![-50.0, -60.0, -55.0]);

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_reconnects_after_drop() {
    let server = ServerBuilder::new()
        .stream(StreamScript::new().event(FRAME_A))
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    // The server closes after one frame, so the same frame comes back after
    // every reconnect.
    next_frame_values(&event_rx);
    wait_for(&event_rx, |event| match event {
        Event::Connection(ConnectionState::Reconnecting { attempt, .. }) => Some(attempt),
        _ => None,
    });
    assert_eq!(next_frame_values(&event_rx), vec![-50.0, -60.0, -55.0]);

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_rejects_non_event_stream() {
    let server = ServerBuilder::new()
        .route(
            "/scan/stream",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
        )
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    wait_for(&event_rx, |event| match event {
        Event::Connection(ConnectionState::Reconnecting { .. }) => Some(()),
        Event::Frame(_) => panic!("No frame should be produced"),
        _ => None,
    });

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_change_source_to_replay() {
    let server = ServerBuilder::new().stream(quiet_stream()).spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));
    let dir = replay_dir();

    cmd_tx
        .send(Command::ChangeSource(SourceConfig::Replay {
            dir: dir.path().to_path_buf(),
            interval: Duration::from_millis(10),
        }))
        .unwrap();

    let endpoint = wait_for(&event_rx, |event| match event {
        Event::StateSnapshot(state) if state.endpoint.starts_with("replay") => {
            Some(state.endpoint)
        }
        _ => None,
    });
    assert!(endpoint.contains(&dir.path().display().to_string()));
    assert_eq!(next_frame_values(&event_rx), vec![-88.0, -72.5]);

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_old_stream_is_silent_after_source_change() {
    // One sweep, then a long pause before the next, as a real scanner does.
    let server = ServerBuilder::new()
        .stream(
            StreamScript::new()
                .event(FRAME_A)
                .event_after(Duration::from_millis(1500), FRAME_LATE)
                .hold_open(),
        )
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));
    let dir = replay_dir();

    next_frame_values(&event_rx);
    let changed_at = Instant::now();
    cmd_tx
        .send(Command::ChangeSource(SourceConfig::Replay {
            dir: dir.path().to_path_buf(),
            interval: Duration::from_millis(50),
        }))
        .unwrap();

    // The old subscription is reported closed before the new source opens.
    wait_for(&event_rx, |event| match event {
        Event::Connection(ConnectionState::Closed) => Some(()),
        Event::StateSnapshot(_) => panic!("Source reopened before the old one closed"),
        _ => None,
    });
    wait_for(&event_rx, |event| match event {
        Event::StateSnapshot(_) => Some(()),
        _ => None,
    });

    let mut replay_frames = 0;
    while changed_at.elapsed() < Duration::from_secs(3) {
        match event_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Event::Frame(frame)) => {
                assert_ne!(frame.values, vec![-99.0], "Frame from the old stream");
                replay_frames += 1;
            }
            Ok(Event::Connection(ConnectionState::Closed)) => {
                panic!("Old stream reported a state after the source changed")
            }
            _ => {}
        }
    }
    assert!(replay_frames > 0);

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_scan_control_round_trip() {
    let server = ServerBuilder::new()
        .stream(quiet_stream())
        .post_json(
            "/scan/start",
            StatusCode::OK,
            r#"{"status":"Scan started, check logs for output."}"#,
        )
        .post_json(
            "/scan/stop",
            StatusCode::BAD_REQUEST,
            r#"{"error":"No active scan to stop."}"#,
        )
        .get_json(
            "/status",
            StatusCode::OK,
            r#"{"city":"Austin","selected_band":"G50","available_bands":["G50","H22"]}"#,
        )
        .get_json(
            "/scan/latest",
            StatusCode::OK,
            r#"{"timestamp":"x","frequencies":[470000000],"power_levels":[-60.0]}"#,
        )
        .get_json(
            "/scan/logs",
            StatusCode::OK,
            r#"[{"timestamp":"b","frequencies":[470000000],"power_levels":[-61.0]},
                {"timestamp":"a","frequencies":[470000000],"power_levels":[-59.0]}]"#,
        )
        .post_json(
            "/update-config",
            StatusCode::OK,
            r#"{"status":"Configuration updated successfully!"}"#,
        )
        .spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    let control_result = |event_rx: &flume::Receiver<Event>| {
        wait_for(event_rx, |event| match event {
            Event::ControlResult(result) => Some(result),
            _ => None,
        })
    };
    let server_status = |event_rx: &flume::Receiver<Event>| {
        wait_for(event_rx, |event| match event {
            Event::ServerStatus(status) => Some(status),
            _ => None,
        })
    };

    cmd_tx.send(Command::StartScan).unwrap();
    assert_eq!(
        control_result(&event_rx),
        Ok("Scan started, check logs for output.".to_string())
    );

    cmd_tx.send(Command::StopScan).unwrap();
    assert_eq!(
        control_result(&event_rx),
        Err("No active scan to stop.".to_string())
    );

    cmd_tx.send(Command::RefreshStatus).unwrap();
    assert_eq!(server_status(&event_rx).city.as_deref(), Some("Austin"));

    cmd_tx.send(Command::FetchLatest).unwrap();
    let frame = wait_for(&event_rx, |event| match event {
        Event::Frame(frame) => Some(frame),
        _ => None,
    });
    assert_eq!(frame.frequencies, vec![470.0]);
    assert_eq!(frame.values, vec![-60.0]);

    cmd_tx.send(Command::FetchRecentLogs).unwrap();
    let logs = wait_for(&event_rx, |event| match event {
        Event::RecentLogs(frames) => Some(frames),
        _ => None,
    });
    let values: Vec<_> = logs.iter().map(|f| f.values[0]).collect();
    assert_eq!(values, vec![-59.0, -61.0]);

    // A config change is followed by the refreshed status document.
    cmd_tx
        .send(Command::UpdateConfig(ConfigUpdate {
            selected_band: Some("H22".to_string()),
            test_mode: None,
        }))
        .unwrap();
    assert_eq!(
        control_result(&event_rx),
        Ok("Configuration updated successfully!".to_string())
    );
    assert_eq!(
        server_status(&event_rx).available_bands,
        vec!["G50", "H22"]
    );

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_stop_is_not_held_up_by_slow_scanner() {
    let server = ServerBuilder::new()
        .stream(quiet_stream())
        .route(
            "/status",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        )
        .spawn();
    let (cmd_tx, _event_rx, handle) = setup_engine(stream_config(server.url));

    cmd_tx.send(Command::RefreshStatus).unwrap();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    teardown_engine(cmd_tx, handle);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_scan_control_without_server() {
    let dir = replay_dir();
    let (cmd_tx, event_rx, handle) = setup_engine(SourceConfig::Replay {
        dir: dir.path().to_path_buf(),
        interval: Duration::from_millis(10),
    });

    cmd_tx.send(Command::StartScan).unwrap();
    let result = wait_for(&event_rx, |event| match event {
        Event::ControlResult(result) => Some(result),
        _ => None,
    });
    assert!(result.is_err());

    teardown_engine(cmd_tx, handle);
}

#[test]
fn test_engine_stops_when_ui_disconnects() {
    let server = ServerBuilder::new().stream(quiet_stream()).spawn();
    let (cmd_tx, event_rx, handle) = setup_engine(stream_config(server.url));

    thread::sleep(Duration::from_millis(100));
    drop(event_rx);
    drop(cmd_tx);

    let result = handle.join();
    assert!(result.is_ok(), "Engine thread should not panic");
}
