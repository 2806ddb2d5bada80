#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::routing::{MethodRouter, get, post};
use futures_util::stream::{self, BoxStream, StreamExt};

/// One event the scan stream sends, after waiting `delay`.
#[derive(Debug, Clone)]
pub struct ScriptedEvent {
    pub delay: Duration,
    pub id: Option<&'static str>,
    pub data: String,
}

/// What one connection to `/scan/stream` receives.
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    events: Vec<ScriptedEvent>,
    hold_open: bool,
}

impl StreamScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(self, data: &str) -> Self {
        self.event_after(Duration::ZERO, data)
    }

    pub fn event_after(mut self, delay: Duration, data: &str) -> Self {
        self.events.push(ScriptedEvent {
            delay,
            id: None,
            data: data.to_string(),
        });
        self
    }

    /// Tag the last event with an id.
    pub fn with_id(mut self, id: &'static str) -> Self {
        if let Some(event) = self.events.last_mut() {
            event.id = Some(id);
        }
        self
    }

    /// Keep the connection open and silent after the last event instead of closing it.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

struct StreamState {
    scripts: Vec<StreamScript>,
    connections: AtomicUsize,
    requests: Arc<Mutex<Vec<HeaderMap>>>,
}

/// The n-th connection plays the n-th script; later ones repeat the last.
async fn scan_stream(
    State(state): State<Arc<StreamState>>,
    headers: HeaderMap,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    state.requests.lock().unwrap().push(headers);
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    let script = state.scripts[index.min(state.scripts.len() - 1)].clone();

    let events = stream::iter(script.events).then(|scripted| async move {
        tokio::time::sleep(scripted.delay).await;
        let mut event = Event::default().data(scripted.data);
        if let Some(id) = scripted.id {
            event = event.id(id);
        }
        Ok::<_, Infallible>(event)
    });

    if script.hold_open {
        Sse::new(events.chain(stream::pending()).boxed())
    } else {
        Sse::new(events.boxed())
    }
}

/// Builds a scanner server for tests. Unrouted paths answer 404.
pub struct ServerBuilder {
    router: Router,
    scripts: Vec<StreamScript>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            scripts: Vec::new(),
        }
    }

    /// Serve `script` to the next connection to `/scan/stream`.
    pub fn stream(mut self, script: StreamScript) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn get_json(self, path: &str, status: StatusCode, body: &'static str) -> Self {
        let reply = move || async move { (status, [(header::CONTENT_TYPE, "application/json")], body) };
        self.route(path, get(reply))
    }

    pub fn post_json(self, path: &str, status: StatusCode, body: &'static str) -> Self {
        let reply = move || async move { (status, [(header::CONTENT_TYPE, "application/json")], body) };
        self.route(path, post(reply))
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Serve on a local port until the test process exits.
    pub fn spawn(self) -> TestServer {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut router = self.router;
        if !self.scripts.is_empty() {
            let state = Arc::new(StreamState {
                scripts: self.scripts,
                connections: AtomicUsize::new(0),
                requests: requests.clone(),
            });
            router = router.merge(
                Router::new()
                    .route("/scan/stream", get(scan_stream))
                    .with_state(state),
            );
        }

        let (addr_tx, addr_rx) = flume::bounded(1);
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });
        let addr = addr_rx.recv().unwrap();

        TestServer {
            url: format!("http://{}", addr),
            stream_requests: requests,
        }
    }
}

pub struct TestServer {
    pub url: String,
    stream_requests: Arc<Mutex<Vec<HeaderMap>>>,
}

impl TestServer {
    /// Headers of every request to `/scan/stream` so far.
    pub fn stream_requests(&self) -> Vec<HeaderMap> {
        self.stream_requests.lock().unwrap().clone()
    }
}
