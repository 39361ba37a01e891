#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use hdcore::net::{
    HttpClient, HttpRequest, HttpResponse, Transport, TransportEvent, TransportFactory,
};
use hdcore::types::events::Frame;
use hdcore::types::{Conversation, LastMessage, Message, Participant};
use heydays_rust::client::Client;
use heydays_rust::config::EngineConfig;
use heydays_rust::session::SessionContext;

pub const VIEWER: u64 = 7;
pub const PEER: u64 = 42;

/// Enable `RUST_LOG`-controlled output for a test run.
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn message(id: u64, conversation_id: u64, sender_id: u64, secs: i64) -> Message {
    Message {
        id,
        conversation_id,
        sender_id,
        content: format!("Message {id}"),
        created_at: ts(secs),
    }
}

pub fn frame_bytes(message: &Message) -> Bytes {
    Bytes::from(Frame::encode_message(message).unwrap())
}

pub fn conversation(id: u64, name: &str, last: Option<&Message>, unread: u32) -> Conversation {
    Conversation {
        id,
        name: name.to_string(),
        participants: vec![
            Participant {
                id: PEER,
                name: "Ada".to_string(),
                photo_url: None,
            },
            Participant {
                id: VIEWER,
                name: "Me".to_string(),
                photo_url: None,
            },
        ],
        last_message: last.map(|m| LastMessage {
            message_id: m.id,
            sender_id: m.sender_id,
            sender_name: "Ada".to_string(),
            content: m.content.clone(),
            created_at: m.created_at,
        }),
        unread_count: unread,
    }
}

pub fn conversations_body(conversations: &[Conversation]) -> String {
    serde_json::json!({ "conversations": conversations }).to_string()
}

/// Body of a history response; the server reports newest first, so pass the
/// slice in that order.
pub fn messages_body(newest_first: &[Message]) -> String {
    serde_json::json!({ "messages": newest_first }).to_string()
}

/// Polls a condition until it holds or the test window runs out.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _data: &[u8]) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn disconnect(&self) {}
}

/// Transport factory whose connections are driven by the test: every
/// `create_transport` call hands the test a sender it can push
/// `TransportEvent`s through.
pub struct TestTransportFactory {
    connections: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl TestTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Waits until the `count`-th connection exists and returns its event
    /// sender (1-based).
    pub async fn wait_for_connection(&self, count: usize) -> mpsc::Sender<TransportEvent> {
        for _ in 0..500 {
            {
                let connections = self.connections.lock().unwrap();
                if connections.len() >= count {
                    return connections[count - 1].clone();
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("transport connection {count} was never opened");
    }
}

#[async_trait]
impl TransportFactory for TestTransportFactory {
    async fn create_transport(
        &self,
        _session_token: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let (tx, rx) = mpsc::channel(100);
        tx.send(TransportEvent::Connected).await.ok();
        self.connections.lock().unwrap().push(tx);
        Ok((Arc::new(NullTransport), rx))
    }
}

/// HttpClient returning canned bodies per (method, path fragment) and
/// recording every request it executes.
pub struct MockHttpClient {
    routes: Mutex<Vec<(String, String, u16, String)>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().push((
            method.to_string(),
            path.to_string(),
            status,
            body.to_string(),
        ));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.contains(fragment))
            .count()
    }

    pub fn last_call(&self) -> Option<HttpRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, anyhow::Error> {
        self.calls.lock().unwrap().push(request.clone());
        let routes = self.routes.lock().unwrap();
        // Longest matching fragment wins, so "/conversations" does not
        // swallow "/conversations/3/messages".
        let best = routes
            .iter()
            .filter(|(method, path, _, _)| *method == request.method && request.url.contains(path))
            .max_by_key(|(_, path, _, _)| path.len());
        match best {
            Some((_, _, status, body)) => Ok(HttpResponse {
                status_code: *status,
                body: body.clone().into_bytes(),
            }),
            None => Ok(HttpResponse::empty(404)),
        }
    }
}

pub fn engine(http: Arc<MockHttpClient>, factory: Arc<TestTransportFactory>) -> Arc<Client> {
    Client::new(
        EngineConfig::default(),
        SessionContext::new("test-token", VIEWER),
        http,
        factory,
    )
}
