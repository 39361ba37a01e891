use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An event produced by the push transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// Raw data has been received from the server.
    DataReceived(Bytes),
    /// The connection was lost.
    Disconnected,
}

/// Represents an active push connection. The transport is a dumb pipe for
/// payloads with no knowledge of frame contents.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends raw data to the server.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances, one per
/// (re)connection attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a connection addressed by the session token and returns it
    /// along with the stream of events it produces.
    async fn create_transport(
        &self,
        session_token: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)>;
}

/// A simple structure to represent an HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: String, // "GET" or "POST"
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// A simple structure for the HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with an empty body and the given status code.
    /// Useful for mock or placeholder responses.
    pub fn empty(status_code: u16) -> Self {
        Self {
            status_code,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Consumes the response and reads the body as UTF-8.
    pub fn body_string(self) -> Result<String> {
        Ok(String::from_utf8(self.body)?)
    }
}

/// Trait for executing HTTP requests in a runtime-agnostic way
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a given HTTP request and returns the response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
