use std::sync::Arc;

use hdcore::net::{HttpClient, HttpRequest, HttpResponse};
use hdcore::types::{Conversation, ConversationId, Message, UserId};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::session::SessionContext;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport unreachable or timed out. Not retried here; one-shot
    /// fetches surface this to the caller.
    #[error("network error: {0}")]
    Network(#[source] anyhow::Error),
    /// Token missing or rejected. Fatal to the current session view; the
    /// caller must re-authenticate upstream.
    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },
    #[error("resource not found")]
    NotFound,
    #[error("server returned status {status}")]
    Status { status: u16 },
    #[error("undecodable response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ConversationsBody {
    #[serde(default)]
    conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
struct MessagesBody {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ConversationIdBody {
    conversation_id: ConversationId,
}

/// Stateless request/response client for the conversation API. One call in,
/// one result or failure out; nothing here retries or holds state beyond
/// the session context it was built with.
#[derive(Clone)]
pub struct ChatApi {
    http: Arc<dyn HttpClient>,
    session: SessionContext,
    base_url: String,
}

impl ChatApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        config: &EngineConfig,
        session: SessionContext,
    ) -> Self {
        Self {
            http,
            session,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let request = request.with_header("Authorization", self.session.bearer());
        let response = self.http.execute(request).await.map_err(ApiError::Network)?;
        match response.status_code {
            _ if response.is_success() => Ok(response),
            401 | 403 => Err(ApiError::Auth {
                status: response.status_code,
            }),
            404 => Err(ApiError::NotFound),
            status => Err(ApiError::Status { status }),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let response = self.execute(HttpRequest::get(url)).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn post_json(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest::post(url)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string().into_bytes());
        self.execute(request).await
    }

    /// Fetches the conversations visible to the session user.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let body: ConversationsBody = self
            .get_json(format!("{}/conversations", self.base_url))
            .await?;
        debug!(target: "Api", "fetched {} conversations", body.conversations.len());
        Ok(body.conversations)
    }

    /// Fetches one conversation with its participants.
    pub async fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ApiError> {
        self.get_json(format!("{}/conversations/{}", self.base_url, conversation_id))
            .await
    }

    /// Fetches a conversation's history. The server reports newest first;
    /// the result is reversed into ascending `(created_at, id)` order.
    pub async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError> {
        self.get_messages_page(conversation_id, None).await
    }

    /// Same as [`ChatApi::get_messages`] for one explicit page of history.
    pub async fn get_messages_page(
        &self,
        conversation_id: ConversationId,
        page: Option<(u32, u32)>,
    ) -> Result<Vec<Message>, ApiError> {
        let mut url = format!(
            "{}/conversations/{}/messages",
            self.base_url, conversation_id
        );
        if let Some((page, limit)) = page {
            url.push_str(&format!("?page={page}&limit={limit}"));
        }
        let body: MessagesBody = self.get_json(url).await?;
        let mut messages = body.messages;
        messages.reverse();
        debug!(
            target: "Api",
            "fetched {} messages for conversation {}",
            messages.len(),
            conversation_id
        );
        Ok(messages)
    }

    /// Submits a message. A 2xx means the server accepted it; the message
    /// itself reaches the views through its echo frame on the push channel.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<(), ApiError> {
        self.post_json(
            format!("{}/conversations/send", self.base_url),
            json!({ "conversation_id": conversation_id, "content": content }),
        )
        .await?;
        Ok(())
    }

    /// Opens (or finds) the direct conversation with another user.
    pub async fn open_direct(&self, user_id: UserId) -> Result<ConversationId, ApiError> {
        let response = self
            .post_json(
                format!("{}/conversations/direct", self.base_url),
                json!({ "user_id": user_id }),
            )
            .await?;
        let body: ConversationIdBody = serde_json::from_slice(&response.body)?;
        Ok(body.conversation_id)
    }

    /// Creates a group conversation with the given members.
    pub async fn create_group(
        &self,
        name: &str,
        user_ids: &[UserId],
    ) -> Result<ConversationId, ApiError> {
        let response = self
            .post_json(
                format!("{}/conversations/group", self.base_url),
                json!({ "name": name, "user_ids": user_ids }),
            )
            .await?;
        let body: ConversationIdBody = serde_json::from_slice(&response.body)?;
        Ok(body.conversation_id)
    }
}
