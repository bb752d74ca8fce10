//! HTTP client for the ResearchAI server.
//!
//! The server keeps the logged-in user and the current conversation in a
//! cookie session, so one `ResearchClient` must be used for login and for
//! every chat call that follows.
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ServerParams;
use crate::history::{messages_from_wire, ChatMessage, SessionEntry, WireMessage};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(StatusCode),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatReply {
    pub reply: Option<String>,
    pub content_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewSession {
    pub reply: Option<String>,
    pub session: Option<SessionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResumedSession {
    pub success: bool,
    pub messages: Vec<ChatMessage>,
}

/// Conversation endpoints used by the sync controller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, text: &str, model: &str) -> Result<ChatReply, ClientError>;
    async fn new_session(&self) -> Result<NewSession, ClientError>;
    async fn resume(&self) -> Result<ResumedSession, ClientError>;
    async fn list_sessions(&self) -> Result<Vec<SessionEntry>, ClientError>;
    async fn load_session(&self, session_id: &str) -> Result<Vec<ChatMessage>, ClientError>;
}

/// Account endpoints. Both answer with a human readable `reply`.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn create_account(&self, username: &str, password: &str) -> Result<String, ClientError>;
    async fn login(&self, username: &str, password: &str) -> Result<String, ClientError>;
}

// --- Wire Structures ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    userinput: &'a str,
    modelname: &'a str,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoadSessionRequest<'a> {
    session_id: &'a str,
}

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    ipfs: Option<String>,
}

#[derive(Deserialize, Default)]
struct NewSessionResponse {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize, Default)]
struct OnloadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    conversations: Option<Vec<WireMessage>>,
}

#[derive(Deserialize, Default)]
struct WireSession {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize, Default)]
struct SessionsResponse {
    #[serde(default)]
    sessions_list: Option<Vec<WireSession>>,
}

#[derive(Deserialize, Default)]
struct SessionChatsResponse {
    #[serde(default)]
    session_chats: Option<Vec<WireMessage>>,
}

#[derive(Deserialize, Default)]
struct ReplyResponse {
    #[serde(default)]
    reply: Option<String>,
}

#[derive(Deserialize, Default)]
struct PingResponse {
    #[serde(default)]
    status: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct ResearchClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl ResearchClient {
    pub fn new(params: &ServerParams) -> Result<Self, ClientError> {
        let base_url = reqwest::Url::parse(params.base_url.trim_end_matches('/'))
            .map_err(|_| ClientError::InvalidBaseUrl(params.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(params.base_url.clone()));
        }

        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(secs) = params.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.endpoint(path))
    }

    /// Sends a request and decodes the JSON body. Every non-2xx status is
    /// the same failure, whatever the body says.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let request = builder.build()?;
        let request_id = Uuid::new_v4();
        debug!(%request_id, method = %request.method(), url = %request.url(), "Sending request");

        let response = self.http.execute(request).await.map_err(|e| {
            warn!(%request_id, error = %e, "Request failed");
            ClientError::from(e)
        })?;
        let status = response.status();
        if !status.is_success() {
            warn!(%request_id, %status, "Server answered with an error status");
            return Err(ClientError::Status(status));
        }

        let body = response.bytes().await?;
        debug!(%request_id, %status, bytes = body.len(), "Received response");
        serde_json::from_slice(&body).map_err(|e| {
            warn!(%request_id, error = %e, "Response body is not the expected JSON");
            ClientError::from(e)
        })
    }

    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<bool, ClientError> {
        let response: PingResponse = self.execute(self.request(Method::GET, "/ping")).await?;
        Ok(response.status.as_deref() == Some("ok"))
    }
}

#[async_trait]
impl ChatBackend for ResearchClient {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn send_chat(&self, text: &str, model: &str) -> Result<ChatReply, ClientError> {
        let body = ChatRequest {
            userinput: text,
            modelname: model,
        };
        let response: ChatResponse = self
            .execute(self.request(Method::POST, "/chat").json(&body))
            .await?;
        Ok(ChatReply {
            reply: non_empty(response.reply),
            content_address: non_empty(response.ipfs),
        })
    }

    #[instrument(skip(self))]
    async fn new_session(&self) -> Result<NewSession, ClientError> {
        let response: NewSessionResponse = self
            .execute(self.request(Method::POST, "/newsession"))
            .await?;
        let session = match (non_empty(response.session_id), non_empty(response.title)) {
            (Some(id), Some(title)) => Some(SessionEntry { id, title }),
            _ => None,
        };
        Ok(NewSession {
            reply: non_empty(response.reply),
            session,
        })
    }

    #[instrument(skip(self))]
    async fn resume(&self) -> Result<ResumedSession, ClientError> {
        let response: OnloadResponse = self
            .execute(self.request(Method::GET, "/onload-check"))
            .await?;
        let messages = match (response.success, response.conversations) {
            (true, Some(conversations)) => messages_from_wire(conversations),
            _ => Vec::new(),
        };
        Ok(ResumedSession {
            success: response.success,
            messages,
        })
    }

    #[instrument(skip(self))]
    async fn list_sessions(&self) -> Result<Vec<SessionEntry>, ClientError> {
        let response: SessionsResponse = self
            .execute(self.request(Method::GET, "/load-sessions"))
            .await?;
        Ok(response
            .sessions_list
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| match (non_empty(s.id), non_empty(s.title)) {
                (Some(id), Some(title)) => Some(SessionEntry { id, title }),
                _ => None,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn load_session(&self, session_id: &str) -> Result<Vec<ChatMessage>, ClientError> {
        let body = LoadSessionRequest { session_id };
        let response: SessionChatsResponse = self
            .execute(self.request(Method::POST, "/load-session-chats").json(&body))
            .await?;
        Ok(messages_from_wire(response.session_chats.unwrap_or_default()))
    }
}

#[async_trait]
impl AccountBackend for ResearchClient {
    #[instrument(skip(self, password))]
    async fn create_account(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let body = Credentials { username, password };
        let response: ReplyResponse = self
            .execute(self.request(Method::POST, "/create-account").json(&body))
            .await?;
        Ok(response.reply.unwrap_or_default())
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let body = Credentials { username, password };
        let response: ReplyResponse = self
            .execute(self.request(Method::POST, "/login-account").json(&body))
            .await?;
        Ok(response.reply.unwrap_or_default())
    }
}
