//! Keeps the transcript and session directory in step with the server log.
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::client::ChatBackend;
use crate::config::{GatewayParams, DEFAULT_MODEL};
use crate::directory::{Placement, SessionDirectory};
use crate::history::ChatMessage;
use crate::transcript::{
    BusyAction, ChatSurface, Notice, NoticeLevel, Origin, ScrollRequest, Transcript,
};

pub const SESSION_NOTICE_TTL: Duration = Duration::from_secs(3);

pub const REPLY_ERROR_TEXT: &str = "Sorry, I encountered an error processing your request.";
pub const NETWORK_ERROR_TEXT: &str = "Sorry, I encountered a network error. Please try again.";
pub const LOAD_SESSION_ERROR_TEXT: &str = "Failed to load session messages. Please try again.";
pub const ALREADY_NEW_SESSION_TEXT: &str = "You already have a new session";
pub const NEW_SESSION_DEFAULT_TEXT: &str = "New session started";
pub const NEW_SESSION_ERROR_TEXT: &str = "Failed to create new session. Please try again.";

/// What happened to a message handed to [`ChatSync::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored,
    Replied,
    Failed,
}

pub struct ChatSync<B, S> {
    backend: B,
    surface: S,
    transcript: Transcript,
    directory: SessionDirectory,
    model: String,
    active_session: Option<String>,
}

impl<B: ChatBackend, S: ChatSurface> ChatSync<B, S> {
    pub fn new(backend: B, surface: S, gateway: GatewayParams) -> Self {
        Self {
            backend,
            surface,
            transcript: Transcript::new(gateway),
            directory: SessionDirectory::new(),
            model: DEFAULT_MODEL.to_string(),
            active_session: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.set_model(model);
        self
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Page activation: last session first, then the session list.
    pub async fn activate(&mut self) {
        self.resume().await;
        self.list_sessions().await;
    }

    /// Restores the last active session. Failures only reach the log.
    #[instrument(skip(self))]
    pub async fn resume(&mut self) {
        match self.backend.resume().await {
            Ok(resumed) if resumed.success && !resumed.messages.is_empty() => {
                info!(messages = resumed.messages.len(), "Resumed previous session");
                self.transcript.clear(&mut self.surface);
                self.replay(resumed.messages);
            }
            Ok(_) => {
                debug!("No previous session to resume");
                self.transcript.clear(&mut self.surface);
                self.transcript.show_empty_state(&mut self.surface);
            }
            Err(e) => {
                warn!(error = %e, "Error loading previous session");
                self.transcript.show_empty_state(&mut self.surface);
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_sessions(&mut self) {
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                info!(sessions = sessions.len(), "Loaded session list");
                self.directory.replace_all(sessions);
            }
            Err(e) => {
                warn!(error = %e, "Error loading sessions");
                self.directory.mark_load_failed();
            }
        }
        self.surface.directory_changed(&self.directory);
    }

    /// Replaces the transcript with one session's log. Unlike
    /// [`resume`](Self::resume), a failure is shown inline.
    #[instrument(skip(self))]
    pub async fn load_session(&mut self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        self.transcript.clear(&mut self.surface);
        self.active_session = Some(session_id.to_string());

        match self.backend.load_session(session_id).await {
            Ok(messages) if messages.is_empty() => {
                self.transcript.show_empty_state(&mut self.surface);
            }
            Ok(messages) => {
                info!(messages = messages.len(), "Loaded session");
                self.replay(messages);
            }
            Err(e) => {
                warn!(error = %e, "Error loading session chats");
                self.transcript.render(
                    ChatMessage::system(LOAD_SESSION_ERROR_TEXT),
                    Origin::Live,
                    &mut self.surface,
                );
            }
        }
    }

    /// Loads the directory entry at the 1-based `position`.
    pub async fn load_selected(&mut self, position: usize) -> bool {
        let Some(entry) = self.directory.select(position) else {
            return false;
        };
        let session_id = entry.id.clone();
        self.load_session(&session_id).await;
        true
    }

    /// Shows the user's message at once, then the server's answer. The
    /// user's message stays even when the request fails.
    #[instrument(skip(self, text))]
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        self.transcript
            .render(ChatMessage::user(text), Origin::Live, &mut self.surface);
        self.surface.set_busy(BusyAction::Send, true);

        let outcome = match self.backend.send_chat(text, &self.model).await {
            Ok(reply) => match reply.reply {
                Some(answer) => {
                    self.transcript.render(
                        ChatMessage::assistant(answer, reply.content_address),
                        Origin::Live,
                        &mut self.surface,
                    );
                    SendOutcome::Replied
                }
                None => {
                    warn!("Chat response carried no reply");
                    self.transcript.render(
                        ChatMessage::assistant(REPLY_ERROR_TEXT, None),
                        Origin::Live,
                        &mut self.surface,
                    );
                    SendOutcome::Failed
                }
            },
            Err(e) => {
                warn!(error = %e, "Error sending message");
                self.transcript.render(
                    ChatMessage::assistant(NETWORK_ERROR_TEXT, None),
                    Origin::Live,
                    &mut self.surface,
                );
                SendOutcome::Failed
            }
        };

        self.surface.set_busy(BusyAction::Send, false);
        outcome
    }

    /// Starts a new server session unless the transcript is already empty.
    #[instrument(skip(self))]
    pub async fn new_session(&mut self) -> bool {
        if self.transcript.is_empty() {
            self.notify(NoticeLevel::Info, ALREADY_NEW_SESSION_TEXT);
            return false;
        }

        self.surface.set_busy(BusyAction::NewSession, true);
        let created = match self.backend.new_session().await {
            Ok(created) => {
                let text = created
                    .reply
                    .unwrap_or_else(|| NEW_SESSION_DEFAULT_TEXT.to_string());
                self.notify(NoticeLevel::Success, text);
                self.transcript.clear(&mut self.surface);
                self.transcript.show_empty_state(&mut self.surface);

                if let Some(session) = created.session {
                    info!(session_id = %session.id, "Created session");
                    self.active_session = Some(session.id.clone());
                    if self.directory.add(session, Placement::Front) {
                        self.surface.directory_changed(&self.directory);
                    }
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Error creating new session");
                self.notify(NoticeLevel::Error, NEW_SESSION_ERROR_TEXT);
                false
            }
        };
        self.surface.set_busy(BusyAction::NewSession, false);
        created
    }

    fn replay(&mut self, messages: Vec<ChatMessage>) {
        for message in messages {
            self.transcript
                .render(message, Origin::Replay, &mut self.surface);
        }
        self.transcript
            .scroll_to_end(ScrollRequest::after_replay(), &mut self.surface);
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.surface
            .notice(&Notice::new(level, text, SESSION_NOTICE_TTL));
    }
}
