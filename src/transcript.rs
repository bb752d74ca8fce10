//! Transcript state and the surface it is drawn on.
use std::time::Duration;

use crate::config::GatewayParams;
use crate::directory::SessionDirectory;
use crate::history::{ChatMessage, Role};

pub const USER_SCROLL_DELAY: Duration = Duration::from_millis(50);
pub const ASSISTANT_SCROLL_DELAY: Duration = Duration::from_millis(100);
pub const REPLAY_SCROLL_DELAY: Duration = Duration::from_millis(200);

pub const EMPTY_STATE_TITLE: &str = "Welcome to ResearchAI";
pub const EMPTY_STATE_BODY: &str = "Start a conversation by typing a message below. I'm here to help you with any questions or tasks you might have.";

/// Where a rendered message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Typed by the user or answered during this run.
    Live,
    /// Replayed from the server's log.
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    Immediate,
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub mode: ScrollMode,
    pub delay: Duration,
}

impl ScrollRequest {
    pub fn for_live(role: Role) -> Self {
        match role {
            Role::User => Self {
                mode: ScrollMode::Immediate,
                delay: USER_SCROLL_DELAY,
            },
            _ => Self {
                mode: ScrollMode::Smooth,
                delay: ASSISTANT_SCROLL_DELAY,
            },
        }
    }

    pub fn after_replay() -> Self {
        Self {
            mode: ScrollMode::Immediate,
            delay: REPLAY_SCROLL_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    /// Gateway URL behind the verify affordance.
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient message shown outside the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub ttl: Duration,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            level,
            text: text.into(),
            ttl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyAction {
    Send,
    NewSession,
}

/// Output side of the chat screen.
pub trait ChatSurface: Send {
    fn entry_appended(&mut self, index: usize, entry: &TranscriptEntry);
    fn transcript_cleared(&mut self);
    fn empty_state_shown(&mut self);
    fn scroll_to_end(&mut self, request: ScrollRequest);
    fn directory_changed(&mut self, directory: &SessionDirectory);
    fn notice(&mut self, notice: &Notice);
    fn set_busy(&mut self, _action: BusyAction, _busy: bool) {}
}

#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    empty_state: bool,
    gateway: GatewayParams,
}

impl Transcript {
    pub fn new(gateway: GatewayParams) -> Self {
        Self {
            entries: Vec::new(),
            empty_state: false,
            gateway,
        }
    }

    pub fn render(&mut self, message: ChatMessage, origin: Origin, surface: &mut dyn ChatSurface) {
        let verify_url = match (&message.role, &message.content_address) {
            (Role::Assistant, Some(handle)) => Some(self.gateway.url_for(handle)),
            _ => None,
        };
        let role = message.role;
        self.empty_state = false;
        self.entries.push(TranscriptEntry {
            message,
            verify_url,
        });

        let index = self.entries.len() - 1;
        surface.entry_appended(index, &self.entries[index]);
        if origin == Origin::Live {
            surface.scroll_to_end(ScrollRequest::for_live(role));
        }
    }

    pub fn clear(&mut self, surface: &mut dyn ChatSurface) {
        self.entries.clear();
        self.empty_state = false;
        surface.transcript_cleared();
    }

    pub fn show_empty_state(&mut self, surface: &mut dyn ChatSurface) {
        self.empty_state = true;
        surface.empty_state_shown();
    }

    pub fn scroll_to_end(&self, request: ScrollRequest, surface: &mut dyn ChatSurface) {
        surface.scroll_to_end(request);
    }

    /// True when no message is displayed; the placeholder does not count.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn shows_empty_state(&self) -> bool {
        self.empty_state
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Handle behind the verify affordance of the 1-based `position`.
    pub fn verify_handle(&self, position: usize) -> Option<&str> {
        let entry = self.entries.get(position.checked_sub(1)?)?;
        entry.verify_url.as_ref()?;
        entry.message.content_address.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Surface that records every call for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub events: Vec<SurfaceEvent>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SurfaceEvent {
        Appended(usize, TranscriptEntry),
        Cleared,
        EmptyState,
        Scroll(ScrollRequest),
        Directory(Vec<crate::history::SessionEntry>, bool),
        Notice(Notice),
        Busy(BusyAction, bool),
    }

    impl ChatSurface for RecordingSurface {
        fn entry_appended(&mut self, index: usize, entry: &TranscriptEntry) {
            self.events.push(SurfaceEvent::Appended(index, entry.clone()));
        }
        fn transcript_cleared(&mut self) {
            self.events.push(SurfaceEvent::Cleared);
        }
        fn empty_state_shown(&mut self) {
            self.events.push(SurfaceEvent::EmptyState);
        }
        fn scroll_to_end(&mut self, request: ScrollRequest) {
            self.events.push(SurfaceEvent::Scroll(request));
        }
        fn directory_changed(&mut self, directory: &SessionDirectory) {
            self.events.push(SurfaceEvent::Directory(
                directory.entries().to_vec(),
                directory.load_failed(),
            ));
        }
        fn notice(&mut self, notice: &Notice) {
            self.events.push(SurfaceEvent::Notice(notice.clone()));
        }
        fn set_busy(&mut self, action: BusyAction, busy: bool) {
            self.events.push(SurfaceEvent::Busy(action, busy));
        }
    }

    #[test]
    fn live_user_message_scrolls_immediately() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());

        transcript.render(ChatMessage::user("hi"), Origin::Live, &mut surface);

        assert_eq!(
            surface.events[1],
            SurfaceEvent::Scroll(ScrollRequest {
                mode: ScrollMode::Immediate,
                delay: USER_SCROLL_DELAY,
            })
        );
    }

    #[test]
    fn live_assistant_message_scrolls_smoothly() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());

        transcript.render(ChatMessage::assistant("hello", None), Origin::Live, &mut surface);

        assert_eq!(
            surface.events[1],
            SurfaceEvent::Scroll(ScrollRequest {
                mode: ScrollMode::Smooth,
                delay: ASSISTANT_SCROLL_DELAY,
            })
        );
    }

    #[test]
    fn replayed_messages_do_not_scroll() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());

        transcript.render(ChatMessage::user("a"), Origin::Replay, &mut surface);
        transcript.render(ChatMessage::assistant("b", None), Origin::Replay, &mut surface);

        assert!(surface
            .events
            .iter()
            .all(|e| matches!(e, SurfaceEvent::Appended(..))));
    }

    #[test]
    fn assistant_handle_gets_gateway_affordance() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());

        transcript.render(
            ChatMessage::assistant("hello", Some("bafy123".into())),
            Origin::Live,
            &mut surface,
        );

        let entry = &transcript.entries()[0];
        assert_eq!(
            entry.verify_url.as_deref(),
            Some("https://gateway.lighthouse.storage/ipfs/bafy123")
        );
        assert_eq!(transcript.verify_handle(1), Some("bafy123"));
        assert_eq!(transcript.verify_handle(0), None);
        assert_eq!(transcript.verify_handle(2), None);
    }

    #[test]
    fn user_messages_never_carry_an_affordance() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());
        let mut message = ChatMessage::user("hi");
        message.content_address = Some("bafy".into());

        transcript.render(message, Origin::Live, &mut surface);

        assert!(transcript.entries()[0].verify_url.is_none());
        assert_eq!(transcript.verify_handle(1), None);
    }

    #[test]
    fn placeholder_does_not_make_transcript_non_empty() {
        let mut surface = RecordingSurface::default();
        let mut transcript = Transcript::new(GatewayParams::default());

        transcript.show_empty_state(&mut surface);
        assert!(transcript.is_empty());
        assert!(transcript.shows_empty_state());

        transcript.render(ChatMessage::user("hi"), Origin::Live, &mut surface);
        assert!(!transcript.shows_empty_state());

        transcript.clear(&mut surface);
        assert!(transcript.is_empty());
        assert!(!transcript.shows_empty_state());
    }
}
