//! Line-oriented chat surface and command parsing for the terminal.
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::fmt;
use std::io::Write;
use std::time::Instant;
use tracing::warn;

use crate::directory::{SessionDirectory, LOAD_FAILED_LABEL};
use crate::history::Role;
use crate::transcript::{
    BusyAction, ChatSurface, Notice, NoticeLevel, ScrollRequest, TranscriptEntry,
    EMPTY_STATE_BODY, EMPTY_STATE_TITLE,
};

pub const HELP_TEXT: &str = "\
Commands:
  <text>        send a message
  /new          start a new session
  /sessions     list saved sessions
  /open <n>     load session n
  /verify <n>   open the verified copy of message n
  /model <id>   switch model
  /help         show this help
  /quit         exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    NewSession,
    Sessions,
    Open(usize),
    Verify(usize),
    Model(String),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parses one input line. Anything not starting with `/` is a message.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let position = || arg.parse::<usize>().ok().filter(|n| *n > 0);

    match name {
        "new" => Command::NewSession,
        "sessions" => Command::Sessions,
        "open" => position().map_or_else(|| Command::Unknown(line.to_string()), Command::Open),
        "verify" => position().map_or_else(|| Command::Unknown(line.to_string()), Command::Verify),
        "model" if !arg.is_empty() => Command::Model(arg.to_string()),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Drops control characters so server text cannot drive the terminal.
/// Newlines and tabs survive.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Result of feeding one key to a hidden input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    /// A character was added; echo one mask symbol.
    Pushed,
    /// The last character was removed; erase one mask symbol.
    Popped,
    Ignored,
    Submit,
    Cancel,
}

/// Applies a key press to a password being typed with echo off.
pub fn edit_secret(buffer: &mut String, key: &KeyEvent) -> SecretKey {
    if key.kind == KeyEventKind::Release {
        return SecretKey::Ignored;
    }
    match key.code {
        KeyCode::Enter => SecretKey::Submit,
        KeyCode::Esc => SecretKey::Cancel,
        KeyCode::Char('c') | KeyCode::Char('d')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            SecretKey::Cancel
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            SecretKey::Pushed
        }
        KeyCode::Backspace => match buffer.pop() {
            Some(_) => SecretKey::Popped,
            None => SecretKey::Ignored,
        },
        _ => SecretKey::Ignored,
    }
}

/// Writes the transcript as numbered blocks. Notices are not printed
/// inline; they ride on the prompt until their lifetime runs out.
pub struct TerminalSurface<W> {
    out: W,
    status: Option<(Notice, Instant)>,
    write_failed: bool,
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            status: None,
            write_failed: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints a line outside the transcript.
    pub fn line(&mut self, text: &str) {
        self.emit(format_args!("{text}"));
    }

    /// True once a write to the terminal has failed.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// The latest notice, while it is still live.
    pub fn status(&self) -> Option<String> {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> Option<String> {
        let (notice, expires) = self.status.as_ref()?;
        if now >= *expires {
            return None;
        }
        let marker = match notice.level {
            NoticeLevel::Info => "i",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        Some(format!("({marker}) {}", sanitize(&notice.text)))
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        let written = self
            .out
            .write_fmt(args)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            if !self.write_failed {
                warn!(error = %e, "Terminal write failed");
                self.write_failed = true;
            }
        }
    }
}

impl<W: Write + Send> ChatSurface for TerminalSurface<W> {
    fn entry_appended(&mut self, index: usize, entry: &TranscriptEntry) {
        let message = &entry.message;
        let label = match message.role {
            Role::System => "!",
            role => role.label(),
        };
        self.emit(format_args!("\n[{}] {label}", index + 1));
        self.emit(format_args!("{}", sanitize(&message.content)));
        if let Some(url) = &entry.verify_url {
            self.emit(format_args!("  verify: /verify {}  ({url})", index + 1));
        }
    }

    fn transcript_cleared(&mut self) {
        self.emit(format_args!("\n----------------------------------------"));
    }

    fn empty_state_shown(&mut self) {
        self.emit(format_args!("\n{EMPTY_STATE_TITLE}\n{EMPTY_STATE_BODY}"));
    }

    fn scroll_to_end(&mut self, _request: ScrollRequest) {}

    /// Entries stay listed after a failed reload, followed by the failure line.
    fn directory_changed(&mut self, directory: &SessionDirectory) {
        if directory.is_empty() && !directory.load_failed() {
            self.emit(format_args!("\nSessions: none yet"));
            return;
        }
        self.emit(format_args!("\nSessions:"));
        for (i, entry) in directory.entries().iter().enumerate() {
            self.emit(format_args!("  {:>3}. {}", i + 1, sanitize(&entry.title)));
        }
        if directory.load_failed() {
            self.emit(format_args!("    - {LOAD_FAILED_LABEL}"));
        }
    }

    fn notice(&mut self, notice: &Notice) {
        self.status = Some((notice.clone(), Instant::now() + notice.ttl));
    }

    fn set_busy(&mut self, action: BusyAction, busy: bool) {
        if busy {
            let text = match action {
                BusyAction::Send => "...",
                BusyAction::NewSession => "Creating...",
            };
            self.emit(format_args!("{text}"));
        }
    }
}
