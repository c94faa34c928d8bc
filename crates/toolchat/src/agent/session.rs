//! Interactive session support: control commands, conversation snapshots,
//! and conversation statistics.

use crate::context::transcript::Transcript;
use crate::error::SessionError;
use crate::{Message, MessageRole};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A whole-input control command or a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `quit`, `exit` or `bye`.
    Quit,
    /// `save`: write a conversation snapshot.
    Save,
    /// `stats`: print usage statistics.
    Stats,
    /// Whitespace-only input.
    Empty,
    /// Anything else is sent to the model.
    Message(&'a str),
}

impl<'a> Command<'a> {
    /// Classify a line of input. Commands match case-insensitively and only
    /// as the entire (trimmed) input.
    pub fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "bye" => Command::Quit,
            "save" => Command::Save,
            "stats" => Command::Stats,
            _ => Command::Message(trimmed),
        }
    }
}

/// A saved conversation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    /// When the session started.
    pub timestamp: DateTime<Local>,
    pub messages: Vec<Message>,
    /// Session cost at save time, USD.
    pub total_cost: f64,
}

/// Conversation statistics for the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub system_messages: usize,
    pub estimated_tokens: u64,
    pub total_cost: f64,
    pub duration: Duration,
}

impl fmt::Display for ConversationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);
        writeln!(f, "{rule}")?;
        writeln!(f, "CONVERSATION STATISTICS")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Messages: {} (System: {}, User/AI: {})",
            self.total_messages,
            self.system_messages,
            self.total_messages - self.system_messages
        )?;
        writeln!(f, "Total Tokens: ~{}", self.estimated_tokens)?;
        writeln!(f, "Total Cost: ${:.4}", self.total_cost)?;
        writeln!(f, "Duration: {} seconds", self.duration.as_secs())?;
        write!(f, "{rule}")
    }
}

/// Per-conversation bookkeeping that outlives individual turns.
#[derive(Debug, Clone)]
pub struct Session {
    started_at: DateTime<Local>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        (Local::now() - self.started_at).to_std().unwrap_or_default()
    }

    pub fn snapshot(&self, transcript: &Transcript, total_cost: f64) -> ConversationSnapshot {
        ConversationSnapshot {
            timestamp: self.started_at,
            messages: transcript.messages().to_vec(),
            total_cost,
        }
    }

    /// Write a snapshot to `dir/conversation_YYYYMMDD_HHMMSS.json` and return
    /// the path.
    pub fn save_snapshot(
        &self,
        dir: &Path,
        transcript: &Transcript,
        total_cost: f64,
    ) -> Result<PathBuf, SessionError> {
        let path = dir.join(snapshot_file_name(Local::now()));
        let json = serde_json::to_string_pretty(&self.snapshot(transcript, total_cost))?;
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn conversation_stats(
        &self,
        transcript: &Transcript,
        estimated_tokens: u64,
        total_cost: f64,
    ) -> ConversationStats {
        ConversationStats {
            total_messages: transcript.len(),
            system_messages: transcript
                .messages()
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .count(),
            estimated_tokens,
            total_cost,
            duration: self.elapsed(),
        }
    }
}

/// `conversation_YYYYMMDD_HHMMSS.json`.
pub fn snapshot_file_name(at: DateTime<Local>) -> String {
    format!("conversation_{}.json", at.format("%Y%m%d_%H%M%S"))
}
