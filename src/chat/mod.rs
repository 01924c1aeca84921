//! Conversation layer of the advisor.
//!
//! - [`session`]: streamed conversation state and its snapshots
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing for the REPL

mod commands;
mod config;
mod session;

pub use crate::render::{Presenter, TerminalPresenter};
pub use commands::{AdvisorCommand, help_text, parse_command};
pub use config::{AdvisorArgs, AdvisorConfig};
pub use session::{
    ConversationSession, ReplyHandle, ReplyOutcome, SessionSnapshot, SessionStats,
};
