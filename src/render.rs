//! Presentation of session snapshots.
//!
//! A [`Presenter`] receives every [`SessionSnapshot`] a session publishes and
//! decides what to show. [`TerminalPresenter`] prints incrementally to a
//! terminal, writing only the text that is new since the previous snapshot.

use std::io::{self, Stdout, Write};

use crate::chat::SessionSnapshot;
use crate::persona::THINKING_PLACEHOLDER;
use crate::types::{ConversationTurn, Speaker};
use crate::utils::time::clock;

/// ANSI escape code for dim text (used for the thinking placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the thinking placeholder).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the advisor label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for info messages).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Clear the current line and return the cursor to column zero.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Consumer of session snapshots.
pub trait Presenter: Send {
    /// Show the session as of `snapshot`.
    fn present(&mut self, snapshot: &SessionSnapshot);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Incremental terminal presenter with optional ANSI styling.
///
/// User turns are not echoed; the user already typed them at the prompt.
pub struct TerminalPresenter<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    // Turns fully written so far.
    presented: usize,
    // Text of the in-progress turn already written.
    partial: Option<String>,
    placeholder_shown: bool,
}

impl TerminalPresenter<Stdout> {
    /// Creates a presenter on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a presenter on stdout with the given color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for TerminalPresenter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    /// Creates a presenter on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            presented: 0,
            partial: None,
            placeholder_shown: false,
        }
    }

    /// Consumes the presenter and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    fn styled(&mut self, style: &str, text: &str) {
        if self.use_color {
            let styled = format!("{style}{text}{ANSI_RESET}");
            self.write(&styled);
        } else {
            self.write(text);
        }
    }

    fn header(&mut self, turn: &ConversationTurn) {
        let label = format!("Nexus [{}]:", clock(&turn.created_at));
        self.styled(ANSI_CYAN, &label);
        self.write("\n");
    }

    fn clear_placeholder(&mut self) {
        if self.placeholder_shown {
            self.write(ANSI_CLEAR_LINE);
            self.placeholder_shown = false;
        }
    }

    /// Write whatever of `turn` is new. `complete` freezes the turn.
    fn advance(&mut self, turn: &ConversationTurn, complete: bool) {
        let written = match self.partial.take() {
            Some(written) => written,
            None => {
                self.header(turn);
                String::new()
            }
        };

        if turn.text.is_empty() && !complete {
            if self.use_color && !self.placeholder_shown {
                self.styled(&format!("{ANSI_DIM}{ANSI_ITALIC}"), THINKING_PLACEHOLDER);
                self.placeholder_shown = true;
            }
            self.partial = Some(written);
            return;
        }
        self.clear_placeholder();

        match turn.text.strip_prefix(written.as_str()) {
            Some(delta) => self.write(delta),
            None => {
                // The text was replaced rather than extended: the fallback.
                if !written.is_empty() {
                    self.write("\n");
                }
                self.styled(ANSI_RED, &turn.text);
            }
        }

        if complete {
            self.write("\n\n");
        } else {
            self.partial = Some(turn.text.clone());
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn present(&mut self, snapshot: &SessionSnapshot) {
        if snapshot.turns.len() < self.presented {
            // The session started over.
            self.presented = 0;
            self.partial = None;
            self.placeholder_shown = false;
        }

        let last = snapshot.turns.len();
        for index in self.presented..last {
            let turn = &snapshot.turns[index];
            let complete = index + 1 < last || !snapshot.is_busy;
            if turn.speaker == Speaker::Assistant {
                self.advance(turn, complete);
            }
            if !complete {
                break;
            }
            self.presented = index + 1;
        }
        let _ = self.out.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.clear_placeholder();
        self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write("\n");
        let _ = self.out.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.styled(ANSI_GREEN, info);
        self.write("\n");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::FALLBACK_REPLY;

    fn snapshot(turns: &[(Speaker, &str)], is_busy: bool) -> SessionSnapshot {
        SessionSnapshot {
            turns: turns
                .iter()
                .map(|(speaker, text)| ConversationTurn::new(*speaker, *text))
                .collect(),
            is_busy,
        }
    }

    fn output(presenter: TerminalPresenter<Vec<u8>>) -> String {
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    #[test]
    fn streams_only_new_text() {
        let mut presenter = TerminalPresenter::with_writer(Vec::new(), false);
        let greeting = (Speaker::Assistant, "Olá!");
        let question = (Speaker::User, "What is impermanent loss?");

        presenter.present(&snapshot(&[greeting], false));
        presenter.present(&snapshot(&[greeting, question, (Speaker::Assistant, "")], true));
        presenter.present(&snapshot(&[greeting, question, (Speaker::Assistant, "Perda")], true));
        presenter.present(&snapshot(
            &[greeting, question, (Speaker::Assistant, "Perda impermanente é...")],
            true,
        ));
        presenter.present(&snapshot(
            &[greeting, question, (Speaker::Assistant, "Perda impermanente é...")],
            false,
        ));

        let out = output(presenter);
        assert_eq!(out.matches("Olá!").count(), 1);
        assert_eq!(out.matches("Perda").count(), 1);
        assert!(out.contains("Perda impermanente é...\n\n"));
        assert!(!out.contains("What is impermanent loss?"));
        assert!(!out.contains(THINKING_PLACEHOLDER));
    }

    #[test]
    fn placeholder_while_waiting() {
        let mut presenter = TerminalPresenter::with_writer(Vec::new(), true);
        presenter.present(&snapshot(
            &[(Speaker::User, "hi"), (Speaker::Assistant, "")],
            true,
        ));
        presenter.present(&snapshot(
            &[(Speaker::User, "hi"), (Speaker::Assistant, "")],
            true,
        ));
        presenter.present(&snapshot(
            &[(Speaker::User, "hi"), (Speaker::Assistant, "Oi")],
            false,
        ));

        let out = output(presenter);
        assert_eq!(out.matches(THINKING_PLACEHOLDER).count(), 1);
        assert!(out.contains(ANSI_CLEAR_LINE));
        assert!(out.ends_with("Oi\n\n"));
    }

    #[test]
    fn fallback_replaces_partial_text() {
        let mut presenter = TerminalPresenter::with_writer(Vec::new(), false);
        presenter.present(&snapshot(
            &[(Speaker::User, "hi"), (Speaker::Assistant, "Perda")],
            true,
        ));
        presenter.present(&snapshot(
            &[(Speaker::User, "hi"), (Speaker::Assistant, FALLBACK_REPLY)],
            false,
        ));

        let out = output(presenter);
        assert!(out.contains(&format!("Perda\n{FALLBACK_REPLY}\n\n")));
    }

    #[test]
    fn restart_after_clear() {
        let mut presenter = TerminalPresenter::with_writer(Vec::new(), false);
        let greeting = (Speaker::Assistant, "Olá!");
        presenter.present(&snapshot(
            &[greeting, (Speaker::User, "a"), (Speaker::Assistant, "b")],
            false,
        ));
        presenter.present(&snapshot(&[greeting], false));
        assert_eq!(output(presenter).matches("Olá!").count(), 2);
    }

    #[test]
    fn messages() {
        let mut presenter = TerminalPresenter::with_writer(Vec::new(), false);
        presenter.print_info("Conversation cleared.");
        presenter.print_error("boom");
        assert_eq!(output(presenter), "Conversation cleared.\nError: boom\n");
    }
}
