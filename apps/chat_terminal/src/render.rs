//! Turns controller snapshots into terminal lines.

use session_core::SessionSnapshot;
use shared::domain::{Message, Role};

pub const TYPING_INDICATOR: &str = "bot: Typing...";

pub fn format_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "bot",
        Role::System => "system",
    };
    format!("{label}: {}", message.content)
}

/// Remembers what has already been printed so each snapshot only emits the
/// new tail of the transcript.
#[derive(Debug, Default)]
pub struct TranscriptView {
    rendered: usize,
    typing_shown: bool,
}

impl TranscriptView {
    pub fn apply(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines: Vec<String> = snapshot
            .transcript
            .iter()
            .skip(self.rendered)
            .map(format_message)
            .collect();
        self.rendered = self.rendered.max(snapshot.transcript.len());

        if snapshot.busy && !self.typing_shown {
            lines.push(TYPING_INDICATOR.to_string());
        }
        self.typing_shown = snapshot.busy;
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(transcript: Vec<Message>, busy: bool) -> SessionSnapshot {
        SessionSnapshot {
            transcript,
            pending_input: String::new(),
            busy,
        }
    }

    #[test]
    fn prints_each_message_once_and_typing_while_busy() {
        let mut view = TranscriptView::default();

        assert_eq!(
            view.apply(&snapshot(vec![Message::user("Hello")], true)),
            vec!["you: Hello".to_string(), TYPING_INDICATOR.to_string()]
        );
        assert!(view
            .apply(&snapshot(vec![Message::user("Hello")], true))
            .is_empty());
        assert_eq!(
            view.apply(&snapshot(
                vec![Message::user("Hello"), Message::assistant("Hi there")],
                false
            )),
            vec!["bot: Hi there".to_string()]
        );
    }

    #[test]
    fn fallback_renders_as_system_line() {
        let mut view = TranscriptView::default();
        let lines = view.apply(&snapshot(
            vec![
                Message::user("Test"),
                Message::system(session_core::FALLBACK_ERROR_MESSAGE),
            ],
            false,
        ));
        assert_eq!(
            lines,
            vec![
                "you: Test".to_string(),
                "system: Error: Unable to fetch response.".to_string()
            ]
        );
    }
}
