use chrono::{DateTime, Local};

/// One entry of the message log
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    pub subject: String,
    pub payload: String,
    pub received_at: DateTime<Local>,
}

impl ReceivedMessage {
    /// Wall-clock time as shown in the log
    pub fn time_label(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }
}

/// Session state as seen by the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Disconnected => "Disconnected",
            SessionStatus::Connecting => "Connecting",
            SessionStatus::Connected => "Connected",
            SessionStatus::Subscribed => "Subscribed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionStatus::Connected | SessionStatus::Subscribed)
    }
}

/// Editable draft fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DraftField {
    #[default]
    SubscribeSubject,
    PublishSubject,
    PublishPayload,
}

impl DraftField {
    pub fn next(&self) -> DraftField {
        match self {
            DraftField::SubscribeSubject => DraftField::PublishSubject,
            DraftField::PublishSubject => DraftField::PublishPayload,
            DraftField::PublishPayload => DraftField::SubscribeSubject,
        }
    }

    pub fn prev(&self) -> DraftField {
        match self {
            DraftField::SubscribeSubject => DraftField::PublishPayload,
            DraftField::PublishSubject => DraftField::SubscribeSubject,
            DraftField::PublishPayload => DraftField::PublishSubject,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DraftField::SubscribeSubject => "Subject",
            DraftField::PublishSubject => "Publish subject",
            DraftField::PublishPayload => "Message",
        }
    }
}

/// Single-line text input. The cursor counts characters, not bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextField {
    value: String,
    cursor: usize,
}

impl TextField {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        TextField { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_offset(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_field_edits_multibyte() {
        let mut field = TextField::new("hé");
        assert_eq!(field.cursor(), 2);

        field.move_left();
        field.insert('x');
        assert_eq!(field.value(), "hxé");

        field.move_right();
        field.backspace();
        assert_eq!(field.value(), "hx");
        assert_eq!(field.cursor(), 2);
    }

    #[test]
    fn test_text_field_blank() {
        assert!(TextField::new("  \t").is_blank());
        assert!(!TextField::new(" a ").is_blank());
    }

    #[test]
    fn test_draft_field_cycle() {
        let start = DraftField::SubscribeSubject;
        assert_eq!(start.next().next().next(), start);
        assert_eq!(start.prev(), DraftField::PublishPayload);
    }
}
