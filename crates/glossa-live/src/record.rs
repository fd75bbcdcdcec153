//! Transcript segments and the session record the embedding app keeps.
//!
//! The engine never persists anything itself: it emits `Segment`s through
//! the session callback and the caller folds them into a `SessionRecord`.
//! The serialized field names are a compatibility surface for stored and
//! exported records, so they stay camelCase.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of translated text.
///
/// A final segment (`is_final == true`) is immutable history. A non-final
/// segment is the live preview: there is at most one at a time, it is
/// replaced wholesale on every update (fresh id, never patched in place),
/// and it disappears once its text finalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    pub text: String,
    /// Wall-clock emission time, Unix millis.
    pub timestamp_millis: i64,
    pub is_final: bool,
}

impl Segment {
    pub fn finalized(text: impl Into<String>) -> Self {
        Segment::stamped(text, true)
    }

    pub fn preview(text: impl Into<String>) -> Self {
        Segment::stamped(text, false)
    }

    fn stamped(text: impl Into<String>, is_final: bool) -> Self {
        Segment {
            id: Uuid::new_v4(),
            text: text.into(),
            timestamp_millis: Utc::now().timestamp_millis(),
            is_final,
        }
    }
}

/// Everything the caller needs to store or export one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub name: String,
    /// Unix millis.
    pub created_at: i64,
    /// Unix millis; bumped on every applied segment.
    pub updated_at: i64,
    pub input_language: String,
    pub output_language: String,
    pub segments: Vec<Segment>,
}

impl SessionRecord {
    pub fn new(
        name: impl Into<String>,
        input_language: impl Into<String>,
        output_language: impl Into<String>,
    ) -> Self {
        let now = Utc::now().timestamp_millis();
        SessionRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            input_language: input_language.into(),
            output_language: output_language.into(),
            segments: Vec::new(),
        }
    }

    /// Fold one emitted segment into the record: finals append (displacing
    /// any live preview), previews replace the current preview or attach as
    /// the new tail.
    pub fn apply(&mut self, segment: Segment) {
        if self.trailing_preview() {
            self.segments.pop();
        }
        // An empty preview just clears the tail; empty finals never arrive.
        if segment.is_final || !segment.text.is_empty() {
            self.segments.push(segment);
        }
        self.updated_at = Utc::now().timestamp_millis();
    }

    /// Final segments only, in emission order.
    pub fn transcript(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_final)
    }

    fn trailing_preview(&self) -> bool {
        self.segments.last().map(|s| !s.is_final).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_replaced_not_appended() {
        let mut record = SessionRecord::new("test", "German", "English");
        record.apply(Segment::preview("Hel"));
        record.apply(Segment::preview("Hello wor"));

        assert_eq!(record.segments.len(), 1);
        assert_eq!(record.segments[0].text, "Hello wor");
        assert!(!record.segments[0].is_final);
    }

    #[test]
    fn final_displaces_the_preview() {
        let mut record = SessionRecord::new("test", "German", "English");
        record.apply(Segment::preview("Hello wor"));
        record.apply(Segment::finalized("Hello world."));

        assert_eq!(record.segments.len(), 1);
        assert!(record.segments[0].is_final);
        assert_eq!(record.transcript().count(), 1);
    }

    #[test]
    fn each_preview_gets_a_fresh_identity() {
        let first = Segment::preview("a");
        let second = Segment::preview("a");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let record = SessionRecord::new("Morning standup", "German", "English");
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("createdAt").is_some());
        assert!(value.get("inputLanguage").is_some());
        assert!(value.get("outputLanguage").is_some());

        let segment = Segment::finalized("Hello.");
        let value = serde_json::to_value(&segment).unwrap();
        assert!(value.get("timestampMillis").is_some());
        assert!(value.get("isFinal").is_some());
    }
}
