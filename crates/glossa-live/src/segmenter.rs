//! **Transcript Segmenter** — turns raw transcription deltas into segments
//!
//! The service streams delta text with no stable segment identity, so the
//! only reliable, language-agnostic finalization boundary is
//! sentence-terminal punctuation followed by whitespace. Two buffers
//! accumulate between messages: the echo of the caller's own speech (shown
//! only until the translation starts landing) and the translation itself
//! (the only source of finalized segments). A turn-complete marker flushes
//! whatever never reached punctuation.

use regex::Regex;
use tracing::debug;

use crate::record::Segment;
use crate::wire::ServerContent;

/// Result of applying one server message: freshly finalized segments in
/// order, then at most one preview that replaces whatever preview the
/// caller was showing.
#[derive(Debug, Default)]
pub struct SegmentBatch {
    pub finalized: Vec<Segment>,
    pub preview: Option<Segment>,
}

impl SegmentBatch {
    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty() && self.preview.is_none()
    }
}

pub struct TranscriptSegmenter {
    /// Echo of the caller's own words; preview fallback only, never finalized.
    input_echo: String,
    /// Accumulating translation text.
    output_translation: String,
    boundary: Regex,
}

impl TranscriptSegmenter {
    pub fn new() -> Self {
        TranscriptSegmenter {
            input_echo: String::new(),
            output_translation: String::new(),
            // Terminal punctuation only counts when whitespace follows;
            // "3.5" or a sentence still being typed must not split.
            boundary: Regex::new(r"[.?!]\s").expect("sentence boundary pattern is valid"),
        }
    }

    /// Apply one message worth of deltas. Order matters: input echo first,
    /// then translation (whose arrival clears the echo), then the boundary
    /// scan, then the turn-complete flush, then the preview decision.
    pub fn apply(&mut self, content: &ServerContent) -> SegmentBatch {
        let mut batch = SegmentBatch::default();

        if let Some(delta) = &content.input_transcription {
            self.input_echo.push_str(&delta.text);
        }
        if let Some(delta) = &content.output_transcription {
            self.output_translation.push_str(&delta.text);
            // Translation output preempts the echoed-input preview.
            self.input_echo.clear();
        }

        while let Some(found) = self.boundary.find(&self.output_translation) {
            // The punctuation mark is a single byte; keep it, drop the
            // whitespace that proved the sentence ended.
            let sentence = self.output_translation[..found.start() + 1].trim().to_string();
            self.output_translation = self.output_translation[found.end()..].to_string();
            debug!("Segmenter: finalized sentence ({} chars)", sentence.len());
            batch.finalized.push(Segment::finalized(sentence));
        }

        if content.turn_complete {
            if let Some(segment) = self.flush_pending() {
                batch.finalized.push(segment);
            }
        }

        batch.preview = if !self.output_translation.is_empty() {
            Some(Segment::preview(self.output_translation.clone()))
        } else if !self.input_echo.is_empty() {
            Some(Segment::preview(self.input_echo.clone()))
        } else {
            None
        };

        batch
    }

    /// Finalize whatever translation text is still pending, punctuation or
    /// not, and clear both buffers. Used on turn completion and on
    /// disconnect so no spoken content is silently dropped.
    pub fn flush_pending(&mut self) -> Option<Segment> {
        let pending = self.output_translation.trim().to_string();
        self.output_translation.clear();
        self.input_echo.clear();
        if pending.is_empty() {
            None
        } else {
            debug!("Segmenter: flushed pending tail ({} chars)", pending.len());
            Some(Segment::finalized(pending))
        }
    }
}

impl Default for TranscriptSegmenter {
    fn default() -> Self {
        TranscriptSegmenter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::TranscriptionDelta;

    fn output_delta(text: &str) -> ServerContent {
        ServerContent {
            output_transcription: Some(TranscriptionDelta { text: text.into() }),
            ..Default::default()
        }
    }

    fn input_delta(text: &str) -> ServerContent {
        ServerContent {
            input_transcription: Some(TranscriptionDelta { text: text.into() }),
            ..Default::default()
        }
    }

    fn turn_complete() -> ServerContent {
        ServerContent {
            turn_complete: true,
            ..Default::default()
        }
    }

    #[test]
    fn two_sentences_in_one_delta_finalize_separately() {
        let mut segmenter = TranscriptSegmenter::new();
        let batch = segmenter.apply(&output_delta("Hello world. How are you? "));

        assert_eq!(batch.finalized.len(), 2);
        assert_eq!(batch.finalized[0].text, "Hello world.");
        assert_eq!(batch.finalized[1].text, "How are you?");
        assert!(batch.finalized.iter().all(|s| s.is_final));
        assert!(batch.preview.is_none());
    }

    #[test]
    fn partial_sentence_stays_in_the_preview() {
        let mut segmenter = TranscriptSegmenter::new();

        let batch = segmenter.apply(&output_delta("Hello wor"));
        assert!(batch.finalized.is_empty());
        assert_eq!(batch.preview.unwrap().text, "Hello wor");

        let batch = segmenter.apply(&output_delta("ld. "));
        assert_eq!(batch.finalized.len(), 1);
        assert_eq!(batch.finalized[0].text, "Hello world.");
        assert!(batch.preview.is_none());
    }

    #[test]
    fn punctuation_without_trailing_whitespace_does_not_split() {
        let mut segmenter = TranscriptSegmenter::new();
        let batch = segmenter.apply(&output_delta("It costs 3.5"));

        assert!(batch.finalized.is_empty());
        assert_eq!(batch.preview.unwrap().text, "It costs 3.5");
    }

    #[test]
    fn turn_complete_flushes_unpunctuated_tail() {
        let mut segmenter = TranscriptSegmenter::new();
        segmenter.apply(&output_delta("unfinished fragment"));
        let batch = segmenter.apply(&turn_complete());

        assert_eq!(batch.finalized.len(), 1);
        assert_eq!(batch.finalized[0].text, "unfinished fragment");
        assert!(batch.finalized[0].is_final);
        assert!(batch.preview.is_none());
    }

    #[test]
    fn turn_complete_with_empty_buffers_emits_nothing() {
        let mut segmenter = TranscriptSegmenter::new();
        segmenter.apply(&output_delta("Done. "));
        let batch = segmenter.apply(&turn_complete());

        assert!(batch.finalized.is_empty());
        assert!(batch.preview.is_none());
    }

    #[test]
    fn turn_complete_skips_whitespace_only_tail() {
        let mut segmenter = TranscriptSegmenter::new();
        segmenter.apply(&output_delta("Done.   "));
        let batch = segmenter.apply(&turn_complete());

        assert!(batch.finalized.is_empty());
        assert!(batch.is_empty());
    }

    #[test]
    fn input_echo_previews_until_translation_arrives() {
        let mut segmenter = TranscriptSegmenter::new();

        let batch = segmenter.apply(&input_delta("ich bi"));
        assert_eq!(batch.preview.unwrap().text, "ich bi");

        let batch = segmenter.apply(&output_delta("I am"));
        assert_eq!(batch.preview.unwrap().text, "I am");

        // Later input deltas stay invisible while translation is pending.
        let batch = segmenter.apply(&input_delta("n müde"));
        assert_eq!(batch.preview.unwrap().text, "I am");
    }

    #[test]
    fn combined_message_applies_input_before_output() {
        let mut segmenter = TranscriptSegmenter::new();
        let content = ServerContent {
            input_transcription: Some(TranscriptionDelta {
                text: "hallo".into(),
            }),
            output_transcription: Some(TranscriptionDelta {
                text: "hello".into(),
            }),
            ..Default::default()
        };

        let batch = segmenter.apply(&content);
        assert_eq!(batch.preview.unwrap().text, "hello");
    }

    #[test]
    fn leading_whitespace_from_prior_boundary_is_trimmed() {
        let mut segmenter = TranscriptSegmenter::new();
        segmenter.apply(&output_delta("First."));
        let batch = segmenter.apply(&output_delta(" Second. "));

        assert_eq!(batch.finalized.len(), 2);
        assert_eq!(batch.finalized[0].text, "First.");
        assert_eq!(batch.finalized[1].text, "Second.");
    }

    #[test]
    fn flush_pending_finalizes_and_clears() {
        let mut segmenter = TranscriptSegmenter::new();
        segmenter.apply(&output_delta("trailing thought"));

        let flushed = segmenter.flush_pending().unwrap();
        assert_eq!(flushed.text, "trailing thought");
        assert!(flushed.is_final);
        assert!(segmenter.flush_pending().is_none());
    }

    #[test]
    fn previews_are_fresh_segments_every_time() {
        let mut segmenter = TranscriptSegmenter::new();
        let first = segmenter.apply(&output_delta("Hel")).preview.unwrap();
        let second = segmenter.apply(&output_delta("lo")).preview.unwrap();

        assert_eq!(second.text, "Hello");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn empty_message_produces_empty_batch() {
        let mut segmenter = TranscriptSegmenter::new();
        let batch = segmenter.apply(&ServerContent::default());
        assert!(batch.is_empty());
    }
}
