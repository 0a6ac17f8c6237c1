//! Span merging, masking and demasking.

use std::sync::Arc;

use mailmask_core::{Error, Result};
use serde::Serialize;
use tracing::debug;

use crate::entity::{Detection, EntityRecord, PiiLabel};
use crate::patterns::PatternMatcher;
use crate::recognizer::{EntityKind, EntityRecognizer};

/// What to do when two detected spans overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Walk spans by start; on a tie the longest wins, then the one detected
    /// first (names before patterns, patterns in table order). Spans that
    /// overlap a kept span are dropped.
    #[default]
    KeepLongest,
    /// Fail with `Error::OverlappingSpans`.
    Reject,
}

/// Result of masking text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskResult {
    pub masked_text: String,
    /// Entities ordered by start offset, descending.
    pub entities: Vec<EntityRecord>,
}

/// Combines the pattern table and a recognizer into one masking pass.
pub struct Masker {
    patterns: PatternMatcher,
    recognizer: Arc<dyn EntityRecognizer>,
    policy: OverlapPolicy,
}

impl Masker {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self {
            patterns: PatternMatcher::new(),
            recognizer,
            policy: OverlapPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn recognizer_id(&self) -> &str {
        self.recognizer.backend_id()
    }

    /// All raw detections: person names from the recognizer, then pattern matches.
    ///
    /// Recognizer spans must be ordered byte ranges on char boundaries of `text`.
    pub fn detect(&self, text: &str) -> Result<Vec<Detection>> {
        let mut detections = Vec::new();
        for entity in self.recognizer.recognize(text)? {
            if entity.kind != EntityKind::Person {
                continue;
            }
            let valid = entity.start <= entity.end
                && entity.end <= text.len()
                && text.is_char_boundary(entity.start)
                && text.is_char_boundary(entity.end);
            if !valid {
                return Err(Error::Recognizer(format!(
                    "{} recognizer returned invalid span {}..{} for text of {} bytes",
                    self.recognizer.backend_id(),
                    entity.start,
                    entity.end,
                    text.len()
                )));
            }
            detections.push(Detection {
                label: PiiLabel::FullName,
                start: entity.start,
                end: entity.end,
            });
        }
        detections.extend(self.patterns.detect(text));
        Ok(detections)
    }

    /// Replace every detected span with its `[label]` token.
    pub fn mask(&self, text: &str) -> Result<MaskResult> {
        let detections = self.detect(text)?;
        let spans = resolve_overlaps(detections, self.policy)?;

        let mut masked = String::with_capacity(text.len());
        let mut last_end = 0;
        for span in &spans {
            masked.push_str(&text[last_end..span.start]);
            masked.push_str(&span.label.token());
            last_end = span.end;
        }
        masked.push_str(&text[last_end..]);

        let mut entities = to_records(text, &spans);
        entities.reverse();

        debug!(
            "Masked {} entities ({} recognizer)",
            entities.len(),
            self.recognizer.backend_id()
        );

        Ok(MaskResult {
            masked_text: masked,
            entities,
        })
    }
}

/// Order spans by ascending start and enforce the overlap policy.
fn resolve_overlaps(detections: Vec<Detection>, policy: OverlapPolicy) -> Result<Vec<Detection>> {
    let mut ordered: Vec<(usize, Detection)> = detections
        .into_iter()
        .filter(|d| d.start < d.end)
        .enumerate()
        .collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(ia.cmp(ib))
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(ordered.len());
    for (_, span) in ordered {
        match kept.last() {
            Some(prev) if span.start < prev.end => match policy {
                OverlapPolicy::KeepLongest => {
                    debug!(
                        "Dropping {} at {}..{} (overlaps {} at {}..{})",
                        span.label, span.start, span.end, prev.label, prev.start, prev.end
                    );
                }
                OverlapPolicy::Reject => {
                    return Err(Error::OverlappingSpans {
                        first: (prev.start, prev.end),
                        first_label: prev.label.to_string(),
                        second: (span.start, span.end),
                        second_label: span.label.to_string(),
                    });
                }
            },
            _ => kept.push(span),
        }
    }

    Ok(kept)
}

/// Convert ascending, non-overlapping byte spans into records with character offsets.
fn to_records(text: &str, spans: &[Detection]) -> Vec<EntityRecord> {
    let mut byte_pos = 0;
    let mut char_pos = 0;
    let mut advance = |target: usize| {
        char_pos += text[byte_pos..target].chars().count();
        byte_pos = target;
        char_pos
    };

    spans
        .iter()
        .map(|span| {
            let start = advance(span.start);
            let end = advance(span.end);
            EntityRecord {
                position: [start, end],
                classification: span.label,
                entity: text[span.start..span.end].to_string(),
            }
        })
        .collect()
}

/// Restore masked text from its entity records.
///
/// Entities are applied in reading order; each replaces the first remaining
/// `[label]` token of its classification. Correct for output of
/// `Masker::mask`; edited masked text may restore values into the wrong slot.
pub fn demask(masked_text: &str, entities: &[EntityRecord]) -> String {
    let mut ordered: Vec<&EntityRecord> = entities.iter().collect();
    ordered.sort_by_key(|e| e.start());

    let mut text = masked_text.to_string();
    for entity in ordered {
        let token = entity.classification.token();
        if let Some(pos) = text.find(&token) {
            text.replace_range(pos..pos + token.len(), &entity.entity);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{HeuristicRecognizer, RecognizedEntity};

    fn masker() -> Masker {
        Masker::new(Arc::new(HeuristicRecognizer::new()))
    }

    fn char_slice(text: &str, record: &EntityRecord) -> String {
        text.chars()
            .skip(record.start())
            .take(record.end() - record.start())
            .collect()
    }

    struct FailingRecognizer;

    impl EntityRecognizer for FailingRecognizer {
        fn backend_id(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<RecognizedEntity>> {
            Err(Error::Recognizer("model offline".into()))
        }
    }

    struct FixedRecognizer(Vec<RecognizedEntity>);

    impl EntityRecognizer for FixedRecognizer {
        fn backend_id(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<RecognizedEntity>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_no_pii_is_unchanged() {
        let text = "My order has not arrived, can you check the status?";
        let result = masker().mask(text).unwrap();
        assert_eq!(result.masked_text, text);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_contact_line() {
        let text = "Contact John Smith at john@x.com or 9876543210";
        let result = masker().mask(text).unwrap();

        assert_eq!(
            result.masked_text,
            "Contact [full_name] at [email] or [phone_number]"
        );
        assert!(!result.masked_text.contains("john@x.com"));
        assert!(!result.masked_text.contains("9876543210"));

        let labels: Vec<PiiLabel> = result.entities.iter().map(|e| e.classification).collect();
        assert_eq!(
            labels,
            vec![PiiLabel::PhoneNumber, PiiLabel::Email, PiiLabel::FullName]
        );
        assert_eq!(result.entities[2].position, [8, 18]);
        assert_eq!(result.entities[2].entity, "John Smith");

        assert_eq!(demask(&result.masked_text, &result.entities), text);
    }

    #[test]
    fn test_entities_descending() {
        let result = masker()
            .mask("a@x.com, 15/08/1990, 9876543210, cvv 123")
            .unwrap();
        let starts: Vec<usize> = result.entities.iter().map(|e| e.start()).collect();
        let mut sorted = starts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(starts, sorted);
        assert_eq!(starts.len(), 4);
    }

    #[test]
    fn test_same_label_demask_order() {
        let text = "a@x.com and b@y.com";
        let result = masker().mask(text).unwrap();
        assert_eq!(result.masked_text, "[email] and [email]");
        assert_eq!(result.entities[0].entity, "b@y.com");
        assert_eq!(result.entities[1].entity, "a@x.com");
        assert_eq!(demask(&result.masked_text, &result.entities), text);
    }

    #[test]
    fn test_positions_are_character_offsets() {
        let text = "Café résumé: écrire à zoe@x.com";
        let result = masker().mask(text).unwrap();
        assert_eq!(result.entities.len(), 1);
        let record = &result.entities[0];
        assert_eq!(record.entity, "zoe@x.com");
        assert_eq!(char_slice(text, record), "zoe@x.com");
        assert!(record.start() < text.find("zoe").unwrap());
        assert_eq!(record.end(), text.chars().count());
        assert_eq!(demask(&result.masked_text, &result.entities), text);
    }

    #[test]
    fn test_overlap_keep_longest() {
        let text = "card 1234 5678 9012 3456 thanks";
        let result = masker().mask(text).unwrap();
        assert_eq!(result.masked_text, "card [credit_debit_no] thanks");
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].entity, "1234 5678 9012 3456");
        assert_eq!(demask(&result.masked_text, &result.entities), text);
    }

    #[test]
    fn test_overlap_reject() {
        let masker = masker().with_policy(OverlapPolicy::Reject);
        let err = masker.mask("card 1234 5678 9012 3456 thanks").unwrap_err();
        assert!(matches!(err, Error::OverlappingSpans { .. }));
        // Non-overlapping input still masks.
        assert!(masker.mask("mail a@x.com").is_ok());
    }

    #[test]
    fn test_recognizer_failure_propagates() {
        let masker = Masker::new(Arc::new(FailingRecognizer));
        let err = masker.mask("anything").unwrap_err();
        assert_eq!(err.to_string(), "Recognizer error: model offline");
    }

    #[test]
    fn test_only_person_spans_used() {
        let text = "Ravi at Infosys";
        let masker = Masker::new(Arc::new(FixedRecognizer(vec![
            RecognizedEntity { kind: EntityKind::Person, start: 0, end: 4 },
            RecognizedEntity { kind: EntityKind::Organization, start: 8, end: 15 },
        ])));
        let result = masker.mask(text).unwrap();
        assert_eq!(result.masked_text, "[full_name] at Infosys");
        assert_eq!(masker.recognizer_id(), "fixed");
    }

    #[test]
    fn test_out_of_bounds_span_is_an_error() {
        let masker = Masker::new(Arc::new(FixedRecognizer(vec![RecognizedEntity {
            kind: EntityKind::Person,
            start: 0,
            end: 50,
        }])));
        let err = masker.mask("short text").unwrap_err();
        assert!(matches!(err, Error::Recognizer(_)));
        assert!(err.to_string().contains("0..50"));
    }

    #[test]
    fn test_span_inside_multibyte_char_is_an_error() {
        let masker = Masker::new(Arc::new(FixedRecognizer(vec![RecognizedEntity {
            kind: EntityKind::Person,
            start: 1,
            end: 3,
        }])));
        let err = masker.mask("éé name").unwrap_err();
        assert!(matches!(err, Error::Recognizer(_)));
    }

    #[test]
    fn test_reversed_span_is_an_error() {
        let masker = Masker::new(Arc::new(FixedRecognizer(vec![RecognizedEntity {
            kind: EntityKind::Person,
            start: 4,
            end: 2,
        }])));
        assert!(matches!(masker.mask("Ravi Kumar").unwrap_err(), Error::Recognizer(_)));
    }

    #[test]
    fn test_mask_is_idempotent() {
        let masker = masker();
        let first = masker
            .mask("Dear Anita Rao, card 4111-1111-1111-1111 exp 09/27 cvv 123")
            .unwrap();
        let second = masker.mask(&first.masked_text).unwrap();
        assert!(second.entities.is_empty());
        assert_eq!(second.masked_text, first.masked_text);
    }

    #[test]
    fn test_demask_skips_missing_tokens() {
        let entities = vec![EntityRecord {
            position: [0, 7],
            classification: PiiLabel::Email,
            entity: "a@x.com".into(),
        }];
        assert_eq!(demask("nothing here", &entities), "nothing here");
    }
}
