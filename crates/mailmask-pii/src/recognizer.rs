//! Named-entity recognition backends.
//!
//! The `EntityRecognizer` trait abstracts over NER models. The masker only
//! consumes `Person` spans and reports them as `full_name`.
//! Implementations:
//! - `HeuristicRecognizer`: capitalized-word runs with honorific support
//! - `OnnxRecognizer`: BERT-style token classification (requires the `onnx` feature)

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use mailmask_core::Result;
use once_cell::sync::Lazy;
use regex::Regex;

/// Semantic category of a recognized span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Other(String),
}

impl EntityKind {
    /// Map a BIO tag suffix such as `PER` or `ORG` to a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "PER" | "PERSON" => EntityKind::Person,
            "ORG" => EntityKind::Organization,
            "LOC" | "GPE" => EntityKind::Location,
            other => EntityKind::Other(other.to_string()),
        }
    }
}

/// A span found by a recognizer. Offsets are bytes into the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedEntity {
    pub kind: EntityKind,
    pub start: usize,
    pub end: usize,
}

/// Trait for pluggable NER backends.
pub trait EntityRecognizer: Send + Sync {
    /// Human-readable backend identifier (e.g. "heuristic", "onnx").
    fn backend_id(&self) -> &str;

    /// Recognize all named entities in text.
    fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>>;
}

/// Longest capitalized run still accepted as one name.
const MAX_NAME_WORDS: usize = 4;

static NAME_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Z](?:[a-z]+|'[A-Z][a-z]+)(?:-[A-Z][a-z]+)?(?:[ \t]+[A-Z](?:[a-z]+|'[A-Z][a-z]+)(?:-[A-Z][a-z]+)?)*\b",
    )
    .unwrap()
});
static NAME_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z](?:[a-z]+|'[A-Z][a-z]+)(?:-[A-Z][a-z]+)?").unwrap());

const HONORIFICS: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "Prof"];

// Capitalized words that open or close a run but are not part of a name.
static NON_NAME_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set: HashSet<&'static str> = HashSet::new();
    set.extend(HONORIFICS.iter().copied());
    set.extend([
        // Greetings and sign-offs
        "Dear", "Hi", "Hello", "Hey", "Greetings", "Regards", "Best", "Kind", "Warm",
        "Thanks", "Thank", "Sincerely", "Cheers", "Yours", "Faithfully", "Truly",
        "Good", "Morning", "Afternoon", "Evening", "Sir", "Madam", "Hope",
        // Sentence starters and function words
        "The", "This", "That", "These", "Those", "My", "Our", "Your", "We", "It", "He",
        "She", "They", "You", "Yes", "No", "Ok", "Also", "And", "But", "If", "When",
        "Where", "What", "Why", "How", "Who", "Which", "Can", "Could", "Would",
        "Should", "Will", "Is", "Are", "Was", "Were", "Do", "Does", "Did", "Have",
        "Has", "Had", "Let", "Please", "After", "Before", "On", "In", "At", "For",
        "With", "By", "As", "Since", "From", "To", "Note", "Today", "Tomorrow",
        "Yesterday", "Attached", "Kindly",
        // Email vocabulary
        "Contact", "Call", "Email", "Mail", "Phone", "Send", "Sent", "Subject", "Re",
        "Fwd", "Team", "Support", "Customer", "Service", "Account", "Order",
        "Invoice", "Ticket", "Date", "Birth", "Card", "Number", "Name", "Address",
        "Bank", "Credit", "Debit", "Update", "Issue", "Problem", "Request", "Urgent",
        "Important", "Billing", "Payment", "Refund", "Password", "Login",
        // Calendar
        "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
        "January", "February", "March", "April", "May", "June", "July", "August",
        "September", "October", "November", "December",
    ]);
    set
});

/// Person-name recognizer built from capitalization heuristics.
///
/// A run of two to four capitalized words is a name once greeting, sign-off
/// and other non-name words are trimmed from both ends. A single remaining
/// word counts only when an honorific precedes it ("Dr. Mehta").
pub struct HeuristicRecognizer;

impl HeuristicRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn person_spans(&self, text: &str) -> Vec<RecognizedEntity> {
        let mut persons = Vec::new();

        for run in NAME_RUN_RE.find_iter(text) {
            let words: Vec<(usize, usize)> = NAME_WORD_RE
                .find_iter(run.as_str())
                .map(|m| (run.start() + m.start(), run.start() + m.end()))
                .collect();

            let mut titled = follows_honorific(text, run.start());
            let mut lo = 0;
            let mut hi = words.len();
            while lo < hi && is_non_name(&text[words[lo].0..words[lo].1]) {
                titled = HONORIFICS.contains(&&text[words[lo].0..words[lo].1]);
                lo += 1;
            }
            while hi > lo && is_non_name(&text[words[hi - 1].0..words[hi - 1].1]) {
                hi -= 1;
            }

            let kept = hi - lo;
            let is_name = (2..=MAX_NAME_WORDS).contains(&kept) || (kept == 1 && titled);
            if is_name {
                persons.push(RecognizedEntity {
                    kind: EntityKind::Person,
                    start: words[lo].0,
                    end: words[hi - 1].1,
                });
            }
        }

        persons
    }
}

impl Default for HeuristicRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRecognizer for HeuristicRecognizer {
    fn backend_id(&self) -> &str {
        "heuristic"
    }

    fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        Ok(self.person_spans(text))
    }
}

fn is_non_name(word: &str) -> bool {
    NON_NAME_WORDS.contains(word)
}

/// True when the text before `pos` ends with an honorific such as "Mr." or "Dr ".
fn follows_honorific(text: &str, pos: usize) -> bool {
    let before = text[..pos].trim_end_matches([' ', '\t']);
    let before = before.strip_suffix('.').unwrap_or(before);
    HONORIFICS.iter().any(|h| {
        before.strip_suffix(h).is_some_and(|rest| {
            rest.chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        })
    })
}

/// Create the best available recognizer for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present), falls
/// back to `HeuristicRecognizer`. When `required` is set, an ONNX load
/// failure is returned instead of falling back.
pub fn create_recognizer(model_dir: &Path, required: bool) -> Result<Arc<dyn EntityRecognizer>> {
    #[cfg(feature = "onnx")]
    {
        match crate::onnx_recognizer::OnnxRecognizer::load(model_dir) {
            Ok(recognizer) => {
                tracing::info!("Using ONNX recognizer ({} labels)", recognizer.label_count());
                return Ok(Arc::new(recognizer));
            }
            Err(e) if required => return Err(e),
            Err(e) => {
                tracing::warn!("ONNX recognizer unavailable: {}. Falling back to heuristics.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        if required {
            return Err(mailmask_core::Error::Recognizer(format!(
                "NER model configured at {} but the onnx feature is disabled",
                model_dir.display()
            )));
        }
        tracing::info!("ONNX feature disabled. Using heuristic name recognition.");
    }

    Ok(Arc::new(HeuristicRecognizer::new()))
}
