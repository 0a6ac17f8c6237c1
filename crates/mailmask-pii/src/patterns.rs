//! Structured PII detection using regex patterns.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entity::{Detection, PiiLabel};

// Compiled regex patterns (compiled once, reused). Digits are ASCII only.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{10}\b").unwrap());
static DOB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:0[1-9]|[12][0-9]|3[01])[-/.](?:0[1-9]|1[0-2])[-/.][0-9]{4}\b").unwrap()
});
static AADHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{4}\s?[0-9]{4}\s?[0-9]{4}\b").unwrap());
static CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{4}(?:[-\s]?[0-9]{4}){3}\b").unwrap());
static CVV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{3}\b").unwrap());
static EXPIRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:0[1-9]|1[0-2])/[0-9]{2}\b").unwrap());

/// Applies the fixed pattern table to raw text.
///
/// Matches of one pattern never overlap each other; matches of different
/// patterns may. Detections come out in table order, then by position.
pub struct PatternMatcher {
    patterns: Vec<(PiiLabel, &'static Regex)>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self {
            patterns: vec![
                (PiiLabel::Email, &EMAIL_RE),
                (PiiLabel::PhoneNumber, &PHONE_RE),
                (PiiLabel::Dob, &DOB_RE),
                (PiiLabel::AadharNum, &AADHAR_RE),
                (PiiLabel::CreditDebitNo, &CARD_RE),
                (PiiLabel::CvvNo, &CVV_RE),
                (PiiLabel::ExpiryNo, &EXPIRY_RE),
            ],
        }
    }

    /// Detect structured PII in text.
    pub fn detect(&self, text: &str) -> Vec<Detection> {
        let mut detections = Vec::new();

        for (label, regex) in &self.patterns {
            for m in regex.find_iter(text) {
                detections.push(Detection {
                    label: *label,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        detections
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}
