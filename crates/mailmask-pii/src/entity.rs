//! PII labels and entity records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Categories of PII that can be masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiLabel {
    FullName,
    Email,
    PhoneNumber,
    Dob,
    AadharNum,
    CreditDebitNo,
    CvvNo,
    ExpiryNo,
}

impl PiiLabel {
    pub const ALL: [PiiLabel; 8] = [
        PiiLabel::FullName,
        PiiLabel::Email,
        PiiLabel::PhoneNumber,
        PiiLabel::Dob,
        PiiLabel::AadharNum,
        PiiLabel::CreditDebitNo,
        PiiLabel::CvvNo,
        PiiLabel::ExpiryNo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PiiLabel::FullName => "full_name",
            PiiLabel::Email => "email",
            PiiLabel::PhoneNumber => "phone_number",
            PiiLabel::Dob => "dob",
            PiiLabel::AadharNum => "aadhar_num",
            PiiLabel::CreditDebitNo => "credit_debit_no",
            PiiLabel::CvvNo => "cvv_no",
            PiiLabel::ExpiryNo => "expiry_no",
        }
    }

    /// Placeholder written into masked text, e.g. `[email]`.
    pub fn token(&self) -> String {
        format!("[{}]", self.label())
    }
}

impl fmt::Display for PiiLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A labeled byte span found by a detector, before masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub label: PiiLabel,
    /// Byte offset, inclusive.
    pub start: usize,
    /// Byte offset, exclusive.
    pub end: usize,
}

/// A masked entity as reported to callers.
///
/// `position` holds character offsets into the original, unmasked text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub position: [usize; 2],
    pub classification: PiiLabel,
    pub entity: String,
}

impl EntityRecord {
    pub fn start(&self) -> usize {
        self.position[0]
    }

    pub fn end(&self) -> usize {
        self.position[1]
    }
}
