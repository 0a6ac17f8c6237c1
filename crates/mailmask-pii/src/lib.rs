//! PII detection and masking for email text.
//!
//! Structured PII (emails, phone numbers, dates of birth, Aadhaar numbers,
//! card numbers, CVVs, expiry dates) is found with a fixed regex table.
//! Person names come from an `EntityRecognizer`: the built-in heuristic
//! backend, or an ONNX token-classification model with the `onnx` feature.
//! `Masker` merges both sources and rewrites the text with `[label]` tokens;
//! `demask` reverses it from the returned entity records.

pub mod entity;
pub mod masker;
pub mod onnx_recognizer;
pub mod patterns;
pub mod recognizer;

pub use entity::{Detection, EntityRecord, PiiLabel};
pub use masker::{demask, MaskResult, Masker, OverlapPolicy};
pub use patterns::PatternMatcher;
pub use recognizer::{
    create_recognizer, EntityKind, EntityRecognizer, HeuristicRecognizer, RecognizedEntity,
};

#[cfg(feature = "onnx")]
pub use onnx_recognizer::OnnxRecognizer;
