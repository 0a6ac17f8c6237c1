//! ONNX-based named-entity recognizer.
//!
//! Loads a BERT-style token-classification model and its tokenizer, then
//! decodes BIO tags (`B-PER`, `I-PER`, ...) into byte spans using the
//! tokenizer's offsets. Texts longer than one model window are tagged in
//! overlapping windows whose spans are merged. Requires the `onnx` feature.

use crate::recognizer::RecognizedEntity;

/// Combine spans decoded from overlapping windows.
///
/// Overlapping spans of the same kind are unioned, so a name cut at one
/// window's edge and seen whole in the next comes out once. Output is
/// ordered by start offset.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub(crate) fn merge_window_spans(mut spans: Vec<RecognizedEntity>) -> Vec<RecognizedEntity> {
    spans.sort_by_key(|e| (e.start, e.end));

    let mut merged: Vec<RecognizedEntity> = Vec::with_capacity(spans.len());
    for span in spans {
        let open = merged
            .iter_mut()
            .rev()
            .find(|m| m.kind == span.kind && span.start < m.end);
        match open {
            Some(m) => m.end = m.end.max(span.end),
            None => merged.push(span),
        }
    }
    merged
}

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use mailmask_core::{Error, Result};
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::{Encoding, Tokenizer, TruncationParams};
    use tracing::{debug, info};

    use super::merge_window_spans;
    use crate::recognizer::{EntityKind, EntityRecognizer, RecognizedEntity};

    /// Maximum sequence length for the model, special tokens included.
    const MAX_SEQ_LEN: usize = 512;

    /// Tokens shared by consecutive windows.
    const WINDOW_STRIDE: usize = 128;

    /// ONNX token-classification recognizer.
    pub struct OnnxRecognizer {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        labels: Vec<String>,
    }

    impl OnnxRecognizer {
        /// Load an ONNX model, tokenizer and label list from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        /// - `model_dir/labels.json`: JSON array of BIO labels indexed by class id
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            let labels_path = model_dir.join("labels.json");

            for path in [&model_path, &tokenizer_path, &labels_path] {
                if !path.exists() {
                    return Err(Error::Recognizer(format!("Missing {}", path.display())));
                }
            }

            let labels: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&labels_path)?)?;
            if labels.is_empty() {
                return Err(Error::Recognizer("labels.json is empty".into()));
            }

            // With load-dynamic feature, ORT_DYLIB_PATH env var must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Recognizer(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Recognizer(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Recognizer(format!("Failed to load ONNX model: {}", e)))?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Recognizer(format!("Failed to load tokenizer: {}", e)))?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: MAX_SEQ_LEN,
                    stride: WINDOW_STRIDE,
                    ..Default::default()
                }))
                .map_err(|e| Error::Recognizer(format!("Failed to configure truncation: {}", e)))?;

            info!(
                "ONNX recognizer loaded: labels={}, model={}",
                labels.len(),
                model_path.display()
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                labels,
            })
        }

        pub fn label_count(&self) -> usize {
            self.labels.len()
        }

        /// Run the model on one window and return the predicted label id and
        /// byte offsets per token.
        fn tag_window(&self, encoding: &Encoding) -> Result<Vec<(usize, (usize, usize))>> {
            let seq_len = encoding.get_ids().len();
            let ids_data: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];
            let offsets = encoding.get_offsets();

            let tensor = |data: Vec<i64>| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| Error::Recognizer(format!("Failed to create tensor: {}", e)))
            };
            let ids_tensor = tensor(ids_data)?;
            let mask_tensor = tensor(mask_data)?;
            let type_ids_tensor = tensor(type_ids_data)?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| Error::Recognizer(format!("ONNX inference failed: {}", e)))?;

            // Logits laid out as [batch=1][seq_len][num_labels]
            let (shape, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Recognizer(format!("Failed to extract logits: {}", e)))?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            if dims.len() != 3 || dims[2] as usize != self.labels.len() {
                return Err(Error::Recognizer(format!("Unexpected output shape: {:?}", dims)));
            }
            let num_labels = dims[2] as usize;

            let tagged = (0..seq_len)
                .map(|i| {
                    let row = &logits[i * num_labels..(i + 1) * num_labels];
                    let best = row
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    (best, offsets[i])
                })
                .collect();
            Ok(tagged)
        }
    }

    /// Merge BIO-tagged tokens into entity spans. Special tokens carry empty offsets.
    pub(crate) fn decode_bio(labels: &[String], tagged: &[(usize, (usize, usize))]) -> Vec<RecognizedEntity> {
        let mut entities = Vec::new();
        let mut current: Option<(String, usize, usize)> = None;

        for &(label_id, (start, end)) in tagged {
            if start == end {
                continue;
            }
            let label = labels.get(label_id).map(String::as_str).unwrap_or("O");
            let (prefix, tag) = label.split_once('-').unwrap_or(("O", ""));

            match (prefix, current.as_mut()) {
                ("I", Some((open, _, open_end))) if open.as_str() == tag => {
                    *open_end = end;
                    continue;
                }
                _ => {}
            }
            if let Some((tag, s, e)) = current.take() {
                entities.push(RecognizedEntity { kind: EntityKind::from_tag(&tag), start: s, end: e });
            }
            if prefix == "B" || prefix == "I" {
                current = Some((tag.to_string(), start, end));
            }
        }
        if let Some((tag, s, e)) = current {
            entities.push(RecognizedEntity { kind: EntityKind::from_tag(&tag), start: s, end: e });
        }

        entities
    }

    impl EntityRecognizer for OnnxRecognizer {
        fn backend_id(&self) -> &str {
            "onnx"
        }

        fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Recognizer(format!("Tokenization failed: {}", e)))?;

            let windows = std::iter::once(&encoding).chain(encoding.get_overflowing());
            let mut spans = Vec::new();
            let mut window_count = 0;
            for window in windows {
                let tagged = self.tag_window(window)?;
                spans.extend(decode_bio(&self.labels, &tagged));
                window_count += 1;
            }

            let entities = merge_window_spans(spans);
            debug!(
                "ONNX recognizer found {} entities in {} windows",
                entities.len(),
                window_count
            );
            Ok(entities)
        }
    }

}

#[cfg(feature = "onnx")]
pub use inner::OnnxRecognizer;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::EntityKind;

    fn span(kind: EntityKind, start: usize, end: usize) -> RecognizedEntity {
        RecognizedEntity { kind, start, end }
    }

    #[test]
    fn test_merge_joins_name_cut_at_window_edge() {
        // First window ends after "John", second window sees "John Smith".
        let spans = vec![
            span(EntityKind::Person, 2000, 2004),
            span(EntityKind::Person, 2000, 2010),
        ];
        assert_eq!(
            merge_window_spans(spans),
            vec![span(EntityKind::Person, 2000, 2010)]
        );
    }

    #[test]
    fn test_merge_dedupes_spans_seen_in_both_windows() {
        let spans = vec![
            span(EntityKind::Person, 10, 20),
            span(EntityKind::Person, 3000, 3012),
            span(EntityKind::Person, 10, 20),
        ];
        assert_eq!(
            merge_window_spans(spans),
            vec![
                span(EntityKind::Person, 10, 20),
                span(EntityKind::Person, 3000, 3012),
            ]
        );
    }

    #[test]
    fn test_merge_unions_partial_overlap() {
        // Tail of one window tags "Anita", head of the next tags "ita Rao".
        let spans = vec![
            span(EntityKind::Person, 102, 111),
            span(EntityKind::Person, 100, 105),
        ];
        assert_eq!(
            merge_window_spans(spans),
            vec![span(EntityKind::Person, 100, 111)]
        );
    }

    #[test]
    fn test_merge_keeps_adjacent_and_other_kinds_apart() {
        let spans = vec![
            span(EntityKind::Organization, 5, 15),
            span(EntityKind::Person, 0, 10),
            span(EntityKind::Person, 10, 14),
        ];
        assert_eq!(
            merge_window_spans(spans),
            vec![
                span(EntityKind::Person, 0, 10),
                span(EntityKind::Organization, 5, 15),
                span(EntityKind::Person, 10, 14),
            ]
        );
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_window_spans(Vec::new()).is_empty());
    }
}
