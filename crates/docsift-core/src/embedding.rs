//! Encoder traits, embedding dispatch, and vector utilities.
//!
//! Defines the [`TextEncoder`] and [`ImageEncoder`] traits that every
//! embedding backend implements, the [`EmbeddingGenerator`] that routes
//! normalized inputs to the encoder for their modality, and pure helpers for
//! vector serialization and similarity.
//!
//! Concrete encoders (local ONNX models via fastembed) live in the
//! `docsift` app crate. They are constructed once, shared behind [`Arc`],
//! and never reloaded.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Maps batches of text to fixed-width vectors.
///
/// Implementations must be deterministic for fixed weights and input, and
/// must return exactly one vector of width [`dims`](TextEncoder::dims) per
/// input, in input order.
pub trait TextEncoder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding width (e.g. `384`).
    fn dims(&self) -> usize;
    fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Maps batches of decoded images to fixed-width vectors.
///
/// `result[i]` corresponds to `images[i]`.
pub trait ImageEncoder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    fn embed_image(&self, images: &[PixelBuffer]) -> Result<Vec<Vec<f32>>>;
}

/// A decoded image: RGB8, row-major, `width * height * 3` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl PixelBuffer {
    /// Returns `None` if `rgb` does not hold exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        if rgb.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, rgb })
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

/// Normalized input for one record, ready for its encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderInput {
    Text(String),
    Image(PixelBuffer),
}

/// Routes inputs to the text or image encoder and enforces the output
/// contract (count and width) of both.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    text: Arc<dyn TextEncoder>,
    image: Option<Arc<dyn ImageEncoder>>,
    batch_size: usize,
}

impl EmbeddingGenerator {
    pub fn new(
        text: Arc<dyn TextEncoder>,
        image: Option<Arc<dyn ImageEncoder>>,
        batch_size: usize,
    ) -> Self {
        Self {
            text,
            image,
            batch_size: batch_size.max(1),
        }
    }

    pub fn text_encoder(&self) -> Arc<dyn TextEncoder> {
        Arc::clone(&self.text)
    }

    pub fn image_encoder(&self) -> Option<Arc<dyn ImageEncoder>> {
        self.image.clone()
    }

    pub fn has_image_encoder(&self) -> bool {
        self.image.is_some()
    }

    /// Embed texts in batches of `batch_size`.
    pub fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.text.embed_text(batch)?;
            check_batch(self.text.model_name(), self.text.dims(), batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }

    /// Embed images in batches of `batch_size`.
    pub fn embed_image(&self, images: &[PixelBuffer]) -> Result<Vec<Vec<f32>>> {
        let encoder = match &self.image {
            Some(e) => e,
            None => bail!("No image encoder configured"),
        };
        let mut out = Vec::with_capacity(images.len());
        for batch in images.chunks(self.batch_size) {
            let vectors = encoder.embed_image(batch)?;
            check_batch(encoder.model_name(), encoder.dims(), batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }

    /// Embed a mixed sequence, returning vectors in input order.
    pub fn embed_inputs(&self, inputs: &[EncoderInput]) -> Result<Vec<Vec<f32>>> {
        let mut texts = Vec::new();
        let mut images = Vec::new();
        for input in inputs {
            match input {
                EncoderInput::Text(t) => texts.push(t.clone()),
                EncoderInput::Image(p) => images.push(p.clone()),
            }
        }

        let mut text_vecs = self.embed_text(&texts)?.into_iter();
        let mut image_vecs = if images.is_empty() {
            Vec::new().into_iter()
        } else {
            self.embed_image(&images)?.into_iter()
        };

        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            let next = match input {
                EncoderInput::Text(_) => text_vecs.next(),
                EncoderInput::Image(_) => image_vecs.next(),
            };
            match next {
                Some(v) => out.push(v),
                None => bail!("Encoder returned fewer vectors than inputs"),
            }
        }
        Ok(out)
    }
}

fn check_batch(model: &str, dims: usize, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "Encoder '{}' returned {} vectors for {} inputs",
            model,
            vectors.len(),
            expected
        );
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
        bail!(
            "Encoder '{}' returned a {}-dim vector, expected {}",
            model,
            v.len(),
            dims
        );
    }
    Ok(())
}

/// Similarity metric of a collection, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }

    /// Score where higher is always better: cosine similarity, or the
    /// negated Euclidean distance for `L2`.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::L2 => -l2_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "l2" => Ok(Metric::L2),
            other => Err(format!("unknown metric '{}': expected cosine or l2", other)),
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docsift_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Euclidean distance; `f32::INFINITY` for vectors of different lengths.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LenEncoder {
        calls: AtomicUsize,
    }

    impl TextEncoder for LenEncoder {
        fn model_name(&self) -> &str {
            "len"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct WidthEncoder;

    impl ImageEncoder for WidthEncoder {
        fn model_name(&self) -> &str {
            "width"
        }
        fn dims(&self) -> usize {
            3
        }
        fn embed_image(&self, images: &[PixelBuffer]) -> Result<Vec<Vec<f32>>> {
            Ok(images
                .iter()
                .map(|p| vec![p.width as f32, p.height as f32, 0.0])
                .collect())
        }
    }

    struct ShortEncoder;

    impl TextEncoder for ShortEncoder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            4
        }
        fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 2.0]).collect())
        }
    }

    fn pixels(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::new(w, h, vec![0; (w * h * 3) as usize]).unwrap()
    }

    #[test]
    fn test_embed_text_batches() {
        let enc = Arc::new(LenEncoder {
            calls: AtomicUsize::new(0),
        });
        let gen = EmbeddingGenerator::new(enc.clone(), None, 2);
        let texts: Vec<String> = vec!["a".into(), "bb".into(), "ccc".into()];
        let vecs = gen.embed_text(&texts).unwrap();
        assert_eq!(vecs.len(), 3);
        assert_eq!(vecs[2], vec![3.0, 1.0]);
        assert_eq!(enc.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_embed_inputs_preserves_order() {
        let gen = EmbeddingGenerator::new(
            Arc::new(LenEncoder {
                calls: AtomicUsize::new(0),
            }),
            Some(Arc::new(WidthEncoder)),
            8,
        );
        let inputs = vec![
            EncoderInput::Image(pixels(7, 1)),
            EncoderInput::Text("abcd".into()),
            EncoderInput::Image(pixels(9, 2)),
        ];
        let vecs = gen.embed_inputs(&inputs).unwrap();
        assert_eq!(vecs[0], vec![7.0, 1.0, 0.0]);
        assert_eq!(vecs[1], vec![4.0, 1.0]);
        assert_eq!(vecs[2], vec![9.0, 2.0, 0.0]);
    }

    #[test]
    fn test_image_without_encoder_fails() {
        let gen = EmbeddingGenerator::new(
            Arc::new(LenEncoder {
                calls: AtomicUsize::new(0),
            }),
            None,
            8,
        );
        assert!(gen.embed_image(&[pixels(1, 1)]).is_err());
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let gen = EmbeddingGenerator::new(Arc::new(ShortEncoder), None, 8);
        let err = gen.embed_text(&["x".to_string()]).unwrap_err();
        assert!(err.to_string().contains("expected 4"));
    }

    #[test]
    fn test_pixel_buffer_checks_length() {
        assert!(PixelBuffer::new(2, 2, vec![0; 12]).is_some());
        assert!(PixelBuffer::new(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_l2_score_prefers_closer() {
        let q = [0.0, 0.0];
        let near = Metric::L2.score(&q, &[1.0, 0.0]);
        let far = Metric::L2.score(&q, &[3.0, 4.0]);
        assert!(near > far);
        assert!((far + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert!("dot".parse::<Metric>().is_err());
    }
}
