//! On-disk artifacts between pipeline stages.
//!
//! - Records: `{records_dir}/{stem}.json`, a pretty-printed array of
//!   `{ "page", "type", "content" }`. Content is a string for text, an array
//!   of row objects for tables, and a `data:image/png;base64,...` URI for
//!   images.
//! - Vectors: `{vectors_dir}/{stem}.json_text_embeddings.json` and
//!   `..._image_embeddings.json`, each `{ "model", "dims", "ids", "vectors" }`.
//!
//! A stem is the document's path relative to the input directory without
//! its extension, so `sub/manual.pdf` lands in `{records_dir}/sub/manual.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

use docsift_core::models::{assign_source_ids, ContentKind, ContentRecord, ImageEncoding, Payload, TableRow};

#[derive(Debug, Serialize, Deserialize)]
struct RecordJson {
    page: u32,
    #[serde(rename = "type")]
    kind: ContentKind,
    content: serde_json::Value,
}

/// Records artifact path for a document stem.
pub fn records_path(records_dir: &Path, stem: &str) -> PathBuf {
    records_dir.join(format!("{}.json", stem))
}

/// Vector artifact path for a document stem and modality.
pub fn vectors_path(vectors_dir: &Path, stem: &str, kind: ContentKind) -> PathBuf {
    let modality = match kind {
        ContentKind::Text | ContentKind::Table => "text",
        ContentKind::Image => "image",
    };
    vectors_dir.join(format!("{}.json_{}_embeddings.json", stem, modality))
}

pub fn data_uri(data: &[u8], encoding: ImageEncoding) -> String {
    format!("data:{};base64,{}", encoding.mime_type(), STANDARD.encode(data))
}

pub fn parse_data_uri(uri: &str) -> Result<(Vec<u8>, ImageEncoding)> {
    let rest = match uri.strip_prefix("data:") {
        Some(r) => r,
        None => bail!("not a data URI"),
    };
    let (mime, payload) = match rest.split_once(";base64,") {
        Some(parts) => parts,
        None => bail!("data URI is not base64-encoded"),
    };
    let encoding = ImageEncoding::from_mime_type(mime)
        .ok_or_else(|| anyhow::anyhow!("unsupported image type '{}'", mime))?;
    let data = STANDARD
        .decode(payload)
        .with_context(|| "invalid base64 in data URI")?;
    Ok((data, encoding))
}

fn to_json(record: &ContentRecord) -> Result<RecordJson> {
    let content = match &record.payload {
        Payload::Text(text) => serde_json::Value::String(text.clone()),
        Payload::Table(rows) => serde_json::to_value(rows)?,
        Payload::Image { data, encoding } => serde_json::Value::String(data_uri(data, *encoding)),
    };
    Ok(RecordJson {
        page: record.page,
        kind: record.kind(),
        content,
    })
}

fn from_json(item: RecordJson) -> Result<(u32, Payload)> {
    if item.page == 0 {
        bail!("page numbers are 1-based");
    }
    let payload = match item.kind {
        ContentKind::Text => match item.content {
            serde_json::Value::String(s) => Payload::Text(s),
            _ => bail!("text content must be a string"),
        },
        ContentKind::Table => Payload::Table(serde_json::from_value::<Vec<TableRow>>(item.content)?),
        ContentKind::Image => match item.content {
            serde_json::Value::String(uri) => {
                let (data, encoding) = parse_data_uri(&uri)?;
                Payload::Image { data, encoding }
            }
            _ => bail!("image content must be a data URI string"),
        },
    };
    Ok((item.page, payload))
}

/// Write records as a pretty-printed JSON array.
pub fn write_records(path: &Path, records: &[ContentRecord]) -> Result<()> {
    let items = records.iter().map(to_json).collect::<Result<Vec<_>>>()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&items)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write records: {}", path.display()))?;
    Ok(())
}

/// Records read back from an artifact.
#[derive(Debug)]
pub struct LoadedRecords {
    pub records: Vec<ContentRecord>,
    /// Items that did not parse and were skipped.
    pub skipped: usize,
}

/// Read a records artifact, re-deriving source ids for `document`.
///
/// An unreadable or non-array file fails; individual malformed items are
/// logged and skipped.
pub fn read_records(path: &Path, document: &str) -> Result<LoadedRecords> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records: {}", path.display()))?;
    let items: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Records file is not a JSON array: {}", path.display()))?;

    let mut parsed = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (i, value) in items.into_iter().enumerate() {
        match serde_json::from_value::<RecordJson>(value)
            .map_err(anyhow::Error::from)
            .and_then(from_json)
        {
            Ok(item) => parsed.push(item),
            Err(e) => {
                warn!(file = %path.display(), index = i, error = %e, "skipping malformed record");
                skipped += 1;
            }
        }
    }

    Ok(LoadedRecords {
        records: assign_source_ids(document, parsed),
        skipped,
    })
}

/// Vectors for one document and modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorArtifact {
    pub model: String,
    pub dims: usize,
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

pub fn write_vectors(path: &Path, artifact: &VectorArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, serde_json::to_string(artifact)?)
        .with_context(|| format!("Failed to write vectors: {}", path.display()))?;
    Ok(())
}
