//! Core data models used throughout docsift.
//!
//! These types represent the content records produced by extraction and the
//! entries persisted in a vector store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// The closed set of content kinds a document can yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Table,
    Image,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Text, ContentKind::Table, ContentKind::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Table => "table",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "table" => Ok(ContentKind::Table),
            "image" => Ok(ContentKind::Image),
            other => Err(format!(
                "unknown content kind '{}': expected text, table, or image",
                other
            )),
        }
    }
}

/// One table row: column name → cell value, in header order.
///
/// Serialized as a JSON object whose key order follows the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRow {
    cells: Vec<(String, String)>,
}

impl TableRow {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Pair each header with the cell at the same position.
    ///
    /// Returns `None` when the counts differ.
    pub fn from_header(header: &[String], cells: &[String]) -> Option<Self> {
        if header.len() != cells.len() {
            return None;
        }
        Some(Self {
            cells: header.iter().cloned().zip(cells.iter().cloned()).collect(),
        })
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TableRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = TableRow;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TableRow, A::Error> {
                let mut cells = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, value)) = access.next_entry::<String, Option<String>>()? {
                    cells.push((column, value.unwrap_or_default()));
                }
                Ok(TableRow { cells })
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Encoding tag for image payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Png,
}

impl ImageEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(ImageEncoding::Png),
            _ => None,
        }
    }
}

/// Kind-dependent content of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Table(Vec<TableRow>),
    Image { data: Vec<u8>, encoding: ImageEncoding },
}

impl Payload {
    pub fn kind(&self) -> ContentKind {
        match self {
            Payload::Text(_) => ContentKind::Text,
            Payload::Table(_) => ContentKind::Table,
            Payload::Image { .. } => ContentKind::Image,
        }
    }
}

/// One extracted unit of document content.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    /// 1-based page index.
    pub page: u32,
    /// `"{document}:{page}:{kind}:{ordinal}"`.
    pub source_id: String,
    pub payload: Payload,
}

impl ContentRecord {
    pub fn kind(&self) -> ContentKind {
        self.payload.kind()
    }
}

/// Build the stable record identifier.
pub fn source_id(document: &str, page: u32, kind: ContentKind, ordinal: usize) -> String {
    format!("{}:{}:{}:{}", document, page, kind, ordinal)
}

/// Attach source ids to an ordered `(page, payload)` sequence.
///
/// The ordinal counts records of the same kind on the same page, in
/// sequence order, so the same sequence always yields the same ids.
pub fn assign_source_ids(document: &str, items: Vec<(u32, Payload)>) -> Vec<ContentRecord> {
    let mut seen: BTreeMap<(u32, ContentKind), usize> = BTreeMap::new();
    items
        .into_iter()
        .map(|(page, payload)| {
            let counter = seen.entry((page, payload.kind())).or_insert(0);
            let id = source_id(document, page, payload.kind(), *counter);
            *counter += 1;
            ContentRecord {
                page,
                source_id: id,
                payload,
            }
        })
        .collect()
}

/// Scalar metadata value attached to a stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// The persisted unit in a vector store collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    /// Human-readable payload: original text, flattened table, or image path.
    pub document: String,
}

/// A ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    /// Higher is better for every metric.
    pub score: f32,
    pub metadata: Metadata,
    pub document: String,
}

/// SHA-256 hex digest used to tag stored entries with their input content.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_row_keeps_header_order_in_json() {
        let row = TableRow::new(vec![
            ("Value".to_string(), "10".to_string()),
            ("Parameter".to_string(), "Speed".to_string()),
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Value":"10","Parameter":"Speed"}"#);

        let back: TableRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cells()[0].0, "Value");
        assert_eq!(back.get("Parameter"), Some("Speed"));
    }

    #[test]
    fn table_row_null_cell_becomes_empty() {
        let row: TableRow = serde_json::from_str(r#"{"A":null,"B":"x"}"#).unwrap();
        assert_eq!(row.get("A"), Some(""));
    }

    #[test]
    fn from_header_rejects_length_mismatch() {
        let header = vec!["A".to_string(), "B".to_string()];
        let cells = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        assert!(TableRow::from_header(&header, &cells).is_none());
        assert!(TableRow::from_header(&header, &cells[..2]).is_some());
    }

    #[test]
    fn source_ids_count_per_page_and_kind() {
        let records = assign_source_ids(
            "manual.pdf",
            vec![
                (1, Payload::Text("a".into())),
                (1, Payload::Table(vec![])),
                (1, Payload::Table(vec![])),
                (2, Payload::Table(vec![])),
            ],
        );
        let ids: Vec<&str> = records.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "manual.pdf:1:text:0",
                "manual.pdf:1:table:0",
                "manual.pdf:1:table:1",
                "manual.pdf:2:table:0",
            ]
        );
    }

    #[test]
    fn content_kind_parses() {
        assert_eq!("table".parse::<ContentKind>().unwrap(), ContentKind::Table);
        assert!("chart".parse::<ContentKind>().is_err());
    }

    #[test]
    fn metadata_value_untagged_json() {
        let mut m = Metadata::new();
        m.insert("page".into(), MetadataValue::Int(3));
        m.insert("source".into(), "a.pdf".into());
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"page":3,"source":"a.pdf"}"#);
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
