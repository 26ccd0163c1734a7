//! Record normalization: content records → encoder inputs.
//!
//! Text passes through unchanged. Tables are flattened to one line per row
//! (`"{col}: {value}; {col}: {value}"`). Images are decoded to RGB8 pixels.

use image::ImageReader;
use std::io::Cursor;
use thiserror::Error;

use docsift_core::embedding::{EncoderInput, PixelBuffer};
use docsift_core::models::{ContentRecord, ImageEncoding, Payload, TableRow};

/// Record-level normalization failure; the record is dropped.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("table record '{0}' has no rows")]
    EmptyTable(String),

    #[error("image record '{source_id}' could not be decoded: {detail}")]
    Decode { source_id: String, detail: String },
}

/// Encoder input plus the human-readable form that is stored alongside it.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub input: EncoderInput,
    /// Bytes the content hash is computed over.
    pub hash_source: Vec<u8>,
    /// Text form for text and table records; `None` for images.
    pub text: Option<String>,
}

pub fn normalize(record: &ContentRecord) -> Result<Normalized, NormalizeError> {
    match &record.payload {
        Payload::Text(text) => Ok(Normalized {
            input: EncoderInput::Text(text.clone()),
            hash_source: text.as_bytes().to_vec(),
            text: Some(text.clone()),
        }),
        Payload::Table(rows) => {
            if rows.is_empty() {
                return Err(NormalizeError::EmptyTable(record.source_id.clone()));
            }
            let flat = flatten_table(rows);
            Ok(Normalized {
                input: EncoderInput::Text(flat.clone()),
                hash_source: flat.as_bytes().to_vec(),
                text: Some(flat),
            })
        }
        Payload::Image { data, encoding } => {
            let pixels = decode_image(data, *encoding).map_err(|detail| NormalizeError::Decode {
                source_id: record.source_id.clone(),
                detail,
            })?;
            Ok(Normalized {
                input: EncoderInput::Image(pixels),
                hash_source: data.clone(),
                text: None,
            })
        }
    }
}

/// One line per row, cells in header order.
pub fn flatten_table(rows: &[TableRow]) -> String {
    rows.iter()
        .map(|row| {
            row.cells()
                .iter()
                .map(|(col, value)| format!("{}: {}", col, value))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_image(data: &[u8], encoding: ImageEncoding) -> Result<PixelBuffer, String> {
    let format = match encoding {
        ImageEncoding::Png => image::ImageFormat::Png,
    };
    let mut reader = ImageReader::new(Cursor::new(data));
    reader.set_format(format);
    let rgb = reader.decode().map_err(|e| e.to_string())?.to_rgb8();
    let (width, height) = rgb.dimensions();
    PixelBuffer::new(width, height, rgb.into_raw())
        .ok_or_else(|| "decoded buffer has unexpected length".to_string())
}
