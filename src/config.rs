use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docsift_core::embedding::Metric;
use docsift_core::models::ContentKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub input: InputConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
    #[serde(default = "default_vectors_dir")]
    pub vectors_dir: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    /// Persist rendered pages as PNG files next to the records.
    #[serde(default = "default_true")]
    pub save_images: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            vectors_dir: default_vectors_dir(),
            images_dir: default_images_dir(),
            save_images: true,
        }
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("./data/records")
}
fn default_vectors_dir() -> PathBuf {
    PathBuf::from("./data/vectors")
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("./data/images")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_true")]
    pub tables: bool,
    #[serde(default = "default_true")]
    pub images: bool,
    /// Longest edge of a rendered page, in pixels.
    #[serde(default = "default_render_max_pixels")]
    pub render_max_pixels: u32,
    /// Tie-break order for records on the same page.
    #[serde(default = "default_kind_order")]
    pub kind_order: Vec<ContentKind>,
    /// Directory or file of the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, then the system library.
    #[serde(default)]
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            tables: true,
            images: true,
            render_max_pixels: default_render_max_pixels(),
            kind_order: default_kind_order(),
            pdfium_lib_path: None,
        }
    }
}

fn default_render_max_pixels() -> u32 {
    2000
}
fn default_kind_order() -> Vec<ContentKind> {
    ContentKind::ALL.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_text_model")]
    pub text_model: String,
    /// `None` disables image embedding; image records are still extracted.
    /// In TOML, `""` or `"none"` turn it off.
    #[serde(
        default = "default_image_model",
        deserialize_with = "deserialize_image_model"
    )]
    pub image_model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Where model weights are cached. Defaults to fastembed's own cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            image_model: default_image_model(),
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

fn default_text_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_image_model() -> Option<String> {
    Some("clip-vit-b-32".to_string())
}

fn deserialize_image_model<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
fn default_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub metric: Metric,
}

fn default_collection() -> String {
    "docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_document_timeout_secs")]
    pub document_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            document_timeout_secs: default_document_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_document_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.input.include_globs.is_empty() {
        bail!("input.include_globs must not be empty");
    }

    if config.store.collection.trim().is_empty() {
        bail!("store.collection must not be empty");
    }

    if config.extract.render_max_pixels == 0 {
        bail!("extract.render_max_pixels must be > 0");
    }

    let mut order = config.extract.kind_order.clone();
    order.sort();
    order.dedup();
    if order.len() != ContentKind::ALL.len() || config.extract.kind_order.len() != order.len() {
        bail!("extract.kind_order must list text, table, and image exactly once");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.text_model.trim().is_empty() {
        bail!("embedding.text_model must not be empty");
    }

    if config.ingest.workers == 0 {
        bail!("ingest.workers must be >= 1");
    }
    if config.ingest.document_timeout_secs == 0 {
        bail!("ingest.document_timeout_secs must be >= 1");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    Ok(())
}
