//! Ingestion pipeline orchestration.
//!
//! Coordinates the batch flow: PDF → extraction → records artifact →
//! normalization → embedding → vector artifacts → store upserts. Three
//! entry stages share one driver:
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`Stage::Extract`] | PDFs | records JSON |
//! | [`Stage::Embed`] | records JSON | vector JSON + store entries |
//! | [`Stage::Ingest`] | PDFs | all of the above in one pass |
//!
//! Documents run concurrently, bounded by a semaphore with `ingest.workers`
//! permits, and each one is cut off after `ingest.document_timeout_secs`.
//! A failing, panicking, or timed-out document is logged and counted as
//! skipped under its own name; the batch goes on.
//!
//! Documents are identified by their path relative to `input.dir`, so
//! `line-a/manual.pdf` and `line-b/manual.pdf` never share source ids or
//! artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use docsift_core::embedding::{EmbeddingGenerator, EncoderInput, Metric};
use docsift_core::models::{content_hash, ContentKind, ContentRecord, Metadata, MetadataValue, StoredEntry};
use docsift_core::store::{collection_for, Collection, VectorStore};

use crate::artifacts::{self, VectorArtifact};
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::extract::{document_id, document_stem, page_image_path, Extractor};
use crate::normalize::{normalize, Normalized};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scan;
use crate::sqlite_store::SqliteStore;

/// Which part of the pipeline a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Embed,
    Ingest,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Embed => "embed",
            Stage::Ingest => "ingest",
        }
    }
}

/// Paths and limits the pipeline needs from the config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub collection: String,
    /// Root that document ids are relative to.
    pub input_dir: Option<PathBuf>,
    pub metric: Metric,
    pub records_dir: PathBuf,
    pub vectors_dir: PathBuf,
    pub images_dir: PathBuf,
    /// Write records and vector artifacts during `ingest`.
    pub write_artifacts: bool,
    pub workers: usize,
    pub document_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.store.collection.clone(),
            input_dir: Some(config.input.dir.clone()),
            metric: config.store.metric,
            records_dir: config.output.records_dir.clone(),
            vectors_dir: config.output.vectors_dir.clone(),
            images_dir: config.output.images_dir.clone(),
            write_artifacts: true,
            workers: config.ingest.workers,
            document_timeout: Duration::from_secs(config.ingest.document_timeout_secs),
        }
    }
}

/// Outcome of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub document: String,
    pub records: usize,
    pub dropped: usize,
    pub stored: usize,
    /// Image records left out because no image encoder is configured.
    pub unembedded: usize,
}

/// Totals for one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub documents: usize,
    pub processed: usize,
    pub skipped: usize,
    pub records: usize,
    pub dropped: usize,
    pub stored: usize,
    pub unembedded: usize,
    /// `(document, reason)` for each skipped document.
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    fn add(&mut self, report: &DocumentReport) {
        self.processed += 1;
        self.records += report.records;
        self.dropped += report.dropped;
        self.stored += report.stored;
        self.unembedded += report.unembedded;
    }

    fn skip(&mut self, document: String, reason: String) {
        self.skipped += 1;
        self.failures.push((document, reason));
    }

    pub fn print(&self, stage: Stage) {
        println!("{}", stage.as_str());
        println!("  documents: {}", self.documents);
        println!("  processed: {}", self.processed);
        println!("  skipped: {}", self.skipped);
        println!("  records: {}", self.records);
        println!("  records dropped: {}", self.dropped);
        if stage != Stage::Extract {
            println!("  entries stored: {}", self.stored);
        }
        if self.unembedded > 0 {
            println!("  images not embedded: {}", self.unembedded);
        }
        for (document, reason) in &self.failures {
            println!("  skipped {}: {}", document, reason);
        }
        println!("ok");
    }
}

struct Inner {
    extractor: Option<Extractor>,
    generator: Option<EmbeddingGenerator>,
    store: Option<Arc<dyn VectorStore>>,
    text: Option<Collection>,
    image_collection: Option<String>,
    settings: PipelineSettings,
}

/// The document pipeline. Cheap to clone; clones share encoders and store.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    /// Extraction only: used by `extract`.
    pub fn extract_only(extractor: Extractor, settings: PipelineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                extractor: Some(extractor),
                generator: None,
                store: None,
                text: None,
                image_collection: None,
                settings,
            }),
        }
    }

    /// Full pipeline. Opens `{collection}.text` (and `{collection}.image`
    /// when an image encoder is present) and checks that their widths match
    /// the encoders.
    pub async fn open(
        extractor: Option<Extractor>,
        generator: EmbeddingGenerator,
        store: Arc<dyn VectorStore>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let text_name = collection_for(&settings.collection, ContentKind::Text);
        let text = Collection::open(
            Arc::clone(&store),
            &text_name,
            settings.metric,
            generator.text_encoder(),
        )
        .await
        .with_context(|| format!("Failed to open collection '{}'", text_name))?;

        let image_collection = match generator.image_encoder() {
            Some(encoder) => {
                let name = collection_for(&settings.collection, ContentKind::Image);
                let info = store
                    .ensure_collection(&name, settings.metric)
                    .await
                    .with_context(|| format!("Failed to open collection '{}'", name))?;
                if let Some(dims) = info.dims {
                    if dims != encoder.dims() {
                        bail!(
                            "Collection '{}' holds {}-dim vectors but image model '{}' produces {}",
                            name,
                            dims,
                            encoder.model_name(),
                            encoder.dims()
                        );
                    }
                }
                store
                    .bind_model(&name, encoder.model_name())
                    .await
                    .with_context(|| format!("Failed to open collection '{}'", name))?;
                Some(name)
            }
            None => None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                extractor,
                generator: Some(generator),
                store: Some(store),
                text: Some(text),
                image_collection,
                settings,
            }),
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    fn extractor(&self) -> Result<&Extractor> {
        match &self.inner.extractor {
            Some(e) => Ok(e),
            None => bail!("pipeline was opened without an extractor"),
        }
    }

    /// Run `stage` over `inputs` with bounded concurrency and per-document
    /// timeouts. Never fails as a whole; failures are in the summary.
    pub async fn run(
        &self,
        stage: Stage,
        inputs: Vec<PathBuf>,
        progress: &dyn ProgressReporter,
    ) -> BatchSummary {
        let total = inputs.len();
        let semaphore = Arc::new(Semaphore::new(self.inner.settings.workers.max(1)));
        let timeout = self.inner.settings.document_timeout;
        let mut tasks = JoinSet::new();

        for path in inputs {
            let name = self.document_label(stage, &path);
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        // The document runs in its own task so a panic
                        // surfaces here, next to its name.
                        let mut work = tokio::spawn(async move { this.process(stage, &path).await });
                        match tokio::time::timeout(timeout, &mut work).await {
                            Ok(Ok(result)) => result,
                            Ok(Err(e)) => Err(anyhow::anyhow!("document task failed: {}", e)),
                            Err(_) => {
                                work.abort();
                                Err(anyhow::anyhow!("timed out after {}s", timeout.as_secs()))
                            }
                        }
                    }
                    Err(e) => Err(anyhow::anyhow!("worker pool closed: {}", e)),
                };
                (name, outcome)
            });
        }

        let mut summary = BatchSummary {
            documents: total,
            ..BatchSummary::default()
        };
        let mut done = 0u64;
        while let Some(joined) = tasks.join_next().await {
            done += 1;
            let (name, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => ("<unknown>".to_string(), Err(anyhow::anyhow!("task failed: {}", e))),
            };
            match outcome {
                Ok(report) => {
                    debug!(document = %name, records = report.records, stored = report.stored, "document done");
                    summary.add(&report);
                }
                Err(e) => {
                    warn!(document = %name, error = %format!("{:#}", e), "skipping document");
                    summary.skip(name.clone(), format!("{:#}", e));
                }
            }
            progress.report(ProgressEvent::Document {
                stage: stage.as_str().to_string(),
                document: name,
                n: done,
                total: total as u64,
            });
        }

        summary.failures.sort();
        info!(
            stage = stage.as_str(),
            processed = summary.processed,
            skipped = summary.skipped,
            stored = summary.stored,
            "batch complete"
        );
        summary
    }

    /// Name a batch input is reported under: the document id for PDFs, and
    /// the id of the PDF it came from for records files.
    fn document_label(&self, stage: Stage, path: &Path) -> String {
        let settings = &self.inner.settings;
        match stage {
            Stage::Extract | Stage::Ingest => document_id(path, settings.input_dir.as_deref()),
            Stage::Embed => format!("{}.pdf", self.records_stem(path)),
        }
    }

    /// Stem of a records file: its path under `records_dir` minus `.json`.
    fn records_stem(&self, records_file: &Path) -> String {
        document_stem(&document_id(records_file, Some(&self.inner.settings.records_dir)))
    }

    async fn process(&self, stage: Stage, path: &Path) -> Result<DocumentReport> {
        match stage {
            Stage::Extract => self.extract_document(path).await.map(|(report, _)| report),
            Stage::Embed => self.embed_records_file(path).await,
            Stage::Ingest => self.ingest_document(path).await,
        }
    }

    /// Extract one PDF and write its records artifact.
    pub async fn extract_document(&self, path: &Path) -> Result<(DocumentReport, Vec<ContentRecord>)> {
        let extractor = self.extractor()?.clone();
        let owned = path.to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .with_context(|| "extraction task panicked")??;

        let settings = &self.inner.settings;
        if settings.write_artifacts {
            artifacts::write_records(
                &artifacts::records_path(&settings.records_dir, &extraction.stem),
                &extraction.records,
            )?;
        }

        let report = DocumentReport {
            document: extraction.document.clone(),
            records: extraction.records.len(),
            dropped: extraction.dropped,
            ..DocumentReport::default()
        };
        Ok((report, extraction.records))
    }

    /// Extract, embed, and store one PDF.
    pub async fn ingest_document(&self, path: &Path) -> Result<DocumentReport> {
        let (extracted, records) = self.extract_document(path).await?;
        let stem = document_stem(&extracted.document);
        let embedded = self
            .embed_records(
                &extracted.document,
                &stem,
                records,
                self.inner.settings.write_artifacts,
            )
            .await?;
        Ok(DocumentReport {
            document: extracted.document,
            records: extracted.records,
            dropped: extracted.dropped + embedded.dropped,
            stored: embedded.stored,
            unembedded: embedded.unembedded,
        })
    }

    /// Embed and store the records in one records artifact.
    pub async fn embed_records_file(&self, records_file: &Path) -> Result<DocumentReport> {
        let stem = self.records_stem(records_file);
        let document = format!("{}.pdf", stem);
        let loaded = artifacts::read_records(records_file, &document)?;
        let records = loaded.records.len();
        let mut report = self
            .embed_records(&document, &stem, loaded.records, true)
            .await?;
        report.records = records;
        report.dropped += loaded.skipped;
        Ok(report)
    }

    /// Normalize, embed, and upsert `records`.
    ///
    /// Records that fail normalization are dropped. With `write_vectors`,
    /// vector artifacts named after `stem` go to `vectors_dir`.
    ///
    /// An image entry's stored document is its saved page PNG, or
    /// `{document}#page={n}` when no PNG was saved.
    pub async fn embed_records(
        &self,
        document: &str,
        stem: &str,
        records: Vec<ContentRecord>,
        write_vectors: bool,
    ) -> Result<DocumentReport> {
        let generator = match &self.inner.generator {
            Some(g) => g.clone(),
            None => bail!("pipeline was opened without encoders"),
        };
        let mut report = DocumentReport {
            document: document.to_string(),
            records: records.len(),
            ..DocumentReport::default()
        };

        let mut ready: Vec<(ContentRecord, Normalized)> = Vec::with_capacity(records.len());
        for record in records {
            if record.kind() == ContentKind::Image && !generator.has_image_encoder() {
                report.unembedded += 1;
                continue;
            }
            match normalize(&record) {
                Ok(n) => ready.push((record, n)),
                Err(e) => {
                    warn!(document, record = %record.source_id, error = %e, "dropping record");
                    report.dropped += 1;
                }
            }
        }
        if report.unembedded > 0 {
            debug!(document, count = report.unembedded, "no image encoder; image records not embedded");
        }
        if ready.is_empty() {
            return Ok(report);
        }

        let inputs: Vec<EncoderInput> = ready.iter().map(|(_, n)| n.input.clone()).collect();
        let encoders = generator.clone();
        let vectors = tokio::task::spawn_blocking(move || encoders.embed_inputs(&inputs))
            .await
            .with_context(|| "embedding task panicked")??;

        let settings = &self.inner.settings;
        let mut text_artifact = VectorArtifact {
            model: generator.text_encoder().model_name().to_string(),
            dims: generator.text_encoder().dims(),
            ids: Vec::new(),
            vectors: Vec::new(),
        };
        let mut image_artifact = generator.image_encoder().map(|enc| VectorArtifact {
            model: enc.model_name().to_string(),
            dims: enc.dims(),
            ids: Vec::new(),
            vectors: Vec::new(),
        });

        for ((record, normalized), vector) in ready.into_iter().zip(vectors) {
            let shown = match &normalized.text {
                Some(text) => text.clone(),
                None => {
                    let saved = page_image_path(&settings.images_dir, stem, record.page);
                    if saved.is_file() {
                        saved.display().to_string()
                    } else {
                        format!("{}#page={}", document, record.page)
                    }
                }
            };
            let entry = StoredEntry {
                id: record.source_id.clone(),
                vector,
                metadata: entry_metadata(document, &record, &normalized),
                document: shown,
            };

            match record.kind() {
                ContentKind::Text | ContentKind::Table => {
                    self.text_collection()?.upsert(&entry).await?;
                    text_artifact.ids.push(entry.id);
                    text_artifact.vectors.push(entry.vector);
                }
                ContentKind::Image => {
                    self.upsert_image(&entry).await?;
                    if let Some(artifact) = image_artifact.as_mut() {
                        artifact.ids.push(entry.id);
                        artifact.vectors.push(entry.vector);
                    }
                }
            }
            report.stored += 1;
        }

        if write_vectors {
            if !text_artifact.ids.is_empty() {
                artifacts::write_vectors(
                    &artifacts::vectors_path(&settings.vectors_dir, stem, ContentKind::Text),
                    &text_artifact,
                )?;
            }
            if let Some(artifact) = image_artifact.filter(|a| !a.ids.is_empty()) {
                artifacts::write_vectors(
                    &artifacts::vectors_path(&settings.vectors_dir, stem, ContentKind::Image),
                    &artifact,
                )?;
            }
        }

        Ok(report)
    }

    fn text_collection(&self) -> Result<&Collection> {
        match &self.inner.text {
            Some(c) => Ok(c),
            None => bail!("pipeline was opened without a store"),
        }
    }

    async fn upsert_image(&self, entry: &StoredEntry) -> Result<()> {
        match (&self.inner.store, &self.inner.image_collection) {
            (Some(store), Some(name)) => Ok(store.upsert(name, entry).await?),
            _ => bail!("no image collection is open"),
        }
    }
}

/// `docsift extract`: PDFs → records artifacts.
pub async fn run_extract(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    progress.report(ProgressEvent::Discovering {
        stage: Stage::Extract.as_str().to_string(),
    });
    let inputs = scan::scan_inputs(&config.input)?;
    if inputs.is_empty() {
        println!("No PDFs found under {}", config.input.dir.display());
        return Ok(());
    }

    let extractor = Extractor::from_config(config)?;
    let pipeline = Pipeline::extract_only(extractor, PipelineSettings::from_config(config));
    let summary = pipeline.run(Stage::Extract, inputs, progress).await;
    summary.print(Stage::Extract);
    Ok(())
}

/// `docsift embed`: records artifacts → vector artifacts and store entries.
pub async fn run_embed(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    progress.report(ProgressEvent::Discovering {
        stage: Stage::Embed.as_str().to_string(),
    });
    let inputs = if config.output.records_dir.exists() {
        scan::scan_records(&config.output.records_dir)?
    } else {
        Vec::new()
    };
    if inputs.is_empty() {
        println!(
            "No records found under {}. Run `docsift extract` first.",
            config.output.records_dir.display()
        );
        return Ok(());
    }

    let generator = embedding::load_generator(&config.embedding).await?;
    let store = open_store(config).await?;
    let pipeline = Pipeline::open(
        None,
        generator,
        Arc::clone(&store) as Arc<dyn VectorStore>,
        PipelineSettings::from_config(config),
    )
    .await?;
    let summary = pipeline.run(Stage::Embed, inputs, progress).await;
    summary.print(Stage::Embed);
    store.close().await;
    Ok(())
}

/// `docsift ingest`: extract and embed each PDF in one pass.
pub async fn run_ingest(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    progress.report(ProgressEvent::Discovering {
        stage: Stage::Ingest.as_str().to_string(),
    });
    let inputs = scan::scan_inputs(&config.input)?;
    if inputs.is_empty() {
        println!("No PDFs found under {}", config.input.dir.display());
        return Ok(());
    }

    let extractor = Extractor::from_config(config)?;
    let generator = embedding::load_generator(&config.embedding).await?;
    let store = open_store(config).await?;
    let pipeline = Pipeline::open(
        Some(extractor),
        generator,
        Arc::clone(&store) as Arc<dyn VectorStore>,
        PipelineSettings::from_config(config),
    )
    .await?;
    let summary = pipeline.run(Stage::Ingest, inputs, progress).await;
    summary.print(Stage::Ingest);
    store.close().await;
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::open(pool)
        .await
        .with_context(|| format!("Failed to open store: {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

fn entry_metadata(document: &str, record: &ContentRecord, normalized: &Normalized) -> Metadata {
    let ordinal = record
        .source_id
        .rsplit(':')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), document.into());
    metadata.insert("page".into(), MetadataValue::Int(record.page as i64));
    metadata.insert("kind".into(), record.kind().as_str().into());
    metadata.insert("ordinal".into(), MetadataValue::Int(ordinal));
    metadata.insert(
        "content_hash".into(),
        content_hash(&normalized.hash_source).into(),
    );
    metadata
}
