//! Library-level pipeline tests.
//!
//! Encoders and the page reader are stubbed so the tests run without model
//! downloads or a pdfium install: a fixed-vocabulary bag-of-words text
//! encoder, a mean-colour image encoder, and a reader that serves page text
//! from a map keyed by path suffix.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docsift::extract::{ExtractError, Extractor, PageRasterizer, PageReader, RenderedPage};
use docsift::ingest::{Pipeline, PipelineSettings, Stage};
use docsift::progress::NoProgress;
use docsift::{artifacts, db, scan, sqlite_store::SqliteStore};
use docsift_core::embedding::{EmbeddingGenerator, ImageEncoder, Metric, PixelBuffer, TextEncoder};
use async_trait::async_trait;
use docsift_core::error::{QueryError, StoreError};
use docsift_core::models::{ContentKind, MetadataValue, SearchHit, StoredEntry};
use docsift_core::query::{QueryOutcome, QueryService};
use docsift_core::store::memory::InMemoryStore;
use docsift_core::store::{Collection, CollectionInfo, VectorStore};
use tempfile::TempDir;

const VOCAB: &[&str] = &[
    "calibration",
    "steps",
    "distributor",
    "parameter",
    "value",
    "speed",
    "depth",
    "feed",
];

/// One dimension per vocabulary word plus a catch-all bucket.
struct VocabEncoder {
    calls: AtomicUsize,
}

impl VocabEncoder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextEncoder for VocabEncoder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    fn embed_text(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dims()];
                for word in t
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let word = word.to_lowercase();
                    let slot = VOCAB.iter().position(|w| *w == word).unwrap_or(VOCAB.len());
                    v[slot] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct MeanColourEncoder {
    name: &'static str,
}

impl MeanColourEncoder {
    fn new() -> Self {
        Self {
            name: "mean-colour",
        }
    }
}

impl ImageEncoder for MeanColourEncoder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn dims(&self) -> usize {
        3
    }

    fn embed_image(&self, images: &[PixelBuffer]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(images
            .iter()
            .map(|p| {
                let mut sum = [0.0f32; 3];
                for px in p.rgb.chunks(3) {
                    for c in 0..3 {
                        sum[c] += px[c] as f32;
                    }
                }
                let n = (p.rgb.len() / 3).max(1) as f32;
                sum.iter().map(|s| s / n + 1.0).collect()
            })
            .collect())
    }
}

/// Serves page text for the longest key the path ends with, so `manual.pdf`
/// matches anywhere and `line-a/manual.pdf` only in that folder. Unknown
/// files fail like a corrupt PDF.
struct MapReader(HashMap<String, Vec<String>>);

impl MapReader {
    fn new(docs: &[(&str, &[&str])]) -> Self {
        Self(
            docs.iter()
                .map(|(name, pages)| {
                    (
                        name.to_string(),
                        pages.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl PageReader for MapReader {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        self.0
            .iter()
            .filter(|(key, _)| path.ends_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pages)| pages.clone())
            .ok_or_else(|| ExtractError::Pdf {
            path: path.to_path_buf(),
            detail: "invalid xref table".to_string(),
        })
    }
}

/// Renders `pages` solid grey PNGs.
struct GreyRasterizer {
    pages: u32,
}

impl PageRasterizer for GreyRasterizer {
    fn render_pages(&self, _path: &Path) -> Result<Vec<RenderedPage>, ExtractError> {
        (1..=self.pages)
            .map(|page| {
                let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                    4,
                    4,
                    image::Rgb([100, 100, 100]),
                ));
                let mut png = Vec::new();
                img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                    .unwrap();
                Ok(RenderedPage { page, png })
            })
            .collect()
    }
}

/// Sleeps before reading `slow.pdf`; everything else goes to the map.
struct SlowReader {
    inner: MapReader,
    delay: Duration,
}

impl PageReader for SlowReader {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        if path.ends_with("slow.pdf") {
            std::thread::sleep(self.delay);
            return Ok(vec!["Too late".to_string()]);
        }
        self.inner.page_texts(path)
    }
}

/// In-memory store whose upserts panic.
struct PanickingStore(InMemoryStore);

#[async_trait]
impl VectorStore for PanickingStore {
    async fn ensure_collection(&self, name: &str, metric: Metric) -> Result<CollectionInfo, StoreError> {
        self.0.ensure_collection(name, metric).await
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        self.0.collection_info(name).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StoreError> {
        self.0.list_collections().await
    }

    async fn bind_model(&self, collection: &str, model: &str) -> Result<(), StoreError> {
        self.0.bind_model(collection, model).await
    }

    async fn upsert(&self, _collection: &str, entry: &StoredEntry) -> Result<(), StoreError> {
        panic!("store fell over writing {}", entry.id);
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>, StoreError> {
        self.0.get(collection, id).await
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        self.0.query(collection, vector, k).await
    }
}

fn settings(tmp: &TempDir) -> PipelineSettings {
    PipelineSettings {
        collection: "docs".to_string(),
        input_dir: Some(tmp.path().to_path_buf()),
        metric: Metric::Cosine,
        records_dir: tmp.path().join("records"),
        vectors_dir: tmp.path().join("vectors"),
        images_dir: tmp.path().join("images"),
        write_artifacts: true,
        workers: 2,
        document_timeout: Duration::from_secs(30),
    }
}

struct Harness {
    pipeline: Pipeline,
    store: Arc<dyn VectorStore>,
    encoder: Arc<VocabEncoder>,
}

async fn harness(
    tmp: &TempDir,
    reader: MapReader,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    store: Arc<dyn VectorStore>,
) -> Harness {
    let has_images = rasterizer.is_some();
    let extractor = Extractor::new(Arc::new(reader), rasterizer)
        .with_images_dir(Some(tmp.path().join("images")))
        .with_input_root(Some(tmp.path().to_path_buf()));
    harness_with(extractor, has_images, store, settings(tmp)).await
}

async fn harness_with(
    extractor: Extractor,
    image_encoder: bool,
    store: Arc<dyn VectorStore>,
    settings: PipelineSettings,
) -> Harness {
    let encoder = Arc::new(VocabEncoder::new());
    let image: Option<Arc<dyn ImageEncoder>> = if image_encoder {
        Some(Arc::new(MeanColourEncoder::new()))
    } else {
        None
    };
    let generator = EmbeddingGenerator::new(encoder.clone(), image, 8);
    let pipeline = Pipeline::open(Some(extractor), generator, store.clone(), settings)
        .await
        .unwrap();
    Harness {
        pipeline,
        store,
        encoder,
    }
}

async fn text_service(h: &Harness) -> QueryService {
    let collection = Collection::open(h.store.clone(), "docs.text", Metric::Cosine, h.encoder.clone())
        .await
        .unwrap();
    QueryService::new(collection)
}

const CALIBRATION_DOC: &[&str] = &[
    "Calibration steps for the distributor",
    "Parameter  Value\nSpeed  10",
];

#[tokio::test]
async fn calibration_text_ranks_above_parameter_table() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let report = h
        .pipeline
        .ingest_document(&tmp.path().join("manual.pdf"))
        .await
        .unwrap();
    assert_eq!(report.records, 3, "two text records and one table");
    assert_eq!(report.stored, 3);

    let outcome = text_service(&h).await.query("calibration", 10).await.unwrap();
    let ids: Vec<&str> = outcome.hits().iter().map(|h| h.id.as_str()).collect();
    let text_rank = ids.iter().position(|id| *id == "manual.pdf:1:text:0").unwrap();
    let table_rank = ids.iter().position(|id| *id == "manual.pdf:2:table:0").unwrap();
    assert!(text_rank < table_rank, "ranking was {:?}", ids);

    let top = &outcome.hits()[0];
    assert_eq!(top.document, "Calibration steps for the distributor");
    assert_eq!(top.metadata["page"], MetadataValue::Int(1));
    assert_eq!(top.metadata["source"], MetadataValue::Str("manual.pdf".into()));
}

#[tokio::test]
async fn malformed_row_is_dropped_and_table_survives() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[(
            "pump.pdf",
            &[
                "Pump overview",
                "Maintenance schedule",
                "Parameter  Value\nSpeed  10\nDepth  4  mm\nFeed  2",
            ],
        )]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let report = h
        .pipeline
        .ingest_document(&tmp.path().join("pump.pdf"))
        .await
        .unwrap();
    assert_eq!(report.dropped, 1);

    let table = h
        .store
        .get("docs.text", "pump.pdf:3:table:0")
        .await
        .unwrap()
        .expect("page 3 table stored");
    assert_eq!(
        table.document,
        "Parameter: Speed; Value: 10\nParameter: Feed; Value: 2"
    );
    assert_eq!(table.metadata["kind"], MetadataValue::Str("table".into()));
}

#[tokio::test]
async fn empty_query_never_reaches_the_encoder() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;
    h.pipeline
        .ingest_document(&tmp.path().join("manual.pdf"))
        .await
        .unwrap();

    let service = text_service(&h).await;
    let before = h.encoder.calls();
    for q in ["", "   ", "\n\t"] {
        let err = service.query(q, 5).await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuery));
    }
    assert_eq!(h.encoder.calls(), before);
}

#[tokio::test]
async fn query_on_empty_collection_is_no_matches() {
    let tmp = TempDir::new().unwrap();
    let h = harness(&tmp, MapReader::new(&[]), None, Arc::new(InMemoryStore::new())).await;
    let outcome = text_service(&h).await.query("calibration", 5).await.unwrap();
    assert_eq!(outcome, QueryOutcome::NoMatches);
}

#[tokio::test]
async fn text_records_stay_within_page_bounds() {
    let tmp = TempDir::new().unwrap();
    let pages: &[&str] = &["Intro", "   \n  ", "Setup", "Appendix"];
    let h = harness(
        &tmp,
        MapReader::new(&[("guide.pdf", pages)]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let (_, records) = h
        .pipeline
        .extract_document(&tmp.path().join("guide.pdf"))
        .await
        .unwrap();
    let text: Vec<_> = records
        .iter()
        .filter(|r| r.kind() == ContentKind::Text)
        .collect();
    assert!(text.len() <= pages.len());
    assert_eq!(text.len(), 3, "blank page yields no record");
    assert!(text.iter().all(|r| (1..=pages.len() as u32).contains(&r.page)));
}

#[tokio::test]
async fn batch_skips_failing_document_and_continues() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let inputs = vec![tmp.path().join("manual.pdf"), tmp.path().join("corrupt.pdf")];
    let summary = h.pipeline.run(Stage::Ingest, inputs, &NoProgress).await;

    assert_eq!(summary.documents, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failures[0].0, "corrupt.pdf");
    assert_eq!(summary.stored, 3);
    assert_eq!(h.store.count("docs.text").await.unwrap(), 3);

    let records_file = tmp.path().join("records").join("manual.json");
    assert!(records_file.exists());
    assert!(tmp
        .path()
        .join("vectors")
        .join("manual.json_text_embeddings.json")
        .exists());
}

#[tokio::test]
async fn reingesting_overwrites_by_source_id() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        None,
        Arc::new(InMemoryStore::new()),
    )
    .await;
    let path = tmp.path().join("manual.pdf");
    h.pipeline.ingest_document(&path).await.unwrap();
    h.pipeline.ingest_document(&path).await.unwrap();
    assert_eq!(h.store.count("docs.text").await.unwrap(), 3);
}

#[tokio::test]
async fn page_images_go_to_the_image_collection() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        Some(Arc::new(GreyRasterizer { pages: 2 })),
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let report = h
        .pipeline
        .ingest_document(&tmp.path().join("manual.pdf"))
        .await
        .unwrap();
    assert_eq!(report.stored, 5);
    assert_eq!(h.store.count("docs.image").await.unwrap(), 2);
    assert_eq!(h.store.count("docs.text").await.unwrap(), 3);

    let entry = h
        .store
        .get("docs.image", "manual.pdf:2:image:0")
        .await
        .unwrap()
        .unwrap();
    let expected: PathBuf = tmp.path().join("images").join("manual_page_2.png");
    assert_eq!(entry.document, expected.display().to_string());
    assert!(expected.exists());
    assert!(tmp
        .path()
        .join("vectors")
        .join("manual.json_image_embeddings.json")
        .exists());
}

#[tokio::test]
async fn embed_stage_reads_records_artifacts_into_sqlite() {
    let tmp = TempDir::new().unwrap();
    let reader = MapReader::new(&[
        ("manual.pdf", CALIBRATION_DOC),
        ("pump.pdf", &["Pump overview"]),
    ]);

    // Extract only.
    let extractor = Extractor::new(Arc::new(reader), None);
    let extract = Pipeline::extract_only(extractor, settings(&tmp));
    let inputs = vec![tmp.path().join("manual.pdf"), tmp.path().join("pump.pdf")];
    let summary = extract.run(Stage::Extract, inputs, &NoProgress).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.stored, 0);

    // Then embed from the artifacts into a SQLite store.
    let pool = db::connect_path(&tmp.path().join("store.sqlite")).await.unwrap();
    let sqlite = Arc::new(SqliteStore::open(pool).await.unwrap());
    let store: Arc<dyn VectorStore> = sqlite.clone();
    let generator = EmbeddingGenerator::new(Arc::new(VocabEncoder::new()), None, 4);
    let embed = Pipeline::open(None, generator, store.clone(), settings(&tmp))
        .await
        .unwrap();

    let records = scan::scan_records(&tmp.path().join("records")).unwrap();
    assert_eq!(records.len(), 2);
    let summary = embed.run(Stage::Embed, records, &NoProgress).await;
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.stored, 4);
    assert_eq!(store.count("docs.text").await.unwrap(), 4);

    let entry = store
        .get("docs.text", "pump.pdf:1:text:0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.document, "Pump overview");

    let artifact: artifacts::VectorArtifact = serde_json::from_str(
        &std::fs::read_to_string(
            tmp.path()
                .join("vectors")
                .join("pump.json_text_embeddings.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(artifact.ids, vec!["pump.pdf:1:text:0".to_string()]);
    assert_eq!(artifact.dims, VOCAB.len() + 1);

    sqlite.close().await;
}

async fn sqlite_store(tmp: &TempDir) -> Arc<SqliteStore> {
    let pool = db::connect_path(&tmp.path().join("store.sqlite")).await.unwrap();
    Arc::new(SqliteStore::open(pool).await.unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_workers_ingest_into_sqlite() {
    let tmp = TempDir::new().unwrap();
    let names: Vec<String> = (0..12).map(|i| format!("manual-{:02}.pdf", i)).collect();
    let docs: Vec<(&str, &[&str])> = names.iter().map(|n| (n.as_str(), CALIBRATION_DOC)).collect();
    let sqlite = sqlite_store(&tmp).await;
    let extractor = Extractor::new(Arc::new(MapReader::new(&docs)), None)
        .with_input_root(Some(tmp.path().to_path_buf()));
    let mut settings = settings(&tmp);
    settings.workers = 4;
    let h = harness_with(extractor, false, sqlite.clone(), settings).await;

    let inputs = names.iter().map(|n| tmp.path().join(n)).collect();
    let summary = h.pipeline.run(Stage::Ingest, inputs, &NoProgress).await;

    assert_eq!(summary.failures, Vec::<(String, String)>::new());
    assert_eq!(summary.processed, 12);
    assert_eq!(summary.stored, 36);
    assert_eq!(h.store.count("docs.text").await.unwrap(), 36);
    sqlite.close().await;
}

#[tokio::test]
async fn same_file_name_in_two_folders_stays_distinct() {
    let tmp = TempDir::new().unwrap();
    let reader = MapReader::new(&[
        ("line-a/manual.pdf", &["Calibration steps for line A"]),
        ("line-b/manual.pdf", &["Feed depth for line B"]),
    ]);
    let h = harness(&tmp, reader, None, Arc::new(InMemoryStore::new())).await;

    let inputs = vec![
        tmp.path().join("line-a").join("manual.pdf"),
        tmp.path().join("line-b").join("manual.pdf"),
    ];
    let summary = h.pipeline.run(Stage::Ingest, inputs, &NoProgress).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(h.store.count("docs.text").await.unwrap(), 2);

    let a = h
        .store
        .get("docs.text", "line-a/manual.pdf:1:text:0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.document, "Calibration steps for line A");
    assert_eq!(a.metadata["source"], MetadataValue::Str("line-a/manual.pdf".into()));
    let b = h
        .store
        .get("docs.text", "line-b/manual.pdf:1:text:0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.document, "Feed depth for line B");

    let records = tmp.path().join("records");
    assert!(records.join("line-a").join("manual.json").is_file());
    assert!(records.join("line-b").join("manual.json").is_file());
    assert!(tmp
        .path()
        .join("vectors")
        .join("line-b")
        .join("manual.json_text_embeddings.json")
        .is_file());

    // The embed stage re-derives the same ids from the nested artifacts.
    let generator = EmbeddingGenerator::new(Arc::new(VocabEncoder::new()), None, 4);
    let fresh: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
    let embed = Pipeline::open(None, generator, fresh.clone(), settings(&tmp))
        .await
        .unwrap();
    let files = scan::scan_records(&records).unwrap();
    let summary = embed.run(Stage::Embed, files, &NoProgress).await;
    assert_eq!(summary.processed, 2);
    assert!(fresh
        .get("docs.text", "line-a/manual.pdf:1:text:0")
        .await
        .unwrap()
        .is_some());
    assert!(fresh
        .get("docs.text", "line-b/manual.pdf:1:text:0")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn reopening_with_another_image_model_fails() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
    harness(
        &tmp,
        MapReader::new(&[]),
        Some(Arc::new(GreyRasterizer { pages: 1 })),
        store.clone(),
    )
    .await;

    let other = MeanColourEncoder {
        name: "hue-histogram",
    };
    let generator = EmbeddingGenerator::new(Arc::new(VocabEncoder::new()), Some(Arc::new(other)), 8);
    let err = match Pipeline::open(None, generator, store, settings(&tmp)).await {
        Ok(_) => panic!("a second image model of the same width was accepted"),
        Err(e) => e,
    };
    let message = format!("{:#}", err);
    assert!(message.contains("docs.image"), "{}", message);
    assert!(message.contains("'mean-colour', not 'hue-histogram'"), "{}", message);
}

#[tokio::test]
async fn image_entries_without_saved_pngs_point_at_the_page() {
    let tmp = TempDir::new().unwrap();
    let extractor = Extractor::new(
        Arc::new(MapReader::new(&[("manual.pdf", CALIBRATION_DOC)])),
        Some(Arc::new(GreyRasterizer { pages: 2 })),
    )
    .with_input_root(Some(tmp.path().to_path_buf()));
    let h = harness_with(extractor, true, Arc::new(InMemoryStore::new()), settings(&tmp)).await;

    h.pipeline
        .ingest_document(&tmp.path().join("manual.pdf"))
        .await
        .unwrap();
    let entry = h
        .store
        .get("docs.image", "manual.pdf:2:image:0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.document, "manual.pdf#page=2");
    assert!(!tmp.path().join("images").exists());
}

#[tokio::test]
async fn slow_document_times_out_and_batch_continues() {
    let tmp = TempDir::new().unwrap();
    let reader = SlowReader {
        inner: MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        delay: Duration::from_secs(2),
    };
    let extractor = Extractor::new(Arc::new(reader), None)
        .with_input_root(Some(tmp.path().to_path_buf()));
    let mut settings = settings(&tmp);
    settings.document_timeout = Duration::from_secs(1);
    let h = harness_with(extractor, false, Arc::new(InMemoryStore::new()), settings).await;

    let inputs = vec![tmp.path().join("slow.pdf"), tmp.path().join("manual.pdf")];
    let summary = h.pipeline.run(Stage::Ingest, inputs, &NoProgress).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        summary.failures,
        vec![("slow.pdf".to_string(), "timed out after 1s".to_string())]
    );
    assert_eq!(h.store.count("docs.text").await.unwrap(), 3);
    assert!(h
        .store
        .get("docs.text", "slow.pdf:1:text:0")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn panicking_document_is_reported_by_name() {
    let tmp = TempDir::new().unwrap();
    let h = harness(
        &tmp,
        MapReader::new(&[("manual.pdf", CALIBRATION_DOC)]),
        None,
        Arc::new(PanickingStore(InMemoryStore::new())),
    )
    .await;

    let summary = h
        .pipeline
        .run(Stage::Ingest, vec![tmp.path().join("manual.pdf")], &NoProgress)
        .await;
    assert_eq!(summary.skipped, 1);
    let (document, reason) = &summary.failures[0];
    assert_eq!(document, "manual.pdf");
    assert!(reason.contains("panicked"), "{}", reason);
}
