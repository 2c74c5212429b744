//! Extraction pipeline coordinating selection, extraction, assembly, and bulk indexing.

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::assemble::{AssembleOptions, assemble_record};
use super::types::{ExecutionMode, FileError, SetupError};
use crate::config::Config;
use crate::elasticsearch::{ElasticsearchClient, IndexCreation};
use crate::geo::SanitizePolicy;
use crate::handlers::HandlerRegistry;
use crate::indexing::{BootstrapError, BulkIndexWriter, IndexDocument};
use crate::metrics::{ScanMetrics, ScanStatistics};
use crate::record::{MetadataRecord, canonical_path, document_id};
use crate::selection::{HandlerSelector, RuleSet};

/// Drives a file list through selection, extraction, and indexing.
///
/// Every per-file failure is converted into a counter and a log entry; nothing a single file
/// does can abort the run. Share one pipeline across runs so the directory-affinity cache and
/// the writer's pools persist.
pub struct ExtractionPipeline {
    selector: Arc<HandlerSelector>,
    writer: Arc<BulkIndexWriter>,
    doc_type: String,
    options: AssembleOptions,
    output_dir: Option<PathBuf>,
    mode: ExecutionMode,
}

impl ExtractionPipeline {
    /// Sequential pipeline with default assembly options and no sidecar output.
    pub fn new(
        selector: HandlerSelector,
        writer: BulkIndexWriter,
        doc_type: impl Into<String>,
    ) -> Self {
        Self {
            selector: Arc::new(selector),
            writer: Arc::new(writer),
            doc_type: doc_type.into(),
            options: AssembleOptions::default(),
            output_dir: None,
            mode: ExecutionMode::Sequential,
        }
    }

    /// Build the pipeline described by `config`: built-in capabilities, optional rules file,
    /// and an Elasticsearch-backed writer.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let registry = HandlerRegistry::builtin();
        let rules = match &config.handler_rules_path {
            Some(path) => RuleSet::load(path, &registry)?,
            None => RuleSet::new(),
        };
        tracing::debug!(rules = rules.len(), "Handler rules loaded");

        let client = ElasticsearchClient::new(
            &config.elasticsearch_url,
            config.elasticsearch_api_key.clone(),
        )?;
        let writer = BulkIndexWriter::new(
            Arc::new(client),
            config.elasticsearch_index.clone(),
            config.bulk_threshold,
        );

        let options = AssembleOptions {
            checksums: config.checksums,
            sanitize: SanitizePolicy {
                drop_zero_sentinel: !config.keep_zero_coordinates,
            },
        };
        Ok(Self::new(HandlerSelector::new(registry, rules), writer, config.doc_type.clone())
            .with_options(options)
            .with_output_dir(config.output_dir.clone())
            .with_mode(config.execution_mode))
    }

    /// Replace the assembly options.
    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    /// Also write each record as `<id>.json` below `dir`.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Replace the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Current execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Selector shared by every file of a run.
    pub fn selector(&self) -> &HandlerSelector {
        &self.selector
    }

    /// Create the target index. Any failure other than "already exists" must abort startup.
    pub async fn bootstrap(&self, schema: &Value) -> Result<IndexCreation, BootstrapError> {
        let creation = self.writer.ensure_index(schema).await?;
        tracing::info!(index = self.writer.index(), outcome = ?creation, "Index ready");
        Ok(creation)
    }

    /// Process every file, drain the pools, and report the outcome counts.
    pub async fn run(&self, files: Vec<PathBuf>) -> ScanStatistics {
        let metrics = ScanMetrics::new();
        let started = Instant::now();
        tracing::info!(
            files = files.len(),
            mode = ?self.mode,
            doc_type = %self.doc_type,
            "Starting scan"
        );

        match self.mode {
            ExecutionMode::Sequential => {
                for path in &files {
                    self.process_file(path, &metrics).await;
                }
            }
            ExecutionMode::Pool { .. } => {
                let metrics = &metrics;
                stream::iter(files)
                    .for_each_concurrent(self.mode.workers(), |path| async move {
                        self.process_file(&path, metrics).await;
                    })
                    .await;
            }
        }

        for outcome in self.writer.flush_all().await {
            match outcome {
                Ok(report) => metrics.record_indexed(report.documents as u64),
                Err(err) => metrics.record_index_errors(err.documents() as u64),
            }
        }

        let statistics = metrics.snapshot();
        tracing::info!(
            total = statistics.total,
            indexed = statistics.indexed,
            property_errors = statistics.property_errors,
            index_errors = statistics.index_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            directories = self.selector.affinity().len(),
            "Scan complete"
        );
        statistics
    }

    async fn process_file(&self, path: &Path, metrics: &ScanMetrics) {
        metrics.record_file();
        let started = Instant::now();

        let document = match self.extract_document(path).await {
            Ok(document) => document,
            Err(err) => {
                metrics.record_property_error();
                tracing::error!(
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Property error"
                );
                return;
            }
        };

        match self.writer.add(document, &self.doc_type).await {
            Ok(flushed) => {
                if let Some(report) = flushed {
                    metrics.record_indexed(report.documents as u64);
                }
                tracing::debug!(
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "File processed"
                );
            }
            Err(err) => {
                metrics.record_index_errors(err.documents() as u64);
                tracing::error!(
                    path = %path.display(),
                    doc_type = %self.doc_type,
                    documents = err.documents(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Index error"
                );
            }
        }
    }

    async fn extract_document(&self, path: &Path) -> Result<IndexDocument, FileError> {
        let selector = Arc::clone(&self.selector);
        let options = self.options;
        let source = path.to_path_buf();
        let (handler, canonical, record) = tokio::task::spawn_blocking(move || {
            let selection = selector
                .select(&source)
                .ok_or_else(|| FileError::NoHandler { path: source.clone() })?;
            let raw = selection.capability.extract(&source)?;
            let canonical = canonical_path(&source);
            let record = assemble_record(&canonical, raw, &options)?;
            Ok::<_, FileError>((selection.capability.id().to_string(), canonical, record))
        })
        .await
        .map_err(|err| FileError::Worker {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })??;

        let id = document_id(&canonical);
        tracing::debug!(path = %path.display(), handler, id = %id, "Record assembled");
        if let Some(dir) = &self.output_dir {
            write_sidecar(dir, &id, &record).await;
        }

        let source = serde_json::to_value(&record).map_err(|err| FileError::Worker {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(IndexDocument::new(id, source))
    }
}

/// Sidecar output is best effort; a failed write is logged and the document is still indexed.
async fn write_sidecar(dir: &Path, id: &str, record: &MetadataRecord) {
    let target = dir.join(format!("{id}.json"));
    let written = match serde_json::to_vec_pretty(record) {
        Ok(bytes) => match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&target, bytes).await,
            Err(err) => Err(err),
        },
        Err(err) => Err(err.into()),
    };
    if let Err(err) = written {
        tracing::warn!(path = %target.display(), error = %err, "Failed to write record file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ShapeHint;
    use crate::handlers::{ExtractionError, FormatCheck, FormatHandler, RawGeospatial, RawMetadata};
    use crate::indexing::SearchBackend;
    use crate::elasticsearch::{BulkResponse, ElasticsearchError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    /// Reads `*.track` files as a fixed three-point flight track.
    struct TrackHandler;

    impl FormatHandler for TrackHandler {
        fn id(&self) -> &str {
            "track"
        }

        fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
            if path.extension().is_some_and(|ext| ext == "bad") {
                return Err(ExtractionError::malformed(path, "track", "corrupt header"));
            }
            let mut raw = RawMetadata::with_format("Track");
            raw.geospatial = Some(RawGeospatial::new(
                vec![50.0, 51.0, 52.0],
                vec![-3.0, -2.0, -1.0],
                ShapeHint::Track,
            ));
            Ok(raw)
        }
    }

    #[derive(Default)]
    struct MemoryBackend {
        bodies: Mutex<Vec<String>>,
        reject_first: bool,
    }

    #[async_trait]
    impl SearchBackend for MemoryBackend {
        async fn create_index(
            &self,
            _index: &str,
            _schema: &Value,
        ) -> Result<IndexCreation, ElasticsearchError> {
            Ok(IndexCreation::Created)
        }

        async fn bulk(
            &self,
            _index: &str,
            body: String,
        ) -> Result<BulkResponse, ElasticsearchError> {
            let mut bodies = self.bodies.lock().expect("bodies");
            bodies.push(body);
            Ok(BulkResponse {
                took: 1,
                errors: self.reject_first && bodies.len() == 1,
                items: Vec::new(),
            })
        }
    }

    fn selector() -> HandlerSelector {
        let mut registry = HandlerRegistry::builtin();
        registry.register(Arc::new(TrackHandler));
        let rules = RuleSet::from_specs(
            &[crate::selection::RuleSpec {
                pattern: r"\.(track|bad)$".into(),
                handler: "track".into(),
                priority: 0,
            }],
            &registry,
        )
        .expect("rules");
        HandlerSelector::new(registry, rules)
    }

    fn write_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"payload").expect("write");
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn counts_each_outcome_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut files = write_files(dir.path(), &["a.track", "b.track", "c.bad"]);
        files.push(dir.path().join("missing.track"));

        let backend = Arc::new(MemoryBackend::default());
        let writer = BulkIndexWriter::new(backend.clone(), "idx", 100);
        let pipeline = ExtractionPipeline::new(selector(), writer, "file");

        let stats = pipeline.run(files).await;
        assert_eq!(
            stats,
            ScanStatistics {
                indexed: 2,
                property_errors: 2,
                index_errors: 0,
                total: 4
            }
        );
        assert_eq!(backend.bodies.lock().expect("bodies").len(), 1);
    }

    #[tokio::test]
    async fn rejected_batch_does_not_stop_the_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let names = ["1.track", "2.track", "3.track", "4.track", "5.track"];
        let files = write_files(dir.path(), &names);

        let backend = Arc::new(MemoryBackend {
            reject_first: true,
            ..Default::default()
        });
        let writer = BulkIndexWriter::new(backend.clone(), "idx", 2);
        let pipeline = ExtractionPipeline::new(selector(), writer, "file")
            .with_mode(ExecutionMode::Pool { workers: 3 });

        let stats = pipeline.run(files).await;
        assert_eq!(stats.total, 5);
        assert_eq!(stats.index_errors, 2);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.unaccounted(), 0);
        assert_eq!(backend.bodies.lock().expect("bodies").len(), 3);
    }

    /// Records the thread its format check runs on.
    #[derive(Default)]
    struct ThreadRecorder {
        checked_on: Mutex<Vec<ThreadId>>,
    }

    impl FormatHandler for ThreadRecorder {
        fn id(&self) -> &str {
            "recorder"
        }

        fn check_format(&self, _path: &Path) -> FormatCheck {
            self.checked_on.lock().expect("threads").push(thread::current().id());
            FormatCheck::Accepted
        }

        fn extract(&self, _path: &Path) -> Result<RawMetadata, ExtractionError> {
            Ok(RawMetadata::with_format("Recorded"))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn selection_runs_off_the_runtime_thread() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut files = write_files(dir.path(), &["one.rec", "two.rec"]);
        files.push(dir.path().join("gone.rec"));

        let recorder = Arc::new(ThreadRecorder::default());
        let mut registry = HandlerRegistry::builtin();
        registry.register(recorder.clone());
        let rules = RuleSet::from_specs(
            &[crate::selection::RuleSpec {
                pattern: r"\.rec$".into(),
                handler: "recorder".into(),
                priority: 0,
            }],
            &registry,
        )
        .expect("rules");
        let writer = BulkIndexWriter::new(Arc::new(MemoryBackend::default()), "idx", 10);
        let selector = HandlerSelector::new(registry, rules);
        let pipeline = ExtractionPipeline::new(selector, writer, "file");

        let stats = pipeline.run(files).await;
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.property_errors, 1);

        let runtime_thread = thread::current().id();
        let checked_on = recorder.checked_on.lock().expect("threads");
        assert_eq!(checked_on.len(), 2);
        assert!(checked_on.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn writes_sidecar_named_by_document_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = tempfile::tempdir().expect("out dir");
        let files = write_files(dir.path(), &["flight.track"]);
        let expected = document_id(&canonical_path(&files[0]));

        let writer = BulkIndexWriter::new(Arc::new(MemoryBackend::default()), "idx", 10);
        let pipeline = ExtractionPipeline::new(selector(), writer, "file")
            .with_output_dir(Some(out.path().to_path_buf()));
        let stats = pipeline.run(files).await;
        assert_eq!(stats.indexed, 1);

        let sidecar = out.path().join(format!("{expected}.json"));
        let text = std::fs::read_to_string(sidecar).expect("sidecar");
        let record: MetadataRecord = serde_json::from_str(&text).expect("valid json");
        assert_eq!(record.data_format.format, "Track");
        assert_eq!(record.file.name, "flight.track");
    }
}
