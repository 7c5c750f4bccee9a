//! Ingestion Pipeline
//!
//! Takes signal documents from text to the SAFE API:
//! parse → validate → store → resolve → submit.
//!
//! A directory is ingested in phases. Every document is validated and
//! stored first, so a reference to another file of the same batch resolves
//! no matter how the files are ordered. Accepted documents are then
//! resolved against a store snapshot and submitted concurrently.
//! One file's failure never aborts the batch.
//!
//! A document that fails resolution or submission, or that SAFE refuses,
//! is rolled back out of the store so no later document resolves through it.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{discover_samples, SampleError, SampleKind};
use signal_core::{
    quality_of_signal, validate, MemoryStore, PutOutcome, ResolutionError, ResolvedSignal,
    Resolver, Signal, ValidSignal, ValidationErrors, Violation, DEFAULT_MAX_CHAIN_LENGTH,
};
use signal_transport::{SubmitResponse, Transport, TransportError};

/// Errors for a single document
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid signal JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Submission failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Samples(#[from] SampleError),
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum hops followed while resolving one field
    pub max_chain_length: usize,
    /// Submissions in flight at once
    pub concurrency: usize,
    /// Validate and resolve, but never submit
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            concurrency: 4,
            dry_run: false,
        }
    }
}

/// Result of ingesting one signal document
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub id: String,
    pub name: String,
    /// Quality of signal, before resolution
    pub quality: f64,
    /// Non-blocking violations
    pub warnings: Vec<Violation>,
    pub put: PutOutcome,
    /// Fields whose reference was replaced
    pub substituted: usize,
    /// `None` for dry runs and pipelines without a transport
    pub response: Option<SubmitResponse>,
}

/// What happened to one sample file
#[derive(Debug)]
pub enum FileOutcome {
    Signal(IngestOutcome),
    Archive(Option<SubmitResponse>),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<FileOutcome, IngestError>,
}

impl FileReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-file outcomes of a directory ingestion, sorted by path
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    pub fn is_all_ok(&self) -> bool {
        self.files.iter().all(FileReport::is_ok)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A document validated and stored, not yet delivered
struct Accepted {
    path: PathBuf,
    valid: ValidSignal,
    quality: f64,
    put: PutOutcome,
    /// Version this document replaced, restored on rollback
    previous: Option<Arc<ValidSignal>>,
}

enum Job {
    Signal(Accepted, ResolvedSignal),
    Archive(PathBuf),
}

/// The ingestion pipeline
pub struct Pipeline {
    config: PipelineConfig,
    resolver: Resolver,
    store: Arc<MemoryStore>,
    transport: Option<Arc<dyn Transport>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<MemoryStore>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let resolver = Resolver::new().with_max_chain_length(config.max_chain_length);
        Self {
            config,
            resolver,
            store,
            transport,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parse, validate and store one document
    fn accept(&self, path: PathBuf, json: &str) -> Result<Accepted, IngestError> {
        let signal = Signal::from_json(json)?;
        let quality = quality_of_signal(&signal);
        let valid = validate(signal)?;
        let previous = self.store.get(&valid.id);
        let put = self.store.put(valid.clone());

        Ok(Accepted {
            path,
            valid,
            quality,
            put,
            previous,
        })
    }

    /// Undo the `put` of a document that will not reach SAFE
    fn roll_back(&self, accepted: &Accepted) {
        let id = &accepted.valid.id;

        // superseded by a later put, nothing of ours to undo
        match self.store.get(id) {
            Some(current) if current.fingerprint() == accepted.valid.fingerprint() => {}
            _ => return,
        }

        match &accepted.previous {
            Some(previous) => {
                self.store.put(ValidSignal::clone(previous));
                debug!("Restored previous version of {}", id);
            }
            None => {
                self.store.remove(id);
                debug!("Evicted {}", id);
            }
        }
    }

    /// Submit a resolved document, rolling it back unless SAFE takes it
    async fn submit(
        &self,
        accepted: Accepted,
        resolved: ResolvedSignal,
    ) -> Result<IngestOutcome, IngestError> {
        let response = match &self.transport {
            Some(transport) if !self.config.dry_run => match transport.submit(&resolved).await {
                Ok(response) => {
                    if !response.success {
                        warn!("SAFE refused {}: {}", resolved.id, response.message);
                        self.roll_back(&accepted);
                    }
                    Some(response)
                }
                Err(e) => {
                    self.roll_back(&accepted);
                    return Err(e.into());
                }
            },
            _ => None,
        };

        Ok(IngestOutcome {
            id: resolved.id.clone(),
            name: resolved.name.clone(),
            quality: accepted.quality,
            warnings: accepted.valid.warnings().to_vec(),
            put: accepted.put,
            substituted: resolved.resolution_stats().substituted,
            response,
        })
    }

    async fn forward_archive(&self, path: &Path) -> Result<Option<SubmitResponse>, IngestError> {
        match &self.transport {
            Some(transport) if !self.config.dry_run => {
                Ok(Some(transport.submit_archive(path).await?))
            }
            _ => Ok(None),
        }
    }

    /// Ingest a single document held in memory
    pub async fn ingest_str(&self, origin: &str, json: &str) -> Result<IngestOutcome, IngestError> {
        let accepted = self.accept(PathBuf::from(origin), json)?;

        let resolved = match self
            .resolver
            .resolve(accepted.valid.clone(), &self.store.snapshot())
        {
            Ok(resolved) => resolved,
            Err(e) => {
                self.roll_back(&accepted);
                return Err(e.into());
            }
        };
        let outcome = self.submit(accepted, resolved).await?;

        info!("Ingested {} ({}) from {}", outcome.id, outcome.name, origin);
        Ok(outcome)
    }

    /// Ingest every sample in a directory
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport, IngestError> {
        let samples = discover_samples(dir)?;
        info!("Ingesting {} sample(s) from {}", samples.len(), dir.display());

        let mut pending = Vec::with_capacity(samples.len());
        let mut archives = Vec::new();
        let mut files = Vec::new();

        // Phase 1: validate and store, so the whole batch is visible to resolution
        for sample in samples {
            match sample.kind {
                SampleKind::Archive => archives.push(sample.path),
                SampleKind::Json => {
                    let result = match tokio::fs::read_to_string(&sample.path).await {
                        Ok(json) => self.accept(sample.path.clone(), &json),
                        Err(e) => Err(e.into()),
                    };
                    match result {
                        Ok(accepted) => pending.push(accepted),
                        Err(e) => {
                            warn!("Rejected {}: {}", sample.name(), e);
                            files.push(FileReport {
                                path: sample.path,
                                result: Err(e),
                            });
                        }
                    }
                }
            }
        }

        // Phase 2: resolve. Evicting a rejected document may strand others
        // that resolved through it, so repeat until no document fails.
        let resolved = loop {
            let snapshot = self.store.snapshot();
            debug!(
                "Resolving {} signal(s) against a snapshot of {}",
                pending.len(),
                snapshot.len()
            );

            let mut resolved = Vec::with_capacity(pending.len());
            let mut evicted = 0;
            for accepted in pending {
                match self.resolver.resolve(accepted.valid.clone(), &snapshot) {
                    Ok(signal) => resolved.push((accepted, signal)),
                    Err(e) => {
                        warn!("Rejected {}: {}", accepted.path.display(), e);
                        self.roll_back(&accepted);
                        files.push(FileReport {
                            path: accepted.path,
                            result: Err(e.into()),
                        });
                        evicted += 1;
                    }
                }
            }

            if evicted == 0 {
                break resolved;
            }
            pending = resolved.into_iter().map(|(accepted, _)| accepted).collect();
        };

        // Phase 3: submit concurrently
        let jobs = resolved
            .into_iter()
            .map(|(accepted, signal)| Job::Signal(accepted, signal))
            .chain(archives.into_iter().map(Job::Archive));

        let delivered: Vec<FileReport> = stream::iter(jobs)
            .map(|job| async move {
                match job {
                    Job::Signal(accepted, signal) => {
                        let path = accepted.path.clone();
                        let result = self
                            .submit(accepted, signal)
                            .await
                            .map(FileOutcome::Signal);
                        FileReport { path, result }
                    }
                    Job::Archive(path) => {
                        let result = self
                            .forward_archive(&path)
                            .await
                            .map(FileOutcome::Archive);
                        FileReport { path, result }
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for report in &delivered {
            match &report.result {
                Ok(_) => info!("Accepted {}", report.path.display()),
                Err(e) => warn!("Rejected {}: {}", report.path.display(), e),
            }
        }

        files.extend(delivered);
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let report = IngestReport { files };
        let stats = self.store.stats();
        debug!(
            "Batch done: {} ok, {} failed; store holds {} signal(s), {} revoked",
            report.succeeded().count(),
            report.failed().count(),
            stats.total,
            stats.revoked
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use signal_core::{
        ContextSlot, Entity, EntityType, FieldPath, Remediation, SecurityContext, SecurityType,
        Severity, SignalSource, Status, TextField, TextValue,
    };
    use tempfile::tempdir;

    /// Records submissions instead of sending them
    #[derive(Default)]
    struct RecordingTransport {
        signals: Mutex<Vec<ResolvedSignal>>,
        archives: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn submit(&self, signal: &ResolvedSignal) -> Result<SubmitResponse, TransportError> {
            self.signals.lock().push(signal.clone());
            Ok(SubmitResponse {
                success: true,
                message: format!("accepted {}", signal.id),
                retry_in: None,
            })
        }

        async fn submit_archive(&self, path: &Path) -> Result<SubmitResponse, TransportError> {
            self.archives.lock().push(path.to_path_buf());
            Ok(SubmitResponse {
                success: true,
                message: "archive accepted".to_string(),
                retry_in: None,
            })
        }
    }

    const REMEDIATION: FieldPath = FieldPath {
        context: ContextSlot::Single,
        field: TextField::RemediationDescription,
    };

    /// Answers every submission with the same verdict
    struct FixedTransport {
        success: bool,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn submit(&self, signal: &ResolvedSignal) -> Result<SubmitResponse, TransportError> {
            Ok(SubmitResponse {
                success: self.success,
                message: format!("verdict for {}", signal.id),
                retry_in: None,
            })
        }

        async fn submit_archive(&self, _path: &Path) -> Result<SubmitResponse, TransportError> {
            Err(TransportError::Status {
                status: 500,
                body: "archives unsupported".to_string(),
            })
        }
    }

    /// Fails every submission
    struct UnreachableTransport;

    #[async_trait]
    impl Transport for UnreachableTransport {
        async fn submit(&self, _signal: &ResolvedSignal) -> Result<SubmitResponse, TransportError> {
            Err(TransportError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }

        async fn submit_archive(&self, _path: &Path) -> Result<SubmitResponse, TransportError> {
            Err(TransportError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }
    }

    fn signal_json(id: &str, remediation: &str) -> String {
        remediation_json(
            id,
            Remediation::default().with_description(TextValue::parse(remediation)),
        )
    }

    fn remediation_json(id: &str, remediation: Remediation) -> String {
        let context = SecurityContext::new(SecurityType::Va, Status::default(), Severity::new("custom"))
            .with_remediation(remediation);

        Signal::builder("outdated openssl", SignalSource::new("scanner"))
            .id(id)
            .entity(Entity::new(EntityType::Machine, "web01.acme.com"))
            .security_context(context)
            .build()
            .to_json_pretty()
            .unwrap()
    }

    fn pipeline(transport: Option<Arc<dyn Transport>>, dry_run: bool) -> Pipeline {
        let config = PipelineConfig {
            dry_run,
            ..Default::default()
        };
        Pipeline::new(config, Arc::new(MemoryStore::new()), transport)
    }

    #[tokio::test]
    async fn test_ingest_str_resolves_against_store() {
        let recorder = Arc::new(RecordingTransport::default());
        let pipeline = pipeline(Some(recorder.clone()), false);

        pipeline
            .ingest_str("base.json", &signal_json("base", "upgrade to 3.0.7"))
            .await
            .unwrap();
        let outcome = pipeline
            .ingest_str("daily.json", &signal_json("daily", "signalurl://base"))
            .await
            .unwrap();

        assert_eq!(outcome.id, "daily");
        assert_eq!(outcome.put, PutOutcome::Inserted);
        assert_eq!(outcome.substituted, 1);
        assert!(outcome.response.as_ref().unwrap().success);

        let submitted = recorder.signals.lock();
        assert_eq!(submitted.len(), 2);
        assert_eq!(
            submitted[1].text_field(REMEDIATION).and_then(|v| v.as_literal()),
            Some("upgrade to 3.0.7")
        );
        // the store keeps the document as submitted
        let stored = pipeline.store().get("daily").unwrap();
        assert!(stored.text_field(REMEDIATION).unwrap().is_reference());
    }

    #[tokio::test]
    async fn test_ingest_str_reports_each_stage() {
        let pipeline = pipeline(None, false);

        let err = pipeline.ingest_str("bad.json", "{ not json").await.unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));

        let mut invalid: serde_json::Value =
            serde_json::from_str(&signal_json("x", "patch")).unwrap();
        invalid["confidence"] = serde_json::json!(250);
        let err = pipeline
            .ingest_str("invalid.json", &invalid.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));

        let err = pipeline
            .ingest_str("dangling.json", &signal_json("y", "signalurl://ghost"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Resolution(ResolutionError::DanglingReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_ingest_dir_resolves_regardless_of_file_order() {
        let dir = tempdir().unwrap();
        // a.json references a document that sorts after it
        std::fs::write(dir.path().join("a.json"), signal_json("daily", "signalurl://base")).unwrap();
        std::fs::write(dir.path().join("b.json"), signal_json("base", "rotate keys")).unwrap();
        std::fs::write(dir.path().join("c.json"), signal_json("broken", "signalurl://ghost"))
            .unwrap();
        std::fs::write(dir.path().join("d.json"), "[]").unwrap();
        std::fs::write(dir.path().join("batch.zip"), b"PK\x03\x04").unwrap();

        let recorder = Arc::new(RecordingTransport::default());
        let pipeline = pipeline(Some(recorder.clone()), false);
        let report = pipeline.ingest_dir(dir.path()).await.unwrap();

        let names: Vec<_> = report
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "batch.zip", "c.json", "d.json"]);
        assert_eq!(report.succeeded().count(), 3);
        assert_eq!(report.failed().count(), 2);
        assert!(!report.is_all_ok());

        match &report.files[0].result {
            Ok(FileOutcome::Signal(outcome)) => assert_eq!(outcome.substituted, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(
            report.files[3].result,
            Err(IngestError::Resolution(_))
        ));
        assert!(matches!(report.files[4].result, Err(IngestError::Parse(_))));

        assert_eq!(recorder.signals.lock().len(), 2);
        assert_eq!(recorder.archives.lock().len(), 1);
        // rejected at resolution, so no longer resolvable
        assert_eq!(pipeline.store().len(), 2);
        assert!(!pipeline.store().contains("broken"));
    }

    #[tokio::test]
    async fn test_rejected_document_leaves_the_store() {
        let pipeline = pipeline(None, false);
        let bad = Remediation::default()
            .with_description(TextValue::parse("signalurl://ghost"))
            .with_impact(TextValue::literal("literal impact"));

        let err = pipeline
            .ingest_str("bad.json", &remediation_json("bad", bad))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Resolution(ResolutionError::DanglingReference { .. })
        ));
        assert!(!pipeline.store().contains("bad"));

        let later = Remediation::default().with_impact(TextValue::parse("signalurl://bad"));
        let err = pipeline
            .ingest_str("later.json", &remediation_json("later", later))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Resolution(ResolutionError::DanglingReference { ref id, .. }) if id == "bad"
        ));
    }

    #[tokio::test]
    async fn test_rejected_replacement_restores_previous_version() {
        let pipeline = pipeline(None, false);
        pipeline
            .ingest_str("v1.json", &signal_json("doc", "patch"))
            .await
            .unwrap();

        pipeline
            .ingest_str("v2.json", &signal_json("doc", "signalurl://ghost"))
            .await
            .unwrap_err();

        let stored = pipeline.store().get("doc").unwrap();
        assert_eq!(
            stored.text_field(REMEDIATION).and_then(|v| v.as_literal()),
            Some("patch")
        );
    }

    #[tokio::test]
    async fn test_undelivered_documents_are_rolled_back() {
        let unreachable = pipeline(Some(Arc::new(UnreachableTransport)), false);
        let err = unreachable
            .ingest_str("one.json", &signal_json("one", "patch"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Transport(_)));
        assert!(unreachable.store().is_empty());

        let refusing = pipeline(Some(Arc::new(FixedTransport { success: false })), false);
        let outcome = refusing
            .ingest_str("one.json", &signal_json("one", "patch"))
            .await
            .unwrap();
        assert!(!outcome.response.unwrap().success);
        assert!(refusing.store().is_empty());

        let accepting = pipeline(Some(Arc::new(FixedTransport { success: true })), false);
        accepting
            .ingest_str("one.json", &signal_json("one", "patch"))
            .await
            .unwrap();
        assert!(accepting.store().contains("one"));
    }

    #[tokio::test]
    async fn test_ingest_dir_rejects_documents_resolving_through_a_rejected_one() {
        let dir = tempdir().unwrap();
        let broken = Remediation::default()
            .with_description(TextValue::parse("signalurl://ghost"))
            .with_impact(TextValue::literal("literal impact"));
        let dependent = Remediation::default()
            .with_description(TextValue::literal("rotate keys"))
            .with_impact(TextValue::parse("signalurl://broken"));
        std::fs::write(dir.path().join("a.json"), remediation_json("dependent", dependent)).unwrap();
        std::fs::write(dir.path().join("b.json"), remediation_json("broken", broken)).unwrap();
        std::fs::write(dir.path().join("c.json"), signal_json("fine", "patch")).unwrap();

        let recorder = Arc::new(RecordingTransport::default());
        let pipeline = pipeline(Some(recorder.clone()), false);
        let report = pipeline.ingest_dir(dir.path()).await.unwrap();

        assert!(matches!(
            report.files[0].result,
            Err(IngestError::Resolution(ResolutionError::DanglingReference { ref id, .. })) if id == "broken"
        ));
        assert!(matches!(report.files[1].result, Err(IngestError::Resolution(_))));
        assert!(report.files[2].is_ok());

        let submitted = recorder.signals.lock();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id, "fine");
        assert_eq!(pipeline.store().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_never_submits() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("one.json"), signal_json("one", "patch")).unwrap();
        std::fs::write(dir.path().join("batch.zip"), b"PK\x03\x04").unwrap();

        let recorder = Arc::new(RecordingTransport::default());
        let pipeline = pipeline(Some(recorder.clone()), true);
        let report = pipeline.ingest_dir(dir.path()).await.unwrap();

        assert!(report.is_all_ok());
        assert!(recorder.signals.lock().is_empty());
        assert!(recorder.archives.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_dir_missing_directory() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(None, false);

        let err = pipeline
            .ingest_dir(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Samples(SampleError::NotFound(_))));
    }
}
