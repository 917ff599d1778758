//! The two-phase orchestrator.

use crate::{AnalysisError, AnalysisResult};
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::{
    AnalysisRecord, AnalysisStatus, DynamicSignal, Explainer, Finding, RecordStore, StageLog,
    StaticAnalyzer, TaxonomyClassifier,
};
use codecritic_llm::{LinguisticAnalyzer, Reasoner, ReasonerConfig};
use codecritic_sandbox::{DynamicAnalyzer, SandboxConfig, SandboxExecutor};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Aggregate configuration for one orchestrator instance.
#[derive(Debug, Clone, Default)]
pub struct CriticConfig {
    pub sandbox: SandboxConfig,
    pub reasoner: ReasonerConfig,
    /// Budget for the whole linguistic stage.
    pub linguistic_budget: Option<Duration>,
}

impl CriticConfig {
    /// Sandbox and provider settings from the environment.
    pub fn from_env() -> Self {
        let mut sandbox = SandboxConfig::default();
        if let Ok(backend) = std::env::var("CODECRITIC_SANDBOX") {
            match backend.parse() {
                Ok(parsed) => sandbox.backend = parsed,
                Err(e) => warn!("{e}; keeping default back-end"),
            }
        }
        Self {
            sandbox,
            reasoner: ReasonerConfig::from_env(),
            linguistic_budget: Some(Duration::from_secs(120)),
        }
    }
}

/// Everything Phase B needs, captured before the task detaches.
struct PhaseBInput {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    prompt: String,
    code: String,
    empty_input: bool,
    static_findings: Vec<Finding>,
    literal_candidates: Vec<LiteralCandidate>,
    dynamic_signal: Option<DynamicSignal>,
    phase_a_logs: Vec<StageLog>,
}

pub struct Orchestrator {
    static_analyzer: StaticAnalyzer,
    dynamic: DynamicAnalyzer,
    linguistic: Arc<LinguisticAnalyzer>,
    store: Arc<dyn RecordStore>,
    /// Ids with a live Phase B task. Process-local; lost on restart, which
    /// pollers observe as a stale `processing` status and resolve by
    /// timeout.
    in_progress: Arc<Mutex<HashSet<Uuid>>>,
    linguistic_budget: Duration,
}

impl Orchestrator {
    pub fn new(config: CriticConfig, store: Arc<dyn RecordStore>) -> Self {
        let reasoner = Reasoner::new(config.reasoner);
        Self {
            static_analyzer: StaticAnalyzer::new(),
            dynamic: DynamicAnalyzer::new(SandboxExecutor::new(config.sandbox)),
            linguistic: Arc::new(LinguisticAnalyzer::new(reasoner)),
            store,
            in_progress: Arc::new(Mutex::new(HashSet::new())),
            linguistic_budget: config.linguistic_budget.unwrap_or(Duration::from_secs(120)),
        }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// True while the record's background task is alive.
    pub fn is_in_progress(&self, id: Uuid) -> bool {
        self.in_progress
            .lock()
            .map(|set| set.contains(&id))
            .unwrap_or(false)
    }

    /// Phase A: static + dynamic + provisional classification, persisted
    /// as `processing` and returned; Phase B is enqueued before returning.
    pub async fn analyze(&self, prompt: &str, code: &str) -> AnalysisResult<AnalysisRecord> {
        if prompt.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("prompt is empty".to_string()));
        }
        let empty_input = code.trim().is_empty();
        let mut stage_logs = Vec::new();

        // Static stage.
        let static_start = Instant::now();
        let static_report = match self.static_analyzer.analyze(prompt, code) {
            Ok(report) => {
                let mut log = StageLog::ok("static", static_start.elapsed().as_secs_f64());
                if let Some((detector, message)) = report.detector_errors.first() {
                    log = StageLog::failed(
                        "static",
                        format!("{detector}: {message}"),
                        static_start.elapsed().as_secs_f64(),
                    );
                }
                stage_logs.push(log);
                report
            }
            Err(e) => {
                warn!(error = %e, "static stage failed");
                stage_logs.push(StageLog::failed(
                    "static",
                    e.to_string(),
                    static_start.elapsed().as_secs_f64(),
                ));
                codecritic_core::StaticReport::default()
            }
        };

        // Dynamic stage. Pointless on unparseable or empty input: the
        // classifier suppresses everything behind a syntax finding anyway.
        let dynamic_start = Instant::now();
        let dynamic_signal = if empty_input || static_report.syntax_error {
            stage_logs.push(StageLog::failed(
                "dynamic",
                "skipped: nothing executable",
                0.0,
            ));
            None
        } else {
            let report = self.dynamic.analyze(code).await;
            let elapsed = dynamic_start.elapsed().as_secs_f64();
            match &report.skipped {
                Some(reason) => {
                    stage_logs.push(StageLog::failed("dynamic", reason.clone(), elapsed));
                }
                None if report.parse_error => {
                    stage_logs.push(StageLog::failed(
                        "dynamic",
                        "harness produced no JSON outcome",
                        elapsed,
                    ));
                }
                None => stage_logs.push(StageLog::ok("dynamic", elapsed)),
            }
            report.signal
        };

        // Provisional classification with empty linguistic input.
        let classify_start = Instant::now();
        let classifier = TaxonomyClassifier::new();
        let mut findings =
            classifier.classify(&static_report.findings, dynamic_signal.as_ref(), &[]);
        let explainer = Explainer::new();
        explainer.explain(&mut findings);
        stage_logs.push(StageLog::ok(
            "classifier",
            classify_start.elapsed().as_secs_f64(),
        ));

        let mut record = AnalysisRecord::new(prompt, code);
        record.summary = explainer.summarize(&findings, None);
        record.findings = findings;
        record.stage_logs = stage_logs.clone();
        record.refresh_rollups();

        // Persistence failure is fatal to the request; no partial records.
        self.store
            .insert(&record)
            .await
            .map_err(|e| AnalysisError::Persistence(e.to_string()))?;

        if let Ok(mut set) = self.in_progress.lock() {
            set.insert(record.id);
        }

        self.spawn_phase_b(PhaseBInput {
            id: record.id,
            created_at: record.created_at,
            prompt: prompt.to_string(),
            code: code.to_string(),
            empty_input,
            static_findings: static_report.findings,
            literal_candidates: static_report.literal_candidates,
            dynamic_signal,
            phase_a_logs: stage_logs,
        });

        info!(id = %record.id, findings = record.findings.len(), "analysis accepted");
        Ok(record)
    }

    /// Current state of a record, for pollers.
    pub async fn get(&self, id: Uuid) -> AnalysisResult<Option<AnalysisRecord>> {
        self.store
            .get(id)
            .await
            .map_err(|e| AnalysisError::Persistence(e.to_string()))
    }

    fn spawn_phase_b(&self, input: PhaseBInput) {
        let linguistic = Arc::clone(&self.linguistic);
        let store = Arc::clone(&self.store);
        let in_progress = Arc::clone(&self.in_progress);
        let budget = self.linguistic_budget;

        tokio::spawn(async move {
            run_phase_b(input, linguistic, store, in_progress, budget).await;
        });
    }
}

/// Phase B: the four linguistic detectors, the full re-classification,
/// and the single completion write. Lives independently of the caller's
/// connection.
async fn run_phase_b(
    input: PhaseBInput,
    linguistic: Arc<LinguisticAnalyzer>,
    store: Arc<dyn RecordStore>,
    in_progress: Arc<Mutex<HashSet<Uuid>>>,
    budget: Duration,
) {
    let linguistic_start = Instant::now();
    let (report, linguistic_log) = if input.empty_input {
        (
            codecritic_llm::LinguisticReport::default(),
            StageLog::failed("linguistic", "skipped: empty input", 0.0),
        )
    } else {
        let run = linguistic.analyze(&input.prompt, &input.code, &input.literal_candidates);
        match tokio::time::timeout(budget, run).await {
            Ok(report) => (
                report,
                StageLog::ok("linguistic", linguistic_start.elapsed().as_secs_f64()),
            ),
            Err(_) => {
                warn!(id = %input.id, "linguistic stage exceeded its budget");
                (
                    codecritic_llm::LinguisticReport::default(),
                    StageLog::failed(
                        "linguistic",
                        "stage budget exceeded",
                        linguistic_start.elapsed().as_secs_f64(),
                    ),
                )
            }
        }
    };

    let classifier = TaxonomyClassifier::new();
    let mut findings = classifier.classify(
        &input.static_findings,
        input.dynamic_signal.as_ref(),
        &report.findings,
    );
    let explainer = Explainer::new();
    explainer.explain(&mut findings);

    let mut record = AnalysisRecord::new(input.prompt, input.code);
    record.id = input.id;
    record.created_at = input.created_at;
    record.status = AnalysisStatus::Complete;
    record.summary = explainer.summarize(&findings, report.extras.intent_match_score);
    record.findings = findings;
    record.linguistic_extras = report.extras;
    record.stage_logs = input.phase_a_logs;
    record.stage_logs.push(linguistic_log);
    record.refresh_rollups();

    if let Err(e) = store.complete(&record).await {
        // The record stays `processing`; pollers resolve it by timeout.
        error!(id = %record.id, error = %e, "completion write failed");
    } else {
        debug!(id = %record.id, findings = record.findings.len(), "analysis complete");
    }

    if let Ok(mut set) = in_progress.lock() {
        set.remove(&record.id);
    }
}
