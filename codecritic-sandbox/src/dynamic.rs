//! Dynamic analyzer: wraps the candidate in the harness, submits it to the
//! sandbox, and classifies the captured runtime failure.

use crate::executor::{parse_last_json, scan_denied_imports, SandboxBackend, SandboxExecutor};
use crate::harness::build_harness;
use codecritic_core::{DynamicSignal, ExceptionKind};
use tracing::{debug, warn};

/// Sparse result of the dynamic stage: at most one failure hypothesis.
#[derive(Debug, Clone, Default)]
pub struct DynamicReport {
    pub signal: Option<DynamicSignal>,
    /// Set when the stage did not run (back-end disabled, deny-set hit,
    /// spawn failure). The analysis still completes without it.
    pub skipped: Option<String>,
    /// The harness produced no parseable JSON outcome.
    pub parse_error: bool,
}

pub struct DynamicAnalyzer {
    executor: SandboxExecutor,
}

impl DynamicAnalyzer {
    pub fn new(executor: SandboxExecutor) -> Self {
        Self { executor }
    }

    /// Runs the candidate under the harness. Never returns an error: every
    /// failure mode degrades to a structured report.
    pub async fn analyze(&self, code: &str) -> DynamicReport {
        if code.trim().is_empty() {
            return DynamicReport {
                skipped: Some("empty source".to_string()),
                ..DynamicReport::default()
            };
        }
        if self.executor.config().backend == SandboxBackend::Disabled {
            return DynamicReport {
                skipped: Some("dynamic layer disabled".to_string()),
                ..DynamicReport::default()
            };
        }
        // The deny scan looks at the raw candidate; inside the harness the
        // source is a JSON string literal the line scan cannot see.
        if self.executor.config().backend == SandboxBackend::Subprocess {
            if let Some(module) = scan_denied_imports(code) {
                return DynamicReport {
                    skipped: Some(format!(
                        "weak sandbox refuses import of denied module `{module}`"
                    )),
                    ..DynamicReport::default()
                };
            }
        }

        let harness = build_harness(code);
        let outcome = match self.executor.run(&harness, None).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "sandbox unavailable; skipping dynamic stage");
                return DynamicReport {
                    skipped: Some(format!("sandbox unavailable: {e}")),
                    ..DynamicReport::default()
                };
            }
        };

        if let Some(reason) = outcome.skipped {
            return DynamicReport {
                skipped: Some(reason),
                ..DynamicReport::default()
            };
        }
        if outcome.timed_out {
            return DynamicReport {
                signal: Some(DynamicSignal {
                    kind: ExceptionKind::Timeout,
                    exception_name: "timeout".to_string(),
                    message: "execution exceeded the wall timeout".to_string(),
                    line: None,
                }),
                ..DynamicReport::default()
            };
        }

        let Some(json) = parse_last_json(&outcome.stdout) else {
            debug!(stderr = %outcome.stderr, "no JSON outcome line in harness stdout");
            return DynamicReport {
                parse_error: true,
                ..DynamicReport::default()
            };
        };

        if json.get("ok").and_then(serde_json::Value::as_bool) == Some(true) {
            return DynamicReport::default();
        }
        let Some(exception) = json.get("exception") else {
            return DynamicReport {
                parse_error: true,
                ..DynamicReport::default()
            };
        };

        let name = exception
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Exception")
            .to_string();
        let message = exception
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let line = exception
            .get("line")
            .and_then(serde_json::Value::as_u64)
            .map(|l| l as usize);

        debug!(exception = %name, line, "dynamic stage captured runtime failure");
        DynamicReport {
            signal: Some(DynamicSignal {
                kind: ExceptionKind::from_exception_name(&name),
                exception_name: name,
                message,
                line,
            }),
            ..DynamicReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SandboxConfig;
    use std::process::Stdio;
    use tokio::process::Command as TokioCommand;

    fn analyzer(config: SandboxConfig) -> DynamicAnalyzer {
        DynamicAnalyzer::new(SandboxExecutor::new(config))
    }

    async fn python_available() -> bool {
        TokioCommand::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_disabled_backend_is_skipped_not_failed() {
        let report = analyzer(SandboxConfig {
            backend: SandboxBackend::Disabled,
            ..SandboxConfig::default()
        })
        .analyze("def f():\n    return 1\n")
        .await;
        assert!(report.skipped.is_some());
        assert!(report.signal.is_none());
        assert!(!report.parse_error);
    }

    #[tokio::test]
    async fn test_denied_import_is_skipped() {
        let report = analyzer(SandboxConfig::default())
            .analyze("import threading\n")
            .await;
        assert!(report.skipped.unwrap().contains("threading"));
    }

    #[tokio::test]
    async fn test_empty_source_is_skipped() {
        let report = analyzer(SandboxConfig::default()).analyze("  \n").await;
        assert!(report.skipped.is_some());
    }

    #[tokio::test]
    async fn test_clean_code_yields_no_signal() {
        if !python_available().await {
            return;
        }
        let report = analyzer(SandboxConfig::default())
            .analyze("def add(a, b):\n    return a + b\n")
            .await;
        assert!(report.signal.is_none(), "report: {report:?}");
        assert!(report.skipped.is_none());
        assert!(!report.parse_error);
    }

    #[tokio::test]
    async fn test_division_probe_confirms_zero_division() {
        if !python_available().await {
            return;
        }
        let report = analyzer(SandboxConfig::default())
            .analyze("def divide(a, b):\n    return a / b\n")
            .await;
        let signal = report.signal.expect("expected a runtime signal");
        assert_eq!(signal.kind, ExceptionKind::ZeroDivision);
        assert_eq!(signal.line, Some(2));
    }

    #[tokio::test]
    async fn test_hallucinated_name_confirmed_at_runtime() {
        if !python_available().await {
            return;
        }
        let report = analyzer(SandboxConfig::default())
            .analyze("def f(n):\n    return calc.factorial(n)\n")
            .await;
        let signal = report.signal.expect("expected a runtime signal");
        assert_eq!(signal.kind, ExceptionKind::NameError);
        assert_eq!(signal.unresolved_name().as_deref(), Some("calc"));
    }

    #[tokio::test]
    async fn test_user_prints_do_not_break_outcome_parsing() {
        if !python_available().await {
            return;
        }
        let report = analyzer(SandboxConfig::default())
            .analyze("print(\"noise\")\nprint(\"{not json\")\n\ndef add(a, b):\n    return a + b\n")
            .await;
        assert!(!report.parse_error);
        assert!(report.signal.is_none());
    }
}
