//! Subprocess pre-screen probe for PDF inputs.
//!
//! Some malformed PDFs send parsing libraries into unbounded loops that no
//! in-process timeout can interrupt. Before handing a PDF to the in-process
//! renderer, a cheap external probe (first page, low resolution) runs in a
//! child process under a wall-clock deadline. A child process can be killed;
//! a wedged thread cannot.
//!
//! The probe's failure is advisory, not fatal: a failed or timed-out probe
//! switches the document to OCR-only mode with a warning, it never rejects
//! the document.

use crate::config::{PreScreenConfig, ProbeCommand};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one pre-screen probe.
#[derive(Debug, Clone)]
pub struct PreScreenVerdict {
    /// True when the probe completed successfully within the deadline, or
    /// could not run at all (missing probe binary is not the document's
    /// fault).
    pub passed: bool,
    /// Why the probe did not pass cleanly, when it didn't. Also set for a
    /// pass that happened because the probe binary is unavailable.
    pub reason: Option<String>,
    /// Wall time the probe took, including a timed-out wait.
    pub elapsed: Duration,
}

/// Document warning text for a failed probe.
pub fn prescreen_warning(verdict: &PreScreenVerdict) -> String {
    format!(
        "pre-screen probe failed ({}); native extraction bypassed, all pages sent to OCR",
        verdict.reason.as_deref().unwrap_or("unknown")
    )
}

/// Run the parse probe against `path`.
pub async fn prescreen_pdf(path: &Path, config: &PreScreenConfig) -> PreScreenVerdict {
    let started = Instant::now();

    // Probe output goes to a throwaway directory; only the exit matters.
    let scratch = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "cannot create probe scratch dir, skipping pre-screen");
            return PreScreenVerdict {
                passed: true,
                reason: Some(format!("probe skipped: no scratch dir: {e}")),
                elapsed: started.elapsed(),
            };
        }
    };

    let mut command = match &config.command {
        ProbeCommand::Pdftoppm { dpi } => {
            let mut c = Command::new("pdftoppm");
            c.arg("-f")
                .arg("1")
                .arg("-l")
                .arg("1")
                .arg("-r")
                .arg(dpi.to_string())
                .arg(path)
                .arg(scratch.path().join("probe"));
            c
        }
        ProbeCommand::Custom { program, args } => {
            let mut c = Command::new(program);
            c.args(args);
            c
        }
    };
    command
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            // Probe binary not installed. The document gets the benefit of
            // the doubt; the in-process renderer still runs.
            debug!(error = %e, "probe binary unavailable, skipping pre-screen");
            return PreScreenVerdict {
                passed: true,
                reason: Some(format!("probe unavailable: {e}")),
                elapsed: started.elapsed(),
            };
        }
    };

    match tokio::time::timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "pre-screen passed");
            PreScreenVerdict {
                passed: true,
                reason: None,
                elapsed: started.elapsed(),
            }
        }
        Ok(Ok(status)) => {
            warn!(?status, path = %path.display(), "pre-screen probe crashed");
            PreScreenVerdict {
                passed: false,
                reason: Some(format!("probe exited with {status}")),
                elapsed: started.elapsed(),
            }
        }
        Ok(Err(e)) => PreScreenVerdict {
            passed: false,
            reason: Some(format!("probe wait failed: {e}")),
            elapsed: started.elapsed(),
        },
        Err(_) => {
            warn!(
                timeout_secs = config.timeout.as_secs(),
                path = %path.display(),
                "pre-screen probe timed out, killing"
            );
            let _ = child.start_kill();
            let _ = child.wait().await;
            PreScreenVerdict {
                passed: false,
                reason: Some(format!(
                    "probe timed out after {}s",
                    config.timeout.as_secs()
                )),
                elapsed: started.elapsed(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(program: &str, args: &[&str], timeout: Duration) -> PreScreenConfig {
        PreScreenConfig {
            timeout,
            command: ProbeCommand::Custom {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[tokio::test]
    async fn clean_probe_passes() {
        let config = custom("true", &[], Duration::from_secs(5));
        let verdict = prescreen_pdf(Path::new("/tmp/any.pdf"), &config).await;
        assert!(verdict.passed);
        assert!(verdict.reason.is_none());
    }

    #[tokio::test]
    async fn crashing_probe_fails() {
        let config = custom("false", &[], Duration::from_secs(5));
        let verdict = prescreen_pdf(Path::new("/tmp/any.pdf"), &config).await;
        assert!(!verdict.passed);
        assert!(verdict.reason.unwrap().contains("exited"));
    }

    #[tokio::test]
    async fn hanging_probe_is_killed_at_deadline() {
        let config = custom("sleep", &["30"], Duration::from_millis(300));
        let started = Instant::now();
        let verdict = prescreen_pdf(Path::new("/tmp/any.pdf"), &config).await;
        assert!(!verdict.passed);
        assert!(verdict.reason.unwrap().contains("timed out"));
        // Killed at the deadline, not after the child's 30 s sleep.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_probe_binary_passes_with_reason() {
        let config = custom(
            "definitely-not-a-real-binary-7f3a",
            &[],
            Duration::from_secs(5),
        );
        let verdict = prescreen_pdf(Path::new("/tmp/any.pdf"), &config).await;
        assert!(verdict.passed);
        assert!(verdict.reason.unwrap().contains("unavailable"));
    }
}
