//! `clamwire scan`: stream files to the daemon and report verdicts.

use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Result;
use clamwire::{Config, ErrorCategory, Scanner, Verdict};
use serde::Serialize;

use crate::{EXIT_ERROR, OutputFormat};

/// Arguments for `clamwire scan`.
#[derive(clap::Args)]
pub struct ScanArgs {
    /// Files to scan; `-` or nothing reads stdin. Files are scanned concurrently.
    paths: Vec<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Skip the readiness check before scanning.
    #[arg(long)]
    no_wait: bool,

    /// Bytes per streamed chunk.
    #[arg(long)]
    pub(crate) chunk_size: Option<usize>,

    /// Refuse to stream more than this many bytes per file.
    #[arg(long)]
    pub(crate) max_size: Option<u64>,
}

/// Result line for one scanned input.
#[derive(Debug, Serialize)]
struct Report {
    path: String,
    #[serde(flatten)]
    verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    category: Option<ErrorCategory>,
}

pub fn run(cfg: &Config, args: &ScanArgs) -> Result<i32> {
    let scanner = if args.no_wait {
        Scanner::from_config(cfg)
    } else {
        clamwire::connect(cfg)?
    };

    let reports = scan_all(&scanner, &args.paths);
    print(&reports, args.format)?;
    Ok(exit_code(&reports))
}

/// Scans every input on its own thread and connection, preserving order.
fn scan_all(scanner: &Scanner, paths: &[PathBuf]) -> Vec<Report> {
    if paths.is_empty() {
        return vec![scan_one(scanner, Path::new("-"))];
    }
    thread::scope(|s| {
        let handles: Vec<_> = paths
            .iter()
            .map(|p| s.spawn(move || scan_one(scanner, p)))
            .collect();
        handles
            .into_iter()
            .zip(paths)
            .map(|(h, p)| {
                h.join().unwrap_or_else(|_| Report {
                    path: p.display().to_string(),
                    verdict: None,
                    error: Some("scan thread panicked".into()),
                    category: None,
                })
            })
            .collect()
    })
}

fn scan_one(scanner: &Scanner, path: &Path) -> Report {
    let result = if path == Path::new("-") {
        scanner.scan(io::stdin().lock())
    } else {
        scanner.scan_path(path)
    };
    let path = path.display().to_string();
    match result {
        Ok(verdict) => Report {
            path,
            verdict: Some(verdict),
            error: None,
            category: None,
        },
        Err(e) => {
            tracing::debug!(%path, error = %e, "scan failed");
            Report {
                path,
                verdict: None,
                error: Some(e.to_string()),
                category: Some(e.category()),
            }
        }
    }
}

fn print(reports: &[Report], format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    let width = reports.iter().map(|r| r.path.len()).max().unwrap_or(0).max(4);
    println!("{:<width$}  RESULT", "PATH");
    for r in reports {
        let result = match (&r.verdict, &r.error, r.category) {
            (Some(v), _, _) => v.to_string(),
            (None, Some(e), Some(ErrorCategory::Input)) => format!("ERROR (input): {e}"),
            (None, Some(e), _) => format!("ERROR: {e}"),
            (None, None, _) => String::new(),
        };
        println!("{:<width$}  {result}", r.path);
    }
    Ok(())
}

/// 2 if anything failed, else 1 if anything was flagged, else 0.
fn exit_code(reports: &[Report]) -> i32 {
    if reports.iter().any(|r| r.error.is_some()) {
        EXIT_ERROR
    } else if reports
        .iter()
        .any(|r| r.verdict.as_ref().is_some_and(Verdict::is_flagged))
    {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Option<Verdict>, error: Option<&str>) -> Report {
        Report {
            path: "f".into(),
            verdict,
            error: error.map(Into::into),
            category: None,
        }
    }

    #[test]
    fn exit_code_prefers_errors_over_detections() {
        assert_eq!(exit_code(&[report(Some(Verdict::clean()), None)]), 0);
        assert_eq!(
            exit_code(&[
                report(Some(Verdict::clean()), None),
                report(None, Some("refused")),
            ]),
            EXIT_ERROR
        );
    }

    #[test]
    fn json_report_flattens_verdict() {
        let json = serde_json::to_value(report(Some(Verdict::clean()), None)).unwrap();
        assert_eq!(json, serde_json::json!({"path": "f", "flagged": false, "diagnostic": ""}));
    }
}
