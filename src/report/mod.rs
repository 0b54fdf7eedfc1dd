pub mod html;
pub mod json;
pub mod junit;
pub mod types;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runner::state::{SkippedStep, StepResult};
pub use types::{ReportMeta, ReportSummary, StructuredReport, SuccessRate};

/// Structured report plus its human-readable rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedReport {
    pub structured: StructuredReport,
    pub rendered: String,
}

/// Paths written by `write_reports`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFiles {
    pub json: PathBuf,
    pub html: PathBuf,
    pub junit: PathBuf,
}

/// Build the structured report from the run's results. Pure: the same
/// inputs always give the same report.
pub fn build(results: &[StepResult], skipped: &[SkippedStep], meta: &ReportMeta) -> StructuredReport {
    StructuredReport {
        session_id: meta.session_id.clone(),
        suite: meta.suite.clone(),
        execution_date: meta.execution_date.clone(),
        base_url: meta.base_url.clone(),
        tenant: meta.tenant.clone(),
        summary: ReportSummary::from_results(results, skipped),
        skipped: skipped.to_vec(),
        results: results.to_vec(),
    }
}

pub fn emit(results: &[StepResult], skipped: &[SkippedStep], meta: &ReportMeta) -> EmittedReport {
    let structured = build(results, skipped, meta);
    let rendered = html::render(&structured);
    EmittedReport {
        structured,
        rendered,
    }
}

pub fn file_stem(suite: &str) -> String {
    format!("ecare-{}-test-report", suite)
}

/// Persist the JSON, HTML and JUnit files into `output_dir`.
pub fn write_reports(report: &EmittedReport, output_dir: &Path) -> Result<ReportFiles> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let stem = file_stem(&report.structured.suite);
    let files = ReportFiles {
        json: output_dir.join(format!("{}.json", stem)),
        html: output_dir.join(format!("{}.html", stem)),
        junit: output_dir.join(format!("{}-junit.xml", stem)),
    };

    std::fs::write(&files.json, json::render(&report.structured)?)
        .with_context(|| format!("Failed to write {}", files.json.display()))?;
    std::fs::write(&files.html, &report.rendered)
        .with_context(|| format!("Failed to write {}", files.html.display()))?;
    std::fs::write(&files.junit, junit::generate_junit_xml(&report.structured)?)
        .with_context(|| format!("Failed to write {}", files.junit.display()))?;

    Ok(files)
}

/// Re-render a persisted structured report.
pub async fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(results_path)
        .with_context(|| format!("Failed to read {}", results_path.display()))?;
    let report: StructuredReport = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a structured run report", results_path.display()))?;

    let rendered = match format {
        "json" => json::render(&report)?,
        "html" => html::render(&report),
        "junit" => junit::generate_junit_xml(&report)?,
        _ => anyhow::bail!("Unknown format: {}", format),
    };

    if let Some(path) = output {
        std::fs::write(path, rendered)?;
        println!("{} report saved to: {}", format.to_uppercase(), path.display());
    } else {
        println!("{}", rendered);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::{meta, result};
    use super::*;

    #[test]
    fn test_counts_and_rate() {
        let results = vec![result(1, "Login", true), result(2, "Add Provider", false)];
        let skipped = vec![SkippedStep {
            step_index: 3,
            name: "Get Provider".to_string(),
            reason: "blocking step 2 failed".to_string(),
        }];
        let report = build(&results, &skipped, &meta());

        assert_eq!(report.summary.total_tests, 2);
        assert_eq!(report.summary.passed_tests, 1);
        assert_eq!(report.summary.failed_tests, 1);
        assert_eq!(report.summary.skipped_tests, 1);
        assert_eq!(report.summary.success_rate, SuccessRate::Percent(50));
        assert_eq!(report.results, results);
    }

    #[test]
    fn test_empty_run_is_not_applicable() {
        let report = build(&[], &[], &meta());
        assert_eq!(report.summary.success_rate, SuccessRate::NotApplicable);
        let json = json::render(&report).unwrap();
        assert!(json.contains("\"successRate\": \"n/a\""));
    }

    #[test]
    fn test_emit_is_deterministic() {
        let results = vec![result(1, "Login", true), result(2, "Add Provider", true)];
        let a = emit(&results, &[], &meta());
        let b = emit(&results, &[], &meta());
        assert_eq!(
            json::render(&a.structured).unwrap(),
            json::render(&b.structured).unwrap()
        );
        assert_eq!(a.rendered, b.rendered);
    }

    #[test]
    fn test_write_and_rerender() {
        let dir = std::env::temp_dir().join(format!("ecare-report-{}", uuid::Uuid::new_v4()));
        let report = emit(&[result(1, "Login", true)], &[], &meta());
        let files = write_reports(&report, &dir).unwrap();

        assert!(files.json.ends_with("ecare-api-test-report.json"));
        assert!(files.html.exists());
        assert!(files.junit.exists());

        let back: StructuredReport =
            serde_json::from_str(&std::fs::read_to_string(&files.json).unwrap()).unwrap();
        assert_eq!(back, report.structured);
        assert_eq!(html::render(&back), report.rendered);

        std::fs::remove_dir_all(&dir).ok();
    }
}
