use super::types::StructuredReport;
use crate::runner::state::{StepResult, StepStatus};
use crate::utils::{format_duration, html_escape};
use std::collections::BTreeMap;

/// Render the HTML report. Reads nothing but `report`.
pub fn render(report: &StructuredReport) -> String {
    let summary = &report.summary;
    let total_duration: u64 = report.results.iter().map(|r| r.duration_ms).sum();

    let steps_html: String = report.results.iter().map(render_step).collect();

    let skipped_html = if report.skipped.is_empty() {
        String::new()
    } else {
        let items: String = report
            .skipped
            .iter()
            .map(|s| {
                format!(
                    r#"<li><span class="step-no">Step {}</span> {} <span class="reason">{}</span></li>"#,
                    s.step_index,
                    html_escape(&s.name),
                    html_escape(&s.reason)
                )
            })
            .collect();
        format!(
            r#"<div class="step skipped"><div class="step-header"><h3>○ Skipped Steps</h3></div><ul class="skipped-list">{}</ul></div>"#,
            items
        )
    };

    let banner = if summary.all_passed() {
        r#"<div class="banner passed">🎉 All tests completed successfully!</div>"#
    } else {
        r#"<div class="banner failed">⚠️ Some tests failed or were skipped. Please review the results above.</div>"#
    };

    let flow: Vec<String> = report
        .results
        .iter()
        .map(|r| html_escape(&r.name))
        .chain(report.skipped.iter().map(|s| html_escape(&s.name)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>eCareHealth {suite} Test Report</title>
    <style>
        :root {{
            --bg-primary: #0a0f1d;
            --bg-secondary: #141b2d;
            --bg-tertiary: #1f2937;
            --border: #374151;
            --text-primary: #f9fafb;
            --text-secondary: #9ca3af;
            --green: #10b981;
            --red: #ef4444;
            --yellow: #f59e0b;
            --blue: #3b82f6;
        }}
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{ font-family: system-ui, -apple-system, sans-serif; background: var(--bg-primary); color: var(--text-primary); line-height: 1.5; padding: 3rem 1rem; }}
        .container {{ max-width: 1100px; margin: 0 auto; }}
        header {{ margin-bottom: 2.5rem; display: flex; justify-content: space-between; align-items: flex-end; }}
        h1 {{ font-size: 2.25rem; font-weight: 800; }}
        .subtitle {{ color: var(--text-secondary); }}
        .summary {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 1.5rem; margin-bottom: 2.5rem; }}
        .stat {{ background: var(--bg-secondary); border: 1px solid var(--border); padding: 1.5rem; border-radius: 1rem; }}
        .stat-value {{ font-size: 2.5rem; font-weight: 800; }}
        .stat-label {{ color: var(--text-secondary); font-size: 0.875rem; text-transform: uppercase; letter-spacing: 0.05em; }}
        .stat.passed .stat-value {{ color: var(--green); }}
        .stat.failed .stat-value {{ color: var(--red); }}
        .stat.skipped .stat-value {{ color: var(--yellow); }}
        .progress-bar {{ background: var(--bg-secondary); height: 12px; border-radius: 6px; overflow: hidden; border: 1px solid var(--border); margin-bottom: 3rem; }}
        .progress-fill {{ height: 100%; background: var(--green); }}
        .step {{ background: var(--bg-secondary); border: 1px solid var(--border); border-radius: 1.25rem; margin-bottom: 1.5rem; overflow: hidden; }}
        .step-header {{ padding: 1.25rem 1.5rem; display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid var(--border); }}
        .step.passed .step-header h3 {{ color: var(--green); }}
        .step.failed .step-header h3 {{ color: var(--red); }}
        .step.skipped .step-header h3 {{ color: var(--yellow); }}
        .step-body {{ padding: 1rem 1.5rem; }}
        .target {{ font-family: monospace; background: var(--bg-tertiary); padding: 0.25rem 0.75rem; border-radius: 0.5rem; }}
        .validation {{ margin: 0.5rem 0; padding: 0.6rem 0.9rem; border-radius: 0.5rem; }}
        .validation.passed {{ background: rgba(16, 185, 129, 0.1); border-left: 4px solid var(--green); }}
        .validation.failed {{ background: rgba(239, 68, 68, 0.1); border-left: 4px solid var(--red); }}
        .validation small {{ color: var(--text-secondary); display: block; }}
        .data {{ background: var(--bg-tertiary); padding: 0.75rem; border-radius: 0.5rem; margin-top: 0.75rem; font-family: monospace; font-size: 0.85rem; }}
        .error-message {{ background: rgba(239, 68, 68, 0.1); border-radius: 0.5rem; padding: 0.75rem; margin-top: 0.75rem; color: #fca5a5; font-family: monospace; }}
        .duration {{ color: var(--text-secondary); font-size: 0.75rem; }}
        .skipped-list {{ padding: 1rem 2.5rem; }}
        .reason {{ color: var(--text-secondary); font-size: 0.85rem; }}
        .banner {{ margin-top: 2rem; padding: 1.25rem; border-radius: 1rem; font-weight: 700; }}
        .banner.passed {{ background: rgba(16, 185, 129, 0.1); color: var(--green); }}
        .banner.failed {{ background: rgba(239, 68, 68, 0.1); color: var(--red); }}
        .meta {{ margin-top: 3rem; padding-top: 1.5rem; border-top: 1px solid var(--border); color: var(--text-secondary); font-size: 0.875rem; }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <div>
                <h1>🏥 eCareHealth {suite} Test Report</h1>
                <div class="subtitle">End-to-end results, generated on {date}</div>
            </div>
            <div style="text-align: right;">
                <div class="subtitle">Step Duration</div>
                <div style="font-size: 1.25rem; font-weight: 700;">{duration}</div>
            </div>
        </header>

        <div class="summary">
            <div class="stat passed"><div class="stat-value">{passed}</div><div class="stat-label">Tests Passed</div></div>
            <div class="stat failed"><div class="stat-value">{failed}</div><div class="stat-label">Tests Failed</div></div>
            <div class="stat skipped"><div class="stat-value">{skipped}</div><div class="stat-label">Skipped</div></div>
            <div class="stat"><div class="stat-value">{total}</div><div class="stat-label">Total Tests</div></div>
            <div class="stat {rate_class}"><div class="stat-value">{rate}</div><div class="stat-label">Success Rate</div></div>
        </div>

        <div class="progress-bar"><div class="progress-fill" style="width: {rate_width}%"></div></div>

        {steps_html}
        {skipped_html}

        <div class="step">
            <div class="step-header"><h3>📋 Test Execution Summary</h3></div>
            <div class="step-body">
                <p><strong>Environment:</strong> {base_url}</p>
                <p><strong>Tenant:</strong> {tenant}</p>
                <p><strong>Test Flow:</strong> {flow}</p>
            </div>
        </div>
        {banner}

        <div class="meta">Session: {session}</div>
    </div>
</body>
</html>"#,
        suite = html_escape(&report.suite.to_uppercase()),
        date = html_escape(&report.execution_date),
        duration = format_duration(total_duration),
        passed = summary.passed_tests,
        failed = summary.failed_tests,
        skipped = summary.skipped_tests,
        total = summary.total_tests,
        rate = summary.success_rate,
        rate_class = if summary.success_rate.is_perfect() { "passed" } else { "failed" },
        rate_width = summary.success_rate.bar_width(),
        steps_html = steps_html,
        skipped_html = skipped_html,
        base_url = html_escape(&report.base_url),
        tenant = html_escape(&report.tenant),
        flow = flow.join(" → "),
        banner = banner,
        session = html_escape(&report.session_id),
    )
}

fn render_step(result: &StepResult) -> String {
    let (icon, class) = match result.status {
        StepStatus::Passed => ("✅", "passed"),
        StepStatus::Failed => ("❌", "failed"),
    };

    let validations: String = result
        .validations
        .iter()
        .map(|v| {
            let (mark, class) = if v.passed { ("✓", "passed") } else { ("✗", "failed") };
            let detail = v
                .detail
                .as_deref()
                .map(|d| format!("<small>{}</small>", html_escape(d)))
                .unwrap_or_default();
            format!(
                r#"<div class="validation {}">{} {}{}</div>"#,
                class,
                mark,
                html_escape(&v.check),
                detail
            )
        })
        .collect();

    let error_html = result
        .error
        .as_deref()
        .map(|e| format!(r#"<div class="error-message">{}</div>"#, html_escape(e)))
        .unwrap_or_default();

    format!(
        r#"
        <div class="step {class}">
            <div class="step-header">
                <h3>{icon} Step {index}: {name} - {status}</h3>
                <span class="duration">{duration}</span>
            </div>
            <div class="step-body">
                <p><strong>Target:</strong> <span class="target">{target}</span></p>
                <p><strong>Outcome:</strong> {actual} (Expected: {expected})</p>
                <h4>Validations:</h4>
                {validations}
                {input}
                {extracted}
                {error_html}
            </div>
        </div>"#,
        class = class,
        icon = icon,
        index = result.step_index,
        name = html_escape(&result.name),
        status = result.status.as_str(),
        duration = format_duration(result.duration_ms),
        target = html_escape(&result.target_description),
        actual = html_escape(&result.actual_outcome.to_string()),
        expected = html_escape(&result.expected_outcome.to_string()),
        validations = validations,
        input = snapshot_block("Test Data", result.input_snapshot.as_ref()),
        extracted = snapshot_block("Extracted Data", result.extracted_snapshot.as_ref()),
        error_html = error_html,
    )
}

fn snapshot_block(title: &str, snapshot: Option<&BTreeMap<String, String>>) -> String {
    match snapshot {
        Some(map) if !map.is_empty() => {
            let rows: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", html_escape(k), html_escape(v)))
                .collect();
            format!(
                r#"<div class="data"><strong>{}:</strong><br>{}</div>"#,
                title,
                rows.join("<br>")
            )
        }
        _ => String::new(),
    }
}
