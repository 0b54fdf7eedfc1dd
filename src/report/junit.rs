use super::types::StructuredReport;
use crate::runner::state::{SkippedStep, StepResult};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// JUnit XML for CI. Skipped steps become `<skipped/>` test cases so the
/// test count matches the suite's step list.
pub fn generate_junit_xml(report: &StructuredReport) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let summary = &report.summary;
    let tests = (summary.total_tests + summary.skipped_tests).to_string();
    let failures = summary.failed_tests.to_string();
    let skipped = summary.skipped_tests.to_string();
    let time = seconds(report.results.iter().map(|r| r.duration_ms).sum());
    let suite_name = format!("ecare-{}", report.suite);

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", suite_name.as_str()));
    suites_start.push_attribute(("tests", tests.as_str()));
    suites_start.push_attribute(("failures", failures.as_str()));
    suites_start.push_attribute(("skipped", skipped.as_str()));
    suites_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", report.suite.as_str()));
    suite_start.push_attribute(("tests", tests.as_str()));
    suite_start.push_attribute(("failures", failures.as_str()));
    suite_start.push_attribute(("skipped", skipped.as_str()));
    suite_start.push_attribute(("id", report.session_id.as_str()));
    suite_start.push_attribute(("time", time.as_str()));
    suite_start.push_attribute(("timestamp", report.execution_date.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for result in &report.results {
        write_result_case(&mut writer, &suite_name, result)?;
    }
    for step in &report.skipped {
        write_skipped_case(&mut writer, &suite_name, step)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn case_name(index: u32, name: &str) -> String {
    format!("Step {}: {}", index, name)
}

fn write_result_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    classname: &str,
    result: &StepResult,
) -> Result<()> {
    let name = case_name(result.step_index, &result.name);
    let time = seconds(result.duration_ms);
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", name.as_str()));
    case_start.push_attribute(("classname", classname));
    case_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(case_start))?;

    if !result.passed() {
        let message = result
            .error
            .clone()
            .or_else(|| result.first_failure())
            .unwrap_or_else(|| "Step failed".to_string());
        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message.as_str()));
        fail_start.push_attribute(("type", "AssertionError"));
        writer.write_event(Event::Start(fail_start))?;

        let body: Vec<String> = result
            .validations
            .iter()
            .filter(|v| !v.passed)
            .map(|v| match &v.detail {
                Some(detail) => format!("{}: {}", v.check, detail),
                None => v.check.clone(),
            })
            .collect();
        writer.write_event(Event::Text(BytesText::new(&body.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

fn write_skipped_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    classname: &str,
    step: &SkippedStep,
) -> Result<()> {
    let name = case_name(step.step_index, &step.name);
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", name.as_str()));
    case_start.push_attribute(("classname", classname));
    case_start.push_attribute(("time", "0"));
    writer.write_event(Event::Start(case_start))?;

    let mut skipped = BytesStart::new("skipped");
    skipped.push_attribute(("message", step.reason.as_str()));
    writer.write_event(Event::Empty(skipped))?;

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::build;
    use crate::report::fixtures::{meta, result};

    #[test]
    fn test_generate_junit_xml() {
        let skipped = vec![SkippedStep {
            step_index: 3,
            name: "Get Provider".to_string(),
            reason: "blocking step 2 failed".to_string(),
        }];
        let report = build(
            &[result(1, "Provider Login", true), result(2, "Add Provider", false)],
            &skipped,
            &meta(),
        );

        let xml = generate_junit_xml(&report).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="ecare-api""#));
        assert!(xml.contains(r#"tests="3""#));
        assert!(xml.contains(r#"failures="1""#));
        assert!(xml.contains(r#"skipped="1""#));
        assert!(xml.contains(r#"<testcase name="Step 1: Provider Login""#));
        assert!(xml.contains(r#"message="Status Code 200 failed: Got 500""#));
        assert!(xml.contains("Got 500 &lt;error&gt;"));
        assert!(xml.contains(r#"<skipped message="blocking step 2 failed"/>"#));
    }
}
