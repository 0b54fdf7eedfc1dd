use super::types::StructuredReport;
use anyhow::Result;

/// Pretty JSON. Field order follows the struct definitions and snapshot maps
/// are ordered, so equal reports serialize to identical bytes.
pub fn render(report: &StructuredReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
