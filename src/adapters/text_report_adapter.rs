//! Plain-text report adapter: padded label column, one line per statistic.

use std::fs;
use std::path::Path;

use crate::domain::error::EarntraderError;
use crate::domain::report::ReportLine;
use crate::ports::report_port::ReportPort;

const LABEL_PADDING: usize = 40;

pub struct TextReportAdapter;

/// Render the report lines exactly as they print to the console.
pub fn render(report: &[ReportLine]) -> String {
    let mut out = String::new();
    for line in report {
        match line {
            ReportLine::Blank => out.push('\n'),
            ReportLine::Section(title) => {
                out.push_str(title);
                out.push('\n');
            }
            ReportLine::Entry { label, value } => {
                out.push_str(&format!("{label:<LABEL_PADDING$} {value}\n"));
            }
        }
    }
    out
}

impl ReportPort for TextReportAdapter {
    fn write(&self, report: &[ReportLine], output_path: &Path) -> Result<(), EarntraderError> {
        fs::write(output_path, render(report))?;
        Ok(())
    }
}
