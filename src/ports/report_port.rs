//! Report output port.

use std::path::Path;

use crate::domain::error::EarntraderError;
use crate::domain::report::ReportLine;

pub trait ReportPort {
    fn write(&self, report: &[ReportLine], output_path: &Path) -> Result<(), EarntraderError>;
}
