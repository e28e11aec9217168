//! Report output port trait.

use crate::domain::engine::Report;
use crate::domain::error::TapetraderError;
use std::path::Path;

/// Port for exporting a ranked batch result. The core produces the ordered
/// rows; adapters decide the file format.
pub trait ReportPort {
    fn write_ranking(&self, reports: &[Report], output_path: &Path) -> Result<(), TapetraderError>;
}
