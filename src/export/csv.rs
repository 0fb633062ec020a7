use crate::error::Result;
use crate::models::History;
use super::ensure_parent_dir;
use std::path::Path;

/// Export a history as CSV with the same header the importer reads
pub fn export_history<P: AsRef<Path>>(history: &History, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    ensure_parent_dir(output_path)?;

    let mut writer = ::csv::Writer::from_path(output_path)?;
    for record in history.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
