use crate::error::Result;
use super::ensure_parent_dir;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write any serializable payload as pretty JSON
pub fn export_pretty<T: Serialize, P: AsRef<Path>>(value: &T, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    ensure_parent_dir(output_path)?;

    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
