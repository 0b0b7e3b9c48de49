//! Safety utilities to prevent accidental overwrites of the snapshot.
//!
//! Exports are rewritten in full on every persist; these checks make sure a
//! misconfigured export path can never clobber the snapshot database.

use std::path::Path;

use crate::error::{CatalogError, Result};

/// Validates that an export path is safe to overwrite.
///
/// Checks:
/// - Export filename must contain the table name (e.g., "songs")
/// - Export must use the `.csv` extension
/// - Export cannot be the same file as the snapshot
pub fn validate_export_path(export: &Path, table_name: &str, snapshot: &Path) -> Result<()> {
    let export_name = export.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !export_name.contains(table_name) {
        return Err(CatalogError::Config(format!(
            "export file '{}' must contain '{}' in the name",
            export.display(),
            table_name
        )));
    }

    if export.extension().and_then(|e| e.to_str()) != Some("csv") {
        return Err(CatalogError::Config(format!(
            "export file '{}' must have a .csv extension",
            export.display()
        )));
    }

    if export == snapshot {
        return Err(CatalogError::Config(format!(
            "export '{}' cannot be the same as the snapshot '{}'",
            export.display(),
            snapshot.display()
        )));
    }

    Ok(())
}
