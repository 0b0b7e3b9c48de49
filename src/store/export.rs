//! Semicolon-delimited export of a table, for human consumption only.
//!
//! The snapshot database stays the source of truth; exports are rewritten
//! in full after each persisted merge.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::schema::TableRow;

pub const DELIMITER: char = ';';

/// Quote a field when it contains the delimiter, a quote, or a line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_line<W: Write>(out: &mut W, fields: &[String]) -> std::io::Result<()> {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    writeln!(out, "{}", line.join(&DELIMITER.to_string()))
}

/// Write `rows` with a header line to `path`.
///
/// The file is written next to its destination and renamed into place, so
/// readers never see a half-written export.
pub fn write_delimited<R: TableRow>(path: &Path, rows: &[R]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        let header: Vec<String> = R::COLUMNS.iter().map(|c| c.to_string()).collect();
        write_line(&mut out, &header)?;
        for row in rows {
            write_line(&mut out, &row.export_fields())?;
        }
        out.flush()?;
    }
    fs::rename(&tmp_path, path)
}
