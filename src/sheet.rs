use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};

use crate::datekey::DateKey;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct SheetSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub date_columns: usize,
    pub sha256: String,
}

/// Renders the register as a tab-separated sheet laid out like the paper
/// workbook it replaces: Name, Roll, two reserved columns, one column per
/// date in first-use order, Total last. Date headers use the display label
/// ("17-Sep"), not the internal 4-digit key.
pub fn render_sheet(table: &Table) -> String {
    let mut out = String::new();
    out.push_str("Name\tRoll\t\t");
    for key in &table.columns {
        out.push('\t');
        match DateKey::from_key(key) {
            Some(d) => out.push_str(&d.label()),
            None => out.push_str(key),
        }
    }
    out.push_str("\tTotal\n");

    for row in &table.rows {
        out.push_str(&row.name);
        out.push('\t');
        out.push_str(&row.roll_number.to_string());
        out.push_str("\t\t");
        for cell in &row.cells {
            out.push('\t');
            out.push_str(cell.code());
        }
        out.push('\t');
        out.push_str(&row.total.to_string());
        out.push('\n');
    }
    out
}

/// Writes the rendered sheet next to its final name and renames it into
/// place, so a reader never sees a half-written file. Returns the sha256 of
/// the bytes written for delivery verification.
pub fn export_sheet(table: &Table, out_path: &Path) -> anyhow::Result<SheetSummary> {
    let body = render_sheet(table);

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create export directory {}", parent.display()))?;
        }
    }

    let tmp = tmp_sibling(out_path)?;
    fs::write(&tmp, body.as_bytes()).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, out_path)
        .with_context(|| format!("move sheet into {}", out_path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    Ok(SheetSummary {
        path: out_path.to_path_buf(),
        rows: table.rows.len(),
        date_columns: table.columns.len(),
        sha256,
    })
}

fn tmp_sibling(out_path: &Path) -> anyhow::Result<PathBuf> {
    let name = out_path
        .file_name()
        .ok_or_else(|| anyhow!("export path has no file name: {}", out_path.display()))?;
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".exporting");
    Ok(out_path.with_file_name(tmp_name))
}
