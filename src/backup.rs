use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/rollcall.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
const DB_FILE_NAME: &str = "rollcall.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "rollcall-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

/// Bundles the workspace database into a zip with a manifest and workspace
/// metadata. The manifest records the database checksum so an import can
/// detect a truncated or tampered bundle before overwriting anything.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        return Err(anyhow!("workspace database not found: {}", db_path.display()));
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create bundle directory {}", parent.display()))?;
        }
    }

    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("read database {}", db_path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&db_bytes);
    let db_sha256 = format!("{:x}", hasher.finalize());

    let out_file = File::create(out_path)
        .with_context(|| format!("create bundle file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("serialize manifest")?
            .as_bytes(),
    )
    .context("write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("start database entry")?;
    zip.write_all(&db_bytes).context("write database entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": workspace_path.to_string_lossy(),
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("serialize workspace metadata")?
            .as_bytes(),
    )
    .context("write workspace metadata entry")?;

    zip.finish().context("finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        db_sha256,
    })
}

/// Restores a bundle (or a bare sqlite file, for registers saved before the
/// bundle format existed) into a workspace. The database is extracted to a
/// staging name and renamed over the target, so a failed import leaves the
/// old workspace usable.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("create workspace {}", workspace_path.display()))?;
    let dst = workspace_path.join(DB_FILE_NAME);

    if !is_zip_file(in_path)? {
        // fs::copy onto the same file truncates it; a bare input that is
        // already the workspace database is complete as-is.
        let already_in_place = match (in_path.canonicalize(), dst.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !already_in_place {
            std::fs::copy(in_path, &dst).with_context(|| {
                format!(
                    "copy bare sqlite backup from {} to {}",
                    in_path.display(),
                    dst.display()
                )
            })?;
        }
        return Ok(ImportSummary {
            bundle_format_detected: "bare-sqlite3".to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .context("bundle missing db/rollcall.sqlite3")?
        .read_to_end(&mut db_bytes)
        .context("extract database entry")?;

    if let Some(expected) = manifest.get("dbSha256").and_then(|v| v.as_str()) {
        let mut hasher = Sha256::new();
        hasher.update(&db_bytes);
        let actual = format!("{:x}", hasher.finalize());
        if actual != expected {
            return Err(anyhow!(
                "bundle database checksum mismatch: expected {}, got {}",
                expected,
                actual
            ));
        }
    }

    let tmp_dst = workspace_path.join("rollcall.sqlite3.importing");
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }

    let mut db_out = File::create(&tmp_dst)
        .with_context(|| format!("create temp database {}", tmp_dst.display()))?;
    db_out
        .write_all(&db_bytes)
        .context("write extracted database")?;
    db_out.flush().context("flush extracted database")?;
    drop(db_out);

    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("remove existing database {}", dst.display()))?;
    }
    std::fs::rename(&tmp_dst, &dst)
        .with_context(|| format!("move extracted database to {}", dst.display()))?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("open input file {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
