//! Catalog commands: list, download, publish.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::http::{base_url, get_json, get_raw, post_json_body};

#[derive(Serialize, Deserialize)]
struct FileEntry {
    name: String,
    size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Deserialize)]
struct PublishResponse {
    files: usize,
}

// ── files ─────────────────────────────────────────────────────────────────────

pub async fn cmd_files(port: u16) -> Result<()> {
    let files: Vec<FileEntry> = get_json(&format!("{}/files", base_url(port))).await?;

    if files.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Catalog ({})", files.len());
    println!("═══════════════════════════════════════");
    for (i, f) in files.iter().enumerate() {
        println!("  [{:>3}] {} ({} bytes)", i, f.name, f.size);
    }

    Ok(())
}

// ── get ───────────────────────────────────────────────────────────────────────

pub async fn cmd_get(port: u16, index: usize, out: Option<&str>) -> Result<()> {
    let mut resp = get_raw(&format!("{}/file/{}", base_url(port), index)).await?;

    let out_path = match out {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(
            resp.headers()
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(disposition_filename)
                .unwrap_or_else(|| format!("file-{index}")),
        ),
    };

    let mut file = tokio::fs::File::create(&out_path)
        .await
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut written: u64 = 0;
    while let Some(chunk) = resp.chunk().await.context("download interrupted")? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    println!("Saved {} ({} bytes)", out_path.display(), written);
    Ok(())
}

/// Extract the name from `inline; filename="name"`, keeping only its last
/// path component.
fn disposition_filename(value: &str) -> Option<String> {
    let raw = value.split("filename=").nth(1)?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_string_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}

// ── publish ───────────────────────────────────────────────────────────────────

pub async fn cmd_publish(port: u16, paths: &[&str], token: Option<&str>) -> Result<()> {
    let mut entries = Vec::with_capacity(paths.len());
    for p in paths {
        let abs = std::fs::canonicalize(p).with_context(|| format!("failed to resolve {}", p))?;
        let meta = std::fs::metadata(&abs)
            .with_context(|| format!("failed to stat {}", abs.display()))?;
        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.to_string());
        entries.push(FileEntry {
            name,
            size: meta.len(),
            path: Some(abs.to_string_lossy().into_owned()),
        });
    }

    let resp: PublishResponse =
        post_json_body(&format!("{}/files", base_url(port)), &entries, token).await?;
    println!("Published {} file(s) to the catalog.", resp.files);
    Ok(())
}
