//! PDF text extraction using `pdftotext` / `pdfinfo` (poppler-utils).
//!
//! For large PDFs (> 100 pages), extraction is batched in 50-page chunks to
//! bound memory usage. Each invocation is guarded by a per-command timeout.
//! Page breaks survive as form feeds, so the TOC detector can address the
//! first N pages.

use std::io::Write;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use pith_core::defaults::{
    EXTRACTION_CMD_TIMEOUT_SECS, LARGE_PDF_PAGE_THRESHOLD, PDF_BATCH_PAGES,
};
use pith_core::{Error, Result};
use pith_pipeline::ParsedDocument;

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Internal(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Internal(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the `Pages:` line of `pdfinfo` output.
fn parse_page_count(output: &str) -> Option<i32> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("pages") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Collapse extraction artifacts: runs of blank lines and trailing spaces.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Extract cleaned text and per-page text from PDF bytes.
pub async fn extract_pdf(data: &[u8], filename: &str) -> Result<ParsedDocument> {
    if data.is_empty() {
        return Err(Error::InvalidInput(
            "Cannot extract text from empty PDF data".to_string(),
        ));
    }

    // Validate PDF magic bytes (%PDF)
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidInput(format!(
            "File '{}' is not a valid PDF (missing %PDF header)",
            filename
        )));
    }

    // pdftotext reads from a file path
    let mut tmpfile = NamedTempFile::new()
        .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;
    let tmp_path = tmpfile.path().to_string_lossy().to_string();

    let page_count = match run_cmd_with_timeout(
        Command::new("pdfinfo").arg(&tmp_path),
        EXTRACTION_CMD_TIMEOUT_SECS,
    )
    .await
    {
        Ok(output) => parse_page_count(&output),
        Err(e) => {
            warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
            None
        }
    };

    let pages_total = page_count.unwrap_or(0) as usize;
    let raw = if pages_total > LARGE_PDF_PAGE_THRESHOLD {
        debug!(filename, pages = pages_total, "Large PDF detected, extracting in batches");
        let mut batches = Vec::new();
        let mut start = 1usize;
        while start <= pages_total {
            let end = (start + PDF_BATCH_PAGES - 1).min(pages_total);
            let batch = run_cmd_with_timeout(
                Command::new("pdftotext")
                    .arg("-f")
                    .arg(start.to_string())
                    .arg("-l")
                    .arg(end.to_string())
                    .arg(&tmp_path)
                    .arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?;
            batches.push(batch);
            start = end + 1;
        }
        batches.join("")
    } else {
        run_cmd_with_timeout(
            Command::new("pdftotext").arg(&tmp_path).arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?
    };

    // pdftotext separates pages with form feeds.
    let pages: Vec<String> = raw
        .split('\u{c}')
        .map(clean_text)
        .filter(|p| !p.is_empty())
        .collect();
    let cleaned_text = pages.join("\n\n");

    debug!(
        filename,
        pages = pages.len(),
        chars = cleaned_text.len(),
        "PDF text extracted"
    );

    Ok(ParsedDocument {
        cleaned_text,
        pages,
        page_count: page_count.filter(|&p| p > 0),
    })
}
