use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{Result, ScienceError};

/// Converts a PDF into trimmed, non-blank text lines.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_lines(&self, pdf_path: &Path, max_pages: u32) -> Result<Vec<String>>;
}

/// Runs poppler's `pdftotext` into a private scratch file.
pub struct PdfToTextExtractor {
    program: String,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl PdfToTextExtractor {
    pub fn new(program: impl Into<String>, scratch_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            scratch_dir: scratch_dir.into(),
            timeout,
        }
    }

    fn scratch_path(&self) -> PathBuf {
        self.scratch_dir.join(format!(
            "biblioscope_pdftotext_{}_{}.txt",
            std::process::id(),
            Uuid::now_v7()
        ))
    }
}

/// Removes its path when created and again when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        let _ = std::fs::remove_file(&path);
        Self { path }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait]
impl TextExtractor for PdfToTextExtractor {
    async fn extract_lines(&self, pdf_path: &Path, max_pages: u32) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let scratch = ScratchFile::new(self.scratch_path());

        let child = Command::new(&self.program)
            .args(["-enc", "UTF-8", "-nopgbrk", "-layout", "-l"])
            .arg(max_pages.to_string())
            .arg(pdf_path)
            .arg(&scratch.path)
            .kill_on_drop(true)
            .status();

        let status = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScienceError::PdfExtraction(format!(
                    "{} is not installed",
                    self.program
                )));
            }
            Ok(Err(err)) => {
                return Err(ScienceError::PdfExtraction(format!(
                    "failed to run {}: {err}",
                    self.program
                )));
            }
            Err(_) => {
                return Err(ScienceError::PdfExtraction(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )));
            }
        };

        if !status.success() {
            return Err(ScienceError::PdfExtraction(format!(
                "{} exited with status {status}",
                self.program
            )));
        }

        let bytes = tokio::fs::read(&scratch.path).await.map_err(|err| {
            ScienceError::PdfExtraction(format!(
                "failed to read extraction output {}: {err}",
                scratch.path.display()
            ))
        })?;

        let lines = split_lines(&String::from_utf8_lossy(&bytes));
        tracing::debug!(pdf = %pdf_path.display(), lines = lines.len(), "extracted text");
        Ok(lines)
    }
}

/// Trim every line and drop the blank ones.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
