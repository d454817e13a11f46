//! PDF text extraction.
//!
//! Uploaded bytes are spooled to a temporary file, parsed on a blocking
//! thread with `pdf-extract`, and the file is removed when the spool guard
//! drops: on success, on parse failure, and when the parser panics.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use docchat_core::adapters::TextExtractor;
use docchat_core::error::ExtractionError;

pub const MIME_PDF: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Scoped on-disk copy of an upload. The file is deleted on drop.
pub struct SpooledUpload {
    file: NamedTempFile,
}

impl SpooledUpload {
    pub fn write(dir: Option<&Path>, bytes: &[u8]) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docchat-upload-").suffix(".pdf");
        let mut file = match dir {
            Some(d) => {
                std::fs::create_dir_all(d)?;
                builder.tempfile_in(d)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// [`TextExtractor`] for PDF uploads.
pub struct PdfExtractor {
    spool_dir: Option<PathBuf>,
}

impl PdfExtractor {
    pub fn new(spool_dir: Option<PathBuf>) -> Self {
        Self { spool_dir }
    }
}

/// Cheap content sniff; the parser does the real validation.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        if !looks_like_pdf(bytes) {
            return Err(ExtractionError(format!(
                "unsupported content: expected {}",
                MIME_PDF
            )));
        }

        let spooled = SpooledUpload::write(self.spool_dir.as_deref(), bytes)
            .map_err(|e| ExtractionError(format!("failed to spool upload: {}", e)))?;

        let parsed = tokio::task::spawn_blocking(move || {
            let text = pdf_extract::extract_text(spooled.path());
            drop(spooled);
            text
        })
        .await;

        match parsed {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractionError(format!("PDF extraction failed: {}", e))),
            Err(e) => Err(ExtractionError(format!("PDF parser aborted: {}", e))),
        }
    }
}
