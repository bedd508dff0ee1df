use anyhow::{anyhow, Context, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content: String,
    pub format: DocumentFormat,
}

pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedDocument> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = DocumentFormat::from_extension(extension).ok_or_else(|| {
            anyhow!(
                "Unsupported file type '{}': expected .pdf, .md, .markdown or .txt ({})",
                extension,
                path.display()
            )
        })?;

        let content = match format {
            DocumentFormat::Pdf => self.parse_pdf(path)?,
            DocumentFormat::Markdown | DocumentFormat::PlainText => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?,
        };

        tracing::debug!(
            path = %path.display(),
            format = ?format,
            chars = content.chars().count(),
            "Parsed document"
        );

        Ok(ParsedDocument { content, format })
    }

    fn parse_pdf(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF: {}", path.display()))?;

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| anyhow!("PDF text extraction failed for {}: {}", path.display(), e))?;
        let cleaned = clean_extracted_text(&text);

        if cleaned.is_empty() {
            return Err(anyhow!(
                "PDF contains no extractable text (scanned/image-based): {}",
                path.display()
            ));
        }
        Ok(cleaned)
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim every line and drop the blank ones pdf-extract leaves between blocks.
fn clean_extracted_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
