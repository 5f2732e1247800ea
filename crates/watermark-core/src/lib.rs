//! Watermark removal for PDF documents
//!
//! This crate strips watermark content from PDFs client-side using lopdf.
//!
//! Two layers are available:
//! - `remove_watermarks` / `remove_watermarks_with`: bytes in, bytes out
//! - `sanitize_document` / `StreamRewriter`: work on an already loaded
//!   `Document` or on a single decoded content stream
//!
//! Removal is conservative: only regions that are balanced and match a rule
//! are deleted, and anything that cannot be parsed is left in place.

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod lexer;
pub mod report;
pub mod rewriter;
pub mod sanitizer;
pub mod scanner;
pub mod transform;

pub use batch::remove_watermarks_batch;
pub use config::{FormXObjectPolicy, RemovalConfig};
pub use error::{StreamError, WatermarkError};
pub use report::{ProcessMetrics, ProcessResult, RemovalReport};
pub use rewriter::{Rewrite, Rule, SegmentRewrite, StreamRewriter};
pub use sanitizer::sanitize_document;

use lopdf::Document;
use tracing::{debug, info};

/// Cleaned PDF bytes together with what was removed
#[derive(Debug, Clone)]
pub struct RemovalOutput {
    pub bytes: Vec<u8>,
    pub report: RemovalReport,
}

/// Remove watermarks with the default configuration
pub fn remove_watermarks(input: &[u8]) -> Result<Vec<u8>, WatermarkError> {
    remove_watermarks_with(input, &RemovalConfig::default()).map(|output| output.bytes)
}

/// Remove watermarks and report what was stripped.
///
/// Fails only when the configuration is invalid, the input cannot be parsed
/// or decrypted, or the result cannot be saved. Individual streams that
/// fail to decode are left untouched and counted in the report.
pub fn remove_watermarks_with(
    input: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalOutput, WatermarkError> {
    config.validate()?;

    let mut doc = load_document(input)?;
    let report = sanitize_document(&mut doc, config);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| WatermarkError::SerializationError(e.to_string()))?;

    info!(
        pages = report.pages,
        streams_rewritten = report.streams_rewritten,
        streams_skipped = report.streams_skipped,
        operators_removed = report.operators_removed,
        xobjects_removed = report.xobjects_removed,
        input_bytes = input.len(),
        output_bytes = bytes.len(),
        "watermark removal finished"
    );

    Ok(RemovalOutput { bytes, report })
}

/// Parse PDF bytes, opening legacy empty-password encryption.
///
/// The returned document is unencrypted and saves without `/Encrypt`.
pub fn load_document(input: &[u8]) -> Result<Document, WatermarkError> {
    let mut doc =
        Document::load_mem(input).map_err(|e| WatermarkError::ParseError(e.to_string()))?;

    if doc.is_encrypted() {
        debug!("document is encrypted, trying the empty user password");
        doc.decrypt("")
            .map_err(|e| WatermarkError::Encrypted(e.to_string()))?;
        doc.trailer.remove(b"Encrypt");
    }

    Ok(doc)
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, WatermarkError> {
    let doc = load_document(bytes)?;
    Ok(doc.get_pages().len() as u32)
}
