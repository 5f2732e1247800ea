//! PDF validation and watermark inspection
//!
//! Reports what a removal pass would find, without changing the document.

use std::collections::BTreeSet;

use lopdf::{Document, Object};
use serde::Serialize;
use watermark_core::codec::decode_stream;
use watermark_core::{load_document, RemovalConfig, StreamRewriter};

/// PDF file information shown before the user starts a removal
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the file carries an `/Encrypt` dictionary
    pub encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
    /// Page content streams at least one removal rule matches
    pub suspect_streams: usize,
    /// Page content streams that could not be decoded
    pub undecodable_streams: usize,
    pub annotation_count: usize,
    /// Catalog declares optional content (layers)
    pub has_optional_content: bool,
    pub has_acroform: bool,
}

impl PdfInfo {
    /// Whether removal is likely to change anything
    pub fn likely_watermarked(&self) -> bool {
        self.suspect_streams > 0 || self.annotation_count > 0 || self.has_optional_content
    }
}

/// Validate a PDF file and inspect it with the default rules
pub fn inspect_pdf(bytes: &[u8]) -> Result<PdfInfo, String> {
    quick_check_header(bytes)?;

    let version = extract_version(bytes);
    let encrypted = Document::load_mem(bytes)
        .map(|doc| doc.is_encrypted())
        .unwrap_or(false);
    let document = load_document(bytes).map_err(|e| e.to_string())?;

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err("PDF has no pages".to_string());
    }

    let (title, author) = extract_metadata(&document);
    let (suspect_streams, undecodable_streams) =
        scan_content_streams(&document, &RemovalConfig::default());
    let catalog = catalog_keys(&document);

    Ok(PdfInfo {
        page_count,
        version,
        encrypted,
        size_bytes: bytes.len(),
        title,
        author,
        suspect_streams,
        undecodable_streams,
        annotation_count: count_annotations(&document),
        has_optional_content: catalog.contains(&b"OCProperties".to_vec()),
        has_acroform: catalog.contains(&b"AcroForm".to_vec()),
    })
}

fn quick_check_header(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 8 {
        return Err("File too small to be a valid PDF".to_string());
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err("Not a valid PDF file (missing %PDF- header)".to_string());
    }
    Ok(())
}

/// Header format: %PDF-1.7
fn extract_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1.4".to_string())
}

fn info_string(info: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let bytes = info.get(key).and_then(Object::as_str).ok()?;
    let decoded = String::from_utf8_lossy(bytes);
    (!decoded.is_empty()).then(|| decoded.into_owned())
}

fn extract_metadata(document: &Document) -> (Option<String>, Option<String>) {
    let Ok(info) = document
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| document.get_dictionary(id))
    else {
        return (None, None);
    };
    (info_string(info, b"Title"), info_string(info, b"Author"))
}

/// Count (suspect, undecodable) content streams; shared streams count once.
/// A page's streams are scanned as one continuous stream.
fn scan_content_streams(document: &Document, config: &RemovalConfig) -> (usize, usize) {
    let rewriter = StreamRewriter::new(config);
    let mut seen = BTreeSet::new();
    let mut suspect = 0;
    let mut undecodable = 0;

    for page_id in document.get_pages().into_values() {
        let content_ids = document.get_page_contents(page_id);
        if content_ids.iter().all(|id| seen.contains(id)) {
            continue;
        }

        let mut run = Vec::new();
        for content_id in content_ids {
            let first_visit = seen.insert(content_id);
            let Ok(Object::Stream(stream)) = document.get_object(content_id) else {
                continue;
            };
            match decode_stream(stream) {
                Ok(decoded) => run.push((first_visit, decoded)),
                Err(_) => {
                    if first_visit {
                        undecodable += 1;
                    }
                    suspect += count_changed(&rewriter, std::mem::take(&mut run));
                }
            }
        }
        suspect += count_changed(&rewriter, run);
    }

    (suspect, undecodable)
}

/// Streams of a decodable run the rewriter would change, first visits only
fn count_changed(rewriter: &StreamRewriter, run: Vec<(bool, Vec<u8>)>) -> usize {
    if run.is_empty() {
        return 0;
    }
    let segments: Vec<&[u8]> = run.iter().map(|(_, decoded)| decoded.as_slice()).collect();
    let result = rewriter.rewrite_segments(&segments);
    run.iter()
        .zip(result.changed)
        .filter(|((first_visit, _), changed)| *first_visit && *changed)
        .count()
}

fn count_annotations(document: &Document) -> usize {
    document
        .get_pages()
        .into_values()
        .filter_map(|id| document.get_dictionary(id).ok())
        .filter_map(|page| match page.get(b"Annots") {
            Ok(Object::Array(items)) => Some(items.len()),
            Ok(Object::Reference(id)) => document
                .get_object(*id)
                .and_then(Object::as_array)
                .ok()
                .map(Vec::len),
            _ => None,
        })
        .sum()
}

fn catalog_keys(document: &Document) -> Vec<Vec<u8>> {
    document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| document.get_dictionary(id))
        .map(|catalog| catalog.iter().map(|(key, _)| key.clone()).collect())
        .unwrap_or_default()
}
