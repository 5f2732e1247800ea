use base64::Engine;
use serde::Serialize;

/// What a removal pass stripped from one document
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RemovalReport {
    pub pages: usize,
    /// Content or form streams whose bytes changed
    pub streams_rewritten: usize,
    /// Streams left as-is because they could not be decoded or re-encoded
    pub streams_skipped: usize,
    /// Regions and text-show operators removed across all streams
    pub operators_removed: usize,
    /// XObject names removed from resource dictionaries
    pub xobjects_removed: usize,
    pub annotations_removed: usize,
    pub property_lists_removed: usize,
    pub catalog_entries_removed: usize,
    pub objects_pruned: usize,
}

impl RemovalReport {
    /// Whether anything at all was removed
    pub fn is_clean(&self) -> bool {
        self.operators_removed == 0
            && self.xobjects_removed == 0
            && self.annotations_removed == 0
            && self.property_lists_removed == 0
            && self.catalog_entries_removed == 0
    }
}

/// JSON envelope handed to the browser binding
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
    pub report: Option<RemovalReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    pub fn success(
        input_size_bytes: usize,
        output: &[u8],
        report: RemovalReport,
        processing_time_ms: u64,
    ) -> Self {
        let metrics = ProcessMetrics {
            input_size_bytes,
            output_size_bytes: output.len(),
            page_count: report.pages as u32,
            processing_time_ms,
        };
        Self {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(output)),
            error: None,
            metrics: Some(metrics),
            report: Some(report),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            metrics: None,
            report: None,
        }
    }
}
