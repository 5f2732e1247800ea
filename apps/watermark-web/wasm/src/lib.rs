//! WASM bindings for PDF watermark removal
//!
//! All parsing and rewriting happens in Rust; JavaScript only handles file
//! I/O and the DOM.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { removeWatermarks, removeWatermarksWithConfig, getPdfInfo } from './pkg/watermark_wasm.js';
//!
//! await init();
//!
//! const info = getPdfInfo(bytes);
//! if (info.suspect_streams > 0) {
//!     const cleaned = removeWatermarks(bytes);
//!     downloadBlob(cleaned, "clean.pdf");
//! }
//!
//! // Custom rules, JSON envelope with base64 data and a removal report
//! const result = removeWatermarksWithConfig(bytes, { denylist: ["Jane Doe"] });
//! ```

pub mod inspect;

use wasm_bindgen::prelude::*;
use watermark_core::{remove_watermarks_with, ProcessResult, RemovalConfig};

pub use inspect::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Remove watermarks with the default rules; returns the cleaned PDF bytes
#[wasm_bindgen(js_name = removeWatermarks)]
pub fn remove_watermarks(bytes: &[u8]) -> Result<Vec<u8>, JsValue> {
    watermark_core::remove_watermarks(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Remove watermarks with a JSON-shaped config object.
///
/// Missing fields take their defaults; `undefined` or `null` means all
/// defaults. Failures are reported inside the envelope, not thrown.
#[wasm_bindgen(js_name = removeWatermarksWithConfig)]
pub fn remove_watermarks_with_config(bytes: &[u8], config: JsValue) -> Result<JsValue, JsValue> {
    let result = match parse_config(config) {
        Ok(config) => process(bytes, &config, js_sys::Date::now),
        Err(message) => ProcessResult::failure(message),
    };

    serde_wasm_bindgen::to_value(&result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get page count and watermark hints without modifying the file
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = inspect::inspect_pdf(bytes).map_err(|e| JsValue::from_str(&e))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn parse_config(config: JsValue) -> Result<RemovalConfig, String> {
    if config.is_undefined() || config.is_null() {
        return Ok(RemovalConfig::default());
    }
    serde_wasm_bindgen::from_value(config).map_err(|e| format!("Invalid removal configuration: {}", e))
}

/// Run a removal and wrap the outcome; `now` returns milliseconds
fn process(bytes: &[u8], config: &RemovalConfig, now: impl Fn() -> f64) -> ProcessResult {
    let started = now();
    match remove_watermarks_with(bytes, config) {
        Ok(output) => {
            let elapsed = (now() - started).max(0.0) as u64;
            ProcessResult::success(bytes.len(), &output.bytes, output.report, elapsed)
        }
        Err(e) => ProcessResult::failure(e),
    }
}
