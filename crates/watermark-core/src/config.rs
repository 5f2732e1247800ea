//! Removal configuration
//!
//! Every heuristic threshold is a field here rather than a constant, so the
//! browser can pass a JSON object and tests can tighten or loosen rules.

use crate::error::WatermarkError;
use crate::transform::DEFAULT_ROTATION_TOLERANCE;
use serde::{Deserialize, Serialize};

/// Fraction of pages an XObject must appear on to count as a repeating stamp
pub const DEFAULT_SHARE_RATIO: f64 = 0.8;

/// Documents with at most this many pages treat any XObject use as shared
pub const DEFAULT_SMALL_DOCUMENT_PAGES: usize = 2;

/// Stock trial-version stamps matched by the text denylist
pub const DEFAULT_DENYLIST: &[&str] = &[
    "evaluation copy",
    "evaluation only",
    "unregistered version",
    "trial version",
];

/// How Form XObjects are treated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormXObjectPolicy {
    /// Remove every Form XObject from page resources
    #[default]
    Aggressive,
    /// Remove Form XObjects only when they are shared like any other stamp
    Conservative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemovalConfig {
    /// Case-insensitive substrings that mark a text-show operator as a watermark
    pub denylist: Vec<String>,
    /// Limit for `|b|` and `|c|` of a `cm`/`Tm` matrix
    pub rotation_tolerance: f64,
    /// Share of pages (0, 1] referencing an XObject before it is stripped
    pub share_ratio: f64,
    /// Page count at or below which any XObject use counts as shared
    pub small_document_pages: usize,
    pub form_policy: FormXObjectPolicy,
    /// Run surviving Form XObject streams through the rewriter
    pub clean_form_xobjects: bool,
    /// Drop objects no longer reachable after stripping
    pub prune_unreferenced: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
            share_ratio: DEFAULT_SHARE_RATIO,
            small_document_pages: DEFAULT_SMALL_DOCUMENT_PAGES,
            form_policy: FormXObjectPolicy::default(),
            clean_form_xobjects: true,
            prune_unreferenced: true,
        }
    }
}

impl RemovalConfig {
    /// Replace the denylist
    pub fn with_denylist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_form_policy(mut self, policy: FormXObjectPolicy) -> Self {
        self.form_policy = policy;
        self
    }

    /// Reject values that would make the heuristics meaningless
    pub fn validate(&self) -> Result<(), WatermarkError> {
        if !self.rotation_tolerance.is_finite() || self.rotation_tolerance < 0.0 {
            return Err(WatermarkError::InvalidConfig(format!(
                "rotation_tolerance must be a non-negative number, got {}",
                self.rotation_tolerance
            )));
        }

        if !(self.share_ratio > 0.0 && self.share_ratio <= 1.0) {
            return Err(WatermarkError::InvalidConfig(format!(
                "share_ratio must be in (0, 1], got {}",
                self.share_ratio
            )));
        }

        // An empty needle would match every string in the document
        if let Some(i) = self.denylist.iter().position(|s| s.trim().is_empty()) {
            return Err(WatermarkError::InvalidConfig(format!(
                "denylist entry {} is empty",
                i
            )));
        }

        Ok(())
    }
}
