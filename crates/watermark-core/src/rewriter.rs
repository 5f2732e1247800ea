//! Content stream rewriting
//!
//! Five removal rules run in a fixed order. Each rule re-lexes the output
//! of the previous one, so later rules never see bytes an earlier rule
//! already removed.
//!
//! 1. Marked content tagged `/Artifact` or `/Watermark`
//! 2. Text objects placed with a rotated or skewed matrix
//! 3. `q ... Q` groups whose own `cm` is skewed and which draw text
//! 4. `q ... Q` groups whose own `cm` is skewed and which paint an XObject
//! 5. Text-show operators whose string contains a denylisted phrase

use crate::config::RemovalConfig;
use crate::lexer::{parse_operations, Operation, TokenKind};
use crate::scanner::{
    apply_edits, disjoint_edits, find_regions, join_segments, split_edits, Edit, Region,
};
use crate::transform::{has_skewed_transform, Matrix};
use tracing::debug;

/// Marked-content tags that always denote watermark or pagination artifacts
const WATERMARK_TAGS: &[&[u8]] = &[b"Artifact", b"Watermark"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    TaggedMarkedContent,
    SkewedTextObject,
    SkewedTextGroup,
    SkewedXObjectGroup,
    DenylistedText,
}

impl Rule {
    /// Rules in the order they are applied
    pub const ALL: [Rule; 5] = [
        Rule::TaggedMarkedContent,
        Rule::SkewedTextObject,
        Rule::SkewedTextGroup,
        Rule::SkewedXObjectGroup,
        Rule::DenylistedText,
    ];
}

/// Result of rewriting one stream
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub content: Vec<u8>,
    /// False when no rule matched; `content` then equals the input
    pub changed: bool,
    /// Number of regions or operators removed
    pub removed: usize,
}

/// Result of rewriting the content streams of one page
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRewrite {
    /// Rewritten content, one entry per input stream
    pub segments: Vec<Vec<u8>>,
    /// Which segments an edit touched
    pub changed: Vec<bool>,
    pub removed: usize,
}

/// Applies the removal rules to decoded content streams
#[derive(Debug, Clone)]
pub struct StreamRewriter {
    /// Lowercased denylist phrases
    denylist: Vec<String>,
    tolerance: f64,
}

impl StreamRewriter {
    pub fn new(config: &RemovalConfig) -> Self {
        Self {
            denylist: config.denylist.iter().map(|s| s.to_lowercase()).collect(),
            tolerance: config.rotation_tolerance,
        }
    }

    /// Run every rule over `input`
    pub fn rewrite(&self, input: &[u8]) -> Rewrite {
        let mut result = self.rewrite_segments(&[input]);
        Rewrite {
            content: result.segments.pop().unwrap_or_default(),
            changed: result.removed > 0,
            removed: result.removed,
        }
    }

    /// Run every rule over several streams read as one continuous stream.
    ///
    /// Regions may start in one segment and end in a later one. Each segment
    /// comes back separately; segments no edit touched are returned as given.
    pub fn rewrite_segments<S: AsRef<[u8]>>(&self, inputs: &[S]) -> SegmentRewrite {
        let mut segments: Vec<Vec<u8>> = inputs.iter().map(|s| s.as_ref().to_vec()).collect();
        let mut changed = vec![false; segments.len()];
        let mut removed = 0;

        for rule in Rule::ALL {
            let joined = join_segments(segments.as_slice());
            let ops = parse_operations(&joined.content);
            let edits = disjoint_edits(self.edits_for(rule, &joined.content, &ops));
            if edits.is_empty() {
                continue;
            }
            debug!(?rule, count = edits.len(), "removing watermark content");
            removed += edits.len();

            for (index, local) in split_edits(&edits, &joined.ranges).into_iter().enumerate() {
                if local.is_empty() {
                    continue;
                }
                segments[index] = apply_edits(&segments[index], local);
                changed[index] = true;
            }
        }

        SegmentRewrite {
            segments,
            changed,
            removed,
        }
    }

    /// Edits a single rule would make to `src`
    pub fn edits_for(&self, rule: Rule, src: &[u8], ops: &[Operation]) -> Vec<Edit> {
        match rule {
            Rule::TaggedMarkedContent => find_regions(ops, &["BDC", "BMC"], "EMC")
                .into_iter()
                .filter(|r| is_watermark_tag(src, &ops[r.open]))
                .map(|r| Edit::delete(r.span()))
                .collect(),
            Rule::SkewedTextObject => find_regions(ops, &["BT"], "ET")
                .into_iter()
                .filter(|r| has_skewed_transform(src, r.inner(ops), self.tolerance))
                .map(|r| Edit::delete(r.span()))
                .collect(),
            Rule::SkewedTextGroup => self.skewed_groups(src, ops, |inner| {
                inner.iter().any(|op| op.is("BT")) && inner.iter().any(|op| op.is("ET"))
            }),
            Rule::SkewedXObjectGroup => {
                self.skewed_groups(src, ops, |inner| inner.iter().any(|op| op.is("Do")))
            }
            Rule::DenylistedText => {
                if self.denylist.is_empty() {
                    return Vec::new();
                }
                ops.iter()
                    .filter(|op| is_text_show(op))
                    .filter(|op| self.is_denylisted(src, op))
                    .map(|op| neutralize_show(src, op))
                    .collect()
            }
        }
    }

    fn skewed_groups<F>(&self, src: &[u8], ops: &[Operation], draws: F) -> Vec<Edit>
    where
        F: Fn(&[Operation]) -> bool,
    {
        find_regions(ops, &["q"], "Q")
            .into_iter()
            .filter(|r| {
                let inner = r.inner(ops);
                draws(inner) && self.own_transform_skewed(src, inner)
            })
            .map(|r: Region| Edit::delete(r.span()))
            .collect()
    }

    /// Whether a `cm` at the group's own level, before the group itself
    /// draws anything, is skewed. Matrices and drawing inside nested groups
    /// belong to those groups.
    fn own_transform_skewed(&self, src: &[u8], inner: &[Operation]) -> bool {
        let mut depth = 0usize;
        for op in inner {
            match op.operator.as_str() {
                "q" => depth += 1,
                "Q" => depth = depth.saturating_sub(1),
                "BT" | "Do" if depth == 0 => break,
                "cm" if depth == 0 => {
                    if Matrix::from_operation(src, op).is_some_and(|m| m.is_skewed(self.tolerance))
                    {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn is_denylisted(&self, src: &[u8], op: &Operation) -> bool {
        let text = shown_text(src, op).to_lowercase();
        self.denylist.iter().any(|needle| text.contains(needle.as_str()))
    }
}

fn is_watermark_tag(src: &[u8], op: &Operation) -> bool {
    op.operands
        .first()
        .and_then(|t| t.name(src))
        .is_some_and(|name| WATERMARK_TAGS.contains(&name))
}

fn is_text_show(op: &Operation) -> bool {
    matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"")
}

/// Text shown by a `Tj`, `TJ`, `'` or `"` operation; array pieces are joined
fn shown_text(src: &[u8], op: &Operation) -> String {
    let mut text = String::new();
    for token in &op.operands {
        if let Some(bytes) = token.string_value(src) {
            text.push_str(&decode_text_bytes(&bytes));
        }
    }
    text
}

/// UTF-16BE when the string carries a byte order mark, Latin-1 otherwise
fn decode_text_bytes(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xfe, 0xff]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Remove the shown text but keep any line movement the operator implies
fn neutralize_show(src: &[u8], op: &Operation) -> Edit {
    match op.operator.as_str() {
        "'" => Edit::replace(op.span(), "T*"),
        "\"" => {
            let spacing = match op.operands.as_slice() {
                [aw, ac, ..] if aw.kind == TokenKind::Number && ac.kind == TokenKind::Number => {
                    Some((aw.bytes(src), ac.bytes(src)))
                }
                _ => None,
            };
            match spacing {
                Some((aw, ac)) => {
                    let mut replacement = Vec::new();
                    replacement.extend_from_slice(aw);
                    replacement.extend_from_slice(b" Tw ");
                    replacement.extend_from_slice(ac);
                    replacement.extend_from_slice(b" Tc T*");
                    Edit::replace(op.span(), replacement)
                }
                None => Edit::replace(op.span(), "T*"),
            }
        }
        _ => Edit::delete(op.span()),
    }
}
