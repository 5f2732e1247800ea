//! Balanced region scanning and byte-level splicing
//!
//! Regions are found over the operation list produced by the lexer, so
//! keywords inside strings, comments or inline image data can never open
//! or close a region.

use crate::lexer::{is_regular, Operation};
use std::ops::Range;

/// A balanced `open ... close` region of a content stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Index of the opening operation
    pub open: usize,
    /// Index of the closing operation
    pub close: usize,
    /// Byte offset of the opening operation's first operand
    pub start: usize,
    /// Byte offset just past the closing operator
    pub end: usize,
}

impl Region {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Source text of the whole region
    pub fn body<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        &src[self.start..self.end]
    }

    /// Operations strictly between the opener and the closer
    pub fn inner<'o>(&self, ops: &'o [Operation]) -> &'o [Operation] {
        &ops[self.open + 1..self.close]
    }

    pub fn contains(&self, other: &Region) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Find every balanced region opened by one of `openers` and closed by
/// `closer`, ordered by start offset (outer regions before the regions
/// they contain).
///
/// Re-entering an opener increases the depth, so a region only ends at
/// its matching closer. Unterminated openers and stray closers produce
/// no region.
pub fn find_regions(ops: &[Operation], openers: &[&str], closer: &str) -> Vec<Region> {
    let mut stack: Vec<usize> = Vec::new();
    let mut regions = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        if openers.iter().any(|o| op.is(o)) {
            stack.push(index);
        } else if op.is(closer) {
            if let Some(open) = stack.pop() {
                regions.push(Region {
                    open,
                    close: index,
                    start: ops[open].start,
                    end: op.end,
                });
            }
        }
    }

    regions.sort_by_key(|r| (r.start, std::cmp::Reverse(r.end)));
    regions
}

/// Outermost regions only: drop any region contained in an earlier one
pub fn outermost(regions: &[Region]) -> Vec<Region> {
    let mut result: Vec<Region> = Vec::new();
    for region in regions {
        if result.last().is_some_and(|last| last.contains(region)) {
            continue;
        }
        result.push(*region);
    }
    result
}

/// A replacement of a byte range; an empty replacement deletes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: Vec<u8>,
}

impl Edit {
    pub fn delete(range: Range<usize>) -> Self {
        Self {
            range,
            replacement: Vec::new(),
        }
    }

    pub fn replace(range: Range<usize>, replacement: impl Into<Vec<u8>>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }
}

/// Sort edits by position and drop any edit overlapping an earlier one.
///
/// Outer regions sort before the regions they contain, so a nested edit is
/// always the one dropped.
pub fn disjoint_edits(mut edits: Vec<Edit>) -> Vec<Edit> {
    edits.sort_by_key(|e| (e.range.start, std::cmp::Reverse(e.range.end)));

    let mut kept: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if kept.last().is_some_and(|last| edit.range.start < last.range.end) {
            continue;
        }
        kept.push(edit);
    }
    kept
}

/// Apply edits to `src`.
///
/// Edits nested inside an earlier edit are dropped (the outer edit already
/// covers them). A space is inserted wherever splicing would otherwise fuse
/// two regular tokens into one.
pub fn apply_edits(src: &[u8], edits: Vec<Edit>) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut cursor = 0;

    for edit in disjoint_edits(edits) {
        out.extend_from_slice(&src[cursor..edit.range.start]);
        push_separated(&mut out, &edit.replacement);
        cursor = edit.range.end;
        if let Some(&next) = src.get(cursor) {
            if is_regular(next) && out.last().copied().is_some_and(is_regular) {
                out.push(b' ');
            }
        }
    }
    out.extend_from_slice(&src[cursor..]);
    out
}

fn push_separated(out: &mut Vec<u8>, bytes: &[u8]) {
    if let (Some(&last), Some(&first)) = (out.last(), bytes.first()) {
        if is_regular(last) && is_regular(first) {
            out.push(b' ');
        }
    }
    out.extend_from_slice(bytes);
}

/// Several content streams read as one, separated by a newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub content: Vec<u8>,
    /// Where each input segment sits in `content`
    pub ranges: Vec<Range<usize>>,
}

pub fn join_segments<S: AsRef<[u8]>>(segments: &[S]) -> Joined {
    let mut content = Vec::new();
    let mut ranges = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            content.push(b'\n');
        }
        let start = content.len();
        content.extend_from_slice(segment.as_ref());
        ranges.push(start..content.len());
    }
    Joined { content, ranges }
}

/// Split edits over joined content into per-segment edits with local offsets.
///
/// An edit spanning a separator is cut at each segment boundary; its
/// replacement goes to the first segment it touches. Separators themselves
/// are never edited.
pub fn split_edits(edits: &[Edit], ranges: &[Range<usize>]) -> Vec<Vec<Edit>> {
    let mut local: Vec<Vec<Edit>> = vec![Vec::new(); ranges.len()];

    for edit in edits {
        let mut replacement = Some(edit.replacement.clone());
        for (index, range) in ranges.iter().enumerate() {
            let start = edit.range.start.max(range.start);
            let end = edit.range.end.min(range.end);
            if start >= end {
                continue;
            }
            local[index].push(Edit::replace(
                start - range.start..end - range.start,
                replacement.take().unwrap_or_default(),
            ));
        }
    }
    local
}
