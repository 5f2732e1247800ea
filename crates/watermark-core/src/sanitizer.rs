//! Document-level watermark sanitizing
//!
//! Works on a loaded lopdf [`Document`]. Pages, resources and streams are
//! addressed by [`ObjectId`] only; sharing between pages is detected by
//! comparing ids, never by object identity.
//!
//! Per page, in order:
//! 1. drop annotations, structure-parent linkage and piece info
//! 2. drop the `/Properties` resource dictionary
//! 3. drop XObject names that point at repeating stamps
//! 4. rewrite the page's content streams, read as one continuous stream
//!
//! Then, once per document: drop optional content, permissions and the
//! interactive form from the catalog.

use crate::codec::{decode_stream, encode_stream, rewrite_stream};
use crate::config::{FormXObjectPolicy, RemovalConfig};
use crate::error::StreamError;
use crate::report::RemovalReport;
use crate::rewriter::StreamRewriter;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Page keys that can carry overlay content outside the content stream
const PAGE_OVERLAY_KEYS: &[&[u8]] = &[b"Annots", b"StructParents", b"PieceInfo"];

/// Catalog keys that can hide, re-inject or protect watermark content
const CATALOG_KEYS: &[&[u8]] = &[b"OCProperties", b"Perms", b"AcroForm"];

/// Guard against cyclic `/Parent` chains
const MAX_TREE_DEPTH: usize = 64;

/// Streams handled so far; a stream shared by several pages counts once
#[derive(Debug, Default)]
struct StreamLedger {
    seen: BTreeSet<ObjectId>,
    rewritten: BTreeSet<ObjectId>,
    skipped: BTreeSet<ObjectId>,
    operators_removed: usize,
}

impl StreamLedger {
    fn skip(&mut self, id: ObjectId, error: &StreamError) {
        self.seen.insert(id);
        if self.skipped.insert(id) {
            warn!(object = ?id, error = %error, "leaving stream unmodified");
        }
    }
}

/// Where a page's effective `/Resources` dictionary lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceSlot {
    /// Inline in the page (or an ancestor page-tree node) with this id
    Inline(ObjectId),
    /// A separate dictionary object
    Indirect(ObjectId),
}

/// Strip watermark content from every page of `doc`.
///
/// Never fails: streams that cannot be decoded are logged, counted and
/// left as they were.
pub fn sanitize_document(doc: &mut Document, config: &RemovalConfig) -> RemovalReport {
    let rewriter = StreamRewriter::new(config);
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let mut report = RemovalReport {
        pages: pages.len(),
        ..RemovalReport::default()
    };

    let stamps = find_stamp_xobjects(doc, &pages, config);
    debug!(stamps = stamps.len(), "classified XObjects");

    let mut ledger = StreamLedger::default();

    for &page_id in &pages {
        report.annotations_removed += strip_page_overlays(doc, page_id);

        if let Some(slot) = resource_slot(doc, page_id) {
            if remove_properties(doc, slot) {
                report.property_lists_removed += 1;
            }
            report.xobjects_removed += remove_xobjects(doc, slot, &stamps);
        }

        let content_ids = content_stream_ids(doc, page_id);
        // Every stream already handled through another page
        if content_ids.iter().all(|id| ledger.seen.contains(id)) {
            continue;
        }
        rewrite_page_contents(doc, &content_ids, &rewriter, &mut ledger);
    }

    if config.clean_form_xobjects {
        for form_id in surviving_forms(doc, &pages) {
            if !ledger.seen.contains(&form_id) {
                rewrite_object(doc, form_id, &rewriter, &mut ledger);
            }
        }
    }

    report.streams_rewritten = ledger.rewritten.len();
    report.streams_skipped = ledger.skipped.len();
    report.operators_removed = ledger.operators_removed;

    report.catalog_entries_removed = strip_catalog(doc);

    if config.prune_unreferenced {
        report.objects_pruned = doc.prune_objects().len();
    }

    report
}

/// Whether an XObject used on `count` of `page_count` pages is a repeating stamp
pub fn is_shared(count: usize, page_count: usize, config: &RemovalConfig) -> bool {
    if page_count == 0 {
        return false;
    }
    // The ratio says little about one- or two-page documents
    if page_count <= config.small_document_pages {
        return count >= 1;
    }
    count as f64 / page_count as f64 >= config.share_ratio
}

/// XObjects to strip from every page: shared stamps, plus all forms under
/// the aggressive policy
fn find_stamp_xobjects(
    doc: &Document,
    pages: &[ObjectId],
    config: &RemovalConfig,
) -> BTreeSet<ObjectId> {
    let mut usage: BTreeMap<ObjectId, usize> = BTreeMap::new();
    for &page_id in pages {
        let Some(slot) = resource_slot(doc, page_id) else {
            continue;
        };
        let ids: BTreeSet<ObjectId> = xobject_entries(doc, slot)
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        for id in ids {
            *usage.entry(id).or_default() += 1;
        }
    }

    usage
        .into_iter()
        .filter(|&(id, count)| {
            is_shared(count, pages.len(), config)
                || (config.form_policy == FormXObjectPolicy::Aggressive && is_form(doc, id))
        })
        .map(|(id, _)| id)
        .collect()
}

fn is_form(doc: &Document, id: ObjectId) -> bool {
    match doc.get_object(id) {
        Ok(Object::Stream(stream)) => {
            matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form")
        }
        _ => false,
    }
}

/// Form XObjects still referenced from page resources
fn surviving_forms(doc: &Document, pages: &[ObjectId]) -> BTreeSet<ObjectId> {
    pages
        .iter()
        .filter_map(|&page_id| resource_slot(doc, page_id))
        .flat_map(|slot| xobject_entries(doc, slot))
        .map(|(_, id)| id)
        .filter(|&id| is_form(doc, id))
        .collect()
}

/// Locate the page's effective resources, following `/Parent` inheritance
fn resource_slot(doc: &Document, page_id: ObjectId) -> Option<ResourceSlot> {
    let mut node = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(node).ok()?;
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(_)) => return Some(ResourceSlot::Inline(node)),
            Ok(Object::Reference(id)) => return Some(ResourceSlot::Indirect(*id)),
            _ => {}
        }
        node = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn resources(doc: &Document, slot: ResourceSlot) -> Option<&Dictionary> {
    match slot {
        ResourceSlot::Inline(node) => doc
            .get_dictionary(node)
            .ok()?
            .get(b"Resources")
            .and_then(Object::as_dict)
            .ok(),
        ResourceSlot::Indirect(id) => doc.get_dictionary(id).ok(),
    }
}

fn resources_mut(doc: &mut Document, slot: ResourceSlot) -> Option<&mut Dictionary> {
    match slot {
        ResourceSlot::Inline(node) => doc
            .get_object_mut(node)
            .and_then(Object::as_dict_mut)
            .ok()?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .ok(),
        ResourceSlot::Indirect(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
    }
}

/// Named XObjects of a resource dictionary that are indirect references
fn xobject_entries(doc: &Document, slot: ResourceSlot) -> Vec<(Vec<u8>, ObjectId)> {
    let Some(res) = resources(doc, slot) else {
        return Vec::new();
    };
    let dict = match res.get(b"XObject") {
        Ok(Object::Dictionary(d)) => d,
        Ok(Object::Reference(id)) => match doc.get_dictionary(*id) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    dict.iter()
        .filter_map(|(name, value)| value.as_reference().ok().map(|id| (name.clone(), id)))
        .collect()
}

fn xobject_dict_mut(doc: &mut Document, slot: ResourceSlot) -> Option<&mut Dictionary> {
    let indirect = match resources(doc, slot)?.get(b"XObject").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    match indirect {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
        None => resources_mut(doc, slot)?
            .get_mut(b"XObject")
            .and_then(Object::as_dict_mut)
            .ok(),
    }
}

/// Remove names pointing at stamps; returns how many names were removed
fn remove_xobjects(doc: &mut Document, slot: ResourceSlot, stamps: &BTreeSet<ObjectId>) -> usize {
    let doomed: Vec<Vec<u8>> = xobject_entries(doc, slot)
        .into_iter()
        .filter(|(_, id)| stamps.contains(id))
        .map(|(name, _)| name)
        .collect();
    if doomed.is_empty() {
        return 0;
    }

    let Some(xobjects) = xobject_dict_mut(doc, slot) else {
        return 0;
    };
    let mut removed = 0;
    for name in &doomed {
        if xobjects.remove(name).is_some() {
            debug!(name = %String::from_utf8_lossy(name), "removed stamp XObject");
            removed += 1;
        }
    }
    removed
}

fn remove_properties(doc: &mut Document, slot: ResourceSlot) -> bool {
    resources_mut(doc, slot).is_some_and(|res| res.remove(b"Properties").is_some())
}

/// Drop overlay keys from a page; returns the number of annotations dropped
fn strip_page_overlays(doc: &mut Document, page_id: ObjectId) -> usize {
    let annotations = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"Annots"))
        .map(|annots| array_len(doc, annots))
        .unwrap_or(0);

    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for key in PAGE_OVERLAY_KEYS {
            page.remove(key);
        }
    }
    annotations
}

fn array_len(doc: &Document, object: &Object) -> usize {
    match object {
        Object::Array(items) => items.len(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.len(),
            _ => 0,
        },
        _ => 0,
    }
}

/// Content stream ids of a page in declared order.
///
/// `/Contents` may be a stream reference, an array of references, or a
/// reference to such an array.
fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(contents) = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"Contents"))
    else {
        return Vec::new();
    };

    let references = |items: &[Object]| -> Vec<ObjectId> {
        items
            .iter()
            .filter_map(|item| item.as_reference().ok())
            .collect()
    };

    match contents {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => references(items),
            _ => vec![*id],
        },
        Object::Array(items) => references(items),
        _ => Vec::new(),
    }
}

/// Rewrite a page's content streams as one continuous stream.
///
/// A stream that cannot be decoded is left as-is and splits the page into
/// runs that are rewritten separately, so no region is matched across it.
fn rewrite_page_contents(
    doc: &mut Document,
    content_ids: &[ObjectId],
    rewriter: &StreamRewriter,
    ledger: &mut StreamLedger,
) {
    let mut run: Vec<(ObjectId, Vec<u8>)> = Vec::new();
    for &id in content_ids {
        let decoded = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => decode_stream(stream),
            _ => Err(StreamError::NotAStream(id)),
        };
        match decoded {
            Ok(bytes) => run.push((id, bytes)),
            Err(e) => {
                ledger.skip(id, &e);
                rewrite_run(doc, std::mem::take(&mut run), rewriter, ledger);
            }
        }
    }
    rewrite_run(doc, run, rewriter, ledger);
}

fn rewrite_run(
    doc: &mut Document,
    run: Vec<(ObjectId, Vec<u8>)>,
    rewriter: &StreamRewriter,
    ledger: &mut StreamLedger,
) {
    if run.is_empty() {
        return;
    }

    let segments: Vec<&[u8]> = run.iter().map(|(_, bytes)| bytes.as_slice()).collect();
    let result = rewriter.rewrite_segments(&segments);
    ledger.operators_removed += result.removed;

    for (((id, _), content), changed) in run.iter().zip(result.segments).zip(result.changed) {
        ledger.seen.insert(*id);
        if !changed {
            continue;
        }
        let encoded = match doc.get_object_mut(*id) {
            Ok(Object::Stream(stream)) => encode_stream(stream, &content),
            _ => Err(StreamError::NotAStream(*id)),
        };
        match encoded {
            Ok(()) => {
                debug!(object = ?id, "rewrote content stream");
                ledger.rewritten.insert(*id);
            }
            Err(e) => ledger.skip(*id, &e),
        }
    }
}

/// Rewrite a single stream such as a form XObject
fn rewrite_object(
    doc: &mut Document,
    id: ObjectId,
    rewriter: &StreamRewriter,
    ledger: &mut StreamLedger,
) {
    let result = match doc.get_object_mut(id) {
        Ok(Object::Stream(stream)) => rewrite_stream(stream, rewriter),
        _ => Err(StreamError::NotAStream(id)),
    };

    match result {
        Ok(removed) => {
            ledger.seen.insert(id);
            if removed > 0 {
                debug!(object = ?id, removed, "rewrote form XObject");
                ledger.rewritten.insert(id);
                ledger.operators_removed += removed;
            }
        }
        Err(e) => ledger.skip(id, &e),
    }
}

/// Remove watermark-related catalog entries; returns how many were present
fn strip_catalog(doc: &mut Document) -> usize {
    let Ok(root_id) = doc.trailer.get(b"Root").and_then(Object::as_reference) else {
        return 0;
    };
    let Ok(catalog) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) else {
        return 0;
    };

    let mut removed = 0;
    for key in CATALOG_KEYS {
        if catalog.remove(key).is_some() {
            removed += 1;
        }
    }
    removed
}
