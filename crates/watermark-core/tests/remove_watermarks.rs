//! Document-level watermark removal tests
//!
//! Run with: cargo test -p watermark-core --test remove_watermarks -- --nocapture

mod common;

use common::{
    decoded_contents, fixture, init_tracing, media_boxes, raw_content, text, xobject_names,
    PdfBuilder,
};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use watermark_core::{
    remove_watermarks, remove_watermarks_with, FormXObjectPolicy, RemovalConfig, WatermarkError,
};

const BODY: &[u8] = b"BT /F1 12 Tf 72 720 Td (Quarterly results) Tj ET";
const ROTATED_TEXT: &[u8] =
    b"q 0.7071 0.7071 -0.7071 0.7071 150 250 cm BT /F1 48 Tf 0 0 Td (CONFIDENTIAL) Tj ET Q";

fn conservative() -> RemovalConfig {
    RemovalConfig::default().with_form_policy(FormXObjectPolicy::Conservative)
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.join(&b' ')
}

#[test]
fn test_rotated_watermark_removed_body_kept() {
    init_tracing();
    let mut builder = PdfBuilder::new();
    builder.add_page(&concat(&[BODY, ROTATED_TEXT]), &[]);
    let output = remove_watermarks(&builder.build()).unwrap();

    let page = text(&decoded_contents(&output)[0]);
    assert!(page.contains("(Quarterly results) Tj"));
    assert!(!page.contains("CONFIDENTIAL"));
}

#[test]
fn test_removal_is_idempotent() {
    let mut builder = PdfBuilder::new();
    let image = builder.add_image();
    for _ in 0..4 {
        builder.add_page(
            &concat(&[
                BODY,
                ROTATED_TEXT,
                b"/Artifact BMC BT (Page 1 of 4) Tj ET EMC",
                b"BT (Evaluation Only) Tj ET",
                b"q 100 0 0 100 0 0 cm /Logo Do Q",
            ]),
            &[("Logo", image)],
        );
    }

    let once = remove_watermarks(&builder.build()).unwrap();
    let twice = remove_watermarks_with(&once, &RemovalConfig::default()).unwrap();

    assert_eq!(decoded_contents(&twice.bytes), decoded_contents(&once));
    assert_eq!(twice.report.streams_rewritten, 0);
    assert_eq!(twice.report.xobjects_removed, 0);
}

#[test]
fn test_page_count_and_dimensions_preserved() {
    let mut builder = PdfBuilder::new();
    for _ in 0..5 {
        builder.add_page(&concat(&[BODY, ROTATED_TEXT]), &[]);
    }
    let input = builder.build();
    let output = remove_watermarks(&input).unwrap();

    assert_eq!(
        watermark_core::get_page_count(&output).unwrap(),
        watermark_core::get_page_count(&input).unwrap()
    );
    assert_eq!(media_boxes(&output), media_boxes(&input));
}

#[test]
fn test_axis_aligned_content_untouched() {
    let mut builder = PdfBuilder::new();
    let image = builder.add_image();
    let content = concat(&[
        b"q 1 0 0 1 50 50 cm BT /F1 10 Tf (Header) Tj ET Q",
        b"q 200 0 0 100 300 400 cm /Im0 Do Q",
        b"BT 1 0 0 1 72 600 Tm (Body text) Tj ET",
    ]);
    builder.add_page(&content, &[("Im0", image)]);
    builder.add_page(BODY, &[]);
    builder.add_page(BODY, &[]);
    let input = builder.build();

    let output = remove_watermarks_with(&input, &RemovalConfig::default()).unwrap();
    assert_eq!(output.report.operators_removed, 0);
    assert_eq!(decoded_contents(&output.bytes)[0], content);
    assert_eq!(xobject_names(&output.bytes, 1), vec!["Im0".to_string()]);
}

#[test]
fn test_untouched_stream_bytes_are_identical() {
    let mut builder = PdfBuilder::new();
    builder.add_page(&concat(&[BODY, ROTATED_TEXT]), &[]);
    builder.add_page(BODY, &[]);
    let input = builder.build();

    let output = remove_watermarks(&input).unwrap();
    assert_ne!(raw_content(&output, 1), raw_content(&input, 1));
    assert_eq!(raw_content(&output, 2), raw_content(&input, 2));
}

#[test]
fn test_form_shared_by_nine_of_ten_pages_stripped_everywhere() {
    let mut builder = PdfBuilder::new();
    let stamp = builder.add_form(b"BT /F1 60 Tf (DRAFT) Tj ET");
    for i in 0..10 {
        let xobjects = if i < 9 { vec![("Stamp", stamp)] } else { Vec::new() };
        builder.add_page(&concat(&[BODY, b"/Stamp Do"]), &xobjects);
    }
    let input = builder.build();

    let output = remove_watermarks_with(&input, &conservative()).unwrap();
    assert_eq!(output.report.xobjects_removed, 9);
    for page in 1..=10 {
        assert!(xobject_names(&output.bytes, page).is_empty());
    }
}

#[test]
fn test_rarely_used_form_survives_conservative_policy() {
    let mut builder = PdfBuilder::new();
    let chart = builder.add_form(b"0 0 m 100 100 l S");
    builder.add_page(&concat(&[BODY, b"/Chart Do"]), &[("Chart", chart)]);
    for _ in 0..4 {
        builder.add_page(BODY, &[]);
    }
    let input = builder.build();

    let output = remove_watermarks_with(&input, &conservative()).unwrap();
    assert_eq!(xobject_names(&output.bytes, 1), vec!["Chart".to_string()]);

    let aggressive = remove_watermarks_with(&input, &RemovalConfig::default()).unwrap();
    assert!(xobject_names(&aggressive.bytes, 1).is_empty());
}

#[test]
fn test_small_document_strips_any_xobject_use() {
    let mut builder = PdfBuilder::new();
    let image = builder.add_image();
    builder.add_page(&concat(&[BODY, b"q 50 0 0 50 0 0 cm /Im1 Do Q"]), &[("Im1", image)]);
    builder.add_page(BODY, &[]);
    let input = builder.build();

    let output = remove_watermarks_with(&input, &conservative()).unwrap();
    assert_eq!(output.report.xobjects_removed, 1);
    assert!(xobject_names(&output.bytes, 1).is_empty());
}

#[test]
fn test_denylist_removes_only_matching_text() {
    let mut builder = PdfBuilder::new();
    builder.add_page(
        b"BT /F1 8 Tf 20 20 Td (Licensed to JANE DOE) Tj ET BT /F1 12 Tf 72 720 Td (Invoice) Tj ET",
        &[],
    );
    let input = builder.build();
    let config = RemovalConfig::default().with_denylist(["Jane Doe"]);

    let output = remove_watermarks_with(&input, &config).unwrap();
    let page = text(&decoded_contents(&output.bytes)[0]);
    assert!(!page.contains("JANE DOE"));
    assert!(page.contains("(Invoice) Tj"));
    assert_eq!(output.report.operators_removed, 1);
}

#[test]
fn test_escaped_parenthesis_does_not_end_text_object() {
    let mut builder = PdfBuilder::new();
    builder.add_page(
        b"BT 0.7 0.7 -0.7 0.7 0 0 Tm (a \\) ET b) Tj ET BT 72 700 Td (kept) Tj ET",
        &[],
    );
    let output = remove_watermarks(&builder.build()).unwrap();
    let page = text(&decoded_contents(&output)[0]);
    assert!(!page.contains("ET b"));
    assert!(page.contains("(kept) Tj"));
}

#[test]
fn test_unterminated_group_left_alone() {
    let content: &[u8] = b"q 0.7 0.7 -0.7 0.7 0 0 cm BT (half) Tj ET";
    let mut builder = PdfBuilder::new();
    builder.add_page(content, &[]);
    let output = remove_watermarks(&builder.build()).unwrap();

    // The BT...ET has no skewed Tm of its own and the q never closes
    assert_eq!(decoded_contents(&output)[0], content.to_vec());
}

#[test]
fn test_marked_artifacts_removed() {
    let mut builder = PdfBuilder::new();
    builder.add_page(
        &concat(&[
            b"/Watermark <</Type /Pagination>> BDC BT (WM) Tj ET EMC",
            BODY,
            b"/Span <</ActualText (x)>> BDC BT (kept) Tj ET EMC",
        ]),
        &[],
    );
    let output = remove_watermarks(&builder.build()).unwrap();
    let page = text(&decoded_contents(&output)[0]);
    assert!(!page.contains("(WM)"));
    assert!(page.contains("(kept)"));
    assert!(page.contains("Quarterly results"));
}

#[test]
fn test_annotations_and_catalog_entries_removed() {
    let mut builder = PdfBuilder::new();
    let page_id = builder.add_page(BODY, &[]);
    let doc = builder.doc_mut();
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Watermark",
        "Rect" => vec![0.into(), 0.into(), 100.into(), 100.into()],
    });
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        page.set("Annots", vec![Object::Reference(annot_id)]);
    }
    let input = builder.build();

    // Catalog entries are added after the builder wrote the catalog
    let mut doc = Document::load_mem(&input).unwrap();
    let root_id = doc.trailer.get(b"Root").and_then(Object::as_reference).unwrap();
    if let Ok(catalog) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) {
        catalog.set("OCProperties", dictionary! { "OCGs" => Vec::<Object>::new() });
        catalog.set("AcroForm", dictionary! { "Fields" => Vec::<Object>::new() });
    }
    let mut input = Vec::new();
    doc.save_to(&mut input).unwrap();

    let output = remove_watermarks_with(&input, &RemovalConfig::default()).unwrap();
    assert_eq!(output.report.annotations_removed, 1);
    assert_eq!(output.report.catalog_entries_removed, 2);

    let cleaned = Document::load_mem(&output.bytes).unwrap();
    let page = cleaned.get_dictionary(cleaned.get_pages()[&1]).unwrap();
    assert!(page.get(b"Annots").is_err());
    let root_id = cleaned.trailer.get(b"Root").and_then(Object::as_reference).unwrap();
    let catalog = cleaned.get_dictionary(root_id).unwrap();
    assert!(catalog.get(b"OCProperties").is_err());
    assert!(catalog.get(b"AcroForm").is_err());
}

#[test]
fn test_corrupt_stream_does_not_fail_document() {
    init_tracing();
    let mut builder = PdfBuilder::new();
    builder.add_page_with_stream(
        Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            b"this is not zlib data".to_vec(),
        ),
        &[],
    );
    builder.add_page(&concat(&[BODY, ROTATED_TEXT]), &[]);
    builder.add_page(&concat(&[BODY, ROTATED_TEXT]), &[]);
    let input = builder.build();

    let output = remove_watermarks_with(&input, &RemovalConfig::default()).unwrap();
    assert_eq!(output.report.streams_skipped, 1);
    assert_eq!(output.report.streams_rewritten, 2);
    assert_eq!(raw_content(&output.bytes, 1), b"this is not zlib data".to_vec());
    for page in &decoded_contents(&output.bytes)[1..] {
        assert!(!text(page).contains("CONFIDENTIAL"));
    }
}

#[test]
fn test_unsupported_filter_left_untouched() {
    let mut builder = PdfBuilder::new();
    let encoded = b"<this is opaque LZW data>".to_vec();
    builder.add_page_with_stream(
        Stream::new(dictionary! { "Filter" => "LZWDecode" }, encoded.clone()),
        &[],
    );
    let output = remove_watermarks_with(&builder.build(), &RemovalConfig::default()).unwrap();
    assert_eq!(output.report.streams_skipped, 1);
    assert_eq!(raw_content(&output.bytes, 1), encoded);
}

#[test]
fn test_non_pdf_input_is_fatal() {
    assert!(matches!(
        remove_watermarks(b"PK\x03\x04 this is a zip file"),
        Err(WatermarkError::ParseError(_))
    ));
    assert!(matches!(
        remove_watermarks(b""),
        Err(WatermarkError::ParseError(_))
    ));
}

#[test]
fn test_document_without_watermarks_reports_clean() {
    let mut builder = PdfBuilder::new();
    builder.add_page(BODY, &[]);
    builder.add_page(BODY, &[]);
    builder.add_page(BODY, &[]);
    let output = remove_watermarks_with(&builder.build(), &RemovalConfig::default()).unwrap();
    assert!(output.report.is_clean());
    assert_eq!(output.report.pages, 3);
}

#[test]
fn test_watermark_split_across_content_streams_removed() {
    let mut builder = PdfBuilder::new();
    builder.add_page_with_streams(
        vec![
            Stream::new(
                dictionary! {},
                b"BT (Body) Tj ET q 0.7 0.7 -0.7 0.7 100 200 cm".to_vec(),
            ),
            Stream::new(
                dictionary! {},
                b"BT /F1 40 Tf (CONFIDENTIAL) Tj ET Q".to_vec(),
            ),
        ],
        &[],
    );
    let output = remove_watermarks_with(&builder.build(), &RemovalConfig::default()).unwrap();

    assert_eq!(output.report.operators_removed, 1);
    let page = text(&decoded_contents(&output.bytes)[0]);
    assert!(!page.contains("CONFIDENTIAL"));
    assert!(page.contains("(Body) Tj"));
}

#[test]
fn test_empty_password_encrypted_pdf_is_cleaned_and_decrypted() {
    let input = fixture("encrypted_empty_password.pdf");
    assert!(Document::load_mem(&input).unwrap().is_encrypted());

    let output = remove_watermarks_with(&input, &RemovalConfig::default()).unwrap();
    assert_eq!(output.report.operators_removed, 1);

    let cleaned = Document::load_mem(&output.bytes).unwrap();
    assert!(!cleaned.is_encrypted());
    assert!(cleaned.trailer.get(b"Encrypt").is_err());

    let page = text(&decoded_contents(&output.bytes)[0]);
    assert!(page.contains("(Body text) Tj"));
    assert!(!page.contains("CONFIDENTIAL"));
}

#[test]
fn test_user_password_encrypted_pdf_is_fatal() {
    let input = fixture("encrypted_user_password.pdf");
    assert!(matches!(
        remove_watermarks(&input),
        Err(WatermarkError::Encrypted(_))
    ));
}
