//! In-memory PDF fixtures for the integration tests

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use watermark_core::codec::{decode_stream, deflate};

/// Install a test-friendly subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Builds a small PDF page by page
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Form XObject with an uncompressed content stream
    pub fn add_form(&mut self, content: &[u8]) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
            },
            content.to_vec(),
        ))
    }

    /// 1x1 grey image XObject
    pub fn add_image(&mut self) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ))
    }

    /// Page with a flate-compressed content stream
    pub fn add_page(&mut self, content: &[u8], xobjects: &[(&str, ObjectId)]) -> ObjectId {
        let stream = Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            deflate(content).unwrap(),
        );
        self.add_page_with_stream(stream, xobjects)
    }

    pub fn add_page_with_stream(&mut self, stream: Stream, xobjects: &[(&str, ObjectId)]) -> ObjectId {
        self.add_page_with_streams(vec![stream], xobjects)
    }

    /// Page whose `/Contents` is an array when given more than one stream
    pub fn add_page_with_streams(
        &mut self,
        streams: Vec<Stream>,
        xobjects: &[(&str, ObjectId)],
    ) -> ObjectId {
        let mut content_refs: Vec<Object> = streams
            .into_iter()
            .map(|stream| Object::Reference(self.doc.add_object(stream)))
            .collect();
        let contents = if content_refs.len() == 1 {
            content_refs.remove(0)
        } else {
            Object::Array(content_refs)
        };

        let mut xobject_dict = lopdf::Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(*name, Object::Reference(*id));
        }
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => contents,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobject_dict,
            },
        });
        self.kids.push(Object::Reference(page_id));
        page_id
    }

    pub fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

fn page_content_streams(doc: &Document, page_number: u32) -> Vec<&Stream> {
    let page_id = doc.get_pages()[&page_number];
    doc.get_page_contents(page_id)
        .into_iter()
        .map(|id| match doc.get_object(id).unwrap() {
            Object::Stream(stream) => stream,
            other => panic!("content {:?} is not a stream: {:?}", id, other),
        })
        .collect()
}

/// Decoded content of every page, in page order
pub fn decoded_contents(bytes: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(bytes).unwrap();
    (1..=doc.get_pages().len() as u32)
        .map(|n| {
            page_content_streams(&doc, n)
                .into_iter()
                .flat_map(|s| decode_stream(s).unwrap_or_else(|_| s.content.clone()))
                .collect()
        })
        .collect()
}

/// Fixture bytes from `tests/fixtures`
pub fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}

/// Raw (still encoded) content bytes of one page
pub fn raw_content(bytes: &[u8], page_number: u32) -> Vec<u8> {
    let doc = Document::load_mem(bytes).unwrap();
    page_content_streams(&doc, page_number)
        .into_iter()
        .flat_map(|s| s.content.clone())
        .collect()
}

/// XObject names left in one page's resources
pub fn xobject_names(bytes: &[u8], page_number: u32) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page_number];
    let page = doc.get_dictionary(page_id).unwrap();
    let Ok(resources) = page.get(b"Resources").and_then(Object::as_dict) else {
        return Vec::new();
    };
    match resources.get(b"XObject") {
        Ok(Object::Dictionary(xobjects)) => xobjects
            .iter()
            .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn media_boxes(bytes: &[u8]) -> Vec<Object> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| doc.get_dictionary(id).unwrap().get(b"MediaBox").unwrap().clone())
        .collect()
}

pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
