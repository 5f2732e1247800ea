//! Stream codec adapter
//!
//! Inflates a content stream for the rewriter and deflates the result.
//! Streams the rewriter leaves alone keep their original bytes and
//! dictionary exactly.

use crate::error::StreamError;
use crate::rewriter::StreamRewriter;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Object, Stream};
use std::io::{Read, Write};

/// How a stream's payload is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    /// No `/Filter`
    Raw,
    /// `/FlateDecode` without a predictor
    Flate,
}

/// Inspect `/Filter` and `/DecodeParms`.
///
/// Anything other than no filter or a single plain `/FlateDecode` is
/// unsupported; the caller leaves such streams untouched.
pub fn stream_encoding(dict: &Dictionary) -> Result<StreamEncoding, StreamError> {
    let filter = match dict.get(b"Filter") {
        Err(_) => return Ok(StreamEncoding::Raw),
        Ok(Object::Name(name)) => name.as_slice(),
        Ok(Object::Array(filters)) => match filters.as_slice() {
            [] => return Ok(StreamEncoding::Raw),
            [Object::Name(name)] => name.as_slice(),
            _ => {
                return Err(StreamError::UnsupportedFilter(format!(
                    "filter chain of {} entries",
                    filters.len()
                )))
            }
        },
        Ok(other) => {
            return Err(StreamError::UnsupportedFilter(format!(
                "filter object {:?}",
                other
            )))
        }
    };

    if filter != b"FlateDecode" && filter != b"Fl" {
        return Err(StreamError::UnsupportedFilter(
            String::from_utf8_lossy(filter).into_owned(),
        ));
    }

    if has_predictor(dict) {
        return Err(StreamError::UnsupportedFilter(
            "FlateDecode with predictor".to_string(),
        ));
    }

    Ok(StreamEncoding::Flate)
}

fn has_predictor(dict: &Dictionary) -> bool {
    let parms = match dict.get(b"DecodeParms") {
        Ok(Object::Dictionary(d)) => d,
        Ok(Object::Array(items)) => match items.first() {
            Some(Object::Dictionary(d)) => d,
            _ => return false,
        },
        _ => return false,
    };
    matches!(parms.get(b"Predictor"), Ok(Object::Integer(p)) if *p > 1)
}

/// Decoded content bytes of a stream
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>, StreamError> {
    match stream_encoding(&stream.dict)? {
        StreamEncoding::Raw => Ok(stream.content.clone()),
        StreamEncoding::Flate => inflate(&stream.content),
    }
}

pub fn inflate(data: &[u8]) -> Result<Vec<u8>, StreamError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(StreamError::Inflate)?;
    Ok(out)
}

pub fn deflate(data: &[u8]) -> Result<Vec<u8>, StreamError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(StreamError::Deflate)?;
    encoder.finish().map_err(StreamError::Deflate)
}

/// Replace a stream's payload with deflated `content`.
///
/// `/Filter` becomes `/FlateDecode` regardless of the previous encoding,
/// `/DecodeParms` is dropped and `/Length` matches the new payload.
pub fn encode_stream(stream: &mut Stream, content: &[u8]) -> Result<(), StreamError> {
    let compressed = deflate(content)?;
    let length = compressed.len() as i64;
    stream.dict.remove(b"DecodeParms");
    stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    stream.set_content(compressed);
    stream.dict.set("Length", Object::Integer(length));
    Ok(())
}

/// Decode, rewrite and re-encode a stream in place.
///
/// Returns the number of removals; zero means the stream was not touched.
pub fn rewrite_stream(stream: &mut Stream, rewriter: &StreamRewriter) -> Result<usize, StreamError> {
    let decoded = decode_stream(stream)?;
    let rewrite = rewriter.rewrite(&decoded);
    if !rewrite.changed {
        return Ok(0);
    }
    encode_stream(stream, &rewrite.content)?;
    Ok(rewrite.removed)
}
