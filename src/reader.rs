use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use lz4_flex::frame::FrameDecoder;

use crate::appender::COMPRESSED_EXTENSION;
use crate::error::Result;
use crate::record::{from_line, Codec, Record};

/// Reads the raw serialized lines of a durable log file.
///
/// Files with the `.lz4` extension are decompressed frame by frame; anything
/// else is read as plain newline-delimited text. Records come back in their
/// original append order.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let compressed = path
        .extension()
        .map(|ext| ext == COMPRESSED_EXTENSION)
        .unwrap_or(false);
    let text = if compressed {
        read_compressed(path)?
    } else {
        let mut text = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut text)?;
        text
    };
    Ok(text.lines().map(str::to_owned).collect())
}

/// Decodes every record in a durable log file, applying the codec's
/// `decode_object` hook.
pub fn read_records(path: &Path, codec: &dyn Codec) -> Result<Vec<Record>> {
    read_lines(path)?
        .iter()
        .map(|line| from_line(line, codec))
        .collect()
}

/// A file written through the compressed appender holds one complete LZ4
/// frame per flushed segment. Frames are self-delimiting, so decoding loops
/// until the underlying reader is exhausted.
fn read_compressed(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut text = String::new();
    loop {
        if reader.fill_buf()?.is_empty() {
            break;
        }
        let mut decoder = FrameDecoder::new(reader);
        decoder.read_to_string(&mut text)?;
        reader = decoder.into_inner();
    }
    Ok(text)
}
