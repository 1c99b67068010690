//! Compressed part encoding: a zip archive with a single member `data`.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::BlobResult;

/// Name of the archive member holding the part payload.
pub const MEMBER_NAME: &str = "data";

/// Deflate `data` into a zip archive holding one member named `data`.
pub fn pack_member(data: &[u8]) -> BlobResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(MEMBER_NAME, options)?;
    writer.write_all(data)?;
    Ok(writer.finish()?.into_inner())
}

/// Extract the `data` member from a zip archive.
pub fn unpack_member(archive: &[u8]) -> BlobResult<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut member = zip.by_name(MEMBER_NAME)?;
    let mut out = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut out)?;
    Ok(out)
}
