//! Packaging of generated artifacts into a single zip archive.

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::model::OutputBundle;

/// Writes one deflate-compressed entry per artifact, in bundle order, and
/// returns the underlying writer.
pub fn write_archive<W: Write + Seek>(bundle: &OutputBundle, writer: W) -> Result<W> {
    let mut archive = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for artifact in bundle.artifacts() {
        debug!(name = %artifact.name, size = artifact.bytes.len(), "adding archive entry");
        archive.start_file(artifact.name.as_str(), options)?;
        archive.write_all(&artifact.bytes)?;
    }
    Ok(archive.finish()?)
}

/// Serialises the bundle into an in-memory archive.
pub fn archive_bytes(bundle: &OutputBundle) -> Result<Vec<u8>> {
    Ok(write_archive(bundle, Cursor::new(Vec::new()))?.into_inner())
}

/// Serialises the bundle into an archive file at `path`.
#[instrument(level = "info", skip_all, fields(output = %path.display(), entries = bundle.len()))]
pub fn write_archive_file(bundle: &OutputBundle, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_archive(bundle, file)?;
    Ok(())
}
