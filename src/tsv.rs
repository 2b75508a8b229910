//! Tab-separated tables.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::Result;

pub(crate) fn writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?)
}

pub(crate) fn stream_writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(inner)
}

pub(crate) fn reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?)
}
