//! Gzip record sink
//!
//! Records are written one per line. `flush` performs a gzip sync flush, so
//! everything written before it can be decoded even if the process dies
//! before `finish` writes the trailer.

use crate::crawler::DiscoveredRecord;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only gzip sink for discovered records
pub struct RecordSink<W: Write> {
    encoder: GzEncoder<W>,
    records_written: u64,
}

impl RecordSink<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`
    ///
    /// The parent directory must already exist.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            encoder: GzEncoder::new(writer, Compression::default()),
            records_written: 0,
        }
    }

    /// Writes one record as a `\n`-terminated ASCII line
    pub fn write_record(&mut self, record: &DiscoveredRecord) -> io::Result<()> {
        let line = record.to_string();
        if !line.is_ascii() || line.contains('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record is not a single ASCII line: {:?}", line),
            ));
        }

        self.encoder.write_all(line.as_bytes())?;
        self.encoder.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    /// Sync-flushes the compressed stream down to the underlying writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Writes the gzip trailer and returns the underlying writer
    pub fn finish(self) -> io::Result<W> {
        let mut writer = self.encoder.finish()?;
        writer.flush()?;
        Ok(writer)
    }
}
