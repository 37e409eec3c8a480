//! Minimal streaming ZIP writer.
//!
//! An xlsx file is a ZIP container, and the export contract is to stream
//! it to a non-seekable output (an HTTP response body). Entries are
//! written with method 0 (stored) and general-purpose bit 3, so sizes
//! and checksums travel in a data descriptor after the entry body and
//! nothing has to be known up front. The central directory is emitted at
//! finish. Entries and the archive are capped at 4 GiB (no ZIP64).

use std::io::Write;

use crate::error::{Error, Result};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_SIG: u32 = 0x0605_4b50;

// Streaming entries need a data descriptor (bit 3).
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const VERSION_NEEDED: u16 = 20;

// Fixed DOS timestamp (2024-01-01 00:00); exported workbooks carry no
// meaningful archive mtime.
const DOS_TIME: u16 = 0;
const DOS_DATE: u16 = ((2024 - 1980) << 9) | (1 << 5) | 1;

struct EntryRecord {
    name: String,
    crc: u32,
    size: u32,
    header_offset: u32,
}

struct OpenEntry {
    name: String,
    hasher: crc32fast::Hasher,
    size: u32,
    header_offset: u32,
}

/// Streaming ZIP archive writer over any `Write`.
pub struct ZipStreamWriter<W: Write> {
    out: W,
    offset: u32,
    entries: Vec<EntryRecord>,
    open: Option<OpenEntry>,
    finished: bool,
}

impl<W: Write> ZipStreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            offset: 0,
            entries: Vec::new(),
            open: None,
            finished: false,
        }
    }

    /// Begin a new entry, closing the previous one if still open.
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        if self.finished {
            return Err(Error::ExporterState("entry started after archive finish"));
        }
        self.close_entry()?;

        let header_offset = self.offset;
        let name_bytes = name.as_bytes();
        let mut header = Vec::with_capacity(30 + name_bytes.len());
        put_u32(&mut header, LOCAL_HEADER_SIG);
        put_u16(&mut header, VERSION_NEEDED);
        put_u16(&mut header, FLAG_DATA_DESCRIPTOR);
        put_u16(&mut header, 0); // method: stored
        put_u16(&mut header, DOS_TIME);
        put_u16(&mut header, DOS_DATE);
        put_u32(&mut header, 0); // crc, deferred to descriptor
        put_u32(&mut header, 0); // compressed size, deferred
        put_u32(&mut header, 0); // uncompressed size, deferred
        put_u16(&mut header, name_bytes.len() as u16);
        put_u16(&mut header, 0); // extra field length
        header.extend_from_slice(name_bytes);
        self.write_raw(&header)?;

        self.open = Some(OpenEntry {
            name: name.to_string(),
            hasher: crc32fast::Hasher::new(),
            size: 0,
            header_offset,
        });
        Ok(())
    }

    /// Append bytes to the open entry.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or(Error::ExporterState("write with no open entry"))?;
        open.hasher.update(data);
        open.size = open
            .size
            .checked_add(data.len() as u32)
            .ok_or(Error::ExporterState("entry exceeds 4 GiB"))?;
        self.out.write_all(data)?;
        self.offset = self
            .offset
            .checked_add(data.len() as u32)
            .ok_or(Error::ExporterState("archive exceeds 4 GiB"))?;
        Ok(())
    }

    /// Flush buffered bytes to the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Close the open entry, writing its data descriptor.
    pub fn close_entry(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let crc = open.hasher.finalize();

        let mut descriptor = Vec::with_capacity(16);
        put_u32(&mut descriptor, DATA_DESCRIPTOR_SIG);
        put_u32(&mut descriptor, crc);
        put_u32(&mut descriptor, open.size); // compressed == stored
        put_u32(&mut descriptor, open.size);
        self.write_raw(&descriptor)?;

        self.entries.push(EntryRecord {
            name: open.name,
            crc,
            size: open.size,
            header_offset: open.header_offset,
        });
        Ok(())
    }

    /// Write the central directory and end record, completing the
    /// archive. The byte stream is only valid once this returns Ok.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::ExporterState("archive finished twice"));
        }
        self.close_entry()?;

        let dir_offset = self.offset;
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            let name_bytes = entry.name.as_bytes();
            let mut header = Vec::with_capacity(46 + name_bytes.len());
            put_u32(&mut header, CENTRAL_HEADER_SIG);
            put_u16(&mut header, VERSION_NEEDED); // version made by
            put_u16(&mut header, VERSION_NEEDED);
            put_u16(&mut header, FLAG_DATA_DESCRIPTOR);
            put_u16(&mut header, 0); // method: stored
            put_u16(&mut header, DOS_TIME);
            put_u16(&mut header, DOS_DATE);
            put_u32(&mut header, entry.crc);
            put_u32(&mut header, entry.size);
            put_u32(&mut header, entry.size);
            put_u16(&mut header, name_bytes.len() as u16);
            put_u16(&mut header, 0); // extra field length
            put_u16(&mut header, 0); // comment length
            put_u16(&mut header, 0); // disk number
            put_u16(&mut header, 0); // internal attributes
            put_u32(&mut header, 0); // external attributes
            put_u32(&mut header, entry.header_offset);
            header.extend_from_slice(name_bytes);
            self.write_raw(&header)?;
        }
        let dir_size = self.offset - dir_offset;

        let mut end = Vec::with_capacity(22);
        put_u32(&mut end, END_OF_CENTRAL_SIG);
        put_u16(&mut end, 0); // this disk
        put_u16(&mut end, 0); // directory disk
        put_u16(&mut end, entries.len() as u16);
        put_u16(&mut end, entries.len() as u16);
        put_u32(&mut end, dir_size);
        put_u32(&mut end, dir_offset);
        put_u16(&mut end, 0); // comment length
        self.write_raw(&end)?;

        self.out.flush()?;
        self.finished = true;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)?;
        self.offset = self
            .offset
            .checked_add(data.len() as u32)
            .ok_or(Error::ExporterState("archive exceeds 4 GiB"))?;
        Ok(())
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn archive_reads_back_with_a_standard_reader() {
        let mut buf = Vec::new();
        let mut writer = ZipStreamWriter::new(&mut buf);
        writer.start_entry("hello.txt").unwrap();
        writer.write_data(b"hello ").unwrap();
        writer.write_data(b"world").unwrap();
        writer.start_entry("empty.txt").unwrap();
        writer.finish().unwrap();
        drop(writer);

        let mut archive = zip::ZipArchive::new(Cursor::new(buf)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive
            .by_name("hello.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello world");

        assert_eq!(archive.by_name("empty.txt").unwrap().size(), 0);
    }

    #[test]
    fn misuse_is_rejected() {
        let mut writer = ZipStreamWriter::new(Vec::new());
        assert!(matches!(
            writer.write_data(b"x"),
            Err(Error::ExporterState(_))
        ));

        writer.start_entry("a").unwrap();
        writer.finish().unwrap();
        assert!(matches!(writer.finish(), Err(Error::ExporterState(_))));
        assert!(matches!(
            writer.start_entry("b"),
            Err(Error::ExporterState(_))
        ));
    }
}
