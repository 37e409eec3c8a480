//! Streaming xlsx workbook writer.
//!
//! Writes the static workbook parts up front, then streams worksheet
//! rows one at a time into the archive, so peak memory is bounded by a
//! single row regardless of how many rows the export produces. Driven
//! as an explicit state machine: rows may only be written before
//! `finalize`, and `finalize` completes the stream exactly once.

use std::io::Write;

use chrono::NaiveDateTime;

use super::zip::ZipStreamWriter;
use crate::error::{Error, Result};
use crate::models::ExportRecord;

const SHEET_NAME: &str = "Tasks";

const COLUMNS: [(&str, u32); 12] = [
    ("ID", 10),
    ("Title", 30),
    ("Issue Link", 30),
    ("Project", 20),
    ("Assigned To", 20),
    ("Status", 15),
    ("Priority", 15),
    ("Category", 15),
    ("Start Date", 20),
    ("End Date", 20),
    ("Contribution Score", 20),
    ("Created At", 20),
];

const COLUMN_REFS: [&str; 12] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L"];

// Cell style indices into styles.xml cellXfs.
const STYLE_HEADER: u32 = 1;
const STYLE_SCORE: u32 = 2;

#[derive(Debug, PartialEq)]
enum State {
    Initialized,
    RowsInFlight,
    Finalized,
}

pub struct XlsxWriter<W: Write> {
    zip: ZipStreamWriter<W>,
    state: State,
    next_row: u32,
    rows_written: u64,
}

impl<W: Write> XlsxWriter<W> {
    /// Create the writer and emit the workbook skeleton plus the styled
    /// header row. The worksheet entry stays open for row streaming.
    pub fn new(out: W) -> Result<Self> {
        let mut zip = ZipStreamWriter::new(out);

        zip.start_entry("[Content_Types].xml")?;
        zip.write_data(CONTENT_TYPES.as_bytes())?;
        zip.start_entry("_rels/.rels")?;
        zip.write_data(ROOT_RELS.as_bytes())?;
        zip.start_entry("xl/workbook.xml")?;
        zip.write_data(workbook_xml().as_bytes())?;
        zip.start_entry("xl/_rels/workbook.xml.rels")?;
        zip.write_data(WORKBOOK_RELS.as_bytes())?;
        zip.start_entry("xl/styles.xml")?;
        zip.write_data(STYLES.as_bytes())?;

        zip.start_entry("xl/worksheets/sheet1.xml")?;
        zip.write_data(sheet_prefix().as_bytes())?;

        let mut writer = Self {
            zip,
            state: State::Initialized,
            next_row: 1,
            rows_written: 0,
        };
        writer.write_header_row()?;
        Ok(writer)
    }

    fn write_header_row(&mut self) -> Result<()> {
        let row = self.next_row;
        self.next_row += 1;

        let mut xml = format!("<row r=\"{row}\">");
        for (i, (header, _)) in COLUMNS.iter().enumerate() {
            push_inline_str(&mut xml, COLUMN_REFS[i], row, Some(STYLE_HEADER), header);
        }
        xml.push_str("</row>");
        self.zip.write_data(xml.as_bytes())
    }

    /// Append one task row. Dates render as locale date strings; the
    /// contribution score cell keeps its numeric 0.00 format.
    pub fn write_row(&mut self, record: &ExportRecord) -> Result<()> {
        if self.state == State::Finalized {
            return Err(Error::ExporterState("row written after finalize"));
        }
        self.state = State::RowsInFlight;

        let row = self.next_row;
        self.next_row += 1;

        let mut xml = format!("<row r=\"{row}\">");
        push_number(&mut xml, COLUMN_REFS[0], row, None, record.id as f64);
        push_inline_str(&mut xml, COLUMN_REFS[1], row, None, &record.title);
        push_inline_str(
            &mut xml,
            COLUMN_REFS[2],
            row,
            None,
            record.issue_link.as_deref().unwrap_or(""),
        );
        push_inline_str(
            &mut xml,
            COLUMN_REFS[3],
            row,
            None,
            record.project_name.as_deref().unwrap_or("Unknown Project"),
        );
        push_inline_str(
            &mut xml,
            COLUMN_REFS[4],
            row,
            None,
            record.assigned_to_name.as_deref().unwrap_or("Unassigned"),
        );
        push_inline_str(&mut xml, COLUMN_REFS[5], row, None, record.status.as_str());
        push_inline_str(&mut xml, COLUMN_REFS[6], row, None, record.priority.as_str());
        push_inline_str(&mut xml, COLUMN_REFS[7], row, None, record.category.as_str());
        push_inline_str(&mut xml, COLUMN_REFS[8], row, None, &date_string(record.start_date));
        push_inline_str(&mut xml, COLUMN_REFS[9], row, None, &date_string(record.end_date));
        push_number(
            &mut xml,
            COLUMN_REFS[10],
            row,
            Some(STYLE_SCORE),
            record.contribution_score.unwrap_or(0.0),
        );
        push_inline_str(&mut xml, COLUMN_REFS[11], row, None, &date_string(record.created_at));
        xml.push_str("</row>");

        self.zip.write_data(xml.as_bytes())?;
        self.rows_written += 1;
        Ok(())
    }

    /// Commit everything written so far to the underlying stream. Called
    /// after each chunk so chunk N is durable before chunk N+1 is
    /// fetched.
    pub fn flush(&mut self) -> Result<()> {
        self.zip.flush()
    }

    /// Close the worksheet and the archive. The output is only a valid
    /// workbook once this returns Ok.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == State::Finalized {
            return Err(Error::ExporterState("finalize called twice"));
        }
        self.zip.write_data(b"</sheetData></worksheet>")?;
        self.zip.finish()?;
        self.state = State::Finalized;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

fn date_string(d: Option<NaiveDateTime>) -> String {
    d.map(|d| d.format("%m/%d/%Y").to_string()).unwrap_or_default()
}

fn push_inline_str(xml: &mut String, col: &str, row: u32, style: Option<u32>, value: &str) {
    let style_attr = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    xml.push_str(&format!(
        "<c r=\"{col}{row}\"{style_attr} t=\"inlineStr\"><is><t>{}</t></is></c>",
        escape_xml(value)
    ));
}

fn push_number(xml: &mut String, col: &str, row: u32, style: Option<u32>, value: f64) {
    let style_attr = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    xml.push_str(&format!("<c r=\"{col}{row}\"{style_attr}><v>{value}</v></c>"));
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn sheet_prefix() -> String {
    let mut cols = String::from("<cols>");
    for (i, (_, width)) in COLUMNS.iter().enumerate() {
        let n = i + 1;
        cols.push_str(&format!(
            "<col min=\"{n}\" max=\"{n}\" width=\"{width}\" customWidth=\"1\"/>"
        ));
    }
    cols.push_str("</cols>");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
         {cols}<sheetData>"
    )
}

fn workbook_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{SHEET_NAME}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>"
    )
}

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
</Types>";

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\
</Relationships>";

// cellXfs: 0 = default, 1 = bold header, 2 = 0.00 number format.
const STYLES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<numFmts count=\"1\"><numFmt numFmtId=\"164\" formatCode=\"0.00\"/></numFmts>\
<fonts count=\"2\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill>\
<fill><patternFill patternType=\"gray125\"/></fill></fills>\
<borders count=\"1\"><border/></borders>\
<cellStyleXfs count=\"1\"><xf/></cellStyleXfs>\
<cellXfs count=\"3\"><xf/><xf fontId=\"1\" applyFont=\"1\"/>\
<xf numFmtId=\"164\" applyNumberFormat=\"1\"/></cellXfs>\
</styleSheet>";
