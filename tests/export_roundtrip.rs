//! End-to-end exporter behavior: the chunk loop drives the workbook
//! writer until an empty chunk, and the resulting byte stream is a
//! readable xlsx archive with exactly one data row per record.

use std::io::{Cursor, Read, Write};

use chrono::NaiveDate;
use protrack::export::stream_tasks;
use protrack::models::{ExportRecord, TaskCategory, TaskPriority, TaskStatus};

fn record(id: i32) -> ExportRecord {
    ExportRecord {
        id,
        title: format!("Task {id}"),
        issue_link: None,
        project_name: Some("Platform".into()),
        assigned_to_name: Some("Dana".into()),
        status: TaskStatus::Developing,
        priority: TaskPriority::Medium,
        category: TaskCategory::Op,
        start_date: NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0),
        end_date: NaiveDate::from_ymd_opt(2024, 4, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0),
        contribution_score: Some(1.25),
        created_at: NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0),
    }
}

/// Serve `records` in chunks of `chunk_size`, mimicking the store's
/// offset-based chunk fetch.
fn chunked_fetch(
    records: Vec<ExportRecord>,
    chunk_size: usize,
) -> impl FnMut(i64) -> std::future::Ready<protrack::Result<Vec<ExportRecord>>> {
    move |offset| {
        let start = (offset as usize).min(records.len());
        let end = (start + chunk_size).min(records.len());
        std::future::ready(Ok(records[start..end].to_vec()))
    }
}

fn sheet_xml(buf: Vec<u8>) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(buf)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

#[tokio::test]
async fn every_record_becomes_exactly_one_row_across_chunk_boundaries() {
    // 25 records over chunk size 10 exercises a partial final chunk.
    let records: Vec<ExportRecord> = (1..=25).map(record).collect();

    let mut buf = Vec::new();
    let rows = stream_tasks(&mut buf, chunked_fetch(records, 10))
        .await
        .unwrap();
    assert_eq!(rows, 25);

    let xml = sheet_xml(buf);
    // Header plus 25 data rows, no drops or duplicates.
    assert_eq!(xml.matches("<row r=\"").count(), 26);
    for id in 1..=25 {
        assert_eq!(
            xml.matches(&format!("<is><t>Task {id}</t></is>")).count(),
            1,
            "row for task {id}"
        );
    }
}

#[tokio::test]
async fn empty_result_set_still_yields_a_valid_workbook() {
    let mut buf = Vec::new();
    let rows = stream_tasks(&mut buf, chunked_fetch(Vec::new(), 10))
        .await
        .unwrap();
    assert_eq!(rows, 0);

    let xml = sheet_xml(buf);
    assert_eq!(xml.matches("<row r=\"").count(), 1); // header only
    assert!(xml.contains("<is><t>Contribution Score</t></is>"));
}

struct FailingWriter {
    written: usize,
    limit: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if self.written + data.len() > self.limit {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client disconnected",
            ));
        }
        self.written += data.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn a_dead_output_stream_stops_further_chunk_fetches() {
    let records: Vec<ExportRecord> = (1..=1000).map(record).collect();

    let mut fetches = 0u32;
    let mut inner = chunked_fetch(records, 10);
    let result = stream_tasks(
        FailingWriter {
            written: 0,
            limit: 16384,
        },
        |offset| {
            fetches += 1;
            inner(offset)
        },
    )
    .await;

    assert!(matches!(result, Err(protrack::Error::Stream(_))));
    // The writer died after roughly one chunk's worth of bytes; the
    // loop must not have walked all 100 chunks for a dead client.
    assert!(fetches < 10, "kept fetching after stream failure: {fetches}");
}
