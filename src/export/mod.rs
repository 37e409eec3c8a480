//! Chunk-driven spreadsheet export.
//!
//! The exporter never materializes the full result set: it fetches
//! records in fixed-size chunks, writes and flushes each chunk's rows,
//! and only then asks for the next chunk. An empty chunk terminates the
//! loop; a failed write (for example a disconnected client) aborts
//! before any further fetch.

mod xlsx;
mod zip;

use std::future::Future;
use std::io::Write;

use crate::error::Result;
use crate::models::ExportRecord;

pub use xlsx::XlsxWriter;

/// Stream task records into an xlsx workbook on `out`.
///
/// `fetch` is called with a row offset and must return the next chunk of
/// records (at most the caller's chunk size); an empty chunk signals the
/// end of the result set. Returns the number of data rows written.
pub async fn stream_tasks<W, F, Fut>(out: W, mut fetch: F) -> Result<u64>
where
    W: Write,
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<Vec<ExportRecord>>>,
{
    let mut writer = XlsxWriter::new(out)?;
    let mut offset = 0i64;

    loop {
        let chunk = fetch(offset).await?;
        if chunk.is_empty() {
            break;
        }
        for record in &chunk {
            writer.write_row(record)?;
        }
        // Commit this chunk downstream before fetching the next one.
        writer.flush()?;
        offset += chunk.len() as i64;
        tracing::info!(processed = offset, "export chunk flushed");
    }

    writer.finalize()?;
    Ok(writer.rows_written())
}

/// Download filename derived from the active date-range filter, so
/// exports with different ranges do not collide by default.
pub fn export_filename(start_date: Option<&str>, end_date: Option<&str>) -> String {
    if start_date.is_none() && end_date.is_none() {
        return "tasks.xlsx".to_string();
    }
    let date_part = |raw: Option<&str>| {
        raw.and_then(|s| s.split('T').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("all")
            .to_string()
    };
    format!(
        "tasks_{}_to_{}.xlsx",
        date_part(start_date),
        date_part(end_date)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_reflects_the_active_range() {
        assert_eq!(export_filename(None, None), "tasks.xlsx");
        assert_eq!(
            export_filename(Some("2024-04-01"), Some("2024-04-30")),
            "tasks_2024-04-01_to_2024-04-30.xlsx"
        );
        assert_eq!(
            export_filename(None, Some("2024-04-30T00:00:00Z")),
            "tasks_all_to_2024-04-30.xlsx"
        );
        assert_eq!(
            export_filename(Some("2024-01-01"), None),
            "tasks_2024-01-01_to_all.xlsx"
        );
    }
}
