//! Stats CLI command.

use super::output_error;
use crate::Result;
use crate::models::DedupStats;
use crate::storage::DedupStore;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

/// Prints total and per-source record counts.
///
/// # Errors
///
/// Returns an error if the store query or output fails.
pub fn cmd_stats<S: DedupStore, W: Write>(
    store: &S,
    db_path: Option<&Path>,
    writer: &mut W,
) -> Result<DedupStats> {
    let stats = store.stats()?;
    write_stats(writer, &stats, db_path, Utc::now()).map_err(output_error)?;
    Ok(stats)
}

fn write_stats<W: Write>(
    writer: &mut W,
    stats: &DedupStats,
    db_path: Option<&Path>,
    generated_at: DateTime<Utc>,
) -> std::io::Result<()> {
    writeln!(writer, "Notiledger Dedup Store")?;
    writeln!(writer, "======================")?;
    if let Some(path) = db_path {
        writeln!(writer, "Database:  {}", path.display())?;
    }
    writeln!(
        writer,
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(writer, "Records:   {}", stats.total_records)?;

    if stats.sources.is_empty() {
        return Ok(());
    }
    writeln!(writer)?;
    let width = stats
        .sources
        .iter()
        .map(|s| s.source_app.len())
        .max()
        .unwrap_or(0);
    for source in &stats.sources {
        writeln!(
            writer,
            "  {:<width$}  {:>8}",
            source.source_app, source.record_count
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceStats;
    use chrono::TimeZone;

    #[test]
    fn test_write_stats_table() {
        let stats = DedupStats {
            total_records: 3,
            sources: vec![
                SourceStats {
                    source_app: "com.tencent.mm".to_string(),
                    record_count: 2,
                },
                SourceStats {
                    source_app: "wallet.app".to_string(),
                    record_count: 1,
                },
            ],
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut out = Vec::new();
        write_stats(&mut out, &stats, Some(Path::new("/data/dedup.db")), at).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Database:  /data/dedup.db"));
        assert!(text.contains("Generated: 2024-01-02 03:04:05 UTC"));
        assert!(text.contains("Records:   3"));
        assert!(text.contains("  com.tencent.mm         2"));
        assert!(text.contains("  wallet.app             1"));
    }

    #[test]
    fn test_cmd_stats_empty_store() {
        let store = crate::storage::SqliteDedupStore::in_memory().unwrap();
        let mut out = Vec::new();
        let stats = cmd_stats(&store, None, &mut out).unwrap();
        assert_eq!(stats.total_records, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Records:   0\n"));
        assert!(!text.contains("Database:"));
    }
}
