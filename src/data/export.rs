use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::{RawTable, RawValue};

/// Write a header row and data rows as comma-delimited UTF-8.
pub fn write_csv<W, I, R>(writer: W, headers: &[String], rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(headers).context("writing CSV header")?;
    for row in rows {
        wtr.write_record(row).context("writing CSV row")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

pub fn to_csv_bytes<I, R>(headers: &[String], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut buf = Vec::new();
    write_csv(&mut buf, headers, rows)?;
    Ok(buf)
}

/// Export a loaded table (e.g. the reference population) unchanged.
/// Null cells are written as empty fields.
pub fn raw_table_to_csv(table: &RawTable) -> Result<Vec<u8>> {
    let rows = table.rows.iter().map(|row| {
        row.iter()
            .map(|v| match v {
                RawValue::Null => String::new(),
                RawValue::Float(f) if f.is_nan() => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
    });
    to_csv_bytes(&table.columns, rows)
}

pub fn save_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_table_export_quotes_and_nulls() {
        let mut table = RawTable::new(vec!["YearOfAttendance".into(), "Country".into(), "ReferencePopulation".into()]);
        table.rows = vec![
            vec![RawValue::Integer(2020), RawValue::Text("Bosnia, Herzegovina".into()), RawValue::Integer(50000)],
            vec![RawValue::Integer(2021), RawValue::Null, RawValue::Float(1.5)],
        ];

        let csv = String::from_utf8(raw_table_to_csv(&table).unwrap()).unwrap();
        assert_eq!(
            csv,
            "YearOfAttendance,Country,ReferencePopulation\n\
             2020,\"Bosnia, Herzegovina\",50000\n\
             2021,,1.5\n"
        );
    }

    #[test]
    fn test_save_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.csv");
        save_bytes(&path, b"a,b\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }
}
