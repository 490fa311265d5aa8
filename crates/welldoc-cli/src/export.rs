//! CSV and Parquet export of normalised tables.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

pub fn write_csv<W: Write>(batch: &RecordBatch, out: W) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().with_header(true).build(out);
    writer.write(batch).context("writing CSV")?;
    Ok(())
}

pub fn write_parquet(batch: &RecordBatch, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::*;

    fn casing() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Size", DataType::Utf8, true),
            Field::new("Depth", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("13 3/8"), Some("7")])),
                Arc::new(Float64Array::from(vec![Some(450.0), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut out = Vec::new();
        write_csv(&casing(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Size,Depth");
        assert!(lines[1].starts_with("13 3/8,450"));
        assert_eq!(lines[2], "7,");
    }

    #[test]
    fn parquet_reads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("casing.parquet");
        write_parquet(&casing(), &path).unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>().unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
        assert_eq!(batches[0].schema().field(0).name(), "Size");
    }
}
