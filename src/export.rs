use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;

use crate::{
    cli::ExportArgs,
    data::{Record, display_value},
    io_utils,
    schema::Schema,
};

/// Writes a header row of schema column names followed by one row per record.
/// Every field is quoted and embedded quotes are doubled; absent cells are
/// written as empty fields. Returns the number of data rows written.
pub fn write_records<'a, W, I>(writer: &mut csv::Writer<W>, schema: &Schema, rows: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let headers = schema.headers();
    writer
        .write_record(&headers)
        .context("Writing CSV header")?;
    let mut written = 0usize;
    for row in rows {
        writer
            .write_record(headers.iter().map(|column| display_value(row, column)))
            .with_context(|| format!("Writing CSV row {}", written + 2))?;
        written += 1;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(written)
}

pub fn export_csv<'a, I>(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
    schema: &Schema,
    rows: I,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = io_utils::open_csv_writer(path, delimiter, encoding)?;
    write_records(&mut writer, schema, rows)
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let session = crate::open_session(&args.input, Some(&args.filter))?;
    let output_path = args.output.as_deref();
    let delimiter = io_utils::resolve_output_delimiter(
        output_path,
        args.output_delimiter,
        io_utils::DEFAULT_CSV_DELIMITER,
    );
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let written = export_csv(
        output_path,
        delimiter,
        encoding,
        session.schema(),
        session.filtered_rows(),
    )
    .with_context(|| format!("Exporting filtered rows from {:?}", args.input.input))?;
    info!(
        "Exported {} of {} row(s) to {}",
        written,
        session.records().len(),
        output_path.map_or_else(|| "stdout".to_string(), |p| format!("{p:?}"))
    );
    Ok(())
}
