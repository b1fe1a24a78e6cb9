use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, data::display_value, table};

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let session = crate::open_session(&args.input, None)?;
    let headers = session.schema().headers();
    let rows = session
        .records()
        .iter()
        .take(args.rows)
        .map(|record| {
            headers
                .iter()
                .map(|header| display_value(record, header))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    table::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        session.records().len(),
        args.input.input
    );
    Ok(())
}
