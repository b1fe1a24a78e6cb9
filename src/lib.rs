pub mod aggregate;
pub mod cli;
pub mod coerce;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod export;
pub mod facets;
pub mod filter;
pub mod geo;
pub mod io_utils;
pub mod preview;
pub mod query;
pub mod schema;
pub mod session;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    aggregate::ChartSpec,
    cli::{Cli, Commands, FilterArgs, InputArgs},
    geo::{CachedGeocoder, LookupGeocoder},
    query::SortDirective,
    session::Session,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_studio", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Schema(args) => handle_schema(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Query(args) => handle_query(&args),
        Commands::Chart(args) => handle_chart(&args),
        Commands::Dashboard(args) => dashboard::execute(&args),
        Commands::Facets(args) => facets::execute(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::Map(args) => handle_map(&args),
    }
}

/// Loads the input into a fresh session and applies any command-line filters.
pub(crate) fn open_session(input: &InputArgs, filter: Option<&FilterArgs>) -> Result<Session> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    if let Some(delimiter) = input.delimiter {
        debug!(
            "Reading '{}' with delimiter '{}'",
            input.input.display(),
            printable_delimiter(delimiter)
        );
    }
    let records = io_utils::load_records(&input.input, input.delimiter, encoding)
        .with_context(|| format!("Loading dataset from {:?}", input.input))?;
    let mut session = Session::from_records(records, Some(input.input.display().to_string()));

    if let Some(filter) = filter {
        for condition in filter::parse_filters(&filter.filters)? {
            session
                .apply_condition(&condition)
                .with_context(|| format!("Applying filter on '{}'", condition.column))?;
        }
        if let Some(search) = &filter.search {
            session.set_search(search.clone());
        }
        debug!(
            "{} of {} row(s) remain after filtering",
            session.total_count(),
            session.records().len()
        );
    }
    Ok(session)
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let session = open_session(&args.input, None)?;
    let schema = session.schema();
    if args.json {
        println!("{}", serde_json::to_string_pretty(schema)?);
    } else {
        let headers = vec!["#".to_string(), "name".to_string(), "type".to_string()];
        let rows = schema
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                vec![
                    (idx + 1).to_string(),
                    column.name.clone(),
                    column.datatype.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }
    info!(
        "Inferred {} column(s) from {} row(s) of {:?}",
        schema.len(),
        session.records().len(),
        args.input.input
    );
    Ok(())
}

fn handle_query(args: &cli::QueryArgs) -> Result<()> {
    let mut session = open_session(&args.input, Some(&args.filter))?;
    session.set_page_size(args.page_size)?;
    if let Some(sort) = &args.sort {
        let directive = SortDirective::parse(sort)?;
        session.set_sort(&directive.column, directive.direction)?;
    }
    session.go_to_page(args.page);

    let columns = if args.columns.is_empty() {
        session.schema().headers()
    } else {
        for column in &args.columns {
            if session.schema().column(column).is_none() {
                return Err(anyhow!("Column '{column}' not found"));
            }
        }
        args.columns.clone()
    };

    let page = session.page();
    if args.json {
        let rows = page
            .rows
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| (column.clone(), data::cell(record, column).clone()))
                    .collect::<data::Record>()
            })
            .collect::<Vec<_>>();
        let body = serde_json::json!({
            "total_count": page.total_count,
            "page_count": page.page_count,
            "current_page": page.current_page,
            "page_size": page.page_size,
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", table::render_page(&page, &columns));
    }
    info!(
        "Matched {} of {} row(s) ({} active filter(s))",
        page.total_count,
        session.records().len(),
        session.filters().active_count()
    );
    Ok(())
}

fn handle_chart(args: &cli::ChartArgs) -> Result<()> {
    let mut session = open_session(&args.input, Some(&args.filter))?;
    let spec = ChartSpec::new(
        args.kind,
        args.x_field.clone(),
        args.y_field.clone(),
        args.aggregation,
    );
    let title = spec.title();
    let id = session.add_chart(spec)?;
    let series = session.chart_series(&id)?;
    if args.json {
        let body = serde_json::json!({
            "id": id,
            "type": args.kind,
            "title": title,
            "labels": series.labels,
            "values": series.values,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let headers = vec![args.x_field.clone(), args.aggregation.to_string()];
        table::print_table(&headers, &dashboard::series_rows(&series));
    }
    info!(
        "Chart '{}' has {} group(s) over {} filtered row(s)",
        title,
        series.len(),
        session.total_count()
    );
    Ok(())
}

fn handle_map(args: &cli::MapArgs) -> Result<()> {
    let mut session = open_session(&args.input, Some(&args.filter))?;
    if let Some(table_path) = &args.geocode_table {
        if args.address_columns.is_empty() {
            return Err(anyhow!("--geocode-table requires at least one --address column"));
        }
        let lookup = LookupGeocoder::from_path(table_path, None)
            .with_context(|| format!("Loading geocode table {table_path:?}"))?;
        let mut geocoder = CachedGeocoder::new(lookup);
        session.apply_geocoding(&args.address_columns, &mut geocoder)?;
        debug!("Geocoder cache answered {} repeated lookup(s)", geocoder.cache_hits());
    }

    let (markers, bounds) =
        session.markers(&args.lat_column, &args.lng_column, &args.label_columns)?;
    if args.json {
        let body = serde_json::json!({ "markers": markers, "bounds": bounds });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let headers = vec!["lat".to_string(), "lng".to_string(), "label".to_string()];
        let rows = markers
            .iter()
            .map(|m| vec![m.lat.to_string(), m.lng.to_string(), m.label.clone()])
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }
    info!(
        "Plotted {} marker(s) from {} filtered row(s)",
        markers.len(),
        session.total_count()
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
