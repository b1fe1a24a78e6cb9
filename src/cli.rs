use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    aggregate::{Aggregator, ChartKind},
    query::DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Explore tabular datasets from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer and print the column types of a dataset
    Schema(SchemaArgs),
    /// Preview the first few rows of a dataset in a formatted table
    Preview(PreviewArgs),
    /// Filter, search, sort and page through a dataset
    Query(QueryArgs),
    /// Aggregate filtered rows into a chart series
    Chart(ChartArgs),
    /// Evaluate every chart declared in a YAML dashboard file
    Dashboard(DashboardArgs),
    /// Summarize the value domain of each column for building filters
    Facets(FacetsArgs),
    /// Export the filtered rows as CSV
    Export(ExportArgs),
    /// Geocode addresses and list map markers for the filtered rows
    Map(MapArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input dataset (.csv, .tsv or .json; '-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Column filters such as `amount>=100`, `ordered_at<=2024-06-30` or `city=Paris`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Case-insensitive text that must appear in some field of the row
    #[arg(short = 's', long = "search")]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit the schema as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = crate::preview::DEFAULT_PREVIEW_ROWS)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Sort directive of the form `column[:asc|desc]`
    #[arg(long)]
    pub sort: Option<String>,
    /// 1-based page to display (clamped to the available pages)
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page
    #[arg(long = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    /// Restrict displayed columns to this comma-separated list
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Emit the page as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Chart type recorded with the series
    #[arg(long = "type", value_enum, default_value_t = ChartKind::Bar)]
    pub kind: ChartKind,
    /// Column whose values become the labels
    #[arg(short = 'x', long = "x")]
    pub x_field: String,
    /// Column aggregated for each label (defaults to the label column)
    #[arg(short = 'y', long = "y")]
    pub y_field: Option<String>,
    /// Aggregation applied to each group
    #[arg(long = "agg", value_enum, default_value_t = Aggregator::Count)]
    pub aggregation: Aggregator,
    /// Emit the series as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// YAML file listing chart definitions
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Emit all series as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FacetsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Restrict the summary to this comma-separated list of columns
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Maximum number of distinct values listed per categorical column (0 = all)
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to comma)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Lookup table of `address,latitude,longitude` used to geocode rows
    #[arg(long = "geocode-table")]
    pub geocode_table: Option<PathBuf>,
    /// Columns joined with ", " to form each row's address
    #[arg(long = "address", value_delimiter = ',')]
    pub address_columns: Vec<String>,
    /// Latitude column (defaults to the geocoded column)
    #[arg(long = "lat", default_value = crate::session::LATITUDE_COLUMN)]
    pub lat_column: String,
    /// Longitude column (defaults to the geocoded column)
    #[arg(long = "lng", default_value = crate::session::LONGITUDE_COLUMN)]
    pub lng_column: String,
    /// Columns shown in each marker's label
    #[arg(long = "label", value_delimiter = ',')]
    pub label_columns: Vec<String>,
    /// Emit markers and bounds as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_aliases_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn query_defaults_match_the_engine() {
        let cli = Cli::try_parse_from(["csv-studio", "query", "-i", "data.csv"]).unwrap();
        let Commands::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.page, 1);
        assert_eq!(args.page_size, DEFAULT_PAGE_SIZE);
        assert!(args.filter.filters.is_empty());
    }
}
