mod common;

use chrono::NaiveDate;
use csv_studio::{
    aggregate::{Aggregator, ChartKind, ChartSpec},
    data::{Cell, display_value, record},
    error::StudioError,
    geo::{CachedGeocoder, GeoPoint, LookupGeocoder},
    io_utils,
    query::SortDirection,
    schema::ColumnType,
    session::{LATITUDE_COLUMN, LONGITUDE_COLUMN, Session},
};
use encoding_rs::UTF_8;

use common::{ORDERS_CSV, TestWorkspace, text_records};

fn orders_session() -> Session {
    let workspace = TestWorkspace::new();
    let path = workspace.write("orders.csv", ORDERS_CSV);
    let records = io_utils::load_records(&path, None, UTF_8).expect("load orders");
    Session::from_records(records, Some("orders.csv".into()))
}

fn column(session: &Session, name: &str) -> Vec<String> {
    session
        .page()
        .rows
        .iter()
        .map(|r| display_value(r, name))
        .collect()
}

#[test]
fn loading_csv_infers_every_column_type() {
    let session = orders_session();
    let schema = session.schema();
    assert_eq!(
        schema.headers(),
        vec!["id", "customer", "city", "amount", "paid", "ordered_at"]
    );
    assert_eq!(schema.column_type("id"), Some(ColumnType::Number));
    assert_eq!(schema.column_type("city"), Some(ColumnType::String));
    assert_eq!(schema.column_type("amount"), Some(ColumnType::Number));
    assert_eq!(schema.column_type("paid"), Some(ColumnType::Boolean));
    assert_eq!(schema.column_type("ordered_at"), Some(ColumnType::Date));
    assert_eq!(session.total_count(), 5);
}

#[test]
fn mixed_amount_column_is_string_and_homogeneous_is_number() {
    let mixed = Session::from_records(
        text_records(
            &["city", "amt"],
            &[&["A", "10"], &["B", "20"], &["A", "x"]],
        ),
        None,
    );
    assert_eq!(mixed.schema().column_type("amt"), Some(ColumnType::String));

    let numeric = Session::from_records(
        text_records(
            &["city", "amt"],
            &[&["A", "10"], &["B", "20"], &["C", "30"]],
        ),
        None,
    );
    assert_eq!(numeric.schema().column_type("amt"), Some(ColumnType::Number));
}

#[test]
fn sum_by_city_follows_first_seen_order() {
    let mut session = Session::from_records(
        text_records(&["city", "amt"], &[&["A", "10"], &["B", "20"]]),
        None,
    );
    let id = session
        .add_chart(ChartSpec::new(
            ChartKind::Bar,
            "city",
            Some("amt".into()),
            Aggregator::Sum,
        ))
        .unwrap();
    let series = session.chart_series(&id).unwrap();
    assert_eq!(series.labels, vec!["A", "B"]);
    assert_eq!(series.values, vec![10.0, 20.0]);
}

#[test]
fn invalid_dates_drop_out_only_when_the_filter_is_bounded() {
    let mut session = Session::from_records(
        text_records(&["date"], &[&["2024-02-01"], &["invalid"], &["2023-12-31"]]),
        None,
    );
    assert_eq!(session.schema().column_type("date"), Some(ColumnType::String));

    let mut dated = Session::from_records(
        vec![
            record([("date", "2024-02-01")]),
            record([("date", "2023-12-31")]),
        ],
        None,
    );
    dated
        .set_date_range("date", NaiveDate::from_ymd_opt(2024, 1, 1), None)
        .unwrap();
    assert_eq!(dated.total_count(), 1);

    let invalid = record([("date", "invalid")]);
    let state = dated.filters().get("date").unwrap();
    assert!(!state.matches(&invalid["date"]));

    dated.set_date_range("date", None, None).unwrap();
    assert!(dated.filters().get("date").unwrap().matches(&invalid["date"]));
    assert_eq!(dated.total_count(), 2);

    session.set_search("invalid");
    assert_eq!(session.total_count(), 1);
}

#[test]
fn filters_search_and_sort_combine() {
    let mut session = orders_session();
    session.set_range("amount", Some(10.0), None).unwrap();
    session.set_sort("amount", SortDirection::Desc).unwrap();
    assert_eq!(column(&session, "customer"), vec!["Dan", "Eve", "Alice", "Bob"]);

    session.select_categories("city", ["Paris", ""]).unwrap();
    assert_eq!(column(&session, "customer"), vec!["Eve", "Alice"]);

    session.set_search("ALI");
    assert_eq!(column(&session, "customer"), vec!["Alice"]);

    session.reset_filters();
    assert_eq!(session.total_count(), 5);
    assert_eq!(session.filters().search(), "");
}

#[test]
fn absent_dates_sort_last_but_empty_text_is_just_text() {
    let mut session = orders_session();
    session.set_sort("ordered_at", SortDirection::Desc).unwrap();
    // Eve's date is empty text, which sorts as the smallest string.
    assert_eq!(
        column(&session, "customer"),
        vec!["Dan", "Chloé", "Bob", "Alice", "Eve"]
    );

    let mut typed = Session::from_records(
        vec![
            record([("n", Cell::Absent)]),
            record([("n", Cell::Number(2.0))]),
            record([("n", Cell::Number(1.0))]),
        ],
        None,
    );
    typed.set_sort("n", SortDirection::Asc).unwrap();
    assert_eq!(column(&typed, "n"), vec!["1", "2", ""]);
    typed.set_sort("n", SortDirection::Desc).unwrap();
    assert_eq!(column(&typed, "n"), vec!["2", "1", ""]);
}

#[test]
fn paging_walks_the_filtered_set() {
    let mut session = orders_session();
    session.set_page_size(2).unwrap();
    assert_eq!(session.page_count(), 3);
    assert_eq!(column(&session, "id"), vec!["1", "2"]);
    assert!(session.next_page());
    assert!(session.next_page());
    assert!(!session.next_page());
    assert_eq!(column(&session, "id"), vec!["5"]);
    assert_eq!(session.page().describe(), "Showing 5 to 5 of 5 row(s) (page 3 of 3)");

    session.toggle_sort("id").unwrap();
    assert_eq!(session.pagination().current_page, 3);

    session.set_search("paris");
    assert_eq!(session.pagination().current_page, 1);
    assert_eq!(session.page_count(), 1);

    assert_eq!(session.set_page_size(0), Err(StudioError::InvalidPageSize));
}

#[test]
fn json_rows_load_with_native_types() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "rows.json",
        r#"[{"name": "a", "score": 3, "ok": true}, {"name": "b", "score": null, "ok": false}]"#,
    );
    let records = io_utils::load_records(&path, None, UTF_8).unwrap();
    let session = Session::from_records(records, None);
    assert_eq!(session.schema().column_type("score"), Some(ColumnType::Number));
    assert_eq!(session.schema().column_type("ok"), Some(ColumnType::Boolean));
    assert_eq!(session.records()[1]["score"], Cell::Absent);
}

#[test]
fn geocoding_appends_coordinates_and_filters() {
    let mut session = orders_session();
    let mut lookup = LookupGeocoder::new();
    lookup.insert("Paris, France", GeoPoint { lat: 48.85, lng: 2.35 });
    lookup.insert("Lyon, France", GeoPoint { lat: 45.76, lng: 4.84 });
    let mut geocoder = CachedGeocoder::new(lookup);

    session.set_search("paris");
    let records = session
        .records()
        .iter()
        .cloned()
        .map(|mut r| {
            r.insert("country".into(), Cell::from("France"));
            r
        })
        .collect();
    session.load(records, None);
    assert_eq!(session.total_count(), 5);

    let summary = session
        .apply_geocoding(&["city".to_string(), "country".to_string()], &mut geocoder)
        .unwrap();
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.missing, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(geocoder.cache_hits(), 1);

    assert_eq!(
        session.schema().column_type(LATITUDE_COLUMN),
        Some(ColumnType::Number)
    );
    assert_eq!(session.records()[4][LONGITUDE_COLUMN], Cell::Absent);

    session
        .set_range(LATITUDE_COLUMN, Some(46.0), None)
        .unwrap();
    assert_eq!(session.total_count(), 2);

    let (markers, bounds) = session
        .markers(LATITUDE_COLUMN, LONGITUDE_COLUMN, &["customer".to_string()])
        .unwrap();
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0].label, "Alice");
    assert_eq!(bounds.unwrap().north, 48.85);
}

#[test]
fn empty_dataset_degrades_gracefully() {
    let mut session = Session::from_records(Vec::new(), None);
    assert!(session.schema().is_empty());
    assert_eq!(session.page_count(), 1);
    assert!(session.page().is_empty());
    session.go_to_page(7);
    assert_eq!(session.pagination().current_page, 1);
    assert!(matches!(
        session.add_chart(ChartSpec::new(ChartKind::Line, "x", None, Aggregator::Count)),
        Err(StudioError::UnknownColumn(_))
    ));
}
