use csv_studio::{
    data::{Cell, record},
    query::{Pagination, run},
    table::{render_page, render_table},
};

#[test]
fn render_table_aligns_columns() {
    let headers = vec!["id".to_string(), "name".to_string()];
    let rows = vec![
        vec!["1".to_string(), "Alice".to_string()],
        vec!["2".to_string(), "Bob".to_string()],
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines, vec!["id  name", "---  -----", "1   Alice", "2   Bob"]);
}

#[test]
fn render_table_normalizes_control_characters() {
    let headers = vec!["note".to_string()];
    let rows = vec![vec!["line1\nline2\tvalue".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "line1 line2 value");
}

#[test]
fn render_table_handles_unicode_and_ansi_widths() {
    let headers = vec!["résumé".to_string(), "status".to_string()];
    let rows = vec![vec!["café".to_string(), "\u{1b}[31mERR\u{1b}[0m".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "résumé  status");
    // "résumé" is two display columns wider than "café", so expect two padding
    // spaces plus the standard two-column separator.
    assert_eq!(lines[2], "café    \u{1b}[31mERR\u{1b}[0m");
}

#[test]
fn render_page_appends_position_summary() {
    let records = vec![
        record([("id", Cell::from("1")), ("city", Cell::from("Paris"))]),
        record([("id", Cell::from("2")), ("city", Cell::Absent)]),
        record([("id", Cell::from("3")), ("city", Cell::from("Nice"))]),
    ];
    let mut pagination = Pagination::with_page_size(2).unwrap();
    pagination.current_page = 2;
    let page = run(&records, |_| true, &pagination);

    let columns = vec!["id".to_string(), "city".to_string()];
    let rendered = render_page(&page, &columns);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "id  city",
            "---  ----",
            "3    Nice",
            "Showing 3 to 3 of 3 row(s) (page 2 of 2)",
        ]
    );
}
