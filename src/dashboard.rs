//! YAML dashboards: a named list of chart specs evaluated against one session.
//!
//! ```yaml
//! charts:
//!   - type: bar
//!     x: city
//!     y: amount
//!     agg: sum
//!   - type: pie
//!     x: status
//! ```

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{ChartSpec, Series},
    cli::DashboardArgs,
    data::Cell,
    session::Session,
    table,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOutput {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub series: Series,
}

impl Dashboard {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening dashboard file {path:?}"))?;
        let dashboard: Dashboard = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing dashboard file {path:?}"))?;
        debug!("Loaded {} chart(s) from {path:?}", dashboard.charts.len());
        Ok(dashboard)
    }

    /// Registers every chart with the session and aggregates it over the
    /// current filtered rows. Fails on the first chart naming a missing column.
    pub fn evaluate(&self, session: &mut Session) -> Result<Vec<ChartOutput>> {
        let mut outputs = Vec::with_capacity(self.charts.len());
        for spec in &self.charts {
            let id = session
                .add_chart(spec.clone())
                .with_context(|| format!("Adding chart '{}'", spec.title()))?;
            let series = session.chart_series(&id)?;
            outputs.push(ChartOutput {
                id,
                title: spec.title(),
                kind: spec.kind.to_string(),
                series,
            });
        }
        Ok(outputs)
    }
}

pub fn series_rows(series: &Series) -> Vec<Vec<String>> {
    series
        .iter()
        .map(|(label, value)| {
            vec![label.to_string(), Cell::Number(value).to_string()]
        })
        .collect()
}

pub fn execute(args: &DashboardArgs) -> Result<()> {
    let dashboard = Dashboard::load(&args.config)?;
    let mut session = crate::open_session(&args.input, Some(&args.filter))?;
    let outputs = dashboard.evaluate(&mut session)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        if let Some(title) = &dashboard.title {
            println!("{title}\n");
        }
        let headers = vec!["label".to_string(), "value".to_string()];
        for output in &outputs {
            println!("{} [{}] ({})", output.title, output.kind, output.id);
            table::print_table(&headers, &series_rows(&output.series));
            println!();
        }
    }
    info!(
        "Evaluated {} chart(s) over {} filtered row(s)",
        outputs.len(),
        session.total_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record;

    #[test]
    fn dashboard_charts_aggregate_over_the_session() {
        let yaml = "title: Sales\ncharts:\n  - type: bar\n    x: city\n    y: amt\n    agg: sum\n  - type: pie\n    x: city\n";
        let dashboard: Dashboard = serde_yaml::from_str(yaml).unwrap();
        let mut session = Session::from_records(
            vec![
                record([("city", "A"), ("amt", "10")]),
                record([("city", "B"), ("amt", "20")]),
                record([("city", "A"), ("amt", "5")]),
            ],
            None,
        );
        let outputs = dashboard.evaluate(&mut session).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].series.values, vec![15.0, 20.0]);
        assert_eq!(outputs[1].series.values, vec![2.0, 1.0]);
        assert_eq!(outputs[1].kind, "pie");
        assert_eq!(session.charts().len(), 2);
        assert_eq!(
            series_rows(&outputs[0].series),
            vec![vec!["A", "15"], vec!["B", "20"]]
        );
    }

    #[test]
    fn missing_columns_fail_the_dashboard() {
        let dashboard: Dashboard = serde_yaml::from_str("charts:\n  - x: nope\n").unwrap();
        let mut session = Session::from_records(vec![record([("city", "A")])], None);
        let err = dashboard.evaluate(&mut session).unwrap_err();
        assert!(format!("{err:#}").contains("Column 'nope' not found"));
    }
}
