//! Plain-text summary tables for the three pipeline outputs. Pure string
//! rendering; external collaborators own any richer presentation.

use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;

use crate::cluster::ClusterAssignment;
use crate::cluster::NOISE_LABEL;
use crate::performance::PerformanceReport;
use crate::stability::TickerStability;

fn header(table: &mut Table, titles: &[&str]) {
  table.set_titles(Row::new(titles.iter().map(|t| Cell::new(t)).collect()));
}

/// Cluster membership table, grouped by label with noise last.
pub fn assignment_table(assignment: &ClusterAssignment) -> String {
  let mut table = Table::new();
  header(&mut table, &["cluster", "size", "tickers"]);

  let groups = assignment.by_label();
  for (label, members) in groups.iter().filter(|(l, _)| **l != NOISE_LABEL) {
    table.add_row(Row::new(vec![
      Cell::new(&label.to_string()),
      Cell::new(&members.len().to_string()),
      Cell::new(&members.join(" ")),
    ]));
  }
  if let Some(noise) = groups.get(&NOISE_LABEL) {
    table.add_row(Row::new(vec![
      Cell::new("noise"),
      Cell::new(&noise.len().to_string()),
      Cell::new(&noise.join(" ")),
    ]));
  }
  table.to_string()
}

/// Per-ticker stability summary.
pub fn stability_table(stats: &[TickerStability]) -> String {
  let mut table = Table::new();
  header(
    &mut table,
    &["ticker", "windows", "memberships", "modal cluster"],
  );
  for s in stats {
    table.add_row(Row::new(vec![
      Cell::new(&s.ticker),
      Cell::new(&s.windows.to_string()),
      Cell::new(&s.memberships.to_string()),
      Cell::new(&s.modal_label.to_string()),
    ]));
  }
  table.to_string()
}

fn format_premium(value: f64) -> String {
  if value.is_finite() {
    format!("{:+.2}%", value * 100.0)
  } else {
    "n/a".to_string()
  }
}

/// Per-cluster performance summary for one evaluated range.
pub fn performance_table(report: &PerformanceReport) -> String {
  let mut table = Table::new();
  header(
    &mut table,
    &["cluster", "members", "evaluated", "median active premium"],
  );
  for cluster in &report.per_cluster {
    table.add_row(Row::new(vec![
      Cell::new(&cluster.label.to_string()),
      Cell::new(&cluster.tickers.len().to_string()),
      Cell::new(&cluster.n_evaluated.to_string()),
      Cell::new(&format_premium(cluster.median_active_premium)),
    ]));
  }
  table.to_string()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::performance::ClusterPerformance;

  #[test]
  fn assignment_table_groups_noise_separately() {
    let assignment = ClusterAssignment::new(
      vec!["AAA".into(), "BBB".into(), "CCC".into()],
      vec![1, 1, 0],
    );
    let rendered = assignment_table(&assignment);
    assert!(rendered.contains("AAA BBB"));
    assert!(rendered.contains("noise"));
    assert!(rendered.contains("CCC"));
  }

  #[test]
  fn performance_table_marks_missing_premiums() {
    let report = PerformanceReport {
      window_label: None,
      from: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
      to: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
      per_ticker: Vec::new(),
      per_cluster: vec![
        ClusterPerformance {
          label: 1,
          tickers: vec!["AAA".into()],
          n_evaluated: 1,
          median_active_premium: 0.0234,
        },
        ClusterPerformance {
          label: 2,
          tickers: vec!["BBB".into()],
          n_evaluated: 0,
          median_active_premium: f64::NAN,
        },
      ],
    };
    let rendered = performance_table(&report);
    assert!(rendered.contains("+2.34%"));
    assert!(rendered.contains("n/a"));
  }
}
