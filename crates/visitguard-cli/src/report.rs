//! Read-only report commands.
//!
//! These are called from `main` after the database pool and config are
//! established.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use uuid::Uuid;
use visitguard_core::AppConfig;
use visitguard_db::{DailyVisitCount, VisitFilter, VisitReportRow, VisitSummaryRow};

/// Filters shared by every report that reads visits.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only visits verified on this UTC day (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Only visits by this salesman id
    #[arg(long)]
    pub salesman: Option<Uuid>,
    /// Only visits to this shop id
    #[arg(long)]
    pub shop: Option<Uuid>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> VisitFilter {
        VisitFilter {
            date: self.date,
            salesman_id: self.salesman,
            shop_id: self.shop,
        }
    }
}

/// Sub-commands available under `report`.
#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Dashboard counters
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Most recent visits as a table
    Visits {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum number of visits to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Daily visit counts
    Trend {
        /// Number of UTC days ending today
        #[arg(long, default_value = "7", value_parser = clap::value_parser!(u32).range(1..=90))]
        days: u32,
    },
    /// Export visits as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Dispatch a `report` sub-command.
///
/// # Errors
///
/// Returns an error if a query fails or the export file cannot be written.
pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: ReportCommands,
) -> anyhow::Result<()> {
    match command {
        ReportCommands::Summary { filter } => {
            let summary =
                visitguard_db::summarize_visits(pool, &filter.to_filter(), config.geofence_radius_m)
                    .await?;
            print!("{}", render_summary(&summary));
        }
        ReportCommands::Visits { filter, limit } => {
            let rows =
                visitguard_db::list_visit_report(pool, &filter.to_filter(), i64::from(limit))
                    .await?;
            if rows.is_empty() {
                println!("no visits found");
                return Ok(());
            }
            print!("{}", render_visits(&rows, config.geofence_radius_m));
        }
        ReportCommands::Trend { days } => {
            let series = visitguard_db::visit_trend(pool, days).await?;
            print!("{}", render_trend(&series));
        }
        ReportCommands::Export { filter, out } => {
            let rows = visitguard_db::list_visit_report(
                pool,
                &filter.to_filter(),
                visitguard_db::EXPORT_ROW_LIMIT,
            )
            .await?;
            let csv = visitguard_db::visits_to_csv(&rows, config.geofence_radius_m);
            match out {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    tracing::info!(rows = rows.len(), path = %path.display(), "visit export written");
                    println!("wrote {} visit(s) to {}", rows.len(), path.display());
                }
                None => print!("{csv}"),
            }
        }
    }

    Ok(())
}

fn render_summary(summary: &VisitSummaryRow) -> String {
    let mut out = String::new();
    for (label, value) in [
        ("Total visits", summary.total_visits),
        ("Visits today", summary.visits_today),
        ("Active salesmen", summary.active_salesmen),
        ("Shops covered", summary.shops_covered),
        ("Out of range", summary.out_of_range),
        ("Flagged", summary.flagged),
    ] {
        writeln!(out, "{label:<17}{value}").ok();
    }
    out
}

fn render_visits(rows: &[VisitReportRow], geofence_radius_m: f64) -> String {
    let mut out = format!(
        "{:<18}{:<22}{:<26}{:>10}  STATUS\n",
        "VERIFIED (UTC)", "SALESMAN", "SHOP", "DISTANCE"
    );
    for row in rows {
        let status = if row.distance_from_shop <= geofence_radius_m {
            "ok"
        } else {
            "out of range"
        };
        let flagged = if row.flag_count > 0 { " (flagged)" } else { "" };
        writeln!(
            out,
            "{:<18}{:<22}{:<26}{:>9.1}m  {status}{flagged}",
            row.verified_at.format("%Y-%m-%d %H:%M"),
            truncate(row.salesman_display(), 20),
            truncate(&row.shop_name, 24),
            row.distance_from_shop,
        )
        .ok();
    }
    out
}

fn render_trend(series: &[DailyVisitCount]) -> String {
    let mut out = String::new();
    for point in series {
        let bar = "#".repeat(usize::try_from(point.visit_count).unwrap_or(0));
        writeln!(
            out,
            "{}  {:>4}  {bar}",
            point.day.format("%Y-%m-%d"),
            point.visit_count
        )
        .ok();
    }
    out
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        format!("{}...", value.chars().take(max_chars - 3).collect::<String>())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn summary_lists_every_counter() {
        let text = render_summary(&VisitSummaryRow {
            total_visits: 40,
            visits_today: 6,
            active_salesmen: 3,
            shops_covered: 12,
            out_of_range: 2,
            flagged: 1,
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Total visits     40");
        assert_eq!(lines[5], "Flagged          1");
    }

    #[test]
    fn trend_draws_one_bar_per_day() {
        let series = vec![
            DailyVisitCount {
                day: NaiveDate::from_ymd_opt(2026, 3, 13).unwrap(),
                visit_count: 0,
            },
            DailyVisitCount {
                day: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
                visit_count: 3,
            },
        ];
        let text = render_trend(&series);
        assert_eq!(text, "2026-03-13     0  \n2026-03-14     3  ###\n");
    }

    #[test]
    fn visits_table_marks_out_of_range_and_flags() {
        let row = VisitReportRow {
            id: Uuid::new_v4(),
            salesman_id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            verified_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 0).unwrap(),
            gps_lat: 0.0,
            gps_lng: 0.0,
            distance_from_shop: 73.21,
            photo_url: None,
            shop_name: "Equator Mart".to_string(),
            shop_address: None,
            employee_code: "EMP-7".to_string(),
            salesman_name: None,
            flag_count: 1,
        };
        let text = render_visits(&[row], 50.0);
        let line = text.lines().nth(1).expect("data row");
        assert!(line.starts_with("2026-03-14 09:05"));
        assert!(line.contains("EMP-7"));
        assert!(line.contains("73.2m"));
        assert!(line.ends_with("out of range (flagged)"));
    }

    #[test]
    fn truncate_keeps_short_values() {
        assert_eq!(truncate("Corner Mart", 24), "Corner Mart");
        assert_eq!(truncate("A Very Long Shop Name Indeed", 10), "A Very ...");
    }

    #[test]
    fn filter_args_map_to_visit_filter() {
        let salesman = Uuid::new_v4();
        let args = FilterArgs {
            date: NaiveDate::from_ymd_opt(2026, 3, 14),
            salesman: Some(salesman),
            shop: None,
        };
        let filter = args.to_filter();
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2026, 3, 14));
        assert_eq!(filter.salesman_id, Some(salesman));
        assert!(filter.shop_id.is_none());
    }
}
