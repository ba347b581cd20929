use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["visitguard-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["visitguard-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["visitguard-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn report_summary_without_filters() {
    let cli = Cli::try_parse_from(["visitguard-cli", "report", "summary"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Summary {
                filter: report::FilterArgs {
                    date: None,
                    salesman: None,
                    shop: None
                }
            }
        })
    ));
}

#[test]
fn report_summary_parses_date_and_salesman() {
    let salesman = uuid::Uuid::new_v4();
    let cli = Cli::try_parse_from([
        "visitguard-cli",
        "report",
        "summary",
        "--date",
        "2026-03-14",
        "--salesman",
        &salesman.to_string(),
    ])
    .expect("expected valid cli args");

    let Some(Commands::Report {
        command: ReportCommands::Summary { filter },
    }) = cli.command
    else {
        panic!("expected report summary");
    };
    assert_eq!(filter.date, chrono::NaiveDate::from_ymd_opt(2026, 3, 14));
    assert_eq!(filter.salesman, Some(salesman));
    assert!(filter.shop.is_none());
}

#[test]
fn report_summary_rejects_bad_date() {
    let result = Cli::try_parse_from(["visitguard-cli", "report", "summary", "--date", "14/03"]);
    assert!(result.is_err());
}

#[test]
fn report_visits_defaults_limit() {
    let cli = Cli::try_parse_from(["visitguard-cli", "report", "visits"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Visits { limit: 20, .. }
        })
    ));
}

#[test]
fn report_trend_defaults_to_seven_days() {
    let cli = Cli::try_parse_from(["visitguard-cli", "report", "trend"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Trend { days: 7 }
        })
    ));
}

#[test]
fn report_trend_rejects_out_of_range_days() {
    assert!(Cli::try_parse_from(["visitguard-cli", "report", "trend", "--days", "0"]).is_err());
    assert!(Cli::try_parse_from(["visitguard-cli", "report", "trend", "--days", "91"]).is_err());
}

#[test]
fn report_export_with_output_path() {
    let cli = Cli::try_parse_from([
        "visitguard-cli",
        "report",
        "export",
        "--out",
        "visits.csv",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Export { out: Some(ref path), .. }
        }) if path.as_os_str() == "visits.csv"
    ));
}
