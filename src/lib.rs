pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod frequency;
pub mod identity;
pub mod record;
pub mod schema;
pub mod source;
pub mod stats;
pub mod store;
pub mod table;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;

use crate::{
    aggregate::{GradePivot, ParticipationMatrix, RadarMetrics, RoundSummary},
    cli::{Cli, Commands, OutputFormat, SourceArgs},
    config::EngineConfig,
    error::EngineError,
    filter::FilterSet,
    identity::{IdentityMode, RepeatTester, StudentIdentity, TrajectoryPoint, TrajectorySummary},
    record::{Column, Record, format_number},
    stats::{AdvancedStats, BasicStats, BoxSummary, GroupSummary, HistogramBin},
    store::{RoundSource, RoundStore},
    table::print_titled,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("round_analytics", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Summary(args) => handle_summary(&args),
        Commands::Groups(args) => handle_groups(&args),
        Commands::Rounds(args) => handle_rounds(&args),
        Commands::Repeaters(args) => handle_repeaters(&args),
        Commands::Trajectory(args) => handle_trajectory(&args),
        Commands::Pivot(args) => handle_pivot(&args),
        Commands::Radar(args) => handle_radar(&args),
        Commands::Participation(args) => handle_participation(&args.source),
    }
}

/// Reads every input, skipping unreadable files, and loads them into a store.
fn open_store(args: &SourceArgs) -> Result<RoundStore> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let encoding = source::resolve_encoding(args.input_encoding.as_deref())?;
    let mut sources = Vec::with_capacity(args.inputs.len());
    let mut unreadable = 0usize;
    for input in &args.inputs {
        let bytes = match fs::read(&input.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Skipping round source {:?}: {err}", input.path);
                unreadable += 1;
                continue;
            }
        };
        let name = input
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.path.display().to_string());
        let source = RoundSource::bytes(name, bytes);
        sources.push(match input.round {
            Some(round) => source.with_round(round),
            None => source,
        });
    }
    let mut store = RoundStore::new(config);
    let summary = store
        .load_all(&sources, encoding)
        .map_err(|err| match err {
            EngineError::NoRoundsLoaded { skipped } => EngineError::NoRoundsLoaded {
                skipped: skipped + unreadable,
            },
            other => other,
        })
        .context("Loading round sources")?;
    info!(
        "Loaded {} round(s) {:?}; skipped {}",
        summary.loaded.len(),
        store.round_numbers(),
        summary.skipped.len() + unreadable
    );
    Ok(store)
}

fn filtered_records(
    store: &RoundStore,
    records: &[Record],
    filters: &[String],
) -> Result<Vec<Record>> {
    let filters = FilterSet::parse(filters)?;
    debug!("Filters: {:?}", filters.entries());
    Ok(filter::apply_or_unfiltered(records, &filters, store.config()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing JSON output")?;
    println!("{rendered}");
    Ok(())
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    rounds: Vec<u32>,
    basic: &'a BasicStats,
    advanced: &'a AdvancedStats,
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let records = match args.round {
        Some(number) => store
            .get(number)
            .map(|round| round.records.clone())
            .ok_or_else(|| anyhow!("Round {number} is not loaded"))?,
        None => store.all_records(),
    };
    let records = filtered_records(&store, &records, &args.filters)?;
    let basic = stats::basic_stats(&records);
    let advanced = stats::advanced_stats(&records);
    if args.source.format == OutputFormat::Json {
        return print_json(&SummaryReport {
            rounds: args.round.map_or_else(|| store.round_numbers(), |round| vec![round]),
            basic: &basic,
            advanced: &advanced,
        });
    }
    let rows = [
        ("rows", basic.total_count.to_string()),
        ("passed", basic.pass_count.to_string()),
        ("pass rate", percent(basic.pass_rate)),
        ("mean score", format_number(basic.mean_score)),
        ("std dev", format_number(advanced.std_dev)),
        ("median", format_number(advanced.median)),
        ("max", format_number(advanced.max)),
        ("min", format_number(advanced.min)),
        ("top decile mean", format_number(advanced.top_decile_mean)),
        ("bottom decile mean", format_number(advanced.bottom_decile_mean)),
    ]
    .into_iter()
    .map(|(metric, value)| vec![metric.to_string(), value])
    .collect::<Vec<_>>();
    print_titled("Summary", &headers(&["metric", "value"]), &rows);
    let frequency_headers = headers(&["column", "value", "count", "percent"]);
    for table in [&basic.by_department, &basic.by_year, &basic.by_level] {
        let title = table.column.map(|c| c.name()).unwrap_or_default();
        print_titled(title, &frequency_headers, &table.render_rows(args.top));
    }
    Ok(())
}

#[derive(Serialize)]
struct GroupsReport {
    column: Column,
    groups: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    box_plot: Option<Vec<BoxSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    histogram: Option<Vec<HistogramBin>>,
}

fn handle_groups(args: &cli::GroupsArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let column = store
        .config()
        .column_for_header(&args.by)
        .ok_or_else(|| EngineError::FilterColumn(args.by.clone()))?;
    let records = filtered_records(&store, &store.all_records(), &args.filters)?;
    let report = GroupsReport {
        column,
        groups: stats::group_summaries(&records, column),
        box_plot: args
            .box_plot
            .then(|| stats::department_box_summaries(&records)),
        histogram: args
            .histogram
            .map(|width| stats::score_histogram(&records, width)),
    };
    if args.source.format == OutputFormat::Json {
        return print_json(&report);
    }
    let rows = report
        .groups
        .iter()
        .map(|group| {
            vec![
                group.key.clone(),
                group.count.to_string(),
                group.pass_count.to_string(),
                percent(group.pass_rate),
                format_number(group.mean_score),
            ]
        })
        .collect::<Vec<_>>();
    print_titled(
        &format!("By {}", column.name()),
        &headers(&[column.name(), "count", "passed", "pass rate", "mean score"]),
        &rows,
    );
    if let Some(boxes) = &report.box_plot {
        let rows = boxes
            .iter()
            .map(|summary| {
                let mut row = vec![summary.key.clone(), summary.count.to_string()];
                row.extend(
                    [summary.min, summary.q1, summary.median, summary.q3, summary.max]
                        .map(format_number),
                );
                row
            })
            .collect::<Vec<_>>();
        print_titled(
            "Score spread by department",
            &headers(&["department", "count", "min", "q1", "median", "q3", "max"]),
            &rows,
        );
    }
    if let Some(bins) = &report.histogram {
        let rows = bins
            .iter()
            .map(|bin| {
                vec![
                    format!("{}-{}", format_number(bin.lower), format_number(bin.upper)),
                    bin.passed.to_string(),
                    bin.not_passed.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        print_titled(
            "Score histogram",
            &headers(&["score", "passed", "not passed"]),
            &rows,
        );
    }
    Ok(())
}

fn handle_rounds(args: &cli::RoundsArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let summary: Vec<RoundSummary> = aggregate::department_round_summary(&store, &args.department);
    if args.source.format == OutputFormat::Json {
        return print_json(&summary);
    }
    let rows = summary
        .iter()
        .map(|row| {
            vec![
                row.round.to_string(),
                row.total.to_string(),
                row.passed.to_string(),
                row.failed.to_string(),
                percent(row.pass_rate),
            ]
        })
        .collect::<Vec<_>>();
    print_titled(
        &format!("Rounds for {}", args.department),
        &headers(&["round", "total", "passed", "failed", "pass rate"]),
        &rows,
    );
    Ok(())
}

fn handle_repeaters(args: &cli::RepeatersArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let threshold = args
        .min_attempts
        .unwrap_or(store.config().repeat_threshold);
    let testers: Vec<RepeatTester> = identity::repeat_testers(&store, threshold);
    info!("{} student(s) sat at least {threshold} round(s)", testers.len());
    if args.source.format == OutputFormat::Json {
        return print_json(&testers);
    }
    let rows = testers
        .iter()
        .map(|tester| {
            vec![
                tester.identity.email.clone(),
                tester.department.clone(),
                tester.student_number.clone(),
                tester.attempts.to_string(),
                tester.latest_round.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print_titled(
        &format!("Students with {threshold}+ attempts"),
        &headers(&["email", "department", "student number", "attempts", "latest round"]),
        &rows,
    );
    Ok(())
}

#[derive(Serialize)]
struct TrajectoryReport<'a> {
    identity: &'a StudentIdentity,
    points: &'a [TrajectoryPoint],
    summary: TrajectorySummary,
}

fn handle_trajectory(args: &cli::TrajectoryArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let student = match (&args.student_number, store.config().identity) {
        (Some(number), _) => StudentIdentity::with_number(args.email.trim(), number.trim()),
        (None, IdentityMode::Email) => StudentIdentity::email(args.email.trim()),
        (None, IdentityMode::EmailAndNumber) => {
            return Err(anyhow!(
                "--student-number is required when students are identified by email and number"
            ));
        }
    };
    let points = identity::trajectory(&store, &student);
    if points.is_empty() {
        warn!("No results found for {student}");
    }
    let summary = identity::summarize(&points);
    if args.source.format == OutputFormat::Json {
        return print_json(&TrajectoryReport {
            identity: &student,
            points: &points,
            summary,
        });
    }
    let rows = points
        .iter()
        .map(|point| {
            vec![
                point.round.to_string(),
                point.subject.clone(),
                format_number(point.score),
                point.pass_fail.to_string(),
                point.level.clone(),
            ]
        })
        .collect::<Vec<_>>();
    print_titled(
        &format!("Trajectory of {student}"),
        &headers(&["round", "subject", "score", "result", "level"]),
        &rows,
    );
    let summary_rows = vec![vec![
        summary.attempts.to_string(),
        format_number(summary.mean_score),
        format_number(summary.max_score),
        format_number(summary.min_score),
        summary.passes.to_string(),
    ]];
    print_titled(
        "Summary",
        &headers(&["attempts", "mean", "max", "min", "passes"]),
        &summary_rows,
    );
    Ok(())
}

fn handle_pivot(args: &cli::PivotArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let records = filtered_records(&store, &store.all_records(), &args.filters)?;
    let pivot: GradePivot = aggregate::grade_level_pivot(&records);
    if args.source.format == OutputFormat::Json {
        return print_json(&pivot);
    }
    let years = pivot.years();
    let mut pivot_headers = vec![Column::Department.name().to_string()];
    pivot_headers.extend(years.iter().map(|year| format!("year {year}")));
    let rows = pivot
        .departments()
        .into_iter()
        .map(|department| {
            let mut row = vec![department.to_string()];
            row.extend(years.iter().map(|year| {
                pivot
                    .get(department, year)
                    .map(format_number)
                    .unwrap_or_else(|| "-".to_string())
            }));
            row
        })
        .collect::<Vec<_>>();
    print_titled("Mean score by department and year", &pivot_headers, &rows);
    Ok(())
}

fn handle_radar(args: &cli::RadarArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let metrics: RadarMetrics = aggregate::performance_radar_metrics(
        &store.all_records(),
        args.department.as_deref(),
        store.config(),
    );
    if args.source.format == OutputFormat::Json {
        return print_json(&metrics);
    }
    let rows = metrics
        .axes()
        .iter()
        .map(|(axis, value)| vec![axis.to_string(), format!("{value:.3}")])
        .collect::<Vec<_>>();
    let title = match &metrics.department {
        Some(department) => format!("Performance indicators for {department}"),
        None => "Performance indicators".to_string(),
    };
    print_titled(&title, &headers(&["indicator", "value"]), &rows);
    Ok(())
}

fn handle_participation(args: &SourceArgs) -> Result<()> {
    let store = open_store(args)?;
    let matrix: ParticipationMatrix = aggregate::participation_matrix(&store);
    if args.format == OutputFormat::Json {
        return print_json(&matrix);
    }
    let mut matrix_headers = vec![Column::Department.name().to_string()];
    matrix_headers.extend(matrix.rounds.iter().map(|round| format!("round {round}")));
    let rows = matrix
        .counts
        .iter()
        .map(|(department, counts)| {
            let mut row = vec![department.clone()];
            row.extend(counts.iter().map(usize::to_string));
            row
        })
        .collect::<Vec<_>>();
    print_titled("Participants per round", &matrix_headers, &rows);
    Ok(())
}
