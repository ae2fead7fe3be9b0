use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Analyze assessment results across test rounds",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Overall statistics and frequency breakdowns for the loaded rounds
    Summary(SummaryArgs),
    /// Per-group mean score and pass rate, with optional box plot and histogram data
    Groups(GroupsArgs),
    /// Round-over-round attempt and pass counts for one department
    Rounds(RoundsArgs),
    /// Students who sat at least a given number of rounds
    Repeaters(RepeatersArgs),
    /// Per-round results of a single student
    Trajectory(TrajectoryArgs),
    /// Mean score by department and academic year
    Pivot(PivotArgs),
    /// Normalized performance indicators for radar charts
    Radar(RadarArgs),
    /// Row counts per department and round
    Participation(ParticipationArgs),
}

/// Round source given on the command line: `path` or `N=path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub round: Option<u32>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Round result file; the round number comes from the file name unless given as `N=path`
    #[arg(short = 'i', long = "input", required = true, value_parser = parse_input, action = clap::ArgAction::Append)]
    pub inputs: Vec<InputSpec>,
    /// YAML file overriding column labels, pass/fail labels, and thresholds
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Row filters such as `학과=CS` or `level=A|B`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Restrict to a single round
    #[arg(long)]
    pub round: Option<u32>,
    /// Maximum number of values listed per frequency table (0 = all)
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Column to group by
    #[arg(long = "by", default_value = "department")]
    pub by: String,
    /// Row filters such as `학과=CS` or `level=A|B`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Include per-department five-number score summaries
    #[arg(long = "box-plot")]
    pub box_plot: bool,
    /// Include a pass/fail score histogram with this bin width
    #[arg(long)]
    pub histogram: Option<f64>,
}

#[derive(Debug, Args)]
pub struct RoundsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Department to summarize
    #[arg(short, long)]
    pub department: String,
}

#[derive(Debug, Args)]
pub struct RepeatersArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Minimum number of rounds attended (defaults to the configured threshold)
    #[arg(long = "min-attempts")]
    pub min_attempts: Option<usize>,
}

#[derive(Debug, Args)]
pub struct TrajectoryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Student email address
    #[arg(short, long)]
    pub email: String,
    /// Student number, for configurations identifying students by email and number
    #[arg(long = "student-number")]
    pub student_number: Option<String>,
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Row filters such as `학과=CS` or `level=A|B`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RadarArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Department to profile (whole population when omitted)
    #[arg(short, long)]
    pub department: Option<String>,
}

#[derive(Debug, Args)]
pub struct ParticipationArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn parse_input(value: &str) -> Result<InputSpec, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Input path cannot be empty".to_string());
    }
    if let Some((round, path)) = trimmed.split_once('=')
        && let Ok(round) = round.trim().parse::<u32>()
    {
        if round == 0 {
            return Err("Round numbers start at 1".to_string());
        }
        let path = path.trim();
        if path.is_empty() {
            return Err(format!("Missing path after '{round}='"));
        }
        return Ok(InputSpec {
            round: Some(round),
            path: PathBuf::from(path),
        });
    }
    Ok(InputSpec {
        round: None,
        path: PathBuf::from(trimmed),
    })
}
