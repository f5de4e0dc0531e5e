use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::Task;

#[derive(Parser, Debug)]
#[command(
    name = "timeline-eval",
    version,
    about = "Validation and scoring for clinical timeline shared-task submissions"
)]
pub struct Cli {
    /// Evaluation root holding data/, submissions/ and results/.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Evaluation config (defaults to <root>/eval_config.json when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Setup,
    PrepareGold(PrepareGoldArgs),
    Dummy(DummyArgs),
    Validate(ValidateArgs),
    Score(ScoreArgs),
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct PrepareGoldArgs {
    /// Process the test split instead of the dev split.
    #[arg(long, default_value_t = false)]
    pub test: bool,

    /// Rebuild the gold store even when it already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DummyArgs {
    #[arg(long, default_value_t = false)]
    pub test: bool,

    #[arg(long, default_value_t = 13)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Submission JSON file to validate.
    #[arg(short = 'f', long = "file-path", alias = "file_path")]
    pub file_path: PathBuf,

    /// Check against the dev timelines instead of the test timelines.
    #[arg(long, default_value_t = false)]
    pub dev: bool,

    /// Write the issue report as JSON.
    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TaskArg {
    #[value(name = "A1")]
    A1,
    #[value(name = "A2")]
    A2,
    #[value(name = "B")]
    B,
    #[value(name = "C")]
    C,
}

impl TaskArg {
    pub fn task(self) -> Task {
        match self {
            Self::A1 => Task::A1,
            Self::A2 => Task::A2,
            Self::B => Task::B,
            Self::C => Task::C,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long, default_value_t = false)]
    pub test: bool,

    /// Tasks to evaluate; all of them when omitted.
    #[arg(long, value_enum, num_args = 1.., ignore_case = true)]
    pub tasks: Vec<TaskArg>,

    /// Also score predicted post summaries against the predicted evidence.
    #[arg(long, default_value_t = false)]
    pub evidence_consistency: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_accepts_task_subsets_in_any_case() {
        let cli = Cli::try_parse_from(["timeline-eval", "score", "--tasks", "a1", "C"])
            .expect("tasks should parse");
        let Commands::Score(args) = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(args.tasks, vec![TaskArg::A1, TaskArg::C]);
        assert!(!args.test);
    }

    #[test]
    fn score_rejects_unknown_tasks() {
        assert!(Cli::try_parse_from(["timeline-eval", "score", "--tasks", "D"]).is_err());
    }

    #[test]
    fn validate_takes_short_file_flag_and_global_root() {
        let cli = Cli::try_parse_from([
            "timeline-eval",
            "validate",
            "-f",
            "team_1.json",
            "--dev",
            "--root",
            "/srv/eval",
        ])
        .expect("validate should parse");
        assert_eq!(cli.root, PathBuf::from("/srv/eval"));
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate command");
        };
        assert_eq!(args.file_path, PathBuf::from("team_1.json"));
        assert!(args.dev);
    }
}
