use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, error, info, warn};

use crate::cli::{ScoreArgs, TaskArg};
use crate::config::{Split, Workspace};
use crate::model::{
    EvidenceSpan, GoldStore, GoldTimeline, GoldTimelineLevel, Metric, MetricRow,
    ModelDescriptors, PredictedPost, PredictedTimeline, ScoreRunManifest, Submission,
    SubmissionEntry, Submitter, Task,
};
use crate::scoring::{ConsistencyScorer, SpanScorer, WellbeingScorer};
use crate::semantic::{EntailmentModel, ModelSuite, SpanSimilarity, TokenCounter};
use crate::text::TextSegmenter;
use crate::util::{
    ensure_directory, list_files_with_extension, now_utc_string, read_json, sha256_file,
    utc_compact_string, write_json_pretty,
};

mod aggregate;
mod output;
mod store;

pub use aggregate::{ActiveTasks, Scorers, flatten_results, score_submission};
pub use store::{open_results_store, summarize_runs};

use output::*;
use store::*;

pub fn run(workspace: &Workspace, args: ScoreArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let split = Split::from_test_flag(args.test);

    let submission_dir = workspace.submissions_dir(split);
    let submission_paths = list_files_with_extension(&submission_dir, "json")?;
    if submission_paths.is_empty() {
        error!(dir = %submission_dir.display(), "no submission files found");
        return Ok(());
    }

    let gold_path = workspace.gold_path(split);
    if !gold_path.exists() {
        bail!(
            "gold store missing at {}; run `prepare-gold{}` first",
            gold_path.display(),
            if args.test { " --test" } else { "" }
        );
    }
    let gold: GoldStore = read_json(&gold_path)?;

    let results_dir = workspace.results_dir();
    let db_path = workspace.results_db_path();
    let mut connection = open_results_store(&db_path)?;
    let paths = RunPaths::allocate(
        &connection,
        &results_dir,
        split,
        &utc_compact_string(started_ts),
    )?;
    let run_id = paths.run_id.as_str();

    let tasks = ActiveTasks::from_args(&args.tasks);
    info!(
        run_id = %run_id,
        split = split.as_str(),
        tasks = %tasks.labels(),
        submissions = submission_paths.len(),
        timelines = gold.len(),
        "starting scoring run"
    );

    let segmenter = TextSegmenter::new()?;
    let models = ModelSuite::load(&workspace.config.models, &segmenter)?;
    info!(
        similarity_model = %models.similarity_config.model_id,
        similarity_backend = %models.similarity_config.backend,
        nli_model = %models.entailment_config.model_id,
        nli_backend = %models.entailment_config.backend,
        "loaded scoring models"
    );
    let scorers = Scorers::new(&models, &segmenter);

    let mut rows = Vec::new();
    let mut submissions = Vec::with_capacity(submission_paths.len());

    for path in &submission_paths {
        let submitter = Submitter::from_path(path);
        info!(
            file = %path.display(),
            team_name = %submitter.team_name,
            submission_id = %submitter.submission_id,
            "processing submission"
        );

        let submission = Submission::load(path)?;
        let results = score_submission(
            &submission,
            &gold,
            &tasks,
            &scorers,
            args.evidence_consistency,
        )
        .with_context(|| format!("failed to score {}", path.display()))?;

        let submission_rows = flatten_results(results, &submitter);
        submissions.push(SubmissionEntry {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            team_name: submitter.team_name,
            submission_id: submitter.submission_id,
            sha256: sha256_file(path)?,
            row_count: submission_rows.len(),
        });
        rows.extend(submission_rows);
    }

    record_run(
        &mut connection,
        &EvalRun {
            run_id,
            split,
            started_at: &started_at,
            tasks: &tasks,
            submission_count: submissions.len(),
        },
        &rows,
    )?;
    write_results_csv(&paths.csv, &rows)?;
    info!(path = %paths.csv.display(), row_count = rows.len(), "wrote results table");

    let summary = grouped_means(&connection, run_id)?;
    print!("{}", render_grouped_summary(&summary));

    let manifest = ScoreRunManifest {
        manifest_version: 1,
        run_id: run_id.to_string(),
        split: split.as_str().to_string(),
        started_at,
        completed_at: now_utc_string(),
        tasks: tasks.tasks(),
        evidence_consistency: args.evidence_consistency,
        models: ModelDescriptors {
            similarity: models.similarity_config.clone(),
            tokenizer: models.tokenizer_config.clone(),
            entailment: models.entailment_config.clone(),
        },
        gold_path: gold_path.display().to_string(),
        gold_sha256: sha256_file(&gold_path)?,
        submissions,
        row_count: rows.len(),
        results_csv: paths.csv.display().to_string(),
        results_db: db_path.display().to_string(),
    };
    write_json_pretty(&paths.manifest, &manifest)?;

    info!(
        run_id = %run_id,
        manifest = %paths.manifest.display(),
        row_count = rows.len(),
        "scoring run completed"
    );

    Ok(())
}

/// Run id and output files of one scoring run, all keyed by the same stamp.
struct RunPaths {
    run_id: String,
    csv: PathBuf,
    manifest: PathBuf,
}

impl RunPaths {
    /// Suffixes the stamp until neither the results store nor `results_dir` knows it.
    fn allocate(
        connection: &Connection,
        results_dir: &Path,
        split: Split,
        stamp: &str,
    ) -> Result<Self> {
        let mut attempt = 0usize;
        loop {
            let key = if attempt == 0 {
                stamp.to_string()
            } else {
                format!("{stamp}-{attempt}")
            };
            let paths = Self {
                run_id: format!("score-{key}"),
                csv: results_dir.join(format!("results_{}_{key}.csv", split.as_str())),
                manifest: results_dir.join(format!("score_run_{key}.json")),
            };

            if !paths.csv.exists()
                && !paths.manifest.exists()
                && !run_exists(connection, &paths.run_id)?
            {
                return Ok(paths);
            }
            debug!(run_id = %paths.run_id, "run id taken; trying next suffix");
            attempt += 1;
        }
    }
}
