use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::cli::ValidateArgs;
use crate::config::{Split, Workspace};
use crate::model::{ScoreReading, TimelinePostMapping, json_type_name};
use crate::util::{now_utc_string, read_json, write_json_pretty};

mod checks;
mod context;
#[cfg(test)]
mod tests;

pub use checks::validate_file;
pub use context::{ValidationContext, ValidationReport};

use context::*;

pub fn run(workspace: &Workspace, args: ValidateArgs) -> Result<ValidationReport> {
    let split = if args.dev { Split::Dev } else { Split::Test };
    let expected = load_expected_mapping(workspace, split)?;

    info!(
        path = %args.file_path.display(),
        split = split.as_str(),
        expected_timelines = expected.len(),
        "validating submission"
    );

    let report = validate_file(&args.file_path, split, &expected);

    if report.valid {
        info!("JSON file is valid");
    } else {
        error!(
            timelines_with_issues = report.timelines_with_issues.len(),
            posts_with_issues = report.posts_with_issues.len(),
            errors = report.errors.len(),
            "JSON file is invalid"
        );
    }

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote validation report");
    }

    Ok(report)
}

/// Process exit status for a finished validation: 0 when valid, 1 otherwise.
pub fn exit_code(report: &ValidationReport) -> i32 {
    if report.valid { 0 } else { 1 }
}

/// The timeline mapping restricted to the split being validated.
pub fn load_expected_mapping(workspace: &Workspace, split: Split) -> Result<TimelinePostMapping> {
    let timeline_ids = workspace.split_timeline_ids(split)?;
    if timeline_ids.is_empty() {
        bail!(
            "unable to load {} timeline ids; check train_dir/test_dir in the evaluation config",
            split.as_str()
        );
    }

    let mapping_path = workspace.mapping_path();
    let mapping: TimelinePostMapping = read_json(&mapping_path).with_context(|| {
        format!(
            "timeline mapping unavailable at {}; run `setup` first",
            mapping_path.display()
        )
    })?;

    Ok(mapping
        .into_iter()
        .filter(|(timeline_id, _)| timeline_ids.contains(timeline_id))
        .collect())
}
