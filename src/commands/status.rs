use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::commands::score::summarize_runs;
use crate::config::{Split, Workspace};
use crate::model::{GoldStore, TimelinePostMapping};
use crate::util::{list_files_with_extension, read_json};

pub fn run(workspace: &Workspace) -> Result<()> {
    info!(
        root = %workspace.root.display(),
        config = %workspace
            .config_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "defaults".to_string()),
        train_dir = %workspace.train_dir().display(),
        test_dir = %workspace.test_dir().display(),
        dev_timelines = workspace.config.dev_timeline_ids.len(),
        "status requested"
    );

    let mapping_path = workspace.mapping_path();
    if mapping_path.exists() {
        let mapping: TimelinePostMapping = read_json(&mapping_path)?;
        info!(
            path = %mapping_path.display(),
            timelines = mapping.len(),
            posts = mapping.values().map(Vec::len).sum::<usize>(),
            "loaded timeline/post mapping"
        );
    } else {
        warn!(path = %mapping_path.display(), "timeline/post mapping missing; run `setup`");
    }

    for split in [Split::Dev, Split::Test] {
        let gold_path = workspace.gold_path(split);
        if gold_path.exists() {
            let gold: GoldStore = read_json(&gold_path)?;
            info!(
                split = split.as_str(),
                path = %gold_path.display(),
                timelines = gold.len(),
                "gold store present"
            );
        } else {
            warn!(split = split.as_str(), path = %gold_path.display(), "gold store missing");
        }

        let submissions = list_files_with_extension(&workspace.submissions_dir(split), "json")?;
        info!(
            split = split.as_str(),
            dir = %workspace.submissions_dir(split).display(),
            files = submissions.len(),
            "submission files"
        );
    }

    let db_path = workspace.results_db_path();
    if db_path.exists() {
        let conn = Connection::open(&db_path)?;
        let summaries = summarize_runs(&conn).unwrap_or_default();
        if summaries.is_empty() {
            info!(path = %db_path.display(), "results database has no runs");
        }
        for summary in summaries {
            info!(
                split = %summary.split,
                runs = summary.run_count,
                rows = summary.row_count,
                latest_run_id = %summary.latest_run_id.unwrap_or_default(),
                "results database status"
            );
        }
    } else {
        warn!(path = %db_path.display(), "results database missing");
    }

    Ok(())
}
