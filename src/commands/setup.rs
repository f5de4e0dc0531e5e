use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Split, Workspace};
use crate::model::{RawTimeline, TimelinePostMapping};
use crate::util::{ensure_directory, read_json, write_json_pretty};

pub fn run(workspace: &Workspace) -> Result<()> {
    info!(root = %workspace.root.display(), "preparing evaluation root");

    for dir in [
        workspace.data_dir(),
        workspace.submissions_dir(Split::Dev),
        workspace.submissions_dir(Split::Test),
        workspace.results_dir(),
    ] {
        ensure_directory(&dir)?;
    }

    let mapping_path = workspace.mapping_path();
    if mapping_path.exists() {
        info!(path = %mapping_path.display(), "timeline mapping already exists");
        return Ok(());
    }

    let mapping = build_mapping(workspace)?;
    write_json_pretty(&mapping_path, &mapping)?;
    info!(
        path = %mapping_path.display(),
        timeline_count = mapping.len(),
        "wrote timeline mapping"
    );

    Ok(())
}

/// Timeline id to ordered post ids across the train, dev and test exports.
pub fn build_mapping(workspace: &Workspace) -> Result<TimelinePostMapping> {
    let mut paths = workspace.train_paths()?;
    paths.extend(existing_dev_paths(workspace));
    paths.extend(workspace.test_paths()?);

    let mut mapping = TimelinePostMapping::new();
    for path in paths {
        let raw: RawTimeline = read_json(&path)
            .with_context(|| format!("failed to load annotation export {}", path.display()))?;
        let post_ids = raw
            .posts
            .iter()
            .map(|post| post.post_id.trim().to_string())
            .collect::<Vec<String>>();
        mapping.insert(raw.timeline_id.trim().to_string(), post_ids);
    }

    Ok(mapping)
}

fn existing_dev_paths(workspace: &Workspace) -> Vec<PathBuf> {
    workspace
        .dev_paths()
        .into_iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!(path = %path.display(), "dev annotation export missing; skipped in mapping");
            }
            exists
        })
        .collect()
}
