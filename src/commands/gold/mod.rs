use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::PrepareGoldArgs;
use crate::config::{Split, Workspace};
use crate::model::{GoldStore, RawTimeline};
use crate::text::TextSegmenter;
use crate::util::{read_json, write_json_pretty};

mod normalize;

pub use normalize::process_annotated_data;

pub fn run(workspace: &Workspace, args: PrepareGoldArgs) -> Result<()> {
    let split = Split::from_test_flag(args.test);
    let gold_path = workspace.gold_path(split);

    if gold_path.exists() && !args.force {
        info!(
            path = %gold_path.display(),
            "gold store already exists; pass --force to rebuild"
        );
        return Ok(());
    }

    let paths = workspace.split_paths(split)?;
    if paths.is_empty() {
        bail!(
            "no annotation exports found for the {} split",
            split.as_str()
        );
    }

    let segmenter = TextSegmenter::new()?;
    let gold = build_gold_store(&paths, &segmenter)?;

    write_json_pretty(&gold_path, &gold)?;
    info!(
        split = split.as_str(),
        timeline_count = gold.len(),
        path = %gold_path.display(),
        "saved processed annotations"
    );

    Ok(())
}

pub fn build_gold_store(paths: &[PathBuf], segmenter: &TextSegmenter) -> Result<GoldStore> {
    let mut store = GoldStore::new();

    for path in paths {
        let raw: RawTimeline = read_json(path)
            .with_context(|| format!("failed to load annotation export {}", path.display()))?;
        let timeline = process_annotated_data(&raw, segmenter)
            .with_context(|| format!("failed to normalize {}", path.display()))?;

        let timeline_id = raw.timeline_id.trim().to_string();
        if store.insert(timeline_id.clone(), timeline).is_some() {
            warn!(timeline_id = %timeline_id, path = %path.display(), "duplicate timeline export");
        }
    }

    if store.len() != paths.len() {
        bail!(
            "expected {} gold timelines but built {}",
            paths.len(),
            store.len()
        );
    }

    Ok(store)
}
