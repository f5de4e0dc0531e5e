use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::cli::DummyArgs;
use crate::config::{Split, Workspace};
use crate::model::{RawTimeline, WELLBEING_MAX, WELLBEING_MIN};
use crate::text::TextSegmenter;
use crate::util::{read_json, write_json_pretty};

const LONG_POST_CHARS: usize = 100;

pub fn run(workspace: &Workspace, args: DummyArgs) -> Result<()> {
    let split = Split::from_test_flag(args.test);
    let dummy_path = workspace
        .submissions_dir(split)
        .join(format!("dummy_{}.json", split.as_str()));

    if dummy_path.exists() {
        info!(path = %dummy_path.display(), "dummy submission already exists");
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
    let mut rng = XorShiftRng::new(args.seed);
    let mut submission = Map::new();

    for path in &paths {
        let raw: RawTimeline = read_json(path)?;
        submission.insert(
            raw.timeline_id.trim().to_string(),
            dummy_timeline(&raw, &segmenter, &mut rng),
        );
    }

    if submission.len() != paths.len() {
        bail!(
            "expected {} dummy timelines but built {}",
            paths.len(),
            submission.len()
        );
    }

    write_json_pretty(&dummy_path, &Value::Object(submission))?;
    info!(
        path = %dummy_path.display(),
        timeline_count = paths.len(),
        seed = args.seed,
        "saved dummy submission"
    );

    Ok(())
}

fn dummy_timeline(raw: &RawTimeline, segmenter: &TextSegmenter, rng: &mut XorShiftRng) -> Value {
    let mut concatenated = String::new();
    let mut post_level = Map::new();

    for post in &raw.posts {
        let text = post.post.as_deref().unwrap_or_default();
        let length = text.chars().count();

        let (max_spans, span_length) = if length > LONG_POST_CHARS {
            (3, (10, 20))
        } else {
            (2, (1, length.saturating_sub(30).max(2)))
        };
        let adaptive = random_spans(
            text,
            rng.range_inclusive(1, max_spans),
            rng.range_inclusive(span_length.0, span_length.1),
            rng,
        );
        let maladaptive = random_spans(
            text,
            rng.range_inclusive(1, max_spans),
            rng.range_inclusive(span_length.0, span_length.1),
            rng,
        );

        let sentence_count = segmenter.sentences(text).len();
        let summary = random_sentences(text, sentence_count.max(3), segmenter, rng);
        let wellbeing = rng.range_inclusive(WELLBEING_MIN as usize, WELLBEING_MAX as usize);

        post_level.insert(
            post.post_id.trim().to_string(),
            json!({
                "adaptive_evidence": adaptive,
                "maladaptive_evidence": maladaptive,
                "summary": summary,
                "wellbeing_score": wellbeing,
            }),
        );

        concatenated.push_str(text);
        concatenated.push('\n');
    }

    json!({
        "timeline_level": {
            "summary": random_sentences(&concatenated, 3, segmenter, rng),
        },
        "post_level": post_level,
    })
}

/// `count` possibly overlapping character windows of `span_length`.
fn random_spans(text: &str, count: usize, span_length: usize, rng: &mut XorShiftRng) -> Vec<String> {
    let chars = text.chars().collect::<Vec<char>>();
    if chars.len() < span_length {
        return vec![text.to_string()];
    }

    (0..count)
        .map(|_| {
            let start = rng.range_inclusive(0, chars.len() - span_length);
            chars[start..start + span_length].iter().collect()
        })
        .collect()
}

fn random_sentences(
    text: &str,
    count: usize,
    segmenter: &TextSegmenter,
    rng: &mut XorShiftRng,
) -> String {
    let mut sentences = segmenter.sentences(text);
    if count >= sentences.len() {
        return text.to_string();
    }

    // Partial Fisher-Yates: the first `count` slots end up a uniform sample.
    for index in 0..count {
        let pick = rng.range_inclusive(index, sentences.len() - 1);
        sentences.swap(index, pick);
    }
    sentences.truncate(count);
    sentences.join(" ")
}

struct XorShiftRng(u64);

impl XorShiftRng {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    fn next_u64(&mut self) -> u64 {
        let mut state = self.0;
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.0 = state;
        state
    }

    fn range_inclusive(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        low + (self.next_u64() % (high - low + 1) as u64) as usize
    }
}
