use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

use crate::model::{
    EvidenceSpan, GoldPost, GoldTimeline, GoldTimelineLevel, RawEvidenceElement, RawTimeline,
    ScoreReading,
};
use crate::text::TextSegmenter;

/// Canonical gold record for one raw timeline export.
///
/// Unannotated exports produce empty summaries, empty span lists and absent
/// wellbeing scores rather than errors.
pub fn process_annotated_data(raw: &RawTimeline, segmenter: &TextSegmenter) -> Result<GoldTimeline> {
    let timeline_id = raw.timeline_id.trim();
    let summary = raw
        .timeline_summary
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    let summary_sents = segmenter.sentences(&summary);

    let mut adaptive_spans = Vec::new();
    let mut maladaptive_spans = Vec::new();
    let mut sents = Vec::with_capacity(raw.posts.len());
    let mut post_ids = Vec::with_capacity(raw.posts.len());
    let mut post_level = BTreeMap::new();

    for post in &raw.posts {
        let post_id = post.post_id.trim().to_string();
        post_ids.push(post_id.clone());
        sents.push(segmenter.sentences(post.post.as_deref().unwrap_or_default()));

        let post_summary = post
            .post_summary
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();
        let post_summary_sents = segmenter.sentences(&post_summary);

        if let Some(evidence) = &post.evidence {
            adaptive_spans.extend(
                collect_spans(&evidence.adaptive)
                    .with_context(|| format!("invalid adaptive evidence in post {post_id}"))?,
            );
            maladaptive_spans.extend(
                collect_spans(&evidence.maladaptive)
                    .with_context(|| format!("invalid maladaptive evidence in post {post_id}"))?,
            );
        }

        let reading = ScoreReading::from_json(Some(&post.wellbeing));
        let wellbeing_score = reading.score();
        if wellbeing_score.is_none() && reading != ScoreReading::Missing {
            warn!(
                timeline_id,
                post_id = %post_id,
                reading = ?reading,
                "gold wellbeing score unusable; treated as unannotated"
            );
        }

        post_level.insert(
            post_id,
            GoldPost {
                summary: post_summary,
                summary_sents: post_summary_sents,
                wellbeing_score,
            },
        );
    }

    Ok(GoldTimeline {
        timeline_level: GoldTimelineLevel {
            summary,
            summary_sents,
            adaptive_spans,
            maladaptive_spans,
            sents,
            post_ids,
        },
        post_level,
    })
}

fn collect_spans(elements: &Map<String, Value>) -> Result<Vec<EvidenceSpan>> {
    elements
        .iter()
        .map(|(element, value)| {
            let parsed: RawEvidenceElement = serde_json::from_value(value.clone())
                .with_context(|| format!("evidence element {element} is malformed"))?;
            Ok(EvidenceSpan {
                text: parsed.highlighted_evidence,
                element: element.clone(),
                subcategory: parsed.category,
            })
        })
        .collect()
}
