use super::*;

/// Which tasks a run evaluates; no explicit selection means all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTasks {
    pub a1: bool,
    pub a2: bool,
    pub b: bool,
    pub c: bool,
}

impl ActiveTasks {
    pub const ALL: Self = Self {
        a1: true,
        a2: true,
        b: true,
        c: true,
    };

    pub fn from_args(tasks: &[TaskArg]) -> Self {
        if tasks.is_empty() {
            return Self::ALL;
        }

        let selected = tasks.iter().map(|task| task.task()).collect::<Vec<Task>>();
        Self {
            a1: selected.contains(&Task::A1),
            a2: selected.contains(&Task::A2),
            b: selected.contains(&Task::B),
            c: selected.contains(&Task::C),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        [
            (self.a1, Task::A1),
            (self.a2, Task::A2),
            (self.b, Task::B),
            (self.c, Task::C),
        ]
        .into_iter()
        .filter(|(active, _)| *active)
        .map(|(_, task)| task)
        .collect()
    }

    pub fn labels(&self) -> String {
        self.tasks()
            .iter()
            .map(|task| task.as_str())
            .collect::<Vec<&str>>()
            .join(",")
    }
}

/// The three scorers plus the segmenter, built once per run over shared backends.
pub struct Scorers<'a> {
    pub span: SpanScorer<'a>,
    pub wellbeing: WellbeingScorer,
    pub consistency: ConsistencyScorer<'a>,
    pub segmenter: &'a TextSegmenter,
}

impl<'a> Scorers<'a> {
    pub fn new(models: &'a ModelSuite, segmenter: &'a TextSegmenter) -> Self {
        Self::from_parts(
            models.similarity.as_ref(),
            models.tokenizer.as_ref(),
            models.entailment.as_ref(),
            segmenter,
        )
    }

    pub fn from_parts(
        similarity: &'a dyn SpanSimilarity,
        tokenizer: &'a dyn TokenCounter,
        entailment: &'a dyn EntailmentModel,
        segmenter: &'a TextSegmenter,
    ) -> Self {
        Self {
            span: SpanScorer::new(similarity, tokenizer),
            wellbeing: WellbeingScorer::default(),
            consistency: ConsistencyScorer::new(entailment),
            segmenter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMetrics {
    pub timeline_id: String,
    pub metrics: Vec<Metric>,
}

/// Predictions for one timeline gathered in gold post order.
struct AlignedPredictions<'p> {
    posts: Vec<&'p PredictedPost>,
    adaptive: Vec<String>,
    maladaptive: Vec<String>,
    wellbeing: Vec<Option<i64>>,
    summary_sents: Vec<Vec<String>>,
}

/// Scores one submission against every gold timeline.
///
/// Gold drives the iteration: timelines or posts missing from the
/// submission are scored as empty predictions, never skipped.
pub fn score_submission(
    submission: &Submission,
    gold: &GoldStore,
    tasks: &ActiveTasks,
    scorers: &Scorers<'_>,
    evidence_consistency: bool,
) -> Result<Vec<TimelineMetrics>> {
    let empty_timeline = PredictedTimeline::default();
    let mut results = Vec::with_capacity(gold.len());

    for (timeline_id, gold_timeline) in gold {
        let predicted = submission.timelines.get(timeline_id).unwrap_or_else(|| {
            warn!(timeline_id = %timeline_id, "no predictions for timeline; scoring as empty");
            &empty_timeline
        });

        let metrics = score_timeline(gold_timeline, predicted, tasks, scorers, evidence_consistency)
            .with_context(|| format!("failed to score timeline {timeline_id}"))?;
        debug!(
            timeline_id = %timeline_id,
            metric_count = metrics.len(),
            "scored timeline"
        );

        results.push(TimelineMetrics {
            timeline_id: timeline_id.clone(),
            metrics,
        });
    }

    Ok(results)
}

fn score_timeline(
    gold: &GoldTimeline,
    predicted: &PredictedTimeline,
    tasks: &ActiveTasks,
    scorers: &Scorers<'_>,
    evidence_consistency: bool,
) -> Result<Vec<Metric>> {
    let level = &gold.timeline_level;
    let aligned = align_posts(level, predicted, scorers.segmenter);
    let mut metrics = Vec::new();

    if tasks.a1 {
        let gold_adaptive = span_texts(&level.adaptive_spans);
        let gold_maladaptive = span_texts(&level.maladaptive_spans);

        let adaptive = scorers
            .span
            .compute_span_metrics(&gold_adaptive, &aligned.adaptive)?;
        let maladaptive = scorers
            .span
            .compute_span_metrics(&gold_maladaptive, &aligned.maladaptive)?;

        metrics.extend(adaptive.iter().cloned());
        metrics.extend(maladaptive.iter().cloned());
        metrics.extend(adaptive.iter().map(|metric| metric.with_suffix("adaptive")));
        metrics.extend(maladaptive.iter().map(|metric| metric.with_suffix("maladaptive")));
    }

    if tasks.a2 {
        let gold_scores = level
            .post_ids
            .iter()
            .map(|post_id| {
                gold.post_level
                    .get(post_id)
                    .and_then(|post| post.wellbeing_score)
            })
            .collect::<Vec<Option<i64>>>();
        metrics.extend(
            scorers
                .wellbeing
                .compute_mse(&gold_scores, &aligned.wellbeing, true, true)?,
        );
    }

    if tasks.b {
        for (index, post_id) in level.post_ids.iter().enumerate() {
            let predicted_sents = &aligned.summary_sents[index];

            if let Some(gold_post) = gold.post_level.get(post_id)
                && !gold_post.summary_sents.is_empty()
            {
                metrics.extend(
                    scorers
                        .consistency
                        .post_against_gold(&gold_post.summary_sents, predicted_sents)?,
                );
            }

            if evidence_consistency && !predicted_sents.is_empty() {
                let post = aligned.posts[index];
                let premises = clean_texts(
                    post.adaptive_evidence
                        .iter()
                        .chain(post.maladaptive_evidence.iter()),
                );
                if premises.is_empty() {
                    debug!(post_id = %post_id, "no predicted evidence; skipping evidence consistency");
                } else {
                    metrics.extend(
                        scorers
                            .consistency
                            .summary_against_evidence(&premises, predicted_sents)?,
                    );
                }
            }
        }
    }

    if tasks.c && !level.summary_sents.is_empty() {
        let predicted_sents = predicted
            .summary
            .as_deref()
            .map(|summary| scorers.segmenter.sentences(summary))
            .unwrap_or_default();
        metrics.extend(
            scorers
                .consistency
                .timeline_against_gold(&level.summary_sents, &predicted_sents)?,
        );
    }

    Ok(metrics)
}

fn align_posts<'p>(
    level: &GoldTimelineLevel,
    predicted: &'p PredictedTimeline,
    segmenter: &TextSegmenter,
) -> AlignedPredictions<'p> {
    static EMPTY_POST: PredictedPost = PredictedPost {
        adaptive_evidence: Vec::new(),
        maladaptive_evidence: Vec::new(),
        summary: String::new(),
        wellbeing_score: None,
    };

    let mut aligned = AlignedPredictions {
        posts: Vec::with_capacity(level.post_ids.len()),
        adaptive: Vec::new(),
        maladaptive: Vec::new(),
        wellbeing: Vec::with_capacity(level.post_ids.len()),
        summary_sents: Vec::with_capacity(level.post_ids.len()),
    };

    for post_id in &level.post_ids {
        let post = predicted.posts.get(post_id).unwrap_or(&EMPTY_POST);
        aligned.adaptive.extend(post.adaptive_evidence.iter().cloned());
        aligned.maladaptive.extend(post.maladaptive_evidence.iter().cloned());
        aligned.wellbeing.push(post.wellbeing_score);
        aligned.summary_sents.push(segmenter.sentences(&post.summary));
        aligned.posts.push(post);
    }

    aligned
}

fn span_texts(spans: &[EvidenceSpan]) -> Vec<String> {
    spans.iter().map(|span| span.text.clone()).collect()
}

fn clean_texts<'t>(texts: impl Iterator<Item = &'t String>) -> Vec<String> {
    texts
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Flattens per-timeline metrics into result rows tagged with the submitter.
pub fn flatten_results(results: Vec<TimelineMetrics>, submitter: &Submitter) -> Vec<MetricRow> {
    results
        .into_iter()
        .flat_map(|timeline| {
            let timeline_id = timeline.timeline_id;
            timeline
                .metrics
                .into_iter()
                .map(move |metric| MetricRow {
                    timeline_id: timeline_id.clone(),
                    metric: metric.name,
                    task: metric.task,
                    value: metric.value,
                    team_name: submitter.team_name.clone(),
                    submission_id: submitter.submission_id.clone(),
                })
        })
        .collect()
}
