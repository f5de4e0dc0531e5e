use anyhow::{Result, bail};

use super::{max, mean};
use crate::model::{Metric, Task};
use crate::semantic::EntailmentModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsistencyScores {
    pub mean_consistency: f64,
    pub max_entailment: f64,
    pub max_contradiction: f64,
}

impl ConsistencyScores {
    /// A missing summary counts as maximally inconsistent.
    pub const EMPTY_PREDICTION: Self = Self {
        mean_consistency: 0.0,
        max_entailment: 0.0,
        max_contradiction: 1.0,
    };
}

/// Which summary a consistency score describes; fixes the task and metric prefix.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SummaryLevel {
    Post,
    Timeline,
}

impl SummaryLevel {
    pub fn task(self) -> Task {
        match self {
            Self::Post => Task::B,
            Self::Timeline => Task::C,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Timeline => "timeline",
        }
    }
}

/// Entailment-based summary consistency (tasks B and C).
pub struct ConsistencyScorer<'a> {
    model: &'a dyn EntailmentModel,
}

impl<'a> ConsistencyScorer<'a> {
    pub fn new(model: &'a dyn EntailmentModel) -> Self {
        Self { model }
    }

    /// Scores every (source, predicted) sentence pair.
    ///
    /// Consistency is one minus the mean contradiction over the full cross
    /// product, so a single contradicting sentence lowers it even when the
    /// rest agree.
    pub fn score(&self, source_sents: &[String], predicted_sents: &[String]) -> Result<ConsistencyScores> {
        if predicted_sents.is_empty() {
            return Ok(ConsistencyScores::EMPTY_PREDICTION);
        }
        if source_sents.is_empty() {
            bail!("consistency scoring needs at least one source sentence");
        }

        let pair_count = source_sents.len() * predicted_sents.len();
        let mut entailment = Vec::with_capacity(pair_count);
        let mut contradiction = Vec::with_capacity(pair_count);

        for source in source_sents {
            for predicted in predicted_sents {
                let distribution = self.model.predict(source, predicted)?;
                entailment.push(distribution.entailment);
                contradiction.push(distribution.contradiction);
            }
        }

        Ok(ConsistencyScores {
            mean_consistency: 1.0 - mean(&contradiction).unwrap_or(1.0),
            max_entailment: max(&entailment).unwrap_or(0.0),
            max_contradiction: max(&contradiction).unwrap_or(1.0),
        })
    }

    pub fn compute_nli_metrics(
        &self,
        source_sents: &[String],
        predicted_sents: &[String],
        level: SummaryLevel,
        source_name: &str,
    ) -> Result<Vec<Metric>> {
        let scores = self.score(source_sents, predicted_sents)?;
        let prefix = level.prefix();
        let task = level.task();

        Ok(vec![
            Metric::new(
                format!("{prefix}_mean_consistency_{source_name}"),
                task,
                scores.mean_consistency,
            ),
            Metric::new(
                format!("{prefix}_max_entailment_{source_name}"),
                task,
                scores.max_entailment,
            ),
            Metric::new(
                format!("{prefix}_max_contradiction_{source_name}"),
                task,
                scores.max_contradiction,
            ),
        ])
    }

    pub fn post_against_gold(&self, gold_sents: &[String], predicted_sents: &[String]) -> Result<Vec<Metric>> {
        self.compute_nli_metrics(gold_sents, predicted_sents, SummaryLevel::Post, "gold")
    }

    pub fn timeline_against_gold(&self, gold_sents: &[String], predicted_sents: &[String]) -> Result<Vec<Metric>> {
        self.compute_nli_metrics(gold_sents, predicted_sents, SummaryLevel::Timeline, "gold")
    }

    /// Exploratory: does the predicted post summary follow from the predicted evidence?
    pub fn summary_against_evidence(&self, evidence_spans: &[String], summary_sents: &[String]) -> Result<Vec<Metric>> {
        self.compute_nli_metrics(evidence_spans, summary_sents, SummaryLevel::Post, "evidence")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{LexicalEntailment, NliDistribution};
    use crate::text::TextSegmenter;

    /// Contradicts whenever the hypothesis contains "never", entails otherwise.
    struct KeywordModel;

    impl EntailmentModel for KeywordModel {
        fn predict(&self, _premise: &str, hypothesis: &str) -> Result<NliDistribution> {
            Ok(if hypothesis.contains("never") {
                NliDistribution {
                    entailment: 0.1,
                    neutral: 0.1,
                    contradiction: 0.8,
                }
            } else {
                NliDistribution {
                    entailment: 0.7,
                    neutral: 0.2,
                    contradiction: 0.1,
                }
            })
        }
    }

    fn sents(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_prediction_is_maximally_inconsistent() {
        let scorer = ConsistencyScorer::new(&KeywordModel);
        let scores = scorer.score(&sents(&["gold."]), &[]).expect("score");
        assert_eq!(scores, ConsistencyScores::EMPTY_PREDICTION);
        assert_eq!(scores.mean_consistency, 0.0);
        assert_eq!(scores.max_entailment, 0.0);
        assert_eq!(scores.max_contradiction, 1.0);
    }

    #[test]
    fn one_contradicting_sentence_lowers_mean_consistency() {
        let scorer = ConsistencyScorer::new(&KeywordModel);
        let scores = scorer
            .score(
                &sents(&["g1", "g2"]),
                &sents(&["fine", "also fine", "never again"]),
            )
            .expect("score");

        // Contradictions per pair: [0.1, 0.1, 0.8] for each gold sentence.
        assert!((scores.mean_consistency - (1.0 - 1.0 / 3.0)).abs() < 1e-12);
        assert_eq!(scores.max_entailment, 0.7);
        assert_eq!(scores.max_contradiction, 0.8);
    }

    #[test]
    fn identical_summaries_are_consistent() {
        let model = LexicalEntailment::new(TextSegmenter::new().expect("segmenter"));
        let scorer = ConsistencyScorer::new(&model);
        let summary = sents(&["The poster describes feeling supported by friends."]);

        let scores = scorer.score(&summary, &summary).expect("score");
        assert!(scores.mean_consistency > 0.95, "{scores:?}");
        assert!(scores.max_contradiction < 0.05, "{scores:?}");
    }

    #[test]
    fn metric_names_follow_level_and_source() {
        let scorer = ConsistencyScorer::new(&KeywordModel);

        let timeline = scorer
            .timeline_against_gold(&sents(&["g"]), &sents(&["p"]))
            .expect("metrics");
        let names = timeline
            .iter()
            .map(|metric| metric.name.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(
            names,
            vec![
                "timeline_mean_consistency_gold",
                "timeline_max_entailment_gold",
                "timeline_max_contradiction_gold"
            ]
        );
        assert!(timeline.iter().all(|metric| metric.task == Task::C));

        let evidence = scorer
            .summary_against_evidence(&sents(&["span"]), &sents(&["p"]))
            .expect("metrics");
        assert_eq!(evidence[0].name, "post_mean_consistency_evidence");
        assert_eq!(evidence[0].task, Task::B);
    }

    #[test]
    fn missing_source_sentences_is_an_error() {
        let scorer = ConsistencyScorer::new(&KeywordModel);
        assert!(scorer.post_against_gold(&[], &sents(&["p"])).is_err());
    }
}
