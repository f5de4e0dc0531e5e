use anyhow::Result;
use tracing::debug;

use super::{max, mean};
use crate::model::{Metric, Task};
use crate::semantic::{SpanSimilarity, TokenCounter};

pub const RECALL_METRIC: &str = "bertscore_recall";
pub const WEIGHTED_RECALL_METRIC: &str = "bertscore_weighted_recall";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanScores {
    pub recall: f64,
    pub weighted_recall: f64,
}

impl SpanScores {
    pub const EMPTY_PREDICTION: Self = Self {
        recall: 0.0,
        weighted_recall: 0.0,
    };

    pub fn into_metrics(self) -> Vec<Metric> {
        vec![
            Metric::new(RECALL_METRIC, Task::A1, self.recall),
            Metric::new(WEIGHTED_RECALL_METRIC, Task::A1, self.weighted_recall),
        ]
    }
}

/// Down-weights predictions that use more tokens than the gold evidence.
pub fn verbosity_weight(gold_tokens: usize, predicted_tokens: usize) -> f64 {
    if gold_tokens < predicted_tokens {
        gold_tokens as f64 / predicted_tokens as f64
    } else {
        1.0
    }
}

/// Recall-oriented evidence span scoring (task A.1).
pub struct SpanScorer<'a> {
    similarity: &'a dyn SpanSimilarity,
    tokenizer: &'a dyn TokenCounter,
}

impl<'a> SpanScorer<'a> {
    pub fn new(similarity: &'a dyn SpanSimilarity, tokenizer: &'a dyn TokenCounter) -> Self {
        Self {
            similarity,
            tokenizer,
        }
    }

    /// Scores predicted spans against gold spans.
    ///
    /// Returns `None` when there is no gold evidence to recall but something
    /// was predicted; an empty prediction always scores zero.
    pub fn score(
        &self,
        gold_spans: &[String],
        predicted_spans: &[String],
    ) -> Result<Option<SpanScores>> {
        let gold = clean_spans(gold_spans);
        let predicted = clean_spans(predicted_spans);

        if predicted.is_empty() {
            return Ok(Some(SpanScores::EMPTY_PREDICTION));
        }
        if gold.is_empty() {
            debug!(
                predicted = predicted.len(),
                "no gold evidence spans; skipping span scoring"
            );
            return Ok(None);
        }

        let gold_tokens = self.count_tokens(&gold)?;
        let predicted_tokens = self.count_tokens(&predicted)?;
        let weight = verbosity_weight(gold_tokens, predicted_tokens);

        let mut recalls = Vec::with_capacity(gold.len());
        let mut weighted = Vec::with_capacity(gold.len());
        for gold_span in &gold {
            let scores = self.similarity.f_scores(&predicted, gold_span)?;
            let best = max(&scores).unwrap_or(0.0);
            recalls.push(best);
            weighted.push(best * weight);
        }

        Ok(Some(SpanScores {
            recall: mean(&recalls).unwrap_or_default(),
            weighted_recall: mean(&weighted).unwrap_or_default(),
        }))
    }

    pub fn compute_span_metrics(
        &self,
        gold_spans: &[String],
        predicted_spans: &[String],
    ) -> Result<Vec<Metric>> {
        Ok(self
            .score(gold_spans, predicted_spans)?
            .map(SpanScores::into_metrics)
            .unwrap_or_default())
    }

    fn count_tokens(&self, spans: &[String]) -> Result<usize> {
        spans.iter().try_fold(0usize, |total, span| {
            Ok(total + self.tokenizer.count_tokens(span)?)
        })
    }
}

fn clean_spans(spans: &[String]) -> Vec<String> {
    spans
        .iter()
        .map(|span| span.trim())
        .filter(|span| !span.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
