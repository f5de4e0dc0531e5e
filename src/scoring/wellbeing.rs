use anyhow::{Result, bail};
use tracing::debug;

use crate::model::{Metric, Task, WELLBEING_MAX, WELLBEING_MIN};

pub const MSE_METRIC: &str = "mse";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellbeingBin {
    pub label: &'static str,
    pub min: i64,
    pub max: i64,
}

impl WellbeingBin {
    fn contains(&self, score: i64) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Mean squared error of wellbeing scores (task A.2).
#[derive(Debug, Clone)]
pub struct WellbeingScorer {
    max_possible_error: i64,
    bins: Vec<WellbeingBin>,
}

impl Default for WellbeingScorer {
    fn default() -> Self {
        Self {
            max_possible_error: WELLBEING_MAX - WELLBEING_MIN,
            bins: vec![
                WellbeingBin {
                    label: "serious",
                    min: 1,
                    max: 4,
                },
                WellbeingBin {
                    label: "impaired",
                    min: 5,
                    max: 6,
                },
                WellbeingBin {
                    label: "minimal",
                    min: 7,
                    max: 10,
                },
            ],
        }
    }
}

impl WellbeingScorer {
    /// MSE over one batch of posts.
    ///
    /// Posts without a gold score are ignored. A missing prediction is either
    /// dropped (`penalize == false`) or replaced by `gold + e`, where `e` is the
    /// largest absolute error among the batch's answered posts, or the full
    /// score range when nothing in the batch was answered. With `binwise`
    /// the same pairs are also scored per severity bin; empty bins emit
    /// nothing.
    pub fn compute_mse(
        &self,
        y_true: &[Option<i64>],
        y_pred: &[Option<i64>],
        penalize: bool,
        binwise: bool,
    ) -> Result<Vec<Metric>> {
        if y_true.len() != y_pred.len() {
            bail!(
                "wellbeing batch length mismatch: {} gold vs {} predicted",
                y_true.len(),
                y_pred.len()
            );
        }

        let (trues, preds) = self.prepare_pairs(y_true, y_pred, penalize);
        let mut metrics = Vec::new();

        let Some(mse) = mean_squared_error(&trues, &preds) else {
            debug!(
                posts = y_true.len(),
                penalize, "no scorable wellbeing pairs in batch"
            );
            return Ok(metrics);
        };
        metrics.push(Metric::new(MSE_METRIC, Task::A2, mse));

        if binwise {
            for bin in &self.bins {
                let (bin_trues, bin_preds): (Vec<i64>, Vec<i64>) = trues
                    .iter()
                    .zip(preds.iter())
                    .filter(|(gold, _)| bin.contains(**gold))
                    .map(|(gold, pred)| (*gold, *pred))
                    .unzip();

                if let Some(bin_mse) = mean_squared_error(&bin_trues, &bin_preds) {
                    metrics.push(Metric::new(
                        format!("{MSE_METRIC}_{}", bin.label),
                        Task::A2,
                        bin_mse,
                    ));
                }
            }
        }

        Ok(metrics)
    }

    fn prepare_pairs(
        &self,
        y_true: &[Option<i64>],
        y_pred: &[Option<i64>],
        penalize: bool,
    ) -> (Vec<i64>, Vec<i64>) {
        let annotated = y_true
            .iter()
            .zip(y_pred.iter())
            .filter_map(|(gold, pred)| gold.map(|gold| (gold, *pred)))
            .collect::<Vec<(i64, Option<i64>)>>();

        if !penalize {
            return annotated
                .into_iter()
                .filter_map(|(gold, pred)| pred.map(|pred| (gold, pred)))
                .unzip();
        }

        let max_observed_error = annotated
            .iter()
            .filter_map(|(gold, pred)| pred.map(|pred| (gold - pred).abs()))
            .max();
        let penalty = max_observed_error.unwrap_or(self.max_possible_error);

        annotated
            .into_iter()
            .map(|(gold, pred)| (gold, pred.unwrap_or(gold + penalty)))
            .unzip()
    }
}

fn mean_squared_error(trues: &[i64], preds: &[i64]) -> Option<f64> {
    if trues.is_empty() {
        return None;
    }

    let total = trues
        .iter()
        .zip(preds.iter())
        .map(|(gold, pred)| {
            let error = (gold - pred) as f64;
            error * error
        })
        .sum::<f64>();
    Some(total / trues.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(metrics: &[Metric], name: &str) -> Option<f64> {
        metrics
            .iter()
            .find(|metric| metric.name == name)
            .map(|metric| metric.value)
    }

    #[test]
    fn all_missing_predictions_are_penalized_by_full_range() {
        let scorer = WellbeingScorer::default();
        let metrics = scorer
            .compute_mse(&[Some(3), Some(5), Some(8)], &[None, None, None], true, false)
            .expect("mse");

        let expected = mean_squared_error(&[3, 5, 8], &[12, 14, 17]).expect("reference mse");
        assert_eq!(expected, 81.0);
        assert_eq!(value_of(&metrics, "mse"), Some(expected));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn partial_missing_predictions_use_max_observed_error() {
        let scorer = WellbeingScorer::default();
        // Observed errors: |2-4| = 2, |9-8| = 1, so the missing post becomes 6 + 2.
        let metrics = scorer
            .compute_mse(
                &[Some(2), Some(9), Some(6)],
                &[Some(4), Some(8), None],
                true,
                false,
            )
            .expect("mse");
        let expected = (4.0 + 1.0 + 4.0) / 3.0;
        assert!((value_of(&metrics, "mse").expect("mse") - expected).abs() < 1e-12);
    }

    #[test]
    fn lenient_mode_drops_missing_predictions() {
        let scorer = WellbeingScorer::default();
        let metrics = scorer
            .compute_mse(
                &[Some(2), Some(9), Some(6)],
                &[Some(4), Some(8), None],
                false,
                false,
            )
            .expect("mse");
        assert_eq!(value_of(&metrics, "mse"), Some(2.5));
    }

    #[test]
    fn unannotated_gold_is_ignored() {
        let scorer = WellbeingScorer::default();
        let metrics = scorer
            .compute_mse(&[None, Some(5)], &[Some(1), Some(7)], true, false)
            .expect("mse");
        assert_eq!(value_of(&metrics, "mse"), Some(4.0));
    }

    #[test]
    fn binwise_skips_bins_without_gold_members() {
        let scorer = WellbeingScorer::default();
        let metrics = scorer
            .compute_mse(
                &[Some(2), Some(3), Some(8)],
                &[Some(2), Some(5), Some(10)],
                true,
                true,
            )
            .expect("mse");

        assert_eq!(value_of(&metrics, "mse_serious"), Some(2.0));
        assert_eq!(value_of(&metrics, "mse_minimal"), Some(4.0));
        assert_eq!(value_of(&metrics, "mse_impaired"), None);
        assert!(metrics.iter().all(|metric| metric.task == Task::A2));
    }

    #[test]
    fn binwise_uses_penalized_predictions() {
        let scorer = WellbeingScorer::default();
        let metrics = scorer
            .compute_mse(&[Some(5), Some(7)], &[None, Some(9)], true, true)
            .expect("mse");

        // Missing impaired post becomes 5 + 2.
        assert_eq!(value_of(&metrics, "mse_impaired"), Some(4.0));
        assert_eq!(value_of(&metrics, "mse_minimal"), Some(4.0));
        assert_eq!(value_of(&metrics, "mse"), Some(4.0));
    }

    #[test]
    fn empty_batch_emits_no_metrics() {
        let scorer = WellbeingScorer::default();
        assert!(
            scorer
                .compute_mse(&[None, None], &[Some(3), None], true, true)
                .expect("mse")
                .is_empty()
        );
        assert!(
            scorer
                .compute_mse(&[Some(4)], &[None], false, true)
                .expect("mse")
                .is_empty()
        );
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let scorer = WellbeingScorer::default();
        let error = scorer
            .compute_mse(&[Some(1)], &[], true, false)
            .expect_err("mismatched lengths should fail");
        assert!(error.to_string().contains("length mismatch"));
    }

    #[test]
    fn default_bins_cover_score_range() {
        let scorer = WellbeingScorer::default();
        for score in WELLBEING_MIN..=WELLBEING_MAX {
            let hits = scorer.bins.iter().filter(|bin| bin.contains(score)).count();
            assert_eq!(hits, 1, "score {score} should fall in exactly one bin");
        }
    }
}
