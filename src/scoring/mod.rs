//! Per-task scoring of predictions against gold annotations.

mod consistency;
mod span;
mod wellbeing;

pub use consistency::ConsistencyScorer;
pub use span::SpanScorer;
pub use wellbeing::WellbeingScorer;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}
