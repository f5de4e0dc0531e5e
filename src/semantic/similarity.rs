use anyhow::Result;

use super::{SpanSimilarity, cosine_similarity, normalize_vector, stable_hash};
use crate::text::TextSegmenter;

/// Greedy-matching BERTScore over hashed character-trigram token embeddings.
///
/// Every word of the candidate is matched to its most similar word in the
/// reference (precision) and vice versa (recall); the F-score is their
/// harmonic mean. With a baseline `b` the score is rescaled to
/// `(f - b) / (1 - b)`.
#[derive(Debug, Clone)]
pub struct HashedBertScore {
    segmenter: TextSegmenter,
    dimensions: usize,
    baseline: Option<f64>,
}

impl HashedBertScore {
    pub fn new(segmenter: TextSegmenter, dimensions: usize, baseline: Option<f64>) -> Self {
        Self {
            segmenter,
            dimensions: dimensions.max(8),
            baseline,
        }
    }

    fn embed_tokens(&self, text: &str) -> Vec<Vec<f32>> {
        self.segmenter
            .words(text)
            .iter()
            .map(|word| embed_token(word, self.dimensions))
            .collect()
    }

    fn rescale(&self, score: f64) -> f64 {
        match self.baseline {
            Some(baseline) if baseline < 1.0 => (score - baseline) / (1.0 - baseline),
            _ => score,
        }
    }
}

impl SpanSimilarity for HashedBertScore {
    fn f_score(&self, candidate: &str, reference: &str) -> Result<f64> {
        let candidate_tokens = self.embed_tokens(candidate);
        let reference_tokens = self.embed_tokens(reference);

        if candidate_tokens.is_empty() || reference_tokens.is_empty() {
            return Ok(self.rescale(0.0));
        }

        let precision = greedy_match_mean(&candidate_tokens, &reference_tokens);
        let recall = greedy_match_mean(&reference_tokens, &candidate_tokens);
        let f_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(self.rescale(f_score))
    }
}

fn greedy_match_mean(from: &[Vec<f32>], to: &[Vec<f32>]) -> f64 {
    let total = from
        .iter()
        .map(|token| {
            to.iter()
                .map(|other| cosine_similarity(token, other))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .sum::<f64>();
    total / from.len() as f64
}

fn embed_token(token: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0_f32; dimensions];
    let padded = format!("#{token}#").chars().collect::<Vec<char>>();

    let grams = if padded.len() <= 3 {
        vec![padded.iter().collect::<String>()]
    } else {
        padded
            .windows(3)
            .map(|window| window.iter().collect::<String>())
            .collect::<Vec<String>>()
    };

    for gram in grams {
        let hash = stable_hash(&gram);
        let index = (hash as usize) % dimensions;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }

    normalize_vector(&mut vector);
    vector
}
