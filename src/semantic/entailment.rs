use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;

use super::EntailmentModel;
use crate::text::TextSegmenter;

const NEGATION_CUES: &[&str] = &[
    "not", "no", "never", "nothing", "nobody", "none", "neither", "nor", "cannot", "without",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "am", "it", "its", "this",
    "that", "these", "those", "i", "me", "my", "we", "our", "you", "your", "he", "him", "his",
    "she", "her", "they", "them", "their", "do", "does", "did", "has", "have", "had", "so",
    "very", "just", "also", "about", "into", "than", "then", "there", "here", "who", "which",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NliDistribution {
    pub entailment: f64,
    pub neutral: f64,
    pub contradiction: f64,
}

impl NliDistribution {
    /// Softmax over (entailment, neutral, contradiction) logits.
    pub fn from_logits(entailment: f64, neutral: f64, contradiction: f64) -> Self {
        let max = entailment.max(neutral).max(contradiction);
        let e = (entailment - max).exp();
        let n = (neutral - max).exp();
        let c = (contradiction - max).exp();
        let total = e + n + c;

        Self {
            entailment: e / total,
            neutral: n / total,
            contradiction: c / total,
        }
    }
}

/// Lexical stand-in for an NLI classifier.
///
/// Entailment grows with how much of the hypothesis's content vocabulary the
/// premise covers; a negation-polarity mismatch on a covered hypothesis flips
/// that mass to contradiction.
#[derive(Debug, Clone)]
pub struct LexicalEntailment {
    segmenter: TextSegmenter,
}

impl LexicalEntailment {
    pub fn new(segmenter: TextSegmenter) -> Self {
        Self { segmenter }
    }
}

impl EntailmentModel for LexicalEntailment {
    fn predict(&self, premise: &str, hypothesis: &str) -> Result<NliDistribution> {
        let premise_words = self.segmenter.words(premise);
        let hypothesis_words = self.segmenter.words(hypothesis);

        let premise_vocab = premise_words
            .iter()
            .filter(|word| !is_negation(word))
            .map(String::as_str)
            .collect::<HashSet<&str>>();
        let hypothesis_content = content_words(&hypothesis_words);

        let coverage = if hypothesis_content.is_empty() {
            0.0
        } else {
            let covered = hypothesis_content
                .iter()
                .filter(|word| premise_vocab.contains(*word))
                .count();
            covered as f64 / hypothesis_content.len() as f64
        };

        let polarity_mismatch =
            negation_count(&premise_words) % 2 != negation_count(&hypothesis_words) % 2;

        let support = 6.0 * coverage - 3.0;
        let (entailment, contradiction) = if polarity_mismatch {
            (support - 6.0, support)
        } else {
            (support, -3.0)
        };

        Ok(NliDistribution::from_logits(entailment, 0.0, contradiction))
    }
}

fn is_negation(word: &str) -> bool {
    NEGATION_CUES.contains(&word) || word.ends_with("n't")
}

fn negation_count(words: &[String]) -> usize {
    words.iter().filter(|word| is_negation(word)).count()
}

fn content_words(words: &[String]) -> Vec<&str> {
    let without_negation = words
        .iter()
        .map(String::as_str)
        .filter(|word| !is_negation(word))
        .collect::<Vec<&str>>();

    let content = without_negation
        .iter()
        .copied()
        .filter(|word| !STOPWORDS.contains(word))
        .collect::<Vec<&str>>();

    if content.is_empty() {
        without_negation
    } else {
        content
    }
}
