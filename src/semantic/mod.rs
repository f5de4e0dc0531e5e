use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;
use crate::text::TextSegmenter;

mod entailment;
mod similarity;

pub use entailment::{LexicalEntailment, NliDistribution};
pub use similarity::HashedBertScore;

pub const DEFAULT_SIMILARITY_MODEL_ID: &str = "microsoft/deberta-xlarge-mnli";
pub const DEFAULT_NLI_MODEL_ID: &str = "MoritzLaurer/DeBERTa-v3-large-mnli-fever-anli-ling-wanli";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const SIMILARITY_BACKEND: &str = "local-hash-v1";
pub const TOKENIZER_BACKEND: &str = "local-regex-v1";
pub const NLI_BACKEND: &str = "local-lexical-v1";

/// Sub-word token count of a span, special tokens excluded.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// BERTScore-style F-score between a candidate and a reference.
pub trait SpanSimilarity {
    fn f_score(&self, candidate: &str, reference: &str) -> Result<f64>;

    fn f_scores(&self, candidates: &[String], reference: &str) -> Result<Vec<f64>> {
        candidates
            .iter()
            .map(|candidate| self.f_score(candidate, reference))
            .collect()
    }
}

/// Three-way natural-language-inference classifier.
pub trait EntailmentModel {
    fn predict(&self, premise: &str, hypothesis: &str) -> Result<NliDistribution>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_id: String,
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
}

pub fn resolve_model_config(
    model_id: &str,
    default_id: &str,
    backend: &str,
    baseline: Option<f64>,
) -> ModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() { default_id } else { trimmed };

    ModelConfig {
        model_id: resolved_id.to_string(),
        backend: backend.to_string(),
        baseline,
    }
}

/// Word-piece counter standing in for the similarity model's tokenizer.
#[derive(Debug, Clone)]
pub struct RegexTokenCounter {
    segmenter: TextSegmenter,
}

impl RegexTokenCounter {
    pub fn new(segmenter: TextSegmenter) -> Self {
        Self { segmenter }
    }
}

impl TokenCounter for RegexTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.segmenter.word_pieces(text).len())
    }
}

/// Backends loaded once per scoring run and shared by every comparison.
pub struct ModelSuite {
    pub similarity: Box<dyn SpanSimilarity>,
    pub tokenizer: Box<dyn TokenCounter>,
    pub entailment: Box<dyn EntailmentModel>,
    pub similarity_config: ModelConfig,
    pub tokenizer_config: ModelConfig,
    pub entailment_config: ModelConfig,
}

impl ModelSuite {
    pub fn load(settings: &ModelSettings, segmenter: &TextSegmenter) -> Result<Self> {
        let similarity_config = resolve_model_config(
            &settings.similarity_model_id,
            DEFAULT_SIMILARITY_MODEL_ID,
            &settings.similarity_backend,
            settings.bertscore_baseline,
        );
        let tokenizer_config = resolve_model_config(
            &settings.tokenizer_id,
            &similarity_config.model_id,
            &settings.tokenizer_backend,
            None,
        );
        let entailment_config = resolve_model_config(
            &settings.nli_model_id,
            DEFAULT_NLI_MODEL_ID,
            &settings.nli_backend,
            None,
        );

        let similarity: Box<dyn SpanSimilarity> = match similarity_config.backend.as_str() {
            SIMILARITY_BACKEND => Box::new(HashedBertScore::new(
                segmenter.clone(),
                DEFAULT_EMBEDDING_DIM,
                similarity_config.baseline,
            )),
            other => bail!("unsupported similarity backend: {other}"),
        };
        let tokenizer: Box<dyn TokenCounter> = match tokenizer_config.backend.as_str() {
            TOKENIZER_BACKEND => Box::new(RegexTokenCounter::new(segmenter.clone())),
            other => bail!("unsupported tokenizer backend: {other}"),
        };
        let entailment: Box<dyn EntailmentModel> = match entailment_config.backend.as_str() {
            NLI_BACKEND => Box::new(LexicalEntailment::new(segmenter.clone())),
            other => bail!("unsupported NLI backend: {other}"),
        };

        Ok(Self {
            similarity,
            tokenizer,
            entailment,
            similarity_config,
            tokenizer_config,
            entailment_config,
        })
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}
