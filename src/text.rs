use anyhow::{Context, Result};
use regex::Regex;

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "approx",
    "dept", "inc", "ltd", "jan", "feb", "apr", "aug", "sep", "sept", "oct", "nov",
];

/// Ordinary words that only abbreviate when a number follows ("No. 5", "Mar. 3").
const NUMBERED_ABBREVIATIONS: &[&str] = &["no", "est", "fig", "vol", "mar", "jun", "jul", "dec"];

/// Sentence and word segmentation shared by gold preparation, scoring and the
/// local model backends.
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    boundary: Regex,
    word_piece: Regex,
}

impl TextSegmenter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            boundary: Regex::new(r#"[.!?]+["')\]]*\s+"#)
                .context("failed to compile sentence boundary regex")?,
            word_piece: Regex::new(r"\w+(?:'\w+)?|[^\w\s]")
                .context("failed to compile word piece regex")?,
        })
    }

    /// Splits `text` into trimmed, non-empty sentences.
    pub fn sentences(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut start = 0usize;

        for boundary in self.boundary.find_iter(text) {
            let punctuated = boundary.as_str().trim_end();
            let split_at = boundary.start() + punctuated.len();
            if !self.is_sentence_break(text, start, boundary.start(), punctuated, boundary.end()) {
                continue;
            }

            push_trimmed(&mut out, &text[start..split_at]);
            start = boundary.end();
        }

        if start < text.len() {
            push_trimmed(&mut out, &text[start..]);
        }

        out
    }

    /// Word and punctuation pieces in reading order.
    pub fn word_pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.word_piece
            .find_iter(text)
            .map(|piece| piece.as_str())
            .collect()
    }

    /// Lowercased alphanumeric words, punctuation dropped.
    pub fn words(&self, text: &str) -> Vec<String> {
        self.word_pieces(text)
            .into_iter()
            .filter(|piece| piece.chars().any(char::is_alphanumeric))
            .map(str::to_lowercase)
            .collect()
    }

    fn is_sentence_break(
        &self,
        text: &str,
        sentence_start: usize,
        punct_start: usize,
        punctuated: &str,
        next_start: usize,
    ) -> bool {
        let next_char = text[next_start..].chars().next();
        if let Some(character) = next_char {
            if character.is_lowercase() {
                return false;
            }
        }

        if punctuated.trim_end_matches(['"', '\'', ')', ']']) != "." {
            return true;
        }

        let preceding = text[sentence_start..punct_start]
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .trim_start_matches(['(', '"', '\''])
            .to_lowercase();

        if preceding.chars().count() == 1 && preceding.chars().all(char::is_alphabetic) {
            return false;
        }

        if NUMBERED_ABBREVIATIONS.contains(&preceding.as_str()) {
            return !next_char.is_some_and(|character| character.is_ascii_digit());
        }

        !ABBREVIATIONS.contains(&preceding.as_str())
    }
}

fn push_trimmed(out: &mut Vec<String>, value: &str) {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> TextSegmenter {
        TextSegmenter::new().expect("segmenter should compile")
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences = segmenter().sentences("I feel lost. Nobody calls me!  Why bother? ok");
        assert_eq!(
            sentences,
            vec!["I feel lost.", "Nobody calls me!", "Why bother? ok"]
        );
    }

    #[test]
    fn sentences_keep_abbreviations_and_initials_together() {
        let sentences =
            segmenter().sentences("I saw Dr. Smith today. J. R. came too. It helped.");
        assert_eq!(
            sentences,
            vec!["I saw Dr. Smith today.", "J. R. came too.", "It helped."]
        );
    }

    #[test]
    fn sentences_include_closing_quotes() {
        let sentences = segmenter().sentences("She said \"stop.\" Then she left.");
        assert_eq!(sentences, vec!["She said \"stop.\"", "Then she left."]);
    }

    #[test]
    fn sentences_of_blank_text_are_empty() {
        assert!(segmenter().sentences("   \n ").is_empty());
        assert!(segmenter().sentences("").is_empty());
    }

    #[test]
    fn word_pieces_separate_punctuation_and_keep_contractions() {
        let pieces = segmenter().word_pieces("I don't care, really.");
        assert_eq!(pieces, vec!["I", "don't", "care", ",", "really", "."]);
    }

    #[test]
    fn common_words_ending_a_sentence_still_split() {
        let sentences = segmenter()
            .sentences("He asked if I was okay and I said no. Then I left. It was Mar. 3 again.");
        assert_eq!(
            sentences,
            vec![
                "He asked if I was okay and I said no.",
                "Then I left.",
                "It was Mar. 3 again."
            ]
        );
        assert_eq!(
            segmenter().sentences("See No. 5 below. Nothing else."),
            vec!["See No. 5 below.", "Nothing else."]
        );
    }
}
