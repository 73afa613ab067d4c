// src/analyzer/lexicon.rs
//! Lexical sentiment scoring.
//!
//! Placeholder strategy behind a stable contract: text in, score in [-1, 1],
//! magnitude in [0, 1], label from the fixed thresholds. A calibrated model
//! can replace the lexicon without touching anything downstream.

use crate::types::SentimentLabel;
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashMap;

/// Lexicon values live in -3..=3; normalization divides by this cap.
const LEXICON_CAP: f32 = 3.0;
/// Bounded random jitter applied on the live path.
const JITTER: f32 = 0.08;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub score: f32,
    pub magnitude: f32,
    pub label: SentimentLabel,
}

#[inline]
fn word_score(w: &str) -> i32 {
    *LEXICON.get(w).unwrap_or(&0)
}

/// Deterministic lexicon pass. Negation: a negator within the 1..=3
/// preceding tokens inverts the sign of a matched word.
pub fn score_text(text: &str) -> SentimentScore {
    let tokens: Vec<String> = tokenize(text).collect();
    let mut sum: i32 = 0;
    let mut hits: u32 = 0;

    for i in 0..tokens.len() {
        let base = word_score(tokens[i].as_str());
        if base == 0 {
            continue;
        }
        let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
        sum += if negated { -base } else { base };
        hits += 1;
    }

    let score = if hits == 0 {
        0.0
    } else {
        (sum as f32 / (hits as f32 * LEXICON_CAP)).clamp(-1.0, 1.0)
    };

    let density = if tokens.is_empty() {
        0.0
    } else {
        (hits as f32 / tokens.len() as f32).min(1.0)
    };
    let magnitude = (score.abs() * 0.7 + density * 0.3).clamp(0.0, 1.0);

    SentimentScore {
        score,
        magnitude,
        label: SentimentLabel::from_score(score),
    }
}

/// Live path: lexicon score plus bounded jitter. The jitter stands in for
/// model variance; tests use [`score_text`] directly.
pub fn score_text_jittered(text: &str) -> SentimentScore {
    let base = score_text(text);
    if base.score == 0.0 && base.magnitude == 0.0 {
        return base;
    }
    let mut rng = rand::rng();
    let score = (base.score + rng.random_range(-JITTER..=JITTER)).clamp(-1.0, 1.0);
    SentimentScore {
        score,
        magnitude: base.magnitude,
        label: SentimentLabel::from_score(score),
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "cannot" | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullish_text_scores_positive() {
        let s = score_text("$AAPL breaking out, bullish!");
        assert!(s.score > 0.2, "score {}", s.score);
        assert!(matches!(
            s.label,
            SentimentLabel::Positive | SentimentLabel::VeryPositive
        ));
        assert!(s.magnitude > 0.0);
    }

    #[test]
    fn bearish_text_scores_negative() {
        let s = score_text("total collapse incoming, bearish, expect a crash");
        assert!(s.score < -0.6);
        assert_eq!(s.label, SentimentLabel::VeryNegative);
    }

    #[test]
    fn negation_inverts_polarity() {
        let pos = score_text("this stock is strong");
        let neg = score_text("this stock is not strong");
        assert!(pos.score > 0.0);
        assert!(neg.score < 0.0);
    }

    #[test]
    fn text_without_lexicon_hits_is_neutral() {
        let s = score_text("the meeting is scheduled for tuesday");
        assert_eq!(s.score, 0.0);
        assert_eq!(s.label, SentimentLabel::Neutral);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..50 {
            let s = score_text_jittered("strong rally, bullish momentum");
            assert!((-1.0..=1.0).contains(&s.score));
        }
    }
}
