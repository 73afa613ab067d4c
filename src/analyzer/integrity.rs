// src/analyzer/integrity.rs
//! Integrity heuristics (bot, spam, manipulation, coordinated) and the
//! analysis confidence score.
//!
//! These are deliberately cheap, explainable rules. The coordinated flag is a
//! fixed-probability sample standing in for a real correlation engine.

use crate::types::{IntegrityFlags, RawPost};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// Following-to-follower ratio above which an account reads as a bot.
const BOT_RATIO: f64 = 10.0;
/// Link count at which a post reads as spam.
const SPAM_LINK_COUNT: usize = 3;
/// Probability of the coordinated-activity sample flag.
const COORDINATED_RATE: f64 = 0.02;

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Length at which a run of one repeated character reads as spam.
const CHAR_RUN_LEN: usize = 5;

const MANIPULATION_KEYWORDS: &[&str] = &[
    "pump",
    "to the moon",
    "guaranteed",
    "insider info",
    "can't lose",
    "cant lose",
    "get in now",
    "easy money",
    "trust me",
    "100x",
];

pub fn integrity_flags(post: &RawPost) -> IntegrityFlags {
    IntegrityFlags {
        bot: is_bot(post),
        spam: is_spam(&post.text),
        manipulation: has_manipulation_language(&post.text),
        coordinated: rand::rng().random_bool(COORDINATED_RATE),
    }
}

fn is_bot(post: &RawPost) -> bool {
    if post.followers == 0 {
        return true;
    }
    (post.following as f64 / post.followers as f64) > BOT_RATIO
}

fn is_spam(text: &str) -> bool {
    RE_LINK.find_iter(text).count() >= SPAM_LINK_COUNT || has_char_run(text, CHAR_RUN_LEN)
}

fn has_char_run(text: &str, min_len: usize) -> bool {
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= min_len {
            return true;
        }
    }
    false
}

fn has_manipulation_language(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    MANIPULATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Analysis confidence, 0..=100. Rewards verification, audience size, and
/// sentiment certainty; penalizes very short text.
pub fn analysis_confidence(post: &RawPost, score: f32) -> u8 {
    let mut c: f32 = 40.0;
    if post.verified {
        c += 15.0;
    }
    if post.followers > 0 {
        c += ((post.followers as f32).log10() * 4.0).min(20.0);
    }
    c += score.abs() * 25.0;
    if post.text.chars().count() < 20 {
        c -= 15.0;
    }
    c.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str, followers: u64, following: u64) -> RawPost {
        RawPost {
            text: text.into(),
            author: "a".into(),
            followers,
            following,
            verified: false,
            likes: 0,
            comments: 0,
            shares: 0,
            published_at: Utc::now(),
            language: "en".into(),
        }
    }

    #[test]
    fn zero_followers_flags_bot() {
        assert!(is_bot(&post("hello", 0, 0)));
    }

    #[test]
    fn extreme_following_ratio_flags_bot() {
        assert!(is_bot(&post("hello", 10, 101)));
        assert!(!is_bot(&post("hello", 100, 500)));
    }

    #[test]
    fn link_stuffing_and_char_runs_flag_spam() {
        assert!(is_spam("http://a http://b http://c buy now"));
        assert!(is_spam("moooooon"));
        assert!(!is_spam("one link http://a is fine"));
    }

    #[test]
    fn char_run_boundary_is_five() {
        assert!(has_char_run("wooooow", 5));
        assert!(!has_char_run("wooohoooo", 5));
        assert!(!has_char_run("", 5));
    }

    #[test]
    fn manipulation_keywords_flag() {
        assert!(has_manipulation_language("this is guaranteed, get in now"));
        assert!(!has_manipulation_language("solid quarterly results"));
    }

    #[test]
    fn confidence_rewards_verification_and_penalizes_short_text() {
        let mut p = post("a longer message about the quarterly results", 50_000, 10);
        let base = analysis_confidence(&p, 0.5);
        p.verified = true;
        assert!(analysis_confidence(&p, 0.5) > base);

        let short = post("hi", 50_000, 10);
        assert!(analysis_confidence(&short, 0.5) < base);
    }
}
