// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lexical similarity primitives
//!
//! Deterministic text comparison used by the non-generative metrics:
//!
//! - **Word overlap**: set-based precision/recall/F1 of segmented tokens
//! - **LCS overlap**: ROUGE-L precision/recall/F-measure over the longest
//!   common subsequence of segmented units
//! - **Sentence splitting**: on CJK and Latin sentence-ending punctuation
//!
//! Both overlap measures return an explicit all-zero score when either side is
//! blank, instead of dividing by zero.
//!
//! ## Usage
//!
//! ```rust
//! use rageval_core::lexical::{lcs_overlap, split_sentences, word_overlap};
//!
//! let score = word_overlap("Paris is the capital", "The capital is Paris");
//! assert!((score.f1 - 1.0).abs() < 1e-9);
//!
//! let rouge_l = lcs_overlap("the cat sat", "the cat sat down");
//! assert!(rouge_l.precision > rouge_l.recall);
//!
//! assert_eq!(split_sentences("你好。再见！"), vec!["你好", "再见"]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

static SENTENCE_DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[。？！!?；]+").expect("sentence delimiter pattern is valid"));

/// Precision, recall and F1 of one text against a reference
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl OverlapScore {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Splits text into word units
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Unicode (UAX #29) word-boundary segmentation, lowercased.
///
/// Only whitespace runs are dropped; punctuation marks are units of their
/// own. Han ideographs come out as one unit per character, which is what the
/// overlap measures need for Chinese text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeWordSegmenter;

impl Segmenter for UnicodeWordSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        text.split_word_bounds()
            .filter(|unit| !unit.chars().all(char::is_whitespace))
            .map(str::to_lowercase)
            .collect()
    }
}

/// Longest-common-subsequence scorer
pub trait LcsScorer: Send + Sync {
    /// Score `candidate` against `reference`
    fn score(&self, candidate: &str, reference: &str) -> OverlapScore;
}

/// ROUGE-L over segmented units
pub struct RougeL<S = UnicodeWordSegmenter> {
    segmenter: S,
}

impl RougeL<UnicodeWordSegmenter> {
    pub fn new() -> Self {
        Self {
            segmenter: UnicodeWordSegmenter,
        }
    }
}

impl Default for RougeL<UnicodeWordSegmenter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Segmenter> RougeL<S> {
    pub fn with_segmenter(segmenter: S) -> Self {
        Self { segmenter }
    }
}

impl<S: Segmenter> LcsScorer for RougeL<S> {
    fn score(&self, candidate: &str, reference: &str) -> OverlapScore {
        let cand_tokens = self.segmenter.segment(candidate);
        let ref_tokens = self.segmenter.segment(reference);

        if cand_tokens.is_empty() || ref_tokens.is_empty() {
            return OverlapScore::zero();
        }

        let lcs_len = lcs_length(&cand_tokens, &ref_tokens);

        let precision = lcs_len as f64 / cand_tokens.len() as f64;
        let recall = lcs_len as f64 / ref_tokens.len() as f64;

        // F-measure with beta = P/R
        let f1 = if precision + recall > 0.0 {
            let beta_sq = if recall > 1e-10 {
                (precision / recall).powi(2)
            } else {
                1.0
            };
            (1.0 + beta_sq) * precision * recall / (recall + beta_sq * precision)
        } else {
            0.0
        };

        OverlapScore {
            precision,
            recall,
            f1,
        }
    }
}

/// LCS length by dynamic programming, O(mn) time, O(min(m, n)) space
fn lcs_length(a: &[String], b: &[String]) -> usize {
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for i in 1..=long.len() {
        for j in 1..=short.len() {
            curr[j] = if long[i - 1] == short[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Set-based word overlap of `text` against `reference`
pub fn word_overlap(text: &str, reference: &str) -> OverlapScore {
    word_overlap_with(&UnicodeWordSegmenter, text, reference)
}

/// [`word_overlap`] with an explicit segmenter
pub fn word_overlap_with(segmenter: &dyn Segmenter, text: &str, reference: &str) -> OverlapScore {
    if text.trim().is_empty() || reference.trim().is_empty() {
        return OverlapScore::zero();
    }

    let text_tokens: HashSet<String> = segmenter.segment(text).into_iter().collect();
    let reference_tokens: HashSet<String> = segmenter.segment(reference).into_iter().collect();

    let overlap = text_tokens.intersection(&reference_tokens).count();
    if overlap == 0 {
        return OverlapScore::zero();
    }

    let precision = overlap as f64 / text_tokens.len() as f64;
    let recall = overlap as f64 / reference_tokens.len() as f64;
    OverlapScore {
        precision,
        recall,
        f1: harmonic_mean(precision, recall),
    }
}

/// ROUGE-L overlap of `text` against `reference`
pub fn lcs_overlap(text: &str, reference: &str) -> OverlapScore {
    lcs_overlap_with(&RougeL::new(), text, reference)
}

/// [`lcs_overlap`] with an explicit scorer
pub fn lcs_overlap_with(scorer: &dyn LcsScorer, text: &str, reference: &str) -> OverlapScore {
    if text.trim().is_empty() || reference.trim().is_empty() {
        return OverlapScore::zero();
    }
    scorer.score(text, reference)
}

/// Split on runs of `。？！!?；`, trimming fragments and dropping empty ones
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_DELIMITERS
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_word_overlap_identical() {
        let score = word_overlap("The quick brown fox", "The quick brown fox");
        assert!((score.precision - 1.0).abs() < 1e-9);
        assert!((score.recall - 1.0).abs() < 1e-9);
        assert!((score.f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_partial() {
        // text {shakespeare}, reference {shakespeare, wrote, ', romeo, and, juliet}
        let score = word_overlap("Shakespeare", "Shakespeare wrote 'Romeo and Juliet'");
        assert!((score.precision - 1.0).abs() < 1e-9);
        assert!((score.recall - 1.0 / 6.0).abs() < 1e-9);
        assert!((score.f1 - 2.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_collapses_duplicates() {
        let score = word_overlap("the the the cat", "the cat");
        assert!((score.precision - 1.0).abs() < 1e-9);
        assert!((score.recall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_disjoint() {
        assert_eq!(word_overlap("alpha beta", "gamma delta"), OverlapScore::zero());
    }

    #[test]
    fn test_word_overlap_blank_inputs() {
        assert_eq!(word_overlap("   ", "text"), OverlapScore::zero());
        assert_eq!(word_overlap("text", ""), OverlapScore::zero());
    }

    #[test]
    fn test_word_overlap_cjk() {
        let score = word_overlap("巴黎是首都", "巴黎是法国的首都");
        assert!((score.precision - 1.0).abs() < 1e-9);
        assert!(score.recall < 1.0);
    }

    #[test]
    fn test_segmenter_keeps_punctuation() {
        assert_eq!(
            UnicodeWordSegmenter.segment("Paris, France!  Don't"),
            tokens(&["paris", ",", "france", "!", "don't"])
        );
        assert!(UnicodeWordSegmenter.segment(" \t\n").is_empty());
    }

    #[test]
    fn test_word_overlap_punctuation_only() {
        for text in ["?!", "...", "\u{2014}", "。"] {
            let score = word_overlap(text, text);
            assert!((score.f1 - 1.0).abs() < 1e-9, "{text:?}");
            let rouge_l = lcs_overlap(text, text);
            assert!((rouge_l.f1 - 1.0).abs() < 1e-9, "{text:?}");
        }
    }

    #[test]
    fn test_lcs_length() {
        let a = tokens(&["a", "b", "c", "d"]);
        let b = tokens(&["b", "c", "d", "e"]);
        assert_eq!(lcs_length(&a, &b), 3);
    }

    #[test]
    fn test_rouge_l_identical() {
        let score = lcs_overlap("The quick brown fox", "the quick brown fox");
        assert!((score.f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rouge_l_partial() {
        let score = lcs_overlap(
            "Lyon is a city in France.",
            "Paris is the capital of France.",
        );
        // LCS = [is, france, .]
        assert!((score.precision - 3.0 / 7.0).abs() < 1e-9);
        assert!((score.recall - 3.0 / 7.0).abs() < 1e-9);
        assert!((score.f1 - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_rouge_l_blank_inputs() {
        assert_eq!(lcs_overlap("", "text"), OverlapScore::zero());
        assert_eq!(lcs_overlap("text", " \n"), OverlapScore::zero());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("今天天气很好。我们去公园吧！好吗？？"),
            vec!["今天天气很好", "我们去公园吧", "好吗"]
        );
        assert_eq!(
            split_sentences("Is it Paris? Yes! It is;  "),
            vec!["Is it Paris", "Yes", "It is;"]
        );
    }

    #[test]
    fn test_split_sentences_drops_blank_fragments() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("!!! ？ ").is_empty());
        assert_eq!(split_sentences("Paris is the capital of France."), vec![
            "Paris is the capital of France."
        ]);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_word_overlap_with_blank_is_zero(text in ".{0,80}") {
            prop_assert_eq!(word_overlap(&text, ""), OverlapScore::zero());
            prop_assert_eq!(word_overlap("", &text), OverlapScore::zero());
        }

        #[test]
        fn prop_word_overlap_self_is_one(text in r"\s{0,2}\S{1,12}(\s{1,2}\S{1,12}){0,6}\s{0,2}") {
            let score = word_overlap(&text, &text);
            prop_assert!((score.precision - 1.0).abs() < 1e-9);
            prop_assert!((score.recall - 1.0).abs() < 1e-9);
            prop_assert!((score.f1 - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_overlap_scores_bounded(a in "[a-z ]{0,60}", b in "[a-z ]{0,60}") {
            for score in [word_overlap(&a, &b), lcs_overlap(&a, &b)] {
                prop_assert!((0.0..=1.0).contains(&score.precision));
                prop_assert!((0.0..=1.0).contains(&score.recall));
                prop_assert!((0.0..=1.0 + 1e-9).contains(&score.f1));
            }
        }

        #[test]
        fn prop_split_sentences_never_yields_blank(text in ".{0,80}") {
            for sentence in split_sentences(&text) {
                prop_assert!(!sentence.is_empty());
                prop_assert_eq!(sentence.trim(), sentence.as_str());
            }
        }
    }
}
