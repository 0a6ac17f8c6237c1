//! Text analysis: accent folding, lowercasing, word tokens, English stop words, n-grams.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Words of two or more word characters.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// English stop words dropped before n-grams are formed.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
        "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
        "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
        "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
        "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
        "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
        "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
        "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself",
        "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
        "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
        "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
        "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
        "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
        "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
        "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
        "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
        "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
        "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Turns a document into the list of terms counted by the vectorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyzer {
    /// Inclusive (min, max) n-gram lengths.
    pub ngram_range: (usize, usize),
}

impl Analyzer {
    pub fn new(ngram_range: (usize, usize)) -> Self {
        Self { ngram_range }
    }

    /// Lowercased word tokens with stop words removed.
    ///
    /// Text is NFKD-decomposed and combining marks dropped first, so
    /// "Résumé" and "resume" yield the same token.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let folded: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
        let lowered = folded.to_lowercase();
        TOKEN_RE
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| !STOP_WORDS.contains(t))
            .map(str::to_string)
            .collect()
    }

    /// All n-grams in the configured range, joined by single spaces.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let tokens = self.tokens(text);
        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();

        for n in min_n.max(1)..=max_n {
            if n == 1 {
                terms.extend(tokens.iter().cloned());
                continue;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new((1, 1))
    }
}
