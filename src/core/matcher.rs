/// Fuzzy intent matching: normalisation, similarity ratio and the
/// phrase-set predicate used by the step machine.

use crate::core::lexicon::Lexicon;
use crate::schema::difficulty::Difficulty;

/// Case-fold and collapse all whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalised Levenshtein similarity in `[0, 1]`.
///
/// `1 - distance / max(len_a, len_b)` over Unicode scalar values. Symmetric;
/// 0 when either side is empty, 1 only for identical strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    1.0 - distance as f64 / a.len().max(b.len()) as f64
}

/// True when the utterance contains any reference phrase verbatim (after
/// normalisation) or is at least `threshold` similar to one of them.
pub fn matches<S: AsRef<str>>(utterance: &str, phrases: &[S], threshold: f64) -> bool {
    matches_normalized(&normalize(utterance), phrases, threshold)
}

fn matches_normalized<S: AsRef<str>>(utterance: &str, phrases: &[S], threshold: f64) -> bool {
    if utterance.is_empty() {
        return false;
    }
    phrases.iter().any(|phrase| {
        let phrase = normalize(phrase.as_ref());
        !phrase.is_empty()
            && (utterance.contains(&phrase) || similarity(utterance, &phrase) >= threshold)
    })
}

/// Matcher bound to one difficulty tier.
#[derive(Debug, Clone, Copy)]
pub struct IntentMatcher {
    threshold: f64,
}

impl IntentMatcher {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            threshold: difficulty.threshold(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn matches<S: AsRef<str>>(&self, utterance: &str, phrases: &[S]) -> bool {
        matches(utterance, phrases, self.threshold)
    }

    /// First candidate intent, in the given order, whose phrase set in
    /// `lexicon` matches the utterance.
    pub fn first_match<'a, I>(&self, utterance: &str, candidates: I, lexicon: &Lexicon) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return None;
        }
        candidates
            .into_iter()
            .find(|intent| matches_normalized(&normalized, lexicon.phrases(intent), self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: [&str; 3] = ["who are you", "what is your name", "identify yourself"];

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("  What   IS\tyour\nName "), "what is your name");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn similarity_bounds_and_symmetry() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", "abc"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
        let ab = similarity("what is you name", "what is your name");
        let ba = similarity("what is your name", "what is you name");
        assert_eq!(ab, ba);
        assert!(ab > 0.9 && ab < 1.0);
    }

    #[test]
    fn similarity_counts_edits() {
        // kitten -> sitting: 3 edits over 7 chars
        let s = similarity("kitten", "sitting");
        assert!((s - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn substring_hit_ignores_threshold() {
        assert!(matches("Sorry sir, WHAT is your name please?", &IDENTITY, 0.99));
    }

    #[test]
    fn misspelling_matches_via_ratio() {
        assert!(matches("what is you name", &IDENTITY, Difficulty::Advanced.threshold()));
    }

    #[test]
    fn unrelated_text_does_not_match() {
        for d in Difficulty::ALL {
            assert!(!matches("the weather is lovely today", &IDENTITY, d.threshold()));
        }
    }

    #[test]
    fn empty_inputs_never_match() {
        assert!(!matches("", &IDENTITY, 0.0));
        assert!(!matches("   ", &IDENTITY, 0.0));
        assert!(!matches("who are you", &["", "  "], 0.0));
        let none: [&str; 0] = [];
        assert!(!matches("who are you", &none, 0.0));
    }

    #[test]
    fn first_match_respects_candidate_order() {
        let lexicon = Lexicon::builtin();
        let matcher = IntentMatcher::new(Difficulty::Standard);
        // "what is the purpose of the meeting" hits both ask_purpose and ask_topic
        let utterance = "what is the purpose of the meeting";
        assert_eq!(
            matcher.first_match(utterance, ["ask_purpose", "ask_topic"], &lexicon),
            Some("ask_purpose")
        );
        assert_eq!(
            matcher.first_match(utterance, ["ask_topic", "ask_purpose"], &lexicon),
            Some("ask_topic")
        );
        assert_eq!(matcher.first_match("", ["ask_topic"], &lexicon), None);
    }

    #[test]
    fn unknown_intent_has_no_phrases() {
        let lexicon = Lexicon::builtin();
        let matcher = IntentMatcher::new(Difficulty::Basic);
        assert_eq!(matcher.first_match("who are you", ["not_an_intent"], &lexicon), None);
    }
}
