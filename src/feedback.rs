use itertools::Itertools;

use crate::grammar::{GrammarChecker, GrammarIssue};
use crate::questions::Question;

/// Responses shorter than this many words get a structure suggestion.
pub const STRUCTURE_WORD_THRESHOLD: usize = 5;
/// Keyed questions answered in fewer words than this get a context suggestion.
pub const CONTEXT_WORD_THRESHOLD: usize = 4;

pub const NO_GRAMMAR_ISSUES: &str = "No grammar issues detected.";
pub const STRUCTURE_SUGGESTION: &str =
    "Try to expand the sentence with more details or descriptive language.";
pub const VOCABULARY_SUGGESTION: &str =
    "Consider replacing 'very' with a more specific term (e.g., 'extremely').";
pub const BAND_LINE_PREFIX: &str = "IELTS Band Score: ";

/// Question keywords and the expansion prompt each one triggers, checked in order.
const CONTEXT_PROMPTS: [(&str, &str); 3] = [
    (
        "hobbies",
        "Try adding more details to your hobbies. For example, 'I enjoy fishing because it helps me relax and biking because it's a great way to stay fit.'",
    ),
    (
        "work",
        "Provide more details about your work experience. You could mention where you work, your responsibilities, and why you enjoy it.",
    ),
    (
        "place",
        "Expand on the place you visited. Mention why you liked it or what activities you enjoyed there.",
    ),
];

/// Qualitative band derived from the grammar issue count alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum BandScore {
    #[strum(to_string = "Band 9 (Excellent)")]
    Band9,
    #[strum(to_string = "Band 8 (Very Good)")]
    Band8,
    #[strum(to_string = "Band 7 (Good)")]
    Band7,
    #[strum(to_string = "Band 6 (Competent)")]
    Band6,
    #[strum(to_string = "Band 5 or below (Needs Improvement)")]
    Band5OrBelow,
    /// The grammar collaborator failed, so no band can be claimed.
    #[strum(to_string = "Band unavailable (grammar analysis failed)")]
    Unavailable,
}

impl BandScore {
    pub fn from_issue_count(issues: usize) -> Self {
        match issues {
            0 => BandScore::Band9,
            1..=3 => BandScore::Band8,
            4..=6 => BandScore::Band7,
            7..=9 => BandScore::Band6,
            _ => BandScore::Band5OrBelow,
        }
    }
}

/// Feedback for one (question, response) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReport {
    entries: Vec<String>,
    band: BandScore,
}

impl FeedbackReport {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn band(&self) -> BandScore {
        self.band
    }

    pub fn band_line(&self) -> String {
        format!("{BAND_LINE_PREFIX}{}", self.band)
    }

    /// Category entries followed by the band line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.entries.clone();
        lines.push(self.band_line());
        lines
    }

    pub fn joined(&self, separator: &str) -> String {
        self.lines().iter().join(separator)
    }
}

/// Collapse a feedback string onto one line; `None` if nothing is left.
pub fn normalize_entry(raw: &str) -> Option<String> {
    let flattened = raw.trim().replace(['\r', '\n'], " ");
    let mut out = String::with_capacity(flattened.len());
    let mut previous_space = false;
    for c in flattened.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }

    let out = out.trim().to_string();
    (!out.is_empty()).then_some(out)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn render_issue(issue: &GrammarIssue) -> String {
    let suggestion = if issue.replacements.is_empty() {
        "none".to_string()
    } else {
        issue.replacements.join(", ")
    };
    format!("Issue: {}\nSuggestion: {}", issue.message, suggestion)
}

fn structure_feedback(text: &str) -> Option<String> {
    (word_count(text) < STRUCTURE_WORD_THRESHOLD).then(|| STRUCTURE_SUGGESTION.to_string())
}

fn vocabulary_feedback(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|word| word.eq_ignore_ascii_case("very"))
        .then(|| VOCABULARY_SUGGESTION.to_string())
}

fn context_feedback(text: &str, question: &Question) -> Option<String> {
    let question = question.text.to_lowercase();
    CONTEXT_PROMPTS
        .iter()
        .find(|(keyword, _)| question.contains(keyword))
        .filter(|_| word_count(text) < CONTEXT_WORD_THRESHOLD)
        .map(|(_, prompt)| prompt.to_string())
}

/// Turns a response into an ordered feedback report.
#[derive(Debug, Clone)]
pub struct FeedbackAggregator<G> {
    grammar: G,
}

impl<G: GrammarChecker> FeedbackAggregator<G> {
    pub fn new(grammar: G) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    /// Run grammar, structure, vocabulary and context analyses in that order.
    ///
    /// `response` must already be non-empty; the session rejects empty input.
    pub fn aggregate(&self, response: &str, question: &Question) -> FeedbackReport {
        let (grammar_entries, band) = match self.grammar.check(response) {
            Ok(issues) if issues.is_empty() => {
                (vec![NO_GRAMMAR_ISSUES.to_string()], BandScore::Band9)
            }
            Ok(issues) => (
                issues.iter().map(render_issue).collect(),
                BandScore::from_issue_count(issues.len()),
            ),
            Err(err) => {
                tracing::warn!(question = question.number(), error = %err, "grammar analysis unavailable");
                (
                    vec![format!("Grammar analysis unavailable: {err}")],
                    BandScore::Unavailable,
                )
            }
        };

        let entries = grammar_entries
            .into_iter()
            .chain(structure_feedback(response))
            .chain(vocabulary_feedback(response))
            .chain(context_feedback(response, question))
            .filter_map(|entry| normalize_entry(&entry))
            .collect::<Vec<_>>();

        tracing::debug!(
            question = question.number(),
            entries = entries.len(),
            band = %band,
            "feedback aggregated"
        );

        FeedbackReport { entries, band }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::GrammarError;
    use std::cell::Cell;

    /// Grammar double returning the same issues for every call.
    pub(crate) struct StaticGrammar {
        pub issues: Vec<GrammarIssue>,
        pub calls: Cell<usize>,
    }

    impl StaticGrammar {
        pub(crate) fn clean() -> Self {
            Self::with_issues(0)
        }

        pub(crate) fn with_issues(n: usize) -> Self {
            Self {
                issues: (0..n)
                    .map(|i| GrammarIssue::new(format!("problem {i}"), ["fix"]))
                    .collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl GrammarChecker for StaticGrammar {
        fn check(&self, _text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.issues.clone())
        }
    }

    pub(crate) struct FailingGrammar;

    impl GrammarChecker for FailingGrammar {
        fn check(&self, _text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
            Err(GrammarError::Malformed("service offline".into()))
        }
    }

    fn question(text: &str) -> Question {
        Question {
            part: 5,
            position: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_band_boundaries() {
        let cases = [
            (0, BandScore::Band9),
            (1, BandScore::Band8),
            (3, BandScore::Band8),
            (4, BandScore::Band7),
            (6, BandScore::Band7),
            (7, BandScore::Band6),
            (9, BandScore::Band6),
            (10, BandScore::Band5OrBelow),
            (42, BandScore::Band5OrBelow),
        ];
        for (count, expected) in cases {
            assert_eq!(BandScore::from_issue_count(count), expected, "count {count}");
        }
    }

    #[test]
    fn test_band_labels() {
        assert_eq!(BandScore::Band9.to_string(), "Band 9 (Excellent)");
        assert_eq!(
            BandScore::Band5OrBelow.to_string(),
            "Band 5 or below (Needs Improvement)"
        );
    }

    #[test]
    fn test_clean_long_response_reduces_to_two_lines() {
        let agg = FeedbackAggregator::new(StaticGrammar::clean());
        let q = question("What is your favorite book or movie?");
        let response = "My favourite book is a long novel about the sea.";

        let first = agg.aggregate(response, &q);
        let second = agg.aggregate(response, &q);

        assert_eq!(
            first.lines(),
            vec![
                "No grammar issues detected.".to_string(),
                "IELTS Band Score: Band 9 (Excellent)".to_string()
            ]
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_hobbies_answer_triggers_structure_and_context() {
        let grammar = StaticGrammar::with_issues(1);
        let agg = FeedbackAggregator::new(grammar);
        let q = question("Can you tell me about your hobbies?");

        let report = agg.aggregate("I like fishing.", &q);
        let entries = report.entries();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], "Issue: problem 0 Suggestion: fix");
        assert_eq!(entries[1], STRUCTURE_SUGGESTION);
        assert!(entries[2].starts_with("Try adding more details to your hobbies."));
        assert_eq!(report.band(), BandScore::Band8);
        assert_eq!(
            report.lines().last().unwrap(),
            "IELTS Band Score: Band 8 (Very Good)"
        );
    }

    #[test]
    fn test_band_ignores_non_grammar_feedback() {
        let agg = FeedbackAggregator::new(StaticGrammar::clean());
        let q = question("Do you work or study?");

        let report = agg.aggregate("very busy", &q);

        assert_eq!(report.entries().len(), 4);
        assert_eq!(report.band(), BandScore::Band9);
    }

    #[test]
    fn test_context_uses_first_matching_keyword_only() {
        let agg = FeedbackAggregator::new(StaticGrammar::clean());
        let q = question("Is there a place where you like to work?");

        let report = agg.aggregate("Yes.", &q);

        assert!(report
            .entries()
            .iter()
            .any(|e| e.starts_with("Provide more details about your work")));
        assert!(!report
            .entries()
            .iter()
            .any(|e| e.starts_with("Expand on the place")));
    }

    #[test]
    fn test_context_threshold_is_four_words() {
        let agg = FeedbackAggregator::new(StaticGrammar::clean());
        let q = question("Can you tell me about your HOBBIES?");

        let report = agg.aggregate("I really like fishing", &q);

        // four words: structure fires, context does not
        assert!(report.entries().contains(&STRUCTURE_SUGGESTION.to_string()));
        assert!(!report.entries().iter().any(|e| e.contains("hobbies")));
    }

    #[test]
    fn test_vocabulary_matches_whole_word_only() {
        assert!(vocabulary_feedback("It was Very nice, very.").is_some());
        assert!(vocabulary_feedback("I go there every week").is_none());
        assert!(vocabulary_feedback("(very)").is_some());
    }

    #[test]
    fn test_grammar_failure_is_not_a_clean_result() {
        let agg = FeedbackAggregator::new(FailingGrammar);
        let q = question("What is your favorite book or movie?");

        let report = agg.aggregate("My favourite book is a long novel.", &q);

        assert_eq!(report.band(), BandScore::Unavailable);
        assert!(report.entries()[0].starts_with("Grammar analysis unavailable"));
        assert!(!report.entries().contains(&NO_GRAMMAR_ISSUES.to_string()));
        assert_ne!(report.band(), BandScore::Band9);
    }

    #[test]
    fn test_issue_without_replacements() {
        let grammar = StaticGrammar {
            issues: vec![GrammarIssue::new("Odd phrasing.", Vec::<String>::new())],
            calls: Cell::new(0),
        };
        let agg = FeedbackAggregator::new(grammar);
        let report = agg.aggregate("This is a sentence that is fine.", &question("Why?"));
        assert_eq!(report.entries()[0], "Issue: Odd phrasing. Suggestion: none");
    }

    #[test]
    fn test_normalize_entry() {
        assert_eq!(
            normalize_entry("  Issue: x\nSuggestion:  a,   b \n"),
            Some("Issue: x Suggestion: a, b".to_string())
        );
        assert_eq!(normalize_entry(" \n \n "), None);
        assert_eq!(normalize_entry(""), None);
    }

    #[test]
    fn test_grammar_checked_once_per_aggregate() {
        let agg = FeedbackAggregator::new(StaticGrammar::clean());
        agg.aggregate("hello there", &question("Hi?"));
        assert_eq!(agg.grammar().calls.get(), 1);
    }

    #[test]
    fn test_joined_ends_with_band_line() {
        let agg = FeedbackAggregator::new(StaticGrammar::with_issues(4));
        let report = agg.aggregate("one two three four five six", &question("Why?"));
        let joined = report.joined("; ");
        assert!(joined.ends_with("IELTS Band Score: Band 7 (Good)"));
        assert_eq!(joined.matches("; ").count(), 4);
    }
}
