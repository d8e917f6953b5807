//! Rule-based question classifier.
//!
//! Decides whether a survey cell is an open question (free-form answers that
//! need human thematic annotation) or one of the closed forms that do not.
//! Each closed [`QuestionType`] owns an ordered table of weighted regex rules;
//! the open type is scored by a separate lexical heuristic. The highest score
//! wins, and anything scoring below [`DECISION_THRESHOLD`] falls back to
//! [`QuestionType::Open`] so uncertain cells are still shown to a human.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Winning scores below this are treated as "no clear match".
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Confidence reported when the classifier falls back to `Open`.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Trimmed responses longer than this (in characters) count as free-form prose.
pub const LONG_RESPONSE_THRESHOLD: usize = 50;

/// Score added to `Open` when the open-question heuristic fires.
pub const OPEN_HEURISTIC_BONUS: f64 = 1.0;

/// Substrings of the question that ask the respondent to explain themselves.
const OPEN_INDICATORS: &[&str] = &[
    "descrivi",
    "describe",
    "spiega",
    "explain",
    "racconta",
    "tell",
    "cosa pensi",
    "what do you think",
    "opinione",
    "opinion",
    "come",
    "how",
    "perché",
    "why",
    "in che modo",
    "in what way",
    "esperienza",
    "experience",
    "commenta",
    "comment",
];

/// First words that usually open a free-form question.
const OPEN_STARTERS: &[&str] = &[
    "cosa", "come", "perché", "quando", "dove", "chi", "what", "how", "why", "when", "where",
    "who",
];

/* --------------------------------------------------------------------------
Question types
-------------------------------------------------------------------------- */

/// Closed set of question kinds. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Open,
    ClosedBinary,
    ClosedMultiple,
    Likert,
    Demographic,
    Numeric,
    Date,
    Scale,
}

impl QuestionType {
    /// All variants in declaration order.
    pub const ALL: [QuestionType; 8] = [
        QuestionType::Open,
        QuestionType::ClosedBinary,
        QuestionType::ClosedMultiple,
        QuestionType::Likert,
        QuestionType::Demographic,
        QuestionType::Numeric,
        QuestionType::Date,
        QuestionType::Scale,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Open => "open",
            QuestionType::ClosedBinary => "closed_binary",
            QuestionType::ClosedMultiple => "closed_multiple",
            QuestionType::Likert => "likert",
            QuestionType::Demographic => "demographic",
            QuestionType::Numeric => "numeric",
            QuestionType::Date => "date",
            QuestionType::Scale => "scale",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid question type '{s}'. Must be one of: {}",
                    QuestionType::ALL.map(QuestionType::as_str).join(", ")
                ))
            })
    }

    /// Whether cells of this type are surfaced for thematic annotation.
    pub fn is_annotatable(self) -> bool {
        self == QuestionType::Open
    }

    /// The weighted rule table for this type. `Open` is scored by the
    /// heuristic instead, and `Date` currently has no rules.
    pub fn rules(self) -> &'static [Rule] {
        match self {
            QuestionType::Open | QuestionType::Date => &[],
            QuestionType::ClosedBinary => &CLOSED_BINARY_RULES,
            QuestionType::ClosedMultiple => &CLOSED_MULTIPLE_RULES,
            QuestionType::Likert => &LIKERT_RULES,
            QuestionType::Demographic => &DEMOGRAPHIC_RULES,
            QuestionType::Numeric => &NUMERIC_RULES,
            QuestionType::Scale => &SCALE_RULES,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
Rule table
-------------------------------------------------------------------------- */

/// Which piece of text a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleContext {
    Question,
    Response,
    Both,
}

impl RuleContext {
    fn applies_to_question(self) -> bool {
        matches!(self, RuleContext::Question | RuleContext::Both)
    }

    fn applies_to_response(self) -> bool {
        matches!(self, RuleContext::Response | RuleContext::Both)
    }
}

/// One weighted pattern. Each non-overlapping match in an applicable context
/// adds `weight` to the owning type's score.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: &'static str,
    pub context: RuleContext,
    pub weight: f64,
}

const fn rule(pattern: &'static str, context: RuleContext, weight: f64) -> Rule {
    Rule {
        pattern,
        context,
        weight,
    }
}

const CLOSED_BINARY_RULES: [Rule; 2] = [
    rule(r"\b(sì|no|si|vero|falso|true|false)\b", RuleContext::Both, 0.8),
    rule(r"\b(d'accordo|disaccordo|agree|disagree)\b", RuleContext::Question, 0.7),
];

const CLOSED_MULTIPLE_RULES: [Rule; 3] = [
    rule(r"\b(a\)|b\)|c\)|d\)|e\)|\d+\))", RuleContext::Both, 0.9),
    rule(
        r"\b(seleziona|scegli|indica|mark|select|choose)\b.*\b(una|uno|all|alcune)\b",
        RuleContext::Question,
        0.8,
    ),
    rule(
        r"\b(opzioni?|alternative|scelte|choices|options)\b",
        RuleContext::Question,
        0.7,
    ),
];

const LIKERT_RULES: [Rule; 3] = [
    rule(
        r"\b(molto|abbastanza|poco|per niente|strongly|somewhat|not at all)\b",
        RuleContext::Both,
        0.8,
    ),
    rule(
        r"\b(scala da|from \d+ to \d+|da \d+ a \d+|rate from)\b",
        RuleContext::Question,
        0.9,
    ),
    rule(
        r"\b(soddisfatto|insoddisfatto|satisfied|dissatisfied)\b",
        RuleContext::Both,
        0.7,
    ),
];

const DEMOGRAPHIC_RULES: [Rule; 4] = [
    rule(r"\b(età|age|anni|years old|nato|born)\b", RuleContext::Question, 0.9),
    rule(
        r"\b(sesso|genere|gender|sex|maschio|femmina|male|female)\b",
        RuleContext::Both,
        0.9,
    ),
    rule(
        r"\b(titolo di studio|education|laurea|diploma|degree)\b",
        RuleContext::Question,
        0.8,
    ),
    rule(
        r"\b(professione|lavoro|job|occupation|work)\b",
        RuleContext::Question,
        0.7,
    ),
];

const NUMERIC_RULES: [Rule; 2] = [
    rule(r"\b(quanti|how many|numero|number|count)\b", RuleContext::Question, 0.8),
    rule(r"^\d+\n?$", RuleContext::Response, 0.9),
];

const SCALE_RULES: [Rule; 2] = [
    rule(
        r"\b(da 1 a \d+|from 1 to \d+|scala \d+-\d+|scale \d+-\d+)\b",
        RuleContext::Question,
        0.9,
    ),
    rule(r"^\d+(/\d+)?\n?$", RuleContext::Response, 0.6),
];

/// Compiled regexes, indexed by `QuestionType as usize`, parallel to `rules()`.
static COMPILED_RULES: LazyLock<[Vec<Regex>; 8]> = LazyLock::new(|| {
    QuestionType::ALL.map(|t| {
        t.rules()
            .iter()
            .map(|r| Regex::new(r.pattern).expect("valid regex"))
            .collect()
    })
});

/* --------------------------------------------------------------------------
Classification
-------------------------------------------------------------------------- */

/// Result of classifying one question/response pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub question_type: QuestionType,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

impl Classification {
    pub fn should_annotate(&self) -> bool {
        self.question_type.is_annotatable()
    }
}

/// Classifier with a tunable long-response threshold. The free functions
/// [`classify`] and [`should_annotate`] use the defaults.
#[derive(Debug, Clone, Copy)]
pub struct QuestionClassifier {
    pub long_response_threshold: usize,
}

impl Default for QuestionClassifier {
    fn default() -> Self {
        Self {
            long_response_threshold: LONG_RESPONSE_THRESHOLD,
        }
    }
}

impl QuestionClassifier {
    /// Raw accumulated score per type, in declaration order.
    pub fn scores(&self, question: &str, response: Option<&str>) -> [(QuestionType, f64); 8] {
        let question_lower = non_empty(Some(question)).map(str::to_lowercase);
        let response_lower = non_empty(response).map(str::to_lowercase);

        let mut scores = QuestionType::ALL.map(|t| (t, 0.0));
        for (slot, qtype) in scores.iter_mut().zip(QuestionType::ALL) {
            let compiled = &COMPILED_RULES[qtype.index()];
            for (rule, regex) in qtype.rules().iter().zip(compiled) {
                if rule.context.applies_to_question() {
                    if let Some(text) = &question_lower {
                        slot.1 += regex.find_iter(text).count() as f64 * rule.weight;
                    }
                }
                if rule.context.applies_to_response() {
                    if let Some(text) = &response_lower {
                        slot.1 += regex.find_iter(text).count() as f64 * rule.weight;
                    }
                }
            }
        }

        if self.is_likely_open(question, response) {
            scores[QuestionType::Open.index()].1 += OPEN_HEURISTIC_BONUS;
        }
        scores
    }

    pub fn classify(&self, question: &str, response: Option<&str>) -> Classification {
        let scores = self.scores(question, response);

        // Strict `>` keeps the earliest declared type on ties.
        let (best_type, best_score) = scores
            .into_iter()
            .fold(scores[0], |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if best_score < DECISION_THRESHOLD {
            return Classification {
                question_type: QuestionType::Open,
                confidence: FALLBACK_CONFIDENCE,
            };
        }

        Classification {
            question_type: best_type,
            confidence: best_score.min(1.0),
        }
    }

    pub fn should_annotate(&self, question: &str, response: Option<&str>) -> bool {
        self.classify(question, response).should_annotate()
    }

    /// Lexical heuristic for free-form questions: an explanation marker in the
    /// question, a long response, or a question-word opener.
    pub fn is_likely_open(&self, question: &str, response: Option<&str>) -> bool {
        if question.is_empty() {
            return false;
        }
        let question_lower = question.to_lowercase();

        if OPEN_INDICATORS
            .iter()
            .any(|marker| question_lower.contains(marker))
        {
            return true;
        }

        if response.is_some_and(|r| r.trim().chars().count() > self.long_response_threshold) {
            return true;
        }

        question_lower
            .split_whitespace()
            .next()
            .is_some_and(|first| OPEN_STARTERS.contains(&first))
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

/// Classify with default settings.
pub fn classify(question: &str, response: Option<&str>) -> Classification {
    QuestionClassifier::default().classify(question, response)
}

/// `true` iff [`classify`] resolves to [`QuestionType::Open`].
pub fn should_annotate(question: &str, response: Option<&str>) -> bool {
    QuestionClassifier::default().should_annotate(question, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn every_rule_pattern_compiles() {
        for qtype in QuestionType::ALL {
            assert_eq!(COMPILED_RULES[qtype.index()].len(), qtype.rules().len());
        }
    }

    #[test]
    fn question_type_round_trips_through_str() {
        for qtype in QuestionType::ALL {
            assert_eq!(QuestionType::from_str(qtype.as_str()).unwrap(), qtype);
        }
        let err = QuestionType::from_str("aperta").unwrap_err();
        assert!(err.to_string().contains("Invalid question type"));
    }

    #[test]
    fn starter_word_question_is_open() {
        let result = classify("Come utilizzi l'IA nel tuo lavoro?", None);
        assert_eq!(result.question_type, QuestionType::Open);
        assert_close(result.confidence, 1.0);
        assert!(should_annotate("Come utilizzi l'IA nel tuo lavoro?", None));
    }

    #[test]
    fn english_starter_word_question_is_open() {
        assert!(should_annotate("Where do you use these tools?", Some("At home")));
        assert!(should_annotate("Who recommended it to you?", None));
    }

    #[test]
    fn age_question_is_demographic_not_numeric() {
        // Demographic and numeric both score 0.9; declaration order decides.
        let result = classify("Età:", Some("25"));
        assert_eq!(result.question_type, QuestionType::Demographic);
        assert_close(result.confidence, 0.9);
        assert!(!should_annotate("Età:", Some("25")));
    }

    #[test]
    fn scale_question_is_capped_at_full_confidence() {
        let q = "Quanto sei soddisfatto? (scala 1-10)";
        let scores = QuestionClassifier::default().scores(q, Some("8"));
        assert_close(scores[QuestionType::Scale.index()].1, 1.5);

        let result = classify(q, Some("8"));
        assert_eq!(result.question_type, QuestionType::Scale);
        assert_close(result.confidence, 1.0);
        assert!(!should_annotate(q, Some("8")));
    }

    #[test]
    fn numeric_answer_tolerates_one_trailing_newline() {
        let classifier = QuestionClassifier::default();
        let q = "Quanti anni hai?";
        let numeric = QuestionType::Numeric.index();
        let scale = QuestionType::Scale.index();
        let baseline = classifier.scores(q, None);

        let plain = classifier.scores(q, Some("25"));
        let newline = classifier.scores(q, Some("25\n"));
        assert_eq!(plain, newline);
        assert_close(newline[numeric].1 - baseline[numeric].1, 0.9);
        assert_close(newline[scale].1 - baseline[scale].1, 0.6);
        assert_eq!(classify(q, Some("25\n")), classify(q, Some("25")));

        // Only a single final newline is ignored.
        let doubled = classifier.scores(q, Some("25\n\n"));
        assert_close(doubled[numeric].1, baseline[numeric].1);
    }

    #[test]
    fn yes_no_question_is_closed_binary() {
        let result = classify("Hai mai usato ChatGPT? Sì/No", Some("Sì"));
        assert_eq!(result.question_type, QuestionType::ClosedBinary);
        assert!(!result.should_annotate());
    }

    #[test]
    fn lettered_options_are_closed_multiple() {
        let result = classify(
            "Seleziona una opzione: a) Molto utile b) Abbastanza utile c) Poco utile",
            Some("a) Molto utile"),
        );
        assert_eq!(result.question_type, QuestionType::ClosedMultiple);
    }

    #[test]
    fn education_question_is_demographic() {
        let result = classify("Titolo di studio:", Some("Laurea"));
        assert_eq!(result.question_type, QuestionType::Demographic);
        assert_close(result.confidence, 0.8);
    }

    #[test]
    fn explanation_marker_is_open() {
        assert!(should_annotate(
            "Descrivi la tua esperienza con l'intelligenza artificiale",
            Some("L'IA mi ha aiutato molto nel lavoro quotidiano, specialmente per automatizzare tasks ripetitivi..."),
        ));
        assert!(should_annotate(
            "Cosa pensi dell'uso dell'IA nell'educazione?",
            Some("Penso che sia uno strumento molto utile ma va usato con cautela..."),
        ));
    }

    #[test]
    fn long_response_counts_as_open() {
        let response = "x".repeat(LONG_RESPONSE_THRESHOLD + 1);
        let classifier = QuestionClassifier::default();
        assert!(classifier.is_likely_open("Strumento preferito", Some(&response)));

        let short = "x".repeat(LONG_RESPONSE_THRESHOLD);
        assert!(!classifier.is_likely_open("Strumento preferito", Some(&short)));
    }

    #[test]
    fn long_response_threshold_counts_characters_not_bytes() {
        // 30 two-byte characters stay under a 50 character threshold.
        let response = "è".repeat(30);
        assert!(!QuestionClassifier::default().is_likely_open("Strumento", Some(&response)));
    }

    #[test]
    fn custom_long_response_threshold() {
        let classifier = QuestionClassifier {
            long_response_threshold: 5,
        };
        assert!(classifier.is_likely_open("Strumento", Some("sei caratteri")));
    }

    #[test]
    fn uncertain_input_defaults_to_open_with_floor_confidence() {
        let result = classify("Quale strumento di IA preferisci?", Some("ChatGPT"));
        assert_eq!(result.question_type, QuestionType::Open);
        assert_close(result.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn empty_input_is_open_with_floor_confidence() {
        let result = classify("", None);
        assert_eq!(result.question_type, QuestionType::Open);
        assert_close(result.confidence, FALLBACK_CONFIDENCE);

        let result = classify("", Some(""));
        assert_eq!(result.question_type, QuestionType::Open);
    }

    #[test]
    fn empty_question_never_triggers_open_heuristic() {
        let long = "y".repeat(200);
        assert!(!QuestionClassifier::default().is_likely_open("", Some(&long)));
    }

    #[test]
    fn classification_is_idempotent() {
        let inputs = [
            ("Età:", Some("25")),
            ("Perché usi l'IA?", None),
            ("Quanti dipendenti ha la tua azienda?", Some("12")),
        ];
        for (q, r) in inputs {
            assert_eq!(classify(q, r), classify(q, r));
        }
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let heavy = "sì no vero falso true false sì no vero falso";
        let result = classify(heavy, Some(heavy));
        assert_eq!(result.question_type, QuestionType::ClosedBinary);
        assert!(result.confidence <= 1.0 && result.confidence >= 0.0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let upper = classify("GENDER", Some("FEMALE"));
        let lower = classify("gender", Some("female"));
        assert_eq!(upper, lower);
        assert_eq!(upper.question_type, QuestionType::Demographic);
    }
}
