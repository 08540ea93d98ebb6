use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ScoredCandidate;

pub const GENRE_QUESTION: i64 = 1;
pub const EMOTION_QUESTION: i64 = 2;
pub const LENGTH_QUESTION: i64 = 3;
pub const ENDING_QUESTION: i64 = 4;

/// Option index -> genre name for the favorite-genre question
const GENRE_OPTIONS: [&str; 5] = ["Fantasía", "Romance", "Misterio", "Ciencia Ficción", "Drama"];

/// Option index -> tag name for the desired-emotion question
const EMOTION_OPTIONS: [&str; 5] = [
    "Emocionante",
    "Conmovedor",
    "Intrigante",
    "Divertido",
    "Reflexivo",
];

/// Option index -> maximum page count for the reading-time question
const LENGTH_OPTIONS: [u32; 4] = [200, 400, 600, UNLIMITED_PAGES];

/// Max page count meaning "any length"
pub const UNLIMITED_PAGES: u32 = u32::MAX;

const DEFAULT_MAX_PAGES: u32 = 600;

/// One answered question
///
/// Ids are signed so any integer a client sends deserializes; ids outside the
/// question and option tables are ignored when mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizAnswer {
    pub question_id: i64,
    pub selected_option_id: i64,
}

impl QuizAnswer {
    pub fn new(question_id: i64, selected_option_id: i64) -> Self {
        Self {
            question_id,
            selected_option_id,
        }
    }
}

/// Reading preferences inferred from a quiz
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizPreference {
    pub preferred_genre: Option<String>,
    pub preferred_emotion: Option<String>,
    pub max_pages: u32,
    pub prefers_unexpected_ending: bool,
}

impl Default for QuizPreference {
    fn default() -> Self {
        Self {
            preferred_genre: None,
            preferred_emotion: None,
            max_pages: DEFAULT_MAX_PAGES,
            prefers_unexpected_ending: false,
        }
    }
}

impl QuizPreference {
    /// Maps answers onto preferences
    ///
    /// Unknown question or option ids are ignored. When a question is
    /// answered more than once, the last answer wins.
    pub fn from_answers(answers: &[QuizAnswer]) -> Self {
        let selected: HashMap<i64, i64> = answers
            .iter()
            .map(|a| (a.question_id, a.selected_option_id))
            .collect();

        let mut preference = Self::default();

        if let Some(genre) = option_for(&selected, GENRE_QUESTION, &GENRE_OPTIONS) {
            preference.preferred_genre = Some(genre.to_string());
        }

        if let Some(emotion) = option_for(&selected, EMOTION_QUESTION, &EMOTION_OPTIONS) {
            preference.preferred_emotion = Some(emotion.to_string());
        }

        if let Some(&max_pages) = option_for(&selected, LENGTH_QUESTION, &LENGTH_OPTIONS) {
            preference.max_pages = max_pages;
        }

        // 0 = predictable, 1 = surprises, 2 = indifferent, 3 = plot twists
        if let Some(&option) = selected.get(&ENDING_QUESTION) {
            preference.prefers_unexpected_ending = option == 1 || option == 3;
        }

        preference
    }
}

/// Option selected for `question`, `None` when unanswered or out of the table
fn option_for<'a, T>(
    selected: &HashMap<i64, i64>,
    question: i64,
    options: &'a [T],
) -> Option<&'a T> {
    selected
        .get(&question)
        .and_then(|&id| usize::try_from(id).ok())
        .and_then(|index| options.get(index))
}

/// Result of matching a quiz against the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub recommended: ScoredCandidate,
    /// Up to three runner-up books
    pub alternatives: Vec<ScoredCandidate>,
    pub explanation: String,
    pub match_percentage: f64,
    pub preference: QuizPreference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_answers() {
        let answers = vec![
            QuizAnswer::new(1, 0),
            QuizAnswer::new(2, 0),
            QuizAnswer::new(3, 1),
            QuizAnswer::new(4, 1),
        ];

        let preference = QuizPreference::from_answers(&answers);
        assert_eq!(preference.preferred_genre.as_deref(), Some("Fantasía"));
        assert_eq!(preference.preferred_emotion.as_deref(), Some("Emocionante"));
        assert_eq!(preference.max_pages, 400);
        assert!(preference.prefers_unexpected_ending);
    }

    #[test]
    fn test_unanswered_questions_keep_defaults() {
        let preference = QuizPreference::from_answers(&[QuizAnswer::new(2, 3)]);
        assert_eq!(preference.preferred_genre, None);
        assert_eq!(preference.preferred_emotion.as_deref(), Some("Divertido"));
        assert_eq!(preference.max_pages, 600);
        assert!(!preference.prefers_unexpected_ending);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let answers = vec![
            QuizAnswer::new(1, 42),
            QuizAnswer::new(9, 0),
            QuizAnswer::new(3, 7),
        ];

        assert_eq!(QuizPreference::from_answers(&answers), QuizPreference::default());
    }

    #[test]
    fn test_last_answer_wins() {
        let answers = vec![QuizAnswer::new(1, 1), QuizAnswer::new(1, 4)];
        let preference = QuizPreference::from_answers(&answers);
        assert_eq!(preference.preferred_genre.as_deref(), Some("Drama"));
    }

    #[test]
    fn test_ending_options() {
        for (option, expected) in [(0, false), (1, true), (2, false), (3, true)] {
            let preference = QuizPreference::from_answers(&[QuizAnswer::new(4, option)]);
            assert_eq!(preference.prefers_unexpected_ending, expected, "option {}", option);
        }
    }

    #[test]
    fn test_unlimited_length() {
        let preference = QuizPreference::from_answers(&[QuizAnswer::new(3, 3)]);
        assert_eq!(preference.max_pages, UNLIMITED_PAGES);
    }

    #[test]
    fn test_negative_ids_are_ignored() {
        let answers = vec![
            QuizAnswer::new(1, 0),
            QuizAnswer::new(2, -1),
            QuizAnswer::new(-5, 2),
            QuizAnswer::new(4, -3),
        ];

        let preference = QuizPreference::from_answers(&answers);
        assert_eq!(preference.preferred_genre.as_deref(), Some("Fantasía"));
        assert_eq!(preference.preferred_emotion, None);
        assert!(!preference.prefers_unexpected_ending);
    }

    #[test]
    fn test_answers_accept_any_integer_ids() {
        let answer: QuizAnswer =
            serde_json::from_str(r#"{"question_id": -5, "selected_option_id": -1}"#).unwrap();
        assert_eq!(answer, QuizAnswer::new(-5, -1));
    }
}
