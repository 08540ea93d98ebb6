use rayon::prelude::*;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{Book, QuizAnswer, QuizOutcome, QuizPreference, ScoredCandidate},
    services::{
        scoring::{self, NEUTRAL_SCORE},
        stores::CatalogStore,
    },
};

/// Books returned at a flat score when nothing in the catalog scores
const FALLBACK_SIZE: usize = 5;
const ALTERNATIVES: usize = 3;

/// Single-shot matching of a questionnaire against the whole catalog
pub struct QuizMatcher {
    catalog: Arc<dyn CatalogStore>,
}

impl QuizMatcher {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Best catalog match for a set of quiz answers, plus up to three runners-up
    #[instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn match_answers(&self, answers: &[QuizAnswer]) -> AppResult<QuizOutcome> {
        if answers.is_empty() {
            return Err(AppError::InvalidInput(
                "Quiz requires at least one answer".to_string(),
            ));
        }

        let preference = QuizPreference::from_answers(answers);
        let catalog = self.catalog.all_books().await?;
        if catalog.is_empty() {
            return Err(AppError::NotFound("No books available".to_string()));
        }

        let mut scored: Vec<ScoredCandidate> = catalog
            .par_iter()
            .map(|book| scoring::score_for_quiz(book, &preference))
            .filter(|candidate| candidate.score > 0.0)
            .collect();

        if scored.is_empty() {
            tracing::warn!(
                catalog_size = catalog.len(),
                "No book scored for the quiz, falling back to a neutral sample"
            );
            scored = neutral_fallback(catalog);
        }

        let mut ranked = scoring::rank_candidates(scored, ALTERNATIVES + 1).into_iter();
        let recommended = ranked
            .next()
            .ok_or_else(|| AppError::Internal("Quiz ranking produced no candidates".to_string()))?;
        let alternatives: Vec<ScoredCandidate> = ranked.collect();

        let explanation = scoring::explain_quiz_match(&recommended.book, &preference);
        let match_percentage = recommended.score;

        tracing::info!(
            book_id = recommended.book.id,
            match_percentage,
            alternatives = alternatives.len(),
            "Quiz matched"
        );

        Ok(QuizOutcome {
            recommended,
            alternatives,
            explanation,
            match_percentage,
            preference,
        })
    }
}

/// Up to five catalog books at a flat neutral score
fn neutral_fallback(catalog: Vec<Book>) -> Vec<ScoredCandidate> {
    catalog
        .into_iter()
        .take(FALLBACK_SIZE)
        .map(|book| ScoredCandidate::unscored(book, NEUTRAL_SCORE))
        .collect()
}
