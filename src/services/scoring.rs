//! Pure scoring functions shared by the recommendation and quiz flows
//!
//! Nothing here performs I/O, reads the clock or draws random numbers: the
//! same inputs always produce the same score, breakdown and reasons.

use std::cmp::Ordering;

use crate::models::{
    Book, PreferenceSignal, QuizPreference, ReviewStats, ScoreBreakdown, ScoredCandidate,
    MAX_RATING, MIN_RATING,
};

pub const MAX_SCORE: f64 = 100.0;

/// Flat score of results that skip scoring (cold start, quiz fallback)
pub const NEUTRAL_SCORE: f64 = 50.0;

// Profile factor weights; each factor is normalized to 0-100 first.
const GENRE_WEIGHT: f64 = 0.4;
const RATING_WEIGHT: f64 = 0.3;
const TRENDING_WEIGHT: f64 = 0.2;
const POPULARITY_WEIGHT: f64 = 0.1;

/// Genre factor when the user has no target genres at all
const NEUTRAL_GENRE_FACTOR: f64 = 20.0;
/// Rating factor for a book nobody has reviewed
const NEUTRAL_RATING_FACTOR: f64 = 50.0;
/// Trending factor for a book nobody has reviewed
// Beats a book whose only reviews are old (factor 0); kept as-is.
const UNREVIEWED_TRENDING_FACTOR: f64 = 20.0;
const POINTS_PER_RECENT_REVIEW: f64 = 10.0;

const HIGH_AVERAGE_REASON: f64 = 4.0;
const POPULAR_REASON_MIN_REVIEWS: usize = 10;
const FALLBACK_REASON: &str = "Recomendado basado en tu actividad";

// Quiz points per component; they add up to 100.
const QUIZ_GENRE_POINTS: f64 = 40.0;
const QUIZ_GENRE_PARTIAL: f64 = 15.0;
const QUIZ_GENRE_UNSPECIFIED: f64 = 20.0;
const QUIZ_LENGTH_POINTS: f64 = 30.0;
const QUIZ_LENGTH_FLOOR: f64 = 20.0;
const QUIZ_LENGTH_UNKNOWN: f64 = 15.0;
const QUIZ_RATING_POINTS: f64 = 20.0;
const QUIZ_RATING_UNKNOWN: f64 = 10.0;
const QUIZ_EMOTION_POINTS: f64 = 10.0;
const QUIZ_EMOTION_PARTIAL: f64 = 3.0;
const QUIZ_EMOTION_UNSPECIFIED: f64 = 5.0;

/// External catalog ratings are on a 0-5 scale
const EXTERNAL_RATING_SCALE: f64 = 5.0;
const QUIZ_HIGH_RATING: f64 = 4.0;
const GENERIC_EXPLANATION: &str = "Se recomienda este libro basado en tu perfil de lectura.";

/// Rounds to one decimal place
pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

/// Scores a book against a user's preference signal
///
/// Weighted sum of four factors, each on 0-100 before weighting:
/// genre overlap (0.4), average review rating (0.3), recent review activity
/// (0.2) and total review count (0.1). The result is clamped to [0, 100] and
/// rounded to one decimal.
pub fn score_for_recommendation(
    book: &Book,
    target_genres: &PreferenceSignal,
    stats: &ReviewStats,
) -> ScoredCandidate {
    let genre = genre_factor(book, target_genres) * GENRE_WEIGHT;
    let rating = rating_factor(stats) * RATING_WEIGHT;
    let trending = trending_factor(stats) * TRENDING_WEIGHT;
    let popularity = popularity_factor(stats) * POPULARITY_WEIGHT;

    let total = (genre + rating + trending + popularity).clamp(0.0, MAX_SCORE);

    ScoredCandidate {
        book: book.clone(),
        score: round_score(total),
        reasons: recommendation_reasons(book, target_genres, stats),
        breakdown: Some(ScoreBreakdown::Profile {
            genre,
            rating,
            trending,
            popularity,
        }),
    }
}

fn genre_factor(book: &Book, target_genres: &PreferenceSignal) -> f64 {
    if target_genres.is_empty() {
        return NEUTRAL_GENRE_FACTOR;
    }

    let matches = book
        .genres
        .iter()
        .filter(|g| target_genres.contains(g))
        .count();

    matches as f64 / target_genres.len() as f64 * MAX_SCORE
}

/// Average rating rescaled from [1, 5] to [0, 100]
fn rating_factor(stats: &ReviewStats) -> f64 {
    match stats.average {
        Some(average) => {
            let span = f64::from(MAX_RATING - MIN_RATING);
            ((average - f64::from(MIN_RATING)) / span * MAX_SCORE).clamp(0.0, MAX_SCORE)
        }
        None => NEUTRAL_RATING_FACTOR,
    }
}

fn trending_factor(stats: &ReviewStats) -> f64 {
    if stats.count == 0 {
        return UNREVIEWED_TRENDING_FACTOR;
    }

    (stats.recent_count as f64 * POINTS_PER_RECENT_REVIEW).min(MAX_SCORE)
}

fn popularity_factor(stats: &ReviewStats) -> f64 {
    (stats.count as f64).min(MAX_SCORE)
}

/// Human-readable reasons; independent from the score
pub fn recommendation_reasons(
    book: &Book,
    target_genres: &PreferenceSignal,
    stats: &ReviewStats,
) -> Vec<String> {
    let mut reasons = Vec::new();

    let matching: Vec<&str> = book
        .genres
        .iter()
        .filter(|g| target_genres.contains(g))
        .map(String::as_str)
        .collect();
    if !matching.is_empty() {
        reasons.push(format!(
            "Coincide con tu género preferido: {}",
            matching.join(", ")
        ));
    }

    if let Some(average) = stats.average.filter(|avg| *avg >= HIGH_AVERAGE_REASON) {
        reasons.push(format!(
            "Altamente valorado por otros usuarios ({:.1}/5)",
            average
        ));
    }

    if stats.count >= POPULAR_REASON_MIN_REVIEWS {
        reasons.push(format!("Muy popular en BookMatch ({} reseñas)", stats.count));
    }

    if reasons.is_empty() {
        reasons.push(FALLBACK_REASON.to_string());
    }

    reasons
}

/// Scores a book against quiz preferences
///
/// Each component adds to both an accumulated score and an accumulated
/// maximum; the final score is their ratio on a 0-100 scale. Unknown book
/// data earns fixed partial credit rather than zero.
pub fn score_for_quiz(book: &Book, preference: &QuizPreference) -> ScoredCandidate {
    let mut accumulated = 0.0;
    let mut accumulated_max = 0.0;

    let genre = quiz_genre_points(book, preference);
    accumulated += genre;
    accumulated_max += QUIZ_GENRE_POINTS;

    let length = quiz_length_points(book, preference);
    accumulated += length;
    accumulated_max += QUIZ_LENGTH_POINTS;

    let rating = quiz_rating_points(book);
    accumulated += rating;
    accumulated_max += QUIZ_RATING_POINTS;

    let emotion = quiz_emotion_points(book, preference);
    accumulated += emotion;
    accumulated_max += QUIZ_EMOTION_POINTS;

    let score = (accumulated / f64::max(accumulated_max, 1.0) * MAX_SCORE).clamp(0.0, MAX_SCORE);

    ScoredCandidate {
        book: book.clone(),
        score: round_score(score),
        reasons: quiz_match_reasons(book, preference),
        breakdown: Some(ScoreBreakdown::Quiz {
            genre,
            length,
            rating,
            emotion,
        }),
    }
}

fn quiz_genre_points(book: &Book, preference: &QuizPreference) -> f64 {
    match &preference.preferred_genre {
        Some(genre) if book.has_genre_ignore_case(genre) => QUIZ_GENRE_POINTS,
        Some(_) if !book.genres.is_empty() => QUIZ_GENRE_PARTIAL,
        Some(_) => 0.0,
        None => QUIZ_GENRE_UNSPECIFIED,
    }
}

/// Length points, peaking at half the preferred maximum
///
/// In range, points fall linearly with the distance from the midpoint, from
/// the full 30 down to the floor of 20 at either end of the range. Books
/// longer than the maximum earn nothing; unknown lengths earn 15.
fn quiz_length_points(book: &Book, preference: &QuizPreference) -> f64 {
    let Some(pages) = book.known_page_count() else {
        return QUIZ_LENGTH_UNKNOWN;
    };

    if pages > preference.max_pages {
        return 0.0;
    }

    let midpoint = f64::from(preference.max_pages) / 2.0;
    let closeness = 1.0 - (f64::from(pages) - midpoint).abs() / midpoint;
    QUIZ_LENGTH_FLOOR + (QUIZ_LENGTH_POINTS - QUIZ_LENGTH_FLOOR) * closeness.clamp(0.0, 1.0)
}

fn quiz_rating_points(book: &Book) -> f64 {
    match book.known_rating() {
        Some(rating) => rating.min(EXTERNAL_RATING_SCALE) / EXTERNAL_RATING_SCALE * QUIZ_RATING_POINTS,
        None => QUIZ_RATING_UNKNOWN,
    }
}

fn quiz_emotion_points(book: &Book, preference: &QuizPreference) -> f64 {
    match &preference.preferred_emotion {
        Some(emotion) if book.has_tag_ignore_case(emotion) => QUIZ_EMOTION_POINTS,
        Some(_) => QUIZ_EMOTION_PARTIAL,
        None => QUIZ_EMOTION_UNSPECIFIED,
    }
}

/// The quiz factors a book actually matched, as explanation fragments
pub fn quiz_match_reasons(book: &Book, preference: &QuizPreference) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(genre) = preference
        .preferred_genre
        .as_deref()
        .filter(|g| book.has_genre_ignore_case(g))
    {
        reasons.push(format!("coincide con tu género preferido {}", genre));
    }

    if let Some(pages) = book
        .known_page_count()
        .filter(|pages| *pages <= preference.max_pages)
    {
        reasons.push(format!("tiene {} páginas (dentro de tu preferencia)", pages));
    }

    if let Some(rating) = book.known_rating().filter(|r| *r >= QUIZ_HIGH_RATING) {
        reasons.push(format!("tiene muy buenas valoraciones ({:.1}/5)", rating));
    }

    if let Some(emotion) = preference
        .preferred_emotion
        .as_deref()
        .filter(|e| book.has_tag_ignore_case(e))
    {
        reasons.push(format!("es {}", emotion.to_lowercase()));
    }

    reasons
}

/// One-sentence explanation of a quiz match
pub fn explain_quiz_match(book: &Book, preference: &QuizPreference) -> String {
    let reasons = quiz_match_reasons(book, preference);
    if reasons.is_empty() {
        return GENERIC_EXPLANATION.to_string();
    }

    format!("Te recomendamos este libro porque {}.", reasons.join(", "))
}

/// Descending by score; equal scores fall back to ascending book id
pub fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.book.id.cmp(&b.book.id))
}

/// Sorts candidates with [`compare_ranked`] and keeps the best `limit`
pub fn rank_candidates(mut candidates: Vec<ScoredCandidate>, limit: usize) -> Vec<ScoredCandidate> {
    candidates.sort_by(compare_ranked);
    candidates.truncate(limit);
    candidates
}
