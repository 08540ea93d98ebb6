use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};

pub mod quiz;
pub mod recommendation;

pub use quiz::{QuizAnswer, QuizOutcome, QuizPreference};
pub use recommendation::{PreferenceSignal, ScoreBreakdown, ScoredCandidate};

/// Local catalog identifier of a book
pub type BookId = i64;

/// Identifier of a registered reader
pub type UserId = i64;

/// Lowest and highest star ratings a review may carry
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A normalized catalog record
///
/// Books are fully materialized by the stores: genres and tags are plain name
/// sets, so the scoring code never has to go back to a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: BookId,
    /// Identifier in the external catalog (Google Books volume id)
    pub external_id: String,
    pub title: String,
    pub authors: Option<String>,
    pub description: Option<String>,
    pub page_count: Option<u32>,
    /// Average rating reported by the external catalog, on a 0-5 scale
    pub average_rating: Option<f64>,
    pub genres: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl Book {
    /// Creates a book with only its identity; every optional field is empty
    pub fn new(id: BookId, external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            title: title.into(),
            authors: None,
            description: None,
            page_count: None,
            average_rating: None,
            genres: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Page count, treating a zero count as unknown
    pub fn known_page_count(&self) -> Option<u32> {
        self.page_count.filter(|pages| *pages > 0)
    }

    /// External rating, treating zero or negative values as unknown
    pub fn known_rating(&self) -> Option<f64> {
        self.average_rating.filter(|rating| *rating > 0.0)
    }

    pub fn has_genre_ignore_case(&self, genre: &str) -> bool {
        contains_ignore_case(&self.genres, genre)
    }

    pub fn has_tag_ignore_case(&self, tag: &str) -> bool {
        contains_ignore_case(&self.tags, tag)
    }
}

// Unicode-aware: catalog names carry accents ("Fantasía", "Ciencia Ficción").
fn contains_ignore_case(names: &BTreeSet<String>, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    names.iter().any(|name| name.to_lowercase() == needle)
}

/// A user's review of a book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub user_id: UserId,
    pub book_id: BookId,
    /// Star rating, 1 to 5
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Creates a review, rejecting ratings outside 1..=5
    pub fn new(
        user_id: UserId,
        book_id: BookId,
        rating: u8,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between {} and {}, got {}",
                MIN_RATING, MAX_RATING, rating
            )));
        }

        Ok(Self {
            user_id,
            book_id,
            rating,
            comment: None,
            created_at,
        })
    }
}

/// Where a book sits in a user's library
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatusType {
    WantToRead,
    Reading,
    Read,
    Dropped,
}

/// A quote used by the blind date feature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookQuote {
    pub id: i64,
    pub book_id: BookId,
    pub text: String,
}

/// Quote teaser returned by the blind date feature
///
/// Never carries title or authors; the client reveals the book later
/// through its external id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlindDate {
    pub quote_id: i64,
    pub quote_text: String,
    pub external_id: String,
    pub genre_hint: String,
}

/// Aggregate review signal for a single book
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewStats {
    /// Total number of reviews
    pub count: usize,
    /// Mean star rating, `None` without reviews
    pub average: Option<f64>,
    /// Reviews created inside the trending window
    pub recent_count: usize,
}

impl ReviewStats {
    /// Summarizes reviews relative to `now`
    ///
    /// A review is recent when it was created strictly after `now - window`.
    pub fn from_reviews(reviews: &[Review], now: DateTime<Utc>, window: Duration) -> Self {
        if reviews.is_empty() {
            return Self::default();
        }

        let cutoff = now - window;
        let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        let recent_count = reviews.iter().filter(|r| r.created_at > cutoff).count();

        Self {
            count: reviews.len(),
            average: Some(f64::from(total) / reviews.len() as f64),
            recent_count,
        }
    }
}
