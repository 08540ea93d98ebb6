use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Book;

/// Genres a user is presumed to like, rebuilt for every request
///
/// Union of the user's explicit genre preferences and the genres of books
/// they rated highly. Each genre appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSignal {
    genres: BTreeSet<String>,
}

impl PreferenceSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a genre; returns false when it was already present
    pub fn insert(&mut self, genre: impl Into<String>) -> bool {
        self.genres.insert(genre.into())
    }

    pub fn contains(&self, genre: &str) -> bool {
        self.genres.contains(genre)
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.genres.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PreferenceSignal {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut signal = Self::new();
        signal.extend(iter);
        signal
    }
}

impl<S: Into<String>> Extend<S> for PreferenceSignal {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for genre in iter {
            self.insert(genre);
        }
    }
}

/// Per-factor contributions behind a score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreBreakdown {
    /// Weighted contributions of the profile scorer (out of 40/30/20/10)
    Profile {
        genre: f64,
        rating: f64,
        trending: f64,
        popularity: f64,
    },
    /// Raw points of the quiz scorer (out of 40/30/20/10)
    Quiz {
        genre: f64,
        length: f64,
        rating: f64,
        emotion: f64,
    },
}

/// A book ranked for one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub book: Book,
    /// Match score in [0, 100], one decimal place
    pub score: f64,
    pub reasons: Vec<String>,
    /// `None` for flat-score results (cold start, quiz fallback)
    pub breakdown: Option<ScoreBreakdown>,
}

impl ScoredCandidate {
    /// A candidate that skipped scoring and carries a flat score
    pub fn unscored(book: Book, score: f64) -> Self {
        Self {
            book,
            score,
            reasons: Vec::new(),
            breakdown: None,
        }
    }
}
