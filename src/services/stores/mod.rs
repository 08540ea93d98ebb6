//! Collaborator abstractions consumed by the recommendation core
//!
//! The scoring and matching code only ever talks to these traits. Each call
//! returns fully materialized data; implementations decide how (PostgreSQL,
//! an in-memory map, a Redis-cached decorator).

use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{Book, BookId, BookQuote, PreferenceSignal, Review, UserId},
};

pub mod cached;
pub mod memory;

pub use cached::CachedCatalog;
pub use memory::InMemoryStore;

/// Source of truth for book metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one book; `NotFound` when it does not exist
    async fn get_book(&self, book_id: BookId) -> AppResult<Book>;

    /// Fetch the full catalog
    async fn all_books(&self) -> AppResult<Vec<Book>>;

    /// Sample up to `n` books
    ///
    /// The sampling strategy is the implementation's business; callers must
    /// not rely on any particular shuffle.
    async fn random_books(&self, n: usize) -> AppResult<Vec<Book>>;

    /// Distinct books carrying at least one of `genres`, excluding every book
    /// already in `exclude_user_id`'s library (any reading status)
    async fn candidates_by_genres(
        &self,
        genres: &PreferenceSignal,
        exclude_user_id: UserId,
    ) -> AppResult<Vec<Book>>;
}

/// User ratings and comments
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    async fn reviews_for_book(&self, book_id: BookId) -> AppResult<Vec<Review>>;

    /// Reviews written by `user_id` rated `min_rating` or higher
    async fn high_rated_reviews(&self, user_id: UserId, min_rating: u8)
        -> AppResult<Vec<Review>>;
}

/// User records, explicit genre preferences and reading lists
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool>;

    /// Names of the genres the user picked in their profile
    async fn genre_preferences(&self, user_id: UserId) -> AppResult<Vec<String>>;

    /// Every book in the user's library, whatever its status
    async fn reading_status_book_ids(&self, user_id: UserId) -> AppResult<HashSet<BookId>>;
}

/// Quotes for the blind date feature
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait QuoteStore: Send + Sync {
    async fn random_quote(&self) -> AppResult<Option<BookQuote>>;

    /// Quotes of books carrying `tag` (case-insensitive)
    async fn quotes_for_tag(&self, tag: &str) -> AppResult<Vec<BookQuote>>;
}
