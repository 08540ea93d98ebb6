use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{BlindDate, BookQuote},
    services::stores::{CatalogStore, QuoteStore},
};

const DEFAULT_HINT: &str = "Misterio";
const DEFAULT_TAG_HINT: &str = "Varios";

/// Serves a quote from a book without revealing which book it is
pub struct BlindDateSelector {
    quotes: Arc<dyn QuoteStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl BlindDateSelector {
    pub fn new(quotes: Arc<dyn QuoteStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { quotes, catalog }
    }

    /// A random quote from the whole collection
    pub async fn blind_date(&self) -> AppResult<BlindDate> {
        let quote = self
            .quotes
            .random_quote()
            .await?
            .ok_or_else(|| AppError::NotFound("No quotes available".to_string()))?;

        self.reveal(quote, DEFAULT_HINT).await
    }

    /// A random quote among books carrying `tag`
    pub async fn blind_date_by_tag(&self, tag: &str) -> AppResult<BlindDate> {
        let quotes = self.quotes.quotes_for_tag(tag).await?;
        let quote = quotes
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No quotes found for tag {}", tag)))?;

        tracing::debug!(tag, candidates = quotes.len(), quote_id = quote.id, "Blind date picked");
        self.reveal(quote, DEFAULT_TAG_HINT).await
    }

    async fn reveal(&self, quote: BookQuote, default_hint: &str) -> AppResult<BlindDate> {
        let book = self.catalog.get_book(quote.book_id).await?;
        let genre_hint = book
            .genres
            .into_iter()
            .next()
            .unwrap_or_else(|| default_hint.to_string());

        Ok(BlindDate {
            quote_id: quote.id,
            quote_text: quote.text,
            external_id: book.external_id,
            genre_hint,
        })
    }
}
