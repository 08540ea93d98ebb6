use chrono::NaiveDateTime;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId, BookQuote, PreferenceSignal, Review, UserId},
    services::stores::{CatalogStore, QuoteStore, ReviewStore, UserStore},
};

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

// Every book query selects these columns so rows map onto `BookRow`.
// Genres and tags are aggregated eagerly; callers never lazy-load.
const BOOK_COLUMNS: &str = r#"
    b.book_id,
    b.google_book_id,
    b.title,
    b.authors,
    b.description,
    b.page_count,
    b.average_rating_api,
    ARRAY(
        SELECT g.name FROM book_genres bg
        JOIN genres g ON g.genre_id = bg.genre_id
        WHERE bg.book_id = b.book_id
    ) AS genres,
    ARRAY(
        SELECT t.name FROM book_tags bt
        JOIN tags t ON t.tag_id = bt.tag_id
        WHERE bt.book_id = b.book_id
    ) AS tags
"#;

#[derive(Debug, FromRow)]
struct BookRow {
    book_id: i64,
    google_book_id: String,
    title: String,
    authors: Option<String>,
    description: Option<String>,
    page_count: Option<i32>,
    average_rating_api: Option<f64>,
    genres: Vec<String>,
    tags: Vec<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.book_id,
            external_id: row.google_book_id,
            title: row.title,
            authors: row.authors,
            description: row.description,
            page_count: row.page_count.and_then(|p| u32::try_from(p).ok()),
            average_rating: row.average_rating_api,
            genres: row.genres.into_iter().collect(),
            tags: row.tags.into_iter().collect(),
        }
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    user_id: i64,
    book_id: i64,
    rating: i32,
    comment: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> AppResult<Self> {
        let rating = u8::try_from(row.rating).map_err(|_| {
            AppError::Internal(format!(
                "Review of book {} by user {} has invalid rating {}",
                row.book_id, row.user_id, row.rating
            ))
        })?;

        let mut review = Review::new(row.user_id, row.book_id, rating, row.created_at.and_utc())?;
        review.comment = row.comment;
        Ok(review)
    }
}

#[derive(Debug, FromRow)]
struct QuoteRow {
    quote_id: i64,
    book_id: i64,
    quote_text: String,
}

impl From<QuoteRow> for BookQuote {
    fn from(row: QuoteRow) -> Self {
        BookQuote {
            id: row.quote_id,
            book_id: row.book_id,
            text: row.quote_text,
        }
    }
}

fn into_reviews(rows: Vec<ReviewRow>) -> AppResult<Vec<Review>> {
    rows.into_iter().map(Review::try_from).collect()
}

/// PostgreSQL implementation of every collaborator store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn get_book(&self, book_id: BookId) -> AppResult<Book> {
        let sql = format!("SELECT {} FROM books b WHERE b.book_id = $1", BOOK_COLUMNS);
        sqlx::query_as::<_, BookRow>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Book::from)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn all_books(&self) -> AppResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books b ORDER BY b.book_id", BOOK_COLUMNS);
        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn random_books(&self, n: usize) -> AppResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books b ORDER BY random() LIMIT $1", BOOK_COLUMNS);
        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .bind(i64::try_from(n).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn candidates_by_genres(
        &self,
        genres: &PreferenceSignal,
        exclude_user_id: UserId,
    ) -> AppResult<Vec<Book>> {
        let sql = format!(
            r#"
            SELECT {} FROM books b
            WHERE EXISTS (
                SELECT 1 FROM book_genres bg
                JOIN genres g ON g.genre_id = bg.genre_id
                WHERE bg.book_id = b.book_id AND g.name = ANY($1)
            )
            AND b.book_id NOT IN (
                SELECT rs.book_id FROM reading_status rs WHERE rs.user_id = $2
            )
            ORDER BY b.book_id
            "#,
            BOOK_COLUMNS
        );

        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .bind(genres.to_vec())
            .bind(exclude_user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Book::from).collect())
    }
}

#[async_trait::async_trait]
impl ReviewStore for PgStore {
    async fn reviews_for_book(&self, book_id: BookId) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT user_id, book_id, rating, comment, created_at FROM reviews WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        into_reviews(rows)
    }

    async fn high_rated_reviews(
        &self,
        user_id: UserId,
        min_rating: u8,
    ) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT user_id, book_id, rating, comment, created_at
            FROM reviews
            WHERE user_id = $1 AND rating >= $2
            "#,
        )
        .bind(user_id)
        .bind(i32::from(min_rating))
        .fetch_all(&self.pool)
        .await?;

        into_reviews(rows)
    }
}

#[async_trait::async_trait]
impl UserStore for PgStore {
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn genre_preferences(&self, user_id: UserId) -> AppResult<Vec<String>> {
        let genres: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT g.name FROM user_genre_preferences p
            JOIN genres g ON g.genre_id = p.genre_id
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn reading_status_book_ids(&self, user_id: UserId) -> AppResult<HashSet<BookId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT book_id FROM reading_status WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl QuoteStore for PgStore {
    async fn random_quote(&self) -> AppResult<Option<BookQuote>> {
        let row = sqlx::query_as::<_, QuoteRow>(
            "SELECT quote_id, book_id, quote_text FROM book_quotes ORDER BY random() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BookQuote::from))
    }

    async fn quotes_for_tag(&self, tag: &str) -> AppResult<Vec<BookQuote>> {
        let rows = sqlx::query_as::<_, QuoteRow>(
            r#"
            SELECT q.quote_id, q.book_id, q.quote_text
            FROM book_quotes q
            JOIN book_tags bt ON bt.book_id = q.book_id
            JOIN tags t ON t.tag_id = bt.tag_id
            WHERE lower(t.name) = lower($1)
            ORDER BY q.quote_id
            "#,
        )
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BookQuote::from).collect())
    }
}
