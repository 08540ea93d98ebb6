use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId, BookQuote, PreferenceSignal, ReadingStatusType, Review, UserId},
};

use super::{CatalogStore, QuoteStore, ReviewStore, UserStore};

/// Library state of one user
#[derive(Debug, Default)]
struct UserRecord {
    genre_preferences: Vec<String>,
    reading_status: HashMap<BookId, ReadingStatusType>,
}

#[derive(Debug, Default)]
struct StoreInner {
    books: BTreeMap<BookId, Book>,
    reviews: Vec<Review>,
    users: HashMap<UserId, UserRecord>,
    quotes: Vec<BookQuote>,
}

/// Store implementing every collaborator trait over in-process maps
///
/// Backs the test suite and the binary's demo mode.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_book(&self, book: Book) {
        self.inner.write().await.books.insert(book.id, book);
    }

    pub async fn insert_user(&self, user_id: UserId) {
        self.inner.write().await.users.entry(user_id).or_default();
    }

    /// Records an explicit genre preference, creating the user if needed
    pub async fn add_genre_preference(&self, user_id: UserId, genre: impl Into<String>) {
        let genre = genre.into();
        let mut inner = self.inner.write().await;
        let user = inner.users.entry(user_id).or_default();
        if !user.genre_preferences.contains(&genre) {
            user.genre_preferences.push(genre);
        }
    }

    /// Puts a book in the user's library, creating the user if needed
    pub async fn set_reading_status(
        &self,
        user_id: UserId,
        book_id: BookId,
        status: ReadingStatusType,
    ) {
        let mut inner = self.inner.write().await;
        inner
            .users
            .entry(user_id)
            .or_default()
            .reading_status
            .insert(book_id, status);
    }

    /// Stores a review; a user reviewing the same book again replaces the old one
    pub async fn add_review(&self, review: Review) {
        let mut inner = self.inner.write().await;
        inner
            .reviews
            .retain(|r| !(r.user_id == review.user_id && r.book_id == review.book_id));
        inner.reviews.push(review);
    }

    pub async fn add_quote(&self, quote: BookQuote) {
        self.inner.write().await.quotes.push(quote);
    }

    /// A small Spanish-language catalog with two users and a few quotes
    ///
    /// User 1 likes fantasy and has a reading list; user 2 has no history at
    /// all and gets cold-start recommendations.
    pub async fn demo() -> AppResult<Self> {
        let store = Self::new();
        let now = Utc::now();

        let catalog: [(&str, &str, u32, f64, &[&str], &[&str]); 12] = [
            ("El nombre del viento", "Patrick Rothfuss", 662, 4.5, &["Fantasía"], &["Emocionante"]),
            ("La historia interminable", "Michael Ende", 448, 4.3, &["Fantasía"], &["Reflexivo"]),
            ("Las brumas de Avalon", "Marion Zimmer Bradley", 384, 4.0, &["Fantasía", "Drama"], &["Conmovedor"]),
            ("Orgullo y prejuicio", "Jane Austen", 352, 4.2, &["Romance"], &["Divertido"]),
            ("Como agua para chocolate", "Laura Esquivel", 256, 3.9, &["Romance", "Drama"], &["Conmovedor"]),
            ("La sombra del viento", "Carlos Ruiz Zafón", 576, 4.4, &["Misterio"], &["Intrigante"]),
            ("El misterio de la cripta embrujada", "Eduardo Mendoza", 192, 3.8, &["Misterio"], &["Divertido"]),
            ("Fahrenheit 451", "Ray Bradbury", 176, 4.0, &["Ciencia Ficción"], &["Reflexivo"]),
            ("Dune", "Frank Herbert", 896, 4.6, &["Ciencia Ficción"], &["Emocionante"]),
            ("La casa de los espíritus", "Isabel Allende", 496, 4.1, &["Drama"], &["Conmovedor"]),
            ("Cien años de soledad", "Gabriel García Márquez", 471, 4.5, &["Drama", "Fantasía"], &["Reflexivo"]),
            ("El principito", "Antoine de Saint-Exupéry", 96, 4.7, &["Fantasía"], &["Conmovedor"]),
        ];

        for (index, (title, author, pages, rating, genres, tags)) in catalog.into_iter().enumerate() {
            let id = index as BookId + 1;
            let mut book = Book::new(id, format!("demo-{:03}", id), title);
            book.authors = Some(author.to_string());
            book.page_count = Some(pages);
            book.average_rating = Some(rating);
            book.genres = genres.iter().map(|g| g.to_string()).collect();
            book.tags = tags.iter().map(|t| t.to_string()).collect();
            store.insert_book(book).await;
        }

        store.add_genre_preference(1, "Fantasía").await;
        store.set_reading_status(1, 1, ReadingStatusType::Read).await;
        store.set_reading_status(1, 12, ReadingStatusType::WantToRead).await;
        store.add_review(Review::new(1, 1, 5, now - Duration::days(3))?).await;
        store.insert_user(2).await;

        for (user_id, book_id, rating, days_ago) in [
            (3, 2, 5, 2),
            (4, 2, 4, 10),
            (3, 6, 5, 40),
            (4, 6, 5, 5),
            (5, 6, 4, 1),
            (3, 11, 3, 90),
        ] {
            store
                .add_review(Review::new(user_id, book_id, rating, now - Duration::days(days_ago))?)
                .await;
        }

        for (id, book_id, text) in [
            (1, 1, "Es la pregunta que hace que la espada cante."),
            (2, 6, "Cada libro, cada tomo que ves, tiene alma."),
            (3, 11, "Muchos años después, frente al pelotón de fusilamiento..."),
            (4, 12, "Lo esencial es invisible a los ojos."),
        ] {
            store
                .add_quote(BookQuote {
                    id,
                    book_id,
                    text: text.to_string(),
                })
                .await;
        }

        Ok(store)
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_book(&self, book_id: BookId) -> AppResult<Book> {
        self.inner
            .read()
            .await
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn all_books(&self) -> AppResult<Vec<Book>> {
        Ok(self.inner.read().await.books.values().cloned().collect())
    }

    async fn random_books(&self, n: usize) -> AppResult<Vec<Book>> {
        let inner = self.inner.read().await;
        let books: Vec<&Book> = inner.books.values().collect();
        let sample = books
            .choose_multiple(&mut rand::thread_rng(), n)
            .map(|book| (*book).clone())
            .collect();
        Ok(sample)
    }

    async fn candidates_by_genres(
        &self,
        genres: &PreferenceSignal,
        exclude_user_id: UserId,
    ) -> AppResult<Vec<Book>> {
        let inner = self.inner.read().await;
        let in_library = inner
            .users
            .get(&exclude_user_id)
            .map(|user| &user.reading_status);

        let candidates = inner
            .books
            .values()
            .filter(|book| book.genres.iter().any(|g| genres.contains(g)))
            .filter(|book| !in_library.is_some_and(|library| library.contains_key(&book.id)))
            .cloned()
            .collect();

        Ok(candidates)
    }
}

#[async_trait::async_trait]
impl ReviewStore for InMemoryStore {
    async fn reviews_for_book(&self, book_id: BookId) -> AppResult<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn high_rated_reviews(
        &self,
        user_id: UserId,
        min_rating: u8,
    ) -> AppResult<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .filter(|r| r.user_id == user_id && r.rating >= min_rating)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.inner.read().await.users.contains_key(&user_id))
    }

    async fn genre_preferences(&self, user_id: UserId) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .map(|user| user.genre_preferences.clone())
            .unwrap_or_default())
    }

    async fn reading_status_book_ids(&self, user_id: UserId) -> AppResult<HashSet<BookId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .map(|user| user.reading_status.keys().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl QuoteStore for InMemoryStore {
    async fn random_quote(&self) -> AppResult<Option<BookQuote>> {
        let inner = self.inner.read().await;
        Ok(inner.quotes.choose(&mut rand::thread_rng()).cloned())
    }

    async fn quotes_for_tag(&self, tag: &str) -> AppResult<Vec<BookQuote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .quotes
            .iter()
            .filter(|quote| {
                inner
                    .books
                    .get(&quote.book_id)
                    .is_some_and(|book| book.has_tag_ignore_case(tag))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: BookId, genres: &[&str]) -> Book {
        let mut book = Book::new(id, format!("vol-{}", id), format!("Libro {}", id));
        book.genres = genres.iter().map(|g| g.to_string()).collect();
        book
    }

    #[tokio::test]
    async fn test_candidates_exclude_library_books() {
        let store = InMemoryStore::new();
        store.insert_book(book(1, &["Fantasía"])).await;
        store.insert_book(book(2, &["Fantasía", "Drama"])).await;
        store.insert_book(book(3, &["Romance"])).await;
        store.set_reading_status(7, 1, ReadingStatusType::Dropped).await;

        let signal: PreferenceSignal = ["Fantasía", "Drama"].into_iter().collect();
        let candidates = store.candidates_by_genres(&signal, 7).await.unwrap();

        let ids: Vec<BookId> = candidates.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_random_books_is_a_distinct_subset() {
        let store = InMemoryStore::new();
        for id in 1..=8 {
            store.insert_book(book(id, &[])).await;
        }

        let sample = store.random_books(5).await.unwrap();
        let ids: HashSet<BookId> = sample.iter().map(|b| b.id).collect();
        assert_eq!(sample.len(), 5);
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|id| (1..=8).contains(id)));

        assert_eq!(store.random_books(20).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_missing_book_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(store.get_book(99).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_high_rated_reviews_filter() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.add_review(Review::new(1, 10, 5, now).unwrap()).await;
        store.add_review(Review::new(1, 11, 3, now).unwrap()).await;
        store.add_review(Review::new(2, 10, 4, now).unwrap()).await;

        let reviews = store.high_rated_reviews(1, 4).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].book_id, 10);
    }

    #[tokio::test]
    async fn test_second_review_replaces_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.add_review(Review::new(1, 10, 2, now).unwrap()).await;
        store.add_review(Review::new(1, 10, 5, now).unwrap()).await;

        let reviews = store.reviews_for_book(10).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 5);
    }

    #[tokio::test]
    async fn test_quotes_for_tag() {
        let store = InMemoryStore::demo().await.unwrap();
        let quotes = store.quotes_for_tag("conmovedor").await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].book_id, 12);

        assert!(store.quotes_for_tag("Aterrador").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_demo_users() {
        let store = InMemoryStore::demo().await.unwrap();
        assert!(store.user_exists(1).await.unwrap());
        assert!(store.user_exists(2).await.unwrap());
        assert!(!store.user_exists(3).await.unwrap());
        assert_eq!(store.genre_preferences(1).await.unwrap(), vec!["Fantasía"]);
        assert!(store.genre_preferences(2).await.unwrap().is_empty());
    }
}
