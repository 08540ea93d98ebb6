use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{Book, BookId, PreferenceSignal, UserId},
};

use super::CatalogStore;

/// Catalog decorator that serves stable reads from Redis
///
/// Only `get_book` and `all_books` are cached. Random samples must stay
/// random and genre candidates depend on the user's library, so both always
/// reach the wrapped store.
pub struct CachedCatalog {
    inner: Arc<dyn CatalogStore>,
    cache: Cache,
    ttl: u64,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CatalogStore>, cache: Cache, ttl: u64) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait::async_trait]
impl CatalogStore for CachedCatalog {
    async fn get_book(&self, book_id: BookId) -> AppResult<Book> {
        cached!(self.cache, CacheKey::Book(book_id), self.ttl, self.inner.get_book(book_id))
    }

    async fn all_books(&self) -> AppResult<Vec<Book>> {
        cached!(self.cache, CacheKey::Catalog, self.ttl, self.inner.all_books())
    }

    async fn random_books(&self, n: usize) -> AppResult<Vec<Book>> {
        self.inner.random_books(n).await
    }

    async fn candidates_by_genres(
        &self,
        genres: &PreferenceSignal,
        exclude_user_id: UserId,
    ) -> AppResult<Vec<Book>> {
        self.inner.candidates_by_genres(genres, exclude_user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::services::stores::MockCatalogStore;

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_second_read_is_served_from_cache() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        let (cache, _handle) = Cache::new(client.clone());

        let mut inner = MockCatalogStore::new();
        inner
            .expect_get_book()
            .times(1)
            .returning(|id| Ok(Book::new(id, "vol-cached", "Una vez")));

        let catalog = CachedCatalog::new(Arc::new(inner), cache, 60);
        let first = catalog.get_book(555_001).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let second = catalog.get_book(555_001).await.unwrap();
        assert_eq!(first, second);

        use redis::AsyncCommands;
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(CacheKey::Book(555_001).to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_random_books_bypass_cache() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, _handle) = Cache::new(client);

        let mut inner = MockCatalogStore::new();
        inner
            .expect_random_books()
            .times(1)
            .returning(|n| Ok((1..=n as BookId).map(|id| Book::new(id, "vol", "Azar")).collect()));

        let catalog = CachedCatalog::new(Arc::new(inner), cache, 60);
        assert_eq!(catalog.random_books(3).await.unwrap().len(), 3);
    }
}
