use chrono::{Duration, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{Book, BookId, PreferenceSignal, ReviewStats, ScoredCandidate, UserId},
    services::{
        scoring::{self, NEUTRAL_SCORE},
        stores::{CatalogStore, ReviewStore, UserStore},
    },
};

/// Tuning knobs of the recommendation flow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationSettings {
    /// Results returned, and the size of the cold-start sample
    pub limit: usize,
    /// Genre candidates below this count trigger a random backfill
    pub min_candidate_pool: usize,
    /// Random books requested when backfilling
    pub backfill_sample_size: usize,
    pub trending_window: Duration,
    /// Reviews at or above this rating feed the preference signal
    pub high_rating_threshold: u8,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            min_candidate_pool: 5,
            backfill_sample_size: 5,
            trending_window: Duration::days(30),
            high_rating_threshold: 4,
        }
    }
}

impl From<&Config> for RecommendationSettings {
    fn from(config: &Config) -> Self {
        Self {
            limit: config.recommendation_limit,
            min_candidate_pool: config.min_candidate_pool,
            backfill_sample_size: config.backfill_sample_size,
            trending_window: config
                .trending_window()
                .unwrap_or(RecommendationSettings::default().trending_window),
            high_rating_threshold: config.high_rating_threshold,
        }
    }
}

/// Builds ranked, personalized book recommendations
///
/// Single pass per request: resolve the user's preference signal, gather
/// candidates (or fall back to a random cold-start sample), score them and
/// return the best few.
pub struct RecommendationService {
    catalog: Arc<dyn CatalogStore>,
    reviews: Arc<dyn ReviewStore>,
    users: Arc<dyn UserStore>,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        reviews: Arc<dyn ReviewStore>,
        users: Arc<dyn UserStore>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            catalog,
            reviews,
            users,
            settings,
        }
    }

    /// Ranked recommendations for a user
    ///
    /// `limit` overrides the configured result count. Every book returned on
    /// the scored path is outside the user's library. Any collaborator error
    /// aborts the whole request.
    #[instrument(skip(self), fields(cold_start = tracing::field::Empty))]
    pub async fn personalized_recommendations(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let limit = limit.unwrap_or(self.settings.limit);
        self.ensure_user_exists(user_id).await?;

        let signal = self.preference_signal(user_id).await?;
        if signal.is_empty() {
            tracing::Span::current().record("cold_start", true);
            return self.cold_start(limit).await;
        }
        tracing::Span::current().record("cold_start", false);

        let candidates = self.candidate_pool(user_id, &signal).await?;
        let stats = self.review_stats(&candidates).await?;

        let scored: Vec<ScoredCandidate> = candidates
            .par_iter()
            .zip(stats.par_iter())
            .map(|(book, stats)| scoring::score_for_recommendation(book, &signal, stats))
            .collect();

        let ranked = scoring::rank_candidates(scored, limit);

        tracing::info!(
            user_id,
            genres = signal.len(),
            returned = ranked.len(),
            top_score = ranked.first().map(|c| c.score),
            "Recommendations ranked"
        );

        Ok(ranked)
    }

    /// Genres the user is presumed to like
    ///
    /// Union of explicit profile preferences and the genres of every book the
    /// user rated at or above the high-rating threshold.
    pub async fn preference_signal(&self, user_id: UserId) -> AppResult<PreferenceSignal> {
        let mut signal: PreferenceSignal =
            self.users.genre_preferences(user_id).await?.into_iter().collect();
        let explicit = signal.len();

        let liked = self
            .reviews
            .high_rated_reviews(user_id, self.settings.high_rating_threshold)
            .await?;

        let mut seen = HashSet::new();
        for review in liked {
            if seen.insert(review.book_id) {
                let book = self.catalog.get_book(review.book_id).await?;
                signal.extend(book.genres);
            }
        }

        tracing::debug!(
            user_id,
            explicit,
            implicit_books = seen.len(),
            genres = signal.len(),
            "Preference signal resolved"
        );

        Ok(signal)
    }

    async fn ensure_user_exists(&self, user_id: UserId) -> AppResult<()> {
        if self.users.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User {} not found", user_id)))
        }
    }

    /// Random books at a flat neutral score, no scoring involved
    async fn cold_start(&self, limit: usize) -> AppResult<Vec<ScoredCandidate>> {
        let books = self.catalog.random_books(limit).await?;
        tracing::info!(returned = books.len(), "No preference data, serving cold start sample");

        Ok(books
            .into_iter()
            .take(limit)
            .map(|book| ScoredCandidate::unscored(book, NEUTRAL_SCORE))
            .collect())
    }

    /// Genre candidates outside the user's library, backfilled when scarce
    ///
    /// The pool never holds the same book twice and never holds a book the
    /// user already has a reading status for. The backfill sample is enlarged
    /// by the size of the library so that filtering it still leaves up to
    /// `backfill_sample_size` new books when the catalog has them.
    async fn candidate_pool(
        &self,
        user_id: UserId,
        signal: &PreferenceSignal,
    ) -> AppResult<Vec<Book>> {
        let library = self.users.reading_status_book_ids(user_id).await?;
        let genre_matches = self.catalog.candidates_by_genres(signal, user_id).await?;

        let mut seen: HashSet<BookId> = HashSet::new();
        let mut pool: Vec<Book> = genre_matches
            .into_iter()
            .filter(|book| !library.contains(&book.id) && seen.insert(book.id))
            .collect();
        let genre_candidates = pool.len();

        if pool.len() < self.settings.min_candidate_pool {
            let filler = self
                .catalog
                .random_books(self.settings.backfill_sample_size + library.len())
                .await?;

            pool.extend(
                filler
                    .into_iter()
                    .filter(|book| !library.contains(&book.id) && seen.insert(book.id))
                    .take(self.settings.backfill_sample_size),
            );

            tracing::debug!(
                user_id,
                genre_candidates,
                backfilled = pool.len() - genre_candidates,
                "Candidate pool backfilled with random books"
            );
        }

        Ok(pool)
    }

    /// Review statistics for every candidate, in candidate order
    async fn review_stats(&self, candidates: &[Book]) -> AppResult<Vec<ReviewStats>> {
        let now = Utc::now();
        let window = self.settings.trending_window;

        // Returning early drops the set, which aborts the fetches still running
        let mut tasks = JoinSet::new();
        for (index, book) in candidates.iter().enumerate() {
            let reviews = Arc::clone(&self.reviews);
            let book_id = book.id;
            tasks.spawn(async move { (index, reviews.reviews_for_book(book_id).await) });
        }

        let mut stats = vec![ReviewStats::default(); candidates.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, reviews) = joined
                .map_err(|e| AppError::Internal(format!("Review fetch task failed: {}", e)))?;
            stats[index] = ReviewStats::from_reviews(&reviews?, now, window);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReadingStatusType, Review, ScoreBreakdown};
    use crate::services::stores::{
        InMemoryStore, MockCatalogStore, MockReviewStore, MockUserStore,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn book(id: BookId, genres: &[&str]) -> Book {
        let mut book = Book::new(id, format!("vol-{}", id), format!("Libro {}", id));
        book.genres = genres.iter().map(|g| g.to_string()).collect();
        book
    }

    fn service_over(store: Arc<InMemoryStore>) -> RecommendationService {
        RecommendationService::new(
            store.clone(),
            store.clone(),
            store,
            RecommendationSettings::default(),
        )
    }

    async fn catalog_of(count: BookId, genres: &[&str]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for id in 1..=count {
            store.insert_book(book(id, genres)).await;
        }
        store
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = catalog_of(3, &["Drama"]).await;
        let service = service_over(store);

        let result = service.personalized_recommendations(42, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cold_start_returns_neutral_random_books() {
        let store = catalog_of(25, &["Drama"]).await;
        store.insert_user(2).await;
        let service = service_over(store);

        let recommendations = service.personalized_recommendations(2, None).await.unwrap();

        assert_eq!(recommendations.len(), 10);
        let ids: HashSet<BookId> = recommendations.iter().map(|c| c.book.id).collect();
        assert_eq!(ids.len(), 10);
        for candidate in &recommendations {
            assert!((1..=25).contains(&candidate.book.id));
            assert_eq!(candidate.score, 50.0);
            assert!(candidate.reasons.is_empty());
            assert!(candidate.breakdown.is_none());
        }
    }

    #[tokio::test]
    async fn test_signal_is_union_of_explicit_and_implicit() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_book(book(1, &["Misterio", "Drama"])).await;
        store.insert_book(book(2, &["Romance"])).await;
        store.add_genre_preference(5, "Drama").await;
        store.add_genre_preference(5, "Fantasía").await;
        let now = Utc::now();
        store.add_review(Review::new(5, 1, 4, now).unwrap()).await;
        store.add_review(Review::new(5, 2, 3, now).unwrap()).await;

        let signal = service_over(store).preference_signal(5).await.unwrap();
        assert_eq!(signal.to_vec(), vec!["Drama", "Fantasía", "Misterio"]);
    }

    #[tokio::test]
    async fn test_library_books_are_never_recommended() {
        let store = catalog_of(12, &["Fantasía"]).await;
        store.add_genre_preference(1, "Fantasía").await;
        store.set_reading_status(1, 3, ReadingStatusType::Read).await;
        store.set_reading_status(1, 7, ReadingStatusType::WantToRead).await;
        store.set_reading_status(1, 9, ReadingStatusType::Dropped).await;
        let service = service_over(store);

        let recommendations = service.personalized_recommendations(1, None).await.unwrap();
        assert_eq!(recommendations.len(), 9);
        assert!(recommendations
            .iter()
            .all(|c| ![3, 7, 9].contains(&c.book.id)));
    }

    #[tokio::test]
    async fn test_results_sorted_with_id_tiebreak_and_truncated() {
        let store = catalog_of(14, &["Fantasía"]).await;
        store.add_genre_preference(1, "Fantasía").await;
        let now = Utc::now();
        // Book 12 gets three recent five-star reviews and should lead
        for reviewer in 20..23 {
            store
                .add_review(Review::new(reviewer, 12, 5, now - Duration::days(1)).unwrap())
                .await;
        }
        let service = service_over(store);

        let recommendations = service.personalized_recommendations(1, None).await.unwrap();
        let ids: Vec<BookId> = recommendations.iter().map(|c| c.book.id).collect();

        assert_eq!(ids, vec![12, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(recommendations
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
        assert!(matches!(
            recommendations[0].breakdown,
            Some(ScoreBreakdown::Profile { .. })
        ));
    }

    #[tokio::test]
    async fn test_limit_override() {
        let store = catalog_of(8, &["Drama"]).await;
        store.add_genre_preference(1, "Drama").await;
        let service = service_over(store);

        let recommendations = service.personalized_recommendations(1, Some(3)).await.unwrap();
        assert_eq!(recommendations.len(), 3);
    }

    #[tokio::test]
    async fn test_backfill_skips_duplicates_and_library_books() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_candidates_by_genres()
            .returning(|_, _| Ok(vec![book(1, &["Drama"]), book(2, &["Drama"]), book(1, &["Drama"])]));
        catalog.expect_random_books().times(1).returning(|n| {
            // Five requested plus one per library book
            assert_eq!(n, 6);
            Ok(vec![book(2, &[]), book(3, &[]), book(4, &[]), book(5, &[]), book(6, &[])])
        });

        let mut reviews = MockReviewStore::new();
        reviews.expect_high_rated_reviews().returning(|_, _| Ok(vec![]));
        reviews.expect_reviews_for_book().returning(|_| Ok(vec![]));

        let mut users = MockUserStore::new();
        users.expect_user_exists().returning(|_| Ok(true));
        users
            .expect_genre_preferences()
            .returning(|_| Ok(vec!["Drama".to_string()]));
        users
            .expect_reading_status_book_ids()
            .returning(|_| Ok(HashSet::from([4])));

        let service = RecommendationService::new(
            Arc::new(catalog),
            Arc::new(reviews),
            Arc::new(users),
            RecommendationSettings::default(),
        );

        let recommendations = service.personalized_recommendations(1, None).await.unwrap();
        let mut ids: Vec<BookId> = recommendations.iter().map(|c| c.book.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 5, 6]);

        // Backfilled books are scored like any other candidate
        let backfilled = recommendations.iter().find(|c| c.book.id == 3).unwrap();
        assert_eq!(backfilled.score, 19.0);
        assert_eq!(backfilled.reasons, vec!["Recomendado basado en tu actividad"]);
    }

    #[tokio::test]
    async fn test_large_pool_is_not_backfilled() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_candidates_by_genres()
            .returning(|_, _| Ok((1..=6).map(|id| book(id, &["Drama"])).collect()));
        catalog.expect_random_books().never();

        let mut reviews = MockReviewStore::new();
        reviews.expect_high_rated_reviews().returning(|_, _| Ok(vec![]));
        reviews.expect_reviews_for_book().returning(|_| Ok(vec![]));

        let mut users = MockUserStore::new();
        users.expect_user_exists().returning(|_| Ok(true));
        users
            .expect_genre_preferences()
            .returning(|_| Ok(vec!["Drama".to_string()]));
        users
            .expect_reading_status_book_ids()
            .returning(|_| Ok(HashSet::new()));

        let service = RecommendationService::new(
            Arc::new(catalog),
            Arc::new(reviews),
            Arc::new(users),
            RecommendationSettings::default(),
        );

        let recommendations = service.personalized_recommendations(1, None).await.unwrap();
        assert_eq!(recommendations.len(), 6);
        assert!(recommendations.iter().all(|c| c.score == 59.0));
    }

    #[tokio::test]
    async fn test_review_store_failure_aborts_request() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_candidates_by_genres()
            .returning(|_, _| Ok((1..=6).map(|id| book(id, &["Drama"])).collect()));

        let mut reviews = MockReviewStore::new();
        reviews.expect_high_rated_reviews().returning(|_, _| Ok(vec![]));
        reviews
            .expect_reviews_for_book()
            .returning(|id| match id {
                4 => Err(AppError::Internal("connection reset".to_string())),
                _ => Ok(vec![]),
            });

        let mut users = MockUserStore::new();
        users.expect_user_exists().returning(|_| Ok(true));
        users
            .expect_genre_preferences()
            .returning(|_| Ok(vec!["Drama".to_string()]));
        users
            .expect_reading_status_book_ids()
            .returning(|_| Ok(HashSet::new()));

        let service = RecommendationService::new(
            Arc::new(catalog),
            Arc::new(reviews),
            Arc::new(users),
            RecommendationSettings::default(),
        );

        let result = service.personalized_recommendations(1, None).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_missing_reviewed_book_aborts_request() {
        let store = catalog_of(3, &["Drama"]).await;
        store.insert_user(1).await;
        store
            .add_review(Review::new(1, 99, 5, Utc::now()).unwrap())
            .await;

        let result = service_over(store).personalized_recommendations(1, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_backfill_reaches_books_past_the_library() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_book(book(1, &["Drama"])).await;
        for id in 2..=8 {
            store.insert_book(book(id, &[])).await;
        }
        store.add_genre_preference(1, "Drama").await;
        for id in 2..=5 {
            store.set_reading_status(1, id, ReadingStatusType::Read).await;
        }

        let recommendations = service_over(store)
            .personalized_recommendations(1, None)
            .await
            .unwrap();

        let mut ids: Vec<BookId> = recommendations.iter().map(|c| c.book.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 6, 7, 8]);
    }

    struct SlowReviews {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ReviewStore for SlowReviews {
        async fn reviews_for_book(&self, book_id: BookId) -> AppResult<Vec<Review>> {
            if book_id == 1 {
                return Err(AppError::Internal("reviews unavailable".to_string()));
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn high_rated_reviews(&self, _: UserId, _: u8) -> AppResult<Vec<Review>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_failed_review_fetch_cancels_the_rest() {
        let store = catalog_of(6, &["Drama"]).await;
        store.add_genre_preference(1, "Drama").await;
        let completed = Arc::new(AtomicUsize::new(0));

        let service = RecommendationService::new(
            store.clone(),
            Arc::new(SlowReviews {
                completed: completed.clone(),
            }),
            store,
            RecommendationSettings::default(),
        );

        let result = service.personalized_recommendations(1, None).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_settings_from_config() {
        let config: Config = envy::from_iter(vec![
            ("RECOMMENDATION_LIMIT".to_string(), "15".to_string()),
            ("TRENDING_WINDOW_DAYS".to_string(), "7".to_string()),
        ])
        .unwrap();

        let settings = RecommendationSettings::from(&config);
        assert_eq!(settings.limit, 15);
        assert_eq!(settings.trending_window, Duration::days(7));
        assert_eq!(settings.min_candidate_pool, 5);
    }

    #[test]
    fn test_out_of_range_window_falls_back_to_default() {
        let config: Config = envy::from_iter(vec![(
            "TRENDING_WINDOW_DAYS".to_string(),
            "999999999999999".to_string(),
        )])
        .unwrap();

        let settings = RecommendationSettings::from(&config);
        assert_eq!(settings.trending_window, Duration::days(30));
    }
}
