/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value for `$key` when present. On a miss, awaits
/// `$block`, queues the result for a background write with `$ttl` seconds to
/// live, and returns it. Errors from the cache read or from `$block` are
/// propagated with `?`, so the surrounding function must return `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let books: Vec<Book> = cached!(self.cache, CacheKey::Catalog, self.ttl, self.inner.all_books())?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        if let Some(hit) = $cache.get_from_cache(&key).await? {
            tracing::debug!(key = %key, "Cache hit");
            Ok(hit)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
