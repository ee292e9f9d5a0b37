/// Read-through caching for async computations.
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block`, hands the result to the cache's background writer with `$ttl`
/// seconds to live, and returns it. Errors from `$block` propagate with `?`
/// and are never cached.
///
/// # Example
/// ```rust,ignore
/// let details: TmdbMovieDetails = cached!(cache, CacheKey::MovieDetails(id), 86_400, async {
///     fetch_details(id).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
