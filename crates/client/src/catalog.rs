//! Test catalog browsing.
//!
//! Categories and test listings change rarely, so responses are kept in a
//! `moka` cache for the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use medibook_core::{CategoryId, TestId};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::api::{ApiError, Category, LabApi, LabTest};

/// Maximum number of cached responses.
const CACHE_CAPACITY: u64 = 500;

/// Cache key for catalog responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Tests { category: Option<CategoryId> },
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Tests(Arc<Vec<LabTest>>),
}

/// Read-only catalog of categories and tests.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    api: Arc<dyn LabApi>,
    cache: Cache<CacheKey, CacheValue>,
}

impl Catalog {
    /// Create a catalog whose entries live for `ttl`.
    #[must_use]
    pub fn new(api: Arc<dyn LabApi>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self {
            inner: Arc::new(CatalogInner { api, cache }),
        }
    }

    /// All test categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(self.inner.api.list_categories().await?);
        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Tests in `category`, or every test.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(category = ?category.map(CategoryId::as_str)))]
    pub async fn tests(&self, category: Option<&CategoryId>) -> Result<Arc<Vec<LabTest>>, ApiError> {
        let key = CacheKey::Tests {
            category: category.cloned(),
        };
        if let Some(CacheValue::Tests(tests)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for tests");
            return Ok(tests);
        }

        let tests = Arc::new(self.inner.api.list_tests(category).await?);
        self.inner
            .cache
            .insert(key, CacheValue::Tests(Arc::clone(&tests)))
            .await;
        Ok(tests)
    }

    /// Look a test up by id across the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn find_test(&self, id: &TestId) -> Result<Option<LabTest>, ApiError> {
        let tests = self.tests(None).await?;
        Ok(tests.iter().find(|t| &t.id == id).cloned())
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }
}
