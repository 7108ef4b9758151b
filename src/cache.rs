use std::time::Duration;

use moka::sync::Cache;

/// Rendered-page cache placed in front of the global feed.
pub trait PageCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, page: String);
    /// Drops every cached page.
    fn invalidate(&self);
}

pub struct MokaPageCache {
    pages: Cache<String, String>,
}

impl MokaPageCache {
    pub fn new(ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(ttl)
            .build();
        Self { pages }
    }
}

impl PageCache for MokaPageCache {
    fn get(&self, key: &str) -> Option<String> {
        self.pages.get(key)
    }

    fn set(&self, key: &str, page: String) {
        self.pages.insert(key.to_string(), page);
    }

    fn invalidate(&self) {
        self.pages.invalidate_all();
    }
}

/// Never stores anything. Used when the TTL is configured as zero.
pub struct NoopPageCache;

impl PageCache for NoopPageCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _page: String) {}

    fn invalidate(&self) {}
}

pub fn page_cache_for_ttl(ttl_secs: u64) -> Box<dyn PageCache> {
    if ttl_secs == 0 {
        Box::new(NoopPageCache)
    } else {
        Box::new(MokaPageCache::new(Duration::from_secs(ttl_secs)))
    }
}
