// tagstamp - tag-based cache invalidation for Redis and Memcached
//
// Cached results embed the stamp of the tags they were computed against;
// re-stamping a tag makes every such result stale without deleting it.

// Re-export the cache layer
pub use tagstamp_cache::*;

// Prelude for common imports
pub mod prelude {
    pub use tagstamp_cache::prelude::*;
}
