//! Helper functions for common tag workflows.

use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::tag::TagRecord;
use crate::traits::TagCache;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Read the named tags, stamping the ones that have no record yet.
///
/// Missing tags are stamped at the current time and written with
/// [`TagCache::init_tags`]. Returns a record for every requested name.
pub async fn ensure_tags<T>(cache: &T, names: &[&str]) -> CacheResult<HashMap<String, TagRecord>>
where
    T: TagCache + ?Sized,
{
    let mut records = cache.get_tags_data(names).await?;

    let missing: Vec<TagRecord> = names
        .iter()
        .filter(|name| !records.contains_key(**name))
        .map(|name| TagRecord::new(*name).touch())
        .collect();

    if !missing.is_empty() {
        debug!(count = missing.len(), "Stamping missing tags");
        cache.init_tags(&missing).await?;
        records.extend(missing.into_iter().map(|tag| (tag.name.clone(), tag)));
    }

    Ok(records)
}

/// Store `entry` stamped with the record of its id tag.
///
/// The entry keeps its own stamp when the id tag has no record.
pub async fn set_stamped<T>(
    cache: &T,
    key: &str,
    entry: CacheEntry,
    tags: &HashMap<String, TagRecord>,
    ttl: Option<Duration>,
) -> CacheResult<()>
where
    T: TagCache + ?Sized,
{
    let entry = match tags.get(&entry.id_tag) {
        Some(tag) => entry.stamped_by(tag),
        None => entry,
    };
    cache.set(key, &entry, ttl).await
}
