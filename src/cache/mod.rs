//! Content cache.
//!
//! Every provider client owns one [`TaggedCache`]: an in-memory store with
//! lazy TTL expiry and a tag reverse index for bulk invalidation.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_secs = 300
//! max_entries = 10000
//! ```

mod clock;
mod config;
mod keys;
mod lock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use keys::{
    SEARCH_TAG, all_tag_categories, cache_key, canonical_json, change_tags, collection_tags,
    entity_tags, search_tags,
};
pub(crate) use lock::{rw_read, rw_write};
pub use store::TaggedCache;
