//! Query cache: keyed results with staleness, generation-tagged reads and
//! optimistic layers owned by mutation transactions.

pub mod entry;
pub mod key;
pub mod query_cache;

pub use entry::{CachedValue, Generation, Speculation};
pub use key::{KeyPart, QueryKey};
pub use query_cache::{CacheEvent, CacheEventKind, QueryCache};
