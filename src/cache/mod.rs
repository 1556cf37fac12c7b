//! Local cache store.
//!
//! - [`CacheIndex`]: the durable location → [`CachedEntry`] map, loaded once
//!   and rewritten wholesale on every update.
//! - [`CachePublisher`]: stages downloads and candidate copies in temporary
//!   files and publishes them into the store, recording the result in the
//!   index.

pub mod entry;
pub mod index;
pub mod publish;

pub use entry::CachedEntry;
pub use index::{CacheIndex, INDEX_FORMAT_VERSION, IndexSnapshot};
pub use publish::{CachePublisher, Download};
