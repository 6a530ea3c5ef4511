//! Hash collections for the inode cache and the reorder buffer
//!
//! Both are keyed by plain integers and sit on the hot path of every entry.
//! With the `gxhash` feature they use gxhash (needs AES-NI/SSE2 or NEON at
//! compile time); otherwise the std collections are used. Construct them with
//! `Default::default()` so callers compile either way.

/// Map type that uses gxhash when available, std otherwise
#[cfg(feature = "gxhash")]
pub type HashMap<K, V> = gxhash::HashMap<K, V>;

/// Map type that uses gxhash when available, std otherwise
#[cfg(not(feature = "gxhash"))]
pub type HashMap<K, V> = std::collections::HashMap<K, V>;

/// Set type that uses gxhash when available, std otherwise
#[cfg(feature = "gxhash")]
pub type HashSet<T> = gxhash::HashSet<T>;

/// Set type that uses gxhash when available, std otherwise
#[cfg(not(feature = "gxhash"))]
pub type HashSet<T> = std::collections::HashSet<T>;
