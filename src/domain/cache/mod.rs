//! Cache domain - namespacing, trait contract, typed operations

mod key;
mod repository;

pub use key::KeyNamespace;
pub use repository::{Cache, CacheExt};
