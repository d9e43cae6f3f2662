//! Infrastructure layer - cache backends and factory

pub mod cache;
