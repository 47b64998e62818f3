//! In-memory caching for fetched resources.
//!
//! This module provides a transport-agnostic read-through cache that:
//! - Serves live entries without refetching
//! - Treats expiry as a hard cutoff for serving cached data
//! - Optionally revalidates in the background (stale-while-revalidate),
//!   including whenever the consuming context regains focus
//! - Skips caching entirely in a headless context

mod layer;
mod traits;

pub use layer::ResourceCache;
pub(crate) use layer::Revalidator;
pub use traits::{CacheSource, ExecutionContext, FetchOptions};
