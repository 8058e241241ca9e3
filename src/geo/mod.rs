//! Geospatial primitives for proximity search
//!
//! Providers are indexed by a base-32 spatial hash of their base location.
//! Proximity search decomposes a center + radius into a small set of hash
//! string ranges (`hash.rs`), scans each range against the store, then
//! post-filters candidates by true great-circle distance (`distance.rs`).

pub mod distance;
pub mod hash;

pub use distance::haversine_distance;
pub use hash::{cover_radius, encode, HashRange, DEFAULT_PRECISION};
