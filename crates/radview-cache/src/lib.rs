//! # Radview Cache
//!
//! Turns display sets into render data. Stacks get a memoized, ordered
//! image-id list; volumes are built once per `(loader scheme, display set)`
//! and shared through [`VolumeCache`], which also de-duplicates constructions
//! that are still in flight.

pub mod materializer;
pub mod volume_cache;

#[cfg(test)]
mod testing;

pub use materializer::DataMaterializer;
pub use volume_cache::{CachedVolume, VolumeCache};
