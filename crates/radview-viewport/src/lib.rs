//! # Radview Viewport
//!
//! Owns the rendering engine and the on-screen viewport slots. Render data
//! from `radview-cache` is bound to engine viewports here: stacks get their
//! windowing once the engine has the images, volumes are attached in one
//! batch and then synchronized with the segmentation registry so every
//! viewport sharing a frame of reference shows the matching segmentations.

pub mod engine;
pub mod events;
pub mod options;
pub mod orchestrator;
pub mod segmentation_sync;
pub mod stack;
pub mod volume;

#[cfg(test)]
mod testing;

pub use engine::{
    EngineViewport, RenderingEngine, RenderingEngineFactory, ViewportInput, ViewportProperties,
};
pub use events::{EventBus, EventKind, Listener, SubscriptionId, ViewportEvent};
pub use options::PublicViewportOptions;
pub use orchestrator::{ViewportLookup, ViewportOrchestrator};
pub use segmentation_sync::{synchronize_segmentations, SyncOutcome};
pub use stack::setup_stack;
pub use volume::{setup_volume, VolumeSetup};
