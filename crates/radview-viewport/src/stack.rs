use std::sync::Arc;

use futures::future::{self, AbortHandle, FutureExt};
use futures::task::{Spawn, SpawnExt};
use tokio::runtime::Handle;

use radview_core::{
    compute_initial_index, StackRenderData, ViewerError, ViewportDescriptor, ViewportPresentation,
};

use crate::engine::{EngineViewport, ViewportProperties};

/// Starting slice for a stack: the data's explicit index, then a restored
/// presentation, then the descriptor's initial-image options.
pub fn initial_stack_index(
    data: &StackRenderData,
    descriptor: &ViewportDescriptor,
    presentation: Option<&ViewportPresentation>,
) -> usize {
    let slices = data.image_ids.len();
    if let Some(index) = data.initial_image_index {
        return compute_initial_index(slices, Some(index), None);
    }
    if let Some(index) = presentation.and_then(|p| p.image_index) {
        return compute_initial_index(slices, Some(index), None);
    }
    let options = descriptor
        .viewport_options()
        .initial_image_options
        .unwrap_or_default();
    compute_initial_index(slices, options.index, options.preset)
}

enum Scheduler<'a> {
    Spawner(&'a (dyn Spawn + Send + Sync)),
    Runtime(Handle),
}

/// Bind a stack to the engine viewport.
///
/// Windowing, inversion and any restored camera are applied once the engine
/// finishes setting the stack, without blocking the caller. The continuation
/// goes to `spawner` when one is given, else to the current tokio runtime.
/// The returned handle lets the owner abort it if the slot goes away first.
pub fn setup_stack(
    viewport: Arc<dyn EngineViewport>,
    descriptor: &ViewportDescriptor,
    data: &StackRenderData,
    presentation: Option<&ViewportPresentation>,
    spawner: Option<&(dyn Spawn + Send + Sync)>,
) -> Result<AbortHandle, ViewerError> {
    let scheduler = match (spawner, Handle::try_current()) {
        (Some(spawner), _) => Scheduler::Spawner(spawner),
        (None, Ok(runtime)) => Scheduler::Runtime(runtime),
        (None, Err(_)) => {
            return Err(ViewerError::Spawn(format!(
                "no task spawner or tokio runtime for stack setup of {}",
                viewport.id()
            )))
        }
    };

    let index = initial_stack_index(data, descriptor, presentation);
    let properties =
        ViewportProperties::resolve(&descriptor.first_display_set_options(), presentation);
    let camera = presentation.and_then(|p| p.camera);

    log::debug!(
        "Setting stack of {} images on {} at index {}",
        data.image_ids.len(),
        viewport.id(),
        index
    );
    let set_stack = viewport.set_stack(data.image_ids.clone(), index);

    let continuation = async move {
        match set_stack.await {
            Ok(()) => {
                viewport.set_properties(properties);
                if let Some(camera) = camera {
                    viewport.set_camera(camera);
                }
                viewport.render();
            }
            Err(e) => log::error!("Stack setup failed on {}: {}", viewport.id(), e),
        }
    };
    let (task, abort) = future::abortable(continuation);
    let task = task.map(|_| ());

    match scheduler {
        Scheduler::Spawner(spawner) => spawner
            .spawn(task)
            .map_err(|e| ViewerError::Spawn(e.to_string()))?,
        Scheduler::Runtime(runtime) => {
            runtime.spawn(task);
        }
    }
    Ok(abort)
}
