//! Headless walkthrough of the viewport engine.
//!
//! Usage: `radview-demo [settings.json]`. Set `RUST_LOG=debug` to follow the
//! engine calls.

mod memory;

use std::error::Error;
use std::sync::Arc;

use radview_cache::DataMaterializer;
use radview_core::{
    DisplaySet, DisplaySetOptions, DisplaySetService, InitialImageOptions, Segmentation, Services,
    SlicePreset, SurfaceHandle, ViewerSettings, ViewportKind, ViewportOptions, Voi,
};
use radview_viewport::{
    EventKind, PublicViewportOptions, RenderingEngine, ViewportEvent, ViewportLookup,
    ViewportOrchestrator,
};

use memory::{
    LoggingEngine, MemoryDisplaySets, MemorySegmentations, MemoryVolumeFactory, NoHangingProtocol,
    SingleToolGroup, SyntheticDataSource,
};

fn load_settings() -> Result<ViewerSettings, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            log::info!("Loaded settings from {}", path);
            Ok(ViewerSettings::from_json(&json)?)
        }
        None => Ok(ViewerSettings::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let settings = load_settings()?;

    // ── Study ────────────────────────────────────────────────────────
    let display_sets = Arc::new(MemoryDisplaySets::default());
    let factory = Arc::new(MemoryVolumeFactory::default());
    let segmentations = Arc::new(MemorySegmentations::default());

    display_sets.add(DisplaySet::new("ct", "study-1", "CT").with_frame_of_reference("FOR-1"));
    display_sets.add(
        DisplaySet::new("seg", "study-1", "SEG")
            .as_segmentation_of("ct")
            .with_instance("seg.1", Some("FOR-1")),
    );
    factory.register(&settings.volume_id_for("ct"), "FOR-1");
    segmentations.add(
        Segmentation::new("seg", "Liver")
            .hydrated()
            .with_frame_of_reference("FOR-1"),
    );

    let services = Services {
        display_sets: display_sets.clone(),
        segmentations,
        tool_groups: Arc::new(SingleToolGroup(settings.default_tool_group_id.clone())),
        hanging_protocol: Arc::new(NoHangingProtocol),
    };
    let data_source = Arc::new(SyntheticDataSource { images_per_set: 120 });
    let materializer = Arc::new(DataMaterializer::new(settings.clone(), factory));

    let mut orchestrator = ViewportOrchestrator::new(
        settings.clone(),
        || -> Box<dyn RenderingEngine> { Box::new(LoggingEngine::default()) },
        materializer.clone(),
        data_source.clone(),
        services,
    );
    orchestrator.subscribe(
        EventKind::ViewportDataChanged,
        Box::new(|event| log::info!("Data changed on {}", event.viewport_id())),
    );

    // ── Layout ───────────────────────────────────────────────────────
    let mut stack_options = ViewportOptions::new(ViewportKind::Stack, "");
    stack_options.initial_image_options = Some(InitialImageOptions {
        index: None,
        preset: Some(SlicePreset::Middle),
    });
    orchestrator.enable_viewport(0, "stack-0", stack_options, SurfaceHandle(1))?;
    orchestrator.enable_viewport(
        1,
        "mpr-axial",
        ViewportOptions::new(ViewportKind::Volume, ""),
        SurfaceHandle(2),
    )?;

    let ct = display_sets.get_display_set_by_uid("ct").ok_or("ct display set missing")?;

    let stack = materializer
        .create_viewport_data(
            std::slice::from_ref(&ct),
            ViewportKind::Stack,
            data_source.as_ref(),
            None,
        )
        .await?;
    orchestrator
        .set_viewport_data(
            0,
            stack,
            PublicViewportOptions::default(),
            vec![DisplaySetOptions {
                voi: Some(Voi::new(400.0, 40.0)),
                ..Default::default()
            }],
        )
        .await?;

    let volume = materializer
        .create_viewport_data(&[ct], ViewportKind::Volume, data_source.as_ref(), None)
        .await?;
    orchestrator
        .set_viewport_data(1, volume, PublicViewportOptions::default(), vec![])
        .await?;

    // Let deferred stack windowing run.
    tokio::task::yield_now().await;

    orchestrator.publish_viewport_event(ViewportEvent::VoiModified {
        viewport_id: "stack-0".to_string(),
        voi: Voi::new(1500.0, -600.0),
        inverted: false,
    });

    for viewport_id in orchestrator.viewport_ids() {
        if let Some(info) = orchestrator.get_viewport_info(ViewportLookup::Id(&viewport_id)) {
            log::info!("Slot {} -> {} ({:?})", info.slot_index(), viewport_id, info.state());
        }
        if let Some(presentation) = orchestrator.get_presentation(&viewport_id) {
            println!("{}: {}", viewport_id, serde_json::to_string(&presentation)?);
        }
    }
    println!(
        "cache: {} bytes used, {} bytes free",
        orchestrator.get_cache_size(),
        orchestrator.get_cache_free_space()
    );

    orchestrator.destroy();
    Ok(())
}
