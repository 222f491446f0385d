use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::slice::SlicePreset;

/// Opaque handle to the render surface a slot draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

/// Which render target a viewport hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewportKind {
    Stack,
    Volume,
}

impl FromStr for ViewportKind {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stack" => Ok(Self::Stack),
            "volume" | "orthographic" => Ok(Self::Volume),
            _ => Err(ViewerError::UnknownViewportKind(s.to_string())),
        }
    }
}

impl fmt::Display for ViewportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack => f.write_str("stack"),
            Self::Volume => f.write_str("volume"),
        }
    }
}

/// Slicing plane of a volume viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Axial,
    Sagittal,
    Coronal,
    /// Follow the acquisition plane of the first image.
    Acquisition,
}

impl FromStr for Orientation {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "axial" => Ok(Self::Axial),
            "sagittal" => Ok(Self::Sagittal),
            "coronal" => Ok(Self::Coronal),
            "acquisition" => Ok(Self::Acquisition),
            _ => Err(ViewerError::UnknownOrientation(s.to_string())),
        }
    }
}

/// Compositing mode for a volume in a fused viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Composite,
    MaximumIntensity,
    MinimumIntensity,
    AverageIntensity,
}

/// Window width / center pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Voi {
    pub window_width: f64,
    pub window_center: f64,
}

impl Voi {
    pub fn new(window_width: f64, window_center: f64) -> Self {
        Self {
            window_width,
            window_center,
        }
    }

    /// Convert to the `(lower, upper)` intensity range the engine consumes.
    pub fn to_range(&self) -> (f64, f64) {
        let half = self.window_width / 2.0;
        (self.window_center - half, self.window_center + half)
    }
}

/// Where a freshly bound viewport should land in its slice list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialImageOptions {
    pub index: Option<usize>,
    pub preset: Option<SlicePreset>,
}

/// A named synchronizer group (camera, VOI, ...) a viewport participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncGroup {
    pub id: String,
    pub kind: String,
    pub source: bool,
    pub target: bool,
}

/// Resolved per-viewport options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportOptions {
    pub viewport_kind: ViewportKind,
    pub tool_group_id: String,
    pub orientation: Option<Orientation>,
    pub background: [f32; 3],
    pub sync_groups: Vec<SyncGroup>,
    pub initial_image_options: Option<InitialImageOptions>,
}

impl ViewportOptions {
    pub fn new(viewport_kind: ViewportKind, tool_group_id: &str) -> Self {
        Self {
            viewport_kind,
            tool_group_id: tool_group_id.to_string(),
            orientation: None,
            background: [0.0, 0.0, 0.0],
            sync_groups: Vec::new(),
            initial_image_options: None,
        }
    }
}

/// Per-display-set rendering options, index-aligned with the bound display sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySetOptions {
    pub voi: Option<Voi>,
    pub voi_inverted: bool,
    pub blend_mode: Option<BlendMode>,
    pub slab_thickness: Option<f64>,
    pub colormap: Option<String>,
}

/// Lifecycle position of a live slot. Absent descriptors are either not yet
/// created or already disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Enabled,
    DataBound,
}

/// Identity, options and display-set bindings of one on-screen slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportDescriptor {
    slot_index: usize,
    viewport_id: String,
    element: SurfaceHandle,
    state: SlotState,
    viewport_options: ViewportOptions,
    display_set_options: Vec<DisplaySetOptions>,
}

impl ViewportDescriptor {
    pub fn new(
        slot_index: usize,
        viewport_id: &str,
        element: SurfaceHandle,
        viewport_options: ViewportOptions,
    ) -> Self {
        Self {
            slot_index,
            viewport_id: viewport_id.to_string(),
            element,
            state: SlotState::Enabled,
            viewport_options,
            display_set_options: Vec::new(),
        }
    }

    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn viewport_id(&self) -> &str {
        &self.viewport_id
    }

    pub fn element(&self) -> SurfaceHandle {
        self.element
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn viewport_options(&self) -> &ViewportOptions {
        &self.viewport_options
    }

    pub fn display_set_options(&self) -> &[DisplaySetOptions] {
        &self.display_set_options
    }

    /// Options of the first bound display set, or defaults when none are set.
    pub fn first_display_set_options(&self) -> DisplaySetOptions {
        self.display_set_options.first().cloned().unwrap_or_default()
    }

    /// Rebind the slot to a new engine viewport id. Drops back to `Enabled`
    /// until data is set again.
    pub fn rename(&mut self, viewport_id: &str) {
        self.viewport_id = viewport_id.to_string();
        self.state = SlotState::Enabled;
    }

    pub fn set_viewport_options(&mut self, options: ViewportOptions) {
        self.viewport_options = options;
    }

    pub fn set_display_set_options(&mut self, options: Vec<DisplaySetOptions>) {
        self.display_set_options = options;
    }

    pub fn mark_data_bound(&mut self) {
        self.state = SlotState::DataBound;
    }
}
