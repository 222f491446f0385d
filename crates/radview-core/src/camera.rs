use serde::{Deserialize, Serialize};

use crate::descriptor::Voi;

/// Camera transform of a viewport, in patient coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: [f64; 3],
    pub focal_point: [f64; 3],
    pub view_up: [f64; 3],
    pub parallel_scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 1.0],
            focal_point: [0.0, 0.0, 0.0],
            view_up: [0.0, -1.0, 0.0],
            parallel_scale: 1.0,
        }
    }
}

/// What the user was looking at in a viewport, restorable after a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportPresentation {
    pub camera: Option<Camera>,
    pub voi: Option<Voi>,
    pub voi_inverted: bool,
    pub image_index: Option<usize>,
}
