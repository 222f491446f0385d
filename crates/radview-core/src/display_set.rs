use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// Custom asynchronous load hook for display sets that build their own volume
/// (derived overlays such as segmentations built from a reference volume).
pub trait DisplaySetLoader: fmt::Debug + Send + Sync {
    fn load(&self) -> BoxFuture<'static, Result<(), ViewerError>>;
}

/// What a display set carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplaySetKind {
    /// A plain image series.
    Image,
    /// A segmentation derived from another display set.
    Segmentation { referenced_display_set_uid: String },
}

/// Per-image metadata the engine needs for spatial matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub sop_instance_uid: String,
    pub frame_of_reference_uid: Option<String>,
}

/// A logical, already-demuxed series of images or a derived artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySet {
    pub display_set_instance_uid: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub modality: String,
    pub kind: DisplaySetKind,
    /// Frame of reference declared on the display set itself, when known.
    pub frame_of_reference_uid: Option<String>,
    /// Instances for segmentations, images for plain series.
    pub instances: Vec<ImageMetadata>,
    #[serde(skip)]
    pub loader: Option<Arc<dyn DisplaySetLoader>>,
}

impl DisplaySet {
    pub fn new(display_set_instance_uid: &str, study_instance_uid: &str, modality: &str) -> Self {
        Self {
            display_set_instance_uid: display_set_instance_uid.to_string(),
            study_instance_uid: study_instance_uid.to_string(),
            series_instance_uid: String::new(),
            modality: modality.to_string(),
            kind: DisplaySetKind::Image,
            frame_of_reference_uid: None,
            instances: Vec::new(),
            loader: None,
        }
    }

    pub fn with_frame_of_reference(mut self, frame_of_reference_uid: &str) -> Self {
        self.frame_of_reference_uid = Some(frame_of_reference_uid.to_string());
        self
    }

    pub fn with_instance(mut self, sop_instance_uid: &str, frame_of_reference_uid: Option<&str>) -> Self {
        self.instances.push(ImageMetadata {
            sop_instance_uid: sop_instance_uid.to_string(),
            frame_of_reference_uid: frame_of_reference_uid.map(str::to_string),
        });
        self
    }

    pub fn as_segmentation_of(mut self, referenced_display_set_uid: &str) -> Self {
        self.kind = DisplaySetKind::Segmentation {
            referenced_display_set_uid: referenced_display_set_uid.to_string(),
        };
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn DisplaySetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn is_segmentation(&self) -> bool {
        matches!(self.kind, DisplaySetKind::Segmentation { .. })
    }

    pub fn referenced_display_set_uid(&self) -> Option<&str> {
        match &self.kind {
            DisplaySetKind::Segmentation {
                referenced_display_set_uid,
            } => Some(referenced_display_set_uid),
            DisplaySetKind::Image => None,
        }
    }

    /// Frame of reference for spatial matching: the display set's own value,
    /// falling back to its first instance (segmentations) or first image.
    pub fn frame_of_reference_uid(&self) -> Option<&str> {
        self.frame_of_reference_uid.as_deref().or_else(|| {
            self.instances
                .first()
                .and_then(|first| first.frame_of_reference_uid.as_deref())
        })
    }
}
