use uuid::Uuid;

use radview_core::{Camera, ViewportData, Voi};

/// Identifies one subscription on the [`EventBus`].
pub type SubscriptionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ViewportDataChanged,
    CameraModified,
    VoiModified,
}

#[derive(Debug, Clone)]
pub enum ViewportEvent {
    /// Published before the engine is touched, so UI state can reset even if
    /// the render setup fails afterwards.
    ViewportDataChanged {
        slot_index: usize,
        viewport_id: String,
        data: ViewportData,
    },
    CameraModified {
        viewport_id: String,
        camera: Camera,
    },
    VoiModified {
        viewport_id: String,
        voi: Voi,
        inverted: bool,
    },
}

impl ViewportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ViewportDataChanged { .. } => EventKind::ViewportDataChanged,
            Self::CameraModified { .. } => EventKind::CameraModified,
            Self::VoiModified { .. } => EventKind::VoiModified,
        }
    }

    pub fn viewport_id(&self) -> &str {
        match self {
            Self::ViewportDataChanged { viewport_id, .. }
            | Self::CameraModified { viewport_id, .. }
            | Self::VoiModified { viewport_id, .. } => viewport_id,
        }
    }
}

pub type Listener = Box<dyn Fn(&ViewportEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    /// `None` for session-wide listeners, otherwise the viewport id the
    /// listener is bound to.
    viewport_id: Option<String>,
    listener: Listener,
}

/// Publish/subscribe channel for viewport notifications.
///
/// Viewport-scoped subscriptions are dropped together with the viewport, so a
/// renamed or disabled viewport never keeps stale listeners alive.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> SubscriptionId {
        self.push(kind, None, listener)
    }

    pub fn subscribe_viewport(
        &mut self,
        viewport_id: &str,
        kind: EventKind,
        listener: Listener,
    ) -> SubscriptionId {
        self.push(kind, Some(viewport_id.to_string()), listener)
    }

    fn push(
        &mut self,
        kind: EventKind,
        viewport_id: Option<String>,
        listener: Listener,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscriptions.push(Subscription {
            id,
            kind,
            viewport_id,
            listener,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Remove every listener scoped to `viewport_id`. Returns how many were dropped.
    pub fn drop_viewport(&mut self, viewport_id: &str) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| s.viewport_id.as_deref() != Some(viewport_id));
        before - self.subscriptions.len()
    }

    pub fn publish(&self, event: &ViewportEvent) {
        let kind = event.kind();
        for subscription in &self.subscriptions {
            if subscription.kind != kind {
                continue;
            }
            let in_scope = subscription
                .viewport_id
                .as_deref()
                .map_or(true, |id| id == event.viewport_id());
            if in_scope {
                (subscription.listener)(event);
            }
        }
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
