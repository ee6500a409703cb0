use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use doctor_cell::TimeRange;

use crate::models::{Appointment, AppointmentStatus};

/// Emitted after a mutation has been committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppointmentEvent {
    Booked {
        appointment: Appointment,
    },
    Rescheduled {
        appointment: Appointment,
        previous: TimeRange,
    },
    Cancelled {
        appointment: Appointment,
    },
    StatusChanged {
        appointment: Appointment,
        from: AppointmentStatus,
    },
}

impl AppointmentEvent {
    pub fn appointment(&self) -> &Appointment {
        match self {
            AppointmentEvent::Booked { appointment }
            | AppointmentEvent::Rescheduled { appointment, .. }
            | AppointmentEvent::Cancelled { appointment }
            | AppointmentEvent::StatusChanged { appointment, .. } => appointment,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppointmentEvent::Booked { .. } => "booked",
            AppointmentEvent::Rescheduled { .. } => "rescheduled",
            AppointmentEvent::Cancelled { .. } => "cancelled",
            AppointmentEvent::StatusChanged { .. } => "status_changed",
        }
    }
}

/// Fire-and-forget sink. Implementations must not block and never report
/// failure back to the caller.
pub trait AppointmentNotifier: Send + Sync {
    fn notify(&self, event: AppointmentEvent);
}

/// In-process fan-out over a tokio broadcast channel.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<AppointmentEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppointmentEvent> {
        self.sender.subscribe()
    }
}

impl AppointmentNotifier for BroadcastNotifier {
    fn notify(&self, event: AppointmentEvent) {
        let id = event.appointment().id;
        let name = event.name();
        if self.sender.send(event).is_err() {
            debug!("No subscribers for {} event of appointment {}", name, id);
        }
    }
}

/// POSTs each event as JSON to an external notification service.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

impl AppointmentNotifier for WebhookNotifier {
    fn notify(&self, event: AppointmentEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, dropping {} notification", event.name());
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();

        handle.spawn(async move {
            let id = event.appointment().id;
            match client.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Delivered {} notification for appointment {}", event.name(), id);
                }
                Ok(response) => {
                    error!(
                        "Notification endpoint rejected {} event for appointment {}: {}",
                        event.name(),
                        id,
                        response.status()
                    );
                }
                Err(e) => {
                    error!("Failed to deliver {} notification for appointment {}: {}", event.name(), id, e);
                }
            }
        });
    }
}

/// Delivers every event to each inner notifier.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn AppointmentNotifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn AppointmentNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }
}

impl AppointmentNotifier for CompositeNotifier {
    fn notify(&self, event: AppointmentEvent) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }
}
