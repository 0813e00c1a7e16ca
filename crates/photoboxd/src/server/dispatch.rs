//! Routes decoded client actions to device operations.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use photobox_core::SessionId;
use photobox_protocol::{ActionRequest, Event};

use crate::device::DeviceOperations;

/// Runs actions and turns their outcomes into events.
///
/// Captures are serialized with a lock so only one talks to the camera at a
/// time. Listing and printing run concurrently with anything.
pub struct ActionDispatcher {
    devices: Arc<DeviceOperations>,
    camera_lock: Mutex<()>,
}

impl ActionDispatcher {
    pub fn new(devices: Arc<DeviceOperations>) -> Self {
        Self {
            devices,
            camera_lock: Mutex::new(()),
        }
    }

    /// Runs `action` on behalf of `session_id`.
    ///
    /// Returns the event to broadcast, or `None` when the outcome is only
    /// logged (a failed listing).
    pub async fn dispatch(&self, session_id: &SessionId, action: ActionRequest) -> Option<Event> {
        info!(session_id = %session_id, action = action.name(), "Action received");

        match action {
            ActionRequest::Capture => {
                let _camera = self.camera_lock.lock().await;
                match self.devices.capture().await {
                    Ok(name) => Some(Event::image_ready(name)),
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Capture failed");
                        Some(Event::capture_error(e.to_string()))
                    }
                }
            }
            ActionRequest::List => match self.devices.list().await {
                Ok(images) => Some(Event::all_images(&images)),
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Failed to list images");
                    None
                }
            },
            ActionRequest::Print { image } => match self.devices.print(&image).await {
                Ok(job) => Some(Event::print_enqueued(job.as_str())),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Print failed");
                    Some(Event::print_error(e.to_string()))
                }
            },
        }
    }
}
