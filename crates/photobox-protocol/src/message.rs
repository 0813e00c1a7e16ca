//! Protocol message types for hub communication.

use photobox_core::{ImageName, InterruptSignal};
use serde::{Deserialize, Serialize};

/// Requests a client can send to the hub.
///
/// Encoded as a JSON object discriminated by the `action` field:
/// `{"action":"capture"}`, `{"action":"list"}`,
/// `{"action":"print","image":"data:image/jpeg;base64,..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionRequest {
    /// Take a photo and store it under the next sequence number
    Capture,

    /// Send the list of stored images
    List,

    /// Print an image supplied by the client
    Print {
        /// Encoded image (base64, optionally as a `data:` URL)
        image: String,
    },
}

impl ActionRequest {
    /// Returns the wire name of the action, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::List => "list",
            Self::Print { .. } => "print",
        }
    }
}

/// Events broadcast from the hub to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// A new photo was stored
    ImageReady {
        /// File name in the store, e.g. `0008.jpg`
        filename: String,
        /// File name without extension, e.g. `0008`
        name: String,
    },

    /// Capturing a photo failed
    CaptureError {
        /// Short description of the failure
        error: String,
    },

    /// Every image currently in the store
    AllImages {
        /// File names in ascending order
        images: Vec<String>,
    },

    /// A print job was accepted by the print pipeline
    PrintEnqueued {
        /// Job identifier assigned by the print pipeline
        #[serde(rename = "jobId")]
        job_id: String,
    },

    /// Printing failed
    PrintError {
        /// Short description of the failure
        error: String,
    },

    /// The shutter button was pressed
    ButtonPressed,

    /// The settings button was pressed
    Settings,
}

impl Event {
    /// Creates an image ready notification.
    pub fn image_ready(image: ImageName) -> Self {
        Self::ImageReady {
            filename: image.file_name(),
            name: image.stem(),
        }
    }

    /// Creates a capture error notification.
    pub fn capture_error(error: impl Into<String>) -> Self {
        Self::CaptureError {
            error: error.into(),
        }
    }

    /// Creates the image list notification.
    pub fn all_images(images: &[ImageName]) -> Self {
        Self::AllImages {
            images: images.iter().map(ImageName::file_name).collect(),
        }
    }

    /// Creates a print enqueued notification.
    pub fn print_enqueued(job_id: impl Into<String>) -> Self {
        Self::PrintEnqueued {
            job_id: job_id.into(),
        }
    }

    /// Creates a print error notification.
    pub fn print_error(error: impl Into<String>) -> Self {
        Self::PrintError {
            error: error.into(),
        }
    }

    /// Returns the wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ImageReady { .. } => "imageReady",
            Self::CaptureError { .. } => "captureError",
            Self::AllImages { .. } => "allImages",
            Self::PrintEnqueued { .. } => "printEnqueued",
            Self::PrintError { .. } => "printError",
            Self::ButtonPressed => "buttonPressed",
            Self::Settings => "settings",
        }
    }
}

impl From<InterruptSignal> for Event {
    fn from(signal: InterruptSignal) -> Self {
        match signal {
            InterruptSignal::ButtonPressed => Self::ButtonPressed,
            InterruptSignal::Settings => Self::Settings,
        }
    }
}
