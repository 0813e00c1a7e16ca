//! Device operations: capture, list and print.
//!
//! `DeviceOperations` runs each action against its external collaborators
//! (camera, image store, print pipeline) and returns the outcome as a plain
//! `Result`. Turning outcomes into broadcast events is the hub's job.
//!
//! Overlapping captures are not guarded here. The hub holds a camera lock
//! around `capture` so only one runs against the physical camera at a time.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Every collaborator failure becomes a `DeviceError`

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use photobox_core::{ImageName, ImageStore, StoreError};
use photobox_protocol::{decode_image_payload, ProtocolError};

use crate::config::Config;

mod camera;
mod command;
mod printer;

pub use camera::{Camera, CameraFile, Gphoto2Camera};
pub use command::CommandError;
pub use printer::{JobId, LpPrinter, PrintPipeline};

/// Errors raised by device operations.
///
/// The `Display` text is what clients see in `captureError` / `printError`.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no camera detected")]
    NoCamera,

    #[error("camera {step} failed: {source}")]
    Camera {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("unexpected camera output during {step}")]
    UnexpectedOutput { step: &'static str },

    #[error("image transfer failed: {0}")]
    Transfer(#[source] std::io::Error),

    #[error("image store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payload(#[from] ProtocolError),

    #[error("cannot stage print file: {0}")]
    Staging(#[source] std::io::Error),

    #[error("print submission failed: {0}")]
    Print(#[source] CommandError),

    #[error("print pipeline returned no job id")]
    NoJobId,

    #[error("device task failed: {0}")]
    Task(String),
}

/// The three device-facing actions of the photo station.
pub struct DeviceOperations {
    store: ImageStore,
    staging_dir: PathBuf,
    camera: Arc<dyn Camera>,
    printer: Arc<dyn PrintPipeline>,
    print_counter: AtomicU64,
}

impl DeviceOperations {
    /// Creates device operations over explicit collaborators.
    pub fn new(
        store: ImageStore,
        staging_dir: impl Into<PathBuf>,
        camera: Arc<dyn Camera>,
        printer: Arc<dyn PrintPipeline>,
    ) -> Self {
        Self {
            store,
            staging_dir: staging_dir.into(),
            camera,
            printer,
            print_counter: AtomicU64::new(0),
        }
    }

    /// Creates device operations backed by gphoto2 and CUPS.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ImageStore::new(&config.image_dir),
            &config.staging_dir,
            Arc::new(Gphoto2Camera::new(&config.camera)),
            Arc::new(LpPrinter::new(&config.printer)),
        )
    }

    /// Takes a photo and stores it under the next sequence number.
    ///
    /// The camera is released on every path after a successful open. On
    /// failure the store is left unchanged.
    pub async fn capture(&self) -> Result<ImageName, DeviceError> {
        self.camera.open().await?;

        let result = self.capture_into_store().await;

        if let Err(e) = self.camera.release().await {
            warn!(error = %e, "Failed to release camera");
        }
        result
    }

    async fn capture_into_store(&self) -> Result<ImageName, DeviceError> {
        let file = self.camera.capture().await?;
        let bytes = self.camera.fetch(&file).await?;
        debug!(location = %file.location, bytes = bytes.len(), "Fetched image from camera");

        let store = self.store.clone();
        let name = spawn_blocking(move || store.save(&bytes))
            .await
            .map_err(|e| DeviceError::Task(e.to_string()))??;

        info!(filename = %name, "Image stored");
        Ok(name)
    }

    /// Lists every recognized image in ascending order.
    pub async fn list(&self) -> Result<Vec<ImageName>, DeviceError> {
        let store = self.store.clone();
        let images = spawn_blocking(move || store.list())
            .await
            .map_err(|e| DeviceError::Task(e.to_string()))??;
        Ok(images)
    }

    /// Stages an encoded image and submits it for printing.
    pub async fn print(&self, image: &str) -> Result<JobId, DeviceError> {
        let bytes = decode_image_payload(image)?;

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(DeviceError::Staging)?;

        let sequence = self.print_counter.fetch_add(1, Ordering::Relaxed);
        let staged = self.staging_dir.join(format!(
            "print-{}-{sequence}.jpg",
            Local::now().format("%Y%m%d-%H%M%S-%3f")
        ));
        tokio::fs::write(&staged, &bytes)
            .await
            .map_err(DeviceError::Staging)?;
        debug!(path = %staged.display(), bytes = bytes.len(), "Print file staged");

        self.printer.submit(&staged).await
    }
}
