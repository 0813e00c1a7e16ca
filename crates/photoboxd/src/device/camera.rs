//! Capture device abstraction and the gphoto2 implementation.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::command;
use super::DeviceError;
use crate::config::CameraConfig;

/// Handle to a photo taken by the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFile {
    /// Location reported by the camera, e.g. `/store_00010001/DCIM/IMG_0042.JPG`
    pub location: String,

    /// Where the transferred file lives on the host
    pub path: PathBuf,
}

/// A still camera.
///
/// The hub drives one capture as `open`, `capture`, `fetch`, `release`.
/// `release` is called after every successful `open`, even if a later step
/// failed. Implementations need not guard against overlapping captures; the
/// hub serializes them.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Connects to the camera.
    async fn open(&self) -> Result<(), DeviceError>;

    /// Takes a photo.
    async fn capture(&self) -> Result<CameraFile, DeviceError>;

    /// Reads the photo's bytes.
    async fn fetch(&self, file: &CameraFile) -> Result<Vec<u8>, DeviceError>;

    /// Releases the camera and any transfer scratch files.
    async fn release(&self) -> Result<(), DeviceError>;
}

/// Camera driven through the `gphoto2` command line tool.
#[derive(Debug, Clone)]
pub struct Gphoto2Camera {
    command: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl Gphoto2Camera {
    /// Creates a camera from configuration.
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            command: config.command.clone(),
            work_dir: config.work_dir.clone(),
            timeout: config.timeout(),
        }
    }

    fn capture_path(&self) -> PathBuf {
        self.work_dir.join("capture.jpg")
    }

    async fn gphoto2(&self, step: &'static str, args: &[&str]) -> Result<String, DeviceError> {
        command::run(&self.command, args, self.timeout)
            .await
            .map_err(|source| DeviceError::Camera { step, source })
    }
}

#[async_trait]
impl Camera for Gphoto2Camera {
    async fn open(&self) -> Result<(), DeviceError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(DeviceError::Transfer)?;

        let listing = self.gphoto2("detect", &["--auto-detect"]).await?;
        let cameras = parse_auto_detect(&listing);
        match cameras.first() {
            Some(model) => {
                debug!(model = %model, count = cameras.len(), "Camera detected");
                Ok(())
            }
            None => Err(DeviceError::NoCamera),
        }
    }

    async fn capture(&self) -> Result<CameraFile, DeviceError> {
        let path = self.capture_path();
        let target = path.to_string_lossy().into_owned();
        let output = self
            .gphoto2(
                "capture",
                &[
                    "--capture-image-and-download",
                    "--force-overwrite",
                    "--filename",
                    target.as_str(),
                ],
            )
            .await?;

        let location = parse_capture_location(&output).ok_or(DeviceError::UnexpectedOutput {
            step: "capture",
        })?;
        info!(location = %location, "Camera captured image");
        Ok(CameraFile { location, path })
    }

    async fn fetch(&self, file: &CameraFile) -> Result<Vec<u8>, DeviceError> {
        tokio::fs::read(&file.path)
            .await
            .map_err(DeviceError::Transfer)
    }

    async fn release(&self) -> Result<(), DeviceError> {
        match tokio::fs::remove_file(self.capture_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeviceError::Transfer(e)),
        }
    }
}

/// Extracts camera models from `gphoto2 --auto-detect` output.
///
/// The output is a two-line header (`Model  Port` and a dashed rule)
/// followed by one line per detected camera, columns padded with spaces.
fn parse_auto_detect(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("---"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split("  ").next().unwrap_or(line).trim().to_string())
        .collect()
}

/// Extracts the on-camera path from gphoto2 capture output.
fn parse_capture_location(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("New file is in location ")
            .map(|rest| rest.trim_end_matches(" on the camera").trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTO_DETECT: &str = "\
Model                          Port
----------------------------------------------------------
Canon EOS 600D                 usb:001,005
";

    #[test]
    fn test_parse_auto_detect_finds_camera() {
        assert_eq!(parse_auto_detect(AUTO_DETECT), vec!["Canon EOS 600D"]);
    }

    #[test]
    fn test_parse_auto_detect_no_camera() {
        let output = "Model                          Port\n---------------------\n";
        assert!(parse_auto_detect(output).is_empty());
        assert!(parse_auto_detect("").is_empty());
    }

    #[test]
    fn test_parse_capture_location() {
        let output = "\
New file is in location /store_00020001/DCIM/100CANON/IMG_0042.JPG on the camera
Saving file as /tmp/photobox/camera/capture.jpg
Deleting file /store_00020001/DCIM/100CANON/IMG_0042.JPG on the camera
";
        assert_eq!(
            parse_capture_location(output).as_deref(),
            Some("/store_00020001/DCIM/100CANON/IMG_0042.JPG")
        );
        assert_eq!(parse_capture_location("*** Error: out of focus"), None);
    }

    #[tokio::test]
    async fn test_release_without_capture_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Gphoto2Camera::new(&CameraConfig {
            work_dir: dir.path().to_path_buf(),
            ..CameraConfig::default()
        });
        camera.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_gphoto2_is_a_camera_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Gphoto2Camera::new(&CameraConfig {
            command: "photobox-no-such-gphoto2".to_string(),
            work_dir: dir.path().join("work"),
            timeout_secs: 1,
        });
        let err = camera.open().await.unwrap_err();
        assert!(matches!(err, DeviceError::Camera { step: "detect", .. }));
    }
}
