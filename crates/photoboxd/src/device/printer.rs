//! Print pipeline abstraction and the CUPS `lp` implementation.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::command;
use super::DeviceError;
use crate::config::PrinterConfig;

/// Identifier of an accepted print job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that accepts image files for printing.
#[async_trait]
pub trait PrintPipeline: Send + Sync {
    /// Submits the staged file and returns the job identifier.
    async fn submit(&self, file: &Path) -> Result<JobId, DeviceError>;
}

/// Printer reached through CUPS `lp`.
#[derive(Debug, Clone)]
pub struct LpPrinter {
    command: String,
    destination: Option<String>,
    options: Vec<String>,
    timeout: Duration,
}

impl LpPrinter {
    /// Creates a printer from configuration.
    pub fn new(config: &PrinterConfig) -> Self {
        Self {
            command: config.command.clone(),
            destination: config.name.clone(),
            options: config.options.clone(),
            timeout: config.timeout(),
        }
    }

    fn arguments(&self, file: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(destination) = &self.destination {
            args.push("-d".to_string());
            args.push(destination.clone());
        }
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl PrintPipeline for LpPrinter {
    async fn submit(&self, file: &Path) -> Result<JobId, DeviceError> {
        let output = command::run(&self.command, self.arguments(file), self.timeout)
            .await
            .map_err(DeviceError::Print)?;

        let job = parse_request_id(&output).ok_or(DeviceError::NoJobId)?;
        info!(job_id = %job, printer = ?self.destination, "Print job submitted");
        Ok(job)
    }
}

/// Extracts the job from `lp` output: `request id is selphy-42 (1 file(s))`.
fn parse_request_id(output: &str) -> Option<JobId> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("request id is ")?;
        let id = rest.split_whitespace().next()?;
        Some(JobId::new(id))
    })
}
