use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PrinterConfig;
use crate::errors::ServiceError;

/// Record of a print job handed to the printing application
#[derive(Debug, Clone, Serialize)]
pub struct PrintReceipt {
    pub job_id: Uuid,
    pub printer: String,
    pub template_file: PathBuf,
    pub submitted_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Something that can print a label template whose data source is already written
#[async_trait]
pub trait LabelPrinter: Send + Sync {
    fn name(&self) -> &str;

    async fn print(&self, template_file: &Path) -> Result<PrintReceipt, ServiceError>;
}

/// Drives BarTender through its command line.
///
/// The template's saved printer is used unless a printer name is configured.
#[derive(Debug, Clone)]
pub struct BarTenderPrinter {
    executable: PathBuf,
    printer_name: Option<String>,
    copies: u32,
    visible: bool,
    close_after_print: bool,
    timeout: Duration,
}

impl BarTenderPrinter {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            printer_name: None,
            copies: 1,
            visible: true,
            close_after_print: true,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            executable: PathBuf::from(&config.executable),
            printer_name: config.printer_name.clone().filter(|p| !p.trim().is_empty()),
            copies: config.copies.max(1),
            visible: config.visible,
            close_after_print: config.close_after_print,
            timeout: config.timeout(),
        }
    }

    pub fn with_printer_name(mut self, printer_name: impl Into<String>) -> Self {
        self.printer_name = Some(printer_name.into());
        self
    }

    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies.max(1);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_close_after_print(mut self, close_after_print: bool) -> Self {
        self.close_after_print = close_after_print;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line switches for printing `template_file`
    pub fn command_args(&self, template_file: &Path) -> Vec<String> {
        let mut args = vec![format!("/F={}", template_file.display()), "/P".to_string()];
        if let Some(printer) = &self.printer_name {
            args.push(format!("/PRN={}", printer));
        }
        if self.copies > 1 {
            args.push(format!("/C={}", self.copies));
        }
        if !self.visible {
            args.push("/MIN=TASKBAR".to_string());
        }
        if self.close_after_print {
            args.push("/X".to_string());
        }
        args
    }
}

#[async_trait]
impl LabelPrinter for BarTenderPrinter {
    fn name(&self) -> &str {
        "bartender"
    }

    #[instrument(skip(self), fields(executable = %self.executable.display()))]
    async fn print(&self, template_file: &Path) -> Result<PrintReceipt, ServiceError> {
        let job_id = Uuid::new_v4();
        let submitted_at = Utc::now();
        let start = Instant::now();
        let args = self.command_args(template_file);

        info!(job_id = %job_id, template = %template_file.display(), "Sending print job to BarTender");

        let child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(job_id = %job_id, error = %e, "Failed to start BarTender");
                counter!("label_print.errors", 1, "reason" => "spawn");
                ServiceError::PrinterUnavailable(format!(
                    "Cannot start {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                counter!("label_print.errors", 1, "reason" => "io");
                return Err(ServiceError::PrintFailed(format!(
                    "Lost track of BarTender process: {}",
                    e
                )));
            }
            Err(_) => {
                warn!(job_id = %job_id, timeout = ?self.timeout, "BarTender did not finish in time");
                counter!("label_print.errors", 1, "reason" => "timeout");
                return Err(ServiceError::PrintFailed(format!(
                    "BarTender did not finish within {:?}",
                    self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(job_id = %job_id, status = %output.status, "BarTender reported a failure");
            counter!("label_print.errors", 1, "reason" => "exit_status");
            return Err(ServiceError::PrintFailed(format!(
                "BarTender exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let elapsed = start.elapsed();
        histogram!("label_print.duration", elapsed);
        counter!("label_print.jobs", 1, "printer" => "bartender");
        info!(job_id = %job_id, elapsed = ?elapsed, "Print job accepted by BarTender");

        Ok(PrintReceipt {
            job_id,
            printer: self.name().to_string(),
            template_file: template_file.to_path_buf(),
            submitted_at,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Logs print jobs instead of sending them anywhere
#[derive(Debug, Clone, Default)]
pub struct DryRunPrinter;

#[async_trait]
impl LabelPrinter for DryRunPrinter {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn print(&self, template_file: &Path) -> Result<PrintReceipt, ServiceError> {
        let job_id = Uuid::new_v4();
        info!(job_id = %job_id, template = %template_file.display(), "Dry run: label not printed");
        counter!("label_print.jobs", 1, "printer" => "dry-run");

        Ok(PrintReceipt {
            job_id,
            printer: self.name().to_string(),
            template_file: template_file.to_path_buf(),
            submitted_at: Utc::now(),
            elapsed_ms: 0,
        })
    }
}

/// Picks the printer backend named in the configuration
pub fn printer_from_config(config: &PrinterConfig) -> Arc<dyn LabelPrinter> {
    if config.is_dry_run() {
        Arc::new(DryRunPrinter)
    } else {
        Arc::new(BarTenderPrinter::from_config(config))
    }
}
