//! Diagnostic snapshots.
//!
//! On a caught failure the current viewport is saved as
//! `<output_dir>/<kind>_<entity>_<unix seconds>.png`. Capturing is a side effect only: a
//! failure to capture is reported as a warning and never changes control flow.

use crate::context::{EventCategory, EventLevel, RunContext, RunEvent};
use crate::driver::UiDriver;
use crate::result::QuoteflowResult;
use std::path::{Path, PathBuf};

/// Writes failure screenshots into one directory
#[derive(Debug, Clone)]
pub struct Diagnostics {
    output_dir: PathBuf,
}

impl Diagnostics {
    /// Snapshots go into `output_dir`, created on first use
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Snapshot directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Capture a snapshot named after `kind` and `entity`
    ///
    /// Returns the written path, or `None` when capturing failed.
    pub async fn capture(
        &self,
        driver: &dyn UiDriver,
        ctx: &RunContext,
        kind: &str,
        entity: &str,
    ) -> Option<PathBuf> {
        let path = self
            .output_dir
            .join(snapshot_name(kind, entity, chrono::Utc::now().timestamp()));
        match self.write(driver, &path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Saved diagnostic snapshot");
                ctx.emit(
                    RunEvent::new(EventLevel::Info, EventCategory::Diagnostics, "snapshot saved")
                        .with("path", path.display().to_string())
                        .with("kind", kind),
                );
                Some(path)
            }
            Err(e) => {
                ctx.emit(
                    RunEvent::new(
                        EventLevel::Warn,
                        EventCategory::Diagnostics,
                        format!("could not save snapshot: {e}"),
                    )
                    .with("kind", kind),
                );
                None
            }
        }
    }

    async fn write(&self, driver: &dyn UiDriver, path: &Path) -> QuoteflowResult<()> {
        let png = driver.screenshot().await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(path, png).await?;
        Ok(())
    }
}

/// Deterministic snapshot file name
#[must_use]
pub fn snapshot_name(kind: &str, entity: &str, unix_seconds: i64) -> String {
    format!("{}_{}_{unix_seconds}.png", sanitize(kind), sanitize(entity))
}

/// Replace characters that are unsafe in file names
fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
