//! Artifact side channel: writes raw responses and decoded artifacts to disk.
//!
//! **Activation**: only when `LABSYNC_DUMP_DIR` is configured.
//!
//! **Output naming**:
//! ```text
//! {dump_dir}/
//!   labsync-pedido-{key}-{yyyyMMddHHmmss}.xml
//!   labsync-pedido-{key}-{yyyyMMddHHmmss}-pdf01.pdf
//!   labsync-pedido-{key}-{yyyyMMddHHmmss}-grafico01.png
//!   labsync-periodo-{start}_{end}-{yyyyMMddHHmmss}.xml
//! ```
//!
//! Only responses are written. Request envelopes carry credentials and never
//! reach this module.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use super::types::RemoteResult;

const PREFIX: &str = "labsync";
const STAMP: &str = "%Y%m%d%H%M%S";

/// Side-channel writer rooted at the configured dump directory.
#[derive(Debug, Clone)]
pub struct ArtifactDump {
    dir: PathBuf,
}

impl ArtifactDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the raw response and every artifact of an order call.
    /// Failures are logged, never returned.
    pub fn order_result(&self, result: &RemoteResult) {
        let base = format!(
            "{PREFIX}-pedido-{}-{}",
            sanitize(&result.key()),
            Local::now().format(STAMP)
        );
        if let Err(e) = self.write_order_files(&base, result) {
            tracing::warn!(
                path = %self.dir.display(),
                error = %e,
                "Artifact dump: failed to write order result"
            );
        }
    }

    /// Write the raw response of a period call. Failures are logged.
    pub fn period_result(&self, start: NaiveDateTime, end: NaiveDateTime, xml: &str) {
        let name = format!(
            "{PREFIX}-periodo-{}_{}-{}.xml",
            start.format(STAMP),
            end.format(STAMP),
            Local::now().format(STAMP)
        );
        if let Err(e) = self.write(&name, xml.as_bytes()) {
            tracing::warn!(
                path = %self.dir.display(),
                error = %e,
                "Artifact dump: failed to write period result"
            );
        }
    }

    fn write_order_files(&self, base: &str, result: &RemoteResult) -> std::io::Result<()> {
        self.write(&format!("{base}.xml"), result.raw_response.as_bytes())?;
        for (i, pdf) in result.pdf_artifacts.iter().enumerate() {
            self.write(&format!("{base}-pdf{:02}.pdf", i + 1), &pdf.bytes)?;
        }
        for (i, graphic) in result.graphic_artifacts.iter().enumerate() {
            let ext = graphic.file_type.extension().to_ascii_lowercase();
            self.write(&format!("{base}-grafico{:02}.{ext}", i + 1), &graphic.bytes)?;
        }
        Ok(())
    }

    fn write(&self, filename: &str, data: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, data)?;
        tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Artifact dump: file written"
        );
        Ok(())
    }
}

/// Keep file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
