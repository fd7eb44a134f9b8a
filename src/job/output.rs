//! Output file naming and export

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const KEPT_SUFFIX: &str = "kept";
const REMOVED_SUFFIX: &str = "removed";

/// Kept and removed output locations for one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub kept: PathBuf,
    pub removed: PathBuf,
}

impl OutputPaths {
    /// `<stem>.kept.<ext>` and `<stem>.removed.<ext>` in `output_dir`.
    ///
    /// A decompressed input drops its compression extension, so `guide.xml.gz`
    /// produces `guide.kept.xml`.
    pub fn for_input(input: &Path, output_dir: &Path, decompressed: bool) -> Self {
        let mut name = input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("output"));
        if decompressed && name.extension().is_some() {
            name.set_extension("");
        }

        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

        let file_name = |suffix: &str| match &extension {
            Some(ext) => format!("{stem}.{suffix}.{ext}"),
            None => format!("{stem}.{suffix}"),
        };

        Self {
            kept: output_dir.join(file_name(KEPT_SUFFIX)),
            removed: output_dir.join(file_name(REMOVED_SUFFIX)),
        }
    }
}

/// Copy kept outputs into the export directory. Failures are logged and skipped.
pub async fn export_files(files: &[PathBuf], export_dir: &Path) -> Vec<PathBuf> {
    if let Err(e) = tokio::fs::create_dir_all(export_dir).await {
        warn!("Cannot create export directory {}: {}", export_dir.display(), e);
        return Vec::new();
    }

    let mut exported = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = export_dir.join(name);
        match tokio::fs::copy(file, &target).await {
            Ok(bytes) => {
                info!("Exported {} ({} bytes)", target.display(), bytes);
                exported.push(target);
            }
            Err(e) => warn!("Failed to export {}: {}", file.display(), e),
        }
    }
    exported
}
