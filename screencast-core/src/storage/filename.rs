use chrono::{DateTime, Local};

use crate::models::artifact::ArtifactKind;

/// `<prefix>-YYYYMMDD-HHMMSS` from the session start time.
pub fn filename_base(prefix: &str, started_at: DateTime<Local>) -> String {
    format!("{}-{}", prefix, started_at.format("%Y%m%d-%H%M%S"))
}

pub fn download_name(base: &str, kind: ArtifactKind) -> String {
    format!("{}.{}", base, kind.extension())
}
