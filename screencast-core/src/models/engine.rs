use serde::{Deserialize, Serialize};

/// Which interchangeable codec engine build is in use.
///
/// The multi-threaded build needs a cross-origin-isolated host to get
/// shared-memory parallelism; the single-threaded build runs anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Single,
    Multi,
}

impl EngineMode {
    /// The build to try when this one cannot be loaded.
    pub fn other(self) -> Self {
        match self {
            Self::Single => Self::Multi,
            Self::Multi => Self::Single,
        }
    }

    /// Only the multi-threaded build ships a worker script.
    pub fn needs_worker(self) -> bool {
        matches!(self, Self::Multi)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl std::fmt::Display for EngineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records which engine produced the converted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSource {
    pub engine: String,
    pub core_mode: EngineMode,
}
