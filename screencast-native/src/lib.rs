//! # screencast-native
//!
//! Desktop backends for screencast-kit's transcode side.
//!
//! Provides:
//! - `FsAssetSource`: engine builds staged in a directory tree
//! - `ProcessEngineFactory`: runs the staged engine payload as a child
//!   process with a private scratch directory as its file namespace
//! - `host_transcode_configuration`: build preference from the host's parallelism
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use screencast_core::{CodecEngineLoader, TranscodePipeline};
//! use screencast_native::{host_transcode_configuration, FsAssetSource, ProcessEngineFactory};
//!
//! let config = host_transcode_configuration("/");
//! let loader = CodecEngineLoader::new(
//!     config,
//!     Arc::new(FsAssetSource::new("/opt/screencast/assets")),
//!     Arc::new(ProcessEngineFactory::new()),
//! );
//! let pipeline = TranscodePipeline::new(Arc::new(loader));
//! ```

pub mod fs_assets;
pub mod monitor;
pub mod process_engine;

pub use fs_assets::FsAssetSource;
pub use process_engine::{ProcessEngine, ProcessEngineFactory};

use screencast_core::TranscodeConfiguration;

/// Whether the host can usefully run the multi-threaded build. Plays the role
/// of cross-origin isolation for native hosts.
pub fn parallelism_available() -> bool {
    std::thread::available_parallelism()
        .map(|n| n.get() > 1)
        .unwrap_or(false)
}

/// Default transcode configuration for this host, rooted at `asset_base`.
pub fn host_transcode_configuration(asset_base: &str) -> TranscodeConfiguration {
    let isolated = parallelism_available();
    log::debug!("host parallelism available: {}", isolated);
    TranscodeConfiguration {
        asset_base: asset_base.to_string(),
        cross_origin_isolated: isolated,
        ..Default::default()
    }
}
