use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::models::config::TranscodeConfiguration;
use crate::models::engine::EngineMode;
use crate::models::error::EngineError;
use crate::traits::codec_engine::{AssetKind, AssetSource, CodecEngine, CodecEngineFactory, EngineAssets};

/// A codec engine that finished loading, tagged with the build it came from.
pub struct LoadedEngine {
    mode: EngineMode,
    engine: Mutex<Box<dyn CodecEngine>>,
}

impl LoadedEngine {
    pub fn new(mode: EngineMode, engine: Box<dyn CodecEngine>) -> Self {
        Self {
            mode,
            engine: Mutex::new(engine),
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Exclusive access to the engine and its virtual file namespace.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn CodecEngine>> {
        self.engine.lock()
    }
}

/// Resolves one of the two engine builds and memoizes it.
///
/// Build order:
/// ```text
/// cross-origin isolated:  multi → single
/// otherwise:              single → multi
/// ```
/// Each build fails as a whole if any required asset is missing, unreadable,
/// or the engine refuses to initialize; the other build is then tried once.
///
/// The memo lock is held for the whole load, so concurrent callers wait for
/// the in-flight resolution instead of starting their own. A failed
/// resolution is not remembered and the next call starts over.
pub struct CodecEngineLoader {
    config: TranscodeConfiguration,
    assets: Arc<dyn AssetSource>,
    factory: Arc<dyn CodecEngineFactory>,
    loaded: Mutex<Option<Arc<LoadedEngine>>>,
}

impl CodecEngineLoader {
    pub fn new(
        config: TranscodeConfiguration,
        assets: Arc<dyn AssetSource>,
        factory: Arc<dyn CodecEngineFactory>,
    ) -> Self {
        Self {
            config,
            assets,
            factory,
            loaded: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TranscodeConfiguration {
        &self.config
    }

    pub fn resolve(&self) -> Result<Arc<LoadedEngine>, EngineError> {
        let mut slot = self.loaded.lock();
        if let Some(ref engine) = *slot {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(self.load()?);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Mode of the memoized engine, if one has loaded.
    pub fn loaded_mode(&self) -> Option<EngineMode> {
        self.loaded.lock().as_ref().map(|e| e.mode())
    }

    fn load(&self) -> Result<LoadedEngine, EngineError> {
        let preferred = self.config.preferred_mode();
        let fallback = preferred.other();

        let first_error = match self.load_build(preferred) {
            Ok(engine) => return Ok(engine),
            Err(e) => e,
        };
        log::warn!(
            "{}-threaded engine build unavailable ({}), falling back to {}-threaded",
            preferred,
            first_error,
            fallback
        );

        self.load_build(fallback).map_err(|second_error| {
            log::error!("{}-threaded engine build unavailable: {}", fallback, second_error);
            EngineError::AllBuildsFailed {
                preferred: Box::new(first_error),
                fallback: Box::new(second_error),
            }
        })
    }

    fn load_build(&self, mode: EngineMode) -> Result<LoadedEngine, EngineError> {
        let assets = self.fetch_assets(mode)?;
        let engine = self.factory.initialize(mode, assets)?;
        log::info!("codec engine loaded ({}-threaded)", mode);
        Ok(LoadedEngine::new(mode, engine))
    }

    fn fetch_assets(&self, mode: EngineMode) -> Result<EngineAssets, EngineError> {
        let required = self.config.required_assets(mode);

        // A build is all-or-nothing: check presence before fetching anything.
        for kind in &required {
            let path = self.config.asset_path(mode, *kind);
            if !self.assets.exists(&path) {
                return Err(EngineError::AssetMissing(path));
            }
        }

        let fetch = |kind: AssetKind| {
            let path = self.config.asset_path(mode, kind);
            self.assets.fetch(&path, kind.content_type())
        };

        Ok(EngineAssets {
            script: fetch(AssetKind::Script)?,
            payload: fetch(AssetKind::Payload)?,
            worker: if mode.needs_worker() {
                Some(fetch(AssetKind::Worker)?)
            } else {
                None
            },
        })
    }
}
