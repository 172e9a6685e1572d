//! Explicit engine initialization.

use std::path::Path;
use std::sync::Arc;

use crate::bridge::NativeBridge;
use crate::error::{Mm2Error, Mm2Result};
use crate::index::IndexHandle;

/// An initialized engine.
///
/// Constructing a `Runtime` is the only place the engine's one-time setup
/// runs, so holding one is proof that it succeeded. Cheap to clone.
pub struct Runtime<B: NativeBridge> {
    bridge: Arc<B>,
}

impl<B: NativeBridge> Clone for Runtime<B> {
    fn clone(&self) -> Self {
        Self { bridge: Arc::clone(&self.bridge) }
    }
}

impl<B: NativeBridge> Runtime<B> {
    pub fn new(bridge: B) -> Mm2Result<Self> {
        bridge.initialize().map_err(|e| {
            log::error!("{} engine failed to initialize: {}", bridge.name(), e);
            Mm2Error::Initialization(e)
        })?;
        log::debug!("Initialized {} engine {}", bridge.name(), bridge.version());
        Ok(Self { bridge: Arc::new(bridge) })
    }

    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    /// Engine version string
    pub fn version(&self) -> String {
        self.bridge.version()
    }

    /// Load an index. Expensive; open once and share the handle.
    pub fn open_index<P: AsRef<Path>>(&self, path: P) -> Mm2Result<IndexHandle<B>> {
        IndexHandle::open(Arc::clone(&self.bridge), path)
    }
}

#[cfg(all(test, feature = "fixture"))]
mod tests {
    use super::*;
    use crate::bridge::FixtureEngine;

    #[test]
    fn test_initializes_once() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        let other = runtime.clone();
        assert_eq!(runtime.bridge().initializations(), 1);
        assert_eq!(other.version(), runtime.version());
        assert!(runtime.version().starts_with("fixture-"));
    }

    #[test]
    fn test_open_missing_index() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        assert!(matches!(runtime.open_index("/missing.fa"), Err(Mm2Error::Open { .. })));
    }
}
