//! The boundary to the alignment engine.
//!
//! Everything the binding needs from the engine is expressed by
//! [`NativeBridge`]. The engine is opaque: the binding never looks inside an
//! index, only passes it back, and communicates through flat byte buffers
//! whose layouts are fixed by [`crate::codec`] and [`crate::options`].

use std::path::Path;

#[cfg(feature = "fixture")]
pub mod fixture;

#[cfg(feature = "fixture")]
pub use fixture::{Fault, FixtureEngine, FixtureIndex};

/// Capabilities of an alignment engine.
///
/// A `None` return is the engine's null: the binding turns it into the
/// matching [`Mm2Error`](crate::Mm2Error) right where it is observed.
///
/// Implementations must be reentrant for calls that receive independent
/// buffers: [`align`](NativeBridge::align) and
/// [`ref_names`](NativeBridge::ref_names) run concurrently from several
/// threads against the same index.
pub trait NativeBridge: Send + Sync {
    /// Opaque loaded index. Consumed by [`destroy_index`](NativeBridge::destroy_index).
    type Index: Send + Sync;

    /// Engine-owned flat memory.
    type Buffer: AsRef<[u8]> + AsMut<[u8]> + Send;

    /// Short identifier of the engine implementation
    fn name(&self) -> &'static str;

    /// Engine version string
    fn version(&self) -> String;

    /// One-time setup; called once by [`Runtime::new`](crate::Runtime::new).
    fn initialize(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load an index file. Expensive; may read gigabytes.
    fn open_index(&self, path: &Path) -> Option<Self::Index>;

    fn destroy_index(&self, index: Self::Index);

    /// Build an options struct for `index`, seeded from `preset` when given.
    fn create_options(&self, index: &Self::Index, preset: Option<&str>) -> Option<Self::Buffer>;

    /// Align an encoded sequence batch; returns an encoded result buffer.
    fn align(
        &self,
        index: &Self::Index,
        options: &Self::Buffer,
        seqs: &Self::Buffer,
    ) -> Option<Self::Buffer>;

    /// NUL-terminated reference names, back to back.
    fn ref_names(&self, index: &Self::Index) -> Option<Self::Buffer>;

    fn alloc(&self, len: usize) -> Option<Self::Buffer>;

    fn free(&self, buffer: Self::Buffer);
}
