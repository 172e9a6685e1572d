//! Ownership of engine-allocated transient buffers.

use std::mem::ManuallyDrop;

use crate::bridge::NativeBridge;
use crate::error::{Mm2Error, Mm2Result};

/// A buffer allocated by the engine, handed back to it exactly once on drop.
///
/// Every transient buffer that crosses the boundary (sequence batches,
/// alignment results, reference names, the options struct) is wrapped in one
/// of these immediately after the engine returns it, so early returns and
/// `?` release it too.
pub struct OwnedBuffer<'b, B: NativeBridge> {
    bridge: &'b B,
    buffer: ManuallyDrop<B::Buffer>,
}

impl<'b, B: NativeBridge> OwnedBuffer<'b, B> {
    /// Take ownership of a buffer the engine has just returned.
    pub fn new(bridge: &'b B, buffer: B::Buffer) -> Self {
        Self { bridge, buffer: ManuallyDrop::new(buffer) }
    }

    /// Ask the engine for `len` bytes of scratch memory.
    pub fn alloc(bridge: &'b B, len: usize, what: &'static str) -> Mm2Result<Self> {
        bridge
            .alloc(len)
            .map(|buffer| Self::new(bridge, buffer))
            .ok_or(Mm2Error::Allocation(what))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        (*self.buffer).as_ref()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        (*self.buffer).as_mut()
    }

    /// The engine-side representation, for passing back across the boundary.
    pub fn raw(&self) -> &B::Buffer {
        &self.buffer
    }

    /// Release now rather than at end of scope.
    pub fn release(self) {}
}

impl<B: NativeBridge> Drop for OwnedBuffer<'_, B> {
    fn drop(&mut self) {
        // SAFETY: `buffer` is never touched again after this point.
        let buffer = unsafe { ManuallyDrop::take(&mut self.buffer) };
        self.bridge.free(buffer);
    }
}

#[cfg(all(test, feature = "fixture"))]
mod tests {
    use super::*;
    use crate::bridge::fixture::FixtureEngine;

    #[test]
    fn test_drop_frees_exactly_once() {
        let engine = FixtureEngine::new();
        {
            let mut buf = OwnedBuffer::alloc(&engine, 16, "scratch buffer").unwrap();
            buf.as_bytes_mut()[0] = 7;
            assert_eq!(buf.len(), 16);
            assert_eq!(engine.live_buffers(), 1);
        }
        assert_eq!(engine.live_buffers(), 0);
        assert_eq!(engine.total_allocations(), 1);
    }

    #[test]
    fn test_explicit_release() {
        let engine = FixtureEngine::new();
        let buf = OwnedBuffer::alloc(&engine, 4, "scratch buffer").unwrap();
        buf.release();
        assert_eq!(engine.live_buffers(), 0);
    }
}
