//! Shared, reference-counted access to a loaded index.

use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::bridge::NativeBridge;
use crate::buffer::OwnedBuffer;
use crate::codec::decode_ref_names;
use crate::error::{Mm2Error, Mm2Result};
use crate::options::{MapOptions, Preset};

/// A loaded index, shared by any number of aligners and threads.
///
/// Every operation that touches the engine-side index goes through a lease
/// ([`IndexHandle::acquire`]); the handle counts outstanding leases and
/// refuses to [`close`](IndexHandle::close) while any exist. Closing is
/// idempotent, and dropping the handle closes it.
pub struct IndexHandle<B: NativeBridge> {
    bridge: Arc<B>,
    path: PathBuf,
    index: Mutex<Option<Arc<B::Index>>>,
    ref_names: OnceLock<Vec<String>>,
    // serializes the first names fetch
    names_lock: Mutex<()>,
}

/// Keeps the index alive for the duration of one engine call. Borrows the
/// handle, so the handle cannot be dropped while a lease exists.
pub struct IndexLease<'h, B: NativeBridge> {
    index: Arc<B::Index>,
    _handle: PhantomData<&'h IndexHandle<B>>,
}

impl<B: NativeBridge> Deref for IndexLease<'_, B> {
    type Target = B::Index;

    fn deref(&self) -> &B::Index {
        &self.index
    }
}

impl<B: NativeBridge> IndexHandle<B> {
    /// Load the index at `path` through `bridge`. Reached only through
    /// [`Runtime::open_index`](crate::Runtime::open_index), so the engine has
    /// been initialized.
    pub(crate) fn open<P: AsRef<Path>>(bridge: Arc<B>, path: P) -> Mm2Result<Self> {
        let path = path.as_ref();
        log::info!("Loading index {} with the {} engine", path.display(), bridge.name());

        let index = bridge
            .open_index(path)
            .ok_or_else(|| Mm2Error::Open { path: path.to_path_buf() })?;

        log::debug!("Index {} loaded", path.display());
        Ok(Self {
            bridge,
            path: path.to_path_buf(),
            index: Mutex::new(Some(Arc::new(index))),
            ref_names: OnceLock::new(),
            names_lock: Mutex::new(()),
        })
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.index.lock().is_some()
    }

    /// Outstanding leases
    pub fn ref_count(&self) -> usize {
        self.index
            .lock()
            .as_ref()
            .map_or(0, |index| Arc::strong_count(index) - 1)
    }

    /// Borrow the engine-side index, failing once the handle is closed.
    pub fn acquire(&self) -> Mm2Result<IndexLease<'_, B>> {
        let guard = self.index.lock();
        let index = guard.as_ref().ok_or(Mm2Error::Closed("index"))?;
        Ok(IndexLease { index: Arc::clone(index), _handle: PhantomData })
    }

    /// Release the engine-side index.
    ///
    /// Closing an already closed handle is a no-op. Fails with
    /// [`Mm2Error::InUse`] while leases are outstanding; the handle stays open
    /// in that case.
    pub fn close(&self) -> Mm2Result<()> {
        let mut guard = self.index.lock();
        let Some(index) = guard.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(index) {
            Ok(index) => {
                drop(guard);
                self.bridge.destroy_index(index);
                log::debug!("Index {} closed", self.path.display());
                Ok(())
            }
            Err(index) => {
                let borrowers = Arc::strong_count(&index) - 1;
                *guard = Some(index);
                log::warn!(
                    "Index {} still has {} borrower(s); not closing",
                    self.path.display(),
                    borrowers
                );
                Err(Mm2Error::InUse { borrowers })
            }
        }
    }

    /// Reference sequence names in index order.
    ///
    /// Fetched from the engine once, on first use, and cached; the cache
    /// outlives [`close`](IndexHandle::close). Concurrent first callers wait
    /// for a single fetch.
    pub fn ref_names(&self) -> Mm2Result<&[String]> {
        if let Some(names) = self.ref_names.get() {
            return Ok(names);
        }

        let _fetching = self.names_lock.lock();
        if let Some(names) = self.ref_names.get() {
            return Ok(names);
        }

        let names = {
            let lease = self.acquire()?;
            let buffer = self
                .bridge
                .ref_names(&lease)
                .map(|raw| OwnedBuffer::new(self.bridge.as_ref(), raw))
                .ok_or(Mm2Error::Allocation("reference names buffer"))?;
            decode_ref_names(buffer.as_bytes())
        };

        log::debug!("Index {} has {} reference(s)", self.path.display(), names.len());
        Ok(self.ref_names.get_or_init(|| names))
    }

    pub fn ref_name(&self, id: usize) -> Mm2Result<&str> {
        let names = self.ref_names()?;
        names
            .get(id)
            .map(String::as_str)
            .ok_or(Mm2Error::RefIdOutOfRange { id, count: names.len() })
    }

    /// Ask the engine for an options struct tuned to this index.
    pub fn create_options(&self, preset: Option<Preset>) -> Mm2Result<MapOptions<'_, B>> {
        let lease = self.acquire()?;
        let raw = self
            .bridge
            .create_options(&lease, preset.map(|p| p.name()))
            .ok_or(Mm2Error::Allocation("options struct"))?;
        MapOptions::from_buffer(OwnedBuffer::new(self.bridge.as_ref(), raw))
    }

    /// Hand one encoded batch to the engine and return its result buffer.
    ///
    /// `batch` is released as soon as the engine returns, on success and
    /// failure alike, so it is always gone before the result is looked at.
    pub fn align<'b>(
        &'b self,
        options: &MapOptions<'_, B>,
        batch: OwnedBuffer<'_, B>,
    ) -> Mm2Result<OwnedBuffer<'b, B>> {
        let lease = self.acquire()?;
        let raw = self.bridge.align(&lease, options.raw(), batch.raw());
        batch.release();

        raw.map(|raw| OwnedBuffer::new(self.bridge.as_ref(), raw))
            .ok_or(Mm2Error::AlignmentFailed)
    }
}

impl<B: NativeBridge> Drop for IndexHandle<B> {
    fn drop(&mut self) {
        if self.index.get_mut().is_some() {
            log::warn!("Index {} dropped without close(); closing", self.path.display());
            // no leases can outlive the handle, so this cannot fail
            if let Err(e) = self.close() {
                log::error!("Failed to close index {}: {}", self.path.display(), e);
            }
        }
    }
}
