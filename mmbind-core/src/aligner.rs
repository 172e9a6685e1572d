//! Per-thread alignment facade.

use crate::bridge::NativeBridge;
use crate::codec::{decode_alignments, encode_batch_with};
use crate::error::{Mm2Error, Mm2Result};
use crate::index::IndexHandle;
use crate::options::{MapOptions, Preset};
use crate::types::AlignmentList;

/// Aligns batches of sequences against a shared [`IndexHandle`].
///
/// An aligner owns its options struct and is meant for one thread at a
/// time; give every worker its own aligner over the same handle. The
/// borrow on the handle keeps it from being dropped underneath.
pub struct Aligner<'i, B: NativeBridge> {
    index: &'i IndexHandle<B>,
    options: Option<MapOptions<'i, B>>,
}

impl<'i, B: NativeBridge> Aligner<'i, B> {
    /// An aligner with the engine's default options for `index`.
    pub fn new(index: &'i IndexHandle<B>) -> Mm2Result<Self> {
        Self::build(index, None)
    }

    pub fn with_preset(index: &'i IndexHandle<B>, preset: Preset) -> Mm2Result<Self> {
        Self::build(index, Some(preset))
    }

    fn build(index: &'i IndexHandle<B>, preset: Option<Preset>) -> Mm2Result<Self> {
        let options = index.create_options(preset)?;
        log::debug!(
            "Created aligner for {} (preset: {})",
            index.path().display(),
            preset.map_or("none", |p| p.name())
        );
        Ok(Self { index, options: Some(options) })
    }

    pub fn index(&self) -> &'i IndexHandle<B> {
        self.index
    }

    pub fn is_open(&self) -> bool {
        self.options.is_some()
    }

    pub fn options(&self) -> Mm2Result<&MapOptions<'i, B>> {
        self.options.as_ref().ok_or(Mm2Error::Closed("aligner"))
    }

    pub fn options_mut(&mut self) -> Mm2Result<&mut MapOptions<'i, B>> {
        self.options.as_mut().ok_or(Mm2Error::Closed("aligner"))
    }

    /// Align `sequences`; `result[i]` holds the alignments of
    /// `sequences[i]`, possibly none.
    pub fn align_seqs<S: AsRef<[u8]>>(&mut self, sequences: &[S]) -> Mm2Result<Vec<AlignmentList>> {
        self.align_with(sequences, |seq| seq.as_ref())
    }

    /// Align arbitrary records, taking each one's bases from `extract`.
    pub fn align_with<T, F>(&mut self, items: &[T], extract: F) -> Mm2Result<Vec<AlignmentList>>
    where
        F: Fn(&T) -> &[u8],
    {
        let options = self.options.as_ref().ok_or(Mm2Error::Closed("aligner"))?;
        let batch = encode_batch_with(self.index.bridge(), items, extract)?;
        let result = self.index.align(options, batch)?;
        let alignments = decode_alignments(result.as_bytes(), items.len());
        result.release();

        let alignments = alignments?;
        log::trace!(
            "Aligned {} sequence(s), {} alignment(s)",
            items.len(),
            alignments.iter().map(Vec::len).sum::<usize>()
        );
        Ok(alignments)
    }

    /// Single-sequence convenience over [`Aligner::align_seqs`].
    pub fn align_one<S: AsRef<[u8]>>(&mut self, sequence: S) -> Mm2Result<AlignmentList> {
        let mut results = self.align_seqs(&[sequence])?;
        results.pop().ok_or_else(|| Mm2Error::malformed("no result for a single sequence"))
    }

    /// Release the options struct. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.options.take().is_some() {
            log::debug!("Closed aligner for {}", self.index.path().display());
        }
    }
}

impl<B: NativeBridge> Drop for Aligner<'_, B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, feature = "fixture"))]
mod tests {
    use super::*;
    use crate::bridge::{Fault, FixtureEngine};
    use crate::runtime::Runtime;
    use std::io::Write;

    const REF: &str = concat!(
        "GATTACAGGCTTACGATCGATCGGATCCTAGCTAGGCTAGCTTAGCATCGACTGACTAGCA",
        "TCGATCAGCTAGCTAGCGGCTAGCTAGGACTCGATCGACTAGCTGCATGACGTAC",
    );

    type Fixture = (tempfile::NamedTempFile, IndexHandle<FixtureEngine>);

    fn index(runtime: &Runtime<FixtureEngine>) -> Fixture {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">ref\n{}", REF).unwrap();
        file.flush().unwrap();
        let handle = runtime.open_index(file.path()).unwrap();
        (file, handle)
    }

    #[test]
    fn test_results_follow_input_order() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        let engine = runtime.bridge();
        let (_file, handle) = index(&runtime);
        let mut aligner = Aligner::new(&handle).unwrap();
        aligner.options_mut().unwrap().set_min_dp_max(30);

        let hit = &REF[10..100];
        let results = aligner.align_seqs(&["ACGT", hit, ""]).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_empty());
        assert_eq!(results[1][0].ref_start, 10);
        assert!(results[2].is_empty());
        assert_eq!(engine.live_buffers(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        let engine = runtime.bridge();
        let (_file, handle) = index(&runtime);
        let mut aligner = Aligner::new(&handle).unwrap();
        let none: [&[u8]; 0] = [];
        assert!(aligner.align_seqs(&none).unwrap().is_empty());
        assert_eq!(engine.align_calls(), 1);
    }

    #[test]
    fn test_buffers_released_on_failures() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        let engine = runtime.bridge();
        let (_file, handle) = index(&runtime);
        let mut aligner = Aligner::new(&handle).unwrap();
        let live = engine.live_buffers();

        engine.inject(Fault::FailAlign);
        assert!(matches!(aligner.align_one(REF), Err(Mm2Error::AlignmentFailed)));
        assert_eq!(engine.live_buffers(), live);

        engine.inject(Fault::TruncateResults);
        assert!(matches!(aligner.align_one(REF), Err(Mm2Error::MalformedResult(_))));
        assert_eq!(engine.live_buffers(), live);

        engine.inject(Fault::FailAlloc);
        assert!(matches!(aligner.align_one(REF), Err(Mm2Error::Allocation(_))));
        assert_eq!(engine.live_buffers(), live);
    }

    #[test]
    fn test_close_is_idempotent() {
        let runtime = Runtime::new(FixtureEngine::new()).unwrap();
        let engine = runtime.bridge();
        let (_file, handle) = index(&runtime);
        let mut aligner = Aligner::with_preset(&handle, Preset::MapOnt).unwrap();
        assert_eq!(engine.live_buffers(), 1);

        aligner.close();
        aligner.close();
        assert!(!aligner.is_open());
        assert_eq!(engine.live_buffers(), 0);
        assert!(matches!(aligner.align_one(REF), Err(Mm2Error::Closed(_))));
        assert!(matches!(aligner.options(), Err(Mm2Error::Closed(_))));
        drop(aligner);
        assert_eq!(engine.live_buffers(), 0);
    }

    #[test]
    fn test_options_size_mismatch() {
        let runtime = Runtime::new(FixtureEngine::with_options_size(200)).unwrap();
        let engine = runtime.bridge();
        let (_file, handle) = index(&runtime);
        let err = Aligner::new(&handle).err().unwrap();
        assert!(matches!(err, Mm2Error::VersionMismatch { expected: 192, actual: 200 }));
        assert_eq!(engine.live_buffers(), 0);
    }
}
