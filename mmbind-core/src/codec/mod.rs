//! Wire formats shared with the engine.
//!
//! All integers are 32-bit, native byte order:
//! - sequence batch: `count`, `count × length`, then the bases back to back
//! - alignment result: per sequence `n_aligns`, then per alignment
//!   `ref_id, ref_start, mapq_and_strand, n_cigar, n_cigar × packed_op`
//! - reference names: NUL-terminated strings back to back

pub mod batch;
pub mod names;
pub mod result;

pub use batch::{encode_batch, encode_batch_with, encoded_batch_len, split_batch};
pub use names::{decode_ref_names, encode_ref_names};
pub use result::{decode_alignments, encode_alignments_into, encoded_alignments_len};

use byteorder::{ByteOrder, NativeEndian};

/// Sequential writer over a pre-sized buffer.
pub(crate) struct WordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WordWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn put_i32(&mut self, value: i32) {
        NativeEndian::write_i32(&mut self.buf[self.pos..self.pos + 4], value);
        self.pos += 4;
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }
}
