//! Sequence batch encoding.

use byteorder::{ByteOrder, NativeEndian};

use super::WordWriter;
use crate::bridge::NativeBridge;
use crate::buffer::OwnedBuffer;
use crate::error::{Mm2Error, Mm2Result};

const WORD: usize = 4;

/// Bytes needed to encode `lengths`, checked against the engine's `int`
/// limits.
pub fn encoded_batch_len<I>(lengths: I) -> Mm2Result<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut count = 0usize;
    let mut bases = 0usize;
    for len in lengths {
        if len > i32::MAX as usize {
            return Err(Mm2Error::BatchTooLarge(format!("sequence {} has {} bases", count, len)));
        }
        count += 1;
        bases += len;
    }
    let total = WORD + count * WORD + bases;
    if total > i32::MAX as usize {
        return Err(Mm2Error::BatchTooLarge(format!(
            "{} sequences with {} bases need {} bytes",
            count, bases, total
        )));
    }
    Ok(total)
}

/// Encode `items` into an engine-allocated buffer, taking each sequence
/// from `extract`. Symbols are passed through unvalidated.
pub fn encode_batch_with<'b, B, T, F>(
    bridge: &'b B,
    items: &[T],
    extract: F,
) -> Mm2Result<OwnedBuffer<'b, B>>
where
    B: NativeBridge,
    F: Fn(&T) -> &[u8],
{
    let len = encoded_batch_len(items.iter().map(|item| extract(item).len()))?;
    let mut buffer = OwnedBuffer::alloc(bridge, len, "sequence batch buffer")?;

    let mut writer = WordWriter::new(buffer.as_bytes_mut());
    writer.put_i32(items.len() as i32);
    for item in items {
        writer.put_i32(extract(item).len() as i32);
    }
    for item in items {
        writer.put_bytes(extract(item));
    }
    debug_assert_eq!(writer.position(), len);

    Ok(buffer)
}

pub fn encode_batch<'b, B, S>(bridge: &'b B, sequences: &[S]) -> Mm2Result<OwnedBuffer<'b, B>>
where
    B: NativeBridge,
    S: AsRef<[u8]>,
{
    encode_batch_with(bridge, sequences, |seq| seq.as_ref())
}

/// Engine-side view of an encoded batch.
pub fn split_batch(bytes: &[u8]) -> Option<Vec<&[u8]>> {
    let count = usize::try_from(NativeEndian::read_i32(bytes.get(..WORD)?)).ok()?;
    let header_end = WORD.checked_add(count.checked_mul(WORD)?)?;
    let lengths = bytes.get(WORD..header_end)?;

    let mut seqs = Vec::with_capacity(count);
    let mut pos = header_end;
    for chunk in lengths.chunks_exact(WORD) {
        let len = usize::try_from(NativeEndian::read_i32(chunk)).ok()?;
        seqs.push(bytes.get(pos..pos + len)?);
        pos += len;
    }
    (pos == bytes.len()).then_some(seqs)
}
