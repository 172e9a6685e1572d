//! Alignment result decoding.

use byteorder::{NativeEndian, ReadBytesExt};
use std::io::{self, Cursor};

use super::WordWriter;
use crate::error::{Mm2Error, Mm2Result};
use crate::types::{Alignment, AlignmentList, Cigar, CigarOp, Strand};

/// Smallest possible encoded alignment: four header words, no CIGAR.
const MIN_RECORD: usize = 16;

fn truncated(err: io::Error, what: &str) -> Mm2Error {
    Mm2Error::malformed(format!("buffer ended while reading {}: {}", what, err))
}

fn read_word(cursor: &mut Cursor<&[u8]>, what: &str) -> Mm2Result<i32> {
    cursor.read_i32::<NativeEndian>().map_err(|e| truncated(e, what))
}

fn read_count(cursor: &mut Cursor<&[u8]>, what: &str) -> Mm2Result<usize> {
    let value = read_word(cursor, what)?;
    usize::try_from(value).map_err(|_| Mm2Error::malformed(format!("negative {}: {}", what, value)))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

fn read_alignment(cursor: &mut Cursor<&[u8]>) -> Mm2Result<Alignment> {
    let ref_id = read_count(cursor, "reference id")?;
    let ref_start = read_count(cursor, "reference start")?;
    let (map_quality, strand) = Strand::decode_map_quality(read_word(cursor, "map quality")?);

    let n_cigar = read_count(cursor, "CIGAR length")?;
    let mut ops = Vec::with_capacity(n_cigar.min(remaining(cursor) / 4));
    for _ in 0..n_cigar {
        ops.push(CigarOp::unpack(read_word(cursor, "CIGAR op")?)?);
    }

    Ok(Alignment {
        ref_id: ref_id as u32,
        ref_start: ref_start as u32,
        strand,
        map_quality,
        cigar: Cigar(ops),
    })
}

/// Decode a result buffer holding alignments for exactly `expected_seqs`
/// queries.
///
/// The buffer must be consumed exactly: running short or having bytes left
/// over both mean the producer and this decoder disagree, and are reported
/// as [`Mm2Error::MalformedResult`].
pub fn decode_alignments(bytes: &[u8], expected_seqs: usize) -> Mm2Result<Vec<AlignmentList>> {
    let mut cursor = Cursor::new(bytes);
    let mut results = Vec::with_capacity(expected_seqs);

    for _ in 0..expected_seqs {
        let n_aligns = read_count(&mut cursor, "alignment count")?;
        let mut aligns = Vec::with_capacity(n_aligns.min(remaining(&cursor) / MIN_RECORD));
        for _ in 0..n_aligns {
            aligns.push(read_alignment(&mut cursor)?);
        }
        results.push(aligns);
    }

    let left = remaining(&cursor);
    if left != 0 {
        return Err(Mm2Error::malformed(format!(
            "{} trailing bytes after {} sequences",
            left, expected_seqs
        )));
    }
    Ok(results)
}

/// Bytes [`encode_alignments_into`] writes for `results`.
pub fn encoded_alignments_len(results: &[AlignmentList]) -> usize {
    results
        .iter()
        .map(|aligns| {
            4 + aligns
                .iter()
                .map(|a| MIN_RECORD + 4 * a.cigar.ops().len())
                .sum::<usize>()
        })
        .sum()
}

/// Producer side of the result format; `out` must be exactly
/// [`encoded_alignments_len`] bytes.
pub fn encode_alignments_into(results: &[AlignmentList], out: &mut [u8]) {
    let mut writer = WordWriter::new(out);
    for aligns in results {
        writer.put_i32(aligns.len() as i32);
        for aln in aligns {
            writer.put_i32(aln.ref_id as i32);
            writer.put_i32(aln.ref_start as i32);
            writer.put_i32(aln.strand.encode_map_quality(aln.map_quality));
            writer.put_i32(aln.cigar.ops().len() as i32);
            for op in aln.cigar.ops() {
                writer.put_i32(op.pack());
            }
        }
    }
}
