use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Mm2Error, Mm2Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Split the wire's sign-packed map quality into `(map_quality, strand)`.
    ///
    /// A negative value marks the reverse strand and stores the bitwise
    /// complement of the real map quality.
    pub fn decode_map_quality(packed: i32) -> (u32, Strand) {
        if packed < 0 {
            ((!packed) as u32, Strand::Reverse)
        } else {
            (packed as u32, Strand::Forward)
        }
    }

    /// Inverse of [`Strand::decode_map_quality`].
    pub fn encode_map_quality(self, map_quality: u32) -> i32 {
        let mapq = map_quality as i32;
        match self {
            Strand::Forward => mapq,
            Strand::Reverse => !mapq,
        }
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for bool {
    fn from(strand: Strand) -> Self {
        matches!(strand, Strand::Forward)
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// CIGAR operators, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    RefSkip,
    SoftClip,
    HardClip,
    Padding,
    SeqMatch,
    SeqMismatch,
}

/// `MIDNSHP=X`, indexed by opcode.
pub const CIGAR_SYMBOLS: &[u8; 9] = b"MIDNSHP=X";

impl CigarKind {
    const BY_CODE: [CigarKind; 9] = [
        CigarKind::Match,
        CigarKind::Insertion,
        CigarKind::Deletion,
        CigarKind::RefSkip,
        CigarKind::SoftClip,
        CigarKind::HardClip,
        CigarKind::Padding,
        CigarKind::SeqMatch,
        CigarKind::SeqMismatch,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::BY_CODE.get(code as usize).copied()
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn symbol(self) -> char {
        CIGAR_SYMBOLS[self as usize] as char
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CigarOp {
    pub len: u32,
    pub kind: CigarKind,
}

impl CigarOp {
    pub fn new(len: u32, kind: CigarKind) -> Self {
        Self { len, kind }
    }

    /// Decode a packed `(length << 4) | opcode` word.
    pub fn unpack(word: i32) -> Mm2Result<Self> {
        let word = word as u32;
        let kind = CigarKind::from_code(word & 0x0f)
            .ok_or_else(|| Mm2Error::malformed(format!("unknown CIGAR opcode {}", word & 0x0f)))?;
        Ok(Self { len: word >> 4, kind })
    }

    pub fn pack(self) -> i32 {
        ((self.len << 4) | self.kind.code()) as i32
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.symbol())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cigar(pub Vec<CigarOp>);

impl Cigar {
    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Query bases covered, clips included.
    pub fn query_len(&self) -> u32 {
        self.0
            .iter()
            .filter(|op| {
                matches!(
                    op.kind,
                    CigarKind::Match
                        | CigarKind::Insertion
                        | CigarKind::SoftClip
                        | CigarKind::SeqMatch
                        | CigarKind::SeqMismatch
                )
            })
            .map(|op| op.len)
            .sum()
    }

    /// Reference bases spanned.
    pub fn ref_len(&self) -> u32 {
        self.0
            .iter()
            .filter(|op| {
                matches!(
                    op.kind,
                    CigarKind::Match
                        | CigarKind::Deletion
                        | CigarKind::RefSkip
                        | CigarKind::SeqMatch
                        | CigarKind::SeqMismatch
                )
            })
            .map(|op| op.len)
            .sum()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.0 {
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

impl FromIterator<CigarOp> for Cigar {
    fn from_iter<I: IntoIterator<Item = CigarOp>>(iter: I) -> Self {
        Cigar(iter.into_iter().collect())
    }
}

/// One alignment of a query against the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alignment {
    pub ref_id: u32,
    /// 0-based
    pub ref_start: u32,
    pub strand: Strand,
    pub map_quality: u32,
    pub cigar: Cigar,
}

impl Alignment {
    pub fn new(
        ref_id: u32,
        ref_start: u32,
        strand: Strand,
        map_quality: u32,
        cigar: Cigar,
    ) -> Self {
        Self { ref_id, ref_start, strand, map_quality, cigar }
    }

    pub fn is_reverse(&self) -> bool {
        self.strand.is_reverse()
    }

    pub fn ref_end(&self) -> u32 {
        self.ref_start + self.cigar.ref_len()
    }
}

/// Alignments for one query, in the order the engine produced them.
pub type AlignmentList = Vec<Alignment>;
