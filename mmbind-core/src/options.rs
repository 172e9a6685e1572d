//! Fixed-layout view of the engine's mapping options struct.
//!
//! The engine hands back a `mm_mapopt_t`-shaped record that has already been
//! seeded from a preset and adjusted for one particular index. Fields are
//! read and written in place at fixed byte offsets in native byte order; no
//! range validation is performed.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, NativeEndian};
use serde::{Deserialize, Serialize};

use crate::bridge::NativeBridge;
use crate::buffer::OwnedBuffer;
use crate::error::{Mm2Error, Mm2Result};

/// Size of the options struct this binding was built against.
pub const EXPECTED_OPTIONS_SIZE: usize = 192;

/// Byte offsets of every field of the options struct.
pub mod offsets {
    pub const FLAGS: usize = 0;
    pub const SEED: usize = 8;
    pub const SDUST_THRESHOLD: usize = 12;
    pub const MAX_QUERY_LEN: usize = 16;
    pub const BANDWIDTH: usize = 20;
    pub const MAX_GAP: usize = 24;
    pub const MAX_GAP_REF: usize = 28;
    pub const MAX_FRAG_LEN: usize = 32;
    pub const MAX_CHAIN_SKIP: usize = 36;
    pub const MAX_CHAIN_ITER: usize = 40;
    pub const MIN_CNT: usize = 44;
    pub const MIN_CHAIN_SCORE: usize = 48;
    pub const MASK_LEVEL: usize = 52;
    pub const PRI_RATIO: usize = 56;
    pub const BEST_N: usize = 60;
    pub const MAX_JOIN_LONG: usize = 64;
    pub const MAX_JOIN_SHORT: usize = 68;
    pub const MIN_JOIN_FLANK_SCORE: usize = 72;
    pub const MIN_JOIN_FLANK_RATIO: usize = 76;
    pub const MATCH_SCORE: usize = 80;
    pub const MISMATCH_SCORE: usize = 84;
    pub const GAP_OPEN: usize = 88;
    pub const GAP_EXTEND: usize = 92;
    pub const GAP_OPEN2: usize = 96;
    pub const GAP_EXTEND2: usize = 100;
    pub const SCORE_AMBI: usize = 104;
    pub const NON_CANONICAL_COST: usize = 108;
    pub const JUNC_BONUS: usize = 112;
    pub const Z_DROP: usize = 116;
    pub const Z_DROP_INV: usize = 120;
    pub const END_BONUS: usize = 124;
    pub const MIN_DP_MAX: usize = 128;
    pub const MIN_KSW_LEN: usize = 132;
    pub const ANCHOR_EXT_LEN: usize = 136;
    pub const ANCHOR_EXT_SHIFT: usize = 140;
    pub const MAX_CLIP_RATIO: usize = 144;
    pub const PE_ORIENTATION: usize = 148;
    pub const PE_BONUS: usize = 152;
    pub const MID_OCC_FRAC: usize = 156;
    pub const MIN_MID_OCC: usize = 160;
    pub const MID_OCC: usize = 164;
    pub const MAX_OCC: usize = 168;
    pub const MINI_BATCH_SIZE: usize = 172;
    pub const MAX_SW_MATRIX: usize = 176;
    // 184..192 holds the engine's split-prefix pointer, which is never touched.
}

/// Bit values for the 64-bit flag mask at offset 0.
pub mod flags {
    /// no exact diagonal hit
    pub const NO_DIAG: i64 = 0x001;
    /// skip pairs where query name is lexicographically larger than target name
    pub const NO_DUAL: i64 = 0x002;
    pub const CIGAR: i64 = 0x004;
    pub const OUT_SAM: i64 = 0x008;
    pub const NO_QUAL: i64 = 0x010;
    pub const OUT_CG: i64 = 0x020;
    pub const OUT_CS: i64 = 0x040;
    /// splice mode
    pub const SPLICE: i64 = 0x080;
    /// match GT-AG
    pub const SPLICE_FOR: i64 = 0x100;
    /// match CT-AC, the reverse complement of GT-AG
    pub const SPLICE_REV: i64 = 0x200;
    pub const NO_LJOIN: i64 = 0x400;
    pub const OUT_CS_LONG: i64 = 0x800;
    pub const SR: i64 = 0x1000;
    pub const FRAG_MODE: i64 = 0x2000;
    pub const NO_PRINT_2ND: i64 = 0x4000;
    pub const TWO_IO_THREADS: i64 = 0x8000;
    pub const LONG_CIGAR: i64 = 0x10000;
    pub const INDEPEND_SEG: i64 = 0x20000;
    pub const SPLICE_FLANK: i64 = 0x40000;
    pub const SOFTCLIP: i64 = 0x80000;
    pub const FOR_ONLY: i64 = 0x100000;
    pub const REV_ONLY: i64 = 0x200000;
    pub const HEAP_SORT: i64 = 0x400000;
    pub const ALL_CHAINS: i64 = 0x800000;
    pub const OUT_MD: i64 = 0x1000000;
    pub const COPY_COMMENT: i64 = 0x2000000;
    /// use =/X instead of M
    pub const EQX: i64 = 0x4000000;
    /// output unmapped reads to PAF
    pub const PAF_NO_HIT: i64 = 0x8000000;
    pub const NO_END_FLT: i64 = 0x10000000;
    pub const HARD_MLEVEL: i64 = 0x20000000;
    pub const SAM_HIT_ONLY: i64 = 0x40000000;
}

/// A scalar that lives at a fixed offset of the options struct.
pub(crate) trait Field: Copy {
    const WIDTH: usize;
    fn read(bytes: &[u8]) -> Self;
    fn write(self, bytes: &mut [u8]);
}

impl Field for i32 {
    const WIDTH: usize = 4;
    fn read(bytes: &[u8]) -> Self {
        NativeEndian::read_i32(bytes)
    }
    fn write(self, bytes: &mut [u8]) {
        NativeEndian::write_i32(bytes, self)
    }
}

impl Field for i64 {
    const WIDTH: usize = 8;
    fn read(bytes: &[u8]) -> Self {
        NativeEndian::read_i64(bytes)
    }
    fn write(self, bytes: &mut [u8]) {
        NativeEndian::write_i64(bytes, self)
    }
}

impl Field for f32 {
    const WIDTH: usize = 4;
    fn read(bytes: &[u8]) -> Self {
        NativeEndian::read_f32(bytes)
    }
    fn write(self, bytes: &mut [u8]) {
        NativeEndian::write_f32(bytes, self)
    }
}

pub(crate) fn read_field<T: Field>(bytes: &[u8], offset: usize) -> T {
    T::read(&bytes[offset..offset + T::WIDTH])
}

pub(crate) fn write_field<T: Field>(bytes: &mut [u8], offset: usize, value: T) {
    value.write(&mut bytes[offset..offset + T::WIDTH])
}

/// Named bundles of defaults suited to a particular data regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    #[serde(rename = "ava-ont")]
    AvaOnt,
    #[serde(rename = "ava-pb")]
    AvaPb,
    #[serde(rename = "map10k")]
    Map10k,
    #[serde(rename = "map-pb")]
    MapPb,
    #[serde(rename = "map-ont")]
    MapOnt,
    #[serde(rename = "asm5")]
    Asm5,
    #[serde(rename = "asm10")]
    Asm10,
    #[serde(rename = "asm20")]
    Asm20,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "sr")]
    Sr,
    #[serde(rename = "splice")]
    Splice,
    #[serde(rename = "cdna")]
    Cdna,
}

impl Preset {
    pub const ALL: [Preset; 12] = [
        Preset::AvaOnt,
        Preset::AvaPb,
        Preset::Map10k,
        Preset::MapPb,
        Preset::MapOnt,
        Preset::Asm5,
        Preset::Asm10,
        Preset::Asm20,
        Preset::Short,
        Preset::Sr,
        Preset::Splice,
        Preset::Cdna,
    ];

    /// The name the engine knows this preset by.
    pub fn name(&self) -> &'static str {
        match self {
            Preset::AvaOnt => "ava-ont",
            Preset::AvaPb => "ava-pb",
            Preset::Map10k => "map10k",
            Preset::MapPb => "map-pb",
            Preset::MapOnt => "map-ont",
            Preset::Asm5 => "asm5",
            Preset::Asm10 => "asm10",
            Preset::Asm20 => "asm20",
            Preset::Short => "short",
            Preset::Sr => "sr",
            Preset::Splice => "splice",
            Preset::Cdna => "cdna",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = Mm2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| Mm2Error::UnknownPreset(s.to_string()))
    }
}

/// The options struct an [`Aligner`](crate::Aligner) passes with every batch.
///
/// Built against one index; do not carry it over to another.
pub struct MapOptions<'b, B: NativeBridge> {
    buffer: OwnedBuffer<'b, B>,
}

impl<'b, B: NativeBridge> MapOptions<'b, B> {
    /// Adopt an engine-created options buffer, rejecting one whose size
    /// disagrees with [`EXPECTED_OPTIONS_SIZE`]. A rejected buffer is
    /// released before the error is returned.
    pub(crate) fn from_buffer(buffer: OwnedBuffer<'b, B>) -> Mm2Result<Self> {
        let actual = buffer.len();
        if actual != EXPECTED_OPTIONS_SIZE {
            log::error!(
                "options struct is {} bytes, expected {}; engine version mismatch",
                actual,
                EXPECTED_OPTIONS_SIZE
            );
            return Err(Mm2Error::VersionMismatch { expected: EXPECTED_OPTIONS_SIZE, actual });
        }
        Ok(Self { buffer })
    }

    pub(crate) fn raw(&self) -> &B::Buffer {
        self.buffer.raw()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.buffer.as_bytes_mut()
    }

    pub fn flags(&self) -> i64 {
        read_field(self.as_bytes(), offsets::FLAGS)
    }

    pub fn set_flags(&mut self, value: i64) {
        write_field(self.bytes_mut(), offsets::FLAGS, value)
    }

    pub fn has_flag(&self, bit: i64) -> bool {
        self.flags() & bit == bit
    }

    pub fn set_flag(&mut self, bit: i64) {
        let value = self.flags() | bit;
        self.set_flags(value);
    }

    pub fn clear_flag(&mut self, bit: i64) {
        let value = self.flags() & !bit;
        self.set_flags(value);
    }
}

macro_rules! option_fields {
    ($( $(#[$meta:meta])* $get:ident, $set:ident: $ty:ty = $off:expr, $label:literal; )*) => {
        impl<'b, B: NativeBridge> MapOptions<'b, B> {
            $(
                $(#[$meta])*
                pub fn $get(&self) -> $ty {
                    read_field(self.as_bytes(), $off)
                }

                pub fn $set(&mut self, value: $ty) {
                    write_field(self.bytes_mut(), $off, value)
                }
            )*
        }

        impl<'b, B: NativeBridge> fmt::Display for MapOptions<'b, B> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "Flags: {:#x}", self.flags())?;
                $( write!(f, "\n{}: {}", $label, self.$get())?; )*
                Ok(())
            }
        }
    };
}

option_fields! {
    seed, set_seed: i32 = offsets::SEED, "Seed";
    /// Score threshold for SDUST masking; 0 disables it
    sdust_threshold, set_sdust_threshold: i32 = offsets::SDUST_THRESHOLD, "SDustThreshold";
    max_query_len, set_max_query_len: i32 = offsets::MAX_QUERY_LEN, "MaxQueryLen";
    bandwidth, set_bandwidth: i32 = offsets::BANDWIDTH, "Bandwidth";
    /// Break a chain if there are no minimizers in a window this long
    max_gap, set_max_gap: i32 = offsets::MAX_GAP, "MaxGap";
    max_gap_ref, set_max_gap_ref: i32 = offsets::MAX_GAP_REF, "MaxGapRef";
    max_frag_len, set_max_frag_len: i32 = offsets::MAX_FRAG_LEN, "MaxFragLen";
    max_chain_skip, set_max_chain_skip: i32 = offsets::MAX_CHAIN_SKIP, "MaxChainSkip";
    max_chain_iter, set_max_chain_iter: i32 = offsets::MAX_CHAIN_ITER, "MaxChainIter";
    /// Minimum number of minimizers on each chain
    min_cnt, set_min_cnt: i32 = offsets::MIN_CNT, "MinCnt";
    min_chain_score, set_min_chain_score: i32 = offsets::MIN_CHAIN_SCORE, "MinChainScore";
    mask_level, set_mask_level: f32 = offsets::MASK_LEVEL, "MaskLevel";
    pri_ratio, set_pri_ratio: f32 = offsets::PRI_RATIO, "PriRatio";
    /// Top chains subjected to DP alignment
    best_n, set_best_n: i32 = offsets::BEST_N, "BestN";
    max_join_long, set_max_join_long: i32 = offsets::MAX_JOIN_LONG, "MaxJoinLong";
    max_join_short, set_max_join_short: i32 = offsets::MAX_JOIN_SHORT, "MaxJoinShort";
    min_join_flank_score, set_min_join_flank_score: i32 =
        offsets::MIN_JOIN_FLANK_SCORE, "MinJoinFlankScore";
    min_join_flank_ratio, set_min_join_flank_ratio: f32 =
        offsets::MIN_JOIN_FLANK_RATIO, "MinJoinFlankRatio";
    match_score, set_match_score: i32 = offsets::MATCH_SCORE, "A";
    mismatch_score, set_mismatch_score: i32 = offsets::MISMATCH_SCORE, "B";
    gap_open, set_gap_open: i32 = offsets::GAP_OPEN, "Q";
    gap_extend, set_gap_extend: i32 = offsets::GAP_EXTEND, "E";
    gap_open2, set_gap_open2: i32 = offsets::GAP_OPEN2, "Q2";
    gap_extend2, set_gap_extend2: i32 = offsets::GAP_EXTEND2, "E2";
    /// Score when one or both bases are "N"
    score_ambi, set_score_ambi: i32 = offsets::SCORE_AMBI, "ScoreAmbi";
    /// Cost of non-canonical splice sites
    non_canonical_cost, set_non_canonical_cost: i32 = offsets::NON_CANONICAL_COST, "NonCan";
    junc_bonus, set_junc_bonus: i32 = offsets::JUNC_BONUS, "JuncBonus";
    /// Break an alignment whose score drops too fast along the diagonal
    z_drop, set_z_drop: i32 = offsets::Z_DROP, "ZDrop";
    z_drop_inv, set_z_drop_inv: i32 = offsets::Z_DROP_INV, "ZDropInv";
    end_bonus, set_end_bonus: i32 = offsets::END_BONUS, "EndBonus";
    /// Drop an alignment whose best-scoring segment is below this
    min_dp_max, set_min_dp_max: i32 = offsets::MIN_DP_MAX, "MinDPMax";
    min_ksw_len, set_min_ksw_len: i32 = offsets::MIN_KSW_LEN, "MinKSWLen";
    anchor_ext_len, set_anchor_ext_len: i32 = offsets::ANCHOR_EXT_LEN, "AnchorExtLen";
    anchor_ext_shift, set_anchor_ext_shift: i32 = offsets::ANCHOR_EXT_SHIFT, "AnchorExtShift";
    /// Drop an alignment if both ends are clipped above this ratio
    max_clip_ratio, set_max_clip_ratio: f32 = offsets::MAX_CLIP_RATIO, "MaxClipRatio";
    pe_orientation, set_pe_orientation: i32 = offsets::PE_ORIENTATION, "PEOri";
    pe_bonus, set_pe_bonus: i32 = offsets::PE_BONUS, "PEBonus";
    mid_occ_frac, set_mid_occ_frac: f32 = offsets::MID_OCC_FRAC, "MidOccFrac";
    min_mid_occ, set_min_mid_occ: i32 = offsets::MIN_MID_OCC, "MinMidOcc";
    /// Seeds occurring more often than this are ignored
    mid_occ, set_mid_occ: i32 = offsets::MID_OCC, "MidOcc";
    max_occ, set_max_occ: i32 = offsets::MAX_OCC, "MaxOcc";
    /// Query bases processed together in one mini-batch
    mini_batch_size, set_mini_batch_size: i32 = offsets::MINI_BATCH_SIZE, "MiniBatchSize";
    max_sw_matrix, set_max_sw_matrix: i64 = offsets::MAX_SW_MATRIX, "MaxSWMat";
}

#[cfg(all(test, feature = "fixture"))]
mod tests {
    use super::*;
    use crate::bridge::fixture::FixtureEngine;

    fn zeroed(engine: &FixtureEngine, len: usize) -> OwnedBuffer<'_, FixtureEngine> {
        OwnedBuffer::alloc(engine, len, "options struct").unwrap()
    }

    #[test]
    fn test_size_mismatch_is_rejected_and_released() {
        let engine = FixtureEngine::new();
        let err = MapOptions::from_buffer(zeroed(&engine, 184)).err().unwrap();
        assert!(matches!(err, Mm2Error::VersionMismatch { expected: 192, actual: 184 }));
        assert_eq!(engine.live_buffers(), 0);
    }

    #[test]
    fn test_fields_land_at_their_offsets() {
        let engine = FixtureEngine::new();
        let mut opts = MapOptions::from_buffer(zeroed(&engine, EXPECTED_OPTIONS_SIZE)).unwrap();

        opts.set_bandwidth(500);
        opts.set_pri_ratio(0.8);
        opts.set_max_sw_matrix(100_000_000);
        opts.set_flags(flags::CIGAR | flags::SR);

        let bytes = opts.as_bytes();
        assert_eq!(NativeEndian::read_i32(&bytes[20..24]), 500);
        assert_eq!(NativeEndian::read_f32(&bytes[56..60]), 0.8);
        assert_eq!(NativeEndian::read_i64(&bytes[176..184]), 100_000_000);
        assert_eq!(NativeEndian::read_i64(&bytes[0..8]), 0x1004);

        assert_eq!(opts.bandwidth(), 500);
        assert_eq!(opts.max_sw_matrix(), 100_000_000);
        // neighbours untouched
        assert_eq!(opts.max_query_len(), 0);
        assert_eq!(opts.max_gap(), 0);
    }

    #[test]
    fn test_flag_helpers() {
        let engine = FixtureEngine::new();
        let mut opts = MapOptions::from_buffer(zeroed(&engine, EXPECTED_OPTIONS_SIZE)).unwrap();
        opts.set_flag(flags::EQX);
        opts.set_flag(flags::CIGAR);
        assert!(opts.has_flag(flags::EQX));
        opts.clear_flag(flags::EQX);
        assert!(!opts.has_flag(flags::EQX));
        assert!(opts.has_flag(flags::CIGAR));
    }

    #[test]
    fn test_display_lists_every_field() {
        let engine = FixtureEngine::new();
        let mut opts = MapOptions::from_buffer(zeroed(&engine, EXPECTED_OPTIONS_SIZE)).unwrap();
        opts.set_z_drop(400);
        let text = opts.to_string();
        assert!(text.starts_with("Flags: 0x0"));
        assert!(text.contains("\nZDrop: 400"));
        assert!(text.ends_with("MaxSWMat: 0"));
        assert_eq!(text.lines().count(), 44);
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(preset.name().parse::<Preset>().unwrap(), preset);
        }
        assert!(matches!("map-hifi".parse::<Preset>(), Err(Mm2Error::UnknownPreset(_))));
    }
}
