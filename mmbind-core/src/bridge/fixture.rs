//! An in-process engine for tests and demos.
//!
//! `FixtureEngine` speaks exactly the same buffer protocol as the native
//! engine but is deliberately simple: its "index" is a FASTA file, candidate
//! loci come from exact 15-mer hits voted per diagonal, and each locus is
//! trimmed to its best-scoring ungapped segment. Good enough to produce
//! realistic results (soft clips, reverse-strand hits, map qualities) for
//! short exact-ish queries; not an aligner.
//!
//! It also keeps count of every buffer it hands out and can be told to fail
//! in specific ways, so callers can check that nothing leaks on any path.
//!
//! Built only with the `fixture` feature.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::NativeBridge;
use crate::codec::{encode_alignments_into, encode_ref_names, encoded_alignments_len, split_batch};
use crate::options::{flags, offsets, read_field, write_field, EXPECTED_OPTIONS_SIZE};
use crate::types::{Alignment, AlignmentList, Cigar, CigarKind, CigarOp, Strand};

/// k-mer length used to index references
pub const FIXTURE_K: usize = 15;

/// Failure modes the fixture can be told to exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// every allocation returns null
    FailAlloc,
    /// `create_options` returns null
    FailOptions,
    /// `align` returns null
    FailAlign,
    /// `align` drops the last word of an otherwise valid result
    TruncateResults,
    /// `ref_names` returns null
    FailRefNames,
}

/// Heap memory standing in for a `malloc`ed native buffer.
#[derive(Debug)]
pub struct FixtureBuffer(Box<[u8]>);

impl AsRef<[u8]> for FixtureBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for FixtureBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

fn pack_kmer(window: &[u8]) -> Option<u32> {
    window.iter().try_fold(0u32, |acc, &b| {
        let code = match b {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => return None,
        };
        Some((acc << 2) | code)
    })
}

fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            _ => b'N',
        })
        .collect()
}

/// Reference sequences plus a k-mer position table.
#[derive(Debug)]
pub struct FixtureIndex {
    names: Vec<String>,
    seqs: Vec<Vec<u8>>,
    kmers: HashMap<u32, Vec<(u32, u32)>>,
}

impl FixtureIndex {
    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut seqs = Vec::new();
        let mut kmers: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();

        for (rid, (name, seq)) in records.into_iter().enumerate() {
            let seq = seq.to_ascii_uppercase();
            if seq.len() >= FIXTURE_K {
                for (pos, window) in seq.windows(FIXTURE_K).enumerate() {
                    if let Some(key) = pack_kmer(window) {
                        kmers.entry(key).or_default().push((rid as u32, pos as u32));
                    }
                }
            }
            names.push(name.into());
            seqs.push(seq);
        }

        Self { names, seqs, kmers }
    }

    /// Read every record of a FASTA/FASTQ file; the first word of each
    /// header becomes the reference name.
    pub fn from_fasta(path: &Path) -> Option<Self> {
        let mut reader = match needletail::parse_fastx_file(path) {
            Ok(reader) => reader,
            Err(e) => {
                log::debug!("fixture: can't parse {}: {}", path.display(), e);
                return None;
            }
        };

        let mut records = Vec::new();
        while let Some(record) = reader.next() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("fixture: bad record in {}: {}", path.display(), e);
                    return None;
                }
            };
            let header = String::from_utf8_lossy(record.id()).into_owned();
            let name = header.split_whitespace().next().unwrap_or_default().to_string();
            records.push((name, record.seq().into_owned()));
        }

        if records.is_empty() {
            return None;
        }
        Some(Self::from_records(records))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Occurrence count above which the `frac` most repetitive k-mers lie.
    fn occurrence_cutoff(&self, frac: f32) -> i32 {
        let mut counts: Vec<usize> = self.kmers.values().map(Vec::len).collect();
        if counts.is_empty() {
            return 0;
        }
        counts.sort_unstable_by(|a, b| b.cmp(a));
        let rank = ((counts.len() as f64) * f64::from(frac)) as usize;
        counts[rank.min(counts.len() - 1)] as i32
    }

    fn map_query(&self, query: &[u8], params: &MapParams) -> AlignmentList {
        let query = query.to_ascii_uppercase();
        if query.len() < FIXTURE_K {
            return Vec::new();
        }

        let mut strands = Vec::with_capacity(2);
        if params.flags & flags::REV_ONLY == 0 {
            strands.push((Strand::Forward, query.clone()));
        }
        if params.flags & flags::FOR_ONLY == 0 {
            strands.push((Strand::Reverse, reverse_complement(&query)));
        }

        let mut hits = Vec::new();
        for (strand, oriented) in &strands {
            let mut votes: HashMap<(u32, i64), u32> = HashMap::new();
            for (qpos, window) in oriented.windows(FIXTURE_K).enumerate() {
                let Some(positions) = pack_kmer(window).and_then(|key| self.kmers.get(&key)) else {
                    continue;
                };
                if params.mid_occ > 0 && positions.len() > params.mid_occ as usize {
                    continue;
                }
                for &(rid, rpos) in positions {
                    *votes.entry((rid, rpos as i64 - qpos as i64)).or_default() += 1;
                }
            }

            for ((rid, diag), count) in votes {
                if count < params.min_cnt.max(1) as u32 {
                    continue;
                }
                if let Some(hit) = self.extend(oriented, rid, diag, *strand, params) {
                    hits.push(hit);
                }
            }
        }

        self.select(hits, query.len(), params)
    }

    /// Best-scoring ungapped segment of `oriented` along one diagonal.
    fn extend(
        &self,
        oriented: &[u8],
        rid: u32,
        diag: i64,
        strand: Strand,
        params: &MapParams,
    ) -> Option<Hit> {
        let reference = &self.seqs[rid as usize];
        let first = (-diag).max(0) as usize;
        let last = (reference.len() as i64 - diag).min(oriented.len() as i64);
        if last <= first as i64 {
            return None;
        }

        let (mut best, mut best_span) = (0i64, (0usize, 0usize));
        let (mut run, mut run_start) = (0i64, first);
        for qpos in first..last as usize {
            let rbase = reference[(qpos as i64 + diag) as usize];
            let qbase = oriented[qpos];
            run += if qbase == rbase && qbase != b'N' {
                i64::from(params.match_score)
            } else {
                -i64::from(params.mismatch_score)
            };
            if run <= 0 {
                run = 0;
                run_start = qpos + 1;
            } else if run > best {
                best = run;
                best_span = (run_start, qpos + 1);
            }
        }

        if best <= 0 || best < i64::from(params.min_dp_max) {
            return None;
        }
        Some(Hit {
            rid,
            strand,
            qs: best_span.0,
            qe: best_span.1,
            ref_start: (best_span.0 as i64 + diag) as u32,
            score: best,
        })
    }

    fn select(&self, mut hits: Vec<Hit>, query_len: usize, params: &MapParams) -> AlignmentList {
        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.rid.cmp(&b.rid))
                .then(a.ref_start.cmp(&b.ref_start))
        });

        let mut kept: Vec<Hit> = Vec::new();
        for hit in hits {
            if kept.iter().any(|k| k.overlaps(&hit)) {
                continue;
            }
            kept.push(hit);
        }
        let Some(primary) = kept.first().copied() else {
            return Vec::new();
        };

        let runner_up = kept.get(1).map_or(0, |h| h.score);
        let primary_mapq = (60.0 * (1.0 - runner_up as f64 / primary.score as f64))
            .round()
            .clamp(0.0, 60.0) as u32;
        let min_secondary = f64::from(params.pri_ratio) * primary.score as f64;
        let limit = params.best_n.max(1) as usize;

        kept.into_iter()
            .enumerate()
            .filter(|(i, hit)| *i == 0 || hit.score as f64 >= min_secondary)
            .take(limit)
            .map(|(i, hit)| {
                let mapq = if i == 0 { primary_mapq } else { 0 };
                let cigar = if params.flags & flags::CIGAR != 0 {
                    hit.cigar(query_len)
                } else {
                    Cigar::default()
                };
                Alignment::new(hit.rid, hit.ref_start, hit.strand, mapq, cigar)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    rid: u32,
    strand: Strand,
    qs: usize,
    qe: usize,
    ref_start: u32,
    score: i64,
}

impl Hit {
    fn ref_end(&self) -> u32 {
        self.ref_start + (self.qe - self.qs) as u32
    }

    fn overlaps(&self, other: &Hit) -> bool {
        self.rid == other.rid
            && self.strand == other.strand
            && self.ref_start < other.ref_end()
            && other.ref_start < self.ref_end()
    }

    /// Reference-oriented CIGAR with the unaligned query ends as soft clips.
    fn cigar(&self, query_len: usize) -> Cigar {
        let mut ops = Vec::with_capacity(3);
        if self.qs > 0 {
            ops.push(CigarOp::new(self.qs as u32, CigarKind::SoftClip));
        }
        ops.push(CigarOp::new((self.qe - self.qs) as u32, CigarKind::Match));
        if self.qe < query_len {
            ops.push(CigarOp::new((query_len - self.qe) as u32, CigarKind::SoftClip));
        }
        Cigar(ops)
    }
}

/// The options fields the fixture actually consults.
struct MapParams {
    flags: i64,
    min_cnt: i32,
    pri_ratio: f32,
    best_n: i32,
    match_score: i32,
    mismatch_score: i32,
    min_dp_max: i32,
    mid_occ: i32,
}

impl MapParams {
    fn read(opts: &[u8]) -> Option<Self> {
        if opts.len() < EXPECTED_OPTIONS_SIZE {
            return None;
        }
        Some(Self {
            flags: read_field(opts, offsets::FLAGS),
            min_cnt: read_field(opts, offsets::MIN_CNT),
            pri_ratio: read_field(opts, offsets::PRI_RATIO),
            best_n: read_field(opts, offsets::BEST_N),
            match_score: read_field(opts, offsets::MATCH_SCORE),
            mismatch_score: read_field(opts, offsets::MISMATCH_SCORE),
            min_dp_max: read_field(opts, offsets::MIN_DP_MAX),
            mid_occ: read_field(opts, offsets::MID_OCC),
        })
    }
}

fn write_defaults(opts: &mut [u8]) {
    write_field(opts, offsets::FLAGS, 0i64);
    write_field(opts, offsets::SEED, 11i32);
    write_field(opts, offsets::SDUST_THRESHOLD, 0i32);
    write_field(opts, offsets::MAX_QUERY_LEN, 0i32);
    write_field(opts, offsets::BANDWIDTH, 500i32);
    write_field(opts, offsets::MAX_GAP, 5000i32);
    write_field(opts, offsets::MAX_GAP_REF, -1i32);
    write_field(opts, offsets::MAX_FRAG_LEN, 0i32);
    write_field(opts, offsets::MAX_CHAIN_SKIP, 25i32);
    write_field(opts, offsets::MAX_CHAIN_ITER, 5000i32);
    write_field(opts, offsets::MIN_CNT, 3i32);
    write_field(opts, offsets::MIN_CHAIN_SCORE, 40i32);
    write_field(opts, offsets::MASK_LEVEL, 0.5f32);
    write_field(opts, offsets::PRI_RATIO, 0.8f32);
    write_field(opts, offsets::BEST_N, 5i32);
    write_field(opts, offsets::MAX_JOIN_LONG, 20000i32);
    write_field(opts, offsets::MAX_JOIN_SHORT, 2000i32);
    write_field(opts, offsets::MIN_JOIN_FLANK_SCORE, 1000i32);
    write_field(opts, offsets::MIN_JOIN_FLANK_RATIO, 0.5f32);
    write_field(opts, offsets::MATCH_SCORE, 2i32);
    write_field(opts, offsets::MISMATCH_SCORE, 4i32);
    write_field(opts, offsets::GAP_OPEN, 4i32);
    write_field(opts, offsets::GAP_EXTEND, 2i32);
    write_field(opts, offsets::GAP_OPEN2, 24i32);
    write_field(opts, offsets::GAP_EXTEND2, 1i32);
    write_field(opts, offsets::SCORE_AMBI, 1i32);
    write_field(opts, offsets::NON_CANONICAL_COST, 0i32);
    write_field(opts, offsets::JUNC_BONUS, 0i32);
    write_field(opts, offsets::Z_DROP, 400i32);
    write_field(opts, offsets::Z_DROP_INV, 200i32);
    write_field(opts, offsets::END_BONUS, -1i32);
    write_field(opts, offsets::MIN_DP_MAX, 80i32);
    write_field(opts, offsets::MIN_KSW_LEN, 200i32);
    write_field(opts, offsets::ANCHOR_EXT_LEN, 20i32);
    write_field(opts, offsets::ANCHOR_EXT_SHIFT, 6i32);
    write_field(opts, offsets::MAX_CLIP_RATIO, 1.0f32);
    write_field(opts, offsets::PE_ORIENTATION, 0i32);
    write_field(opts, offsets::PE_BONUS, 33i32);
    write_field(opts, offsets::MID_OCC_FRAC, 2e-4f32);
    write_field(opts, offsets::MIN_MID_OCC, 10i32);
    write_field(opts, offsets::MID_OCC, 0i32);
    write_field(opts, offsets::MAX_OCC, 0i32);
    write_field(opts, offsets::MINI_BATCH_SIZE, 500_000_000i32);
    write_field(opts, offsets::MAX_SW_MATRIX, 100_000_000i64);
}

fn set_scores(opts: &mut [u8], a: i32, b: i32, q: i32, e: i32, q2: i32, e2: i32) {
    write_field(opts, offsets::MATCH_SCORE, a);
    write_field(opts, offsets::MISMATCH_SCORE, b);
    write_field(opts, offsets::GAP_OPEN, q);
    write_field(opts, offsets::GAP_EXTEND, e);
    write_field(opts, offsets::GAP_OPEN2, q2);
    write_field(opts, offsets::GAP_EXTEND2, e2);
}

fn add_flags(opts: &mut [u8], bits: i64) {
    let current: i64 = read_field(opts, offsets::FLAGS);
    write_field(opts, offsets::FLAGS, current | bits);
}

/// Approximations of the engine's preset tables. Returns false for an
/// unknown preset name.
fn apply_preset(opts: &mut [u8], preset: &str) -> bool {
    match preset {
        "map-ont" | "map-pb" | "map10k" => {}
        "ava-ont" | "ava-pb" => {
            add_flags(opts, flags::ALL_CHAINS | flags::NO_DIAG | flags::NO_DUAL | flags::NO_LJOIN);
            write_field(opts, offsets::MIN_CHAIN_SCORE, 100i32);
            write_field(opts, offsets::PRI_RATIO, 0.0f32);
            write_field(opts, offsets::MAX_GAP, 10000i32);
            write_field(opts, offsets::MAX_CHAIN_SKIP, 25i32);
        }
        "asm5" | "asm10" | "asm20" => {
            match preset {
                "asm5" => set_scores(opts, 1, 19, 39, 3, 81, 1),
                "asm10" => set_scores(opts, 1, 9, 16, 2, 41, 1),
                _ => set_scores(opts, 1, 4, 6, 2, 26, 1),
            }
            write_field(opts, offsets::Z_DROP, 200i32);
            write_field(opts, offsets::Z_DROP_INV, 200i32);
            write_field(opts, offsets::MIN_DP_MAX, 200i32);
            write_field(opts, offsets::BEST_N, 50i32);
        }
        "short" | "sr" => {
            add_flags(
                opts,
                flags::SR
                    | flags::FRAG_MODE
                    | flags::NO_PRINT_2ND
                    | flags::TWO_IO_THREADS
                    | flags::HEAP_SORT,
            );
            write_field(opts, offsets::PE_ORIENTATION, 1i32);
            set_scores(opts, 2, 8, 12, 2, 24, 1);
            write_field(opts, offsets::Z_DROP, 100i32);
            write_field(opts, offsets::Z_DROP_INV, 100i32);
            write_field(opts, offsets::END_BONUS, 10i32);
            write_field(opts, offsets::MAX_FRAG_LEN, 800i32);
            write_field(opts, offsets::MAX_GAP, 100i32);
            write_field(opts, offsets::BANDWIDTH, 100i32);
            write_field(opts, offsets::PRI_RATIO, 0.5f32);
            write_field(opts, offsets::MIN_CNT, 2i32);
            write_field(opts, offsets::MIN_CHAIN_SCORE, 25i32);
            write_field(opts, offsets::MIN_DP_MAX, 40i32);
            write_field(opts, offsets::BEST_N, 20i32);
            write_field(opts, offsets::MID_OCC, 1000i32);
            write_field(opts, offsets::MAX_OCC, 5000i32);
            write_field(opts, offsets::MINI_BATCH_SIZE, 50_000_000i32);
        }
        "splice" | "cdna" => {
            add_flags(
                opts,
                flags::SPLICE | flags::SPLICE_FOR | flags::SPLICE_REV | flags::SPLICE_FLANK,
            );
            write_field(opts, offsets::MAX_GAP, 2000i32);
            write_field(opts, offsets::MAX_GAP_REF, 200_000i32);
            write_field(opts, offsets::BANDWIDTH, 200_000i32);
            set_scores(opts, 1, 2, 2, 1, 32, 0);
            write_field(opts, offsets::NON_CANONICAL_COST, 9i32);
            write_field(opts, offsets::JUNC_BONUS, 9i32);
            write_field(opts, offsets::Z_DROP, 200i32);
            write_field(opts, offsets::Z_DROP_INV, 100i32);
        }
        _ => return false,
    }
    true
}

/// Recompute the index-dependent thresholds, as the engine does after a
/// preset has been applied.
fn update_for_index(opts: &mut [u8], index: &FixtureIndex) {
    let mid_occ: i32 = read_field(opts, offsets::MID_OCC);
    if mid_occ <= 0 {
        let frac: f32 = read_field(opts, offsets::MID_OCC_FRAC);
        let min_mid_occ: i32 = read_field(opts, offsets::MIN_MID_OCC);
        let cutoff = index.occurrence_cutoff(frac).max(min_mid_occ);
        write_field(opts, offsets::MID_OCC, cutoff);
    }
}

/// The in-process engine.
#[derive(Debug)]
pub struct FixtureEngine {
    options_size: usize,
    fault: Mutex<Fault>,
    live_buffers: AtomicUsize,
    allocations: AtomicUsize,
    open_indices: AtomicUsize,
    initializations: AtomicUsize,
    align_calls: AtomicUsize,
    ref_names_calls: AtomicUsize,
}

impl FixtureEngine {
    pub fn new() -> Self {
        Self::with_options_size(EXPECTED_OPTIONS_SIZE)
    }

    /// An engine whose options struct has a different size, as a build of
    /// another engine version would.
    pub fn with_options_size(options_size: usize) -> Self {
        Self {
            options_size,
            fault: Mutex::new(Fault::None),
            live_buffers: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            open_indices: AtomicUsize::new(0),
            initializations: AtomicUsize::new(0),
            align_calls: AtomicUsize::new(0),
            ref_names_calls: AtomicUsize::new(0),
        }
    }

    /// Make subsequent calls fail in the given way until cleared.
    pub fn inject(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    pub fn clear_faults(&self) {
        self.inject(Fault::None);
    }

    /// Buffers handed out and not yet freed
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::SeqCst)
    }

    pub fn total_allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Indices opened and not yet destroyed
    pub fn open_indices(&self) -> usize {
        self.open_indices.load(Ordering::SeqCst)
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn align_calls(&self) -> usize {
        self.align_calls.load(Ordering::SeqCst)
    }

    /// Times the reference names were requested, failed requests included
    pub fn ref_names_calls(&self) -> usize {
        self.ref_names_calls.load(Ordering::SeqCst)
    }

    fn fault(&self) -> Fault {
        *self.fault.lock()
    }

    fn allocate(&self, len: usize) -> Option<FixtureBuffer> {
        if self.fault() == Fault::FailAlloc {
            return None;
        }
        self.live_buffers.fetch_add(1, Ordering::SeqCst);
        self.allocations.fetch_add(1, Ordering::SeqCst);
        Some(FixtureBuffer(vec![0u8; len].into_boxed_slice()))
    }

    fn buffer_from(&self, bytes: &[u8]) -> Option<FixtureBuffer> {
        let mut buffer = self.allocate(bytes.len())?;
        buffer.0.copy_from_slice(bytes);
        Some(buffer)
    }
}

impl Default for FixtureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBridge for FixtureEngine {
    type Index = FixtureIndex;
    type Buffer = FixtureBuffer;

    fn name(&self) -> &'static str {
        "fixture"
    }

    fn version(&self) -> String {
        format!("fixture-{}", env!("CARGO_PKG_VERSION"))
    }

    fn initialize(&self) -> Result<(), String> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_index(&self, path: &Path) -> Option<FixtureIndex> {
        let index = FixtureIndex::from_fasta(path)?;
        self.open_indices.fetch_add(1, Ordering::SeqCst);
        Some(index)
    }

    fn destroy_index(&self, _index: FixtureIndex) {
        self.open_indices.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_options(&self, index: &FixtureIndex, preset: Option<&str>) -> Option<FixtureBuffer> {
        if self.fault() == Fault::FailOptions {
            return None;
        }

        let mut opts = [0u8; EXPECTED_OPTIONS_SIZE];
        write_defaults(&mut opts);
        if let Some(preset) = preset {
            if !apply_preset(&mut opts, preset) {
                log::debug!("fixture: unknown preset {}", preset);
                return None;
            }
        }
        add_flags(&mut opts, flags::CIGAR);
        update_for_index(&mut opts, index);

        let mut buffer = self.allocate(self.options_size)?;
        let n = self.options_size.min(EXPECTED_OPTIONS_SIZE);
        buffer.0[..n].copy_from_slice(&opts[..n]);
        Some(buffer)
    }

    fn align(
        &self,
        index: &FixtureIndex,
        options: &FixtureBuffer,
        seqs: &FixtureBuffer,
    ) -> Option<FixtureBuffer> {
        self.align_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault();
        if fault == Fault::FailAlign {
            return None;
        }

        let params = MapParams::read(options.as_ref())?;
        let queries = split_batch(seqs.as_ref())?;
        let results: Vec<AlignmentList> =
            queries.iter().map(|q| index.map_query(q, &params)).collect();

        let mut encoded = vec![0u8; encoded_alignments_len(&results)];
        encode_alignments_into(&results, &mut encoded);
        if fault == Fault::TruncateResults {
            let keep = encoded.len().saturating_sub(4);
            encoded.truncate(keep);
        }
        self.buffer_from(&encoded)
    }

    fn ref_names(&self, index: &FixtureIndex) -> Option<FixtureBuffer> {
        self.ref_names_calls.fetch_add(1, Ordering::SeqCst);
        if self.fault() == Fault::FailRefNames {
            return None;
        }
        self.buffer_from(&encode_ref_names(index.names()))
    }

    fn alloc(&self, len: usize) -> Option<FixtureBuffer> {
        self.allocate(len)
    }

    fn free(&self, _buffer: FixtureBuffer) {
        self.live_buffers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MapParams {
        let mut opts = [0u8; EXPECTED_OPTIONS_SIZE];
        write_defaults(&mut opts);
        add_flags(&mut opts, flags::CIGAR);
        write_field(&mut opts, offsets::MID_OCC, 10i32);
        MapParams::read(&opts).unwrap()
    }

    fn reference() -> Vec<u8> {
        // deterministic, non-repetitive
        let mut state = 0x2545_f491u32;
        (0..300)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                b"ACGT"[(state % 4) as usize]
            })
            .collect()
    }

    #[test]
    fn test_pack_kmer_rejects_ambiguous_bases() {
        assert_eq!(pack_kmer(b"ACGT"), Some(0b00_01_10_11));
        assert_eq!(pack_kmer(b"ACNT"), None);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
    }

    #[test]
    fn test_exact_hit() {
        let reference = reference();
        let index = FixtureIndex::from_records(vec![("r", reference.clone())]);
        let hits = index.map_query(&reference[40..140], &params());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ref_start, 40);
        assert_eq!(hits[0].map_quality, 60);
        assert_eq!(hits[0].cigar.to_string(), "100M");
    }

    #[test]
    fn test_mismatched_tail_becomes_clip() {
        let reference = reference();
        let index = FixtureIndex::from_records(vec![("r", reference.clone())]);
        let mut query = reference[0..100].to_vec();
        for base in &mut query[90..] {
            *base = match *base {
                b'A' => b'C',
                b'C' => b'G',
                b'G' => b'T',
                _ => b'A',
            };
        }
        let hits = index.map_query(&query, &params());
        assert_eq!(hits[0].cigar.to_string(), "90M10S");
    }

    #[test]
    fn test_short_or_unknown_query_has_no_hits() {
        let index = FixtureIndex::from_records(vec![("r", reference())]);
        assert!(index.map_query(b"ACGT", &params()).is_empty());
        assert!(index.map_query(&[b'N'; 200], &params()).is_empty());
    }

    #[test]
    fn test_options_defaults_and_update() {
        let engine = FixtureEngine::new();
        let index = FixtureIndex::from_records(vec![("r", reference())]);
        let opts = engine.create_options(&index, None).unwrap();
        let bytes: &[u8] = opts.as_ref();
        assert_eq!(bytes.len(), EXPECTED_OPTIONS_SIZE);
        assert_eq!(read_field::<i64>(bytes, offsets::FLAGS) & flags::CIGAR, flags::CIGAR);
        // tiny index: cutoff is raised to the configured minimum
        assert_eq!(read_field::<i32>(bytes, offsets::MID_OCC), 10);
        engine.free(opts);
        assert_eq!(engine.live_buffers(), 0);
    }

    #[test]
    fn test_sr_preset_keeps_explicit_mid_occ() {
        let engine = FixtureEngine::new();
        let index = FixtureIndex::from_records(vec![("r", reference())]);
        let opts = engine.create_options(&index, Some("sr")).unwrap();
        assert_eq!(read_field::<i32>(opts.as_ref(), offsets::MID_OCC), 1000);
        assert_ne!(read_field::<i64>(opts.as_ref(), offsets::FLAGS) & flags::SR, 0);
        engine.free(opts);
    }

    #[test]
    fn test_unknown_preset_is_null() {
        let engine = FixtureEngine::new();
        let index = FixtureIndex::from_records(vec![("r", reference())]);
        assert!(engine.create_options(&index, Some("nope")).is_none());
        assert_eq!(engine.live_buffers(), 0);
    }
}
