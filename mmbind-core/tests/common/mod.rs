#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use mmbind_core::{FixtureEngine, IndexHandle, Runtime};
use tempfile::NamedTempFile;

pub const QUERY1: &str = concat!(
    "AGAACTCCACACATGGGATAATGTTTTGGCTAGATGGCTCCCCTACTTAGAAACATACAATT",
    "GCTAGTCATATTTCTAATTTTAGGATTTCGAGATACTGGTGATGAAGATCACATGTCC",
);
pub const QUERY5: &str = concat!(
    "ATCCAAAGAAAAGCAGAGAAATAAATAACTTGTTAGAGAGCAATGTAAGGTTAAGGGAAAGC",
    "TTTCAGGTTTGTTTTGAAGAACGAGAAATACCAAATGGTGCTTGCAAGCAATGAGAAA",
);

/// Deterministic random bases (xorshift32).
pub struct Bases(u32);

impl Bases {
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    pub fn take(&mut self, n: usize) -> String {
        (0..n)
            .map(|_| {
                self.0 ^= self.0 << 13;
                self.0 ^= self.0 >> 17;
                self.0 ^= self.0 << 5;
                b"ACGT"[(self.0 % 4) as usize] as char
            })
            .collect()
    }
}

pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'C' => 'G',
            'G' => 'C',
            'T' => 'A',
            _ => 'N',
        })
        .collect()
}

/// Two references: `ref1` starts with QUERY1, `ref2` carries the reverse
/// complement of QUERY5 at offset 60.
pub fn reference_fasta() -> NamedTempFile {
    let mut bases = Bases::new(0x9e37_79b9);
    let ref1 = format!("{}{}", QUERY1, bases.take(200));
    let flank = bases.take(60);
    let ref2 = format!("{}{}{}", flank, reverse_complement(QUERY5), bases.take(60));

    let mut file = NamedTempFile::new().expect("create temp fasta");
    writeln!(file, ">ref1 fixture reference one").unwrap();
    writeln!(file, "{}", ref1).unwrap();
    writeln!(file, ">ref2").unwrap();
    writeln!(file, "{}", ref2).unwrap();
    file.flush().unwrap();
    file
}

pub fn open_fixture() -> (NamedTempFile, Arc<FixtureEngine>, IndexHandle<FixtureEngine>) {
    let file = reference_fasta();
    let runtime = Runtime::new(FixtureEngine::new()).expect("initialize fixture engine");
    let handle = runtime.open_index(file.path()).expect("open fixture index");
    (file, runtime.bridge().clone(), handle)
}
