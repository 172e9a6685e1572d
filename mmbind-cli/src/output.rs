//! Alignment output as TSV or JSON lines.

use anyhow::Result;
use clap::ValueEnum;
use mmbind_core::{Alignment, AlignmentList, Mm2Error};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::reads::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// one line per alignment, `*` for unaligned reads
    Tsv,
    /// one JSON object per read
    Json,
}

#[derive(Serialize)]
struct JsonRead<'a> {
    query: &'a str,
    alignments: Vec<JsonHit<'a>>,
}

#[derive(Serialize)]
struct JsonHit<'a> {
    reference: &'a str,
    ref_start: u32,
    strand: char,
    map_quality: u32,
    cigar: String,
}

fn ref_name<'n>(names: &'n [String], aln: &Alignment) -> Result<&'n str, Mm2Error> {
    let id = aln.ref_id as usize;
    names
        .get(id)
        .map(String::as_str)
        .ok_or(Mm2Error::RefIdOutOfRange { id, count: names.len() })
}

/// Write `results[i]` for `reads[i]`.
pub fn write_results<W: Write>(
    out: &mut W,
    format: OutputFormat,
    names: &[String],
    reads: &[Read],
    results: &[AlignmentList],
) -> Result<()> {
    for (read, hits) in reads.iter().zip(results) {
        match format {
            OutputFormat::Tsv => {
                if hits.is_empty() {
                    writeln!(out, "{}\t*\t*\t*\t*\t*", read.name)?;
                }
                for aln in hits {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        read.name,
                        ref_name(names, aln)?,
                        aln.ref_start,
                        char::from(aln.strand),
                        aln.map_quality,
                        aln.cigar
                    )?;
                }
            }
            OutputFormat::Json => {
                let alignments = hits
                    .iter()
                    .map(|aln| {
                        Ok(JsonHit {
                            reference: ref_name(names, aln)?,
                            ref_start: aln.ref_start,
                            strand: aln.strand.into(),
                            map_quality: aln.map_quality,
                            cigar: aln.cigar.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, Mm2Error>>()?;
                serde_json::to_writer(&mut *out, &JsonRead { query: &read.name, alignments })?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmbind_core::{Cigar, CigarKind, CigarOp, Strand};

    fn fixture() -> (Vec<String>, Vec<Read>, Vec<AlignmentList>) {
        let names = vec!["ref1".to_string(), "ref2".to_string()];
        let reads = vec![
            Read { name: "q1".into(), seq: Vec::new() },
            Read { name: "q2".into(), seq: Vec::new() },
        ];
        let cigar = Cigar(vec![
            CigarOp::new(8, CigarKind::SoftClip),
            CigarOp::new(112, CigarKind::Match),
        ]);
        let results = vec![vec![Alignment::new(1, 60, Strand::Reverse, 60, cigar)], vec![]];
        (names, reads, results)
    }

    #[test]
    fn test_tsv() {
        let (names, reads, results) = fixture();
        let mut out = Vec::new();
        write_results(&mut out, OutputFormat::Tsv, &names, &reads, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "q1\tref2\t60\t-\t60\t8S112M\nq2\t*\t*\t*\t*\t*\n");
    }

    #[test]
    fn test_json_lines() {
        let (names, reads, results) = fixture();
        let mut out = Vec::new();
        write_results(&mut out, OutputFormat::Json, &names, &reads, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["alignments"][0]["reference"], "ref2");
        assert_eq!(lines[0]["alignments"][0]["strand"], "-");
        assert_eq!(lines[1]["alignments"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_unknown_reference_id() {
        let (_, reads, results) = fixture();
        let names = vec!["ref1".to_string()];
        let mut out = Vec::new();
        assert!(write_results(&mut out, OutputFormat::Tsv, &names, &reads, &results).is_err());
    }
}
