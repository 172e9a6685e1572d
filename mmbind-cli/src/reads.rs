//! Query input.

use anyhow::Result;
use needletail::parse_fastx_file;
use std::path::Path;

use crate::error::CliError;

/// One query record.
#[derive(Debug, Clone)]
pub struct Read {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Read every record of a FASTA/FASTQ file (optionally gzipped).
pub fn load_reads(path: &Path) -> Result<Vec<Read>> {
    let mut reader = parse_fastx_file(path)
        .map_err(|e| CliError::input(path.to_path_buf(), e.to_string()))?;

    let mut reads = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| CliError::input(path.to_path_buf(), e.to_string()))?;
        let header = String::from_utf8_lossy(record.id());
        let name = header.split_whitespace().next().unwrap_or_default().to_string();
        reads.push(Read { name, seq: record.seq().into_owned() });
    }

    if reads.is_empty() {
        return Err(CliError::EmptyInput { path: path.to_path_buf() }.into());
    }
    log::info!("Loaded {} reads from {}", reads.len(), path.display());
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fastq_names_are_first_word() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "@read1 runid=abc\nACGT\n+\nIIII\n@read2\nGG\n+\nII").unwrap();
        file.flush().unwrap();

        let reads = load_reads(file.path()).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].name, "read1");
        assert_eq!(reads[0].seq, b"ACGT");
        assert_eq!(reads[1].name, "read2");
    }

    #[test]
    fn test_missing_file() {
        let err = load_reads(Path::new("/no/such/reads.fq")).unwrap_err();
        assert!(err.to_string().contains("/no/such/reads.fq"));
    }
}
