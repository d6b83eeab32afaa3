//! FASTA reading and the archive record codec.
//!
//! Archive records are written as `>description\nresidues\n`, one record per
//! sequence, so a byte range from the offset table is a complete FASTA record.
//! Reading goes through needletail for both ingest files and archive slices.

use std::io::Read;

use needletail::parse_fastx_reader;

use crate::error::{Error, Result};

/// Append one archive record. Fails with a reason when the record would not
/// parse back unchanged.
pub fn write_record(out: &mut Vec<u8>, description: &str, residues: &[u8]) -> std::result::Result<(), &'static str> {
    if description.contains(['\n', '\r']) {
        return Err("description contains a line break");
    }
    if residues.is_empty() {
        return Err("residues are empty");
    }
    if let Some(bad) = residues.iter().find(|b| !b.is_ascii_graphic() || **b == b'>') {
        return Err(if bad.is_ascii_whitespace() { "residues contain whitespace" } else { "residues contain a non-sequence byte" });
    }
    out.push(b'>');
    out.extend_from_slice(description.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(residues);
    out.push(b'\n');
    Ok(())
}

/// Read every record of a FASTA stream, handing `(description, residues)` to
/// `f`. The description is the whole header line (identifier and free text),
/// decoded lossily; residues are upper-cased with line breaks removed.
pub fn for_each_record<R, F>(reader: R, mut f: F) -> Result<()>
where
    R: Read + Send,
    F: FnMut(String, Vec<u8>) -> Result<()>,
{
    let mut reader = parse_fastx_reader(reader).map_err(|e| Error::Fasta(e.to_string()))?;
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| Error::Fasta(e.to_string()))?;
        let residues = record
            .seq()
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|b| b.to_ascii_uppercase())
            .collect();
        f(header(record.id()), residues)?;
    }
    Ok(())
}

/// Decode the single record held in an archive slice. Residues come back
/// exactly as archived.
pub fn parse_record(bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut reader = parse_fastx_reader(bytes).map_err(|e| Error::Corrupt(e.to_string()))?;
    let record = reader
        .next()
        .ok_or_else(|| Error::Corrupt("archive slice holds no record".into()))?
        .map_err(|e| Error::Corrupt(e.to_string()))?;
    Ok((header(record.id()), record.seq().into_owned()))
}

fn header(id: &[u8]) -> String {
    String::from_utf8_lossy(id).trim_end().to_string()
}
