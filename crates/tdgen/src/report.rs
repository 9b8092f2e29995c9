use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::fasta::Fasta;
use crate::generate::DecoyDatabase;
use crate::Error;

const LINE_WIDTH: usize = 60;

/// Write the combined database: target records unmodified, then the decoy
/// records, sequences wrapped at 60 columns
pub fn write_fasta<P: AsRef<Path>>(
    path: P,
    fasta: &Fasta,
    database: &DecoyDatabase,
) -> Result<(), Error> {
    let mut wtr = BufWriter::new(File::create(path)?);
    for record in &fasta.records {
        write_record(&mut wtr, &record.header, &record.sequence)?;
    }
    for decoy in &database.decoys {
        write_record(&mut wtr, &decoy.header, &decoy.sequence)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_record<W: Write>(wtr: &mut W, header: &str, sequence: &str) -> std::io::Result<()> {
    writeln!(wtr, ">{}", header)?;
    for chunk in sequence.as_bytes().chunks(LINE_WIDTH) {
        wtr.write_all(chunk)?;
        wtr.write_all(b"\n")?;
    }
    Ok(())
}

/// Write the run report: unmutable peptides with reason codes and protein
/// counts, plus any input records skipped during parsing
pub fn write_report<P: AsRef<Path>>(
    path: P,
    fasta: &Fasta,
    database: &DecoyDatabase,
) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())?;
    wtr.write_record(["kind", "item", "detail", "proteins"])?;
    for peptide in &database.unmutable {
        wtr.write_record([
            "unmutable_peptide",
            &peptide.sequence,
            peptide.reason.as_str(),
            &peptide.proteins.to_string(),
        ])?;
    }
    for record in &fasta.skipped {
        wtr.write_record(["malformed_record", &record.header, &record.reason, "0"])?;
    }
    wtr.flush()?;
    Ok(())
}
