use std::fs::File;
use std::io::{BufWriter, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::LancError;
use crate::hmm::posterior::Posterior;
use crate::model::ancestry::AncestrySet;
use crate::model::marker::Markers;
use crate::model::samples::Samples;

fn gz_writer(path: &str) -> Result<GzEncoder<BufWriter<File>>, LancError> {
    let file = File::create(path).map_err(|e| LancError::Io(format!("failed to create {}: {}", path, e)))?;
    Ok(GzEncoder::new(BufWriter::new(file), Compression::default()))
}

/// Per-haplotype ancestry calls and (optionally) posteriors for one sample,
/// one marker at a time, as produced by the forward-backward engine.
pub struct SampleCalls {
    pub calls: Vec<usize>,
    pub posteriors: Option<Vec<Posterior>>,
}

/// Writes `<out>.anc.vcf.gz`: one row per core marker, FORMAT fields
/// `AN1:AN2` (plus `ANP1:ANP2` when posteriors were requested), per spec §6.
pub struct AncVcfWriter {
    out: GzEncoder<BufWriter<File>>,
    include_posteriors: bool,
}

impl AncVcfWriter {
    pub fn create(
        path: &str,
        ancestry: &AncestrySet,
        samples: &Samples,
        include_posteriors: bool,
    ) -> Result<AncVcfWriter, LancError> {
        let mut out = gz_writer(path)?;
        let io_err = |e: std::io::Error| LancError::Io(e.to_string());
        writeln!(out, "##fileformat=VCFv4.2").map_err(io_err)?;
        for a in 0..ancestry.n_ancestries() {
            writeln!(out, "##ANCESTRY=<ID={},Index={}>", ancestry.label(a), a).map_err(io_err)?;
        }
        writeln!(
            out,
            "##FORMAT=<ID=AN1,Number=1,Type=Integer,Description=\"Ancestry index of haplotype 1\">"
        )
        .map_err(io_err)?;
        writeln!(
            out,
            "##FORMAT=<ID=AN2,Number=1,Type=Integer,Description=\"Ancestry index of haplotype 2\">"
        )
        .map_err(io_err)?;
        if include_posteriors {
            writeln!(
                out,
                "##FORMAT=<ID=ANP1,Number=.,Type=Float,Description=\"Posterior ancestry probabilities, haplotype 1\">"
            )
            .map_err(io_err)?;
            writeln!(
                out,
                "##FORMAT=<ID=ANP2,Number=.,Type=Float,Description=\"Posterior ancestry probabilities, haplotype 2\">"
            )
            .map_err(io_err)?;
        }
        let format_cols = if include_posteriors { "AN1:AN2:ANP1:ANP2" } else { "AN1:AN2" };
        let mut header = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
        for i in 0..samples.len() {
            header.push('\t');
            header.push_str(samples.id(i));
        }
        writeln!(out, "{}\t{}", header, format_cols).map_err(io_err)?;
        // FORMAT column value is fixed per row below; the header line above
        // already states it once for readability of non-genotype tools.
        Ok(AncVcfWriter { out, include_posteriors })
    }

    /// Writes one marker row. `calls_per_sample[i]` is the two ancestry
    /// calls for sample `i`'s haplotypes; `posteriors_per_sample[i]`, when
    /// present, holds the matching `Posterior` pair.
    pub fn write_marker(
        &mut self,
        chrom_name: &str,
        pos: u64,
        alleles: &[String],
        calls_per_sample: &[(usize, usize)],
        posteriors_per_sample: Option<&[(Posterior, Posterior)]>,
    ) -> Result<(), LancError> {
        let io_err = |e: std::io::Error| LancError::Io(e.to_string());
        let format = if self.include_posteriors { "AN1:AN2:ANP1:ANP2" } else { "AN1:AN2" };
        write!(
            self.out,
            "{}\t{}\t.\t{}\t{}\t.\t.\t.\t{}",
            chrom_name,
            pos,
            alleles[0],
            alleles[1..].join(","),
            format
        )
        .map_err(io_err)?;
        for (i, &(an1, an2)) in calls_per_sample.iter().enumerate() {
            if self.include_posteriors {
                let (p1, p2) = &posteriors_per_sample.expect("posteriors requested")[i];
                write!(
                    self.out,
                    "\t{}:{}:{}:{}",
                    an1,
                    an2,
                    p1.rounded_strings().join(","),
                    p2.rounded_strings().join(",")
                )
                .map_err(io_err)?;
            } else {
                write!(self.out, "\t{}:{}", an1, an2).map_err(io_err)?;
            }
        }
        writeln!(self.out).map_err(io_err)?;
        Ok(())
    }

    pub fn finish(self) -> Result<(), LancError> {
        self.out.finish().map_err(|e| LancError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Writes `<out>.global.anc.gz`: one header row `SAMPLE name0 name1 ...`
/// followed by one row of proportions per study sample.
pub fn write_global_ancestry(
    path: &str,
    ancestry: &AncestrySet,
    samples: &Samples,
    proportions: &[Vec<f64>],
) -> Result<(), LancError> {
    let mut out = gz_writer(path)?;
    let io_err = |e: std::io::Error| LancError::Io(e.to_string());
    let labels: Vec<&str> = (0..ancestry.n_ancestries()).map(|a| ancestry.label(a)).collect();
    writeln!(out, "SAMPLE\t{}", labels.join("\t")).map_err(io_err)?;
    for (i, props) in proportions.iter().enumerate() {
        let row: Vec<String> = props.iter().map(|v| format!("{:.6}", v)).collect();
        writeln!(out, "{}\t{}", samples.id(i), row.join("\t")).map_err(io_err)?;
    }
    out.finish().map_err(|e| LancError::Io(e.to_string()))?;
    Ok(())
}

/// Validates that the `markers` to be written are non-empty before opening
/// any output file, so a degenerate run fails fast with one clear error
/// instead of emitting empty output files.
pub fn require_nonempty_markers(markers: &Markers) -> Result<(), LancError> {
    if markers.is_empty() {
        return Err(LancError::insufficient("no markers survived filtering; nothing to write"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_header_and_one_marker_row() {
        let ancestry = AncestrySet::new(
            vec!["EUR".to_string(), "AFR".to_string()],
            vec![vec![0], vec![1]],
        )
        .unwrap();
        let mut samples = Samples::new();
        samples.push("S1".into(), true);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("localanc_test_output.anc.vcf.gz");
        let path_str = path.to_str().unwrap().to_string();

        let mut writer = AncVcfWriter::create(&path_str, &ancestry, &samples, false).unwrap();
        writer
            .write_marker("chr1", 100, &["A".to_string(), "T".to_string()], &[(0, 1)], None)
            .unwrap();
        writer.finish().unwrap();

        let mut gz = flate2::read::GzDecoder::new(File::open(&path_str).unwrap());
        let mut text = String::new();
        gz.read_to_string(&mut text).unwrap();
        assert!(text.contains("#CHROM"));
        assert!(text.contains("chr1\t100"));
    }
}
