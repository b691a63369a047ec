use std::collections::HashMap;
use std::path::Path;

use rust_htslib::bcf::{self, Read};

use crate::errors::LancError;
use crate::model::marker::{Marker, Markers};
use crate::model::ref_gt_rec::RefGTRec;
use crate::model::samples::{Panels, Samples};
use crate::name_table::NameTable;

/// Reference haplotypes plus the panel assignment recovered from the
/// reference-panel mapping file, loaded one chromosome/window slice at a
/// time by the pipeline.
pub struct ReferenceData {
    pub markers: Markers,
    pub ref_recs: Vec<RefGTRec>,
    pub panels: Panels,
}

/// Phased study genotypes: one allele sequence per haplotype, aligned to
/// `markers`.
pub struct StudyData {
    pub markers: Markers,
    pub samples: Samples,
    pub haplotype_alleles: Vec<Vec<u8>>,
}

fn reject_bref3(path: &str) -> Result<(), LancError> {
    if path.ends_with(".bref3") {
        return Err(LancError::malformed(format!(
            "{}: the compact bref3 reference encoding is not supported by this engine; \
             convert to VCF/BCF first",
            path
        )));
    }
    Ok(())
}

fn open_reader(path: &str) -> Result<bcf::Reader, LancError> {
    reject_bref3(path)?;
    bcf::Reader::from_path(Path::new(path))
        .map_err(|e| LancError::Io(format!("failed to open {}: {}", path, e)))
}

fn allele_index(gt: &rust_htslib::bcf::record::GenotypeAllele) -> Result<u8, LancError> {
    use rust_htslib::bcf::record::GenotypeAllele::*;
    match gt {
        Phased(i) | Unphased(i) => Ok((*i).min(u8::MAX as i32) as u8),
        PhasedMissing | UnphasedMissing => {
            Err(LancError::malformed("missing alleles are not permitted in phased input"))
        }
    }
}

fn require_phased(gt: &rust_htslib::bcf::record::Genotype) -> Result<(), LancError> {
    use rust_htslib::bcf::record::GenotypeAllele::*;
    for (i, allele) in gt.iter().enumerate() {
        if i > 0 {
            match allele {
                Phased(_) | PhasedMissing => {}
                Unphased(_) | UnphasedMissing => {
                    return Err(LancError::malformed(
                        "unphased genotype encountered; all input must be phased",
                    ))
                }
            }
        }
    }
    Ok(())
}

/// Reads `sample -> panel name` pairs from a two-column whitespace file.
pub fn load_ref_panel_map(path: &str) -> Result<HashMap<String, String>, LancError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| LancError::Io(format!("failed to read ref-panel file {}: {}", path, e)))?;
    let mut map = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut cols = line.split_whitespace();
        let sample = cols.next().ok_or_else(|| {
            LancError::malformed(format!("ref-panel file line {} is malformed", lineno + 1))
        })?;
        let panel = cols.next().ok_or_else(|| {
            LancError::malformed(format!("ref-panel file line {} is missing a panel column", lineno + 1))
        })?;
        map.insert(sample.to_string(), panel.to_string());
    }
    Ok(map)
}

/// Loads the reference VCF, assigning each reference sample's haplotypes
/// to the panel named in `panel_of_sample`.
pub fn load_reference_vcf(
    path: &str,
    panel_of_sample: &HashMap<String, String>,
    names: &mut NameTable,
) -> Result<ReferenceData, LancError> {
    let mut reader = open_reader(path)?;
    let header = reader.header().clone();

    let mut panel_names: Vec<String> = Vec::new();
    let mut panel_index: HashMap<String, usize> = HashMap::new();
    let mut hap_to_panel: Vec<usize> = Vec::new();

    for sample in header.samples() {
        let sample = std::str::from_utf8(sample)
            .map_err(|_| LancError::malformed("non-UTF8 sample name in reference VCF"))?
            .to_string();
        let panel_name = panel_of_sample.get(&sample).ok_or_else(|| {
            LancError::inconsistent(format!("reference sample {} has no panel assignment", sample))
        })?;
        let panel_idx = *panel_index.entry(panel_name.clone()).or_insert_with(|| {
            panel_names.push(panel_name.clone());
            panel_names.len() - 1
        });
        hap_to_panel.push(panel_idx);
        hap_to_panel.push(panel_idx);
    }
    let panels = Panels::new(panel_names, hap_to_panel)?;

    let mut markers = Markers::new();
    let mut ref_recs = Vec::new();

    for record_result in reader.records() {
        let record = record_result.map_err(|e| LancError::malformed(format!("reference VCF parse error: {}", e)))?;
        let rid = record
            .rid()
            .ok_or_else(|| LancError::malformed("reference VCF record missing contig"))?;
        let chrom_name = std::str::from_utf8(header.rid2name(rid).map_err(|e| {
            LancError::malformed(format!("reference VCF contig lookup failed: {}", e))
        })?)
        .map_err(|_| LancError::malformed("non-UTF8 contig name"))?;
        let chrom_idx = names.intern_chrom(chrom_name);
        let pos = record.pos() as u64 + 1;
        let alleles: Vec<String> = record
            .alleles()
            .iter()
            .map(|a| String::from_utf8_lossy(a).to_string())
            .collect();
        let marker = Marker::new(chrom_idx, pos, alleles)?;
        markers.push(marker)?;

        let genotypes = record
            .genotypes()
            .map_err(|e| LancError::malformed(format!("failed to read genotypes: {}", e)))?;
        let mut dense = Vec::with_capacity(panels.n_ref_haplotypes());
        for s in 0..header.sample_count() as usize {
            let gt = genotypes.get(s);
            require_phased(&gt)?;
            for allele in gt.iter() {
                dense.push(allele_index(allele)?);
            }
        }
        if dense.len() != panels.n_ref_haplotypes() {
            return Err(LancError::inconsistent(
                "reference VCF record does not have two alleles per sample",
            ));
        }
        ref_recs.push(RefGTRec::from_dense_alleles(dense));
    }

    Ok(ReferenceData {
        markers,
        ref_recs,
        panels,
    })
}

/// Loads the phased study VCF.
pub fn load_study_vcf(path: &str, names: &mut NameTable) -> Result<StudyData, LancError> {
    reject_bref3(path)?;
    let mut reader = bcf::Reader::from_path(Path::new(path))
        .map_err(|e| LancError::Io(format!("failed to open {}: {}", path, e)))?;
    let header = reader.header().clone();

    let mut samples = Samples::new();
    for sample in header.samples() {
        let sample = std::str::from_utf8(sample)
            .map_err(|_| LancError::malformed("non-UTF8 sample name in study VCF"))?
            .to_string();
        names.intern_sample(&sample);
        samples.push(sample, true);
    }

    let n_haps: usize = (0..samples.len()).map(|i| samples.n_haplotypes(i)).sum();
    let mut markers = Markers::new();
    let mut haplotype_alleles: Vec<Vec<u8>> = vec![Vec::new(); n_haps];

    for record_result in reader.records() {
        let record = record_result.map_err(|e| LancError::malformed(format!("study VCF parse error: {}", e)))?;
        let rid = record
            .rid()
            .ok_or_else(|| LancError::malformed("study VCF record missing contig"))?;
        let chrom_name = std::str::from_utf8(header.rid2name(rid).map_err(|e| {
            LancError::malformed(format!("study VCF contig lookup failed: {}", e))
        })?)
        .map_err(|_| LancError::malformed("non-UTF8 contig name"))?;
        let chrom_idx = names.intern_chrom(chrom_name);
        let pos = record.pos() as u64 + 1;
        let alleles: Vec<String> = record
            .alleles()
            .iter()
            .map(|a| String::from_utf8_lossy(a).to_string())
            .collect();
        let marker = Marker::new(chrom_idx, pos, alleles)?;
        markers.push(marker)?;

        let genotypes = record
            .genotypes()
            .map_err(|e| LancError::malformed(format!("failed to read genotypes: {}", e)))?;
        let mut hap_cursor = 0;
        for s in 0..header.sample_count() as usize {
            let gt = genotypes.get(s);
            require_phased(&gt)?;
            for allele in gt.iter() {
                haplotype_alleles[hap_cursor].push(allele_index(allele)?);
                hap_cursor += 1;
            }
        }
    }

    Ok(StudyData {
        markers,
        samples,
        haplotype_alleles,
    })
}
