use std::collections::HashSet;

use crate::errors::LancError;
use crate::model::marker::Markers;
use crate::model::ref_gt_rec::RefGTRec;

/// Minor allele frequency and minor allele count for one marker, computed
/// over the reference panel: spec.md §6 defines `min-maf`/`min-mac` in
/// terms of the second-largest reference allele frequency/count, not the
/// study cohort.
fn maf_and_mac(ref_rec: &RefGTRec) -> (f64, usize) {
    let n = ref_rec.n_haplotypes();
    if n == 0 {
        return (0.0, 0);
    }
    let mut counts: Vec<usize> = Vec::new();
    for h in 0..n {
        let idx = ref_rec.get(h) as usize;
        if counts.len() <= idx {
            counts.resize(idx + 1, 0);
        }
        counts[idx] += 1;
    }
    let ref_count = counts.first().copied().unwrap_or(0);
    let minor_count = n - ref_count;
    (minor_count as f64 / n as f64, minor_count.min(ref_count))
}

/// Reads an `excludemarkers` file: one marker ID or `chrom:pos` token per
/// line.
pub fn parse_exclude_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Conjunctive marker filter: a marker survives only if it passes both the
/// minimum MAF and (unless `array` is set) the minimum MAC threshold, and is
/// not named in `excluded`. `ref_recs` is the reference panel's per-marker
/// records, aligned index-for-index with `markers`.
pub fn filter_markers(
    markers: &Markers,
    ref_recs: &[RefGTRec],
    excluded: &HashSet<String>,
    min_maf: f64,
    min_mac: usize,
    array: bool,
) -> Result<Vec<bool>, LancError> {
    let n_markers = markers.len();
    let mut keep = vec![true; n_markers];
    for m in 0..n_markers {
        let marker = markers.get(m);
        let chrom_pos = format!("{}:{}", marker.chrom, marker.pos);
        let named_excluded = marker
            .id
            .as_deref()
            .map(|id| excluded.contains(id))
            .unwrap_or(false)
            || excluded.contains(&chrom_pos);
        if named_excluded {
            keep[m] = false;
            continue;
        }
        let (maf, mac) = maf_and_mac(&ref_recs[m]);
        if maf < min_maf {
            keep[m] = false;
            continue;
        }
        if !array && mac < min_mac {
            keep[m] = false;
        }
    }
    if keep.iter().all(|&k| !k) {
        return Err(LancError::insufficient(
            "marker filtering (min-maf/min-mac/excludemarkers) removed every marker",
        ));
    }
    Ok(keep)
}
