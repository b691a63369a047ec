use crate::errors::LancError;

/// One marker (a VCF site): chromosome index, base position, and alleles.
///
/// Invariant: `alleles` is ordered, `alleles[0]` is REF, and
/// `alleles.len() >= 2` for any marker used in inference.
#[derive(Debug, Clone)]
pub struct Marker {
    pub chrom: usize,
    pub pos: u64,
    pub id: Option<String>,
    pub alleles: Vec<String>,
    pub qual: Option<f32>,
    pub filter: Option<String>,
}

impl Marker {
    pub fn new(chrom: usize, pos: u64, alleles: Vec<String>) -> Result<Marker, LancError> {
        if alleles.len() < 2 {
            return Err(LancError::malformed(format!(
                "marker at {}:{} has fewer than 2 alleles",
                chrom, pos
            )));
        }
        Ok(Marker {
            chrom,
            pos,
            id: None,
            alleles,
            qual: None,
            filter: None,
        })
    }

    pub fn n_alleles(&self) -> usize {
        self.alleles.len()
    }
}

/// An ordered sequence of markers.
///
/// Invariant: positions are strictly monotone increasing within a
/// chromosome, and all markers of one chromosome occupy a contiguous run
/// (no interleaving between chromosomes).
#[derive(Debug, Default, Clone)]
pub struct Markers {
    markers: Vec<Marker>,
}

impl Markers {
    pub fn new() -> Self {
        Markers { markers: Vec::new() }
    }

    /// Appends a marker, checking the ordering invariant against the
    /// previous marker already stored.
    pub fn push(&mut self, marker: Marker) -> Result<(), LancError> {
        if let Some(prev) = self.markers.last() {
            if marker.chrom == prev.chrom && marker.pos <= prev.pos {
                return Err(LancError::malformed(format!(
                    "marker positions are not strictly increasing on chromosome {}: {} then {}",
                    marker.chrom, prev.pos, marker.pos
                )));
            }
            if marker.chrom != prev.chrom {
                // a chromosome reappearing after another one started would
                // violate the contiguous-run invariant.
                let seen_before = self
                    .markers
                    .iter()
                    .rev()
                    .skip_while(|m| m.chrom == prev.chrom)
                    .any(|m| m.chrom == marker.chrom);
                if seen_before {
                    return Err(LancError::malformed(format!(
                        "markers for chromosome {} are not contiguous",
                        marker.chrom
                    )));
                }
            }
        }
        self.markers.push(marker);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, i: usize) -> &Marker {
        &self.markers[i]
    }

    pub fn as_slice(&self) -> &[Marker] {
        &self.markers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Marker> {
        self.markers.iter()
    }

    /// Index ranges `[start, end)` covering one chromosome's run each, in
    /// the order chromosomes first appear.
    pub fn chromosome_ranges(&self) -> Vec<(usize, std::ops::Range<usize>)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=self.markers.len() {
            if i == self.markers.len() || self.markers[i].chrom != self.markers[start].chrom {
                ranges.push((self.markers[start].chrom, start..i));
                start = i;
            }
        }
        ranges
    }

    /// Removes markers whose index is in `drop_indices` (sorted, deduped),
    /// preserving order. Used by marker filtering (`excludemarkers`,
    /// `min-maf`/`min-mac`).
    pub fn retain_indices(&mut self, keep: &[bool]) {
        assert_eq!(keep.len(), self.markers.len());
        let mut it = keep.iter();
        self.markers.retain(|_| *it.next().unwrap());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_monotone_positions() {
        let mut m = Markers::new();
        m.push(Marker::new(0, 100, vec!["A".into(), "T".into()]).unwrap())
            .unwrap();
        let err = m.push(Marker::new(0, 100, vec!["A".into(), "T".into()]).unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn rejects_interleaved_chromosomes() {
        let mut m = Markers::new();
        m.push(Marker::new(0, 100, vec!["A".into(), "T".into()]).unwrap())
            .unwrap();
        m.push(Marker::new(1, 50, vec!["A".into(), "T".into()]).unwrap())
            .unwrap();
        let err = m.push(Marker::new(0, 200, vec!["A".into(), "T".into()]).unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn chromosome_ranges_are_contiguous() {
        let mut m = Markers::new();
        for pos in [10, 20, 30] {
            m.push(Marker::new(0, pos, vec!["A".into(), "T".into()]).unwrap())
                .unwrap();
        }
        for pos in [5, 15] {
            m.push(Marker::new(1, pos, vec!["A".into(), "T".into()]).unwrap())
                .unwrap();
        }
        let ranges = m.chromosome_ranges();
        assert_eq!(ranges, vec![(0, 0..3), (1, 3..5)]);
    }
}
