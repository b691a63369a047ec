/// Per-marker reference record: maps haplotype index -> allele.
///
/// Flattened to a closed sum type with two variants per Design Notes §9
/// ("the source has several `RefGTRec` implementations... flatten to two
/// concrete variants behind a single trait/interface"). Both variants
/// expose `get(h)` plus a cheap iterator over the haplotypes carrying a
/// non-null allele, so the forward-backward engine can branch once per
/// window rather than dispatch through a trait object on the hot path.
#[derive(Debug, Clone)]
pub enum RefGTRec {
    /// Dense allele vector of length `n_ref_haplotypes`.
    Dense(DenseRefGTRec),
    /// One "null" allele (the major allele by convention) plus, for each
    /// non-null allele, a sorted haplotype list.
    Sparse(SparseRefGTRec),
}

#[derive(Debug, Clone)]
pub struct DenseRefGTRec {
    pub alleles: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SparseRefGTRec {
    pub n_haplotypes: usize,
    pub null_allele: u8,
    /// non-null allele -> sorted haplotype indices carrying it.
    pub buckets: Vec<(u8, Vec<usize>)>,
}

impl RefGTRec {
    pub fn n_haplotypes(&self) -> usize {
        match self {
            RefGTRec::Dense(d) => d.alleles.len(),
            RefGTRec::Sparse(s) => s.n_haplotypes,
        }
    }

    pub fn get(&self, h: usize) -> u8 {
        match self {
            RefGTRec::Dense(d) => d.alleles[h],
            RefGTRec::Sparse(s) => s
                .buckets
                .iter()
                .find(|(_, haps)| haps.binary_search(&h).is_ok())
                .map(|(allele, _)| *allele)
                .unwrap_or(s.null_allele),
        }
    }

    /// Builds the sparse encoding from a dense allele vector, choosing the
    /// most frequent allele as "null".
    pub fn from_dense_alleles(alleles: Vec<u8>) -> RefGTRec {
        let mut counts = std::collections::HashMap::new();
        for &a in &alleles {
            *counts.entry(a).or_insert(0usize) += 1;
        }
        let null_allele = *counts.iter().max_by_key(|(_, c)| **c).map(|(a, _)| a).unwrap_or(&0);
        let mut buckets_map: std::collections::BTreeMap<u8, Vec<usize>> =
            std::collections::BTreeMap::new();
        for (h, &a) in alleles.iter().enumerate() {
            if a != null_allele {
                buckets_map.entry(a).or_default().push(h);
            }
        }
        RefGTRec::Sparse(SparseRefGTRec {
            n_haplotypes: alleles.len(),
            null_allele,
            buckets: buckets_map.into_iter().collect(),
        })
    }

    /// Iterates `(allele, haplotype)` pairs for every haplotype whose
    /// allele is not the dominant ("null") one. For the dense variant this
    /// degenerates to a full scan; the sparse variant is the one the
    /// forward-backward engine relies on to keep its deviation vector
    /// sparse (§4.2).
    pub fn non_null_entries(&self) -> Vec<(u8, usize)> {
        match self {
            RefGTRec::Dense(d) => {
                let mut counts = std::collections::HashMap::new();
                for &a in &d.alleles {
                    *counts.entry(a).or_insert(0usize) += 1;
                }
                let null = *counts.iter().max_by_key(|(_, c)| **c).map(|(a, _)| a).unwrap_or(&0);
                d.alleles
                    .iter()
                    .enumerate()
                    .filter(|(_, &a)| a != null)
                    .map(|(h, &a)| (a, h))
                    .collect()
            }
            RefGTRec::Sparse(s) => s
                .buckets
                .iter()
                .flat_map(|(a, haps)| haps.iter().map(move |&h| (*a, h)))
                .collect(),
        }
    }

    pub fn null_allele(&self) -> Option<u8> {
        match self {
            RefGTRec::Dense(_) => None,
            RefGTRec::Sparse(s) => Some(s.null_allele),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_and_sparse_agree_on_get() {
        let alleles = vec![0u8, 0, 1, 0, 0, 2, 0, 0];
        let dense = RefGTRec::Dense(DenseRefGTRec {
            alleles: alleles.clone(),
        });
        let sparse = RefGTRec::from_dense_alleles(alleles.clone());
        for h in 0..alleles.len() {
            assert_eq!(dense.get(h), sparse.get(h));
        }
    }

    #[test]
    fn sparse_picks_majority_as_null() {
        let alleles = vec![0u8, 0, 0, 1, 0, 0];
        let sparse = RefGTRec::from_dense_alleles(alleles);
        assert_eq!(sparse.null_allele(), Some(0));
        assert_eq!(sparse.non_null_entries(), vec![(1, 3)]);
    }
}
