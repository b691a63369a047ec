use crate::model::params::ModelParams;

/// Per-ancestry, per-panel allele match/mismatch probabilities at one
/// marker: `match_prob[a][p] = 1 - epsilon[a][p]`, `mismatch_prob[a][p] =
/// epsilon[a][p]`. Rebuilt whenever `ModelParams.epsilon` changes (once
/// per EM iteration), not per marker, since `epsilon` does not vary along
/// the chromosome.
#[derive(Debug, Clone)]
pub struct EmissionTable {
    match_prob: Vec<Vec<f64>>,
    mismatch_prob: Vec<Vec<f64>>,
}

impl EmissionTable {
    pub fn new(params: &ModelParams) -> Self {
        let match_prob: Vec<Vec<f64>> = params
            .epsilon
            .iter()
            .map(|row| row.iter().map(|&e| 1.0 - e).collect())
            .collect();
        let mismatch_prob = params.epsilon.clone();
        EmissionTable {
            match_prob,
            mismatch_prob,
        }
    }

    pub fn prob(&self, ancestry: usize, panel: usize, alleles_match: bool) -> f64 {
        if alleles_match {
            self.match_prob[ancestry][panel]
        } else {
            self.mismatch_prob[ancestry][panel]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ancestry::AncestrySet;
    use crate::model::samples::Panels;

    #[test]
    fn match_and_mismatch_sum_to_one() {
        let panels = Panels::new(vec!["P0".into(), "P1".into()], vec![0, 1]).unwrap();
        let anc = AncestrySet::identity(&panels).unwrap();
        let params = ModelParams::default_for(&anc, 2, 10.0, 0.02, 5.0);
        let table = EmissionTable::new(&params);
        for a in 0..2 {
            for p in 0..2 {
                let sum = table.prob(a, p, true) + table.prob(a, p, false);
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
    }
}
