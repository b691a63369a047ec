use crate::errors::LancError;
use crate::model::ancestry::AncestrySet;

/// Mutable-across-EM-iterations model parameters; immutable within one
/// forward-backward pass.
///
/// - `t`: generations since admixture.
/// - `mu[a]`: global ancestry proportions, sum to 1, all > 0.
/// - `theta[a][p]`: P(panel = p | ancestry = a); rows sum to 1, zero
///   outside `ancToPanels[a]`.
/// - `epsilon[a][p]`: per-state allele mismatch probability in (0, 0.5).
/// - `rho[a]`: exponential rate (cM^-1) of pre-admixture IBD length.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub t: f64,
    pub mu: Vec<f64>,
    pub theta: Vec<Vec<f64>>,
    pub epsilon: Vec<Vec<f64>>,
    pub rho: Vec<f64>,
}

/// Generations-per-Morgan scaling constant used to turn `T` (generations)
/// and `d` (cM) into the admixture-switch probability `r`. Resolved here as
/// `50`, per the Open Question in spec.md §9 (see DESIGN.md).
pub const GENERATIONS_PER_MORGAN: f64 = 50.0;

pub const T_MIN: f64 = 1.0;
pub const T_MAX: f64 = 1000.0;

impl ModelParams {
    pub fn validate(&self, n_panels: usize) -> Result<(), LancError> {
        let a = self.mu.len();
        if a < 2 {
            return Err(LancError::insufficient("fewer than 2 ancestries in model"));
        }
        if self.theta.len() != a || self.epsilon.len() != a || self.rho.len() != a {
            return Err(LancError::inconsistent(
                "model parameter arrays have inconsistent ancestry dimension",
            ));
        }
        if !self.t.is_finite() || self.t <= 0.0 {
            return Err(LancError::malformed("T must be a positive finite number"));
        }
        let mu_sum: f64 = self.mu.iter().sum();
        if (mu_sum - 1.0).abs() > 1e-9 {
            return Err(LancError::malformed(format!(
                "mu does not sum to 1 (got {})",
                mu_sum
            )));
        }
        for (a_idx, &m) in self.mu.iter().enumerate() {
            if !(m > 0.0 && m.is_finite()) {
                return Err(LancError::malformed(format!(
                    "mu[{}] must be > 0, got {}",
                    a_idx, m
                )));
            }
        }
        for (a_idx, row) in self.theta.iter().enumerate() {
            if row.len() != n_panels {
                return Err(LancError::inconsistent(format!(
                    "theta row {} has {} entries, expected {} panels",
                    a_idx,
                    row.len(),
                    n_panels
                )));
            }
            let row_sum: f64 = row.iter().sum();
            if (row_sum - 1.0).abs() > 1e-9 {
                return Err(LancError::malformed(format!(
                    "theta row {} does not sum to 1 (got {})",
                    a_idx, row_sum
                )));
            }
        }
        for (a_idx, row) in self.epsilon.iter().enumerate() {
            if row.len() != n_panels {
                return Err(LancError::inconsistent(format!(
                    "epsilon row {} has {} entries, expected {} panels",
                    a_idx,
                    row.len(),
                    n_panels
                )));
            }
            for &e in row {
                if !(e > 0.0 && e < 0.5) {
                    return Err(LancError::malformed(format!(
                        "epsilon must lie in (0, 0.5), got {} in ancestry {}",
                        e, a_idx
                    )));
                }
            }
        }
        for (a_idx, &r) in self.rho.iter().enumerate() {
            if !(r > 0.0 && r.is_finite()) {
                return Err(LancError::malformed(format!(
                    "rho[{}] must be > 0, got {}",
                    a_idx, r
                )));
            }
        }
        Ok(())
    }

    /// Validates that `theta[a][p] == 0` exactly outside `ancToPanels[a]`,
    /// matching property test (2) in spec §8. Requires the `AncestrySet`
    /// that produced `theta`'s panel eligibility.
    pub fn validate_theta_support(&self, ancestry: &AncestrySet) -> Result<(), LancError> {
        for a in 0..self.mu.len() {
            let eligible = ancestry.panels_for(a);
            for (p, &val) in self.theta[a].iter().enumerate() {
                let is_eligible = eligible.contains(&p);
                if is_eligible && val <= 0.0 {
                    return Err(LancError::malformed(format!(
                        "theta[{}][{}] must be > 0 for an eligible panel",
                        a, p
                    )));
                }
                if !is_eligible && val != 0.0 {
                    return Err(LancError::malformed(format!(
                        "theta[{}][{}] must be exactly 0 outside its ancestry's panels",
                        a, p
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn n_ancestries(&self) -> usize {
        self.mu.len()
    }

    /// Builds default parameters: uniform `mu`, `theta` uniform within the
    /// eligible panels of each ancestry, `epsilon` fixed at `default_eps`,
    /// `rho` fixed at `default_rho`.
    pub fn default_for(
        ancestry: &AncestrySet,
        n_panels: usize,
        t: f64,
        default_eps: f64,
        default_rho: f64,
    ) -> ModelParams {
        let a = ancestry.n_ancestries();
        let mu = vec![1.0 / a as f64; a];
        let mut theta = vec![vec![0.0; n_panels]; a];
        for anc in 0..a {
            let panels = ancestry.panels_for(anc);
            let w = 1.0 / panels.len() as f64;
            for &p in panels {
                theta[anc][p] = w;
            }
        }
        let epsilon = vec![vec![default_eps; n_panels]; a];
        let rho = vec![default_rho; a];
        ModelParams {
            t,
            mu,
            theta,
            epsilon,
            rho,
        }
    }

    pub fn clamp_t(t: f64) -> f64 {
        t.clamp(T_MIN, T_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::samples::Panels;

    fn two_ancestry_set() -> AncestrySet {
        let panels = Panels::new(vec!["P0".into(), "P1".into()], vec![0, 1]).unwrap();
        AncestrySet::identity(&panels).unwrap()
    }

    #[test]
    fn default_params_validate() {
        let anc = two_ancestry_set();
        let params = ModelParams::default_for(&anc, 2, 10.0, 0.01, 5.0);
        params.validate(2).unwrap();
        params.validate_theta_support(&anc).unwrap();
    }

    #[test]
    fn rejects_mu_not_summing_to_one() {
        let anc = two_ancestry_set();
        let mut params = ModelParams::default_for(&anc, 2, 10.0, 0.01, 5.0);
        params.mu = vec![0.6, 0.6];
        assert!(params.validate(2).is_err());
    }

    #[test]
    fn clamp_t_respects_bounds() {
        assert_eq!(ModelParams::clamp_t(0.1), T_MIN);
        assert_eq!(ModelParams::clamp_t(5000.0), T_MAX);
        assert_eq!(ModelParams::clamp_t(42.0), 42.0);
    }
}
