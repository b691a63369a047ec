use crate::model::params::{ModelParams, GENERATIONS_PER_MORGAN};

/// Per-marker-gap scalars derived from `ModelParams` and the forward cM
/// distance `d` to the next marker: the admixture-switch probability `r`
/// and, per ancestry, the within-ancestry no-switch probability `q[a]`.
///
/// `r = 1 - exp(-(T/GENERATIONS_PER_MORGAN) * d)`, `q[a] = exp(-rho[a] * d)`.
#[derive(Debug, Clone)]
pub struct GapParams {
    pub r: f64,
    pub q: Vec<f64>,
}

impl GapParams {
    pub fn new(params: &ModelParams, d: f64) -> GapParams {
        let r = 1.0 - (-(params.t / GENERATIONS_PER_MORGAN) * d).exp();
        let q = params.rho.iter().map(|&rho_a| (-rho_a * d).exp()).collect();
        GapParams { r, q }
    }
}

/// Reference implementation of the transition kernel over raw `(h, a)`
/// pairs, used to pin down row-stochasticity and detailed balance in
/// tests against small synthetic state spaces. The forward-backward
/// engine itself never materializes this dense form; it uses the
/// closed-form aggregate update in `forward_backward`.
///
/// With probability `r` the chain draws fresh from the stationary
/// distribution over every `(h', a')`, independent of the current state.
/// With probability `1 - r` it stays in the current ancestry `a`: with
/// probability `q[a]` it stays on the same haplotype, otherwise it
/// redraws a haplotype within `a` according to `theta[a][panel(h')] /
/// n_panel_haps[panel(h')]`.
///
/// This factorization is row-stochastic by construction (the stationary
/// draw and the within-ancestry redraw each sum to 1 over their support)
/// and satisfies detailed balance with `pi(h, a) = mu[a] * theta[a][panel(h)]
/// / n_panel_haps[panel(h)]`, since both the cross-ancestry and
/// within-ancestry terms are symmetric products of `pi(h, a)` and
/// `pi(h', a')`.
pub struct TransitionModel<'a> {
    pub params: &'a ModelParams,
    pub panel_of: &'a [usize],
    pub n_panel_haps: &'a [usize],
    pub gap: GapParams,
}

impl<'a> TransitionModel<'a> {
    pub fn new(
        params: &'a ModelParams,
        panel_of: &'a [usize],
        n_panel_haps: &'a [usize],
        d: f64,
    ) -> Self {
        TransitionModel {
            params,
            panel_of,
            n_panel_haps,
            gap: GapParams::new(params, d),
        }
    }

    fn stationary_draw(&self, a: usize, h: usize) -> f64 {
        let p = self.panel_of[h];
        self.params.theta[a][p] / self.n_panel_haps[p] as f64
    }

    /// `P((h, a) -> (h2, a2))` under the factorization described above.
    pub fn prob(&self, h: usize, a: usize, h2: usize, a2: usize) -> f64 {
        let cross = self.gap.r * self.params.mu[a2] * self.stationary_draw(a2, h2);
        if a2 != a {
            return cross;
        }
        let same_hap = if h2 == h { self.gap.q[a] } else { 0.0 };
        let within = (1.0 - self.gap.r) * (same_hap + (1.0 - self.gap.q[a]) * self.stationary_draw(a, h2));
        within + cross
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ancestry::AncestrySet;
    use crate::model::samples::Panels;

    fn two_panel_model() -> (ModelParams, Panels, AncestrySet) {
        let panels = Panels::new(
            vec!["P0".into(), "P1".into()],
            vec![0, 0, 0, 1, 1, 1],
        )
        .unwrap();
        let ancestry = AncestrySet::identity(&panels).unwrap();
        let params = ModelParams::default_for(&ancestry, 2, 10.0, 0.01, 5.0);
        (params, panels, ancestry)
    }

    fn all_states(panels: &Panels) -> Vec<(usize, usize)> {
        let mut states = Vec::new();
        for h in 0..panels.n_ref_haplotypes() {
            let p = panels.panel_of(h);
            // identity ancestry map: ancestry index == panel index
            states.push((h, p));
        }
        states
    }

    #[test]
    fn rows_sum_to_one_across_distances() {
        let (params, panels, _ancestry) = two_panel_model();
        let panel_of: Vec<usize> = (0..panels.n_ref_haplotypes()).map(|h| panels.panel_of(h)).collect();
        let n_panel_haps = panels.panel_hap_counts();
        let states = all_states(&panels);
        for &d in &[0.0, 0.01, 0.1, 1.0, 10.0] {
            let model = TransitionModel::new(&params, &panel_of, &n_panel_haps, d);
            for &(h, a) in &states {
                let row_sum: f64 = states.iter().map(|&(h2, a2)| model.prob(h, a, h2, a2)).sum();
                assert!(
                    (row_sum - 1.0).abs() < 1e-9,
                    "row sum {} at d={} not 1",
                    row_sum,
                    d
                );
            }
        }
    }

    #[test]
    fn detailed_balance_holds() {
        let (params, panels, _ancestry) = two_panel_model();
        let panel_of: Vec<usize> = (0..panels.n_ref_haplotypes()).map(|h| panels.panel_of(h)).collect();
        let n_panel_haps = panels.panel_hap_counts();
        let model = TransitionModel::new(&params, &panel_of, &n_panel_haps, 0.5);
        let pi = |h: usize, a: usize| -> f64 {
            params.mu[a] * params.theta[a][panels.panel_of(h)] / n_panel_haps[panels.panel_of(h)] as f64
        };
        let states = all_states(&panels);
        for &(h, a) in &states {
            for &(h2, a2) in &states {
                let lhs = pi(h, a) * model.prob(h, a, h2, a2);
                let rhs = pi(h2, a2) * model.prob(h2, a2, h, a);
                assert!((lhs - rhs).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn large_t_approaches_pure_li_stephens() {
        let (mut params, panels, _ancestry) = two_panel_model();
        params.t = 1000.0;
        let panel_of: Vec<usize> = (0..panels.n_ref_haplotypes()).map(|h| panels.panel_of(h)).collect();
        let n_panel_haps = panels.panel_hap_counts();
        let model = TransitionModel::new(&params, &panel_of, &n_panel_haps, 0.01);
        // with r small, probability of switching ancestry should be tiny
        assert!(model.gap.r < 0.05);
    }
}
