use std::collections::{HashMap, HashSet};

use crate::errors::LancError;
use crate::hmm::posterior::Posterior;
use crate::hmm::tables::WindowTables;
use crate::model::ancestry::AncestrySet;
use crate::model::params::ModelParams;
use crate::model::ref_gt_rec::RefGTRec;
use crate::model::samples::Panels;
use crate::model::window::Window;

/// Static per-reference-haplotype lookups shared by every forward-backward
/// task in a run: which panel a reference haplotype belongs to, which
/// ancestry owns a panel, and each panel's haplotype count.
pub struct ReferenceIndex {
    pub panel_of: Vec<usize>,
    pub ancestry_of_panel: Vec<usize>,
    pub n_panel_haps: Vec<usize>,
}

impl ReferenceIndex {
    pub fn build(panels: &Panels, ancestry: &AncestrySet) -> Result<ReferenceIndex, LancError> {
        let n_panels = panels.n_panels();
        let panel_of: Vec<usize> = (0..panels.n_ref_haplotypes())
            .map(|h| panels.panel_of(h))
            .collect();
        let mut ancestry_of_panel = vec![usize::MAX; n_panels];
        for a in 0..ancestry.n_ancestries() {
            for &p in ancestry.panels_for(a) {
                ancestry_of_panel[p] = a;
            }
        }
        if ancestry_of_panel.iter().any(|&a| a == usize::MAX) {
            return Err(LancError::inconsistent(
                "some reference panel is not claimed by any ancestry",
            ));
        }
        Ok(ReferenceIndex {
            panel_of,
            ancestry_of_panel,
            n_panel_haps: panels.panel_hap_counts(),
        })
    }
}

/// The forward (or pi-reweighted backward) message at one marker: a
/// per-panel aggregate `g[p] = sum of alpha over haplotypes in panel p`,
/// a per-panel `default_alpha[p]` giving the exact alpha value shared by
/// every haplotype in panel `p` that has never diverged from it, and a
/// sparse per-haplotype `delta` recording `alpha(h) - default_alpha[p]`
/// for haplotypes that have.
///
/// `default_alpha[p]` is propagated by its own multiplicative recurrence
/// at every step (see `emission_step`/`transition_step`) rather than
/// recomputed as the panel mean `g[p] / n_panel_haps[p]` after the fact:
/// once any haplotype in a panel diverges, the mean and the shared value
/// for untouched haplotypes are no longer the same number.
#[derive(Debug, Clone)]
struct HapState {
    g: Vec<f64>,
    default_alpha: Vec<f64>,
    delta: HashMap<usize, f64>,
}

impl HapState {
    fn initial(idx: &ReferenceIndex, params: &ModelParams, mu: &[f64]) -> HapState {
        let mut g = vec![0.0; idx.n_panel_haps.len()];
        let mut default_alpha = vec![0.0; idx.n_panel_haps.len()];
        for p in 0..g.len() {
            let a = idx.ancestry_of_panel[p];
            g[p] = mu[a] * params.theta[a][p];
            let n_p = idx.n_panel_haps[p] as f64;
            default_alpha[p] = if n_p > 0.0 { g[p] / n_p } else { 0.0 };
        }
        HapState {
            g,
            default_alpha,
            delta: HashMap::new(),
        }
    }

    fn total(&self) -> f64 {
        self.g.iter().sum()
    }

    fn f_ancestry(&self, ancestry: &AncestrySet) -> Vec<f64> {
        (0..ancestry.n_ancestries())
            .map(|a| ancestry.panels_for(a).iter().map(|&p| self.g[p]).sum())
            .collect()
    }

    fn alpha(&self, idx: &ReferenceIndex, h: usize) -> f64 {
        self.default_alpha[idx.panel_of[h]] + self.delta.get(&h).copied().unwrap_or(0.0)
    }
}

/// Applies the emission factor for `study_allele` at a marker whose
/// reference record is `ref_rec`, producing the post-emission state.
/// Exact for both the dense and sparse `RefGTRec` encodings.
///
/// The sparse path advances `default_alpha[p]` through its own
/// `*e_null` step and only materializes `delta` entries for haplotypes
/// that are "touched": those already carrying a nonzero deviation from a
/// previous marker, or carrying a non-null allele at this one. Any
/// haplotype outside that set keeps an implicit `alpha(h) ==
/// default_alpha[p]`, which is exact because such a haplotype's old
/// alpha was exactly `default_alpha_old[p]` and its allele here is the
/// null allele, so it is multiplied by the same `e_null` factor that
/// advances `default_alpha[p]` itself.
fn emission_step(
    state: &HapState,
    ref_rec: &RefGTRec,
    study_allele: u8,
    idx: &ReferenceIndex,
    emission: &crate::hmm::emission::EmissionTable,
) -> HapState {
    match ref_rec {
        RefGTRec::Dense(d) => {
            let mut new_g = vec![0.0; state.g.len()];
            let mut alphas = vec![0.0; d.alleles.len()];
            for (h, &allele) in d.alleles.iter().enumerate() {
                let p = idx.panel_of[h];
                let a = idx.ancestry_of_panel[p];
                let e = emission.prob(a, p, allele == study_allele);
                let new_alpha = state.alpha(idx, h) * e;
                alphas[h] = new_alpha;
                new_g[p] += new_alpha;
            }
            // Every haplotype in a dense record is computed explicitly above,
            // so any reference point works for `default_alpha`; the panel
            // mean keeps `delta` small in the common case where a later
            // marker is sparse.
            let mut new_default_alpha = vec![0.0; state.g.len()];
            for p in 0..new_g.len() {
                let n_p = idx.n_panel_haps[p] as f64;
                new_default_alpha[p] = if n_p > 0.0 { new_g[p] / n_p } else { 0.0 };
            }
            let mut new_delta = HashMap::new();
            for (h, &new_alpha) in alphas.iter().enumerate() {
                let p = idx.panel_of[h];
                let dev = new_alpha - new_default_alpha[p];
                if dev.abs() > 1e-15 {
                    new_delta.insert(h, dev);
                }
            }
            HapState {
                g: new_g,
                default_alpha: new_default_alpha,
                delta: new_delta,
            }
        }
        RefGTRec::Sparse(s) => {
            let na = s.null_allele;
            let mut new_default_alpha = vec![0.0; state.g.len()];
            for p in 0..state.g.len() {
                let a = idx.ancestry_of_panel[p];
                let e_null = emission.prob(a, p, na == study_allele);
                new_default_alpha[p] = state.default_alpha[p] * e_null;
            }

            let mut touched: HashSet<usize> = state.delta.keys().copied().collect();
            for (_, haps) in &s.buckets {
                touched.extend(haps.iter().copied());
            }

            let mut new_delta = HashMap::new();
            for &h in &touched {
                let p = idx.panel_of[h];
                let a = idx.ancestry_of_panel[p];
                let allele = ref_rec.get(h);
                let alpha_old = state.alpha(idx, h);
                let e_actual = emission.prob(a, p, allele == study_allele);
                let alpha_new = alpha_old * e_actual;
                let dev = alpha_new - new_default_alpha[p];
                if dev.abs() > 1e-15 {
                    new_delta.insert(h, dev);
                }
            }

            let mut new_g = vec![0.0; state.g.len()];
            for p in 0..new_g.len() {
                new_g[p] = new_default_alpha[p] * idx.n_panel_haps[p] as f64;
            }
            for (&h, &dev) in &new_delta {
                new_g[idx.panel_of[h]] += dev;
            }

            HapState {
                g: new_g,
                default_alpha: new_default_alpha,
                delta: new_delta,
            }
        }
    }
}

/// Advances a post-emission state across one inter-marker gap via the
/// closed-form per-panel recursion derived from the transition kernel in
/// `hmm::transition`.
fn transition_step(
    state: &HapState,
    idx: &ReferenceIndex,
    ancestry: &AncestrySet,
    params: &ModelParams,
    gap: &crate::hmm::transition::GapParams,
) -> HapState {
    let f = state.f_ancestry(ancestry);
    let z: f64 = f.iter().sum();
    let mut new_g = vec![0.0; state.g.len()];
    let mut new_default_alpha = vec![0.0; state.g.len()];
    for p in 0..state.g.len() {
        let a = idx.ancestry_of_panel[p];
        new_g[p] = (1.0 - gap.r) * gap.q[a] * state.g[p]
            + (1.0 - gap.r) * (1.0 - gap.q[a]) * f[a] * params.theta[a][p]
            + gap.r * params.mu[a] * params.theta[a][p] * z;
        // Shared term every haplotype in panel p receives regardless of
        // whether it stays on the same reference haplotype (the `q[a]`
        // branch, which alone depends on the haplotype's own prior alpha).
        let n_p = idx.n_panel_haps[p] as f64;
        let shared = if n_p > 0.0 {
            ((1.0 - gap.r) * (1.0 - gap.q[a]) * f[a] * params.theta[a][p]
                + gap.r * params.mu[a] * params.theta[a][p] * z)
                / n_p
        } else {
            0.0
        };
        new_default_alpha[p] = (1.0 - gap.r) * gap.q[a] * state.default_alpha[p] + shared;
    }
    let mut new_delta = HashMap::with_capacity(state.delta.len());
    for (&h, &d) in &state.delta {
        let a = idx.ancestry_of_panel[idx.panel_of[h]];
        let nd = (1.0 - gap.r) * gap.q[a] * d;
        if nd.abs() > 1e-15 {
            new_delta.insert(h, nd);
        }
    }
    HapState {
        g: new_g,
        default_alpha: new_default_alpha,
        delta: new_delta,
    }
}

fn rescale(state: HapState) -> (HapState, f64) {
    let total = state.total();
    if !(total.is_finite() && total > 0.0) {
        return (state, f64::NAN);
    }
    let g = state.g.iter().map(|&x| x / total).collect();
    let default_alpha = state.default_alpha.iter().map(|&x| x / total).collect();
    let delta = state.delta.iter().map(|(&h, &d)| (h, d / total)).collect();
    (
        HapState {
            g,
            default_alpha,
            delta,
        },
        total.ln(),
    )
}

/// Per-study-haplotype forward-backward result: the ancestry posterior at
/// every marker in the window's core region, plus the total log
/// likelihood `log P(x)` accumulated over the analysis region.
pub struct FbResult {
    pub posteriors: Vec<Posterior>,
    pub log_likelihood: f64,
}

/// Runs forward-backward for a single study haplotype over one window.
///
/// `ref_recs` and `study_alleles` must cover exactly `window.analysis`
/// (i.e. have length `window.analysis_len()`), in marker order.
/// `mu_override` supplies a per-sample ancestry prior (spec §4.5 /
/// `gt-ancestries`) in place of `params.mu` for this haplotype only.
pub fn run_haplotype(
    window: &Window,
    tables: &WindowTables,
    ref_recs: &[RefGTRec],
    study_alleles: &[u8],
    idx: &ReferenceIndex,
    ancestry: &AncestrySet,
    params: &ModelParams,
    mu_override: Option<&[f64]>,
) -> Result<FbResult, LancError> {
    let n = window.analysis_len();
    if ref_recs.len() != n || study_alleles.len() != n {
        return Err(LancError::inconsistent(
            "forward-backward input length does not match window analysis range",
        ));
    }
    let mu = mu_override.unwrap_or(&params.mu);

    // Forward pass: alpha_post_emission[i] is the state just after
    // emission at marker i, before advancing to i+1. Stored for every
    // marker since the backward pass needs to combine with it.
    let mut forward_post_emission: Vec<HapState> = Vec::with_capacity(n);
    let mut log_likelihood = 0.0f64;
    let mut cur = HapState::initial(idx, params, mu);
    for i in 0..n {
        let emitted = emission_step(&cur, &ref_recs[i], study_alleles[i], idx, &tables.emission);
        let (rescaled, log_inc) = rescale(emitted);
        if !log_inc.is_finite() {
            return Err(LancError::numeric(format!(
                "non-finite forward mass at window-local marker {}",
                i
            )));
        }
        log_likelihood += log_inc;
        forward_post_emission.push(rescaled.clone());
        if i + 1 < n {
            cur = transition_step(&rescaled, idx, ancestry, params, &tables.gaps[i]);
        }
    }

    // Backward pass over beta_tilde = pi * beta, using the same
    // emission/transition machinery (see DESIGN.md for the reversibility
    // argument that makes this valid).
    let mut backward_post_emission: Vec<HapState> = vec![
        HapState {
            g: vec![0.0; idx.n_panel_haps.len()],
            default_alpha: vec![0.0; idx.n_panel_haps.len()],
            delta: HashMap::new()
        };
        n
    ];
    let mut cur_beta = HapState::initial(idx, params, mu);
    let last = n - 1;
    let emitted_last = emission_step(
        &cur_beta,
        &ref_recs[last],
        study_alleles[last],
        idx,
        &tables.emission,
    );
    let (rescaled_last, _) = rescale(emitted_last);
    backward_post_emission[last] = rescaled_last.clone();
    cur_beta = rescaled_last;
    for i in (0..last).rev() {
        let advanced = transition_step(&cur_beta, idx, ancestry, params, &tables.gaps[i]);
        let emitted = emission_step(&advanced, &ref_recs[i], study_alleles[i], idx, &tables.emission);
        let (rescaled, _) = rescale(emitted);
        backward_post_emission[i] = rescaled.clone();
        cur_beta = rescaled;
    }

    let lead_in = window.lead_in();
    let mut posteriors = Vec::with_capacity(window.core_len());
    for local_i in lead_in..lead_in + window.core_len() {
        let alpha_state = &forward_post_emission[local_i];
        let beta_state = &backward_post_emission[local_i];
        posteriors.push(combine_posterior(alpha_state, beta_state, idx, ancestry, params)?);
    }

    Ok(FbResult {
        posteriors,
        log_likelihood,
    })
}

fn combine_posterior(
    alpha: &HapState,
    beta_tilde: &HapState,
    idx: &ReferenceIndex,
    ancestry: &AncestrySet,
    params: &ModelParams,
) -> Result<Posterior, LancError> {
    let a_count = ancestry.n_ancestries();
    let mut gamma = vec![0.0f64; a_count];
    for p in 0..idx.n_panel_haps.len() {
        let a = idx.ancestry_of_panel[p];
        let n_p = idx.n_panel_haps[p] as f64;
        if n_p == 0.0 {
            continue;
        }
        let pi_p = params.mu[a] * params.theta[a][p] / n_p;
        if pi_p <= 0.0 {
            continue;
        }
        // Every haplotype in panel p that never diverged in either pass
        // contributes exactly `default_gamma`; touched haplotypes replace
        // that default term with their true value below.
        let alpha_def = alpha.default_alpha[p];
        let beta_def = beta_tilde.default_alpha[p];
        let default_gamma = alpha_def * beta_def / pi_p;
        gamma[a] += default_gamma * n_p;

        let mut touched: HashSet<usize> = alpha.delta.keys().copied().collect();
        touched.extend(beta_tilde.delta.keys().copied());
        for h in touched {
            if idx.panel_of[h] != p {
                continue;
            }
            let da = alpha.delta.get(&h).copied().unwrap_or(0.0);
            let db = beta_tilde.delta.get(&h).copied().unwrap_or(0.0);
            let true_gamma = (alpha_def + da) * (beta_def + db) / pi_p;
            gamma[a] += true_gamma - default_gamma;
        }
    }
    let total: f64 = gamma.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(LancError::numeric(
            "non-finite or zero total posterior mass at a marker",
        ));
    }
    for g in gamma.iter_mut() {
        *g = (*g / total).max(0.0);
    }
    let renorm: f64 = gamma.iter().sum();
    for g in gamma.iter_mut() {
        *g /= renorm;
    }
    Ok(Posterior::new(gamma))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::hmm::tables::WindowTables;
    use crate::model::genetic_map::MarkerMap;
    use crate::model::ref_gt_rec::{DenseRefGTRec, RefGTRec};
    use crate::model::samples::Panels;
    use crate::model::window::Window;

    fn identity_setup(n_markers: usize) -> (Panels, AncestrySet, ModelParams, ReferenceIndex) {
        // panel 0: haplotypes 0..19 all-0 allele; panel 1: haplotypes 20..39 all-1 allele.
        let mut hap_to_panel = vec![0usize; 20];
        hap_to_panel.extend(vec![1usize; 20]);
        let panels = Panels::new(vec!["P0".into(), "P1".into()], hap_to_panel).unwrap();
        let ancestry = AncestrySet::identity(&panels).unwrap();
        let params = ModelParams::default_for(&ancestry, 2, 10.0, 0.001, 5.0);
        let idx = ReferenceIndex::build(&panels, &ancestry).unwrap();
        let _ = n_markers;
        (panels, ancestry, params, idx)
    }

    #[test]
    fn identity_reference_recovers_ancestry_of_matching_haplotype() {
        let n_markers = 20;
        let (_, ancestry, params, idx) = identity_setup(n_markers);
        let map = MarkerMap::new((0..n_markers).map(|i| i as f64 * 0.1).collect());
        let window = Window {
            chrom: 0,
            core: 0..n_markers,
            analysis: 0..n_markers,
        };
        let tables = WindowTables::build(&params, &map, &window);

        let mut ref_recs = Vec::new();
        for _ in 0..n_markers {
            let mut alleles = vec![0u8; 20];
            alleles.extend(vec![1u8; 20]);
            ref_recs.push(RefGTRec::from_dense_alleles(alleles));
        }
        // study haplotype matches panel 0 (all-0) at every marker.
        let study_alleles = vec![0u8; n_markers];

        let result = run_haplotype(
            &window,
            &tables,
            &ref_recs,
            &study_alleles,
            &idx,
            &ancestry,
            &params,
            None,
        )
        .unwrap();

        assert_eq!(result.posteriors.len(), n_markers);
        for post in &result.posteriors {
            assert!(post.probs[0] > post.probs[1]);
            let sum: f64 = post.probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn posteriors_sum_to_one_with_per_sample_prior() {
        let n_markers = 10;
        let (_, ancestry, params, idx) = identity_setup(n_markers);
        let map = MarkerMap::new((0..n_markers).map(|i| i as f64 * 0.1).collect());
        let window = Window {
            chrom: 0,
            core: 0..n_markers,
            analysis: 0..n_markers,
        };
        let tables = WindowTables::build(&params, &map, &window);
        let mut ref_recs = Vec::new();
        for _ in 0..n_markers {
            let mut alleles = vec![0u8; 20];
            alleles.extend(vec![1u8; 20]);
            ref_recs.push(RefGTRec::from_dense_alleles(alleles));
        }
        let study_alleles = vec![0u8; n_markers];
        let prior = vec![0.99, 0.01];
        let result = run_haplotype(
            &window,
            &tables,
            &ref_recs,
            &study_alleles,
            &idx,
            &ancestry,
            &params,
            Some(&prior),
        )
        .unwrap();
        for post in &result.posteriors {
            let sum: f64 = post.probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(post.probs[0] > 0.9);
        }
    }

    /// Panel 0 carries a genuine allele mix (18 haplotypes sharing the null
    /// allele, 2 carrying a real non-null allele) instead of the degenerate
    /// all-or-nothing bucket split the other tests above use. The sparse
    /// `RefGTRec` touched-set optimization must still reproduce the same
    /// posteriors as the fully explicit dense encoding of the identical
    /// data: any haplotype wrongly assumed to hold zero deviation from its
    /// panel's default would pull panel 0's aggregate `g` (and thus every
    /// downstream posterior) away from the dense result.
    #[test]
    fn sparse_and_dense_encodings_agree_on_a_mixed_panel() {
        let n_markers = 12;
        let mut hap_to_panel = vec![0usize; 20];
        hap_to_panel.extend(vec![1usize; 20]);
        let panels = Panels::new(vec!["P0".into(), "P1".into()], hap_to_panel).unwrap();
        let ancestry = AncestrySet::identity(&panels).unwrap();
        let params = ModelParams::default_for(&ancestry, 2, 10.0, 0.02, 5.0);
        let idx = ReferenceIndex::build(&panels, &ancestry).unwrap();
        let map = MarkerMap::new((0..n_markers).map(|i| i as f64 * 0.05).collect());
        let window = Window {
            chrom: 0,
            core: 0..n_markers,
            analysis: 0..n_markers,
        };
        let tables = WindowTables::build(&params, &map, &window);

        let mut dense_recs = Vec::new();
        let mut sparse_recs = Vec::new();
        for m in 0..n_markers {
            let mut alleles = vec![0u8; 40];
            alleles[0] = 1;
            alleles[1] = 1;
            if m % 3 == 0 {
                // a third haplotype joins the bucket only at some markers,
                // so the touched set itself changes across the window.
                alleles[2] = 1;
            }
            dense_recs.push(RefGTRec::Dense(DenseRefGTRec {
                alleles: alleles.clone(),
            }));
            sparse_recs.push(RefGTRec::from_dense_alleles(alleles));
        }
        let study_alleles: Vec<u8> = (0..n_markers).map(|m| if m % 2 == 0 { 0 } else { 1 }).collect();

        let dense_result = run_haplotype(
            &window,
            &tables,
            &dense_recs,
            &study_alleles,
            &idx,
            &ancestry,
            &params,
            None,
        )
        .unwrap();
        let sparse_result = run_haplotype(
            &window,
            &tables,
            &sparse_recs,
            &study_alleles,
            &idx,
            &ancestry,
            &params,
            None,
        )
        .unwrap();

        assert_eq!(dense_result.posteriors.len(), sparse_result.posteriors.len());
        for (d, s) in dense_result.posteriors.iter().zip(sparse_result.posteriors.iter()) {
            for (dp, sp) in d.probs.iter().zip(s.probs.iter()) {
                assert_relative_eq!(dp, sp, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(dense_result.log_likelihood, sparse_result.log_likelihood, epsilon = 1e-9);
    }
}
