use crate::utils::rng::{argmax_with_ties, TieBreaker};

/// A length-`A` nonnegative vector summing to 1: the ancestry posterior at
/// one marker for one study haplotype.
#[derive(Debug, Clone)]
pub struct Posterior {
    pub probs: Vec<f64>,
}

impl Posterior {
    pub fn new(probs: Vec<f64>) -> Posterior {
        Posterior { probs }
    }

    pub fn n_ancestries(&self) -> usize {
        self.probs.len()
    }

    /// The ancestry with highest posterior mass, breaking ties via `tb`.
    pub fn argmax(&self, tb: &mut TieBreaker) -> usize {
        argmax_with_ties(&self.probs, tb)
    }

    /// Rounds each entry to three significant digits for `ANP1`/`ANP2`
    /// emission, per the output format in spec.md §6.
    pub fn rounded_strings(&self) -> Vec<String> {
        self.probs
            .iter()
            .map(|&p| format!("{:.3}", round_sig(p, 3)))
            .collect()
    }
}

fn round_sig(x: f64, sig: i32) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let magnitude = x.abs().log10().floor() as i32;
    let factor = 10f64.powi(sig - 1 - magnitude);
    (x * factor).round() / factor
}
