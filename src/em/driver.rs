use crate::em::accumulator::EmAccumulator;
use crate::errors::LancError;
use crate::model::params::ModelParams;

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
pub const CONVERGENCE_THRESHOLD: f64 = 1e-3;
pub const DIRICHLET_PSEUDOCOUNT: f64 = 1.0;

/// Outcome of one completed EM run: the final parameters, the number of
/// iterations actually performed, and whether it stopped because it
/// converged (as opposed to hitting the iteration cap).
#[derive(Debug, Clone)]
pub struct EmOutcome {
    pub params: ModelParams,
    pub iterations: usize,
    pub converged: bool,
    pub log_likelihood_trace: Vec<f64>,
}

/// Sequential EM state machine estimating `T` and `mu`; `theta`, `epsilon`,
/// and `rho` are held fixed throughout. Parallelism lives entirely inside
/// the caller-supplied `run_iteration` closure (one forward-backward pass
/// per sample, reduced into a single `EmAccumulator`).
pub struct EmDriver {
    pub max_iterations: usize,
}

impl Default for EmDriver {
    fn default() -> Self {
        EmDriver {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl EmDriver {
    pub fn run<F>(&self, initial: ModelParams, mut run_iteration: F) -> Result<EmOutcome, LancError>
    where
        F: FnMut(&ModelParams) -> Result<EmAccumulator, LancError>,
    {
        let mut params = initial;
        let mut prev_log_likelihood = f64::NEG_INFINITY;
        let mut trace = Vec::new();
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.max_iterations.max(1) {
            iterations = iter + 1;
            let acc = run_iteration(&params)?;
            trace.push(acc.log_likelihood);

            let a_count = params.mu.len();
            let denom: f64 = acc.n_a.iter().map(|&n| n + DIRICHLET_PSEUDOCOUNT).sum();
            let new_mu: Vec<f64> = acc
                .n_a
                .iter()
                .map(|&n| (n + DIRICHLET_PSEUDOCOUNT) / denom)
                .collect();

            let new_t = if acc.expected_opportunities > 0.0 {
                ModelParams::clamp_t(acc.expected_switches / acc.expected_opportunities)
            } else {
                params.t
            };

            let mu_delta = new_mu
                .iter()
                .zip(params.mu.iter())
                .map(|(&a, &b)| (a - b).abs())
                .fold(0.0, f64::max);
            let t_delta = (new_t - params.t).abs() / params.t.max(1e-9);
            let delta = mu_delta.max(t_delta);

            let ll_improved = acc.log_likelihood - prev_log_likelihood > CONVERGENCE_THRESHOLD;

            params.mu = new_mu;
            params.t = new_t;
            debug_assert_eq!(params.mu.len(), a_count);

            if iter > 0 && (delta < CONVERGENCE_THRESHOLD || !ll_improved) {
                converged = true;
                prev_log_likelihood = acc.log_likelihood;
                break;
            }
            prev_log_likelihood = acc.log_likelihood;
        }

        Ok(EmOutcome {
            params,
            iterations,
            converged,
            log_likelihood_trace: trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ancestry::AncestrySet;
    use crate::model::samples::Panels;

    fn base_params() -> ModelParams {
        let panels = Panels::new(vec!["P0".into(), "P1".into()], vec![0, 1]).unwrap();
        let anc = AncestrySet::identity(&panels).unwrap();
        ModelParams::default_for(&anc, 2, 10.0, 0.01, 5.0)
    }

    #[test]
    fn converges_when_statistics_stop_changing() {
        let params = base_params();
        let driver = EmDriver::default();
        let mut call_count = 0;
        let outcome = driver
            .run(params, |_p| {
                call_count += 1;
                let mut acc = EmAccumulator::new(2);
                acc.n_a = vec![70.0, 30.0];
                acc.expected_switches = 5.0;
                acc.expected_opportunities = 0.5;
                acc.log_likelihood = -100.0;
                Ok(acc)
            })
            .unwrap();
        assert!(outcome.converged);
        assert!(call_count >= 2);
        assert!((outcome.params.mu[0] - 0.7).abs() < 0.05);
    }

    #[test]
    fn runs_at_least_one_iteration() {
        let params = base_params();
        let driver = EmDriver {
            max_iterations: 1,
        };
        let outcome = driver
            .run(params, |_p| {
                let mut acc = EmAccumulator::new(2);
                acc.n_a = vec![50.0, 50.0];
                acc.expected_switches = 1.0;
                acc.expected_opportunities = 1.0;
                acc.log_likelihood = -50.0;
                Ok(acc)
            })
            .unwrap();
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn stops_at_max_iterations_when_never_converging() {
        let params = base_params();
        let driver = EmDriver { max_iterations: 3 };
        let mut tick = 0.0;
        let outcome = driver
            .run(params, |_p| {
                tick += 1.0;
                let mut acc = EmAccumulator::new(2);
                acc.n_a = vec![50.0 + tick, 50.0 - tick];
                acc.expected_switches = tick;
                acc.expected_opportunities = 1.0;
                acc.log_likelihood = -1000.0 + tick * 10.0;
                Ok(acc)
            })
            .unwrap();
        assert_eq!(outcome.iterations, 3);
    }
}
