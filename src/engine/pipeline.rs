use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::config::RunConfig;
use crate::em::accumulator::EmAccumulator;
use crate::em::driver::EmDriver;
use crate::engine::global_ancestry::GlobalAncestryAccumulator;
use crate::errors::LancError;
use crate::hmm::forward_backward::{run_haplotype, FbResult, ReferenceIndex};
use crate::hmm::tables::WindowTables;
use crate::io::{map_reader, marker_filter, model_file, output_writer, sample_filter, vcf_reader};
use crate::logging::RunLog;
use crate::model::ancestry::AncestrySet;
use crate::model::genetic_map::MarkerMap;
use crate::model::params::ModelParams;
use crate::model::ref_gt_rec::RefGTRec;
use crate::model::window::{plan_windows, Window};
use crate::name_table::NameTable;
use crate::utils::math_utils::RunningAverage;
use crate::utils::rng::TieBreaker;

/// Default core-window size (in markers) before overlap is added, chosen
/// so the dense forward trellis for one window comfortably fits alongside
/// per-thread scratch at the default thread count.
const DEFAULT_TARGET_CORE_MARKERS: usize = 2000;

/// Ties together loading, filtering, EM, the full inference pass, and
/// output writing for one run. Mirrors the shape of the teacher's
/// `prepare_pileup`: parse inputs into owned structs up front, run the
/// engine, report success/failure through one `Result`.
pub fn run(config: &RunConfig, run_log: &mut RunLog) -> Result<(), LancError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.nthreads)
        .build_global()
        .ok();
    run_log.record(format!("threads={}", config.nthreads));
    run_log.record(format!("seed={}", config.seed));

    let mut names = NameTable::new();

    let panel_of_sample = vcf_reader::load_ref_panel_map(&config.ref_panel_path)?;
    let reference = vcf_reader::load_reference_vcf(&config.ref_path, &panel_of_sample, &mut names)?;
    let mut study = vcf_reader::load_study_vcf(&config.gt_path, &mut names)?;

    let map_tables = map_reader::load_genetic_map_tables(&config.map_path, &mut names)?;
    let marker_map = map_reader::project_onto_markers(&reference.markers, &map_tables)?;

    let ancestry = AncestrySet::identity(&reference.panels)?;

    let exclude_ids = match &config.exclude_markers_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| LancError::Io(format!("failed to read excludemarkers file {}: {}", path, e)))?;
            marker_filter::parse_exclude_list(&text)
        }
        None => Default::default(),
    };
    let keep_markers = marker_filter::filter_markers(
        &reference.markers,
        &reference.ref_recs,
        &exclude_ids,
        config.min_maf,
        config.min_mac,
        config.array,
    )?;
    run_log.record(format!(
        "markers kept {} of {}",
        keep_markers.iter().filter(|&&k| k).count(),
        keep_markers.len()
    ));

    let ref_recs: Vec<_> = reference
        .ref_recs
        .iter()
        .zip(keep_markers.iter())
        .filter(|(_, &k)| k)
        .map(|(r, _)| r.clone())
        .collect();
    let mut markers = reference.markers.clone();
    markers.retain_indices(&keep_markers);
    let cm: Vec<f64> = (0..keep_markers.len())
        .filter(|&i| keep_markers[i])
        .map(|i| marker_map.cm_at(i))
        .collect();
    let marker_map = MarkerMap::new(cm);
    for hap in study.haplotype_alleles.iter_mut() {
        *hap = hap
            .iter()
            .zip(keep_markers.iter())
            .filter(|(_, &k)| k)
            .map(|(&a, _)| a)
            .collect();
    }
    output_writer::require_nonempty_markers(&markers)?;

    let keep_samples = match &config.gt_samples_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| LancError::Io(format!("failed to read gt-samples file {}: {}", path, e)))?;
            sample_filter::resolve_sample_subset(&study.samples, &text)?
        }
        None => (0..study.samples.len()).collect(),
    };
    let samples = study.samples.subset(&keep_samples);
    run_log.record(format!("study samples kept {} of {}", samples.len(), study.samples.len()));

    let hap_offsets: Vec<usize> = {
        let mut offsets = Vec::with_capacity(study.samples.len() + 1);
        let mut cursor = 0;
        for i in 0..study.samples.len() {
            offsets.push(cursor);
            cursor += study.samples.n_haplotypes(i);
        }
        offsets.push(cursor);
        offsets
    };
    let mut haplotype_alleles: Vec<Vec<u8>> = Vec::new();
    for &s in &keep_samples {
        for h in hap_offsets[s]..hap_offsets[s + 1] {
            haplotype_alleles.push(study.haplotype_alleles[h].clone());
        }
    }

    let priors_by_sample: HashMap<String, Vec<f64>> = match &config.gt_ancestries_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| LancError::Io(format!("failed to read gt-ancestries file {}: {}", path, e)))?;
            sample_filter::parse_sample_priors(&text, &ancestry)?
        }
        None => HashMap::new(),
    };

    let idx = ReferenceIndex::build(&reference.panels, &ancestry)?;

    let initial_t = config.gen.map(|g| g as f64).unwrap_or(10.0);
    let mut params = if let Some(model_path) = &config.model_path {
        let text = std::fs::read_to_string(model_path)
            .map_err(|e| LancError::Io(format!("failed to read model file {}: {}", model_path, e)))?;
        let (_, _, loaded) = model_file::read_model_file(&text)?;
        loaded
    } else {
        ModelParams::default_for(&ancestry, reference.panels.n_panels(), initial_t, 0.001, 5.0)
    };
    params.validate(reference.panels.n_panels())?;
    params.validate_theta_support(&ancestry)?;

    let chrom_ranges = markers.chromosome_ranges();
    let windows = plan_windows(&chrom_ranges, &marker_map, DEFAULT_TARGET_CORE_MARKERS);
    if windows.is_empty() {
        return Err(LancError::insufficient("no windows to process after marker filtering"));
    }

    if config.em && config.model_path.is_none() {
        let em_window = windows[0].clone();
        let driver = EmDriver::default();
        let outcome = driver.run(params.clone(), |p| {
            run_em_iteration(p, &em_window, &marker_map, &ref_recs, &idx, &ancestry, &haplotype_alleles)
        })?;
        let mut ll_avg = RunningAverage::new();
        for &ll in &outcome.log_likelihood_trace {
            ll_avg.add(ll);
        }
        run_log.record(format!(
            "EM finished after {} iterations (converged={}), T={:.3}, mean log-likelihood={:.3} (var={:.3})",
            outcome.iterations, outcome.converged, outcome.params.t, ll_avg.mean(), ll_avg.var()
        ));
        params = outcome.params;
    } else {
        run_log.record("EM skipped (em=false or fixed model supplied)".to_string());
    }

    let mut writer = output_writer::AncVcfWriter::create(
        &format!("{}.anc.vcf.gz", config.out_prefix),
        &ancestry,
        &samples,
        config.probs,
    )?;

    let mut global_accs: Vec<GlobalAncestryAccumulator> = (0..samples.len())
        .map(|_| GlobalAncestryAccumulator::new(ancestry.n_ancestries()))
        .collect();

    let progress = if config.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(windows.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{bar:40} window {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for window in &windows {
        let tables = WindowTables::build(&params, &marker_map, window);
        let n_haps = haplotype_alleles.len();
        let results: Vec<Result<FbResult, LancError>> = (0..n_haps)
            .into_par_iter()
            .map(|h| {
                let sample_idx = h / 2;
                let sample_id = samples.id(sample_idx);
                let mu_override = priors_by_sample.get(sample_id).map(|v| v.as_slice());
                let slice = &haplotype_alleles[h][window.analysis.clone()];
                run_haplotype(
                    window,
                    &tables,
                    &ref_recs[window.analysis.clone()],
                    slice,
                    &idx,
                    &ancestry,
                    &params,
                    mu_override,
                )
            })
            .collect();

        let mut per_hap_posteriors = Vec::with_capacity(n_haps);
        for r in results {
            per_hap_posteriors.push(r?);
        }

        for local_i in 0..window.core_len() {
            let global_marker = window.core.start + local_i;
            let marker = markers.get(global_marker);
            let chrom_name = names.chrom_name(marker.chrom).to_string();
            let mut calls = Vec::with_capacity(samples.len());
            let mut posteriors_pairs = Vec::with_capacity(samples.len());
            for s in 0..samples.len() {
                let h1 = 2 * s;
                let h2 = 2 * s + 1;
                let p1 = &per_hap_posteriors[h1].posteriors[local_i];
                let p2 = &per_hap_posteriors[h2].posteriors[local_i];
                let mut tb1 = TieBreaker::for_haplotype(config.seed, h1 as u64);
                let mut tb2 = TieBreaker::for_haplotype(config.seed, h2 as u64);
                calls.push((p1.argmax(&mut tb1), p2.argmax(&mut tb2)));
                if config.probs {
                    posteriors_pairs.push((p1.clone(), p2.clone()));
                }
            }
            let posteriors_ref = if config.probs { Some(posteriors_pairs.as_slice()) } else { None };
            writer.write_marker(&chrom_name, marker.pos, &marker.alleles, &calls, posteriors_ref)?;
        }

        for s in 0..samples.len() {
            let h1 = 2 * s;
            let h2 = 2 * s + 1;
            global_accs[s].add_haplotype(&per_hap_posteriors[h1].posteriors);
            global_accs[s].add_haplotype(&per_hap_posteriors[h2].posteriors);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    writer.finish()?;

    let global_props: Vec<Vec<f64>> = global_accs.iter().map(|a| a.finalize()).collect();
    output_writer::write_global_ancestry(
        &format!("{}.global.anc.gz", config.out_prefix),
        &ancestry,
        &samples,
        &global_props,
    )?;

    let ancestry_names: Vec<String> = (0..ancestry.n_ancestries()).map(|a| ancestry.label(a).to_string()).collect();
    let panel_names: Vec<String> = (0..reference.panels.n_panels()).map(|p| reference.panels.name(p).to_string()).collect();
    let model_file_text_path = format!("{}.model", config.out_prefix);
    let file = std::fs::File::create(&model_file_text_path)
        .map_err(|e| LancError::Io(format!("failed to create {}: {}", model_file_text_path, e)))?;
    model_file::write_model_file(file, &ancestry_names, &panel_names, &params)?;

    run_log.write_to(&format!("{}.log", config.out_prefix)).map_err(LancError::from)?;

    Ok(())
}

/// Runs one EM iteration's forward-backward pass over every study
/// haplotype confined to the EM window, merging per-haplotype
/// accumulators in a fixed order for determinism.
fn run_em_iteration(
    params: &ModelParams,
    window: &Window,
    map: &MarkerMap,
    ref_recs: &[RefGTRec],
    idx: &ReferenceIndex,
    ancestry: &AncestrySet,
    haplotype_alleles: &[Vec<u8>],
) -> Result<EmAccumulator, LancError> {
    let tables = WindowTables::build(params, map, window);
    let distances: Vec<f64> = (window.core.start..window.core.end.saturating_sub(1))
        .map(|i| map.distance(i))
        .collect();

    let accs: Vec<Result<EmAccumulator, LancError>> = haplotype_alleles
        .par_iter()
        .map(|hap| {
            let slice = &hap[window.analysis.clone()];
            let result = run_haplotype(
                window,
                &tables,
                &ref_recs[window.analysis.clone()],
                slice,
                idx,
                ancestry,
                params,
                None,
            )?;
            let mut acc = EmAccumulator::new(ancestry.n_ancestries());
            acc.accumulate(&result.posteriors, &distances, result.log_likelihood);
            Ok(acc)
        })
        .collect();

    let mut total = EmAccumulator::new(ancestry.n_ancestries());
    for acc in accs {
        total.merge(&acc?);
    }
    Ok(total)
}
