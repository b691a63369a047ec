use std::collections::HashMap;

use crate::errors::LancError;

/// Validated run configuration, built once from the raw `key=value` map
/// per spec.md §6. Every numeric range is checked here so the rest of the
/// engine can assume a consistent config rather than re-parsing strings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ref_path: String,
    pub ref_panel_path: String,
    pub gt_path: String,
    pub map_path: String,
    pub out_prefix: String,

    pub array: bool,
    pub min_maf: f64,
    pub min_mac: usize,
    pub probs: bool,
    pub gen: Option<usize>,
    pub model_path: Option<String>,
    pub em: bool,
    pub gt_samples_path: Option<String>,
    pub gt_ancestries_path: Option<String>,
    pub exclude_markers_path: Option<String>,
    pub nthreads: usize,
    pub seed: u64,
    pub verbose: bool,
    pub quiet: bool,
}

fn required(map: &HashMap<String, String>, key: &str) -> Result<String, LancError> {
    map.get(key)
        .cloned()
        .ok_or_else(|| LancError::malformed(format!("missing required argument {}=...", key)))
}

fn parse_bool(map: &HashMap<String, String>, key: &str) -> Result<bool, LancError> {
    match map.get(key) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(LancError::malformed(format!("{} must be a boolean", key))),
        },
    }
}

fn parse_bool_default_true(map: &HashMap<String, String>, key: &str) -> Result<bool, LancError> {
    match map.get(key) {
        None => Ok(true),
        Some(v) => match v.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(LancError::malformed(format!("{} must be a boolean", key))),
        },
    }
}

impl RunConfig {
    pub fn from_args(map: &HashMap<String, String>) -> Result<RunConfig, LancError> {
        let ref_path = required(map, "ref")?;
        let ref_panel_path = required(map, "ref-panel")?;
        let gt_path = required(map, "gt")?;
        let map_path = required(map, "map")?;
        let out_prefix = required(map, "out")?;

        let array = parse_bool(map, "array")?;

        let min_maf = match map.get("min-maf") {
            None => 0.0,
            Some(v) => {
                let parsed: f64 = v
                    .parse()
                    .map_err(|_| LancError::malformed("min-maf must be a number"))?;
                if !(0.0..0.5).contains(&parsed) {
                    return Err(LancError::malformed("min-maf must be in [0, 0.5)"));
                }
                parsed
            }
        };

        let min_mac = match map.get("min-mac") {
            None => 0,
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| LancError::malformed("min-mac must be a non-negative integer"))?,
        };

        let probs = parse_bool(map, "probs")?;

        let gen = match map.get("gen") {
            None => None,
            Some(v) => {
                let parsed: usize = v
                    .parse()
                    .map_err(|_| LancError::malformed("gen must be a positive integer"))?;
                if parsed < 1 {
                    return Err(LancError::malformed("gen must be >= 1"));
                }
                Some(parsed)
            }
        };

        let model_path = map.get("model").cloned();
        let em = parse_bool_default_true(map, "em")?;
        let gt_samples_path = map.get("gt-samples").cloned();
        let gt_ancestries_path = map.get("gt-ancestries").cloned();
        let exclude_markers_path = map.get("excludemarkers").cloned();

        let nthreads = match map.get("nthreads") {
            None => num_cpus_fallback(),
            Some(v) => {
                let parsed: usize = v
                    .parse()
                    .map_err(|_| LancError::malformed("nthreads must be a positive integer"))?;
                if parsed < 1 {
                    return Err(LancError::malformed("nthreads must be >= 1"));
                }
                parsed
            }
        };

        let seed = match map.get("seed") {
            None => 0,
            Some(v) => v.parse().map_err(|_| LancError::malformed("seed must be an integer"))?,
        };

        let verbose = parse_bool(map, "verbose")?;
        let quiet = parse_bool(map, "quiet")?;

        Ok(RunConfig {
            ref_path,
            ref_panel_path,
            gt_path,
            map_path,
            out_prefix,
            array,
            min_maf,
            min_mac,
            probs,
            gen,
            model_path,
            em,
            gt_samples_path,
            gt_ancestries_path,
            exclude_markers_path,
            nthreads,
            seed,
            verbose,
            quiet,
        })
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("ref".into(), "ref.vcf.gz".into());
        m.insert("ref-panel".into(), "panels.txt".into());
        m.insert("gt".into(), "study.vcf.gz".into());
        m.insert("map".into(), "genmap.txt".into());
        m.insert("out".into(), "run1".into());
        m
    }

    #[test]
    fn builds_from_required_keys_alone() {
        let cfg = RunConfig::from_args(&base_args()).unwrap();
        assert_eq!(cfg.ref_path, "ref.vcf.gz");
        assert!(cfg.em);
        assert_eq!(cfg.min_mac, 0);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let mut args = base_args();
        args.remove("ref");
        assert!(RunConfig::from_args(&args).is_err());
    }

    #[test]
    fn rejects_min_maf_out_of_range() {
        let mut args = base_args();
        args.insert("min-maf".into(), "0.5".into());
        assert!(RunConfig::from_args(&args).is_err());
    }

    #[test]
    fn em_can_be_disabled() {
        let mut args = base_args();
        args.insert("em".into(), "false".into());
        let cfg = RunConfig::from_args(&args).unwrap();
        assert!(!cfg.em);
    }
}
