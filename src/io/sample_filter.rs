use std::collections::HashMap;

use crate::errors::LancError;
use crate::model::ancestry::AncestrySet;
use crate::model::samples::Samples;

/// Parses the `gt-samples` option: a one-column file of sample IDs,
/// optionally preceded by `^` on the first non-blank line to mean
/// "exclude these" rather than "keep only these".
pub fn parse_sample_list(text: &str) -> (bool, Vec<String>) {
    let mut exclude = false;
    let mut ids = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if i == 0 && line.starts_with('^') {
            exclude = true;
            let rest = line[1..].trim();
            if !rest.is_empty() {
                ids.push(rest.to_string());
            }
            continue;
        }
        ids.push(line.to_string());
    }
    (exclude, ids)
}

/// Resolves a `gt-samples` file against the loaded study samples, returning
/// the indices to keep, in the original sample order.
pub fn resolve_sample_subset(samples: &Samples, text: &str) -> Result<Vec<usize>, LancError> {
    let (exclude, ids) = parse_sample_list(text);
    let mut named: Vec<usize> = Vec::new();
    for id in &ids {
        if let Some(idx) = samples.index_of(id) {
            named.push(idx);
        }
    }
    let keep: Vec<usize> = if exclude {
        let excluded: std::collections::HashSet<usize> = named.into_iter().collect();
        (0..samples.len()).filter(|i| !excluded.contains(i)).collect()
    } else {
        named
    };
    if keep.is_empty() {
        return Err(LancError::insufficient(
            "gt-samples selection leaves no study samples",
        ));
    }
    Ok(keep)
}

/// Per-sample fixed global-ancestry priors supplied via `gt-ancestries`,
/// keyed by sample ID. The file's header row of ancestry labels must match
/// the model's ancestry order exactly (a mismatch is fatal, not silently
/// reordered, per the Open Question resolution).
pub fn parse_sample_priors(
    text: &str,
    ancestry: &AncestrySet,
) -> Result<HashMap<String, Vec<f64>>, LancError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));
    let header = lines
        .next()
        .ok_or_else(|| LancError::malformed("gt-ancestries file is empty"))?;
    let header_cols: Vec<&str> = header.split_whitespace().collect();
    if header_cols.is_empty() || header_cols[0].to_uppercase() != "SAMPLE" {
        return Err(LancError::malformed(
            "gt-ancestries file must start with a SAMPLE column header",
        ));
    }
    let labels = &header_cols[1..];
    if labels.len() != ancestry.n_ancestries() {
        return Err(LancError::inconsistent(
            "gt-ancestries header ancestry count does not match the model",
        ));
    }
    for (i, label) in labels.iter().enumerate() {
        if ancestry.label(i) != *label {
            return Err(LancError::inconsistent(format!(
                "gt-ancestries header ancestry order does not match the model: \
                 expected {} at position {}, found {}",
                ancestry.label(i),
                i,
                label
            )));
        }
    }

    let mut priors = HashMap::new();
    for line in lines {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != labels.len() + 1 {
            return Err(LancError::malformed(
                "gt-ancestries data row does not match the header column count",
            ));
        }
        let sample = cols[0].to_string();
        if priors.contains_key(&sample) {
            return Err(LancError::inconsistent(format!(
                "gt-ancestries file lists sample {} more than once",
                sample
            )));
        }
        let mut values = Vec::with_capacity(labels.len());
        for v in &cols[1..] {
            let parsed: f64 = v
                .parse()
                .map_err(|_| LancError::malformed("gt-ancestries value is not numeric"))?;
            values.push(parsed);
        }
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(LancError::malformed(format!(
                "gt-ancestries row for sample {} does not sum to 1 (got {})",
                sample, sum
            )));
        }
        priors.insert(sample, values);
    }
    Ok(priors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_ancestries() -> AncestrySet {
        AncestrySet::new(
            vec!["EUR".to_string(), "AFR".to_string()],
            vec![vec![0], vec![1]],
        )
        .unwrap()
    }

    #[test]
    fn include_list_keeps_only_named_samples() {
        let mut samples = Samples::new();
        samples.push("A".into(), true);
        samples.push("B".into(), true);
        samples.push("C".into(), true);
        let keep = resolve_sample_subset(&samples, "A\nC\n").unwrap();
        assert_eq!(keep, vec![0, 2]);
    }

    #[test]
    fn caret_prefix_excludes_named_samples() {
        let mut samples = Samples::new();
        samples.push("A".into(), true);
        samples.push("B".into(), true);
        let keep = resolve_sample_subset(&samples, "^A\n").unwrap();
        assert_eq!(keep, vec![1]);
    }

    #[test]
    fn priors_require_matching_ancestry_order() {
        let anc = two_ancestries();
        let text = "SAMPLE AFR EUR\nS1 0.5 0.5\n";
        assert!(parse_sample_priors(text, &anc).is_err());
    }

    #[test]
    fn priors_parse_when_order_matches() {
        let anc = two_ancestries();
        let text = "SAMPLE EUR AFR\nS1 0.3 0.7\n";
        let priors = parse_sample_priors(text, &anc).unwrap();
        assert_eq!(priors.get("S1").unwrap(), &vec![0.3, 0.7]);
    }

    #[test]
    fn duplicate_sample_id_is_fatal() {
        let anc = two_ancestries();
        let text = "SAMPLE EUR AFR\nS1 0.3 0.7\nS1 0.1 0.9\n";
        assert!(parse_sample_priors(text, &anc).is_err());
    }
}
