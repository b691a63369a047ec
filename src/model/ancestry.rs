use crate::errors::LancError;
use crate::model::samples::Panels;

/// A dense index set `[0, A)` of ancestry labels, each eligible to draw
/// from a nonempty sorted subset of reference panels.
///
/// Default (no remap file given): `A = P`, `ancestry_to_panels` is the
/// identity map, and `labels` are the panel names.
#[derive(Debug, Clone)]
pub struct AncestrySet {
    labels: Vec<String>,
    ancestry_to_panels: Vec<Vec<usize>>,
}

impl AncestrySet {
    pub fn identity(panels: &Panels) -> Result<Self, LancError> {
        let a = panels.n_panels();
        let labels: Vec<String> = (0..a).map(|p| panels.name(p).to_string()).collect();
        let ancestry_to_panels = (0..a).map(|p| vec![p]).collect();
        Self::new(labels, ancestry_to_panels)
    }

    pub fn new(labels: Vec<String>, ancestry_to_panels: Vec<Vec<usize>>) -> Result<Self, LancError> {
        if labels.len() != ancestry_to_panels.len() {
            return Err(LancError::inconsistent(
                "ancestry labels and panel-map length mismatch",
            ));
        }
        if labels.len() < 2 {
            return Err(LancError::insufficient(
                "at least two ancestries are required",
            ));
        }
        for panels in &ancestry_to_panels {
            if panels.is_empty() {
                return Err(LancError::inconsistent(
                    "an ancestry must map to at least one reference panel",
                ));
            }
            let mut sorted = panels.clone();
            sorted.sort_unstable();
            if sorted != *panels || sorted.windows(2).any(|w| w[0] == w[1]) {
                return Err(LancError::inconsistent(
                    "ancestry-to-panel map must be sorted with no duplicates",
                ));
            }
        }
        Ok(AncestrySet {
            labels,
            ancestry_to_panels,
        })
    }

    pub fn n_ancestries(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, a: usize) -> &str {
        &self.labels[a]
    }

    pub fn panels_for(&self, a: usize) -> &[usize] {
        &self.ancestry_to_panels[a]
    }

    pub fn index_of_label(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|x| x == label)
    }

    /// Checks that every reference panel is claimed by exactly one
    /// ancestry (the per-panel θ row invariant depends on this).
    pub fn validate_covers_panels(&self, n_panels: usize) -> Result<(), LancError> {
        let mut owner = vec![None; n_panels];
        for (a, panels) in self.ancestry_to_panels.iter().enumerate() {
            for &p in panels {
                if p >= n_panels {
                    return Err(LancError::inconsistent(format!(
                        "ancestry {} references out-of-range panel {}",
                        a, p
                    )));
                }
                if owner[p].is_some() {
                    return Err(LancError::inconsistent(format!(
                        "panel {} is claimed by more than one ancestry",
                        p
                    )));
                }
                owner[p] = Some(a);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_map_matches_panel_count() {
        let panels = Panels::new(vec!["P0".into(), "P1".into()], vec![0, 1]).unwrap();
        let anc = AncestrySet::identity(&panels).unwrap();
        assert_eq!(anc.n_ancestries(), 2);
        assert_eq!(anc.panels_for(0), &[0]);
    }

    #[test]
    fn rejects_single_ancestry_by_default() {
        assert!(AncestrySet::new(vec!["A".into()], vec![vec![0]]).is_err());
    }

    #[test]
    fn rejects_panel_owned_twice() {
        let anc = AncestrySet::new(
            vec!["A".into(), "B".into()],
            vec![vec![0, 1], vec![1]],
        )
        .unwrap();
        assert!(anc.validate_covers_panels(2).is_err());
    }
}
