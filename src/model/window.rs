use crate::model::genetic_map::MarkerMap;

/// cM of overlap a window carries into its neighbor, before clamping.
pub const OVERLAP_TARGET_CM: f64 = 0.5;
pub const OVERLAP_MIN_MARKERS: usize = 50;
pub const OVERLAP_MAX_MARKERS: usize = 500;

/// A contiguous slice of one chromosome's markers, processed by one
/// forward-backward pass.
///
/// `core` is the index range `[start, end)` whose posteriors are reported;
/// `analysis` extends `core` by up to `OVERLAP_MAX_MARKERS` markers on each
/// side (clamped to the chromosome's own bounds) so the HMM has context to
/// settle into before/after the reported region, per spec §4.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub chrom: usize,
    pub core: std::ops::Range<usize>,
    pub analysis: std::ops::Range<usize>,
}

impl Window {
    pub fn core_len(&self) -> usize {
        self.core.end - self.core.start
    }

    pub fn analysis_len(&self) -> usize {
        self.analysis.end - self.analysis.start
    }

    /// Offset of `core.start` within `analysis`, i.e. how many leading
    /// overlap markers precede the reported region.
    pub fn lead_in(&self) -> usize {
        self.core.start - self.analysis.start
    }
}

/// Number of markers, starting at `from` and walking in `step` direction
/// (+1 or -1), needed to cover `OVERLAP_TARGET_CM` of genetic distance,
/// clamped to `[OVERLAP_MIN_MARKERS, OVERLAP_MAX_MARKERS]` and to the
/// available markers in `bounds`.
fn overlap_markers(map: &MarkerMap, from: usize, step: isize, bound: usize) -> usize {
    let mut n = 0usize;
    let mut cm_covered = 0.0;
    let mut i = from as isize;
    while n < OVERLAP_MAX_MARKERS {
        let next = i + step;
        if next < 0 || next as usize >= bound + 1 {
            break;
        }
        let (lo, hi) = if step > 0 {
            (i as usize, next as usize)
        } else {
            (next as usize, i as usize)
        };
        if hi >= map.len() {
            break;
        }
        cm_covered += map.distance(lo.min(hi));
        n += 1;
        i = next;
        if cm_covered >= OVERLAP_TARGET_CM && n >= OVERLAP_MIN_MARKERS {
            break;
        }
    }
    n.clamp(
        OVERLAP_MIN_MARKERS.min(n.max(1)),
        OVERLAP_MAX_MARKERS,
    )
}

/// Splits each chromosome's marker range into overlapping windows small
/// enough to bound forward-backward memory use but large enough that no
/// core region starts or ends without at least `OVERLAP_MIN_MARKERS` of
/// settling context, per spec §4.2 "Windowing".
///
/// `target_core_markers` bounds how many markers a single window's core
/// covers; windows are only split, never merged, so the last window in a
/// chromosome may be shorter than the target.
pub fn plan_windows(
    chrom_ranges: &[(usize, std::ops::Range<usize>)],
    map: &MarkerMap,
    target_core_markers: usize,
) -> Vec<Window> {
    let mut windows = Vec::new();
    for (chrom, range) in chrom_ranges {
        let chrom_len = range.end - range.start;
        if chrom_len == 0 {
            continue;
        }
        let mut start = range.start;
        while start < range.end {
            let end = (start + target_core_markers).min(range.end);
            let lead_in = if start == range.start {
                0
            } else {
                overlap_markers(map, start, -1, range.start)
            };
            let trail_out = if end == range.end {
                0
            } else {
                overlap_markers(map, end - 1, 1, range.end - 1)
            };
            let analysis_start = start.saturating_sub(lead_in).max(range.start);
            let analysis_end = (end + trail_out).min(range.end);
            windows.push(Window {
                chrom: *chrom,
                core: start..end,
                analysis: analysis_start..analysis_end,
            });
            start = end;
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_map(n: usize, cm_per_marker: f64) -> MarkerMap {
        MarkerMap::new((0..n).map(|i| i as f64 * cm_per_marker).collect())
    }

    #[test]
    fn single_window_covers_short_chromosome() {
        let map = uniform_map(10, 0.1);
        let windows = plan_windows(&[(0, 0..10)], &map, 100);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].core, 0..10);
        assert_eq!(windows[0].analysis, 0..10);
    }

    #[test]
    fn multiple_windows_tile_the_chromosome_without_gaps() {
        let map = uniform_map(1000, 0.01);
        let windows = plan_windows(&[(0, 0..1000)], &map, 300);
        assert!(windows.len() >= 3);
        assert_eq!(windows.first().unwrap().core.start, 0);
        assert_eq!(windows.last().unwrap().core.end, 1000);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].core.end, pair[1].core.start);
        }
    }

    #[test]
    fn interior_windows_carry_overlap_on_both_sides() {
        let map = uniform_map(1000, 0.01);
        let windows = plan_windows(&[(0, 0..1000)], &map, 300);
        let interior = &windows[1];
        assert!(interior.analysis.start < interior.core.start);
        assert!(interior.analysis.end > interior.core.end || interior.core.end == 1000);
    }

    #[test]
    fn disjoint_chromosomes_each_get_their_own_windows() {
        let map = uniform_map(2000, 0.01);
        let windows = plan_windows(&[(0, 0..500), (1, 500..2000)], &map, 1000);
        assert!(windows.iter().any(|w| w.chrom == 0));
        assert!(windows.iter().any(|w| w.chrom == 1));
        assert!(windows.iter().all(|w| {
            if w.chrom == 0 {
                w.analysis.start >= 0 && w.analysis.end <= 500
            } else {
                w.analysis.start >= 500 && w.analysis.end <= 2000
            }
        }));
    }
}
