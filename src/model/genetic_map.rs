/// Genetic position (cM) and forward inter-marker distance, parallel to
/// `Markers`.
///
/// Invariant: consecutive genetic distances are non-negative; a mean
/// single-base distance is derived with a floor of 1e-8 cM so that no
/// transition probability ever collapses to exactly zero.
#[derive(Debug, Clone, Default)]
pub struct MarkerMap {
    cm: Vec<f64>,
}

impl MarkerMap {
    pub const MIN_SINGLE_BASE_CM: f64 = 1e-8;

    pub fn new(cm: Vec<f64>) -> Self {
        MarkerMap { cm }
    }

    pub fn len(&self) -> usize {
        self.cm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cm.is_empty()
    }

    pub fn cm_at(&self, i: usize) -> f64 {
        self.cm[i]
    }

    /// Forward distance in cM from marker `i` to marker `i + 1`, floored at
    /// `MIN_SINGLE_BASE_CM` so the transition kernel never produces a
    /// literal zero recombination probability between adjacent distinct
    /// markers.
    pub fn distance(&self, i: usize) -> f64 {
        let d = self.cm[i + 1] - self.cm[i];
        d.max(Self::MIN_SINGLE_BASE_CM)
    }

    pub fn distances(&self) -> Vec<f64> {
        (0..self.cm.len().saturating_sub(1))
            .map(|i| self.distance(i))
            .collect()
    }
}

/// Linear interpolation/extrapolation of a PLINK-format genetic map
/// (`chrom id cM bp`, sorted by `bp`) onto a list of base positions. Outside
/// the map's covered range, the slope of the nearest two entries is used to
/// extrapolate, per spec §6.
pub struct GeneticMapTable {
    bp: Vec<u64>,
    cm: Vec<f64>,
}

impl GeneticMapTable {
    pub fn new(mut entries: Vec<(u64, f64)>) -> Self {
        entries.sort_by_key(|(bp, _)| *bp);
        let bp = entries.iter().map(|(b, _)| *b).collect();
        let cm = entries.iter().map(|(_, c)| *c).collect();
        GeneticMapTable { bp, cm }
    }

    pub fn is_empty(&self) -> bool {
        self.bp.is_empty()
    }

    /// Interpolates (or extrapolates) the genetic position, in cM, of base
    /// position `pos`.
    pub fn interpolate(&self, pos: u64) -> f64 {
        let n = self.bp.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 {
            return self.cm[0];
        }
        if pos <= self.bp[0] {
            return Self::extrapolate(self.bp[0], self.cm[0], self.bp[1], self.cm[1], pos);
        }
        if pos >= self.bp[n - 1] {
            return Self::extrapolate(
                self.bp[n - 2],
                self.cm[n - 2],
                self.bp[n - 1],
                self.cm[n - 1],
                pos,
            );
        }
        // binary search for the bracketing pair
        let idx = self.bp.partition_point(|&b| b <= pos);
        let (lo, hi) = (idx - 1, idx);
        Self::extrapolate(self.bp[lo], self.cm[lo], self.bp[hi], self.cm[hi], pos)
    }

    fn extrapolate(bp0: u64, cm0: f64, bp1: u64, cm1: f64, pos: u64) -> f64 {
        if bp1 == bp0 {
            return cm0;
        }
        let slope = (cm1 - cm0) / (bp1 as f64 - bp0 as f64);
        cm0 + slope * (pos as f64 - bp0 as f64)
    }
}
