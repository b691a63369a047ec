use std::collections::HashMap;

/// Owns the interned chromosome and sample names for one run.
///
/// The teacher interns names process-wide via `lazy_static` globals. Design
/// Notes §9 asks for that to be localized instead: one `NameTable` built by
/// the loader and passed explicitly to whatever needs to resolve an index
/// back to a name (the output writer, the log).
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    chroms: Vec<String>,
    chrom_index: HashMap<String, usize>,
    samples: Vec<String>,
    sample_index: HashMap<String, usize>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_chrom(&mut self, name: &str) -> usize {
        if let Some(&i) = self.chrom_index.get(name) {
            return i;
        }
        let i = self.chroms.len();
        self.chroms.push(name.to_string());
        self.chrom_index.insert(name.to_string(), i);
        i
    }

    pub fn chrom_name(&self, idx: usize) -> &str {
        &self.chroms[idx]
    }

    pub fn chrom_idx(&self, name: &str) -> Option<usize> {
        self.chrom_index.get(name).copied()
    }

    pub fn intern_sample(&mut self, name: &str) -> usize {
        if let Some(&i) = self.sample_index.get(name) {
            return i;
        }
        let i = self.samples.len();
        self.samples.push(name.to_string());
        self.sample_index.insert(name.to_string(), i);
        i
    }

    pub fn sample_name(&self, idx: usize) -> &str {
        &self.samples[idx]
    }

    pub fn sample_idx(&self, name: &str) -> Option<usize> {
        self.sample_index.get(name).copied()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}
