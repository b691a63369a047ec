use std::collections::HashMap;

use crate::errors::LancError;
use crate::model::genetic_map::GeneticMapTable;
use crate::model::marker::Markers;
use crate::model::genetic_map::MarkerMap;
use crate::name_table::NameTable;

/// Parses a PLINK-format genetic map (`chrom id cM bp`) into one
/// `GeneticMapTable` per chromosome.
pub fn load_genetic_map_tables(
    path: &str,
    names: &mut NameTable,
) -> Result<HashMap<usize, GeneticMapTable>, LancError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| LancError::Io(format!("failed to read genetic map {}: {}", path, e)))?;
    let mut per_chrom: HashMap<usize, Vec<(u64, f64)>> = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            return Err(LancError::malformed(format!(
                "genetic map line {} does not have 4 columns",
                lineno + 1
            )));
        }
        let chrom_idx = names.intern_chrom(cols[0]);
        let cm: f64 = cols[2].parse().map_err(|_| {
            LancError::malformed(format!("genetic map line {} has a non-numeric cM value", lineno + 1))
        })?;
        let bp: u64 = cols[3].parse().map_err(|_| {
            LancError::malformed(format!("genetic map line {} has a non-numeric bp value", lineno + 1))
        })?;
        per_chrom.entry(chrom_idx).or_default().push((bp, cm));
    }
    Ok(per_chrom
        .into_iter()
        .map(|(chrom, entries)| (chrom, GeneticMapTable::new(entries)))
        .collect())
}

/// Projects per-chromosome `GeneticMapTable`s onto a `Markers` sequence,
/// producing a `MarkerMap` aligned one-to-one with `markers`.
pub fn project_onto_markers(
    markers: &Markers,
    tables: &HashMap<usize, GeneticMapTable>,
) -> Result<MarkerMap, LancError> {
    let mut cm = Vec::with_capacity(markers.len());
    for marker in markers.iter() {
        let table = tables.get(&marker.chrom).ok_or_else(|| {
            LancError::inconsistent(format!(
                "no genetic map entries for chromosome index {}",
                marker.chrom
            ))
        })?;
        cm.push(table.interpolate(marker.pos));
    }
    Ok(MarkerMap::new(cm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::marker::Marker;

    #[test]
    fn projects_interpolated_positions_onto_markers() {
        let mut names = NameTable::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("localanc_test_map.txt");
        std::fs::write(&path, "chr1 rs1 0.0 100\nchr1 rs2 1.0 200\n").unwrap();
        let tables = load_genetic_map_tables(path.to_str().unwrap(), &mut names).unwrap();
        let mut markers = Markers::new();
        let chrom = names.intern_chrom("chr1");
        markers
            .push(Marker::new(chrom, 150, vec!["A".into(), "T".into()]).unwrap())
            .unwrap();
        let map = project_onto_markers(&markers, &tables).unwrap();
        assert!((map.cm_at(0) - 0.5).abs() < 1e-9);
    }
}
