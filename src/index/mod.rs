//! The TIS index: the packed, persistable artifact described in §3, one
//! row per unique chroma mask.

mod persist;

pub use persist::{load_index, save_index, StoredIndex};

use std::collections::BTreeMap;

use ndarray::Array2;
use rustfft::num_complex::Complex64;

use crate::chroma::CHROMA_LEN;
use crate::corpus::build_corpus_groups;
use crate::error::Result;
use crate::tis::{basis_matrix, chroma_matrix_to_tis, TIS_DIM, DEFAULT_WEIGHTS};

/// Source/build provenance for an index, serialized as the JSON meta blob
/// of §3/§4.9.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexMeta {
    pub source: String,
    pub created_utc: String,
    pub chroma_len: usize,
    pub tis_dim: usize,
    pub bit_order: Vec<String>,
    pub weights: Vec<f64>,
    pub num_chords: usize,
    pub num_vectors: usize,
}

/// One unique-mask row, frozen after [`TensionIndex::build`].
///
/// `rep_names_by_root`/`rep_offsets` and `alias_names`/`alias_offsets`
/// are the flattened slice tables from §3 — use [`TensionIndex::reps_for_row`]
/// and [`TensionIndex::aliases_for_row`] rather than indexing them directly.
#[derive(Debug, Clone)]
pub struct TensionIndex {
    pub rep_names: Vec<String>,
    pub chroma_bits: Vec<[u8; CHROMA_LEN]>,
    pub chroma_mask: Vec<u16>,
    pub tis: Array2<Complex64>,
    pub tis_norm: Vec<f64>,
    pub tis_unit: Array2<Complex64>,
    pub rep_offsets: Vec<u32>,
    pub rep_names_by_root: Vec<String>,
    pub alias_offsets: Vec<u32>,
    pub alias_names: Vec<String>,
    pub meta: IndexMeta,
}

impl TensionIndex {
    /// Build an index from a `{chord name -> chroma}` corpus (§4.2 then §4.3).
    pub fn build(chords: &BTreeMap<String, [u8; CHROMA_LEN]>, source_name: &str) -> Result<Self> {
        let groups = build_corpus_groups(chords)?;
        let m = groups.len();

        let mut rep_names = Vec::with_capacity(m);
        let mut chroma_bits = Vec::with_capacity(m);
        let mut chroma_mask = Vec::with_capacity(m);
        let mut rep_offsets = Vec::with_capacity(m + 1);
        let mut rep_names_by_root = Vec::new();
        let mut alias_offsets = Vec::with_capacity(m + 1);
        let mut alias_names = Vec::new();

        rep_offsets.push(0);
        alias_offsets.push(0);

        let mut chroma_matrix = Array2::<f64>::zeros((m, CHROMA_LEN));
        for (row, group) in groups.iter().enumerate() {
            rep_names.push(group.rep_name.clone());
            chroma_bits.push(group.rep_bits);
            chroma_mask.push(group.mask);
            for col in 0..CHROMA_LEN {
                chroma_matrix[[row, col]] = group.rep_bits[col] as f64;
            }

            rep_names_by_root.extend(group.reps_by_root.iter().cloned());
            rep_offsets.push(rep_names_by_root.len() as u32);

            alias_names.extend(group.aliases.iter().cloned());
            alias_offsets.push(alias_names.len() as u32);
        }

        let basis = basis_matrix();
        let tis = chroma_matrix_to_tis(&chroma_matrix, &DEFAULT_WEIGHTS, &basis)?;

        let mut tis_norm = Vec::with_capacity(m);
        let mut tis_unit = Array2::<Complex64>::zeros((m, TIS_DIM));
        for row in 0..m {
            let norm = (0..TIS_DIM)
                .map(|k| tis[[row, k]].norm_sqr())
                .sum::<f64>()
                .sqrt();
            tis_norm.push(norm);
            for k in 0..TIS_DIM {
                tis_unit[[row, k]] = tis[[row, k]] / norm;
            }
        }

        log::debug!(
            "built tension index: {} source chords -> {} unique chroma masks",
            chords.len(),
            m
        );

        let meta = IndexMeta {
            source: source_name.to_string(),
            created_utc: now_utc_rfc3339(),
            chroma_len: CHROMA_LEN,
            tis_dim: TIS_DIM,
            bit_order: vec![
                "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            weights: DEFAULT_WEIGHTS.to_vec(),
            num_chords: chords.len(),
            num_vectors: m,
        };

        Ok(TensionIndex {
            rep_names,
            chroma_bits,
            chroma_mask,
            tis,
            tis_norm,
            tis_unit,
            rep_offsets,
            rep_names_by_root,
            alias_offsets,
            alias_names,
            meta,
        })
    }

    pub fn len(&self) -> usize {
        self.rep_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rep_names.is_empty()
    }

    /// Per-root canonical representatives for `row`.
    pub fn reps_for_row(&self, row: usize) -> &[String] {
        let start = self.rep_offsets[row] as usize;
        let end = self.rep_offsets[row + 1] as usize;
        &self.rep_names_by_root[start..end]
    }

    /// All aliases (including the representative) sharing `row`'s mask.
    pub fn aliases_for_row(&self, row: usize) -> &[String] {
        let start = self.alias_offsets[row] as usize;
        let end = self.alias_offsets[row + 1] as usize;
        &self.alias_names[start..end]
    }

    /// Build a `{chord name -> row}` lookup over every alias.
    pub fn build_name_to_row(&self) -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        for row in 0..self.len() {
            for name in self.aliases_for_row(row) {
                map.insert(name.clone(), row);
            }
        }
        map
    }

    /// Build a `{mask -> row}` lookup.
    pub fn build_mask_to_row(&self) -> BTreeMap<u16, usize> {
        self.chroma_mask
            .iter()
            .enumerate()
            .map(|(row, &mask)| (mask, row))
            .collect()
    }
}

/// A UTC timestamp formatted as RFC3339 without pulling in a datetime
/// crate — index metadata only needs an opaque provenance string, not
/// calendar arithmetic.
fn now_utc_rfc3339() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("unix:{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_corpus() -> BTreeMap<String, [u8; CHROMA_LEN]> {
        let mut c = BTreeMap::new();
        c.insert("C".to_string(), bits(&[0, 4, 7]));
        c.insert("Dm".to_string(), bits(&[2, 5, 9]));
        c.insert("Em".to_string(), bits(&[4, 7, 11]));
        c.insert("F".to_string(), bits(&[5, 9, 0]));
        c.insert("G".to_string(), bits(&[7, 11, 2]));
        c.insert("Am".to_string(), bits(&[9, 0, 4]));
        c.insert("G7".to_string(), bits(&[7, 11, 2, 5]));
        c.insert("E7".to_string(), bits(&[4, 8, 11, 2]));
        c
    }

    fn bits(pcs: &[usize]) -> [u8; CHROMA_LEN] {
        let mut b = [0u8; CHROMA_LEN];
        for &pc in pcs {
            b[pc] = 1;
        }
        b
    }

    #[test]
    fn build_produces_one_row_per_unique_mask() {
        let idx = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        assert_eq!(idx.len(), 8);
    }

    #[test]
    fn masks_are_strictly_increasing() {
        let idx = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        for w in idx.chroma_mask.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn every_alias_resolves_to_its_rows_mask() {
        let idx = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        for row in 0..idx.len() {
            for alias in idx.aliases_for_row(row) {
                let bits = idx.chroma_bits[row];
                let mask = crate::chroma::bits_to_mask(&bits).unwrap();
                assert_eq!(mask, idx.chroma_mask[row]);
                let _ = alias;
            }
        }
    }

    #[test]
    fn unit_vectors_have_norm_one() {
        let idx = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        for row in 0..idx.len() {
            let norm_sq: f64 = (0..TIS_DIM).map(|k| idx.tis_unit[[row, k]].norm_sqr()).sum();
            assert!((norm_sq.sqrt() - 1.0).abs() < 1e-9);
        }
    }
}
