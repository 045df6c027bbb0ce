//! Binary index persistence (§4.9): a CBOR archive of named numeric
//! arrays plus a typed meta struct, with tagged-variant backward
//! compatibility for the two legacy schemas.
//!
//! `rustfft::num_complex::Complex64` has no `serde` impl in the feature
//! set this crate enables, so the archive stores TIS vectors as parallel
//! real/imaginary `f64` arrays and reassembles `Complex64` on load — the
//! same flattened-array shape the in-memory index already uses.

use std::io::{Read, Write};

use ndarray::Array2;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::chroma::CHROMA_LEN;
use crate::error::{Result, TensionError};
use crate::index::{IndexMeta, TensionIndex};
use crate::tis::TIS_DIM;

#[derive(Serialize, Deserialize)]
struct CurrentArchive {
    rep_names: Vec<String>,
    chroma_bits: Vec<Vec<u8>>,
    chroma_mask: Vec<u16>,
    tis_re: Vec<f64>,
    tis_im: Vec<f64>,
    tis_norm: Vec<f64>,
    tis_unit_re: Vec<f64>,
    tis_unit_im: Vec<f64>,
    rep_offsets: Vec<u32>,
    rep_names_by_root: Vec<String>,
    alias_offsets: Vec<u32>,
    alias_names: Vec<String>,
    meta: IndexMeta,
}

/// One row per chord name rather than per mask; no dedup, no per-root
/// rep table. Alias/rep offsets are synthesized as `[0, 1, 2, ..., n]`.
#[derive(Serialize, Deserialize)]
struct LegacyFlatRowsArchive {
    names: Vec<String>,
    chroma_bits: Vec<Vec<u8>>,
    chroma_mask: Vec<u16>,
    tis_re: Vec<f64>,
    tis_im: Vec<f64>,
    tis_norm: Vec<f64>,
    tis_unit_re: Vec<f64>,
    tis_unit_im: Vec<f64>,
    meta: IndexMeta,
}

/// Rows per mask, but no per-root rep table (per-root reps default to
/// `[primary_rep]`).
#[derive(Serialize, Deserialize)]
struct EarlyDedupedArchive {
    rep_names: Vec<String>,
    chroma_bits: Vec<Vec<u8>>,
    chroma_mask: Vec<u16>,
    tis_re: Vec<f64>,
    tis_im: Vec<f64>,
    tis_norm: Vec<f64>,
    tis_unit_re: Vec<f64>,
    tis_unit_im: Vec<f64>,
    alias_offsets: Vec<u32>,
    alias_names: Vec<String>,
    meta: IndexMeta,
}

/// Tagged variant over schema versions, per the §9 "polymorphism over
/// index schema versions" guidance: one constructor per legacy layout,
/// normalized to [`TensionIndex`] by a single [`load_index`].
#[derive(Serialize, Deserialize)]
pub enum StoredIndex {
    Current(CurrentArchive),
    LegacyFlatRows(LegacyFlatRowsArchive),
    EarlyDeduped(EarlyDedupedArchive),
}

fn complex_to_parts(arr: &Array2<Complex64>) -> (Vec<f64>, Vec<f64>) {
    let re = arr.iter().map(|c| c.re).collect();
    let im = arr.iter().map(|c| c.im).collect();
    (re, im)
}

fn parts_to_complex(re: &[f64], im: &[f64], rows: usize, cols: usize) -> Result<Array2<Complex64>> {
    if re.len() != rows * cols || im.len() != rows * cols {
        return Err(TensionError::InvalidIndex(format!(
            "expected {} complex entries, got {}/{}",
            rows * cols,
            re.len(),
            im.len()
        )));
    }
    let mut out = Array2::<Complex64>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            let i = row * cols + col;
            out[[row, col]] = Complex64::new(re[i], im[i]);
        }
    }
    Ok(out)
}

fn bits_vec_to_array(bits: &[Vec<u8>]) -> Result<Vec<[u8; CHROMA_LEN]>> {
    bits.iter()
        .map(|row| {
            if row.len() != CHROMA_LEN {
                return Err(TensionError::InvalidChromaLength {
                    expected: CHROMA_LEN,
                    got: row.len(),
                });
            }
            let mut out = [0u8; CHROMA_LEN];
            out.copy_from_slice(row);
            Ok(out)
        })
        .collect()
}

impl TensionIndex {
    fn to_current_archive(&self) -> CurrentArchive {
        let (tis_re, tis_im) = complex_to_parts(&self.tis);
        let (tis_unit_re, tis_unit_im) = complex_to_parts(&self.tis_unit);
        CurrentArchive {
            rep_names: self.rep_names.clone(),
            chroma_bits: self.chroma_bits.iter().map(|b| b.to_vec()).collect(),
            chroma_mask: self.chroma_mask.clone(),
            tis_re,
            tis_im,
            tis_norm: self.tis_norm.clone(),
            tis_unit_re,
            tis_unit_im,
            rep_offsets: self.rep_offsets.clone(),
            rep_names_by_root: self.rep_names_by_root.clone(),
            alias_offsets: self.alias_offsets.clone(),
            alias_names: self.alias_names.clone(),
            meta: self.meta.clone(),
        }
    }

    fn from_current_archive(a: CurrentArchive) -> Result<Self> {
        let m = a.rep_names.len();
        let tis = parts_to_complex(&a.tis_re, &a.tis_im, m, TIS_DIM)?;
        let tis_unit = parts_to_complex(&a.tis_unit_re, &a.tis_unit_im, m, TIS_DIM)?;
        Ok(TensionIndex {
            rep_names: a.rep_names,
            chroma_bits: bits_vec_to_array(&a.chroma_bits)?,
            chroma_mask: a.chroma_mask,
            tis,
            tis_norm: a.tis_norm,
            tis_unit,
            rep_offsets: a.rep_offsets,
            rep_names_by_root: a.rep_names_by_root,
            alias_offsets: a.alias_offsets,
            alias_names: a.alias_names,
            meta: a.meta,
        })
    }

    fn from_legacy_flat_rows(a: LegacyFlatRowsArchive) -> Result<Self> {
        let n = a.names.len();
        let tis = parts_to_complex(&a.tis_re, &a.tis_im, n, TIS_DIM)?;
        let tis_unit = parts_to_complex(&a.tis_unit_re, &a.tis_unit_im, n, TIS_DIM)?;
        let offsets: Vec<u32> = (0..=n as u32).collect();
        Ok(TensionIndex {
            rep_names: a.names.clone(),
            chroma_bits: bits_vec_to_array(&a.chroma_bits)?,
            chroma_mask: a.chroma_mask,
            tis,
            tis_norm: a.tis_norm,
            tis_unit,
            rep_offsets: offsets.clone(),
            rep_names_by_root: a.names.clone(),
            alias_offsets: offsets,
            alias_names: a.names,
            meta: a.meta,
        })
    }

    fn from_early_deduped(a: EarlyDedupedArchive) -> Result<Self> {
        let m = a.rep_names.len();
        let tis = parts_to_complex(&a.tis_re, &a.tis_im, m, TIS_DIM)?;
        let tis_unit = parts_to_complex(&a.tis_unit_re, &a.tis_unit_im, m, TIS_DIM)?;
        let rep_offsets: Vec<u32> = (0..=m as u32).collect();
        Ok(TensionIndex {
            rep_names: a.rep_names.clone(),
            chroma_bits: bits_vec_to_array(&a.chroma_bits)?,
            chroma_mask: a.chroma_mask,
            tis,
            tis_norm: a.tis_norm,
            tis_unit,
            rep_offsets,
            rep_names_by_root: a.rep_names,
            alias_offsets: a.alias_offsets,
            alias_names: a.alias_names,
            meta: a.meta,
        })
    }
}

/// Serialize `index` as a `StoredIndex::Current` CBOR archive.
pub fn save_index<W: Write>(index: &TensionIndex, writer: &mut W) -> Result<()> {
    let stored = StoredIndex::Current(index.to_current_archive());
    ciborium::into_writer(&stored, writer)
        .map_err(|e| TensionError::InvalidIndex(format!("failed to write index: {e}")))
}

/// Deserialize a [`TensionIndex`] from any of the three schema variants,
/// logging a warning when a legacy shape is used.
pub fn load_index<R: Read>(reader: &mut R) -> Result<TensionIndex> {
    let stored: StoredIndex = ciborium::from_reader(reader)
        .map_err(|e| TensionError::InvalidIndex(format!("failed to read index: {e}")))?;
    match stored {
        StoredIndex::Current(a) => TensionIndex::from_current_archive(a),
        StoredIndex::LegacyFlatRows(a) => {
            log::warn!("loaded index using legacy flat-rows schema");
            TensionIndex::from_legacy_flat_rows(a)
        }
        StoredIndex::EarlyDeduped(a) => {
            log::warn!("loaded index using early-deduped schema (no per-root rep table)");
            TensionIndex::from_early_deduped(a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_corpus() -> BTreeMap<String, [u8; CHROMA_LEN]> {
        let mut c = BTreeMap::new();
        let mut bits = |pcs: &[usize]| {
            let mut b = [0u8; CHROMA_LEN];
            for &pc in pcs {
                b[pc] = 1;
            }
            b
        };
        c.insert("C".to_string(), bits(&[0, 4, 7]));
        c.insert("G".to_string(), bits(&[7, 11, 2]));
        c.insert("Am".to_string(), bits(&[9, 0, 4]));
        c
    }

    #[test]
    fn roundtrips_through_cbor() {
        let index = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        let mut buf = Vec::new();
        save_index(&index, &mut buf).unwrap();
        let loaded = load_index(&mut buf.as_slice()).unwrap();

        assert_eq!(index.rep_names, loaded.rep_names);
        assert_eq!(index.chroma_mask, loaded.chroma_mask);
        for row in 0..index.len() {
            for k in 0..TIS_DIM {
                let a = index.tis[[row, k]];
                let b = loaded.tis[[row, k]];
                assert!((a - b).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn legacy_flat_rows_synthesizes_identity_offsets() {
        let index = TensionIndex::build(&sample_corpus(), "test.json").unwrap();
        let (tis_re, tis_im) = complex_to_parts(&index.tis);
        let (tis_unit_re, tis_unit_im) = complex_to_parts(&index.tis_unit);
        let legacy = StoredIndex::LegacyFlatRows(LegacyFlatRowsArchive {
            names: index.rep_names.clone(),
            chroma_bits: index.chroma_bits.iter().map(|b| b.to_vec()).collect(),
            chroma_mask: index.chroma_mask.clone(),
            tis_re,
            tis_im,
            tis_norm: index.tis_norm.clone(),
            tis_unit_re,
            tis_unit_im,
            meta: index.meta.clone(),
        });
        let mut buf = Vec::new();
        ciborium::into_writer(&legacy, &mut buf).unwrap();
        let loaded = load_index(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.rep_offsets, vec![0, 1, 2, 3]);
        assert_eq!(loaded.alias_offsets, vec![0, 1, 2, 3]);
    }
}
