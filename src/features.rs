//! The six tension indicators (§4.4), computed in one pass over every
//! index row.

use std::collections::BTreeMap;

use crate::error::{Result, TensionError};
use crate::hierarchy::hierarchical_tension;
use crate::index::TensionIndex;
use crate::key::Function;
use crate::tis::{angle, euclidean_distance, row_as_vector, tis_norm, TisVector};
use crate::voice_leading::voice_leading_tension;

/// One array per indicator, each of length `index.len()` — the "dict of
/// indicator arrays" from §9 flattened into a fixed-schema struct.
#[derive(Debug, Clone)]
pub struct IndicatorArrays {
    pub d1: Vec<f64>,
    pub d2: Vec<f64>,
    pub d3: Vec<f64>,
    pub c: Vec<f64>,
    pub m: Vec<f64>,
    pub h: Vec<f64>,
}

impl IndicatorArrays {
    /// Iterate the six `(name, &[f64])` pairs in the canonical order
    /// `d1, d2, d3, c, m, h`.
    pub fn named(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("d1", &self.d1),
            ("d2", &self.d2),
            ("d3", &self.d3),
            ("c", &self.c),
            ("m", &self.m),
            ("h", &self.h),
        ]
    }
}

/// Offset-from-key prototypes, shared by the d3 step and the
/// progression classification feeding the hierarchical reducer.
fn offset_prototypes(
    key_tis: &TisVector,
    prototypes: &[(Function, TisVector); 3],
) -> [(Function, TisVector); 3] {
    let mut out = *prototypes;
    for (_, proto) in out.iter_mut() {
        for k in 0..proto.len() {
            proto[k] -= key_tis[k];
        }
    }
    out
}

/// d3 (§4.4) and the row's nearest function label, computed together
/// since both come from the same min-angle scan over prototype offsets.
/// `d3 = 0` and `Function::Tonic` when the candidate's TIS equals the
/// key's TIS (the offset direction is undefined).
fn classify(tis: &TisVector, key_tis: &TisVector, offset_protos: &[(Function, TisVector); 3]) -> (f64, Function) {
    let offset_norm = euclidean_distance(tis, key_tis);
    if offset_norm == 0.0 {
        return (0.0, Function::Tonic);
    }
    let mut offset = *tis;
    for k in 0..offset.len() {
        offset[k] = (tis[k] - key_tis[k]) / offset_norm;
    }
    let (function, d3) = offset_protos
        .iter()
        .map(|(func, proto_offset)| (*func, angle(&offset, proto_offset)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("prototypes is non-empty");
    (d3, function)
}

/// One progression chord's TIS, resolved function label, and `d2`,
/// feeding the hierarchical reducer (§4.7).
struct ProgressionStep {
    tis: TisVector,
    function: Function,
    d2: f64,
}

fn resolve_step(
    index: &TensionIndex,
    name_to_row: &BTreeMap<String, usize>,
    name: &str,
    key_tis: &TisVector,
    offset_protos: &[(Function, TisVector); 3],
) -> Result<ProgressionStep> {
    let row = *name_to_row
        .get(name)
        .ok_or_else(|| TensionError::InvalidProgressionChord(name.to_string()))?;
    let tis = row_as_vector(&index.tis, row);
    let d2 = angle(&tis, key_tis);
    let (_, function) = classify(&tis, key_tis, offset_protos);
    Ok(ProgressionStep { tis, function, d2 })
}

/// Compute all six indicators for every row of `index`, given the
/// previous chord's row, the key's TIS and function prototypes, and an
/// optional progression (ending in the previous chord) feeding the
/// hierarchical indicator.
pub fn compute_indicators(
    index: &TensionIndex,
    prev_row: usize,
    key_tis: &TisVector,
    prototypes: &[(Function, TisVector); 3],
    progression_names: &[String],
    name_to_row: &BTreeMap<String, usize>,
    addition_penalty: f64,
) -> Result<IndicatorArrays> {
    let m_rows = index.len();
    let prev_tis = row_as_vector(&index.tis, prev_row);
    let offset_protos = offset_prototypes(key_tis, prototypes);

    let mut progression_steps = Vec::with_capacity(progression_names.len());
    for name in progression_names {
        progression_steps.push(resolve_step(index, name_to_row, name, key_tis, &offset_protos)?);
    }

    let mut d1 = Vec::with_capacity(m_rows);
    let mut d2 = Vec::with_capacity(m_rows);
    let mut d3 = Vec::with_capacity(m_rows);
    let mut c = Vec::with_capacity(m_rows);
    let mut m = Vec::with_capacity(m_rows);
    let mut h = Vec::with_capacity(m_rows);

    for row in 0..m_rows {
        let tis_i = row_as_vector(&index.tis, row);
        let unit_i = row_as_vector(&index.tis_unit, row);

        d1.push(euclidean_distance(&tis_i, &prev_tis));
        d2.push(angle(&unit_i, key_tis));

        let (d3_i, candidate_function) = classify(&tis_i, key_tis, &offset_protos);
        d3.push(d3_i);

        c.push(-tis_norm(&tis_i));

        let m_i = if row == prev_row {
            0.0
        } else {
            voice_leading_tension(&index.chroma_bits[prev_row], &index.chroma_bits[row], addition_penalty)
        };
        m.push(m_i);

        let h_i = if progression_steps.len() <= 1 {
            0.0
        } else {
            let mut tis_seq: Vec<TisVector> = progression_steps.iter().map(|s| s.tis).collect();
            let mut function_seq: Vec<Function> = progression_steps.iter().map(|s| s.function).collect();
            let mut d2_seq: Vec<f64> = progression_steps.iter().map(|s| s.d2).collect();
            tis_seq.push(tis_i);
            function_seq.push(candidate_function);
            d2_seq.push(d2[row]);
            hierarchical_tension(&tis_seq, &function_seq, &d2_seq)
        };
        h.push(h_i);
    }

    Ok(IndicatorArrays { d1, d2, d3, c, m, h })
}
