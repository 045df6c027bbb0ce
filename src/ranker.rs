//! Query entry point (§6): weight, normalize, apply a goal, and return
//! the top-K candidates with provenance.

use crate::corpus::filter_slash_suggestions;
use crate::error::{Result, TensionError};
use crate::features::{compute_indicators, IndicatorArrays};
use crate::index::TensionIndex;
use crate::key::{function_prototypes, key_tis, parse_key};
use crate::voice_leading::DEFAULT_ADDITION_PENALTY;

/// Per-indicator weights over `{d1, d2, d3, c, m, h}` (§3). Any field
/// left `None` falls back to the paper's Table-1 default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weights {
    pub d1: Option<f64>,
    pub d2: Option<f64>,
    pub d3: Option<f64>,
    pub c: Option<f64>,
    pub m: Option<f64>,
    pub h: Option<f64>,
}

impl Weights {
    /// Paper Table-1 defaults, normalized to sum to 1.
    pub fn defaults() -> [(&'static str, f64); 6] {
        [
            ("d1", 0.0),
            ("d2", 0.158),
            ("d3", 0.0),
            ("c", 0.303),
            ("m", 0.271),
            ("h", 0.318),
        ]
    }

    /// Build from an untyped `{name -> weight}` map, as when weights
    /// arrive from an external config or JSON body (§6: `weights:
    /// {d1?,d2?,d3?,c?,m?,h?}?`). Unlike the typed struct literal, this
    /// path can observe a key that isn't one of the six indicators.
    pub fn from_named_pairs<'b>(pairs: impl IntoIterator<Item = (&'b str, f64)>) -> Result<Self> {
        let mut out = Weights::default();
        for (key, value) in pairs {
            let slot = match key {
                "d1" => &mut out.d1,
                "d2" => &mut out.d2,
                "d3" => &mut out.d3,
                "c" => &mut out.c,
                "m" => &mut out.m,
                "h" => &mut out.h,
                other => return Err(TensionError::UnknownWeightKey(other.to_string())),
            };
            if value < 0.0 {
                return Err(TensionError::NegativeWeight {
                    key: key.to_string(),
                    value,
                });
            }
            *slot = Some(value);
        }
        Ok(out)
    }

    /// Merge against the default table, validating every explicit key
    /// and rejecting negative weights.
    pub fn resolve(&self) -> Result<[(&'static str, f64); 6]> {
        let overrides: [(&'static str, Option<f64>); 6] = [
            ("d1", self.d1),
            ("d2", self.d2),
            ("d3", self.d3),
            ("c", self.c),
            ("m", self.m),
            ("h", self.h),
        ];
        let mut out = Self::defaults();
        for (i, (key, value)) in overrides.into_iter().enumerate() {
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(TensionError::NegativeWeight {
                        key: key.to_string(),
                        value: v,
                    });
                }
                out[i].1 = v;
            }
        }
        Ok(out)
    }
}

/// How ranked candidates are ordered (§4.8 step 4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    Resolve,
    Build,
    Target(f64),
}

impl Goal {
    pub fn parse(s: &str) -> Self {
        match s {
            "resolve" => Goal::Resolve,
            "build" => Goal::Build,
            other => other
                .parse::<f64>()
                .map(Goal::Target)
                .unwrap_or(Goal::Resolve),
        }
    }
}

/// One ranked candidate (§4.8 step 5).
#[derive(Debug, Clone)]
pub struct SuggestionResult {
    pub row: usize,
    pub rank: usize,
    pub name: String,
    pub display_names: Vec<String>,
    pub notes: Vec<String>,
    pub d1: f64,
    pub d2: f64,
    pub d3: f64,
    pub c: f64,
    pub m: f64,
    pub h: f64,
    pub tension: f64,
}

/// Full query parameter set (§6's Query API).
pub struct SuggestOptions<'a> {
    pub chord: Option<&'a str>,
    pub progression: Option<&'a [String]>,
    pub key: &'a str,
    pub top: usize,
    pub goal: &'a str,
    pub weights: Weights,
    pub normalize: bool,
    pub voice_leading_addition_penalty: f64,
    pub flats: bool,
    pub include_aliases: bool,
}

impl<'a> Default for SuggestOptions<'a> {
    fn default() -> Self {
        SuggestOptions {
            chord: None,
            progression: None,
            key: "C",
            top: 10,
            goal: "resolve",
            weights: Weights::default(),
            normalize: true,
            voice_leading_addition_penalty: DEFAULT_ADDITION_PENALTY,
            flats: false,
            include_aliases: false,
        }
    }
}

/// `suggest_chords` (§6): the single query entry point.
pub fn suggest_chords(index: &TensionIndex, opts: &SuggestOptions) -> Result<Vec<SuggestionResult>> {
    if opts.top == 0 {
        return Ok(Vec::new());
    }

    let progression = opts.progression.unwrap_or(&[]);
    let chord_name = match (opts.chord, progression.last()) {
        (Some(c), _) => c.to_string(),
        (None, Some(last)) => last.clone(),
        (None, None) => return Err(TensionError::MissingChord),
    };

    if let Some(last) = progression.last() {
        if *last != chord_name {
            return Err(TensionError::ProgressionMismatch);
        }
    }

    let name_to_row = index.build_name_to_row();
    let prev_row = *name_to_row
        .get(&chord_name)
        .ok_or_else(|| TensionError::InvalidChord(chord_name.clone()))?;

    let (key_root, mode) = parse_key(opts.key)?;
    let key_tis_v = key_tis(&key_root, mode)?;
    let prototypes = function_prototypes(&key_root, mode)?;

    let indicators = compute_indicators(
        index,
        prev_row,
        &key_tis_v,
        &prototypes,
        progression,
        &name_to_row,
        opts.voice_leading_addition_penalty,
    )?;

    let weights = opts.weights.resolve()?;
    let tension = accumulate_tension(&indicators, &weights, opts.normalize, prev_row);

    let goal = Goal::parse(opts.goal);
    let mut order: Vec<usize> = (0..index.len()).filter(|&row| row != prev_row).collect();
    sort_by_goal(&mut order, &tension, goal);

    let top = opts.top.min(order.len());
    let mut results = Vec::with_capacity(top);
    for (rank, &row) in order.iter().take(top).enumerate() {
        let display_names = display_names_for(index, row, opts.include_aliases);
        let notes = crate::chroma::chroma_bits_to_notes(&index.chroma_bits[row], opts.flats)?
            .into_iter()
            .map(str::to_string)
            .collect();
        results.push(SuggestionResult {
            row,
            rank: rank + 1,
            name: display_names
                .first()
                .cloned()
                .unwrap_or_else(|| index.rep_names[row].clone()),
            display_names,
            notes,
            d1: indicators.d1[row],
            d2: indicators.d2[row],
            d3: indicators.d3[row],
            c: indicators.c[row],
            m: indicators.m[row],
            h: indicators.h[row],
            tension: tension[row],
        });
    }
    Ok(results)
}

fn display_names_for(index: &TensionIndex, row: usize, include_aliases: bool) -> Vec<String> {
    if include_aliases {
        return index.aliases_for_row(row).to_vec();
    }
    let reps = index.reps_for_row(row);
    let filtered = filter_slash_suggestions(reps);
    if filtered.is_empty() {
        vec![index.rep_names[row].clone()]
    } else {
        filtered
    }
}

/// Min-max normalize `values` over its non-NaN entries to `[0, 1]`
/// (zero if the span is zero or every value is NaN).
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        if !v.is_nan() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    let span = hi - lo;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() || !span.is_finite() || span == 0.0 {
                0.0
            } else {
                (v - lo) / span
            }
        })
        .collect()
}

fn accumulate_tension(indicators: &IndicatorArrays, weights: &[(&str, f64)], normalize: bool, prev_row: usize) -> Vec<f64> {
    let n = indicators.d1.len();
    let mut tension = vec![0.0; n];
    for &(name, weight) in weights {
        if weight <= 0.0 {
            continue;
        }
        let raw = indicators
            .named()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, arr)| *arr)
            .expect("weight key matches a known indicator");

        let mut masked = raw.to_vec();
        masked[prev_row] = f64::NAN;

        let contribution = if normalize {
            min_max_normalize(&masked)
        } else {
            masked
        };
        for (row, value) in contribution.into_iter().enumerate() {
            if !value.is_nan() {
                tension[row] += weight * value;
            }
        }
    }
    tension
}

/// Sort `order` by `tension` per the goal, ties broken by ascending row
/// index, NaN substituted with `+inf` only at the comparator boundary.
fn sort_by_goal(order: &mut [usize], tension: &[f64], goal: Goal) {
    let sort_key = |row: usize| -> f64 {
        let t = tension[row];
        match goal {
            Goal::Resolve => if t.is_nan() { f64::INFINITY } else { t },
            Goal::Build => if t.is_nan() { f64::NEG_INFINITY } else { -t },
            Goal::Target(target) => {
                let d = (t - target).abs();
                if d.is_nan() {
                    f64::INFINITY
                } else {
                    d
                }
            }
        }
    };
    order.sort_by(|&a, &b| {
        sort_key(a)
            .total_cmp(&sort_key(b))
            .then_with(|| a.cmp(&b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::CHROMA_LEN;
    use std::collections::BTreeMap;

    #[test]
    fn weights_from_named_pairs_rejects_unknown_key() {
        assert!(matches!(
            Weights::from_named_pairs([("d2", 0.5), ("bogus", 0.1)]),
            Err(TensionError::UnknownWeightKey(k)) if k == "bogus"
        ));
    }

    #[test]
    fn weights_from_named_pairs_rejects_negative_weight() {
        assert!(matches!(
            Weights::from_named_pairs([("m", -0.1)]),
            Err(TensionError::NegativeWeight { .. })
        ));
    }

    #[test]
    fn weights_from_named_pairs_merges_with_defaults() {
        let w = Weights::from_named_pairs([("c", 0.9)]).unwrap();
        assert_eq!(w.c, Some(0.9));
        assert_eq!(w.d2, None);
        assert_eq!(w.resolve().unwrap()[1], ("d2", 0.158));
    }

    fn corpus() -> BTreeMap<String, [u8; CHROMA_LEN]> {
        let mut c = BTreeMap::new();
        let mut bits = |pcs: &[usize]| {
            let mut b = [0u8; CHROMA_LEN];
            for &pc in pcs {
                b[pc] = 1;
            }
            b
        };
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

    #[test]
    fn ranking_excludes_the_previous_chord() {
        let index = TensionIndex::build(&corpus(), "test").unwrap();
        let opts = SuggestOptions {
            chord: Some("C"),
            key: "C",
            goal: "build",
            top: 7,
            ..Default::default()
        };
        let results = suggest_chords(&index, &opts).unwrap();
        assert!(results.iter().all(|r| r.name != "C"));
    }

    #[test]
    fn goal_inversion_flips_the_ranking() {
        let index = TensionIndex::build(&corpus(), "test").unwrap();
        let resolve_opts = SuggestOptions {
            chord: Some("G7"),
            key: "C",
            goal: "resolve",
            top: 100,
            ..Default::default()
        };
        let build_opts = SuggestOptions {
            chord: Some("G7"),
            key: "C",
            goal: "build",
            top: 100,
            ..Default::default()
        };
        let resolve = suggest_chords(&index, &resolve_opts).unwrap();
        let build = suggest_chords(&index, &build_opts).unwrap();
        assert_eq!(resolve.first().unwrap().row, build.last().unwrap().row);
    }

    #[test]
    fn missing_chord_is_an_error() {
        let index = TensionIndex::build(&corpus(), "test").unwrap();
        let opts = SuggestOptions {
            key: "C",
            ..Default::default()
        };
        assert!(matches!(
            suggest_chords(&index, &opts),
            Err(TensionError::MissingChord)
        ));
    }

    #[test]
    fn progression_not_ending_in_chord_is_rejected() {
        let index = TensionIndex::build(&corpus(), "test").unwrap();
        let progression = vec!["Am".to_string(), "Dm".to_string()];
        let opts = SuggestOptions {
            chord: Some("G7"),
            progression: Some(&progression),
            key: "C",
            ..Default::default()
        };
        assert!(matches!(
            suggest_chords(&index, &opts),
            Err(TensionError::ProgressionMismatch)
        ));
    }

    #[test]
    fn target_goal_sorts_by_absolute_deviation() {
        let index = TensionIndex::build(&corpus(), "test").unwrap();
        let opts = SuggestOptions {
            chord: Some("Dm"),
            key: "C",
            goal: "0.5",
            top: 7,
            ..Default::default()
        };
        let results = suggest_chords(&index, &opts).unwrap();
        for w in results.windows(2) {
            let d0 = (w[0].tension - 0.5).abs();
            let d1 = (w[1].tension - 0.5).abs();
            assert!(d0 <= d1 + 1e-9);
        }
    }
}
