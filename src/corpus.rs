//! Corpus ingestion and representative-name selection (§4.2).
//!
//! Chord-name parsing here is deliberately minimal — only root-pitch-class
//! extraction, as specified — full chord-name parsing from note lists is an
//! external music-theory-library concern (§1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chroma::{bits_to_mask, validate_chroma, CHROMA_LEN};
use crate::error::Result;

/// Extract the root pitch-class letter (plus accidental) from a chord
/// name: an initial `[A-G]` followed by an optional `#`/`b`. Returns an
/// empty string if the name doesn't start with a valid root letter.
pub fn chord_root(name: &str) -> String {
    let mut chars = name.chars();
    let Some(c0) = chars.next() else {
        return String::new();
    };
    let c0 = c0.to_ascii_uppercase();
    if !('A'..='G').contains(&c0) {
        return String::new();
    }
    match chars.next() {
        Some(c1) if c1 == '#' || c1 == 'b' => format!("{c0}{c1}"),
        _ => c0.to_string(),
    }
}

fn has_slash(name: &str) -> bool {
    name.contains('/')
}

/// `(has_slash, length, name)` lexicographic key used for primary
/// representative selection: prefers non-slash, then shortest, then
/// alphabetical.
fn pref_key(name: &str) -> (u8, usize, &str) {
    (has_slash(name) as u8, name.chars().count(), name)
}

/// Pick a stable, human-friendly representative from a set of aliases
/// sharing the same chroma mask.
pub fn choose_representative(names: &[String]) -> Option<&String> {
    names.iter().min_by_key(|n| pref_key(n))
}

/// Prefer a name without `/`; if all have one, return the shortest
/// (lexicographic tiebreak).
pub fn choose_shortest_no_slash(names: &[String]) -> Option<&String> {
    let no_slash: Vec<&String> = names.iter().filter(|n| !has_slash(n)).collect();
    let pool: Vec<&String> = if no_slash.is_empty() {
        names.iter().collect()
    } else {
        no_slash
    };
    pool.into_iter()
        .min_by_key(|n| (n.chars().count(), n.as_str()))
}

/// One canonical name per root pitch class present among `names`.
pub fn choose_representatives_by_root(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return Vec::new();
    }
    let mut by_root: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in names {
        let root = chord_root(name);
        if root.is_empty() {
            continue;
        }
        by_root.entry(root).or_default().push(name.clone());
    }

    let mut reps: Vec<String> = by_root
        .values()
        .filter_map(|group| choose_shortest_no_slash(group).cloned())
        .collect();
    reps.sort_by(|a, b| pref_key(a).cmp(&pref_key(b)));
    reps
}

/// Display filter: keep only non-slash names if any exist, else return
/// the single shortest name.
pub fn filter_slash_suggestions(names: &[String]) -> Vec<String> {
    let no_slash: Vec<String> = names.iter().filter(|n| !has_slash(n)).cloned().collect();
    if !no_slash.is_empty() {
        return no_slash;
    }
    if names.is_empty() {
        return Vec::new();
    }
    let shortest = names
        .iter()
        .min_by_key(|n| (n.chars().count(), n.as_str()))
        .expect("names is non-empty");
    vec![shortest.clone()]
}

/// One row's worth of grouped corpus data, prior to the TIS transform.
pub struct CorpusGroup {
    pub mask: u16,
    pub rep_name: String,
    pub rep_bits: [u8; CHROMA_LEN],
    pub reps_by_root: Vec<String>,
    pub aliases: Vec<String>,
}

/// Group a `{name -> chroma}` corpus by mask and pick representatives,
/// emitted in ascending mask order (§4.2 steps 2-5).
pub fn build_corpus_groups(chords: &BTreeMap<String, [u8; CHROMA_LEN]>) -> Result<Vec<CorpusGroup>> {
    let mut by_mask: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for (name, bits) in chords {
        validate_chroma(bits)?;
        let mask = bits_to_mask(bits)?;
        by_mask.entry(mask).or_default().push(name.clone());
    }

    let mut groups = Vec::with_capacity(by_mask.len());
    for (mask, mut aliases) in by_mask {
        aliases.sort();
        let reps_by_root = choose_representatives_by_root(&aliases);
        let rep_name = if !reps_by_root.is_empty() {
            choose_representative(&reps_by_root).cloned()
        } else {
            choose_representative(&aliases).cloned()
        }
        .expect("aliases is non-empty for a populated mask group");
        let rep_bits = *chords
            .get(&rep_name)
            .expect("representative name was drawn from this corpus's keys");

        groups.push(CorpusGroup {
            mask,
            rep_name,
            rep_bits,
            reps_by_root: if reps_by_root.is_empty() {
                vec![rep_name.clone()]
            } else {
                reps_by_root
            },
            aliases,
        });
    }
    Ok(groups)
}

/// One entry of the human-editable JSON corpus format (§4.1/§6):
/// `{ "chroma_binary": [12 x 0/1] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub chroma_binary: Vec<u8>,
}

/// Top-level JSON corpus shape: `{ChordName -> [CorpusEntry; 1]}`.
pub type CorpusJson = BTreeMap<String, Vec<CorpusEntry>>;

/// Parse the JSON corpus format into a validated `{name -> bits}` map.
pub fn load_corpus_json(json: &str) -> Result<BTreeMap<String, [u8; CHROMA_LEN]>> {
    let raw: CorpusJson = serde_json::from_str(json).map_err(|e| {
        crate::error::TensionError::InvalidIndex(format!("invalid corpus JSON: {e}"))
    })?;

    let mut out = BTreeMap::new();
    for (name, entries) in raw {
        if entries.len() != 1 {
            return Err(crate::error::TensionError::InvalidIndex(format!(
                "chord {name:?} must map to a one-element list, got {}",
                entries.len()
            )));
        }
        let bits_vec = &entries[0].chroma_binary;
        validate_chroma(bits_vec)?;
        let mut bits = [0u8; CHROMA_LEN];
        bits.copy_from_slice(bits_vec);
        out.insert(name, bits);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_for(pcs: &[usize]) -> [u8; CHROMA_LEN] {
        let mut bits = [0u8; CHROMA_LEN];
        for &pc in pcs {
            bits[pc] = 1;
        }
        bits
    }

    #[test]
    fn chord_root_extracts_letter_and_accidental() {
        assert_eq!(chord_root("C#maj7"), "C#");
        assert_eq!(chord_root("A#7#9"), "A#");
        assert_eq!(chord_root("C/E"), "C");
        assert_eq!(chord_root("Bb"), "Bb");
        assert_eq!(chord_root(""), "");
        assert_eq!(chord_root("Hmaj"), "");
    }

    #[test]
    fn filter_slash_suggestions_prefers_non_slash() {
        let names = vec!["C/E".to_string(), "C".to_string()];
        assert_eq!(filter_slash_suggestions(&names), vec!["C".to_string()]);
    }

    #[test]
    fn filter_slash_suggestions_falls_back_to_shortest_when_all_slashed() {
        let names = vec!["C/Edim".to_string(), "C/E".to_string()];
        assert_eq!(filter_slash_suggestions(&names), vec!["C/E".to_string()]);
    }

    #[test]
    fn build_corpus_groups_dedupes_by_mask() {
        let mut corpus = BTreeMap::new();
        corpus.insert("C".to_string(), bits_for(&[0, 4, 7]));
        corpus.insert("Cmaj".to_string(), bits_for(&[0, 4, 7]));
        corpus.insert("Dm".to_string(), bits_for(&[2, 5, 9]));

        let groups = build_corpus_groups(&corpus).unwrap();
        assert_eq!(groups.len(), 2);
        let c_group = groups.iter().find(|g| g.aliases.len() == 2).unwrap();
        assert_eq!(c_group.rep_name, "C");
    }

    #[test]
    fn representative_selection_is_deterministic() {
        let mut corpus = BTreeMap::new();
        corpus.insert("C".to_string(), bits_for(&[0, 4, 7]));
        corpus.insert("Cmaj".to_string(), bits_for(&[0, 4, 7]));
        let g1 = build_corpus_groups(&corpus).unwrap();
        let g2 = build_corpus_groups(&corpus).unwrap();
        assert_eq!(g1[0].rep_name, g2[0].rep_name);
    }
}
