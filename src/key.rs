//! Key parsing and tonic/subdominant/dominant function prototypes (§4.5).

use std::collections::BTreeMap;

use crate::chroma::CHROMA_LEN;
use crate::error::{Result, TensionError};
use crate::tis::{chroma_bits_to_tis, TisVector, DEFAULT_WEIGHTS};

/// Major-mode diatonic degrees (semitone offsets from the tonic).
const MAJOR_INTERVALS: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Natural-minor-mode diatonic degrees.
const MINOR_INTERVALS: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

fn pitch_class_table() -> BTreeMap<&'static str, usize> {
    [
        ("C", 0),
        ("C#", 1),
        ("Db", 1),
        ("D", 2),
        ("D#", 3),
        ("Eb", 3),
        ("E", 4),
        ("Fb", 4),
        ("E#", 5),
        ("F", 5),
        ("F#", 6),
        ("Gb", 6),
        ("G", 7),
        ("G#", 8),
        ("Ab", 8),
        ("A", 9),
        ("A#", 10),
        ("Bb", 10),
        ("B", 11),
        ("Cb", 11),
        ("B#", 0),
    ]
    .into_iter()
    .collect()
}

fn root_to_pc(root: &str) -> Result<usize> {
    pitch_class_table()
        .get(root)
        .copied()
        .ok_or_else(|| TensionError::InvalidKey(root.to_string()))
}

/// Parse `"<root> (major|maj|minor|min)"`, a `maj`/`min` suffix, a
/// trailing lowercase `m`, or a bare root (defaulting to major).
pub fn parse_key(s: &str) -> Result<(String, Mode)> {
    let trimmed = s.trim();
    let table = pitch_class_table();

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 2 {
        let (root, mode_str) = (parts[0], parts[1].to_lowercase());
        if table.contains_key(root) {
            if mode_str == "major" || mode_str == "maj" {
                return Ok((root.to_string(), Mode::Major));
            }
            if mode_str == "minor" || mode_str == "min" {
                return Ok((root.to_string(), Mode::Minor));
            }
        }
    }

    for (suffix, mode) in [("min", Mode::Minor), ("maj", Mode::Major)] {
        if trimmed.to_lowercase().ends_with(suffix) && trimmed.len() > suffix.len() {
            let root = &trimmed[..trimmed.len() - suffix.len()];
            if table.contains_key(root) {
                return Ok((root.to_string(), mode));
            }
        }
    }

    if trimmed.ends_with('m') && trimmed.len() >= 2 {
        let root = &trimmed[..trimmed.len() - 1];
        if table.contains_key(root) {
            return Ok((root.to_string(), Mode::Minor));
        }
    }

    if table.contains_key(trimmed) {
        return Ok((trimmed.to_string(), Mode::Major));
    }

    Err(TensionError::InvalidKey(s.to_string()))
}

/// Diatonic scale chroma for a key, rotated by the root's pitch class.
pub fn key_chroma(root: &str, mode: Mode) -> Result<[u8; CHROMA_LEN]> {
    let pc = root_to_pc(root)?;
    let intervals = match mode {
        Mode::Major => &MAJOR_INTERVALS[..],
        Mode::Minor => &MINOR_INTERVALS[..],
    };
    let mut bits = [0u8; CHROMA_LEN];
    for &iv in intervals {
        bits[(pc + iv) % CHROMA_LEN] = 1;
    }
    Ok(bits)
}

pub fn key_tis(root: &str, mode: Mode) -> Result<TisVector> {
    let bits = key_chroma(root, mode)?;
    chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriadQuality {
    Major,
    Minor,
    Diminished,
}

fn triad_intervals(quality: TriadQuality) -> [usize; 3] {
    match quality {
        TriadQuality::Major => [0, 4, 7],
        TriadQuality::Minor => [0, 3, 7],
        TriadQuality::Diminished => [0, 3, 6],
    }
}

fn triad_chroma(root_pc: usize, quality: TriadQuality) -> [u8; CHROMA_LEN] {
    let mut bits = [0u8; CHROMA_LEN];
    for iv in triad_intervals(quality) {
        bits[(root_pc + iv) % CHROMA_LEN] = 1;
    }
    bits
}

/// Diatonic triad quality per scale degree offset, major mode.
fn major_triad_map() -> BTreeMap<usize, TriadQuality> {
    [
        (0, TriadQuality::Major),
        (2, TriadQuality::Minor),
        (4, TriadQuality::Minor),
        (5, TriadQuality::Major),
        (7, TriadQuality::Major),
        (9, TriadQuality::Minor),
        (11, TriadQuality::Diminished),
    ]
    .into_iter()
    .collect()
}

/// Diatonic triad quality per scale degree offset, natural minor mode.
fn minor_triad_map() -> BTreeMap<usize, TriadQuality> {
    [
        (0, TriadQuality::Minor),
        (2, TriadQuality::Diminished),
        (3, TriadQuality::Major),
        (5, TriadQuality::Minor),
        (7, TriadQuality::Minor),
        (8, TriadQuality::Major),
        (10, TriadQuality::Major),
    ]
    .into_iter()
    .collect()
}

/// Harmonic function label used throughout §4.4/§4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Function {
    Tonic,
    Subdominant,
    Dominant,
}

impl Function {
    /// Priority used by the hierarchical reducer's tiebreak rule
    /// (`t < s < d`).
    pub fn priority(self) -> u8 {
        match self {
            Function::Tonic => 0,
            Function::Subdominant => 1,
            Function::Dominant => 2,
        }
    }
}

/// Tonic/subdominant/dominant TIS prototypes (diatonic I/IV/V triads).
pub fn function_prototypes(root: &str, mode: Mode) -> Result<[(Function, TisVector); 3]> {
    let pc = root_to_pc(root)?;
    let triad_map = match mode {
        Mode::Major => major_triad_map(),
        Mode::Minor => minor_triad_map(),
    };

    let degrees = [
        (Function::Tonic, 0usize),
        (Function::Subdominant, 5usize),
        (Function::Dominant, 7usize),
    ];

    let mut out = [
        (Function::Tonic, [rustfft::num_complex::Complex64::new(0.0, 0.0); crate::tis::TIS_DIM]),
        (
            Function::Subdominant,
            [rustfft::num_complex::Complex64::new(0.0, 0.0); crate::tis::TIS_DIM],
        ),
        (Function::Dominant, [rustfft::num_complex::Complex64::new(0.0, 0.0); crate::tis::TIS_DIM]),
    ];

    for (i, (func, deg)) in degrees.into_iter().enumerate() {
        let triad_root = (pc + deg) % CHROMA_LEN;
        let quality = *triad_map
            .get(&deg)
            .expect("degrees 0, 5, 7 are present in both triad maps");
        let bits = triad_chroma(triad_root, quality);
        out[i] = (func, chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_bare_root_is_major() {
        assert_eq!(parse_key("C").unwrap(), ("C".to_string(), Mode::Major));
    }

    #[test]
    fn parse_key_trailing_m_is_minor() {
        assert_eq!(parse_key("Am").unwrap(), ("A".to_string(), Mode::Minor));
    }

    #[test]
    fn parse_key_two_words() {
        assert_eq!(
            parse_key("F# minor").unwrap(),
            ("F#".to_string(), Mode::Minor)
        );
    }

    #[test]
    fn parse_key_maj_suffix() {
        assert_eq!(parse_key("Dbmaj").unwrap(), ("Db".to_string(), Mode::Major));
    }

    #[test]
    fn parse_key_rejects_garbage() {
        assert!(parse_key("nonsense key").is_err());
    }

    #[test]
    fn key_chroma_c_major_is_white_keys() {
        let bits = key_chroma("C", Mode::Major).unwrap();
        assert_eq!(bits, [1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn function_prototypes_have_three_entries() {
        let protos = function_prototypes("C", Mode::Major).unwrap();
        assert_eq!(protos.len(), 3);
    }
}
