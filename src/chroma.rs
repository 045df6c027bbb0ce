//! Chroma primitives: bit/mask/note-name conversions over the canonical
//! pitch-class order `[C, C#, D, D#, E, F, F#, G, G#, A, A#, B]`.

use crate::error::{Result, TensionError};

/// Number of pitch classes in a chroma vector.
pub const CHROMA_LEN: usize = 12;

/// Canonical 0/1 chroma vector. Index `i` holds pitch class `i`.
pub type ChromaBits = [u8; CHROMA_LEN];

const NOTE_NAMES_SHARP: [&str; CHROMA_LEN] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];
const NOTE_NAMES_FLAT: [&str; CHROMA_LEN] = [
    "c", "db", "d", "eb", "e", "f", "gb", "g", "ab", "a", "bb", "b",
];

/// Validate and pack a 12-element 0/1 slice into a 12-bit mask (LSB = C).
pub fn bits_to_mask(bits: &[u8]) -> Result<u16> {
    if bits.len() != CHROMA_LEN {
        return Err(TensionError::InvalidChromaLength {
            expected: CHROMA_LEN,
            got: bits.len(),
        });
    }
    let mut mask: u16 = 0;
    for (i, &bit) in bits.iter().enumerate() {
        if bit > 1 {
            return Err(TensionError::InvalidChromaBit {
                index: i,
                value: bit as i64,
            });
        }
        if bit == 1 {
            mask |= 1 << i;
        }
    }
    Ok(mask)
}

/// Inverse of [`bits_to_mask`].
pub fn mask_to_bits(mask: u16) -> Result<ChromaBits> {
    if mask as u32 >= (1 << CHROMA_LEN) {
        return Err(TensionError::InvalidIndex(format!(
            "mask must be in [0, {}); got {mask}",
            1 << CHROMA_LEN
        )));
    }
    let mut bits = [0u8; CHROMA_LEN];
    for (i, slot) in bits.iter_mut().enumerate() {
        *slot = ((mask >> i) & 1) as u8;
    }
    Ok(bits)
}

/// Reject an all-zero chroma (required to be non-zero for storage/queries).
pub fn require_nonzero(bits: &[u8]) -> Result<()> {
    if bits.iter().all(|&b| b == 0) {
        return Err(TensionError::EmptyChroma);
    }
    Ok(())
}

/// Validate a chroma slice: correct length, 0/1 values, at least one active bit.
pub fn validate_chroma(bits: &[u8]) -> Result<()> {
    bits_to_mask(bits)?;
    require_nonzero(bits)
}

/// Lowercase note names for each active bit, in bit order.
pub fn chroma_bits_to_notes(bits: &[u8], flats: bool) -> Result<Vec<&'static str>> {
    if bits.len() != CHROMA_LEN {
        return Err(TensionError::InvalidChromaLength {
            expected: CHROMA_LEN,
            got: bits.len(),
        });
    }
    let names = if flats {
        &NOTE_NAMES_FLAT
    } else {
        &NOTE_NAMES_SHARP
    };
    Ok(bits
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == 1)
        .map(|(i, _)| names[i])
        .collect())
}

/// Parse a chroma vector from one of the three accepted surface forms:
/// a 12-char `0/1` string, a comma-separated `0/1` list, or a JSON array
/// of 12 integers.
pub fn parse_chroma(text: &str) -> Result<ChromaBits> {
    let s = text.trim();

    if s.len() == CHROMA_LEN && s.chars().all(|c| c == '0' || c == '1') {
        let mut bits = [0u8; CHROMA_LEN];
        for (i, c) in s.chars().enumerate() {
            bits[i] = if c == '1' { 1 } else { 0 };
        }
        return Ok(bits);
    }

    if s.contains(',') && s.chars().all(|c| matches!(c, '0' | '1' | ',' | ' ' | '\t')) {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != CHROMA_LEN {
            return Err(TensionError::InvalidChromaText(format!(
                "expected {CHROMA_LEN} comma-separated bits, got {}",
                parts.len()
            )));
        }
        let mut bits = [0u8; CHROMA_LEN];
        for (i, part) in parts.iter().enumerate() {
            bits[i] = part.parse::<u8>().map_err(|_| {
                TensionError::InvalidChromaText(
                    "comma-separated chroma must contain only 0/1".to_string(),
                )
            })?;
        }
        bits_to_mask(&bits)?;
        return Ok(bits);
    }

    if s.starts_with('[') {
        let value: Vec<i64> = serde_json::from_str(s)
            .map_err(|e| TensionError::InvalidChromaText(format!("invalid JSON array: {e}")))?;
        if value.len() != CHROMA_LEN {
            return Err(TensionError::InvalidChromaLength {
                expected: CHROMA_LEN,
                got: value.len(),
            });
        }
        let mut bits = [0u8; CHROMA_LEN];
        for (i, v) in value.into_iter().enumerate() {
            if !(0..=1).contains(&v) {
                return Err(TensionError::InvalidChromaBit { index: i, value: v });
            }
            bits[i] = v as u8;
        }
        return Ok(bits);
    }

    Err(TensionError::InvalidChromaText(
        "unrecognized chroma format; provide 12 bits like '100010010000', \
         '1,0,0,0,1,0,0,1,0,0,0,0', or a JSON array"
            .to_string(),
    ))
}
