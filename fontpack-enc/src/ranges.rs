//! Character range packing: groups the assigned character codes into dense
//! ranges for compact lookup. Codes within a range share one offsets table
//! and one glyph-data blob; codes missing from the middle of a range render
//! the fallback glyph.

use std::collections::BTreeMap;

use anyhow::bail;

use crate::datafile::DataFile;

/// Two mapped codes stay in one range only while their gap is below this.
pub const MAX_RANGE_GAP: u16 = 8;

/// A range is closed once its glyph data would grow past this (the glyph
/// offsets are 16-bit).
pub const MAX_RANGE_DATA: usize = 65_535;

/// One packed range: `glyph_indices[i]` is the glyph for `first_char + i`,
/// or `None` for gap fills that map to the fallback glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRange {
  pub first_char: u16,
  pub glyph_indices: Vec<Option<usize>>,
}

impl CharRange {
  #[inline]
  pub fn char_count(&self) -> u16 {
    self.glyph_indices.len() as u16
  }
}

/// Character → glyph-index map over the whole glyph table. A character
/// assigned to two glyphs is an inconsistent table.
pub fn char_to_glyph_map(datafile: &DataFile) -> anyhow::Result<BTreeMap<u16, usize>> {
  let mut map = BTreeMap::new();
  for (index, glyph) in datafile.glyphs().iter().enumerate() {
    for &code in &glyph.chars {
      if map.insert(code, index).is_some() {
        bail!("character {code} is assigned to more than one glyph");
      }
    }
  }
  Ok(map)
}

/// The fallback character: `default_char` if it is mapped, else the
/// replacement character, NUL, '?' or space (several BDF fonts use the
/// early ones as their missing-glyph slot), else the lowest mapped code.
pub fn select_fallback_char(map: &BTreeMap<u16, usize>, default_char: u16) -> Option<u16> {
  for candidate in [default_char, 0xFFFD, 0, '?' as u16, ' ' as u16] {
    if map.contains_key(&candidate) {
      return Some(candidate);
    }
  }
  map.keys().next().copied()
}

/// Split the sorted character set into ranges. `glyph_size` reports the
/// encoded byte cost of one glyph including its width byte; the fallback
/// glyph is charged to a range once, when its first gap appears.
pub fn compute_char_ranges(
  datafile: &DataFile,
  glyph_size: impl Fn(usize) -> usize,
  fallback_index: usize,
) -> anyhow::Result<Vec<CharRange>> {
  let map = char_to_glyph_map(datafile)?;
  let fallback_size = glyph_size(fallback_index);

  let mut ranges: Vec<CharRange> = Vec::new();
  let mut last_char = 0u16;
  let mut bytes = 0usize;
  let mut has_gap = false;

  for (&code, &index) in &map {
    let size = glyph_size(index);

    if let Some(current) = ranges.last_mut() {
      let gap = code - last_char;
      let gap_cost = if gap > 1 && !has_gap { fallback_size } else { 0 };
      if gap < MAX_RANGE_GAP && bytes + size + gap_cost <= MAX_RANGE_DATA {
        for _ in last_char + 1..code {
          current.glyph_indices.push(None);
        }
        current.glyph_indices.push(Some(index));
        last_char = code;
        bytes += size + gap_cost;
        has_gap |= gap > 1;
        continue;
      }
    }

    ranges.push(CharRange { first_char: code, glyph_indices: vec![Some(index)] });
    last_char = code;
    bytes = size;
    has_gap = false;
  }

  Ok(ranges)
}
