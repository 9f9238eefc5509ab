//! Glyph-table hygiene between an external glyph source and the working
//! representation: duplicate merging, bounding-box cropping, and the seed
//! dictionary an optimizer run starts from.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};

use crate::datafile::{DataFile, DictEntry, FontInfo, GlyphEntry};
use crate::optimize::{random_substring, Rnd};
use crate::pixels::PixelString;
use crate::DICT_SIZE;

/// Merge glyphs with identical pixels and advance width, unioning their
/// character sets.
pub fn eliminate_duplicates(glyphs: &mut Vec<GlyphEntry>) {
  let mut i = 0;
  while i < glyphs.len() {
    let mut j = i + 1;
    while j < glyphs.len() {
      if glyphs[i].data == glyphs[j].data && glyphs[i].width == glyphs[j].width {
        let mut merged = glyphs.remove(j).chars;
        glyphs[i].chars.append(&mut merged);
      } else {
        j += 1;
      }
    }
    i += 1;
  }
}

/// Crop every glyph to the union bounding box of the inked pixels,
/// shrinking the cell and shifting the baseline to match. Fonts with no
/// ink at all are left untouched.
pub fn crop_glyphs(glyphs: &mut [GlyphEntry], fontinfo: &mut FontInfo) {
  let old_w = fontinfo.max_width as usize;
  let old_h = fontinfo.max_height as usize;

  let mut left = old_w;
  let mut top = old_h;
  let mut right = 0usize;
  let mut bottom = 0usize;
  for glyph in glyphs.iter() {
    for y in 0..old_h {
      for x in 0..old_w {
        if glyph.data[y * old_w + x] != 0 {
          left = left.min(x);
          top = top.min(y);
          right = right.max(x);
          bottom = bottom.max(y);
        }
      }
    }
  }
  if left > right {
    return;
  }

  let new_w = right - left + 1;
  let new_h = bottom - top + 1;
  for glyph in glyphs.iter_mut() {
    let old = std::mem::take(&mut glyph.data);
    let mut data = PixelString::with_capacity(new_w * new_h);
    for y in 0..new_h {
      let row = (top + y) * old_w + left;
      data.extend_from_slice(&old[row..row + new_w]);
    }
    glyph.data = data;
  }

  fontinfo.max_width = new_w as u8;
  fontinfo.max_height = new_h as u8;
  fontinfo.baseline_x -= left as i8;
  fontinfo.baseline_y -= top as i8;
}

/// Samples drawn per glyph while hunting for repeated substrings.
const SAMPLES_PER_GLYPH: usize = 500;

/// Seed the dictionary with substrings that occur repeatedly across the
/// glyph table: a randomly sampled substring seen a second time is worth a
/// slot, scored by its length. Fills at most the dictionary capacity.
pub fn init_dictionary(datafile: &mut DataFile) {
  if datafile.glyph_count() == 0 {
    return;
  }
  let mut rnd = Rnd::seed_from_u64(u64::from(datafile.seed()));

  let mut seen: HashSet<PixelString> = HashSet::new();
  let mut added: HashSet<PixelString> = HashSet::new();
  let mut entries: Vec<DictEntry> = Vec::new();

  'sampling: for _ in 0..datafile.glyph_count() {
    for _ in 0..SAMPLES_PER_GLYPH {
      if entries.len() >= DICT_SIZE {
        break 'sampling;
      }
      let substring = random_substring(datafile, &mut rnd);
      if !seen.insert(substring.clone()) && !added.contains(&substring) {
        added.insert(substring.clone());
        entries.push(DictEntry { score: substring.len() as i32, ref_encode: false, replacement: substring });
      }
    }
  }

  for (slot, entry) in entries.into_iter().enumerate() {
    datafile.set_dict_entry(slot, entry);
  }
  datafile.set_seed(rnd.gen());
}
