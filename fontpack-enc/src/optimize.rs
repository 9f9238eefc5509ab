//! Iterative dictionary search. The glyph table and metadata stay fixed;
//! dictionary entries are rescored against their realized savings and the
//! worst slots are replaced by random proposals, keeping only changes that
//! strictly shrink the encoded size. Deterministic given the DataFile's
//! persisted seed.

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::datafile::{DataFile, DictEntry};
use crate::encode::{encode_font, encoded_size_of, sorted_indices};
use crate::pixels::PixelString;
use crate::DICT_START;

pub(crate) type Rnd = ChaCha8Rng;

/// Longest substring proposal, in pixels.
const MAX_SUBSTRING: usize = 32;

/// Random substring of a random glyph, length 2..=MAX_SUBSTRING where the
/// glyph allows.
pub(crate) fn random_substring(datafile: &DataFile, rnd: &mut Rnd) -> PixelString {
  let pixels = &datafile.glyph(rnd.gen_range(0..datafile.glyph_count())).data;
  let length = rnd.gen_range(2..=MAX_SUBSTRING).min(pixels.len());
  let start = rnd.gen_range(0..=pixels.len() - length);
  pixels[start..start + length].to_vec()
}

/// Indices of the dictionary slots currently in use.
fn filled_slots(datafile: &DataFile) -> Vec<usize> {
  (0..datafile.dictionary().len())
    .filter(|&i| !datafile.dict_entry(i).replacement.is_empty())
    .collect()
}

/// Install `entry` at `index` if that strictly shrinks the encoded size;
/// revert otherwise. Accepted entries are scored with the bytes they just
/// saved.
fn try_replace(datafile: &mut DataFile, index: usize, mut entry: DictEntry, size: &mut usize, pass: &str) -> bool {
  let mut trial = datafile.clone();
  trial.set_dict_entry(index, entry.clone());
  let new_size = encoded_size_of(&trial);

  if new_size < *size {
    entry.score = (*size - new_size) as i32;
    datafile.set_dict_entry(index, entry);
    debug!("{pass}: slot {index} accepted, {} -> {new_size} bytes", *size);
    *size = new_size;
    true
  } else {
    false
  }
}

/// Replace the lowest-scoring slot with a fresh proposal: a random glyph
/// substring, or the concatenation of two existing entries as a ref entry.
fn optimize_worst(datafile: &mut DataFile, size: &mut usize, rnd: &mut Rnd) {
  let index = datafile.low_score_index();
  let filled = filled_slots(datafile);

  let entry = if filled.len() >= 2 && rnd.gen_bool(0.5) {
    let a = filled[rnd.gen_range(0..filled.len())];
    let b = filled[rnd.gen_range(0..filled.len())];
    let mut replacement = datafile.dict_entry(a).replacement.clone();
    replacement.extend_from_slice(&datafile.dict_entry(b).replacement);
    DictEntry { score: 0, ref_encode: true, replacement }
  } else {
    DictEntry { score: 0, ref_encode: false, replacement: random_substring(datafile, rnd) }
  };

  try_replace(datafile, index, entry, size, "optimize_worst");
}

/// Grow a random entry by one pixel at either end.
fn optimize_expand(datafile: &mut DataFile, size: &mut usize, rnd: &mut Rnd) {
  let filled = filled_slots(datafile);
  if filled.is_empty() {
    return;
  }
  let index = filled[rnd.gen_range(0..filled.len())];
  let mut entry = datafile.dict_entry(index).clone();
  let pixel = rnd.gen_range(0..=15u8);
  if rnd.gen_bool(0.5) {
    entry.replacement.push(pixel);
  } else {
    entry.replacement.insert(0, pixel);
  }
  try_replace(datafile, index, entry, size, "optimize_expand");
}

/// Shrink a random entry by one pixel at either end.
fn optimize_trim(datafile: &mut DataFile, size: &mut usize, rnd: &mut Rnd) {
  let filled = filled_slots(datafile);
  if filled.is_empty() {
    return;
  }
  let index = filled[rnd.gen_range(0..filled.len())];
  let mut entry = datafile.dict_entry(index).clone();
  if entry.replacement.len() <= 2 {
    return;
  }
  if rnd.gen_bool(0.5) {
    entry.replacement.pop();
  } else {
    entry.replacement.remove(0);
  }
  try_replace(datafile, index, entry, size, "optimize_trim");
}

/// Flip a random entry between RLE and ref coding.
fn optimize_encoding(datafile: &mut DataFile, size: &mut usize, rnd: &mut Rnd) {
  let filled = filled_slots(datafile);
  if filled.is_empty() {
    return;
  }
  let index = filled[rnd.gen_range(0..filled.len())];
  let mut entry = datafile.dict_entry(index).clone();
  entry.ref_encode = !entry.ref_encode;
  try_replace(datafile, index, entry, size, "optimize_encoding");
}

/// Re-score every entry as the bytes it actually saves: emissions times
/// (pixels covered − 1), minus the entry's own encoded cost. Entries that
/// cost more than they save score negative and become replacement victims.
fn update_scores(datafile: &mut DataFile) {
  let encoded = encode_font(datafile, false);
  let order = sorted_indices(datafile);
  let mut usage = vec![0usize; order.len()];

  let count = |stream: &[u8], usage: &mut Vec<usize>| {
    for &code in stream {
      if code as usize >= DICT_START {
        let slot = code as usize - DICT_START;
        if slot < usage.len() {
          usage[slot] += 1;
        }
      }
    }
  };
  for glyph in &encoded.glyphs {
    count(glyph, &mut usage);
  }
  for entry in &encoded.ref_dict {
    count(entry, &mut usage);
  }

  for (position, &slot) in order.iter().enumerate() {
    let mut entry = datafile.dict_entry(slot).clone();
    let own_cost = if position < encoded.rle_dict.len() {
      encoded.rle_dict[position].len()
    } else {
      encoded.ref_dict[position - encoded.rle_dict.len()].len()
    };
    let covered = entry.replacement.len().saturating_sub(1);
    entry.score = (usage[position] * covered) as i32 - own_cost as i32;
    datafile.set_dict_entry(slot, entry);
  }
}

/// Run `iterations` optimization steps. Each step rescans the proposals
/// once; every accepted proposal already left the DataFile consistent, so
/// interrupting between iterations loses at most the in-flight one.
pub fn optimize(datafile: &mut DataFile, iterations: usize) {
  optimize_until(datafile, iterations, || false)
}

/// [`optimize`], checking `should_stop` between iterations.
pub fn optimize_until(datafile: &mut DataFile, iterations: usize, mut should_stop: impl FnMut() -> bool) {
  if datafile.glyph_count() == 0 {
    return;
  }
  let mut rnd = Rnd::seed_from_u64(u64::from(datafile.seed()));

  update_scores(datafile);
  let mut size = encoded_size_of(datafile);
  info!("optimize: starting at {size} bytes");

  for _ in 0..iterations {
    if should_stop() {
      break;
    }
    optimize_worst(datafile, &mut size, &mut rnd);
    optimize_expand(datafile, &mut size, &mut rnd);
    optimize_trim(datafile, &mut size, &mut rnd);
    optimize_encoding(datafile, &mut size, &mut rnd);
  }

  datafile.set_seed(rnd.gen());
  info!("optimize: finished at {size} bytes");
}
