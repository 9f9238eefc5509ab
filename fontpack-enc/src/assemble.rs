//! Serialization of an encoded font into the FPAK container consumed by
//! the runtime decoder.
//!
//! Container layout (little-endian):
//!   "FPAK", u8 version=1,
//!   u8 width, u8 height, i8 baseline_x, i8 baseline_y, u8 line_height,
//!   u16 flags, u16 fallback_char,
//!   u8 rle_entry_count, u8 dict_entry_count, u8 char_range_count,
//!   u8 name_len, u8 short_name_len, u8 reserved,
//!   u32 dict_offsets_off, u32 dict_data_off, u32 char_ranges_off,
//!   u32 total_len (backpatch),
//!   name, short_name,
//!   dictionary offsets ((dict_entry_count + 1) × u16),
//!   dictionary data (RLE entries first, then ref entries),
//!   char_range_count × { u16 first_char, u16 char_count,
//!                        u32 glyph_offsets_off, u32 glyph_data_off,
//!                        u32 glyph_data_len },
//!   per range: glyph offsets (char_count × u16), then glyph data
//!   (u8 advance width followed by codewords, per glyph, deduplicated
//!   within the range).

use std::collections::HashMap;

use anyhow::{bail, Context};

use crate::datafile::DataFile;
use crate::encode::EncodedFont;
use crate::ranges::{char_to_glyph_map, compute_char_ranges, select_fallback_char, CharRange};
use crate::DICT_SIZE;

const MAGIC: &[u8; 4] = b"FPAK";
const VERSION: u8 = 1;

/// FPAK header bytes before the name strings start.
const HEADER_LEN: usize = 36;

/// Bytes per char-range record.
const RANGE_RECORD_LEN: usize = 16;

struct RangeTables {
  offsets: Vec<u8>,
  data: Vec<u8>,
}

/// Offsets table and glyph-data blob for one range. Characters sharing a
/// glyph point at one copy of its bytes.
fn build_range_tables(
  range: &CharRange,
  datafile: &DataFile,
  encoded: &EncodedFont,
  fallback_index: usize,
) -> anyhow::Result<RangeTables> {
  let mut offsets = Vec::with_capacity(2 * range.glyph_indices.len());
  let mut data: Vec<u8> = Vec::new();
  let mut placed: HashMap<usize, u16> = HashMap::new();

  for slot in &range.glyph_indices {
    let index = slot.unwrap_or(fallback_index);
    let offset = match placed.get(&index) {
      Some(&offset) => offset,
      None => {
        let offset =
          u16::try_from(data.len()).map_err(|_| anyhow::anyhow!("range at {:#X} exceeds 64 KiB", range.first_char))?;
        data.push(datafile.glyph(index).width);
        data.extend_from_slice(&encoded.glyphs[index]);
        placed.insert(index, offset);
        offset
      }
    };
    offsets.extend_from_slice(&offset.to_le_bytes());
  }

  Ok(RangeTables { offsets, data })
}

/// Serialize the encoded font. `short_name` is the identifier-style name
/// recorded next to the full font name (typically derived from the file
/// name by the caller).
pub fn assemble(datafile: &DataFile, encoded: &EncodedFont, short_name: &str) -> anyhow::Result<Vec<u8>> {
  let fontinfo = datafile.font_info();
  if fontinfo.max_width == 0 || fontinfo.max_height == 0 {
    bail!("glyph cell must be at least 1x1");
  }
  if datafile.glyph_count() == 0 {
    bail!("at least one glyph is required");
  }
  if encoded.glyphs.len() != datafile.glyph_count() {
    bail!("encoded glyph count {} != glyph table {}", encoded.glyphs.len(), datafile.glyph_count());
  }
  let total_dict = encoded.rle_dict.len() + encoded.ref_dict.len();
  if total_dict > DICT_SIZE {
    bail!("{total_dict} dictionary entries exceed the capacity of {DICT_SIZE}");
  }

  let name = fontinfo.name.as_bytes();
  if name.len() > 255 {
    bail!("font name longer than 255 bytes");
  }
  if short_name.len() > 255 {
    bail!("short name longer than 255 bytes");
  }

  // Resolve the fallback before packing; gap fills point at its glyph.
  let map = char_to_glyph_map(datafile)?;
  let fallback_char = select_fallback_char(&map, fontinfo.default_char).context("no character is mapped")?;
  let fallback_index = map[&fallback_char];

  let ranges = compute_char_ranges(datafile, |i| encoded.glyphs[i].len() + 1, fallback_index)?;
  if ranges.len() > 255 {
    bail!("{} character ranges exceed 255", ranges.len());
  }

  // ── dictionary tables ───────────────────────────────────────────
  let mut dict_offsets = Vec::with_capacity(2 * (total_dict + 1));
  let mut dict_data: Vec<u8> = Vec::new();
  for entry in encoded.rle_dict.iter().chain(&encoded.ref_dict) {
    dict_offsets.extend_from_slice(&(dict_data.len() as u16).to_le_bytes());
    dict_data.extend_from_slice(entry);
  }
  if dict_data.len() > u16::MAX as usize {
    bail!("dictionary data {} bytes exceeds 64 KiB", dict_data.len());
  }
  dict_offsets.extend_from_slice(&(dict_data.len() as u16).to_le_bytes());

  // ── range tables ────────────────────────────────────────────────
  let tables: Vec<RangeTables> = ranges
    .iter()
    .map(|r| build_range_tables(r, datafile, encoded, fallback_index))
    .collect::<anyhow::Result<_>>()?;

  // ── layout ──────────────────────────────────────────────────────
  let dict_offsets_off = HEADER_LEN + name.len() + short_name.len();
  let dict_data_off = dict_offsets_off + dict_offsets.len();
  let char_ranges_off = dict_data_off + dict_data.len();

  let mut out = Vec::with_capacity(char_ranges_off + RANGE_RECORD_LEN * ranges.len());

  // ── header ──────────────────────────────────────────────────────
  out.extend_from_slice(MAGIC);
  out.push(VERSION);
  out.push(fontinfo.max_width);
  out.push(fontinfo.max_height);
  out.push(fontinfo.baseline_x as u8);
  out.push(fontinfo.baseline_y as u8);
  out.push(fontinfo.line_height);
  out.extend_from_slice(&fontinfo.flags.to_le_bytes());
  out.extend_from_slice(&fallback_char.to_le_bytes());
  out.push(encoded.rle_dict.len() as u8);
  out.push(total_dict as u8);
  out.push(ranges.len() as u8);
  out.push(name.len() as u8);
  out.push(short_name.len() as u8);
  out.push(0); // reserved
  out.extend_from_slice(&(dict_offsets_off as u32).to_le_bytes());
  out.extend_from_slice(&(dict_data_off as u32).to_le_bytes());
  out.extend_from_slice(&(char_ranges_off as u32).to_le_bytes());
  let total_len_at = out.len();
  out.extend_from_slice(&0u32.to_le_bytes()); // total_len (backpatch)

  // ── tables ──────────────────────────────────────────────────────
  out.extend_from_slice(name);
  out.extend_from_slice(short_name.as_bytes());
  out.extend_from_slice(&dict_offsets);
  out.extend_from_slice(&dict_data);

  let mut table_off = char_ranges_off + RANGE_RECORD_LEN * ranges.len();
  for (range, table) in ranges.iter().zip(&tables) {
    out.extend_from_slice(&range.first_char.to_le_bytes());
    out.extend_from_slice(&range.char_count().to_le_bytes());
    out.extend_from_slice(&(table_off as u32).to_le_bytes());
    out.extend_from_slice(&((table_off + table.offsets.len()) as u32).to_le_bytes());
    out.extend_from_slice(&(table.data.len() as u32).to_le_bytes());
    table_off += table.offsets.len() + table.data.len();
  }
  for table in &tables {
    out.extend_from_slice(&table.offsets);
    out.extend_from_slice(&table.data);
  }

  // ── backpatch ───────────────────────────────────────────────────
  let total_len = out.len() as u32;
  out[total_len_at..total_len_at + 4].copy_from_slice(&total_len.to_le_bytes());

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::assemble;
  use crate::datafile::DataFile;
  use crate::encode::{encode_font, encoded_size};

  const TESTFILE: &str = "FontName Sans Serif\n\
                          MaxWidth 4\n\
                          MaxHeight 6\n\
                          BaselineX 1\n\
                          BaselineY 1\n\
                          DictEntry 1 0 0F0F\n\
                          DictEntry 1 0 0000\n\
                          DictEntry 1 0 FFFF\n\
                          DictEntry 1 1 0F0F0F0F\n\
                          Glyph 65 4 0F0F0F0F0F0F0F0F0F0F0F0F\n\
                          Glyph 66 4 0F0F0000000000000000000F\n\
                          Glyph 67 4 0000FFFF000FFF0000FFFF00\n";

  #[test]
  fn t_total_length_backpatched() {
    let datafile = DataFile::load(TESTFILE.as_bytes()).expect("load");
    let encoded = encode_font(&datafile, false);
    let blob = assemble(&datafile, &encoded, "sans").expect("assemble");
    let declared = u32::from_le_bytes(blob[32..36].try_into().expect("len"));
    assert_eq!(declared as usize, blob.len());
  }

  #[test]
  fn t_size_estimate_is_exact() {
    // One dense range, no glyph sharing: the container is exactly the
    // estimate plus the fixed parts (header, names, the closing dictionary
    // offset, one range record).
    let datafile = DataFile::load(TESTFILE.as_bytes()).expect("load");
    let encoded = encode_font(&datafile, false);
    let blob = assemble(&datafile, &encoded, "sans").expect("assemble");
    let fixed = 36 + "Sans Serif".len() + "sans".len() + 2 + 16;
    assert_eq!(blob.len(), encoded_size(&encoded) + fixed);
  }

  #[test]
  fn t_rejects_empty_font() {
    let datafile = DataFile::load("MaxWidth 2\nMaxHeight 2\n".as_bytes()).expect("load");
    let encoded = encode_font(&datafile, false);
    assert!(assemble(&datafile, &encoded, "empty").is_err());
  }
}
