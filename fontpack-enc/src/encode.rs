//! Encoder driver: dictionary ordering, reference coding of entries and
//! glyphs, the byte-exact size estimate, and the verification decoder.

use crate::datafile::{DataFile, DictEntry, FontInfo};
use crate::pixels::PixelString;
use crate::rle::{decode_rle, encode_rle};
use crate::trie::DictTrie;
use crate::{DICT_START, REF_FILLZEROS};

/// Defensive bound on ref-entry expansion; the dictionary ordering
/// invariant keeps real fonts well below it.
const MAX_REF_DEPTH: u32 = 16;

/// Encoded form of a font: one opcode stream per dictionary entry and per
/// glyph. Offset tables and headers are the assembler's business.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFont {
  pub rle_dict: Vec<Vec<u8>>,
  pub ref_dict: Vec<Vec<u8>>,
  pub glyphs: Vec<Vec<u8>>,
}

/// Dictionary emission order: indices of the non-empty entries, stably
/// sorted with RLE-coded entries ahead of ref-coded ones. The position in
/// this order defines the entry's codeword (`DICT_START + position`).
pub(crate) fn sorted_indices(datafile: &DataFile) -> Vec<usize> {
  let dict = datafile.dictionary();
  let mut order: Vec<usize> = (0..dict.len()).filter(|&i| !dict[i].replacement.is_empty()).collect();
  order.sort_by_key(|&i| dict[i].ref_encode);
  order
}

/// Encode every dictionary entry and glyph of the font.
///
/// With `verify` set, every glyph is decoded back and compared against the
/// source pixels; a mismatch is a codec bug and panics with the glyph
/// index.
pub fn encode_font(datafile: &DataFile, verify: bool) -> EncodedFont {
  let order = sorted_indices(datafile);
  let dict: Vec<DictEntry> = order.iter().map(|&i| datafile.dict_entry(i).clone()).collect();

  let trie = DictTrie::build(&dict);
  let mut encoded = EncodedFont::default();

  for entry in &dict {
    if entry.ref_encode {
      encoded.ref_dict.push(encode_ref(&entry.replacement, &trie, false));
    } else {
      encoded.rle_dict.push(encode_rle(&entry.replacement));
    }
  }

  for glyph in datafile.glyphs() {
    encoded.glyphs.push(encode_ref(&glyph.data, &trie, true));
  }

  if verify {
    for (index, glyph) in datafile.glyphs().iter().enumerate() {
      let decoded = decode_glyph(&encoded, index, datafile.font_info());
      if decoded != glyph.data {
        panic!(
          "glyph {index} did not survive the encoding round-trip:\n{}",
          datafile.glyph_to_text(index)
        );
      }
    }
  }

  encoded
}

/// Reference-encode one pixel string through the trie. Glyphs strip
/// trailing zeros and close with `REF_FILLZEROS`; dictionary entries must
/// expand to their exact length and may not reference ref-coded entries.
fn encode_ref(pixels: &[u8], trie: &DictTrie, is_glyph: bool) -> Vec<u8> {
  let mut result = Vec::new();

  let mut end = pixels.len();
  if is_glyph {
    while end > 0 && pixels[end - 1] == 0 {
      end -= 1;
    }
  }

  // Matches may run past `end` into the stripped zero tail; the loop bound
  // only decides when coverage is complete.
  let mut pos = 0;
  while pos < end {
    match trie.longest_match(&pixels[pos..], is_glyph) {
      Some((consumed, codeword)) => {
        result.push(codeword);
        pos += consumed;
      }
      None => panic!("no dictionary match at pixel {pos}"),
    }
  }

  if pos < pixels.len() {
    result.push(REF_FILLZEROS);
  }

  result
}

/// On-wire byte cost of an encoded font: entry bytes plus two bytes of
/// offset table per non-empty dictionary entry, plus offset-table entry
/// and width byte per glyph.
pub fn encoded_size(encoded: &EncodedFont) -> usize {
  let mut total = 0;
  for entry in encoded.rle_dict.iter().chain(&encoded.ref_dict) {
    total += entry.len();
    if !entry.is_empty() {
      total += 2;
    }
  }
  for glyph in &encoded.glyphs {
    total += glyph.len() + 3;
  }
  total
}

/// Encoded byte cost of a DataFile; the optimizer's objective.
pub fn encoded_size_of(datafile: &DataFile) -> usize {
  encoded_size(&encode_font(datafile, false))
}

/// Decode a single glyph back to pixels (for verification and tests).
pub fn decode_glyph(encoded: &EncodedFont, index: usize, fontinfo: &FontInfo) -> PixelString {
  let cell = fontinfo.max_width as usize * fontinfo.max_height as usize;
  let mut result = PixelString::with_capacity(cell);
  for &code in &encoded.glyphs[index] {
    expand_codeword(encoded, code, cell, &mut result, 0);
  }
  result
}

fn expand_codeword(encoded: &EncodedFont, code: u8, cell: usize, out: &mut PixelString, depth: u32) {
  if depth > MAX_REF_DEPTH {
    panic!("dictionary expansion deeper than {MAX_REF_DEPTH}; the dictionary ordering is corrupt");
  }

  if code <= 15 {
    out.push(code);
  } else if code == REF_FILLZEROS {
    out.resize(cell, 0);
  } else if (code as usize) < DICT_START {
    // Reserved, skip.
  } else {
    let index = code as usize - DICT_START;
    if index < encoded.rle_dict.len() {
      decode_rle(&encoded.rle_dict[index], out);
    } else if index < encoded.rle_dict.len() + encoded.ref_dict.len() {
      for &inner in &encoded.ref_dict[index - encoded.rle_dict.len()] {
        expand_codeword(encoded, inner, cell, out, depth + 1);
      }
    }
    // Beyond the dictionary: reserved, skip.
  }
}

#[cfg(test)]
mod tests {
  use super::{decode_glyph, encode_font, encoded_size, encoded_size_of, sorted_indices};
  use crate::datafile::{DataFile, DictEntry};
  use crate::DICT_START;

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

  fn testfont() -> DataFile {
    DataFile::load(TESTFILE.as_bytes()).expect("load")
  }

  #[test]
  fn t_encode_reference_font() {
    let encoded = encode_font(&testfont(), true);

    assert_eq!(encoded.rle_dict.len(), 3);
    assert_eq!(encoded.rle_dict[0], vec![0x01, 0x80, 0x01, 0x80]);
    assert_eq!(encoded.rle_dict[1], vec![0x04]);
    assert_eq!(encoded.rle_dict[2], vec![0x83]);
    assert_eq!(encoded.ref_dict.len(), 1);
    assert_eq!(encoded.ref_dict[0], vec![24, 24]);

    assert_eq!(encoded.glyphs.len(), 3);
    assert_eq!(encoded.glyphs[0], vec![27, 27, 27]);
    assert_eq!(encoded.glyphs[1], vec![24, 25, 25, 25, 25, 0, 0, 0, 15]);
    assert_eq!(encoded.glyphs[2], vec![25, 26, 0, 0, 0, 15, 15, 15, 25, 26, 16]);
  }

  #[test]
  fn t_decode_matches_source() {
    let datafile = testfont();
    let encoded = encode_font(&datafile, false);
    for index in 0..datafile.glyph_count() {
      assert_eq!(decode_glyph(&encoded, index, datafile.font_info()), datafile.glyph(index).data, "glyph {index}");
    }
  }

  #[test]
  fn t_codewords_stay_in_range() {
    let datafile = testfont();
    let encoded = encode_font(&datafile, false);
    let total_dict = encoded.rle_dict.len() + encoded.ref_dict.len();
    for glyph in &encoded.glyphs {
      for &code in glyph {
        assert!((code as usize) < DICT_START + total_dict);
      }
    }
  }

  #[test]
  fn t_ref_entries_reference_only_rle() {
    let datafile = testfont();
    let encoded = encode_font(&datafile, false);
    for entry in &encoded.ref_dict {
      for &code in entry {
        if code as usize >= DICT_START {
          assert!((code as usize - DICT_START) < encoded.rle_dict.len());
        }
      }
    }
  }

  #[test]
  fn t_sort_order_rle_first_empties_dropped() {
    let mut datafile = testfont();
    // Entry 3 is ref-encoded and sits between RLE entries after this.
    datafile.set_dict_entry(5, DictEntry { score: 0, ref_encode: false, replacement: vec![1, 2, 3] });
    let order = sorted_indices(&datafile);
    assert_eq!(order, vec![0, 1, 2, 5, 3]);
  }

  #[test]
  fn t_all_zero_glyph_is_one_codeword() {
    let text = "MaxWidth 3\nMaxHeight 3\nGlyph 32 3 000000000\n";
    let datafile = DataFile::load(text.as_bytes()).expect("load");
    let encoded = encode_font(&datafile, true);
    assert_eq!(encoded.glyphs[0], vec![16]);
    assert_eq!(decode_glyph(&encoded, 0, datafile.font_info()), vec![0; 9]);
  }

  #[test]
  fn t_size_estimate() {
    let encoded = encode_font(&testfont(), false);
    // Dictionary: (4+2) + (1+2) + (1+2) + (2+2); glyphs: (3+3) + (9+3) + (11+3).
    assert_eq!(encoded_size(&encoded), 16 + 32);
    assert_eq!(encoded_size_of(&testfont()), 48);
  }

  #[test]
  fn t_empty_dictionary_encodes_with_literals() {
    let text = "MaxWidth 2\nMaxHeight 2\nGlyph 32 2 0F30\n";
    let datafile = DataFile::load(text.as_bytes()).expect("load");
    let encoded = encode_font(&datafile, true);
    assert_eq!(encoded.glyphs[0], vec![0, 15, 3, 16]);
  }
}
