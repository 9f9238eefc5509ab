#![no_std]

//! Minimal no_std reader & glyph renderer for FPAK compressed bitmap fonts.
//!
//! An FPAK font stores fixed-cell glyphs (16 alpha levels, 4 bits per pixel)
//! as a shared dictionary of RLE- and reference-coded pixel runs plus one
//! codeword stream per glyph, grouped into character ranges for sparse code
//! points. The reader takes a `&[u8]`, validates every table up front and
//! exposes:
//! - Character → glyph resolution through the range table, with a fallback
//!   glyph for unmapped codes
//! - A renderer that walks one glyph's codewords and reports runs of pixels
//!   to a callback in raster order, without decoding anything else
//!
//! This module is `no_std`-friendly (uses only `core`).
//!
//! Container layout (little-endian):
//!   "FPAK", u8 version=1,
//!   u8 width, u8 height, i8 baseline_x, i8 baseline_y, u8 line_height,
//!   u16 flags, u16 fallback_char,
//!   u8 rle_entry_count, u8 dict_entry_count, u8 char_range_count,
//!   u8 name_len, u8 short_name_len, u8 reserved,
//!   u32 dict_offsets_off, u32 dict_data_off, u32 char_ranges_off,
//!   u32 total_len,
//!   name, short_name,
//!   dictionary offsets ((dict_entry_count + 1) × u16),
//!   dictionary data (RLE entries first, then ref entries),
//!   char_range_count × { u16 first_char, u16 char_count,
//!                        u32 glyph_offsets_off, u32 glyph_data_off,
//!                        u32 glyph_data_len },
//!   per range: glyph offsets (char_count × u16), then glyph data
//!   (u8 advance width followed by codewords, per glyph).

use core::convert::TryInto;

mod render;

/// Fixed header bytes before the name strings start.
const HEADER_LEN: usize = 36;

/// Bytes per char-range record.
const RANGE_RECORD_LEN: usize = 16;

/// Parsing/validation errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
  /// Wrong magic (expected "FPAK").
  BadMagic,
  /// Unsupported version (expected 1).
  BadVersion(u8),
  /// Header/table alignment/length errors.
  Malformed,
  /// Declared total length does not match input length.
  LengthMismatch,
  /// Font name strings are not valid UTF-8.
  BadName,
  /// Dictionary offset table out of bounds or not monotonic.
  DictOffsets,
  /// Character range tables out of bounds.
  RangeBounds,
  /// Glyph offset beyond its range's data.
  GlyphOob,
  /// The fallback character is not mapped by any range.
  NoFallback,
}

/// One character range record (16 bytes each in the file).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CharRange {
  first_char: u16,
  char_count: u16,
  glyph_offsets_off: usize,
  glyph_data_off: usize,
  glyph_data_len: usize,
}

/// Byte span of one encoded glyph (width byte + codewords) within the file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct GlyphSpan {
  start: usize,
  end: usize,
}

/// Parsed FPAK font view over the provided bytes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackFont<'a> {
  data: &'a [u8],

  // Header metrics
  pub width: u8,
  pub height: u8,
  pub baseline_x: i8,
  pub baseline_y: i8,
  pub line_height: u8,
  pub flags: u16,
  pub fallback_char: u16,

  // Counts
  rle_entry_count: u8,
  dict_entry_count: u8,
  char_range_count: u8,

  // Name strings (validated UTF-8)
  name: &'a str,
  short_name: &'a str,

  // Offsets
  dict_offsets_off: usize,
  dict_data_off: usize,
  char_ranges_off: usize,

  // Resolved at parse time
  default_glyph: GlyphSpan,
}

impl<'a> PackFont<'a> {
  /// Parse and validate a font from bytes.
  pub fn new(data: &'a [u8]) -> Result<Self, Error> {
    // ---- Fixed header ----
    if data.len() < HEADER_LEN {
      return Err(Error::Malformed);
    }
    if &data[0..4] != b"FPAK" {
      return Err(Error::BadMagic);
    }
    let version = data[4];
    if version != 1 {
      return Err(Error::BadVersion(version));
    }
    let width = data[5];
    let height = data[6];
    let baseline_x = data[7] as i8;
    let baseline_y = data[8] as i8;
    let line_height = data[9];
    let flags = le_u16(&data[10..12]);
    let fallback_char = le_u16(&data[12..14]);
    let rle_entry_count = data[14];
    let dict_entry_count = data[15];
    let char_range_count = data[16];
    let name_len = data[17] as usize;
    let short_name_len = data[18] as usize;
    let dict_offsets_off = le_u32(&data[20..24]) as usize;
    let dict_data_off = le_u32(&data[24..28]) as usize;
    let char_ranges_off = le_u32(&data[28..32]) as usize;
    let total_len = le_u32(&data[32..36]) as usize;

    if total_len != data.len() {
      return Err(Error::LengthMismatch);
    }
    if width == 0 || height == 0 {
      return Err(Error::Malformed);
    }
    if rle_entry_count > dict_entry_count {
      return Err(Error::Malformed);
    }

    // ---- Name strings (directly after the header) ----
    let name_off = HEADER_LEN;
    let short_name_off = name_off + name_len;
    if dict_offsets_off != short_name_off + short_name_len {
      return Err(Error::Malformed);
    }
    if dict_offsets_off > total_len {
      return Err(Error::Malformed);
    }
    let name = core::str::from_utf8(&data[name_off..name_off + name_len]).map_err(|_| Error::BadName)?;
    let short_name =
      core::str::from_utf8(&data[short_name_off..short_name_off + short_name_len]).map_err(|_| Error::BadName)?;

    // ---- Dictionary tables ----
    let offsets_len = 2 * (dict_entry_count as usize + 1);
    if dict_offsets_off + offsets_len != dict_data_off {
      return Err(Error::Malformed);
    }
    if dict_data_off > char_ranges_off || char_ranges_off > total_len {
      return Err(Error::Malformed);
    }
    let mut prev = 0usize;
    for i in 0..=dict_entry_count as usize {
      let off = le_u16(&data[dict_offsets_off + 2 * i..]) as usize;
      if off < prev {
        return Err(Error::DictOffsets);
      }
      prev = off;
    }
    if dict_data_off + prev != char_ranges_off {
      return Err(Error::DictOffsets);
    }

    // ---- Character ranges ----
    let ranges_len = RANGE_RECORD_LEN * char_range_count as usize;
    if char_ranges_off + ranges_len > total_len {
      return Err(Error::RangeBounds);
    }

    let font = PackFont {
      data,
      width,
      height,
      baseline_x,
      baseline_y,
      line_height,
      flags,
      fallback_char,
      rle_entry_count,
      dict_entry_count,
      char_range_count,
      name,
      short_name,
      dict_offsets_off,
      dict_data_off,
      char_ranges_off,
      default_glyph: GlyphSpan { start: 0, end: 0 },
    };

    // Validate every range's tables before resolving anything through them.
    for i in 0..char_range_count as usize {
      let r = font.char_range(i);
      if r.char_count == 0 || r.glyph_data_len == 0 {
        return Err(Error::RangeBounds);
      }
      if r.glyph_offsets_off + 2 * r.char_count as usize > total_len {
        return Err(Error::RangeBounds);
      }
      if r.glyph_data_off + r.glyph_data_len > total_len {
        return Err(Error::RangeBounds);
      }
      for c in 0..r.char_count as usize {
        let off = le_u16(&data[r.glyph_offsets_off + 2 * c..]) as usize;
        if off >= r.glyph_data_len {
          return Err(Error::GlyphOob);
        }
      }
    }

    // The fallback glyph must be reachable; rendering relies on it.
    let default_glyph = font.find_glyph(fallback_char).ok_or(Error::NoFallback)?;
    Ok(PackFont { default_glyph, ..font })
  }

  /// Full font name, as recorded by the encoder.
  #[inline]
  pub fn name(&self) -> &'a str {
    self.name
  }

  /// Short identifier-style name.
  #[inline]
  pub fn short_name(&self) -> &'a str {
    self.short_name
  }

  /// Number of dictionary entries (RLE + ref).
  #[inline]
  pub fn dict_entry_count(&self) -> u8 {
    self.dict_entry_count
  }

  /// Number of discontinuous character ranges.
  #[inline]
  pub fn char_range_count(&self) -> u8 {
    self.char_range_count
  }

  #[inline]
  fn char_range(&self, index: usize) -> CharRange {
    let off = self.char_ranges_off + RANGE_RECORD_LEN * index;
    CharRange {
      first_char: le_u16(&self.data[off..]),
      char_count: le_u16(&self.data[off + 2..]),
      glyph_offsets_off: le_u32(&self.data[off + 4..]) as usize,
      glyph_data_off: le_u32(&self.data[off + 8..]) as usize,
      glyph_data_len: le_u32(&self.data[off + 12..]) as usize,
    }
  }

  /// Locate the encoded glyph for a character by scanning the ranges.
  fn find_glyph(&self, character: u16) -> Option<GlyphSpan> {
    for i in 0..self.char_range_count as usize {
      let r = self.char_range(i);
      if character < r.first_char {
        continue;
      }
      let index = (character - r.first_char) as usize;
      if index < r.char_count as usize {
        let off = le_u16(&self.data[r.glyph_offsets_off + 2 * index..]) as usize;
        return Some(GlyphSpan {
          start: r.glyph_data_off + off,
          end: r.glyph_data_off + r.glyph_data_len,
        });
      }
    }
    None
  }

  /// Encoded bytes of a dictionary entry.
  #[inline]
  fn dict_slice(&self, index: usize) -> &'a [u8] {
    let start = le_u16(&self.data[self.dict_offsets_off + 2 * index..]) as usize;
    let end = le_u16(&self.data[self.dict_offsets_off + 2 * (index + 1)..]) as usize;
    &self.data[self.dict_data_off + start..self.dict_data_off + end]
  }
}

// ---------- helpers ----------

#[inline]
fn le_u16(b: &[u8]) -> u16 {
  u16::from_le_bytes(b[0..2].try_into().unwrap())
}

#[inline]
fn le_u32(b: &[u8]) -> u32 {
  u32::from_le_bytes(b[0..4].try_into().unwrap())
}
