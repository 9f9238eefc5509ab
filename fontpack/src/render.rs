//! Glyph rendering: codeword expansion driven through a pixel callback.
//!
//! A glyph's codeword stream is consumed until the cursor leaves the bottom
//! of the glyph cell. Each codeword expands to a run of pixels of one alpha
//! value (possibly through dictionary entries); runs are reported to the
//! callback row by row in raster order, split at the right edge of the cell.
//! Alpha values are the raw 4-bit levels, 0 = background, 15 = opaque.

use crate::PackFont;

/// Number of reserved codewords before the dictionary references.
const DICT_START: u8 = 24;

/// Special codeword: fill with zeros to the end of the glyph.
const REF_FILLZEROS: u8 = 16;

/// RLE opcodes: 2-bit code in the top bits, 6-bit value below.
const RLE_CODEMASK: u8 = 0xC0;
const RLE_VALMASK: u8 = 0x3F;
const RLE_ZEROS: u8 = 0x00;
const RLE_64ZEROS: u8 = 0x40;
const RLE_ONES: u8 = 0x80;

/// Cursor over the glyph cell plus the output callback.
struct Renderer<'f, 'a, F> {
  font: &'f PackFont<'a>,
  x_begin: i16,
  x_end: i16,
  x: i16,
  y: i16,
  y_end: i16,
  cb: F,
}

impl<F: FnMut(i16, i16, u8, u8)> Renderer<'_, '_, F> {
  /// Report a run of `count` pixels of `alpha`, splitting at the right edge.
  fn write_pixels(&mut self, mut count: u16, alpha: u8) {
    while i32::from(self.x) + i32::from(count) >= i32::from(self.x_end) {
      let rowlen = (self.x_end - self.x) as u16;
      (self.cb)(self.x, self.y, rowlen as u8, alpha);
      count -= rowlen;
      self.x = self.x_begin;
      self.y += 1;
    }
    if count > 0 {
      (self.cb)(self.x, self.y, count as u8, alpha);
      self.x += count as i16;
    }
  }

  /// Advance over `count` background pixels without reporting them.
  fn skip_pixels(&mut self, count: u16) {
    self.x += count as i16;
    while self.x >= self.x_end {
      self.x -= self.x_end - self.x_begin;
      self.y += 1;
    }
  }

  /// Expand an RLE-coded dictionary entry.
  fn rle_entry(&mut self, index: usize) {
    if index >= self.font.dict_entry_count() as usize {
      return;
    }
    for &code in self.font.dict_slice(index) {
      let value = code & RLE_VALMASK;
      match code & RLE_CODEMASK {
        RLE_ZEROS => self.skip_pixels(u16::from(value)),
        RLE_64ZEROS => self.skip_pixels((u16::from(value) + 1) * 64),
        RLE_ONES => self.write_pixels(u16::from(value) + 1, 15),
        _ => {
          // RLE_SHADE: count in the upper two value bits, alpha below.
          self.write_pixels(u16::from(value >> 4) + 1, value & 0x0F);
        }
      }
    }
  }

  /// Expand a codeword that may appear inside a ref-coded dictionary entry:
  /// a literal pixel, the zero-fill terminator, or an RLE entry reference.
  fn ref_codeword(&mut self, code: u8) {
    if code <= 15 {
      self.write_pixels(1, code);
    } else if code == REF_FILLZEROS {
      self.y = self.y_end;
    } else if code < DICT_START {
      // Reserved, skip.
    } else {
      self.rle_entry((code - DICT_START) as usize);
    }
  }

  /// Expand a ref-coded dictionary entry.
  fn ref_entry(&mut self, index: usize) {
    if index >= self.font.dict_entry_count() as usize {
      return;
    }
    for &code in self.font.dict_slice(index) {
      self.ref_codeword(code);
    }
  }

  /// Expand one codeword of a glyph stream.
  fn glyph_codeword(&mut self, code: u8) {
    let index = code as usize;
    if index >= DICT_START as usize + self.font.rle_entry_count as usize {
      self.ref_entry(index - DICT_START as usize);
    } else {
      self.ref_codeword(code);
    }
  }
}

impl<'a> PackFont<'a> {
  /// Decode and render one character with its top-left corner at `(x0, y0)`.
  ///
  /// The callback receives `(x, y, count, alpha)` for each horizontal run;
  /// alpha is `0..=15`. Background runs produced by RLE zero opcodes are
  /// skipped; literal zero pixels are reported with `alpha == 0`. Unmapped
  /// characters render the fallback glyph. Returns the advance width.
  pub fn render_char<F>(&self, character: u16, x0: i16, y0: i16, cb: F) -> u8
  where
    F: FnMut(i16, i16, u8, u8),
  {
    let span = self.find_glyph(character).unwrap_or(self.default_glyph);
    let width = self.data[span.start];

    let mut r = Renderer {
      font: self,
      x_begin: x0,
      x_end: x0 + i16::from(self.width),
      x: x0,
      y: y0,
      y_end: y0 + i16::from(self.height),
      cb,
    };

    let mut pos = span.start + 1;
    while r.y < r.y_end && pos < span.end {
      r.glyph_codeword(self.data[pos]);
      pos += 1;
    }
    width
  }

  /// Advance width of a character, without rendering it.
  ///
  /// This is the tracking width, not the bounding box of the inked pixels.
  pub fn char_width(&self, character: u16) -> u8 {
    let span = self.find_glyph(character).unwrap_or(self.default_glyph);
    self.data[span.start]
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use std::vec;
  use std::vec::Vec;

  use crate::{Error, PackFont};

  /// Assemble a single-range container around the given dictionary and
  /// glyph codeword streams. Mirrors the builder-side layout.
  fn build_font(
    width: u8,
    height: u8,
    rle: &[&[u8]],
    refs: &[&[u8]],
    glyphs: &[(u8, &[u8])],
    first_char: u16,
    fallback_char: u16,
  ) -> Vec<u8> {
    let name = b"Test Font";
    let short_name = b"test";

    let mut dict_offsets: Vec<u8> = Vec::new();
    let mut dict_data: Vec<u8> = Vec::new();
    for entry in rle.iter().chain(refs) {
      dict_offsets.extend_from_slice(&(dict_data.len() as u16).to_le_bytes());
      dict_data.extend_from_slice(entry);
    }
    dict_offsets.extend_from_slice(&(dict_data.len() as u16).to_le_bytes());

    let mut glyph_offsets: Vec<u8> = Vec::new();
    let mut glyph_data: Vec<u8> = Vec::new();
    for &(w, stream) in glyphs {
      glyph_offsets.extend_from_slice(&(glyph_data.len() as u16).to_le_bytes());
      glyph_data.push(w);
      glyph_data.extend_from_slice(stream);
    }

    let total_dict = rle.len() + refs.len();
    let dict_offsets_off = 36 + name.len() + short_name.len();
    let dict_data_off = dict_offsets_off + dict_offsets.len();
    let char_ranges_off = dict_data_off + dict_data.len();
    let tables_off = char_ranges_off + 16;

    let mut out = Vec::new();
    out.extend_from_slice(b"FPAK");
    out.push(1); // version
    out.push(width);
    out.push(height);
    out.push(1); // baseline_x
    out.push(1); // baseline_y
    out.push(height); // line_height
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&fallback_char.to_le_bytes());
    out.push(rle.len() as u8);
    out.push(total_dict as u8);
    out.push(1); // char_range_count
    out.push(name.len() as u8);
    out.push(short_name.len() as u8);
    out.push(0); // reserved
    out.extend_from_slice(&(dict_offsets_off as u32).to_le_bytes());
    out.extend_from_slice(&(dict_data_off as u32).to_le_bytes());
    out.extend_from_slice(&(char_ranges_off as u32).to_le_bytes());
    let total_len_at = out.len();
    out.extend_from_slice(&0u32.to_le_bytes()); // total_len (backpatch)

    out.extend_from_slice(name);
    out.extend_from_slice(short_name);
    out.extend_from_slice(&dict_offsets);
    out.extend_from_slice(&dict_data);

    // One range record.
    out.extend_from_slice(&first_char.to_le_bytes());
    out.extend_from_slice(&(glyphs.len() as u16).to_le_bytes());
    out.extend_from_slice(&(tables_off as u32).to_le_bytes());
    out.extend_from_slice(&((tables_off + glyph_offsets.len()) as u32).to_le_bytes());
    out.extend_from_slice(&(glyph_data.len() as u32).to_le_bytes());

    out.extend_from_slice(&glyph_offsets);
    out.extend_from_slice(&glyph_data);

    let total = (out.len() as u32).to_le_bytes();
    out[total_len_at..total_len_at + 4].copy_from_slice(&total);
    out
  }

  /// The reference fixture: 4×6 cell, three RLE entries, one ref entry,
  /// three glyphs mapped to 'A'..'C'.
  fn reference_font() -> Vec<u8> {
    build_font(
      4,
      6,
      &[&[0x01, 0x80, 0x01, 0x80], &[0x04], &[0x83]],
      &[&[24, 24]],
      &[
        (4, &[27, 27, 27]),
        (4, &[24, 25, 25, 25, 25, 0, 0, 0, 15]),
        (4, &[25, 26, 0, 0, 0, 15, 15, 15, 25, 26, 16]),
      ],
      'A' as u16,
      'A' as u16,
    )
  }

  fn render_to_buffer(font: &PackFont, character: u16) -> Vec<u8> {
    let w = font.width as usize;
    let h = font.height as usize;
    let mut buf = vec![0u8; w * h];
    font.render_char(character, 0, 0, |x, y, count, alpha| {
      for i in 0..count as usize {
        buf[y as usize * w + x as usize + i] = alpha;
      }
    });
    buf
  }

  fn render_trace(font: &PackFont, character: u16) -> Vec<(i16, i16, u8, u8)> {
    let mut trace = Vec::new();
    font.render_char(character, 0, 0, |x, y, count, alpha| {
      trace.push((x, y, count, alpha));
    });
    trace
  }

  #[test]
  fn t_parse_header() {
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    assert_eq!((font.width, font.height), (4, 6));
    assert_eq!((font.baseline_x, font.baseline_y), (1, 1));
    assert_eq!(font.name(), "Test Font");
    assert_eq!(font.short_name(), "test");
    assert_eq!(font.dict_entry_count(), 4);
    assert_eq!(font.char_range_count(), 1);
  }

  #[test]
  fn t_render_alternating() {
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    // 'A' is the 0,15,0,15,... checker column pattern.
    let mut expected = vec![0u8; 24];
    for (i, px) in expected.iter_mut().enumerate() {
      if i % 2 == 1 {
        *px = 15;
      }
    }
    assert_eq!(render_to_buffer(&font, 'A' as u16), expected);
    assert_eq!(font.render_char('A' as u16, 0, 0, |_, _, _, _| ()), 4);
  }

  #[test]
  fn t_render_literals_and_runs() {
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    let mut expected = vec![0u8; 24];
    expected[1] = 15;
    expected[3] = 15;
    expected[23] = 15;
    assert_eq!(render_to_buffer(&font, 'B' as u16), expected);
  }

  #[test]
  fn t_trailing_zeros_restored() {
    // 'C' ends in REF_FILLZEROS; the final row must stay background.
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    let expected: Vec<u8> = "000011110001110000111100"
      .bytes()
      .map(|b| if b == b'1' { 15 } else { 0 })
      .collect();
    assert_eq!(render_to_buffer(&font, 'C' as u16), expected);
  }

  #[test]
  fn t_default_glyph_for_unmapped() {
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    assert_eq!(render_trace(&font, 0xFFFF), render_trace(&font, 'A' as u16));
    assert_eq!(font.char_width(0xFFFF), font.char_width('A' as u16));
  }

  #[test]
  fn t_reserved_codeword_is_noop() {
    // Codeword 17 is reserved; injecting it must not disturb the output.
    let plain = build_font(4, 6, &[&[0x04]], &[], &[(4, &[24, 24, 2, 2, 15, 15, 16])], 'a' as u16, 'a' as u16);
    let injected = build_font(4, 6, &[&[0x04]], &[], &[(4, &[24, 17, 24, 2, 2, 17, 15, 15, 16])], 'a' as u16, 'a' as u16);
    let plain = PackFont::new(&plain).expect("parse");
    let injected = PackFont::new(&injected).expect("parse");
    assert_eq!(render_trace(&plain, 'a' as u16), render_trace(&injected, 'a' as u16));
  }

  #[test]
  fn t_runs_split_at_right_edge() {
    // Shade runs of 4+4+1 pixels of alpha 1, started one pixel in: every
    // run crossing the right edge of the 4-wide cell must be split there.
    let blob = build_font(4, 6, &[&[0xF1, 0xF1, 0xC1]], &[], &[(4, &[1, 24, 16])], '!' as u16, '!' as u16);
    let font = PackFont::new(&blob).expect("parse");
    let trace = render_trace(&font, '!' as u16);
    assert_eq!(
      trace,
      vec![(0, 0, 1, 1), (1, 0, 3, 1), (0, 1, 1, 1), (1, 1, 3, 1), (0, 2, 1, 1), (1, 2, 1, 1)]
    );
  }

  #[test]
  fn t_char_width() {
    let blob = reference_font();
    let font = PackFont::new(&blob).expect("parse");
    assert_eq!(font.char_width('B' as u16), 4);
  }

  #[test]
  fn t_bad_magic() {
    let mut blob = reference_font();
    blob[0] = b'X';
    assert_eq!(PackFont::new(&blob), Err(Error::BadMagic));
  }

  #[test]
  fn t_bad_version() {
    let mut blob = reference_font();
    blob[4] = 9;
    assert_eq!(PackFont::new(&blob), Err(Error::BadVersion(9)));
  }

  #[test]
  fn t_length_mismatch() {
    let mut blob = reference_font();
    blob.push(0);
    assert_eq!(PackFont::new(&blob), Err(Error::LengthMismatch));
  }

  #[test]
  fn t_truncated() {
    let blob = reference_font();
    assert_eq!(PackFont::new(&blob[..20]), Err(Error::Malformed));
  }

  #[test]
  fn t_unmapped_fallback() {
    let blob = build_font(4, 6, &[&[0x04]], &[], &[(4, &[24, 16])], 'A' as u16, 'z' as u16);
    assert_eq!(PackFont::new(&blob), Err(Error::NoFallback));
  }
}
