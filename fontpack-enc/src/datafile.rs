//! The in-memory working representation of a font under compression:
//! metadata, fixed-capacity dictionary, glyph table, persisted RNG seed.
//!
//! Working-file format (newline-delimited text, one record per line):
//!   FontName <string up to end of line>
//!   MaxWidth <u8> / MaxHeight <u8> / BaselineX <i8> / BaselineY <i8>
//!   RandomSeed <u32>
//!   DictEntry <score:i32> <ref_encode:0|1> <hex pixels>
//!   Glyph <char,char,...> <width:u8> <hex pixels>

use std::io::{BufRead, Write};

use anyhow::{bail, Context};

use crate::pixels::{pixels_from_hex, pixels_to_hex, pixels_to_text, PixelString};
use crate::DICT_SIZE;

/// Font-wide metadata. `max_width`/`max_height` describe the common glyph
/// cell; every glyph's pixel data has exactly that many pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontInfo {
  pub name: String,
  pub max_width: u8,
  pub max_height: u8,
  pub baseline_x: i8,
  pub baseline_y: i8,
  pub line_height: u8,
  pub flags: u16,
  pub default_char: u16,
}

/// One glyph cell plus the set of character codes it serves. A single entry
/// may serve several codes after deduplication. `width` is the advance
/// width and may be smaller than the cell width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphEntry {
  pub chars: Vec<u16>,
  pub width: u8,
  pub data: PixelString,
}

/// One dictionary slot. Empty `replacement` marks an unused slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictEntry {
  /// Usefulness weight maintained by the optimizer.
  pub score: i32,
  /// Encode this entry as references to other entries instead of RLE.
  pub ref_encode: bool,
  pub replacement: PixelString,
}

/// The working representation. The dictionary always holds [`DICT_SIZE`]
/// slots; the index of the lowest-scoring slot is maintained incrementally
/// so the optimizer can pick its replacement victim in O(1).
#[derive(Debug, Clone)]
pub struct DataFile {
  dictionary: Vec<DictEntry>,
  glyphs: Vec<GlyphEntry>,
  fontinfo: FontInfo,
  seed: u32,
  low_score_index: usize,
}

impl DataFile {
  /// Build a DataFile, padding the dictionary with empty slots up to
  /// capacity.
  pub fn new(mut dictionary: Vec<DictEntry>, glyphs: Vec<GlyphEntry>, fontinfo: FontInfo) -> Self {
    assert!(dictionary.len() <= DICT_SIZE, "{} entries exceed the dictionary capacity", dictionary.len());
    dictionary.resize(DICT_SIZE, DictEntry::default());
    let mut datafile = DataFile {
      dictionary,
      glyphs,
      fontinfo,
      seed: 1234,
      low_score_index: 0,
    };
    datafile.update_low_score_index();
    datafile
  }

  #[inline]
  pub fn font_info(&self) -> &FontInfo {
    &self.fontinfo
  }

  #[inline]
  pub fn glyphs(&self) -> &[GlyphEntry] {
    &self.glyphs
  }

  #[inline]
  pub fn glyph(&self, index: usize) -> &GlyphEntry {
    &self.glyphs[index]
  }

  #[inline]
  pub fn glyph_count(&self) -> usize {
    self.glyphs.len()
  }

  #[inline]
  pub fn dictionary(&self) -> &[DictEntry] {
    &self.dictionary
  }

  #[inline]
  pub fn dict_entry(&self, index: usize) -> &DictEntry {
    &self.dictionary[index]
  }

  /// Replace a dictionary slot, keeping the low-score index current.
  pub fn set_dict_entry(&mut self, index: usize, value: DictEntry) {
    let rescan = index == self.low_score_index || value.score < self.dictionary[self.low_score_index].score;
    self.dictionary[index] = value;
    if rescan {
      self.update_low_score_index();
    }
  }

  /// Index of the lowest-scoring dictionary slot.
  #[inline]
  pub fn low_score_index(&self) -> usize {
    self.low_score_index
  }

  #[inline]
  pub fn seed(&self) -> u32 {
    self.seed
  }

  #[inline]
  pub fn set_seed(&mut self, seed: u32) {
    self.seed = seed;
  }

  /// Text dump of one glyph cell, for debugging.
  pub fn glyph_to_text(&self, index: usize) -> String {
    pixels_to_text(&self.glyphs[index].data, self.fontinfo.max_width as usize)
  }

  fn update_low_score_index(&mut self) {
    let mut lowest = 0;
    for (i, d) in self.dictionary.iter().enumerate() {
      if d.score < self.dictionary[lowest].score {
        lowest = i;
      }
    }
    self.low_score_index = lowest;
  }

  /// Parse a working file. Any malformed line aborts with an error naming
  /// the line number.
  pub fn load(reader: impl BufRead) -> anyhow::Result<DataFile> {
    let mut fontinfo = FontInfo::default();
    let mut dictionary: Vec<DictEntry> = Vec::new();
    let mut glyphs: Vec<GlyphEntry> = Vec::new();
    let mut seed = 1234u32;

    for (i, line) in reader.lines().enumerate() {
      let line = line?;
      let lineno = i + 1;
      let mut fields = line.split_whitespace();
      let Some(tag) = fields.next() else { continue };

      match tag {
        "FontName" => fontinfo.name = line.trim_start()["FontName".len()..].trim().to_string(),
        "MaxWidth" => fontinfo.max_width = field(&mut fields, lineno, "MaxWidth")?,
        "MaxHeight" => fontinfo.max_height = field(&mut fields, lineno, "MaxHeight")?,
        "BaselineX" => fontinfo.baseline_x = field(&mut fields, lineno, "BaselineX")?,
        "BaselineY" => fontinfo.baseline_y = field(&mut fields, lineno, "BaselineY")?,
        "RandomSeed" => seed = field(&mut fields, lineno, "RandomSeed")?,
        "DictEntry" => {
          let score: i32 = field(&mut fields, lineno, "score")?;
          let ref_encode = match fields.next() {
            Some("0") => false,
            Some("1") => true,
            other => bail!("line {lineno}: ref_encode must be 0 or 1, got {other:?}"),
          };
          let hex = fields.next().with_context(|| format!("line {lineno}: missing pixels"))?;
          let replacement = pixels_from_hex(hex).with_context(|| format!("line {lineno}"))?;
          dictionary.push(DictEntry { score, ref_encode, replacement });
        }
        "Glyph" => {
          let chars_field = fields.next().with_context(|| format!("line {lineno}: missing chars"))?;
          let mut chars = Vec::new();
          for c in chars_field.split(',') {
            let code: u16 = c.parse().map_err(|e| anyhow::anyhow!("line {lineno}: bad char code {c:?}: {e}"))?;
            chars.push(code);
          }
          let width: u8 = field(&mut fields, lineno, "width")?;
          let hex = fields.next().with_context(|| format!("line {lineno}: missing pixels"))?;
          let data = pixels_from_hex(hex).with_context(|| format!("line {lineno}"))?;
          glyphs.push(GlyphEntry { chars, width, data });
        }
        other => bail!("line {lineno}: unknown record {other:?}"),
      }
    }

    if fontinfo.max_width == 0 || fontinfo.max_height == 0 {
      bail!("MaxWidth/MaxHeight missing or zero");
    }
    if dictionary.len() > DICT_SIZE {
      bail!("{} dictionary entries exceed the capacity of {DICT_SIZE}", dictionary.len());
    }
    let cell = fontinfo.max_width as usize * fontinfo.max_height as usize;
    for (i, g) in glyphs.iter().enumerate() {
      if g.data.len() != cell {
        bail!("glyph {i}: {} pixels, expected {cell}", g.data.len());
      }
    }
    if fontinfo.line_height == 0 {
      fontinfo.line_height = fontinfo.max_height;
    }

    let mut datafile = DataFile::new(dictionary, glyphs, fontinfo);
    datafile.set_seed(seed);
    Ok(datafile)
  }

  /// Write the working file. Empty dictionary slots are not persisted.
  pub fn save(&self, mut writer: impl Write) -> std::io::Result<()> {
    writeln!(writer, "FontName {}", self.fontinfo.name)?;
    writeln!(writer, "MaxWidth {}", self.fontinfo.max_width)?;
    writeln!(writer, "MaxHeight {}", self.fontinfo.max_height)?;
    writeln!(writer, "BaselineX {}", self.fontinfo.baseline_x)?;
    writeln!(writer, "BaselineY {}", self.fontinfo.baseline_y)?;
    writeln!(writer, "RandomSeed {}", self.seed)?;

    for d in &self.dictionary {
      if !d.replacement.is_empty() {
        writeln!(writer, "DictEntry {} {} {}", d.score, d.ref_encode as u8, pixels_to_hex(&d.replacement))?;
      }
    }

    for g in &self.glyphs {
      let chars: Vec<String> = g.chars.iter().map(u16::to_string).collect();
      writeln!(writer, "Glyph {} {} {}", chars.join(","), g.width, pixels_to_hex(&g.data))?;
    }
    Ok(())
  }
}

fn field<T>(fields: &mut std::str::SplitWhitespace, lineno: usize, what: &str) -> anyhow::Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  let s = fields.next().with_context(|| format!("line {lineno}: missing {what}"))?;
  s.parse().map_err(|e| anyhow::anyhow!("line {lineno}: bad {what} {s:?}: {e}"))
}
