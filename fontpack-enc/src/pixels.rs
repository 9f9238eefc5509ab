//! Flat pixel sequences: 4-bit alpha values stored one per byte.
//!
//! 0 is fully transparent background, 15 fully opaque ink; 1..=14 are
//! intermediate alphas. 1-bit fonts simply restrict themselves to {0, 15}.

use anyhow::bail;

/// Ordered sequence of pixels, values `0..=15`. Fixed-length when holding a
/// glyph cell, variable-length when holding a dictionary entry.
pub type PixelString = Vec<u8>;

/// Largest pixel value (fully opaque).
pub const MAX_ALPHA: u8 = 15;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Parse a run of hex digits, one pixel per digit, raster order.
pub fn pixels_from_hex(s: &str) -> anyhow::Result<PixelString> {
  let mut out = PixelString::with_capacity(s.len());
  for c in s.chars() {
    match c.to_digit(16) {
      Some(v) => out.push(v as u8),
      None => bail!("invalid pixel hex digit {c:?}"),
    }
  }
  Ok(out)
}

/// Format one uppercase hex digit per pixel.
pub fn pixels_to_hex(pixels: &[u8]) -> String {
  pixels.iter().map(|&p| HEX[(p & 0x0F) as usize] as char).collect()
}

/// Text dump of a pixel grid, one row per line: `.` for background, `X`
/// for full ink, the hex digit for intermediate shades.
pub fn pixels_to_text(pixels: &[u8], width: usize) -> String {
  let mut out = String::with_capacity(pixels.len() + pixels.len() / width.max(1));
  for row in pixels.chunks(width.max(1)) {
    for &p in row {
      out.push(match p & 0x0F {
        0 => '.',
        15 => 'X',
        p => HEX[p as usize] as char,
      });
    }
    out.push('\n');
  }
  out
}
