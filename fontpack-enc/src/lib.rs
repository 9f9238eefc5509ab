//! Build-time side of the FPAK compressed bitmap font format.
//!
//! A font arrives from an external rasterizer as a table of fixed-cell
//! glyphs (4-bit alpha, one value per pixel). This crate turns that table
//! into the compact byte stream the `fontpack` runtime decoder consumes:
//!
//! - [`datafile`]: the in-memory working representation and its
//!   line-oriented text format, used to persist state between runs
//! - [`rle`] / [`trie`] / [`encode`]: the codec itself — RLE coding of
//!   dictionary entries, greedy longest-match reference coding of glyphs,
//!   byte-exact size estimation and verification decode
//! - [`optimize`]: the iterative dictionary search that shrinks the
//!   encoded size
//! - [`ranges`] / [`assemble`]: character range packing and serialization
//!   into the FPAK container
//! - [`imports`]: glyph-table hygiene between the rasterizer and the
//!   working representation

pub mod assemble;
pub mod datafile;
pub mod encode;
pub mod imports;
pub mod optimize;
pub mod pixels;
pub mod ranges;
pub mod rle;
pub mod trie;

pub use assemble::assemble;
pub use datafile::{DataFile, DictEntry, FontInfo, GlyphEntry};
pub use encode::{decode_glyph, encode_font, encoded_size, encoded_size_of, EncodedFont};
pub use optimize::{optimize, optimize_until};
pub use pixels::PixelString;

/// Number of codewords reserved ahead of the dictionary references:
/// 16 literal pixel values, the zero-fill terminator, and 7 spares.
pub const DICT_START: usize = 24;

/// Codeword that fills the rest of a glyph with zeros and terminates it.
pub const REF_FILLZEROS: u8 = 16;

/// Fixed dictionary capacity: one slot per codeword left above the
/// reserved block.
pub const DICT_SIZE: usize = 256 - DICT_START;
