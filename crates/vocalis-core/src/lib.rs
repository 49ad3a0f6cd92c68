//! vocalis-core: Pure types, text chunking and WAV encoding.
//!
//! No async runtime, no network I/O.

pub mod text_prep;
pub mod types;
pub mod wav;
