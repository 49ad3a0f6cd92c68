//! vocalis-lib: Speech server engine.
//!
//! Model loading (Kokoro, remote or as a managed sidecar), chunked synthesis,
//! model download and the HTTP API. Depends on vocalis-core for pure types,
//! text chunking and WAV encoding.

pub mod download;
pub mod error;
pub mod kokoro;
pub mod manager;
pub mod model;
pub mod server;
pub mod tts;

// Re-export vocalis-core for convenience
pub use vocalis_core;
