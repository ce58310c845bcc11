//! Pipeline stages for newspaper article extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ analyze ──▶ postprocess
//! (paths)   (base64)   (VLM)       (reflow)
//! ```
//!
//! 1. [`input`]       — expand files/directories into `UploadedImage`s
//! 2. [`encode`]      — read the bytes and base64-wrap them with their MIME type
//! 3. [`analyze`]     — one structured-output model call per image; the only
//!    stage with network I/O
//! 4. [`postprocess`] — deterministic fixes for model quirks (fences, unflowed
//!    OCR line breaks, invisible characters)

pub mod analyze;
pub mod encode;
pub mod input;
pub mod postprocess;
