//! Folio Media Processing Library
//!
//! Normalizes and validates user-picked media before it reaches the object
//! store: HEIC/HEIF detection and JPEG conversion, per-category validation,
//! and the [`MediaUploader`] facade that runs the whole pipeline.

pub mod heic;
pub mod upload;
pub mod validator;

// Re-export commonly used types
pub use heic::{default_decoder, is_heic, is_heic_file, HeicConverter, HeicDecoder};
#[cfg(feature = "heif")]
pub use heic::LibheifDecoder;
pub use upload::{prepare_file, MediaUploader};
pub use validator::{content_type_for_extension, MediaValidator};
