//! Upload facade: convert -> validate -> name -> store.

mod pipeline;

pub use pipeline::{prepare_file, MediaUploader};
