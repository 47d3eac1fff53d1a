pub mod archive;
pub mod chord;
pub mod config;
pub mod error;
pub mod measure;
pub mod pipeline;
pub mod transform;
pub mod xml;

pub use archive::{convert_archive, convert_bytes, convert_file, is_converted, output_path};
pub use chord::{Chord, Marking};
pub use config::{Config, StyleConfig};
pub use error::*;
pub use measure::Alignment;
pub use pipeline::{Pipeline, Style};
pub use transform::Transform;
