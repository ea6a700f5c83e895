pub mod config;
pub mod detect;
pub mod discover;
pub mod encode;
pub mod error;
pub mod geometry;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod resample;
pub mod scratch;
pub mod search;
pub mod strategy;

pub mod prelude {
    pub use crate::config::{OptimizeMode, PipelineConfig};
    pub use crate::error::*;
    pub use crate::pipeline::{convert_directory, convert_directory_to_pdf, ConversionReport, ConvertRequest};
    pub use crate::strategy::CompressionStrategy;
}
