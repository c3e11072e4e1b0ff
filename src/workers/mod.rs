pub mod transcoder;

pub use transcoder::TranscodePipeline;
