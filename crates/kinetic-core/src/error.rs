//! Error types for the Kinetic-DINO training system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("composite shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    CompositeShape {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("invalid frame layout: composite {composite_width}x{composite_height} is not an exact multiple of tile {tile_width}x{tile_height}")]
    FrameLayout {
        composite_width: u32,
        composite_height: u32,
        tile_width: u32,
        tile_height: u32,
    },

    #[error("unknown architecture '{name}', known architectures: {known}")]
    UnknownArchitecture { name: String, known: String },

    #[error("degenerate loss configuration: {0}")]
    DegenerateLoss(String),

    #[error("non-finite loss {value} at epoch {epoch}, step {step}")]
    NonFiniteLoss {
        value: f64,
        epoch: usize,
        step: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
