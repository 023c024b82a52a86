//! # sixel-kit
//!
//! A pure Rust SIXEL library for encoding and decoding DEC SIXEL graphics.
//!
//! The encoder carries its own color pipeline: a median-cut palette builder
//! with optional k-means refinement, an accelerated nearest-color lookup
//! (dense cache or kd-tree), and five error-diffusion kernels. The band
//! encoder streams DECGRI-compressed runs through a buffered sink.
//!
//! ## Encoding an image to SIXEL
//!
//! ```ignore
//! use sixel_kit::{sixel_encode, EncodeOptions, PixelFormat};
//!
//! // 2 pixels, 24bpp RGB
//! let rgb = vec![255u8, 0, 0, 0, 255, 0];
//! let sixel = sixel_encode(&rgb, 2, 1, PixelFormat::RGB888, &EncodeOptions::default())?;
//! print!("{}", sixel);
//! ```
//!
//! ## Decoding SIXEL to image data
//!
//! ```ignore
//! use sixel_kit::sixel_decode;
//!
//! let sixel_data = b"\x1bPq#0;2;100;0;0#0~-\x1b\\";
//! let image = sixel_decode(sixel_data)?;
//! // image.pixels contains RGBA pixel data (4 bytes per pixel)
//! println!("{}x{}", image.width, image.height);
//! ```

use thiserror::Error;

pub mod decoder;
pub mod dither;
pub mod encoder;
pub mod lookup;
pub mod output;
pub mod pixelformat;
pub mod quant;

pub use decoder::{sixel_decode, PixelAspectRatio, SixelImage};
pub use dither::Dither;
pub use encoder::{sixel_encode, sixel_encode_default, sixel_encode_to, EncodeOptions};

/// Errors that can occur during SIXEL encoding or decoding.
#[derive(Debug, Error)]
pub enum SixelError {
    /// Invalid image dimensions (width or height is zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Out-of-range parameter at an API boundary
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Pixel data inconsistent with the declared format
    #[error("bad input: {0}")]
    BadInput(String),

    /// Invalid SIXEL data format
    #[error("invalid SIXEL data: {0}")]
    InvalidData(String),

    /// Color quantization failed
    #[error("quantization error: {0}")]
    Quantization(String),

    /// Integer overflow during processing
    #[error("integer overflow")]
    IntegerOverflow,

    /// The output sink reported a write failure
    #[error("write error")]
    Io(#[from] std::io::Error),
}

/// Result type for SIXEL operations.
pub type SixelResult<T> = core::result::Result<T, SixelError>;

/// Maximum number of palette registers addressable in a SIXEL stream.
pub const SIXEL_PALETTE_MAX: usize = 256;

pub(crate) const SIXEL_OUTPUT_PACKET_SIZE: usize = 16384;
pub(crate) const SIXEL_WIDTH_LIMIT: usize = 1000000;
pub(crate) const SIXEL_HEIGHT_LIMIT: usize = 1000000;

/// Method for finding the largest dimension of a median-cut box for
/// splitting, and sorting by that component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MethodForLargest {
    /// choose the method automatically
    #[default]
    Auto,
    /// simply compare the range in RGB space
    Norm,
    /// weight the ranges by luminosity before the comparison
    Lum,
}

/// Method for choosing the representative color of a median-cut box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MethodForRep {
    /// choose the method automatically
    #[default]
    Auto,
    /// geometric center of the box
    CenterBox,
    /// unweighted mean of the colors in the box (Heckbert's paper)
    AverageColors,
    /// mean of the pixels in the box, weighted by sample count
    AveragePixels,
}

/// Error-diffusion kernel selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffusionMethod {
    /// choose a kernel automatically from the palette size
    #[default]
    Auto,
    /// don't diffuse
    None,
    /// Bill Atkinson's method
    Atkinson,
    /// Floyd-Steinberg method
    FS,
    /// Jarvis, Judice & Ninke method
    JaJuNi,
    /// Stucki's method
    Stucki,
    /// Burkes' method
    Burkes,
}

/// Palette construction quality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Quality {
    /// choose the quality mode automatically
    #[default]
    Auto,
    /// high quality: 6-bit histogram and k-means refinement
    High,
    /// low quality: 5-bit histogram, no refinement
    Low,
}

/// Strategy for mapping a pixel to its nearest palette index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LookupPolicy {
    /// choose the strategy automatically
    #[default]
    Auto,
    /// linear scan over the palette on every pixel
    None,
    /// dense cache indexed by a 5-bit-per-channel coarse color
    Bits5,
    /// dense cache indexed by a 6-bit-per-channel coarse color
    Bits6,
    /// exact nearest-neighbor search over a kd-tree of the palette
    CertLut,
}

/// Pixel format of input image data.
///
/// The discriminant values follow the libsixel constants: bit 6 marks
/// grayscale formats, bit 7 marks paletted formats, and RGB888 is 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 15bpp packed RGB
    RGB555 = 1,
    /// 16bpp packed RGB
    RGB565 = 2,
    /// 24bpp RGB
    RGB888 = 3,
    /// 15bpp packed BGR
    BGR555 = 4,
    /// 16bpp packed BGR
    BGR565 = 5,
    /// 24bpp BGR
    BGR888 = 6,
    /// 32bpp ARGB
    ARGB8888 = 0x10,
    /// 32bpp RGBA
    RGBA8888 = 0x11,
    /// 32bpp ABGR
    ABGR8888 = 0x12,
    /// 32bpp BGRA
    BGRA8888 = 0x13,
    /// 96bpp RGB, three IEEE-754 floats per pixel in [0, 1]
    RGBF32 = 0x23,
    /// 1bpp grayscale
    G1 = 0x40,
    /// 2bpp grayscale
    G2 = 0x41,
    /// 4bpp grayscale
    G4 = 0x42,
    /// 8bpp grayscale
    G8 = 0x43,
    /// 16bpp alpha+gray
    AG88 = 0x53,
    /// 16bpp gray+alpha
    GA88 = 0x63,
    /// 1bpp palette
    PAL1 = 0x80,
    /// 2bpp palette
    PAL2 = 0x81,
    /// 4bpp palette
    PAL4 = 0x82,
    /// 8bpp palette
    PAL8 = 0x83,
}
