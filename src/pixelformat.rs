//! Pixel-format helpers: bytes-per-pixel accounting, channel unpacking and
//! normalization of the supported input formats down to RGB888 or PAL8.

use crate::{PixelFormat, SixelError, SixelResult};

impl PixelFormat {
    /// Storage size of one pixel in bytes.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::RGBF32 => 12,
            PixelFormat::ARGB8888
            | PixelFormat::RGBA8888
            | PixelFormat::ABGR8888
            | PixelFormat::BGRA8888 => 4,
            PixelFormat::RGB888 | PixelFormat::BGR888 => 3,
            PixelFormat::RGB555
            | PixelFormat::RGB565
            | PixelFormat::BGR555
            | PixelFormat::BGR565
            | PixelFormat::AG88
            | PixelFormat::GA88 => 2,
            PixelFormat::G1
            | PixelFormat::G2
            | PixelFormat::G4
            | PixelFormat::G8
            | PixelFormat::PAL1
            | PixelFormat::PAL2
            | PixelFormat::PAL4
            | PixelFormat::PAL8 => 1,
        }
    }

    /// True for the paletted (indexed) formats.
    pub fn is_paletted(self) -> bool {
        matches!(
            self,
            PixelFormat::PAL1 | PixelFormat::PAL2 | PixelFormat::PAL4 | PixelFormat::PAL8
        )
    }

    /// True for the grayscale formats, with or without alpha.
    pub fn is_grayscale(self) -> bool {
        matches!(
            self,
            PixelFormat::G1
                | PixelFormat::G2
                | PixelFormat::G4
                | PixelFormat::G8
                | PixelFormat::AG88
                | PixelFormat::GA88
        )
    }

    /// True when pixel components are IEEE-754 floats.
    pub fn is_float(self) -> bool {
        matches!(self, PixelFormat::RGBF32)
    }

    /// Packing width in bits for sub-byte paletted/grayscale formats.
    fn bits_per_index(self) -> Option<usize> {
        match self {
            PixelFormat::PAL1 | PixelFormat::G1 => Some(1),
            PixelFormat::PAL2 | PixelFormat::G2 => Some(2),
            PixelFormat::PAL4 | PixelFormat::G4 => Some(4),
            _ => None,
        }
    }
}

/// Unpack one pixel at the head of `data` into 8-bit RGB.
pub(crate) fn get_rgb(data: &[u8], pixelformat: PixelFormat, depth: usize) -> (u8, u8, u8) {
    let mut pixels: u32 = 0;
    for &b in &data[..depth] {
        pixels = (pixels << 8) | b as u32;
    }
    let (r, g, b) = match pixelformat {
        PixelFormat::RGB555 => (
            ((pixels >> 10) & 0x1f) << 3,
            ((pixels >> 5) & 0x1f) << 3,
            (pixels & 0x1f) << 3,
        ),
        PixelFormat::RGB565 => (
            ((pixels >> 11) & 0x1f) << 3,
            ((pixels >> 5) & 0x3f) << 2,
            (pixels & 0x1f) << 3,
        ),
        PixelFormat::RGB888 => ((pixels >> 16) & 0xff, (pixels >> 8) & 0xff, pixels & 0xff),
        PixelFormat::BGR555 => (
            (pixels & 0x1f) << 3,
            ((pixels >> 5) & 0x1f) << 3,
            ((pixels >> 10) & 0x1f) << 3,
        ),
        PixelFormat::BGR565 => (
            (pixels & 0x1f) << 3,
            ((pixels >> 5) & 0x3f) << 2,
            ((pixels >> 11) & 0x1f) << 3,
        ),
        PixelFormat::BGR888 => (pixels & 0xff, (pixels >> 8) & 0xff, (pixels >> 16) & 0xff),
        PixelFormat::ARGB8888 => ((pixels >> 16) & 0xff, (pixels >> 8) & 0xff, pixels & 0xff),
        PixelFormat::RGBA8888 => (
            (pixels >> 24) & 0xff,
            (pixels >> 16) & 0xff,
            (pixels >> 8) & 0xff,
        ),
        PixelFormat::ABGR8888 => (pixels & 0xff, (pixels >> 8) & 0xff, (pixels >> 16) & 0xff),
        PixelFormat::BGRA8888 => (
            (pixels >> 8) & 0xff,
            (pixels >> 16) & 0xff,
            (pixels >> 24) & 0xff,
        ),
        PixelFormat::G8 | PixelFormat::AG88 => (pixels & 0xff, pixels & 0xff, pixels & 0xff),
        PixelFormat::GA88 => (
            (pixels >> 8) & 0xff,
            (pixels >> 8) & 0xff,
            (pixels >> 8) & 0xff,
        ),
        _ => (0, 0, 0),
    };
    (r as u8, g as u8, b as u8)
}

/// Read the three float components of an RGBF32 pixel.
pub(crate) fn get_rgbf32(data: &[u8], index: usize) -> [f32; 3] {
    let base = index * 12;
    let mut out = [0f32; 3];
    for (n, slot) in out.iter_mut().enumerate() {
        let off = base + n * 4;
        let bytes = [data[off], data[off + 1], data[off + 2], data[off + 3]];
        *slot = f32::from_ne_bytes(bytes);
    }
    out
}

fn expand_rgb(dst: &mut [u8], src: &[u8], width: usize, height: usize, pixelformat: PixelFormat) {
    let depth = pixelformat.bytes_per_pixel();
    for pos in 0..width * height {
        let (r, g, b) = get_rgb(&src[pos * depth..], pixelformat, depth);
        dst[pos * 3] = r;
        dst[pos * 3 + 1] = g;
        dst[pos * 3 + 2] = b;
    }
}

fn expand_rgbf32(dst: &mut [u8], src: &[u8], width: usize, height: usize) {
    for pos in 0..width * height {
        let sample = get_rgbf32(src, pos);
        for n in 0..3 {
            dst[pos * 3 + n] = (sample[n].clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        }
    }
}

/// Unpack a sub-byte indexed/grayscale buffer into one index byte per pixel.
/// Packing is LSB-first: the first pixel of a byte sits in its low bits.
fn expand_indices(
    dst: &mut [u8],
    src: &[u8],
    width: usize,
    height: usize,
    pixelformat: PixelFormat,
) -> SixelResult<()> {
    let Some(bpp) = pixelformat.bits_per_index() else {
        return Err(SixelError::BadArgument(format!(
            "expand_indices: {pixelformat:?} is not a packed format"
        )));
    };
    let mask = (1u8 << bpp) - 1;
    let per_byte = 8 / bpp;
    let stride = width.div_ceil(per_byte);
    for y in 0..height {
        for x in 0..width {
            let byte = src[y * stride + x / per_byte];
            let shift = (x % per_byte) * bpp;
            dst[y * width + x] = (byte >> shift) & mask;
        }
    }
    Ok(())
}

/// Rescale the sub-byte grayscale levels onto the 0..=255 range so they can
/// index the full gray ramp.
fn scale_gray_levels(dst: &mut [u8], bpp: usize) {
    let max = (1u16 << bpp) - 1;
    for v in dst.iter_mut() {
        *v = (*v as u16 * 255 / max) as u8;
    }
}

/// Normalize `src` into `dst`, returning the format of the result: RGB888
/// for all direct-color inputs, PAL8 for indexed inputs, G8 for grayscale.
///
/// `dst` must hold `width * height * 3` bytes for direct-color sources and
/// `width * height` bytes for indexed/grayscale ones.
pub fn normalize_pixelformat(
    dst: &mut [u8],
    src: &[u8],
    pixelformat: PixelFormat,
    width: usize,
    height: usize,
) -> SixelResult<PixelFormat> {
    match pixelformat {
        PixelFormat::RGB555
        | PixelFormat::RGB565
        | PixelFormat::BGR555
        | PixelFormat::BGR565
        | PixelFormat::RGB888
        | PixelFormat::BGR888
        | PixelFormat::ARGB8888
        | PixelFormat::RGBA8888
        | PixelFormat::ABGR8888
        | PixelFormat::BGRA8888 => {
            expand_rgb(dst, src, width, height, pixelformat);
            Ok(PixelFormat::RGB888)
        }
        PixelFormat::RGBF32 => {
            expand_rgbf32(dst, src, width, height);
            Ok(PixelFormat::RGB888)
        }
        PixelFormat::PAL1 | PixelFormat::PAL2 | PixelFormat::PAL4 => {
            expand_indices(dst, src, width, height, pixelformat)?;
            Ok(PixelFormat::PAL8)
        }
        PixelFormat::G1 | PixelFormat::G2 | PixelFormat::G4 => {
            expand_indices(dst, src, width, height, pixelformat)?;
            scale_gray_levels(
                &mut dst[..width * height],
                pixelformat.bits_per_index().unwrap_or(8),
            );
            Ok(PixelFormat::G8)
        }
        PixelFormat::G8 | PixelFormat::PAL8 => {
            dst[..width * height].copy_from_slice(&src[..width * height]);
            Ok(pixelformat)
        }
        PixelFormat::AG88 => {
            for pos in 0..width * height {
                dst[pos] = src[pos * 2 + 1];
            }
            Ok(PixelFormat::G8)
        }
        PixelFormat::GA88 => {
            for pos in 0..width * height {
                dst[pos] = src[pos * 2];
            }
            Ok(PixelFormat::G8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_matches_format_table() {
        assert_eq!(PixelFormat::RGB888.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::RGBA8888.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::RGB565.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::PAL8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::RGBF32.bytes_per_pixel(), 12);
    }

    #[test]
    fn rgb565_expands_high_bits() {
        // pure red in RGB565: rrrrr000 00000000
        let src = [0xf8u8, 0x00];
        let (r, g, b) = get_rgb(&src, PixelFormat::RGB565, 2);
        assert_eq!((r, g, b), (0xf8, 0, 0));
    }

    #[test]
    fn bgr888_swaps_channels() {
        let src = [10u8, 20, 30];
        let (r, g, b) = get_rgb(&src, PixelFormat::BGR888, 3);
        assert_eq!((r, g, b), (30, 20, 10));
    }

    #[test]
    fn pal1_unpacks_lsb_first() {
        // 0b0000_0101 -> pixels 1,0,1,0,0,0,0,0
        let src = [0b0000_0101u8];
        let mut dst = [0u8; 8];
        let fmt = normalize_pixelformat(&mut dst, &src, PixelFormat::PAL1, 8, 1).unwrap();
        assert_eq!(fmt, PixelFormat::PAL8);
        assert_eq!(dst, [1, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn g2_scales_to_full_range() {
        let src = [0b1110_0100u8]; // levels 0,1,2,3
        let mut dst = [0u8; 4];
        let fmt = normalize_pixelformat(&mut dst, &src, PixelFormat::G2, 4, 1).unwrap();
        assert_eq!(fmt, PixelFormat::G8);
        assert_eq!(dst, [0, 85, 170, 255]);
    }

    #[test]
    fn rgbf32_rounds_to_bytes() {
        let mut src = Vec::new();
        for v in [0.0f32, 0.5, 1.0] {
            src.extend_from_slice(&v.to_ne_bytes());
        }
        let mut dst = [0u8; 3];
        normalize_pixelformat(&mut dst, &src, PixelFormat::RGBF32, 1, 1).unwrap();
        assert_eq!(dst, [0, 128, 255]);
    }
}
