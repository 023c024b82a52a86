//! Dither context: owns the working palette and maps source pixels to
//! palette indices, forward-propagating the quantization residual with one
//! of five error-diffusion kernels.
//!
//! Residuals are carried in three rotating rows of signed 32-bit
//! accumulators, one per channel, so no weight combination can overflow or
//! clip before distribution. Taps that would land outside the image are
//! discarded without renormalization.

use log::debug;

use crate::lookup::{FloatLut, Lut};
use crate::pixelformat::get_rgbf32;
use crate::quant::make_palette;
use crate::{
    DiffusionMethod, LookupPolicy, MethodForLargest, MethodForRep, Quality, SixelError,
    SixelResult, SIXEL_PALETTE_MAX,
};

#[derive(Clone, Copy)]
struct Tap {
    dx: i32,
    dy: i32,
    weight: i32,
}

struct Kernel {
    divisor: i32,
    taps: &'static [Tap],
}

const fn tap(dx: i32, dy: i32, weight: i32) -> Tap {
    Tap { dx, dy, weight }
}

/* Floyd-Steinberg
 *          curr    7/16
 *  3/16    5/16    1/16
 */
static FLOYD_STEINBERG: Kernel = Kernel {
    divisor: 16,
    taps: &[tap(1, 0, 7), tap(-1, 1, 3), tap(0, 1, 5), tap(1, 1, 1)],
};

/* Atkinson
 *          curr    1/8    1/8
 *   1/8     1/8    1/8
 *           1/8
 */
static ATKINSON: Kernel = Kernel {
    divisor: 8,
    taps: &[
        tap(1, 0, 1),
        tap(2, 0, 1),
        tap(-1, 1, 1),
        tap(0, 1, 1),
        tap(1, 1, 1),
        tap(0, 2, 1),
    ],
};

/* Jarvis, Judice & Ninke
 *                  curr    7/48    5/48
 *  3/48    5/48    7/48    5/48    3/48
 *  1/48    3/48    5/48    3/48    1/48
 */
static JAJUNI: Kernel = Kernel {
    divisor: 48,
    taps: &[
        tap(1, 0, 7),
        tap(2, 0, 5),
        tap(-2, 1, 3),
        tap(-1, 1, 5),
        tap(0, 1, 7),
        tap(1, 1, 5),
        tap(2, 1, 3),
        tap(-2, 2, 1),
        tap(-1, 2, 3),
        tap(0, 2, 5),
        tap(1, 2, 3),
        tap(2, 2, 1),
    ],
};

/* Stucki
 *                  curr    8/42    4/42
 *  2/42    4/42    8/42    4/42    2/42
 *  1/42    2/42    4/42    2/42    1/42
 */
static STUCKI: Kernel = Kernel {
    divisor: 42,
    taps: &[
        tap(1, 0, 8),
        tap(2, 0, 4),
        tap(-2, 1, 2),
        tap(-1, 1, 4),
        tap(0, 1, 8),
        tap(1, 1, 4),
        tap(2, 1, 2),
        tap(-2, 2, 1),
        tap(-1, 2, 2),
        tap(0, 2, 4),
        tap(1, 2, 2),
        tap(2, 2, 1),
    ],
};

/* Burkes
 *                  curr    8/32    4/32
 *  2/32    4/32    8/32    4/32    2/32
 */
static BURKES: Kernel = Kernel {
    divisor: 32,
    taps: &[
        tap(1, 0, 8),
        tap(2, 0, 4),
        tap(-2, 1, 2),
        tap(-1, 1, 4),
        tap(0, 1, 8),
        tap(1, 1, 4),
        tap(2, 1, 2),
    ],
};

impl DiffusionMethod {
    /// Resolve AUTO by palette size: Floyd-Steinberg for rich palettes,
    /// Atkinson for small ones, nothing for a single color.
    pub(crate) fn resolve(self, ncolors: usize) -> DiffusionMethod {
        match self {
            DiffusionMethod::Auto => {
                if ncolors >= 16 {
                    DiffusionMethod::FS
                } else if ncolors >= 2 {
                    DiffusionMethod::Atkinson
                } else {
                    DiffusionMethod::None
                }
            }
            other => other,
        }
    }

    fn kernel(self) -> Option<&'static Kernel> {
        match self {
            DiffusionMethod::Auto | DiffusionMethod::None => None,
            DiffusionMethod::FS => Some(&FLOYD_STEINBERG),
            DiffusionMethod::Atkinson => Some(&ATKINSON),
            DiffusionMethod::JaJuNi => Some(&JAJUNI),
            DiffusionMethod::Stucki => Some(&STUCKI),
            DiffusionMethod::Burkes => Some(&BURKES),
        }
    }
}

/// Quantization context for one encode: palette, mapping policies and the
/// residual state of the active dither kernel.
pub struct Dither {
    palette: Vec<u8>,
    ncolors: usize,
    origcolors: usize,
    reqcolors: usize,
    forced_palette: bool,
    keycolor: Option<u8>,
    complexion: i32,
    method_for_largest: MethodForLargest,
    method_for_rep: MethodForRep,
    quality: Quality,
    diffusion: DiffusionMethod,
    lookup_policy: LookupPolicy,
    band_skip: Option<usize>,
}

impl Dither {
    /// Create a context that will build its own palette of at most
    /// `reqcolors` entries (2..=256).
    pub fn new(reqcolors: usize) -> SixelResult<Self> {
        if !(2..=SIXEL_PALETTE_MAX).contains(&reqcolors) {
            return Err(SixelError::BadArgument(format!(
                "requested colors must be in 2..=256, got {reqcolors}"
            )));
        }
        Ok(Self {
            palette: Vec::new(),
            ncolors: 0,
            origcolors: 0,
            reqcolors,
            forced_palette: false,
            keycolor: None,
            complexion: 1,
            method_for_largest: MethodForLargest::Auto,
            method_for_rep: MethodForRep::Auto,
            quality: Quality::Auto,
            diffusion: DiffusionMethod::Auto,
            lookup_policy: LookupPolicy::Auto,
            band_skip: None,
        })
    }

    /// Create a context around a caller-supplied palette (3 bytes per
    /// entry); the quantizer is skipped entirely.
    pub fn with_palette(palette: &[u8]) -> SixelResult<Self> {
        if palette.is_empty() || palette.len() % 3 != 0 || palette.len() / 3 > SIXEL_PALETTE_MAX {
            return Err(SixelError::BadArgument(format!(
                "palette must hold 1..=256 RGB entries, got {} bytes",
                palette.len()
            )));
        }
        let ncolors = palette.len() / 3;
        let mut dither = Self::new(ncolors.max(2))?;
        dither.palette = palette.to_vec();
        dither.ncolors = ncolors;
        dither.origcolors = ncolors;
        dither.forced_palette = true;
        Ok(dither)
    }

    pub fn set_method_for_largest(&mut self, method: MethodForLargest) {
        self.method_for_largest = method;
    }

    pub fn set_method_for_rep(&mut self, method: MethodForRep) {
        self.method_for_rep = method;
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn set_diffusion(&mut self, diffusion: DiffusionMethod) {
        self.diffusion = diffusion;
    }

    pub fn set_lookup_policy(&mut self, policy: LookupPolicy) {
        self.lookup_policy = policy;
    }

    /// Complexion factor: scales the red-channel weight of every distance
    /// computation to bias matching toward skin tones.
    pub fn set_complexion(&mut self, complexion: i32) {
        self.complexion = complexion.max(1);
    }

    /// Mark one palette index as the transparent background.
    pub fn set_keycolor(&mut self, keycolor: Option<u8>) {
        self.keycolor = keycolor;
    }

    /// Override the histogram row-skip used for large images.
    pub fn set_band_skip(&mut self, band_skip: Option<usize>) {
        self.band_skip = band_skip;
    }

    pub fn palette(&self) -> &[u8] {
        &self.palette
    }

    pub fn ncolors(&self) -> usize {
        self.ncolors
    }

    /// Distinct coarse colors counted in the source image, filled in by
    /// [`Dither::initialize`].
    pub fn origcolors(&self) -> usize {
        self.origcolors
    }

    pub(crate) fn keycolor(&self) -> Option<u8> {
        self.keycolor
    }

    /// Build the palette from an RGB888 buffer. A no-op for forced
    /// palettes.
    pub fn initialize(&mut self, rgb: &[u8], width: usize, height: usize) -> SixelResult<()> {
        if self.forced_palette {
            return Ok(());
        }
        let (palette, origcolors) = make_palette(
            rgb,
            width,
            height,
            self.reqcolors,
            self.method_for_largest,
            self.method_for_rep,
            self.quality,
            self.complexion,
            self.band_skip,
        )?;
        self.ncolors = palette.len() / 3;
        self.origcolors = origcolors;
        self.palette = palette;
        if self.ncolors == 0 {
            return Err(SixelError::Quantization("palette came out empty".into()));
        }
        debug!(
            "palette: {} colors from {} original",
            self.ncolors, self.origcolors
        );
        Ok(())
    }

    /// Map an RGB888 buffer to palette indices, diffusing the residual of
    /// each lookup with the active kernel.
    pub fn apply_palette(&mut self, rgb: &[u8], width: usize, height: usize) -> SixelResult<Vec<u8>> {
        if self.ncolors == 0 {
            return Err(SixelError::BadArgument(
                "apply_palette called before initialize".into(),
            ));
        }
        let kernel = self.diffusion.resolve(self.ncolors).kernel();
        let mut lut = Lut::new(self.lookup_policy);
        lut.configure(&self.palette, self.ncolors, self.complexion);

        let mut result = vec![0u8; width * height];
        let mut rows = [
            vec![0i32; width * 3],
            vec![0i32; width * 3],
            vec![0i32; width * 3],
        ];

        for y in 0..height {
            for x in 0..width {
                let pos = y * width + x;
                let mut target = [0u8; 3];
                for c in 0..3 {
                    let v = rgb[pos * 3 + c] as i32 + rows[0][x * 3 + c];
                    target[c] = v.clamp(0, 255) as u8;
                }
                let index = lut.map(target);
                result[pos] = index as u8;

                let Some(kernel) = kernel else {
                    continue;
                };
                for c in 0..3 {
                    let error = target[c] as i32 - self.palette[index * 3 + c] as i32;
                    if error == 0 {
                        continue;
                    }
                    for t in kernel.taps {
                        let nx = x as i32 + t.dx;
                        if nx < 0
                            || nx >= width as i32
                            || y + t.dy as usize >= height
                        {
                            continue;
                        }
                        rows[t.dy as usize][nx as usize * 3 + c] +=
                            error * t.weight / kernel.divisor;
                    }
                }
            }
            rows.swap(0, 1);
            rows.swap(1, 2);
            rows[2].fill(0);
        }
        Ok(result)
    }

    /// Float-precision variant of [`Dither::apply_palette`] for RGB_FLOAT32
    /// input: components stay IEEE-754 all the way into the distance
    /// computation, no byte quantization happens before the lookup.
    pub fn apply_palette_f32(
        &mut self,
        data: &[u8],
        width: usize,
        height: usize,
    ) -> SixelResult<Vec<u8>> {
        if self.ncolors == 0 {
            return Err(SixelError::BadArgument(
                "apply_palette_f32 called before initialize".into(),
            ));
        }
        let kernel = self.diffusion.resolve(self.ncolors).kernel();
        let mut lut = FloatLut::new(self.lookup_policy);
        lut.configure(&self.palette, self.ncolors, self.complexion);

        let mut result = vec![0u8; width * height];
        let mut rows = [
            vec![0f32; width * 3],
            vec![0f32; width * 3],
            vec![0f32; width * 3],
        ];

        for y in 0..height {
            for x in 0..width {
                let pos = y * width + x;
                let sample = get_rgbf32(data, pos);
                let mut target = [0f32; 3];
                for c in 0..3 {
                    target[c] = (sample[c] + rows[0][x * 3 + c]).clamp(0.0, 1.0);
                }
                let index = lut.map(target);
                result[pos] = index as u8;

                let Some(kernel) = kernel else {
                    continue;
                };
                for c in 0..3 {
                    let error = target[c] - self.palette[index * 3 + c] as f32 / 255.0;
                    for t in kernel.taps {
                        let nx = x as i32 + t.dx;
                        if nx < 0
                            || nx >= width as i32
                            || y + t.dy as usize >= height
                        {
                            continue;
                        }
                        rows[t.dy as usize][nx as usize * 3 + c] +=
                            error * t.weight as f32 / kernel.divisor as f32;
                    }
                }
            }
            rows.swap(0, 1);
            rows.swap(1, 2);
            rows[2].fill(0.0);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_weights_sum_to_divisor() {
        for (name, kernel) in [
            ("fs", &FLOYD_STEINBERG),
            ("jajuni", &JAJUNI),
            ("stucki", &STUCKI),
            ("burkes", &BURKES),
        ] {
            let sum: i32 = kernel.taps.iter().map(|t| t.weight).sum();
            assert_eq!(sum, kernel.divisor, "kernel {name}");
        }
        // Atkinson deliberately diffuses only 6/8 of the error
        let sum: i32 = ATKINSON.taps.iter().map(|t| t.weight).sum();
        assert_eq!(sum, 6);
        assert_eq!(ATKINSON.divisor, 8);
    }

    #[test]
    fn auto_resolution_follows_palette_size() {
        assert_eq!(
            DiffusionMethod::Auto.resolve(256),
            DiffusionMethod::FS
        );
        assert_eq!(
            DiffusionMethod::Auto.resolve(16),
            DiffusionMethod::FS
        );
        assert_eq!(
            DiffusionMethod::Auto.resolve(4),
            DiffusionMethod::Atkinson
        );
        assert_eq!(
            DiffusionMethod::Auto.resolve(1),
            DiffusionMethod::None
        );
        assert_eq!(
            DiffusionMethod::Stucki.resolve(256),
            DiffusionMethod::Stucki
        );
    }

    #[test]
    fn reqcolors_out_of_range_is_rejected() {
        assert!(Dither::new(1).is_err());
        assert!(Dither::new(257).is_err());
        assert!(Dither::new(2).is_ok());
        assert!(Dither::new(256).is_ok());
    }

    #[test]
    fn forced_palette_skips_quantizer() {
        let palette = [0u8, 0, 0, 255, 255, 255];
        let mut dither = Dither::with_palette(&palette).unwrap();
        // initialize must not replace the palette
        let rgb = [10u8, 10, 10, 200, 200, 200];
        dither.initialize(&rgb, 2, 1).unwrap();
        assert_eq!(dither.palette(), &palette);
        assert_eq!(dither.ncolors(), 2);
    }

    #[test]
    fn mapping_without_dither_picks_nearest() {
        let palette = [0u8, 0, 0, 255, 255, 255];
        let mut dither = Dither::with_palette(&palette).unwrap();
        dither.set_diffusion(DiffusionMethod::None);
        let rgb = [
            10u8, 10, 10, // near black
            250, 250, 250, // near white
            0, 0, 0, // black
            255, 255, 255, // white
        ];
        let indices = dither.apply_palette(&rgb, 4, 1).unwrap();
        assert_eq!(indices, vec![0, 1, 0, 1]);
    }

    #[test]
    fn single_pixel_image_does_not_panic_with_any_kernel() {
        let palette = [0u8, 0, 0, 255, 255, 255];
        for diffusion in [
            DiffusionMethod::None,
            DiffusionMethod::FS,
            DiffusionMethod::Atkinson,
            DiffusionMethod::JaJuNi,
            DiffusionMethod::Stucki,
            DiffusionMethod::Burkes,
        ] {
            let mut dither = Dither::with_palette(&palette).unwrap();
            dither.set_diffusion(diffusion);
            let indices = dither.apply_palette(&[128, 128, 128], 1, 1).unwrap();
            assert_eq!(indices.len(), 1, "diffusion {diffusion:?}");
        }
    }

    #[test]
    fn fs_dither_balances_mid_gray() {
        // a 16x16 mid-gray field against a black/white palette must come
        // out roughly half black, half white
        let palette = [0u8, 0, 0, 255, 255, 255];
        let mut dither = Dither::with_palette(&palette).unwrap();
        dither.set_diffusion(DiffusionMethod::FS);
        let rgb: Vec<u8> = std::iter::repeat([127u8, 127, 127])
            .take(16 * 16)
            .flatten()
            .collect();
        let indices = dither.apply_palette(&rgb, 16, 16).unwrap();
        let whites = indices.iter().filter(|&&i| i == 1).count();
        assert!(
            (64..=192).contains(&whites),
            "expected a mixed field, got {whites}/256 white"
        );
    }

    #[test]
    fn float_mapping_matches_byte_mapping_on_exact_colors() {
        let palette = [0u8, 0, 0, 128, 128, 128, 255, 255, 255];
        let mut dither = Dither::with_palette(&palette).unwrap();
        dither.set_diffusion(DiffusionMethod::None);
        let mut data = Vec::new();
        for v in [0.0f32, 0.5, 1.0] {
            for _ in 0..3 {
                data.extend_from_slice(&v.to_ne_bytes());
            }
        }
        let indices = dither.apply_palette_f32(&data, 3, 1).unwrap();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
