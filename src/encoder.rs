//! SIXEL encoder: the per-band run encoder and the pipeline driver that
//! takes raw pixels through quantize → map → encode.
//!
//! A band covers six consecutive rows. For every palette color used in the
//! band a column bitmap is built (bit r = row `y + r` carries that color),
//! the bitmap is cut into column runs, and the runs stream out sorted by
//! start column so the cursor retreats (`$`) as rarely as possible.

use std::io::Write;

use log::debug;

use crate::dither::Dither;
use crate::output::{Output, DCS_END_7BIT, DCS_END_8BIT, DCS_START_7BIT, DCS_START_8BIT};
use crate::pixelformat::normalize_pixelformat;
use crate::{
    DiffusionMethod, LookupPolicy, MethodForLargest, MethodForRep, PixelFormat, Quality,
    SixelError, SixelResult, SIXEL_HEIGHT_LIMIT, SIXEL_WIDTH_LIMIT,
};

/// Options for one encode.
///
/// The defaults reproduce the plain `img2sixel` behavior: up to 256 colors,
/// automatic dithering and lookup, 7-bit controls, no transparency.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Target palette size, 2..=256. Ignored when a palette is forced.
    pub req_colors: usize,
    /// Axis selection policy for median-cut splitting.
    pub method_for_largest: MethodForLargest,
    /// Representative-color policy for median-cut boxes.
    pub method_for_rep: MethodForRep,
    /// Palette construction quality.
    pub quality: Quality,
    /// Error-diffusion kernel.
    pub diffusion: DiffusionMethod,
    /// Nearest-color lookup strategy.
    pub lookup: LookupPolicy,
    /// Caller-supplied palette, 3 bytes per entry. Required for paletted
    /// input formats; used instead of the quantizer when `force_palette`
    /// is set.
    pub palette: Option<Vec<u8>>,
    /// Skip the quantizer and use `palette` as-is.
    pub force_palette: bool,
    /// Palette index treated as transparent background.
    pub keycolor: Option<u8>,
    /// Red-weight multiplier for skin-tone biased matching (1 = off).
    pub complexion: i32,
    /// Emit single-byte C1 DCS controls (0x90/0x9C) instead of ESC-prefixed
    /// sequences.
    pub use_8bit_controls: bool,
    /// Clamp DECGRI repeat counts to 255 for real VT240 hardware.
    pub gri_arg_limit: bool,
    /// Emit the body without its DCS envelope.
    pub skip_dcs_envelope: bool,
    /// Column runs of one color merge across gaps shorter than this many
    /// blank columns instead of restarting the run.
    pub merge_gap: usize,
    /// Histogram row-skip override; `None` derives it from the height.
    pub histogram_band_skip: Option<usize>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            req_colors: 256,
            method_for_largest: MethodForLargest::Auto,
            method_for_rep: MethodForRep::Auto,
            quality: Quality::Auto,
            diffusion: DiffusionMethod::Auto,
            lookup: LookupPolicy::Auto,
            palette: None,
            force_palette: false,
            keycolor: None,
            complexion: 1,
            use_8bit_controls: false,
            gri_arg_limit: false,
            skip_dcs_envelope: false,
            merge_gap: 10,
            histogram_band_skip: None,
        }
    }
}

/// Encode pixel data into a SIXEL string.
///
/// Only valid for 7-bit control mode; with `use_8bit_controls` the stream
/// contains raw C1 bytes and must go through [`sixel_encode_to`].
pub fn sixel_encode(
    pixels: &[u8],
    width: usize,
    height: usize,
    pixelformat: PixelFormat,
    opts: &EncodeOptions,
) -> SixelResult<String> {
    let mut bytes = Vec::new();
    sixel_encode_to(&mut bytes, pixels, width, height, pixelformat, opts)?;
    String::from_utf8(bytes).map_err(|_| {
        SixelError::BadArgument(
            "8-bit control bytes are not valid UTF-8; use sixel_encode_to".into(),
        )
    })
}

/// Encode RGB888 pixel data with default options.
pub fn sixel_encode_default(pixels: &[u8], width: usize, height: usize) -> SixelResult<String> {
    sixel_encode(
        pixels,
        width,
        height,
        PixelFormat::RGB888,
        &EncodeOptions::default(),
    )
}

/// Encode pixel data, streaming the SIXEL bytes into a writer.
pub fn sixel_encode_to<W: Write>(
    writer: W,
    pixels: &[u8],
    width: usize,
    height: usize,
    pixelformat: PixelFormat,
    opts: &EncodeOptions,
) -> SixelResult<()> {
    if width == 0 || height == 0 || width > SIXEL_WIDTH_LIMIT || height > SIXEL_HEIGHT_LIMIT {
        return Err(SixelError::InvalidDimensions { width, height });
    }
    let npixels = width
        .checked_mul(height)
        .ok_or(SixelError::IntegerOverflow)?;
    let expected = npixels
        .checked_mul(pixelformat.bytes_per_pixel())
        .ok_or(SixelError::IntegerOverflow)?;
    if pixels.len() != expected {
        return Err(SixelError::BufferSizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }

    let (mut dither, indices) = prepare_indices(pixels, width, height, pixelformat, opts)?;
    dither.set_keycolor(opts.keycolor);
    debug!(
        "encode {}x{} {:?}: {} colors ({} original)",
        width,
        height,
        pixelformat,
        dither.ncolors(),
        dither.origcolors()
    );

    let mut output = Output::new(writer);
    output.set_8bit_control(opts.use_8bit_controls);
    output.set_gri_arg_limit(opts.gri_arg_limit);
    output.set_skip_dcs_envelope(opts.skip_dcs_envelope);
    output.reset();

    encode_header(&mut output, width, height, dither.keycolor())?;
    encode_body(
        &mut output,
        &indices,
        width,
        height,
        dither.palette(),
        dither.ncolors(),
        dither.keycolor(),
        opts.merge_gap.max(1),
    )?;
    encode_footer(&mut output)
}

/// Resolve the input format into (palette context, index buffer).
fn prepare_indices(
    pixels: &[u8],
    width: usize,
    height: usize,
    pixelformat: PixelFormat,
    opts: &EncodeOptions,
) -> SixelResult<(Dither, Vec<u8>)> {
    if pixelformat.is_paletted() {
        let Some(palette) = opts.palette.as_deref() else {
            return Err(SixelError::BadArgument(
                "paletted input requires an explicit palette".into(),
            ));
        };
        let dither = Dither::with_palette(palette)?;
        let mut indices = vec![0u8; width * height];
        normalize_pixelformat(&mut indices, pixels, pixelformat, width, height)?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= dither.ncolors()) {
            return Err(SixelError::BadInput(format!(
                "palette index {bad} out of range for {} colors",
                dither.ncolors()
            )));
        }
        return Ok((dither, indices));
    }

    if pixelformat.is_grayscale() {
        // gray levels index the full 256-entry ramp directly
        let ramp: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, v]).collect();
        let dither = Dither::with_palette(&ramp)?;
        let mut indices = vec![0u8; width * height];
        normalize_pixelformat(&mut indices, pixels, pixelformat, width, height)?;
        return Ok((dither, indices));
    }

    // direct-color input: quantize, then map with error diffusion
    let mut dither = match (&opts.palette, opts.force_palette) {
        (Some(palette), true) => Dither::with_palette(palette)?,
        _ => Dither::new(opts.req_colors)?,
    };
    dither.set_method_for_largest(opts.method_for_largest);
    dither.set_method_for_rep(opts.method_for_rep);
    dither.set_quality(opts.quality);
    dither.set_diffusion(opts.diffusion);
    dither.set_lookup_policy(opts.lookup);
    dither.set_complexion(opts.complexion);
    dither.set_band_skip(opts.histogram_band_skip);

    let mut rgb = vec![0u8; width * height * 3];
    normalize_pixelformat(&mut rgb, pixels, pixelformat, width, height)?;
    dither.initialize(&rgb, width, height)?;

    let indices = if pixelformat.is_float() {
        dither.apply_palette_f32(pixels, width, height)?
    } else {
        dither.apply_palette(&rgb, width, height)?
    };
    Ok((dither, indices))
}

fn encode_header<W: Write>(
    output: &mut Output<W>,
    width: usize,
    height: usize,
    keycolor: Option<u8>,
) -> SixelResult<()> {
    if !output.skip_dcs_envelope {
        if output.has_8bit_control {
            output.puts(DCS_START_8BIT)?;
        } else {
            output.puts(DCS_START_7BIT)?;
        }
        // P2=1 keeps undrawn pixels at the terminal background
        if keycolor.is_some() {
            output.puts(b"0;1;0")?;
        }
        output.putc(b'q')?;
    }

    // raster attributes: aspect 1:1 and the pixel extent
    output.puts(b"\"1;1;")?;
    output.puti(width)?;
    output.putc(b';')?;
    output.puti(height)?;
    output.putc(b'\n')
}

fn encode_footer<W: Write>(output: &mut Output<W>) -> SixelResult<()> {
    if !output.skip_dcs_envelope {
        if output.has_8bit_control {
            output.puts(DCS_END_8BIT)?;
        } else {
            output.puts(DCS_END_7BIT)?;
        }
    }
    output.finish()
}

/// One column run of a single color within a band: columns `[sx, mx)` of
/// `map`, where each map byte is the six-bit vertical pattern.
struct Node {
    pal: usize,
    sx: usize,
    mx: usize,
    map: Vec<u8>,
}

#[allow(clippy::too_many_arguments)]
fn encode_body<W: Write>(
    output: &mut Output<W>,
    indices: &[u8],
    width: usize,
    height: usize,
    palette: &[u8],
    ncolors: usize,
    keycolor: Option<u8>,
    merge_gap: usize,
) -> SixelResult<()> {
    if palette.is_empty() {
        return Err(SixelError::BadArgument("encode_body: empty palette".into()));
    }

    let mut map = vec![0u8; ncolors * width];
    let mut row_in_band = 0u32;

    for y in 0..height {
        for x in 0..width {
            let pix = indices[y * width + x] as usize;
            if pix < ncolors && Some(pix as u8) != keycolor {
                map[pix * width + x] |= 1 << row_in_band;
            }
        }

        row_in_band += 1;
        if row_in_band < 6 && y + 1 < height {
            continue;
        }

        let mut nodes = scan_runs(&map, width, ncolors, merge_gap);
        // widest-first among runs starting at the same column keeps the
        // cursor moving right as long as possible
        nodes.sort_by(|a, b| a.sx.cmp(&b.sx).then_with(|| b.mx.cmp(&a.mx)));

        let mut x = 0usize;
        while !nodes.is_empty() {
            let node = nodes.remove(0);
            if node.sx < x {
                output.put_cr()?;
                x = 0;
            }
            x = put_node(output, x, &node, palette)?;

            let mut i = 0;
            while i < nodes.len() {
                if nodes[i].sx >= x {
                    let node = nodes.remove(i);
                    x = put_node(output, x, &node, palette)?;
                } else {
                    i += 1;
                }
            }
        }

        output.put_nl()?;
        row_in_band = 0;
        map.fill(0);
    }
    Ok(())
}

/// Cut each color plane of the band into column runs. Runs of one color
/// separated by fewer than `merge_gap` blank columns merge into a single
/// node, trading a few blank sixels for a saved `$` retreat and palette
/// reselect.
fn scan_runs(map: &[u8], width: usize, ncolors: usize, merge_gap: usize) -> Vec<Node> {
    let mut nodes = Vec::new();
    for pal in 0..ncolors {
        let plane = &map[pal * width..(pal + 1) * width];
        let mut sx = 0;
        while sx < width {
            if plane[sx] == 0 {
                sx += 1;
                continue;
            }
            let mut mx = sx + 1;
            while mx < width {
                if plane[mx] != 0 {
                    mx += 1;
                    continue;
                }
                let mut gap = 1;
                while mx + gap < width && plane[mx + gap] == 0 {
                    gap += 1;
                }
                if gap >= merge_gap || mx + gap >= width {
                    break;
                }
                mx += gap;
            }
            nodes.push(Node {
                pal,
                sx,
                mx,
                map: plane.to_vec(),
            });
            sx = mx;
        }
    }
    nodes
}

fn put_node<W: Write>(
    output: &mut Output<W>,
    mut x: usize,
    node: &Node,
    palette: &[u8],
) -> SixelResult<usize> {
    let rgb = (
        palette[node.pal * 3],
        palette[node.pal * 3 + 1],
        palette[node.pal * 3 + 2],
    );
    output.select_palette(node.pal, rgb)?;
    while x < node.sx {
        output.put_pixel(0)?;
        x += 1;
    }
    while x < node.mx {
        output.put_pixel(node.map[x])?;
        x += 1;
    }
    output.put_flush_run()?;
    Ok(x)
}
