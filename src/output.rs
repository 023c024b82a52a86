//! Output context: a packet-buffered byte sink with the DECGRI run-length
//! emitter and the DECGCI palette-state tracker layered on top.

use std::io::Write;

use crate::{SixelResult, SIXEL_OUTPUT_PACKET_SIZE, SIXEL_PALETTE_MAX};

pub(crate) const DCS_START_7BIT: &[u8] = b"\x1bP";
pub(crate) const DCS_START_8BIT: &[u8] = &[0x90];
pub(crate) const DCS_END_7BIT: &[u8] = b"\x1b\\";
pub(crate) const DCS_END_8BIT: &[u8] = &[0x9c];

/// Streaming output context for one encode.
///
/// Bytes accumulate in an internal buffer and flush to the writer whenever a
/// full packet is ready; [`Output::finish`] drains the remainder. Run state
/// and palette state reset between encodes via [`Output::reset`].
pub struct Output<W: Write> {
    writer: W,
    buffer: Vec<u8>,

    /// emit C1 single-byte DCS controls (0x90/0x9C) instead of ESC P / ESC \
    pub(crate) has_8bit_control: bool,
    /// clamp DECGRI repeat arguments to 255 (real VT240 limitation)
    pub(crate) has_gri_arg_limit: bool,
    /// suppress the DCS envelope, emitting the body only
    pub(crate) skip_dcs_envelope: bool,

    save_pixel: u8,
    save_count: usize,
    active_palette: i32,
    defined: [bool; SIXEL_PALETTE_MAX],
}

impl<W: Write> Output<W> {
    /// Create a new output context around a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(SIXEL_OUTPUT_PACKET_SIZE),
            has_8bit_control: false,
            has_gri_arg_limit: false,
            skip_dcs_envelope: false,
            save_pixel: 0,
            save_count: 0,
            active_palette: -1,
            defined: [false; SIXEL_PALETTE_MAX],
        }
    }

    /// Select 8-bit (C1) or 7-bit DCS control characters.
    pub fn set_8bit_control(&mut self, enable: bool) {
        self.has_8bit_control = enable;
    }

    /// Limit DECGRI ('!') repeat arguments to 255.
    pub fn set_gri_arg_limit(&mut self, enable: bool) {
        self.has_gri_arg_limit = enable;
    }

    /// Skip the DCS envelope around the body.
    pub fn set_skip_dcs_envelope(&mut self, skip: bool) {
        self.skip_dcs_envelope = skip;
    }

    /// Clear run and palette state for a new encode.
    pub(crate) fn reset(&mut self) {
        self.save_pixel = 0;
        self.save_count = 0;
        self.active_palette = -1;
        self.defined = [false; SIXEL_PALETTE_MAX];
    }

    fn advance(&mut self) -> SixelResult<()> {
        if self.buffer.len() >= SIXEL_OUTPUT_PACKET_SIZE {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    pub(crate) fn putc(&mut self, b: u8) -> SixelResult<()> {
        self.buffer.push(b);
        self.advance()
    }

    pub(crate) fn puts(&mut self, bytes: &[u8]) -> SixelResult<()> {
        self.buffer.extend_from_slice(bytes);
        self.advance()
    }

    /// Decimal integer, written without allocating.
    pub(crate) fn puti(&mut self, mut n: usize) -> SixelResult<()> {
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.puts(&digits[i..])
    }

    /// Flush the pending run: `!<count><char>` when the repeat introducer
    /// pays off (count > 3, since `!1X` costs the same as `XXX`), the raw
    /// character otherwise. Afterwards no pending character exists.
    pub(crate) fn put_flush_run(&mut self) -> SixelResult<()> {
        if self.has_gri_arg_limit {
            // argument of DECGRI('!') is limited to 255 in real VT hardware
            while self.save_count > 255 {
                self.puts(b"!255")?;
                self.putc(self.save_pixel)?;
                self.save_count -= 255;
            }
        }
        if self.save_count > 3 {
            // DECGRI Graphics Repeat Introducer ! Pn Ch
            self.putc(b'!')?;
            self.puti(self.save_count)?;
            self.putc(self.save_pixel)?;
        } else {
            for _ in 0..self.save_count {
                self.putc(self.save_pixel)?;
            }
        }
        self.save_pixel = 0;
        self.save_count = 0;
        Ok(())
    }

    /// Emit one sixel column. `code` is the 6-bit vertical dot pattern;
    /// values above 63 fold to blank.
    pub(crate) fn put_pixel(&mut self, code: u8) -> SixelResult<()> {
        let ch = if code > 63 { b'?' } else { code + b'?' };
        if ch == self.save_pixel {
            self.save_count += 1;
        } else {
            self.put_flush_run()?;
            self.save_pixel = ch;
            self.save_count = 1;
        }
        Ok(())
    }

    /// DECGCR Graphics Carriage Return: back to the start of the band.
    pub(crate) fn put_cr(&mut self) -> SixelResult<()> {
        self.put_flush_run()?;
        self.putc(b'$')
    }

    /// DECGNL Graphics Next Line: advance to the next six-row band.
    pub(crate) fn put_nl(&mut self) -> SixelResult<()> {
        self.put_flush_run()?;
        self.putc(b'-')
    }

    /// Select a palette register, defining it on first use.
    ///
    /// The first `select` of an index emits the full DECGCI definition
    /// `#n;2;R;G;B` (R,G,B as percentages; introducer parameter 2 means RGB)
    /// and records the index as active. Later selects emit the bare `#n`
    /// only when the active register differs.
    pub(crate) fn select_palette(&mut self, index: usize, rgb: (u8, u8, u8)) -> SixelResult<()> {
        if !self.defined[index] {
            self.putc(b'#')?;
            self.puti(index)?;
            self.puts(b";2;")?;
            self.puti(percent(rgb.0))?;
            self.putc(b';')?;
            self.puti(percent(rgb.1))?;
            self.putc(b';')?;
            self.puti(percent(rgb.2))?;
            self.defined[index] = true;
            self.active_palette = index as i32;
        } else if self.active_palette != index as i32 {
            self.putc(b'#')?;
            self.puti(index)?;
            self.active_palette = index as i32;
        }
        Ok(())
    }

    /// Drain the remaining buffered bytes to the writer.
    pub(crate) fn finish(&mut self) -> SixelResult<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Channel byte to the 0..=100 percentage the color introducer carries.
pub(crate) fn percent(channel: u8) -> usize {
    (channel as usize * 100 + 127) / 255
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<F: FnOnce(&mut Output<&mut Vec<u8>>)>(f: F) -> Vec<u8> {
        let mut sink = Vec::new();
        let mut out = Output::new(&mut sink);
        f(&mut out);
        out.finish().unwrap();
        sink
    }

    #[test]
    fn run_of_three_stays_raw() {
        let bytes = collect(|out| {
            for _ in 0..3 {
                out.put_pixel(1).unwrap();
            }
            out.put_flush_run().unwrap();
        });
        assert_eq!(bytes, b"@@@");
    }

    #[test]
    fn run_of_four_uses_repeat_introducer() {
        let bytes = collect(|out| {
            for _ in 0..4 {
                out.put_pixel(1).unwrap();
            }
            out.put_flush_run().unwrap();
        });
        assert_eq!(bytes, b"!4@");
    }

    #[test]
    fn long_run_emits_decimal_count() {
        let bytes = collect(|out| {
            for _ in 0..100 {
                out.put_pixel(63).unwrap();
            }
            out.put_flush_run().unwrap();
        });
        assert_eq!(bytes, b"!100~");
    }

    #[test]
    fn gri_limit_splits_at_255() {
        let bytes = collect(|out| {
            out.set_gri_arg_limit(true);
            for _ in 0..300 {
                out.put_pixel(0).unwrap();
            }
            out.put_flush_run().unwrap();
        });
        assert_eq!(bytes, b"!255?!45?");
    }

    #[test]
    fn pixel_change_flushes_pending() {
        let bytes = collect(|out| {
            out.put_pixel(0).unwrap();
            out.put_pixel(1).unwrap();
            out.put_flush_run().unwrap();
        });
        assert_eq!(bytes, b"?@");
    }

    #[test]
    fn select_defines_once_then_switches() {
        let bytes = collect(|out| {
            out.select_palette(1, (255, 0, 0)).unwrap();
            out.select_palette(1, (255, 0, 0)).unwrap();
            out.select_palette(0, (0, 0, 0)).unwrap();
            out.select_palette(1, (255, 0, 0)).unwrap();
        });
        assert_eq!(bytes, b"#1;2;100;0;0#0;2;0;0;0#1");
    }

    #[test]
    fn carriage_return_flushes_run_first() {
        let bytes = collect(|out| {
            for _ in 0..5 {
                out.put_pixel(2).unwrap();
            }
            out.put_cr().unwrap();
            out.put_nl().unwrap();
        });
        assert_eq!(bytes, b"!5A$-");
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percent(0), 0);
        assert_eq!(percent(255), 100);
        assert_eq!(percent(128), 50);
        assert_eq!(percent(1), 0);
        assert_eq!(percent(2), 1);
    }
}
