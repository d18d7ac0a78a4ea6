//! RGBA8 paint target for one composite frame.

use bytes::Bytes;
use gridcast_core::{Error, Result};
use gridcast_media::VideoFrame;

use crate::layout::Rect;

/// Fixed-size pixel buffer the redraw loop paints each tick.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
        };
        canvas.clear();
        canvas
    }

    /// Reset every pixel to opaque black.
    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }

    /// Scale `frame` into `rect` with nearest-neighbor sampling.
    ///
    /// Fails with [`Error::TransientRender`] when the frame buffer does not
    /// match its declared dimensions or the cell falls outside the canvas.
    /// The rest of the canvas is left untouched on failure.
    pub fn draw(&mut self, frame: &VideoFrame, rect: Rect) -> Result<()> {
        if !frame.is_well_formed() {
            return Err(Error::TransientRender(format!(
                "malformed frame: {}x{} with {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        if rect.w == 0
            || rect.h == 0
            || rect.x + rect.w > self.width
            || rect.y + rect.h > self.height
        {
            return Err(Error::TransientRender(format!(
                "cell {}x{}+{}+{} outside {}x{} canvas",
                rect.w, rect.h, rect.x, rect.y, self.width, self.height
            )));
        }

        for dy in 0..rect.h {
            let sy = (u64::from(dy) * u64::from(frame.height) / u64::from(rect.h)) as usize;
            let src_row = sy * frame.width as usize * 4;
            let dst_row = ((rect.y + dy) as usize * self.width as usize + rect.x as usize) * 4;
            for dx in 0..rect.w {
                let sx = (u64::from(dx) * u64::from(frame.width) / u64::from(rect.w)) as usize;
                let src = src_row + sx * 4;
                let dst = dst_row + dx as usize * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
            }
        }
        Ok(())
    }

    /// Snapshot the canvas as a publishable frame.
    #[must_use]
    pub fn capture(&self) -> VideoFrame {
        VideoFrame::new(self.width, self.height, Bytes::copy_from_slice(&self.pixels))
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[at..at + 4]);
        Some(px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    #[test]
    fn test_draw_fills_only_the_cell() {
        let mut canvas = Canvas::new(8, 8);
        let frame = VideoFrame::filled(2, 2, RED);
        let cell = Rect {
            x: 0,
            y: 0,
            w: 4,
            h: 4,
        };

        canvas.draw(&frame, cell).unwrap();
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(3, 3), Some(RED));
        assert_eq!(canvas.pixel(4, 0), Some(BLACK));
        assert_eq!(canvas.pixel(0, 4), Some(BLACK));
    }

    #[test]
    fn test_draw_upscales_nearest_neighbor() {
        let mut canvas = Canvas::new(4, 4);
        let frame = VideoFrame::filled(1, 1, RED);
        let cell = Rect {
            x: 0,
            y: 0,
            w: 4,
            h: 4,
        };

        canvas.draw(&frame, cell).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.pixel(x, y), Some(RED));
            }
        }
    }

    #[test]
    fn test_malformed_frame_is_rejected() {
        let mut canvas = Canvas::new(8, 8);
        let frame = VideoFrame::new(2, 2, Bytes::from(vec![0u8; 3]));
        let cell = Rect {
            x: 0,
            y: 0,
            w: 4,
            h: 4,
        };

        let err = canvas.draw(&frame, cell).unwrap_err();
        assert!(matches!(err, Error::TransientRender(_)));
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
    }

    #[test]
    fn test_cell_outside_canvas_is_rejected() {
        let mut canvas = Canvas::new(8, 8);
        let frame = VideoFrame::filled(2, 2, RED);
        let cell = Rect {
            x: 6,
            y: 6,
            w: 4,
            h: 4,
        };

        assert!(matches!(
            canvas.draw(&frame, cell),
            Err(Error::TransientRender(_))
        ));
    }

    #[test]
    fn test_clear_resets_to_black() {
        let mut canvas = Canvas::new(4, 4);
        let frame = VideoFrame::filled(1, 1, RED);
        canvas
            .draw(
                &frame,
                Rect {
                    x: 0,
                    y: 0,
                    w: 4,
                    h: 4,
                },
            )
            .unwrap();

        canvas.clear();
        assert_eq!(canvas.pixel(2, 2), Some(BLACK));

        let captured = canvas.capture();
        assert!(captured.is_well_formed());
        assert_eq!((captured.width, captured.height), (4, 4));
    }
}
