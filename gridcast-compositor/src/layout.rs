//! Grid layout policies for 1 to 6 sources on a fixed canvas.

/// An axis-aligned cell on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }
}

/// Cell rectangles for `n` sources, in slot order.
///
/// 1 source fills the canvas, 2 and 3 split it into equal columns, 4 is a
/// 2x2 grid, 5 uses a 3x2 grid with the bottom-right cell left empty, and 6
/// fills the 3x2 grid. More than 6 falls back to the 3x2 grid.
pub fn layout_rects(n: usize, canvas_w: u32, canvas_h: u32) -> Vec<Rect> {
    match n {
        0 => Vec::new(),
        1 => vec![Rect {
            x: 0,
            y: 0,
            w: canvas_w,
            h: canvas_h,
        }],
        2 => grid(2, 1, 2, canvas_w, canvas_h),
        3 => grid(3, 1, 3, canvas_w, canvas_h),
        4 => grid(2, 2, 4, canvas_w, canvas_h),
        5 => grid(3, 2, 5, canvas_w, canvas_h),
        _ => grid(3, 2, 6, canvas_w, canvas_h),
    }
}

fn grid(cols: u32, rows: u32, n: usize, canvas_w: u32, canvas_h: u32) -> Vec<Rect> {
    let cell_w = canvas_w / cols;
    let cell_h = canvas_h / rows;
    let mut rects = Vec::with_capacity(n);
    for index in 0..n as u32 {
        let col = index % cols;
        let row = index / cols;
        let x = col * cell_w;
        let y = row * cell_h;
        // The last column and row absorb the integer division remainder.
        let w = if col == cols - 1 { canvas_w - x } else { cell_w };
        let h = if row == rows - 1 { canvas_h - y } else { cell_h };
        rects.push(Rect { x, y, w, h });
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
    }

    #[test]
    fn test_layout_counts() {
        assert!(layout_rects(0, 1280, 720).is_empty());
        for n in 1..=6 {
            assert_eq!(layout_rects(n, 1280, 720).len(), n);
        }
        assert_eq!(layout_rects(9, 1280, 720).len(), 6);
    }

    #[test]
    fn test_single_source_fills_canvas() {
        let rects = layout_rects(1, 1280, 720);
        assert_eq!(
            rects[0],
            Rect {
                x: 0,
                y: 0,
                w: 1280,
                h: 720
            }
        );
    }

    #[test]
    fn test_rects_stay_within_canvas() {
        for n in 1..=6 {
            for rect in layout_rects(n, 1280, 720) {
                assert!(rect.x + rect.w <= 1280);
                assert!(rect.y + rect.h <= 720);
                assert!(rect.w > 0 && rect.h > 0);
            }
        }
    }

    #[test]
    fn test_full_grids_tile_exactly() {
        for n in [1, 2, 3, 4, 6] {
            let rects = layout_rects(n, 1280, 720);
            let total: u64 = rects.iter().map(Rect::area).sum();
            assert_eq!(total, 1280 * 720, "n={n} must cover the whole canvas");
            for (i, a) in rects.iter().enumerate() {
                for b in rects.iter().skip(i + 1) {
                    assert!(!overlaps(a, b), "n={n} produced overlapping cells");
                }
            }
        }
    }

    #[test]
    fn test_five_leaves_bottom_right_empty() {
        let rects = layout_rects(5, 96, 64);
        assert_eq!(rects.len(), 5);
        for rect in &rects {
            assert_eq!((rect.w, rect.h), (32, 32));
        }
        // Bottom-right cell of the 3x2 grid stays unoccupied.
        assert!(!rects.iter().any(|r| r.x == 64 && r.y == 32));
    }
}
