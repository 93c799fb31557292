//! Viewport math for scaling the game extent into the window client area.

use openblit_common::ScalingMode;

/// Sub-rectangle of the client area the frame lands in. Pixels outside the
/// viewport are opaque black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Whether the viewport covers the whole client area.
    pub fn covers(&self, client_w: u32, client_h: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == client_w && self.height == client_h
    }
}

/// Compute the viewport for a source extent inside a client area.
pub fn compute_viewport(
    out_w: u32,
    out_h: u32,
    src_w: u32,
    src_h: u32,
    mode: ScalingMode,
) -> Viewport {
    let (out_w, out_h) = (out_w.max(1), out_h.max(1));
    let (src_w, src_h) = (src_w.max(1), src_h.max(1));
    match mode {
        ScalingMode::Stretch => Viewport { x: 0, y: 0, width: out_w, height: out_h },
        ScalingMode::Aspect => {
            let scale_x = out_w as f64 / src_w as f64;
            let scale_y = out_h as f64 / src_h as f64;
            let scale = scale_x.min(scale_y);
            let vw = ((src_w as f64 * scale) as u32).max(1);
            let vh = ((src_h as f64 * scale) as u32).max(1);
            Viewport {
                x: out_w.saturating_sub(vw) / 2,
                y: out_h.saturating_sub(vh) / 2,
                width: vw,
                height: vh,
            }
        }
        ScalingMode::Integer => {
            let factor = (out_w / src_w).min(out_h / src_h).max(1);
            let vw = src_w * factor;
            let vh = src_h * factor;
            Viewport {
                x: out_w.saturating_sub(vw) / 2,
                y: out_h.saturating_sub(vh) / 2,
                width: vw,
                height: vh,
            }
        }
    }
}

/// Nearest-neighbor scale of `src` into the viewport region of `dst`,
/// clearing the rest of `dst` to opaque black.
pub fn scale_into(
    src: &[u32],
    src_w: u32,
    src_h: u32,
    dst: &mut [u32],
    dst_w: u32,
    dst_h: u32,
    vp: Viewport,
) {
    dst.iter_mut().for_each(|p| *p = 0xFF00_0000);

    let (src_w, src_h) = (src_w.max(1) as usize, src_h.max(1) as usize);
    let dst_w = dst_w as usize;
    let vw = vp.width.max(1) as usize;
    let vh = vp.height.max(1) as usize;

    for dy in 0..vh {
        let out_y = vp.y as usize + dy;
        if out_y >= dst_h as usize {
            break;
        }
        let sy = (dy * src_h) / vh;
        let dst_row = out_y * dst_w;
        let src_row = sy * src_w;
        for dx in 0..vw {
            let out_x = vp.x as usize + dx;
            if out_x >= dst_w {
                break;
            }
            let sx = (dx * src_w) / vw;
            dst[dst_row + out_x] = src[src_row + sx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_fills_client() {
        let vp = compute_viewport(1280, 1024, 640, 480, ScalingMode::Stretch);
        assert_eq!(vp, Viewport { x: 0, y: 0, width: 1280, height: 1024 });
        assert!(vp.covers(1280, 1024));
    }

    #[test]
    fn aspect_letterboxes_wide_client() {
        // 1920x1080 client, 4:3 source: pillarbox with side bars.
        let vp = compute_viewport(1920, 1080, 640, 480, ScalingMode::Aspect);
        assert_eq!(vp.height, 1080);
        assert_eq!(vp.width, 1440);
        assert_eq!(vp.x, 240);
        assert_eq!(vp.y, 0);
    }

    #[test]
    fn integer_picks_largest_whole_multiple() {
        let vp = compute_viewport(1920, 1080, 640, 480, ScalingMode::Integer);
        assert_eq!((vp.width, vp.height), (1280, 960));
        assert_eq!((vp.x, vp.y), (320, 60));

        // Client smaller than the source still yields one whole multiple.
        let vp = compute_viewport(320, 240, 640, 480, ScalingMode::Integer);
        assert_eq!((vp.width, vp.height), (640, 480));
    }

    #[test]
    fn scale_one_to_one_copies() {
        let src = vec![0xFF11_1111u32, 0xFF22_2222, 0xFF33_3333, 0xFF44_4444];
        let mut dst = vec![0u32; 4];
        scale_into(
            &src,
            2,
            2,
            &mut dst,
            2,
            2,
            Viewport { x: 0, y: 0, width: 2, height: 2 },
        );
        assert_eq!(dst, src);
    }

    #[test]
    fn scale_doubles_and_borders_are_black() {
        let src = vec![0xFFAB_CDEFu32];
        let mut dst = vec![0u32; 4 * 3];
        scale_into(
            &src,
            1,
            1,
            &mut dst,
            4,
            3,
            Viewport { x: 1, y: 1, width: 2, height: 1 },
        );
        assert_eq!(dst[4 * 1 + 1], 0xFFAB_CDEF);
        assert_eq!(dst[4 * 1 + 2], 0xFFAB_CDEF);
        assert_eq!(dst[0], 0xFF00_0000);
        assert_eq!(dst[4 * 2 + 3], 0xFF00_0000);
    }
}
