//! Box drawing on RGB24 frames.
//!
//! Axis-aligned and oriented regions are both drawn as closed four-corner
//! polygons. Each edge is clipped to the frame before it is rasterised.

use crate::detect::result::Detection;
use crate::frame::Frame;

pub const LINE_THICKNESS: i64 = 2;

const PALETTE: [[u8; 3]; 8] = [
    [0, 255, 0],
    [255, 64, 64],
    [64, 128, 255],
    [255, 200, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 128, 0],
    [160, 96, 255],
];

/// Colour used for a class id.
pub fn class_colour(class_id: u32) -> [u8; 3] {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Draw every detection's outline into `frame`.
pub fn draw_detections(frame: &mut Frame, detections: &[Detection]) {
    for detection in detections {
        let colour = class_colour(detection.class_id);
        let corners = detection.region.corners();
        for i in 0..corners.len() {
            let (x0, y0) = corners[i];
            let (x1, y1) = corners[(i + 1) % corners.len()];
            draw_line(frame, x0, y0, x1, y1, colour);
        }
    }
}

/// Bresenham line with a square brush of `LINE_THICKNESS` pixels.
///
/// The segment is clipped to the frame (grown by the brush size) before it
/// is rasterised, so the cost is bounded by the frame size whatever the
/// input coordinates.
pub fn draw_line(frame: &mut Frame, x0: f32, y0: f32, x1: f32, y1: f32, colour: [u8; 3]) {
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return;
    }
    let Some((x0, y0, x1, y1)) = clip_to_frame(frame, x0.into(), y0.into(), x1.into(), y1.into())
    else {
        return;
    };
    let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
    let (xe, ye) = (x1.round() as i64, y1.round() as i64);
    let dx = xe.saturating_sub(x).saturating_abs();
    let dy = ye.saturating_sub(y).saturating_abs().saturating_neg();
    let sx = if x < xe { 1 } else { -1 };
    let sy = if y < ye { 1 } else { -1 };
    let mut err = dx.saturating_add(dy);

    loop {
        stamp(frame, x, y, colour);
        if x == xe && y == ye {
            break;
        }
        let e2 = err.saturating_mul(2);
        if e2 >= dy {
            err = err.saturating_add(dy);
            x += sx;
        }
        if e2 <= dx {
            err = err.saturating_add(dx);
            y += sy;
        }
    }
}

/// Liang-Barsky clip of a segment against the frame rectangle padded by the
/// brush size. `None` when the segment misses the frame entirely.
fn clip_to_frame(
    frame: &Frame,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
) -> Option<(f64, f64, f64, f64)> {
    let pad = LINE_THICKNESS as f64;
    let (xmin, ymin) = (-pad, -pad);
    let (xmax, ymax) = (frame.width() as f64 + pad, frame.height() as f64 + pad);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [
        (-dx, x0 - xmin),
        (dx, xmax - x0),
        (-dy, y0 - ymin),
        (dy, ymax - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    // Precision loss on huge inputs can put an endpoint just past the window.
    let cx = |v: f64| v.clamp(xmin, xmax);
    let cy = |v: f64| v.clamp(ymin, ymax);
    Some((
        cx(x0 + t0 * dx),
        cy(y0 + t0 * dy),
        cx(x0 + t1 * dx),
        cy(y0 + t1 * dy),
    ))
}

fn stamp(frame: &mut Frame, x: i64, y: i64, colour: [u8; 3]) {
    for oy in 0..LINE_THICKNESS {
        for ox in 0..LINE_THICKNESS {
            frame.put_pixel(x + ox, y + oy, colour);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, OrientedBox, Region};
    use std::time::{Duration, Instant};

    fn blank(w: u32, h: u32) -> Frame {
        Frame::filled(w, h, [0, 0, 0]).unwrap()
    }

    #[test]
    fn axis_box_outline_is_drawn_and_interior_untouched() {
        let mut frame = blank(20, 20);
        let det = Detection::new(
            0,
            "thing",
            0.9,
            Region::Axis(BoundingBox {
                x: 2.0,
                y: 2.0,
                w: 10.0,
                h: 10.0,
            }),
        );
        draw_detections(&mut frame, &[det]);

        let green = class_colour(0);
        assert_eq!(frame.pixel(2, 2), Some(green));
        assert_eq!(frame.pixel(12, 7), Some(green));
        assert_eq!(frame.pixel(7, 12), Some(green));
        assert_eq!(frame.pixel(7, 7), Some([0, 0, 0]));
    }

    #[test]
    fn boxes_partly_outside_are_clipped() {
        let mut frame = blank(8, 8);
        let det = Detection::new(
            3,
            "edge",
            0.5,
            Region::Axis(BoundingBox {
                x: -5.0,
                y: -5.0,
                w: 20.0,
                h: 8.0,
            }),
        );
        draw_detections(&mut frame, &[det]);
        assert_eq!(frame.pixel(4, 3), Some(class_colour(3)));
    }

    #[test]
    fn oriented_box_draws_its_rotated_corners() {
        let mut frame = blank(40, 40);
        let det = Detection::new(
            1,
            "ship",
            0.7,
            Region::Oriented(OrientedBox {
                cx: 20.0,
                cy: 20.0,
                w: 20.0,
                h: 10.0,
                angle: std::f32::consts::FRAC_PI_4,
            }),
        );
        let corners = det.region.corners();
        draw_detections(&mut frame, &[det]);

        let colour = class_colour(1);
        for (x, y) in corners {
            assert_eq!(frame.pixel(x.round() as u32, y.round() as u32), Some(colour));
        }
        assert_eq!(frame.pixel(20, 20), Some([0, 0, 0]));
    }

    #[test]
    fn non_finite_coordinates_are_ignored() {
        let mut frame = blank(4, 4);
        draw_line(&mut frame, f32::NAN, 0.0, 3.0, 3.0, [255, 255, 255]);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn far_out_of_frame_boxes_finish_quickly() {
        let started = Instant::now();
        let mut frame = blank(8, 8);
        let enormous = Detection::new(
            0,
            "enormous",
            0.5,
            Region::Axis(BoundingBox {
                x: -1e20,
                y: -1e20,
                w: 2e20,
                h: 2e20,
            }),
        );
        let wide = Detection::new(
            2,
            "wide",
            0.5,
            Region::Axis(BoundingBox {
                x: 0.0,
                y: 0.0,
                w: 2e8,
                h: 4.0,
            }),
        );
        draw_detections(&mut frame, &[enormous, wide]);

        assert!(started.elapsed() < Duration::from_secs(1));
        let colour = class_colour(2);
        assert_eq!(frame.pixel(6, 0), Some(colour));
        assert_eq!(frame.pixel(6, 4), Some(colour));
        assert_eq!(frame.pixel(6, 2), Some([0, 0, 0]));
    }

    #[test]
    fn long_diagonal_is_clipped_to_the_visible_part() {
        let mut frame = blank(8, 8);
        draw_line(&mut frame, -1e6, -1e6, 1e6, 1e6, [9, 9, 9]);
        assert_eq!(frame.pixel(0, 0), Some([9, 9, 9]));
        assert_eq!(frame.pixel(4, 4), Some([9, 9, 9]));
        assert_eq!(frame.pixel(7, 7), Some([9, 9, 9]));
        assert_eq!(frame.pixel(7, 0), Some([0, 0, 0]));
    }

    #[test]
    fn segment_entirely_outside_draws_nothing() {
        let mut frame = blank(4, 4);
        draw_line(&mut frame, 10.0, -50.0, 10.0, 50.0, [255, 255, 255]);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn palette_wraps() {
        assert_eq!(class_colour(0), class_colour(8));
        assert_ne!(class_colour(0), class_colour(1));
    }
}
