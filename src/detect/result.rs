/// One thing a transformer found in a frame. Coordinates are in pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    /// 0..=1
    pub confidence: f32,
    pub region: Region,
}

impl Detection {
    pub fn new(class_id: u32, label: impl Into<String>, confidence: f32, region: Region) -> Self {
        Self {
            class_id,
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            region,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Region {
    Axis(BoundingBox),
    Oriented(OrientedBox),
}

impl Region {
    /// Corners in drawing order (closed polygon).
    pub fn corners(&self) -> [(f32, f32); 4] {
        match self {
            Region::Axis(b) => [
                (b.x, b.y),
                (b.x + b.w, b.y),
                (b.x + b.w, b.y + b.h),
                (b.x, b.y + b.h),
            ],
            Region::Oriented(o) => o.corners(),
        }
    }
}

/// Axis-aligned box, top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Rotated box: centre, size, and rotation in radians (counter-clockwise
/// from the x axis, image y pointing down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub angle: f32,
}

impl OrientedBox {
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (sin, cos) = self.angle.sin_cos();
        let (hw, hh) = (self.w / 2.0, self.h / 2.0);
        let rotate = |dx: f32, dy: f32| {
            (
                self.cx + dx * cos - dy * sin,
                self.cy + dx * sin + dy * cos,
            )
        };
        [
            rotate(-hw, -hh),
            rotate(hw, -hh),
            rotate(hw, hh),
            rotate(-hw, hh),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn unrotated_oriented_box_matches_axis_box() {
        let oriented = OrientedBox {
            cx: 5.0,
            cy: 5.0,
            w: 4.0,
            h: 2.0,
            angle: 0.0,
        };
        let axis = Region::Axis(BoundingBox {
            x: 3.0,
            y: 4.0,
            w: 4.0,
            h: 2.0,
        });
        for (a, b) in oriented.corners().iter().zip(axis.corners().iter()) {
            assert!(close(*a, *b), "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let oriented = OrientedBox {
            cx: 0.0,
            cy: 0.0,
            w: 4.0,
            h: 2.0,
            angle: std::f32::consts::FRAC_PI_2,
        };
        let corners = oriented.corners();
        assert!(close(corners[0], (1.0, -2.0)));
        assert!(close(corners[2], (-1.0, 2.0)));
    }

    #[test]
    fn confidence_is_clamped() {
        let region = Region::Axis(BoundingBox {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        });
        assert_eq!(Detection::new(0, "a", 1.5, region).confidence, 1.0);
        assert_eq!(Detection::new(0, "a", -0.2, region).confidence, 0.0);
    }
}
