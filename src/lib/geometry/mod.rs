use nalgebra::geometry::Point2;
use nalgebra::Vector2;

/// Axis-aligned rectangle in bed coordinates, origin bottom left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect {
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Rect { min, max }
    }

    pub fn from_corner(min: Point2<f64>, size: Vector2<f64>) -> Self {
        Rect {
            min,
            max: min + size,
        }
    }

    /// Smallest rectangle holding every point in `points`, or None if there are none
    pub fn bounding(points: &[Point2<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut r = Rect::new(*first, *first);
        for p in &points[1..] {
            r.min.x = r.min.x.min(p.x);
            r.min.y = r.min.y.min(p.y);
            r.max.x = r.max.x.max(p.x);
            r.max.y = r.max.y.max(p.y);
        }
        Some(r)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Shrink by `margin` on every side
    pub fn inset(&self, margin: f64) -> Self {
        let m = Vector2::new(margin, margin);
        Rect {
            min: self.min + m,
            max: self.max - m,
        }
    }

    /// The top left corner, where purge squares start drawing
    pub fn top_left(&self) -> Point2<f64> {
        Point2::new(self.min.x, self.max.y)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// True if the interiors intersect. Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[test]
    fn test_bounding_of_bed_corners() {
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(250.0, 0.0),
            Point2::new(250.0, 210.0),
            Point2::new(0.0, 210.0),
        ];
        assert_eq!(Rect::bounding(&corners), Some(r(0.0, 0.0, 250.0, 210.0)));
        assert_eq!(Rect::bounding(&[]), None);
    }

    #[test]
    fn test_inset() {
        let bed = r(0.0, 0.0, 300.0, 300.0).inset(10.0);
        assert_eq!(bed, r(10.0, 10.0, 290.0, 290.0));
        assert_eq!(bed.width(), 280.0);
        assert_eq!(bed.top_left(), Point2::new(10.0, 290.0));
    }

    #[test]
    fn test_touching_rects_do_not_overlap() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(10.0, 0.0, 20.0, 10.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&r(5.0, 5.0, 15.0, 15.0)));
    }

    #[test]
    fn test_contains() {
        let outer = r(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&r(1.0, 1.0, 9.0, 9.0)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&r(1.0, 1.0, 11.0, 9.0)));
    }
}
