//! Pixel windows
//!
//! [`PixelBox`] is a half-open integer window `[ymin, ymax) x [xmin, xmax)`
//! used for raster extents and chip windows.

use std::fmt;

use geo::{Coord, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Integer pixel window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub ymin: u32,
    pub xmin: u32,
    pub ymax: u32,
    pub xmax: u32,
}

impl PixelBox {
    /// Create box, ordering the corners
    #[inline]
    #[must_use]
    pub fn new(ymin: u32, xmin: u32, ymax: u32, xmax: u32) -> Self {
        Self {
            ymin: ymin.min(ymax),
            xmin: xmin.min(xmax),
            ymax: ymin.max(ymax),
            xmax: xmin.max(xmax),
        }
    }

    /// Box anchored at the origin
    #[inline]
    #[must_use]
    pub fn from_size(height: u32, width: u32) -> Self {
        Self::new(0, 0, height, width)
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.ymax - self.ymin
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.xmax - self.xmin
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.height()) * u64::from(self.width())
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Whether `other` lies entirely inside this box
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &PixelBox) -> bool {
        other.ymin >= self.ymin
            && other.xmin >= self.xmin
            && other.ymax <= self.ymax
            && other.xmax <= self.xmax
    }

    /// Overlapping region, if any
    #[must_use]
    pub fn intersection(&self, other: &PixelBox) -> Option<PixelBox> {
        let ymin = self.ymin.max(other.ymin);
        let xmin = self.xmin.max(other.xmin);
        let ymax = self.ymax.min(other.ymax);
        let xmax = self.xmax.min(other.xmax);
        (ymin < ymax && xmin < xmax).then_some(PixelBox { ymin, xmin, ymax, xmax })
    }

    /// Rectangle in pixel coordinates (x = column, y = row)
    #[inline]
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: f64::from(self.xmin),
                y: f64::from(self.ymin),
            },
            Coord {
                x: f64::from(self.xmax),
                y: f64::from(self.ymax),
            },
        )
    }

    #[inline]
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }

    /// Sliding windows of `size` pixels stepped by `stride`
    ///
    /// Windows are clipped to this box; edge windows may be smaller than
    /// `size`. Row-major order. A zero `size` or `stride` yields nothing.
    #[must_use]
    pub fn windows(&self, size: u32, stride: u32) -> Vec<PixelBox> {
        if size == 0 || stride == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut y = self.ymin;
        while y < self.ymax {
            let mut x = self.xmin;
            while x < self.xmax {
                windows.push(PixelBox::new(
                    y,
                    x,
                    y.saturating_add(size).min(self.ymax),
                    x.saturating_add(size).min(self.xmax),
                ));
                x = x.saturating_add(stride);
            }
            y = y.saturating_add(stride);
        }
        windows
    }
}

impl fmt::Display for PixelBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.ymin, self.xmin, self.ymax, self.xmax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_corners() {
        let b = PixelBox::new(10, 20, 0, 5);
        assert_eq!(b, PixelBox::new(0, 5, 10, 20));
        assert_eq!(b.height(), 10);
        assert_eq!(b.width(), 15);
        assert_eq!(b.area(), 150);
    }

    #[test]
    fn contains_and_intersection() {
        let extent = PixelBox::from_size(100, 100);
        let inner = PixelBox::new(10, 10, 20, 20);
        let straddling = PixelBox::new(90, 90, 110, 110);

        assert!(extent.contains(&inner));
        assert!(!extent.contains(&straddling));
        assert_eq!(extent.intersection(&straddling), Some(PixelBox::new(90, 90, 100, 100)));
        assert_eq!(inner.intersection(&PixelBox::new(50, 50, 60, 60)), None);
    }

    #[test]
    fn windows_cover_extent() {
        let extent = PixelBox::from_size(5, 5);
        let windows = extent.windows(2, 2);

        assert_eq!(windows.len(), 9);
        assert_eq!(windows[0], PixelBox::new(0, 0, 2, 2));
        assert_eq!(windows[8], PixelBox::new(4, 4, 5, 5));
        assert_eq!(windows.iter().map(PixelBox::area).sum::<u64>(), extent.area());
    }

    #[test]
    fn windows_degenerate() {
        assert!(PixelBox::from_size(5, 5).windows(0, 1).is_empty());
        assert!(PixelBox::from_size(0, 5).windows(2, 2).is_empty());
    }

    #[test]
    fn display() {
        assert_eq!(PixelBox::new(1, 2, 3, 4).to_string(), "[1, 2, 3, 4]");
    }
}
