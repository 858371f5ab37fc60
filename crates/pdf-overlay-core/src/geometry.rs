//! Affine matrices and rectangles shared by the engine and the session.
//!
//! Matrices follow the PDF convention: a point `(x, y)` maps to
//! `(a*x + c*y + e, b*x + d*y + f)`, and `m1.concat(&m2)` applies `m1` first.

/// A 6-coefficient 2D affine transform (scale, shear, translate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Build from the six coefficients in `[a, b, c, d, e, f]` order.
    pub const fn from_array(m: [f32; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    pub const fn to_array(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    #[allow(clippy::float_cmp)]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 6]> for Matrix {
    fn from(m: [f32; 6]) -> Self {
        Self::from_array(m)
    }
}

impl From<Matrix> for mupdf::Matrix {
    fn from(m: Matrix) -> Self {
        Self::new(m.a, m.b, m.c, m.d, m.e, m.f)
    }
}

/// Clip rectangle in output pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ClipRect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Clip covering the whole `width` x `height` output.
    #[allow(clippy::cast_precision_loss)]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// Intrinsic page dimensions in device-independent units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_applies_left_first() {
        let m = Matrix::scale(2.0, 2.0).concat(&Matrix::translate(10.0, 5.0));
        assert_eq!(m.transform_point(1.0, 1.0), (12.0, 7.0));

        let m = Matrix::translate(10.0, 5.0).concat(&Matrix::scale(2.0, 2.0));
        assert_eq!(m.transform_point(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_identity() {
        assert!(Matrix::default().is_identity());
        assert!(!Matrix::translate(0.0, 1.0).is_identity());
        assert_eq!(Matrix::IDENTITY.concat(&Matrix::scale(3.0, 4.0)), Matrix::scale(3.0, 4.0));
    }

    #[test]
    fn test_full_clip() {
        let clip = ClipRect::full(640, 480);
        assert_eq!(clip, ClipRect::new(0.0, 0.0, 640.0, 480.0));
    }
}
