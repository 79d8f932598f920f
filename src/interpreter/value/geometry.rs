use std::{
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

use crate::quantity::approx_eq;

/// Absolute slack for coordinates that should be zero.
const GEOMETRY_EPSILON: f64 = 1e-12;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= GEOMETRY_EPSILON || approx_eq(a, b)
}

/// A 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Vector3 {
    /// Creates a vector.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    /// Cross product.
    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(self.y.mul_add(other.z, -(self.z * other.y)),
                  self.z.mul_add(other.x, -(self.x * other.z)),
                  self.x.mul_add(other.y, -(self.y * other.x)))
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scales every coordinate.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Unit vector in the same direction, or `None` for the zero vector.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let len = self.length();
        if len == 0.0 { None } else { Some(self.scale(1.0 / len)) }
    }

    /// Component-wise tolerance equality.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        close(self.x, other.x) && close(self.y, other.y) && close(self.z, other.z)
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector ({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A 4x4 affine transformation matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    /// Matrix rows.
    pub rows: [[f64; 4]; 4],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self { rows: [[1.0, 0.0, 0.0, 0.0],
                                             [0.0, 1.0, 0.0, 0.0],
                                             [0.0, 0.0, 1.0, 0.0],
                                             [0.0, 0.0, 0.0, 1.0]], };

    /// Builds a matrix from 16 row-major values.
    #[must_use]
    pub fn from_values(values: &[f64; 16]) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&values[i * 4..i * 4 + 4]);
        }
        Self { rows }
    }

    /// Matrix product `self * other`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.rows[i][k] * other.rows[k][j]).sum();
            }
        }
        Self { rows }
    }

    /// Transforms a point (homogeneous `w = 1`).
    #[must_use]
    pub fn transform(&self, v: &Vector3) -> Vector3 {
        let r = &self.rows;
        Vector3::new(r[0][0].mul_add(v.x, r[0][1].mul_add(v.y, r[0][2].mul_add(v.z, r[0][3]))),
                     r[1][0].mul_add(v.x, r[1][1].mul_add(v.y, r[1][2].mul_add(v.z, r[1][3]))),
                     r[2][0].mul_add(v.x, r[2][1].mul_add(v.y, r[2][2].mul_add(v.z, r[2][3]))))
    }

    /// Scales the matrix by `s` along each axis.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::geometry::{Matrix4, Vector3};
    ///
    /// let m = Matrix4::IDENTITY.scaled(&Vector3::new(2.0, 3.0, 4.0));
    /// assert_eq!(m.transform(&Vector3::new(1.0, 1.0, 1.0)), Vector3::new(2.0, 3.0, 4.0));
    /// ```
    #[must_use]
    pub fn scaled(&self, s: &Vector3) -> Self {
        let mut rows = self.rows;
        for row in &mut rows {
            row[0] *= s.x;
            row[1] *= s.y;
            row[2] *= s.z;
        }
        Self { rows }
    }

    /// Inverse by Gauss-Jordan elimination; `None` when singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let mut a = self.rows;
        let mut inv = Self::IDENTITY.rows;

        for col in 0..4 {
            let pivot = (col..4).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
            if a[pivot][col].abs() < GEOMETRY_EPSILON {
                return None;
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let p = a[col][col];
            for j in 0..4 {
                a[col][j] /= p;
                inv[col][j] /= p;
            }
            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                for j in 0..4 {
                    a[row][j] -= factor * a[col][j];
                    inv[row][j] -= factor * inv[col][j];
                }
            }
        }
        Some(Self { rows: inv })
    }

    /// Determinant, by elimination with partial pivoting.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::geometry::{Matrix4, Vector3};
    ///
    /// let m = Matrix4::IDENTITY.scaled(&Vector3::new(2.0, 3.0, 4.0));
    /// assert_eq!(m.determinant(), 24.0);
    /// ```
    #[must_use]
    pub fn determinant(&self) -> f64 {
        let mut a = self.rows;
        let mut det = 1.0;
        for col in 0..4 {
            let pivot = (col..4).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
                                .unwrap_or(col);
            if a[pivot][col] == 0.0 {
                return 0.0;
            }
            if pivot != col {
                a.swap(col, pivot);
                det = -det;
            }
            det *= a[col][col];
            for row in col + 1..4 {
                let factor = a[row][col] / a[col][col];
                for j in col..4 {
                    a[row][j] -= factor * a[col][j];
                }
            }
        }
        det
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().flatten().copied().collect()
    }

    /// Element-wise tolerance equality.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.values()
            .iter()
            .zip(other.values())
            .all(|(a, b)| close(*a, b))
    }
}

impl fmt::Display for Matrix4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matrix (")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "({}, {}, {}, {})", row[0], row[1], row[2], row[3])?;
        }
        f.write_str(")")
    }
}

/// A rotation stored as a unit quaternion `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    q: [f64; 4],
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    /// No rotation.
    pub const IDENTITY: Self = Self { q: [0.0, 0.0, 0.0, 1.0] };

    /// Builds a rotation of `degrees` around `axis`.
    ///
    /// A zero axis yields the identity.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::geometry::{Rotation, Vector3};
    ///
    /// let r = Rotation::from_axis_angle(&Vector3::new(0.0, 0.0, 1.0), 90.0);
    /// let v = r.rotate(&Vector3::new(1.0, 0.0, 0.0));
    /// assert!(v.approx_eq(&Vector3::new(0.0, 1.0, 0.0)));
    /// ```
    #[must_use]
    pub fn from_axis_angle(axis: &Vector3, degrees: f64) -> Self {
        let Some(axis) = axis.normalized() else {
            return Self::IDENTITY;
        };
        let half = degrees.to_radians() / 2.0;
        let s = half.sin();
        Self { q: [axis.x * s, axis.y * s, axis.z * s, half.cos()] }
    }

    /// Quaternion components `(x, y, z, w)`.
    #[must_use]
    pub const fn quaternion(&self) -> [f64; 4] {
        self.q
    }

    /// Rotation angle in degrees, in `[0, 360)`.
    #[must_use]
    pub fn angle(&self) -> f64 {
        let w = self.q[3].clamp(-1.0, 1.0);
        (2.0 * w.acos()).to_degrees()
    }

    /// Rotation axis; the z axis for the identity.
    #[must_use]
    pub fn axis(&self) -> Vector3 {
        Vector3::new(self.q[0], self.q[1], self.q[2]).normalized()
                                                      .unwrap_or(Vector3::new(0.0, 0.0, 1.0))
    }

    /// Composition `self * other` (apply `other` first).
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let [x1, y1, z1, w1] = self.q;
        let [x2, y2, z2, w2] = other.q;
        Self { q: [w1 * x2 + x1 * w2 + y1 * z2 - z1 * y2,
                   w1 * y2 - x1 * z2 + y1 * w2 + z1 * x2,
                   w1 * z2 + x1 * y2 - y1 * x2 + z1 * w2,
                   w1 * w2 - x1 * x2 - y1 * y2 - z1 * z2], }
    }

    /// The inverse rotation.
    #[must_use]
    pub const fn inverse(&self) -> Self {
        Self { q: [-self.q[0], -self.q[1], -self.q[2], self.q[3]] }
    }

    /// Rotates a vector.
    #[must_use]
    pub fn rotate(&self, v: &Vector3) -> Vector3 {
        let u = Vector3::new(self.q[0], self.q[1], self.q[2]);
        let w = self.q[3];
        let t = u.cross(v).scale(2.0);
        *v + t.scale(w) + u.cross(&t)
    }

    /// The equivalent rotation matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix4 {
        let [x, y, z, w] = self.q;
        Matrix4 { rows: [[1.0 - 2.0 * (y * y + z * z),
                          2.0 * (x * y - z * w),
                          2.0 * (x * z + y * w),
                          0.0],
                         [2.0 * (x * y + z * w),
                          1.0 - 2.0 * (x * x + z * z),
                          2.0 * (y * z - x * w),
                          0.0],
                         [2.0 * (x * z - y * w),
                          2.0 * (y * z + x * w),
                          1.0 - 2.0 * (x * x + y * y),
                          0.0],
                         [0.0, 0.0, 0.0, 1.0]], }
    }

    /// Tolerance equality, treating `q` and `-q` as the same rotation.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        let same = self.q.iter().zip(other.q).all(|(a, b)| (a - b).abs() < GEOMETRY_EPSILON);
        let flipped = self.q.iter().zip(other.q).all(|(a, b)| (a + b).abs() < GEOMETRY_EPSILON);
        same || flipped
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "Rotation ({}, {}, {}, {})",
               self.q[0], self.q[1], self.q[2], self.q[3])
    }
}

/// A rigid transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    /// Translation.
    pub base:     Vector3,
    /// Orientation.
    pub rotation: Rotation,
}

impl Placement {
    /// Creates a placement.
    #[must_use]
    pub const fn new(base: Vector3, rotation: Rotation) -> Self {
        Self { base, rotation }
    }

    /// Composition `self * other`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        Self { base:     self.base + self.rotation.rotate(&other.base),
               rotation: self.rotation.multiply(&other.rotation), }
    }

    /// Transforms a point.
    #[must_use]
    pub fn transform(&self, v: &Vector3) -> Vector3 {
        self.base + self.rotation.rotate(v)
    }

    /// The inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self { base: -rotation.rotate(&self.base),
               rotation }
    }

    /// The equivalent matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix4 {
        let mut m = self.rotation.to_matrix();
        m.rows[0][3] = self.base.x;
        m.rows[1][3] = self.base.y;
        m.rows[2][3] = self.base.z;
        m
    }

    /// Tolerance equality.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.base.approx_eq(&other.base) && self.rotation.approx_eq(&other.rotation)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "Placement [Pos=({}, {}, {}), Axis=({}, {}, {}), Angle={}]",
               self.base.x,
               self.base.y,
               self.base.z,
               self.rotation.axis().x,
               self.rotation.axis().y,
               self.rotation.axis().z,
               self.rotation.angle())
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}
