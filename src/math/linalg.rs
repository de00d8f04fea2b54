use nalgebra::{Matrix2, Matrix4};
use num_traits::{AsPrimitive, Float};

/// Determinant of a 2x2 matrix.
#[inline]
pub fn det_2x2(m: &Matrix2<f64>) -> f64 {
    m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
}

/// Closed-form inverse of a 2x2 matrix, given its (nonzero) determinant.
#[inline]
pub fn inverse_2x2(m: &Matrix2<f64>, det: f64) -> Matrix2<f64> {
    Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det
}

/// Returns `(m + mᵀ) / 2`, removing the asymmetric part left by rounding.
#[inline]
pub fn symmetrize(m: &Matrix4<f64>) -> Matrix4<f64> {
    (m + m.transpose()) * 0.5
}

pub fn is_symmetric(m: &Matrix4<f64>, eps: f64) -> bool {
    (m - m.transpose()).amax() <= eps
}

/// Smallest eigenvalue of the symmetric part of `m`.
pub fn min_eigenvalue(m: &Matrix4<f64>) -> f64 {
    symmetrize(m).symmetric_eigenvalues().min()
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn wrap_360<T>(angle_deg: T) -> T
where
    T: Float + 'static,
    f64: AsPrimitive<T>,
{
    let full: T = 360.0.as_();
    let wrapped = angle_deg - full * (angle_deg / full).floor();

    // Tiny negative inputs round up to exactly 360
    if wrapped >= full || wrapped < T::zero() {
        T::zero()
    } else {
        wrapped
    }
}
