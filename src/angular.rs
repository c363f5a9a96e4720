// Copyright (c) 2025 Ken Barker

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! The angular module contains functions for working with angles in degrees:
//! range reduction, underflow guards and quadrant-exact trigonometry.
//!
//! The geodesic solvers keep latitudes, longitudes and azimuths in degrees
//! and represent working angles as unit-normalised (sin, cos) pairs, so the
//! conversions here are where all degree/radian traffic happens.

#![allow(clippy::float_cmp)]

/// Normalise an angle to the range `[-180, 180)` degrees.
/// Assumes `x` is in `[-540, 540)`, which holds for sums and differences of
/// already-normalised angles.
#[must_use]
pub fn normalize(x: f64) -> f64 {
    if x >= 180.0 {
        x - 360.0
    } else if x < -180.0 {
        x + 360.0
    } else {
        x
    }
}

/// Reduce an arbitrary finite angle to the range `(-180, 180]` degrees.
#[must_use]
pub fn reduce(x: f64) -> f64 {
    // remainder of x/360 in [-180, 180]; keep the sign of a zero input
    let z = if x.is_finite() { x % 360.0 } else { f64::NAN };
    let z = if x == 0.0 { x } else { z };
    let y = if z < -180.0 {
        z + 360.0
    } else if z < 180.0 {
        z
    } else {
        z - 360.0
    };
    if y == -180.0 { 180.0 } else { y }
}

/// Error-free sum: returns `(s, t)` with `s = u + v` rounded and `t` the
/// exact residual, so `s + t == u + v`.
#[must_use]
pub fn two_sum(u: f64, v: f64) -> (f64, f64) {
    let s = u + v;
    let up = s - v;
    let vpp = s - up;
    let up = up - u;
    let vpp = vpp - v;
    (s, -(up + vpp))
}

/// The difference `y - x` in degrees, reduced to `(-180, 180]`, together
/// with its rounding error.
///
/// The error term lets near-antipodal longitude differences keep full
/// precision across the reduction.
#[must_use]
pub fn diff_degrees(x: f64, y: f64) -> (f64, f64) {
    let (d, t) = two_sum(reduce(-x), reduce(y));
    let d = reduce(d);
    if d == 180.0 && t > 0.0 {
        two_sum(-180.0, t)
    } else {
        two_sum(d, t)
    }
}

/// Collapse the gap around zero so that tiny non-zero angles do not
/// underflow downstream sines.
///
/// Values with `|x| < 1/16` are rounded to the nearest multiple of
/// 2^-57 degrees (about 0.7 pm on the Earth). The intermediate subtraction
/// is routed through an optimisation barrier so the compiler cannot fold
/// `z - (z - y)` back to `y`.
#[must_use]
pub fn round_tiny(x: f64) -> f64 {
    const Z: f64 = 1.0 / 16.0;
    let mut y = libm::fabs(x);
    if y < Z {
        y = Z - core::hint::black_box(Z - y);
    }
    if x == 0.0 {
        0.0
    } else if x < 0.0 {
        -y
    } else {
        y
    }
}

/// Replace a latitude outside `[-90, 90]` degrees with NaN.
#[must_use]
pub fn latitude_fix(x: f64) -> f64 {
    if libm::fabs(x) > 90.0 { f64::NAN } else { x }
}

/// Normalise a (sin, cos) pair in place so that it lies on the unit circle.
pub fn norm_pair(sin_x: &mut f64, cos_x: &mut f64) {
    let r = libm::hypot(*sin_x, *cos_x);
    *sin_x /= r;
    *cos_x /= r;
}

/// The sine and cosine of an angle in degrees, exact at multiples of 90.
///
/// The angle is reduced to `[-45, 45]` before conversion to radians so that
/// e.g. `sincosd(180.0)` yields `(0.0, -1.0)` rather than values a few ulp
/// away.
#[must_use]
pub fn sincosd(x: f64) -> (f64, f64) {
    let mut q = libm::round(x / 90.0);
    let mut r = x - 90.0 * q;
    if r <= -45.0 {
        r += 90.0;
        q -= 1.0;
    } else if r > 45.0 {
        r -= 90.0;
        q += 1.0;
    }
    let (sin_r, cos_r) = libm::sincos(r.to_radians());

    let (mut sin_x, cos_x) = match (q as i64) & 3 {
        0 => (sin_r, cos_r),
        1 => (cos_r, -sin_r),
        2 => (-sin_r, -cos_r),
        _ => (-cos_r, sin_r),
    };
    // collapse -0.0 cosines, keep the sign of the input on zero sines
    let cos_x = cos_x + 0.0;
    if sin_x == 0.0 {
        sin_x = libm::copysign(sin_x, x);
    }
    (sin_x, cos_x)
}

/// `atan2` in degrees with the result in `[-180, 180]`, computed so that
/// the cardinal directions come out exact.
#[must_use]
pub fn atan2d(y: f64, x: f64) -> f64 {
    let (mut y, mut x) = (y, x);
    let mut q = if libm::fabs(y) > libm::fabs(x) {
        core::mem::swap(&mut x, &mut y);
        2
    } else {
        0
    };
    if x < 0.0 {
        q += 1;
        x = -x;
    }
    let ang = libm::atan2(y, x).to_degrees();
    match q {
        0 => ang,
        1 => {
            if y >= 0.0 {
                180.0 - ang
            } else {
                -180.0 - ang
            }
        }
        2 => 90.0 - ang,
        _ => ang - 90.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(0.0, normalize(0.0));
        assert_eq!(-180.0, normalize(180.0));
        assert_eq!(-180.0, normalize(-180.0));
        assert_eq!(-170.0, normalize(190.0));
        assert_eq!(170.0, normalize(-190.0));
        assert_eq!(-179.0, normalize(-539.0));
        assert_eq!(179.0, normalize(539.0));
    }

    #[test]
    fn test_reduce() {
        assert_eq!(0.0, reduce(720.0));
        assert_eq!(180.0, reduce(-180.0));
        assert_eq!(180.0, reduce(540.0));
        assert_eq!(-90.0, reduce(270.0));
        assert!(reduce(f64::INFINITY).is_nan());
    }

    #[test]
    fn test_diff_degrees() {
        let (d, t) = diff_degrees(20.0, 25.0);
        assert_eq!(5.0, d);
        assert_eq!(0.0, t);

        // wrap across the date line
        let (d, _) = diff_degrees(170.0, -170.0);
        assert_eq!(20.0, d);
        let (d, _) = diff_degrees(-170.0, 170.0);
        assert_eq!(-20.0, d);

        // the full wrap is an identity
        let (d, t) = diff_degrees(-180.0, 180.0);
        assert_eq!(0.0, d);
        assert_eq!(0.0, t);
    }

    #[test]
    fn test_round_tiny() {
        assert_eq!(0.0, round_tiny(0.0));
        assert_eq!(1.0, round_tiny(1.0));
        assert_eq!(-1.0, round_tiny(-1.0));
        // values below the gap collapse to zero, preserving sign
        assert_eq!(0.0, round_tiny(1.0e-200));
        assert_eq!(1.0 / 32.0, round_tiny(1.0 / 32.0));
        assert!(round_tiny(-1.0e-200) <= 0.0);
    }

    #[test]
    fn test_sincosd_cardinal() {
        assert_eq!((0.0, 1.0), sincosd(0.0));
        assert_eq!((1.0, 0.0), sincosd(90.0));
        assert_eq!((0.0, -1.0), sincosd(180.0));
        assert_eq!((-1.0, 0.0), sincosd(-90.0));
        assert_eq!((0.0, -1.0), sincosd(-180.0));
    }

    #[test]
    fn test_atan2d_cardinal() {
        assert_eq!(0.0, atan2d(0.0, 1.0));
        assert_eq!(90.0, atan2d(1.0, 0.0));
        assert_eq!(180.0, atan2d(0.0, -1.0));
        assert_eq!(-90.0, atan2d(-1.0, 0.0));
        assert_eq!(45.0, atan2d(1.0, 1.0));
    }

    #[test]
    fn test_norm_pair() {
        let mut s = 3.0;
        let mut c = 4.0;
        norm_pair(&mut s, &mut c);
        assert_eq!(0.6, s);
        assert_eq!(0.8, c);
    }
}
