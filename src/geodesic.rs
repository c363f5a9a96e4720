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

//! The geodesic module contains the direct and inverse geodesic solvers.
//!
//! Working angles are held as unit-normalised (sin, cos) pairs on the
//! auxiliary sphere. The inverse solver canonicalises its inputs, picks a
//! starting azimuth (spherical, or from the astroid root when the points
//! are nearly antipodal) and performs Newton's iteration on the longitude
//! residual, falling back to bisection when a Newton step leaves the
//! bracket.

#![allow(clippy::float_cmp)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]

mod line;

pub use line::GeodesicLine;

use crate::angular;
use crate::ellipsoid::coefficients::{
    evaluate_a1, evaluate_a2, evaluate_coeffs_c1, evaluate_coeffs_c2, evaluate_coeffs_c3,
    sin_cos_series,
};
use crate::{Degrees, Ellipsoid, Metres};
use core::ops::{BitAnd, BitOr, BitOrAssign};
use unit_sphere::LatLong;

/// `sqrt(f64::MIN_POSITIVE)`: the underflow guard for cosines at the poles
/// and for degenerate azimuth differences.
pub(crate) const TINY: f64 = 1.491_668_146_240_041_3e-154;

/// Convergence threshold of the Newton iteration.
pub(crate) const TOL0: f64 = f64::EPSILON;
/// Acceptance threshold for a starting guess that needs no iteration.
pub(crate) const TOL1: f64 = 200.0 * TOL0;
/// `sqrt(f64::EPSILON)`.
pub(crate) const TOL2: f64 = 1.490_116_119_384_765_6e-8;
/// Bisection bracket collapse threshold.
pub(crate) const TOLB: f64 = TOL0 * TOL2;
/// Astroid branch selection margin on `x`.
pub(crate) const XTHRESH: f64 = 1000.0 * TOL2;

/// Newton steps with an analytic derivative.
const MAXIT1: u32 = 20;
/// Total iteration limit, Newton plus bisection.
const MAXIT2: u32 = MAXIT1 + 53 + 10;

/// The capabilities of a `GeodesicLine` and the output selectors of the
/// solvers.
///
/// Each output bit carries the series it needs, so a line constructed with
/// a given mask precomputes exactly the coefficient tables those outputs
/// require.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caps(u32);

impl Caps {
    pub(crate) const C1: Self = Self(1 << 0);
    pub(crate) const C1P: Self = Self(1 << 1);
    pub(crate) const C2: Self = Self(1 << 2);
    pub(crate) const C3: Self = Self(1 << 3);
    pub(crate) const C4: Self = Self(1 << 4);
    const CAP_ALL: u32 = 0x1F;
    const OUT_ALL: u32 = 0x7F80;

    /// No outputs.
    pub const NONE: Self = Self(0);
    /// The latitude of the end point.
    pub const LATITUDE: Self = Self(1 << 7);
    /// The longitude of the end point.
    pub const LONGITUDE: Self = Self(1 << 8 | 1 << 3);
    /// The azimuths at both end points.
    pub const AZIMUTH: Self = Self(1 << 9);
    /// The distance between the end points.
    pub const DISTANCE: Self = Self(1 << 10 | 1 << 0);
    /// Accept a distance (rather than an arc length) as input; requires
    /// the inverse distance series.
    pub const DISTANCE_IN: Self = Self(1 << 11 | 1 << 0 | 1 << 1);
    /// The reduced length `m12`.
    pub const REDUCED_LENGTH: Self = Self(1 << 12 | 1 << 0 | 1 << 2);
    /// The geodesic scales `M12` and `M21`.
    pub const GEODESIC_SCALE: Self = Self(1 << 13 | 1 << 0 | 1 << 2);
    /// The area `S12` under the geodesic.
    pub const AREA: Self = Self(1 << 14 | 1 << 4);
    /// Position, azimuth and distance: the usual outputs.
    pub const STANDARD: Self = Self(
        Self::LATITUDE.0 | Self::LONGITUDE.0 | Self::AZIMUTH.0 | Self::DISTANCE.0,
    );
    /// Everything.
    pub const ALL: Self = Self(Self::OUT_ALL | Self::CAP_ALL);
    /// The minimum capabilities of lines passed to the intersection
    /// engine.
    pub const INTERSECT: Self = Self(
        Self::STANDARD.0
            | Self::DISTANCE_IN.0
            | Self::REDUCED_LENGTH.0
            | Self::GEODESIC_SCALE.0,
    );

    /// Whether all of `other`s bits are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any of `other`s bits are set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The output bits of `self`, without the series capability bits.
    #[must_use]
    pub(crate) const fn outputs(self) -> Self {
        Self(self.0 & Self::OUT_ALL)
    }
}

impl BitOr for Caps {
    type Output = Self;
    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOrAssign for Caps {
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitAnd for Caps {
    type Output = Self;
    fn bitand(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

/// The outputs of a geodesic calculation.
///
/// Every field a calculation was not asked for (or could not provide) is
/// NaN; angles are in degrees, distances in metres and the area in square
/// metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeodesicData {
    /// The latitude of point 1.
    pub lat1: Degrees<f64>,
    /// The longitude of point 1.
    pub lon1: Degrees<f64>,
    /// The azimuth at point 1.
    pub azi1: Degrees<f64>,
    /// The latitude of point 2.
    pub lat2: Degrees<f64>,
    /// The longitude of point 2.
    pub lon2: Degrees<f64>,
    /// The (forward) azimuth at point 2.
    pub azi2: Degrees<f64>,
    /// The distance between point 1 and point 2.
    pub distance: Metres<f64>,
    /// The arc length on the auxiliary sphere between the points.
    pub arc_length: Degrees<f64>,
    /// The reduced length of the geodesic.
    pub reduced_length: Metres<f64>,
    /// The geodesic scale of point 2 relative to point 1.
    pub scale_12: f64,
    /// The geodesic scale of point 1 relative to point 2.
    pub scale_21: f64,
    /// The area under the geodesic, in square metres.
    pub area: f64,
}

impl Default for GeodesicData {
    fn default() -> Self {
        Self {
            lat1: Degrees(f64::NAN),
            lon1: Degrees(f64::NAN),
            azi1: Degrees(f64::NAN),
            lat2: Degrees(f64::NAN),
            lon2: Degrees(f64::NAN),
            azi2: Degrees(f64::NAN),
            distance: Metres(f64::NAN),
            arc_length: Degrees(f64::NAN),
            reduced_length: Metres(f64::NAN),
            scale_12: f64::NAN,
            scale_21: f64::NAN,
            area: f64::NAN,
        }
    }
}

/// Solve the astroid problem: the positive root of
/// `k⁴ + 2k³ - (x² + y² - 1)k² - 2y²k - y² = 0`,
/// used to start the inverse solver for nearly antipodal points.
/// * `x`, `y` - the scaled astroid coordinates.
#[must_use]
pub(crate) fn calculate_astroid(x: f64, y: f64) -> f64 {
    let p = x * x;
    let q = y * y;
    let r = (p + q - 1.0) / 6.0;

    // y = 0 with |x| <= 1: the point is on the astroid scar and the root
    // is zero
    if q <= 0.0 && r <= 0.0 {
        0.0
    } else {
        let s = p * q / 4.0;
        let r2 = r * r;
        let r3 = r * r2;
        let mut u = r;

        // The discriminant of the cubic in T3 is zero on the astroid
        // envelope p^(1/3) + q^(1/3) = 1
        let discriminant = s * (s + 2.0 * r3);
        if discriminant >= 0.0 {
            let mut t3 = s + r3;
            // Pick the sign of the sqrt to maximise |T3| and so minimise
            // cancellation
            t3 += if t3 < 0.0 {
                -libm::sqrt(discriminant)
            } else {
                libm::sqrt(discriminant)
            };
            let t = libm::cbrt(t3);
            u += if t == 0.0 { 0.0 } else { t + r2 / t };
        } else {
            // T is complex, but the way u is defined the result is real
            let angle = libm::atan2(libm::sqrt(-discriminant), -(s + r3));
            // Of the three cube roots choose the one which avoids
            // cancellation; discriminant < 0 implies r < 0
            u += 2.0 * r * libm::cos(angle / 3.0);
        }

        let v = libm::sqrt(u * u + q); // guaranteed positive
        let uv = if u < 0.0 { q / (v - u) } else { u + v }; // u + v, positive
        let w = (uv - q) / (2.0 * v);

        // Rearranged to avoid loss of accuracy from subtraction; division
        // by zero is not possible because uv > 0 and w >= 0
        uv / (libm::sqrt(uv + w * w) + w)
    }
}

/// Evaluate the distance, reduced length and geodesic scale integrals
/// between `sigma1` and `sigma2`.
///
/// Returns `(s12b, m12b, m0, scale_12, scale_21)`: the distance and reduced
/// length are in units of the Semiminor axis; only the quantities selected
/// by `caps` are computed, the others stay NaN.
pub(crate) fn calculate_lengths(
    ellipsoid: &Ellipsoid,
    eps: f64,
    sigma12: f64,
    sin_sigma1: f64,
    cos_sigma1: f64,
    dn1: f64,
    sin_sigma2: f64,
    cos_sigma2: f64,
    dn2: f64,
    cos_beta1: f64,
    cos_beta2: f64,
    caps: Caps,
    c1a: &mut [f64; 7],
    c2a: &mut [f64; 7],
) -> (f64, f64, f64, f64, f64) {
    let caps = caps.outputs();
    let mut s12b = f64::NAN;
    let mut m12b = f64::NAN;
    let mut m0 = f64::NAN;
    let mut scale_12 = f64::NAN;
    let mut scale_21 = f64::NAN;

    let mut a1 = 0.0;
    let mut a2 = 0.0;
    let mut m0x = 0.0;
    let mut j12 = 0.0;

    let distance_caps = Caps::DISTANCE | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE;
    let length_caps = Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE;
    if caps.intersects(distance_caps) {
        a1 = evaluate_a1(eps);
        *c1a = evaluate_coeffs_c1(eps);
        if caps.intersects(length_caps) {
            a2 = evaluate_a2(eps);
            *c2a = evaluate_coeffs_c2(eps);
            m0x = a1 - a2;
            a2 += 1.0;
        }
        a1 += 1.0;
    }
    if caps.intersects(Caps::DISTANCE) {
        let b1 = sin_cos_series(true, sin_sigma2, cos_sigma2, c1a)
            - sin_cos_series(true, sin_sigma1, cos_sigma1, c1a);
        s12b = a1 * (sigma12 + b1);
        if caps.intersects(length_caps) {
            let b2 = sin_cos_series(true, sin_sigma2, cos_sigma2, c2a)
                - sin_cos_series(true, sin_sigma1, cos_sigma1, c2a);
            j12 = m0x * sigma12 + (a1 * b1 - a2 * b2);
        }
    } else if caps.intersects(length_caps) {
        // combine the C1 and C2 series into one difference
        for l in 1..7 {
            c2a[l] = a1 * c1a[l] - a2 * c2a[l];
        }
        j12 = m0x * sigma12
            + (sin_cos_series(true, sin_sigma2, cos_sigma2, c2a)
                - sin_cos_series(true, sin_sigma1, cos_sigma1, c2a));
    }
    if caps.intersects(Caps::REDUCED_LENGTH) {
        m0 = m0x;
        // parenthesised for accurate cancellation when the points coincide
        m12b = dn2 * (cos_sigma1 * sin_sigma2) - dn1 * (sin_sigma1 * cos_sigma2)
            - cos_sigma1 * cos_sigma2 * j12;
    }
    if caps.intersects(Caps::GEODESIC_SCALE) {
        let cos_sigma12 = cos_sigma1 * cos_sigma2 + sin_sigma1 * sin_sigma2;
        let t = ellipsoid.ep_2() * (cos_beta1 - cos_beta2) * (cos_beta1 + cos_beta2)
            / (dn1 + dn2);
        scale_12 = cos_sigma12 + (t * sin_sigma2 - cos_sigma2 * j12) * sin_sigma1 / dn1;
        scale_21 = cos_sigma12 - (t * sin_sigma1 - cos_sigma1 * j12) * sin_sigma2 / dn2;
    }
    (s12b, m12b, m0, scale_12, scale_21)
}

/// The starting guess for the inverse solver.
///
/// Returns `(sigma12, sin_alpha1, cos_alpha1, sin_alpha2, cos_alpha2, dnm)`
/// where `sigma12 >= 0` means the guess needs no Newton polishing (a short
/// line), and `sigma12 < 0` flags an estimate - spherical, or from the
/// astroid root when the points are nearly antipodal.
fn inverse_start(
    ellipsoid: &Ellipsoid,
    sin_beta1: f64,
    cos_beta1: f64,
    dn1: f64,
    sin_beta2: f64,
    cos_beta2: f64,
    dn2: f64,
    lambda12: f64,
    sin_lambda12: f64,
    cos_lambda12: f64,
    c1a: &mut [f64; 7],
    c2a: &mut [f64; 7],
) -> (f64, f64, f64, f64, f64, f64) {
    let mut sigma12 = -1.0;
    let mut sin_alpha2 = f64::NAN;
    let mut cos_alpha2 = f64::NAN;
    let mut dnm = f64::NAN;

    let sin_beta12 = sin_beta2 * cos_beta1 - cos_beta2 * sin_beta1;
    let cos_beta12 = cos_beta2 * cos_beta1 + sin_beta2 * sin_beta1;
    let sin_beta12a = sin_beta2 * cos_beta1 + cos_beta2 * sin_beta1;

    let shortline = cos_beta12 >= 0.0 && sin_beta12 < 0.5 && cos_beta2 * lambda12 < 0.5;
    let (mut sin_omega12, mut cos_omega12) = if shortline {
        let mut sin_beta_m2 = (sin_beta1 + sin_beta2) * (sin_beta1 + sin_beta2);
        sin_beta_m2 /= sin_beta_m2 + (cos_beta1 + cos_beta2) * (cos_beta1 + cos_beta2);
        dnm = libm::sqrt(1.0 + ellipsoid.ep_2() * sin_beta_m2);
        let omega12 = lambda12 / (ellipsoid.one_minus_f() * dnm);
        (libm::sin(omega12), libm::cos(omega12))
    } else {
        (sin_lambda12, cos_lambda12)
    };

    let mut sin_alpha1 = cos_beta2 * sin_omega12;
    let mut cos_alpha1 = if cos_omega12 >= 0.0 {
        sin_beta12 + cos_beta2 * sin_beta1 * sin_omega12 * sin_omega12 / (1.0 + cos_omega12)
    } else {
        sin_beta12a - cos_beta2 * sin_beta1 * sin_omega12 * sin_omega12 / (1.0 - cos_omega12)
    };

    let sin_sigma12 = libm::hypot(sin_alpha1, cos_alpha1);
    let cos_sigma12 = sin_beta1 * sin_beta2 + cos_beta1 * cos_beta2 * cos_omega12;

    if shortline && sin_sigma12 < ellipsoid.etol2() {
        // really short lines: accept the spherical solution as-is
        sin_alpha2 = cos_beta1 * sin_omega12;
        cos_alpha2 = sin_beta12
            - cos_beta1
                * sin_beta2
                * (if cos_omega12 >= 0.0 {
                    sin_omega12 * sin_omega12 / (1.0 + cos_omega12)
                } else {
                    1.0 - cos_omega12
                });
        angular::norm_pair(&mut sin_alpha2, &mut cos_alpha2);
        sigma12 = libm::atan2(sin_sigma12, cos_sigma12);
    } else if libm::fabs(ellipsoid.n()) > 0.1
        || cos_sigma12 >= 0.0
        || sin_sigma12
            >= 6.0 * libm::fabs(ellipsoid.n()) * core::f64::consts::PI * cos_beta1 * cos_beta1
    {
        // nothing to do, the spherical azimuth estimate is fine
    } else {
        // nearly antipodal: scale the coordinates and solve the astroid
        // problem for the starting azimuth
        let x: f64;
        let y: f64;
        let beta_scale: f64;
        let lambda_scale: f64;
        let lambda12x = libm::atan2(-sin_lambda12, -cos_lambda12);
        if ellipsoid.f() >= 0.0 {
            let k2 = sin_beta1 * sin_beta1 * ellipsoid.ep_2();
            let eps = crate::ellipsoid::calculate_epsilon(k2);
            lambda_scale = ellipsoid.f()
                * cos_beta1
                * ellipsoid.calculate_a3f(eps)
                * core::f64::consts::PI;
            beta_scale = lambda_scale * cos_beta1;
            x = lambda12x / lambda_scale;
            y = sin_beta12a / beta_scale;
        } else {
            let cos_beta12a = cos_beta2 * cos_beta1 - sin_beta2 * sin_beta1;
            let beta12a = libm::atan2(sin_beta12a, cos_beta12a);
            let (_, m12b, m0, _, _) = calculate_lengths(
                ellipsoid,
                ellipsoid.n(),
                core::f64::consts::PI + beta12a,
                sin_beta1,
                -cos_beta1,
                dn1,
                sin_beta2,
                cos_beta2,
                dn2,
                cos_beta1,
                cos_beta2,
                Caps::REDUCED_LENGTH,
                c1a,
                c2a,
            );
            x = -1.0 + m12b / (cos_beta1 * cos_beta2 * m0 * core::f64::consts::PI);
            beta_scale = if x < -0.01 {
                sin_beta12a / x
            } else {
                -ellipsoid.f() * cos_beta1 * cos_beta1 * core::f64::consts::PI
            };
            lambda_scale = beta_scale / cos_beta1;
            y = lambda12x / lambda_scale;
        }
        if y > -TOL1 && x > -1.0 - XTHRESH {
            // strip near the cut: the geodesic runs close to a meridian
            if ellipsoid.f() >= 0.0 {
                sin_alpha1 = f64::min(-x, 1.0);
                cos_alpha1 = -libm::sqrt(1.0 - sin_alpha1 * sin_alpha1);
            } else {
                cos_alpha1 = f64::max(x, if x > -TOL1 { 0.0 } else { -1.0 });
                sin_alpha1 = libm::sqrt(1.0 - cos_alpha1 * cos_alpha1);
            }
        } else {
            let k = calculate_astroid(x, y);
            let omega12a = lambda_scale
                * if ellipsoid.f() >= 0.0 {
                    -x * k / (1.0 + k)
                } else {
                    -y * (1.0 + k) / k
                };
            sin_omega12 = libm::sin(omega12a);
            cos_omega12 = -libm::cos(omega12a);
            sin_alpha1 = cos_beta2 * sin_omega12;
            cos_alpha1 = sin_beta12a
                - cos_beta2 * sin_beta1 * sin_omega12 * sin_omega12 / (1.0 - cos_omega12);
        }
    }

    if sin_alpha1 > 0.0 || sin_alpha1.is_nan() {
        angular::norm_pair(&mut sin_alpha1, &mut cos_alpha1);
    } else {
        sin_alpha1 = 1.0;
        cos_alpha1 = 0.0;
    }
    (sigma12, sin_alpha1, cos_alpha1, sin_alpha2, cos_alpha2, dnm)
}

/// Evaluate the longitude residual and its derivative for the Newton
/// iteration of the inverse solver.
///
/// Returns `(lam12, sin_alpha2, cos_alpha2, sigma12, sin_sigma1,
/// cos_sigma1, sin_sigma2, cos_sigma2, eps, domg12, dlam12)`.
fn lambda12(
    ellipsoid: &Ellipsoid,
    sin_beta1: f64,
    cos_beta1: f64,
    dn1: f64,
    sin_beta2: f64,
    cos_beta2: f64,
    dn2: f64,
    sin_alpha1: f64,
    cos_alpha1: f64,
    sin_lambda120: f64,
    cos_lambda120: f64,
    diffp: bool,
    c1a: &mut [f64; 7],
    c2a: &mut [f64; 7],
    c3a: &mut [f64; 6],
) -> (f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64) {
    let cos_alpha1 = if sin_beta1 == 0.0 && cos_alpha1 == 0.0 {
        // break the degeneracy of an equatorial line heading due east
        -TINY
    } else {
        cos_alpha1
    };
    let sin_alpha0 = sin_alpha1 * cos_beta1;
    let cos_alpha0 = libm::hypot(cos_alpha1, sin_alpha1 * sin_beta1);

    let mut sin_sigma1 = sin_beta1;
    let sin_omega1 = sin_alpha0 * sin_beta1;
    let mut cos_sigma1 = cos_alpha1 * cos_beta1;
    let cos_omega1 = cos_sigma1;
    angular::norm_pair(&mut sin_sigma1, &mut cos_sigma1);

    let sin_alpha2 = if cos_beta2 == cos_beta1 {
        sin_alpha1
    } else {
        sin_alpha0 / cos_beta2
    };
    let cos_alpha2 = if cos_beta2 != cos_beta1 || libm::fabs(sin_beta2) != -sin_beta1 {
        let t1 = cos_alpha1 * cos_beta1;
        let t2 = if cos_beta1 < -sin_beta1 {
            (cos_beta2 - cos_beta1) * (cos_beta1 + cos_beta2)
        } else {
            (sin_beta1 - sin_beta2) * (sin_beta1 + sin_beta2)
        };
        libm::sqrt(t1 * t1 + t2) / cos_beta2
    } else {
        libm::fabs(cos_alpha1)
    };
    let mut sin_sigma2 = sin_beta2;
    let sin_omega2 = sin_alpha0 * sin_beta2;
    let mut cos_sigma2 = cos_alpha2 * cos_beta2;
    let cos_omega2 = cos_sigma2;
    angular::norm_pair(&mut sin_sigma2, &mut cos_sigma2);

    let sigma12 = libm::atan2(
        f64::max(cos_sigma1 * sin_sigma2 - sin_sigma1 * cos_sigma2, 0.0),
        cos_sigma1 * cos_sigma2 + sin_sigma1 * sin_sigma2,
    );
    let sin_omega12 = f64::max(cos_omega1 * sin_omega2 - sin_omega1 * cos_omega2, 0.0);
    let cos_omega12 = cos_omega1 * cos_omega2 + sin_omega1 * sin_omega2;
    // eta = omega12 - lambda120
    let eta = libm::atan2(
        sin_omega12 * cos_lambda120 - cos_omega12 * sin_lambda120,
        cos_omega12 * cos_lambda120 + sin_omega12 * sin_lambda120,
    );

    let k2 = cos_alpha0 * cos_alpha0 * ellipsoid.ep_2();
    let eps = crate::ellipsoid::calculate_epsilon(k2);
    *c3a = evaluate_coeffs_c3(ellipsoid.c3x(), eps);
    let b312 = sin_cos_series(true, sin_sigma2, cos_sigma2, c3a)
        - sin_cos_series(true, sin_sigma1, cos_sigma1, c3a);
    let domg12 = -ellipsoid.f() * ellipsoid.calculate_a3f(eps) * sin_alpha0 * (sigma12 + b312);
    let lam12 = eta + domg12;

    let dlam12 = if diffp {
        if cos_alpha2 == 0.0 {
            -2.0 * ellipsoid.one_minus_f() * dn1 / sin_beta1
        } else {
            let (_, m12b, _, _, _) = calculate_lengths(
                ellipsoid,
                eps,
                sigma12,
                sin_sigma1,
                cos_sigma1,
                dn1,
                sin_sigma2,
                cos_sigma2,
                dn2,
                cos_beta1,
                cos_beta2,
                Caps::REDUCED_LENGTH,
                c1a,
                c2a,
            );
            m12b * ellipsoid.one_minus_f() / (cos_alpha2 * cos_beta2)
        }
    } else {
        f64::NAN
    };
    (
        lam12, sin_alpha2, cos_alpha2, sigma12, sin_sigma1, cos_sigma1, sin_sigma2, cos_sigma2,
        eps, domg12, dlam12,
    )
}

/// Solve the inverse geodesic problem.
/// * `a`, `b` - the start and finish positions in geodetic coordinates.
/// * `caps` - the requested outputs.
///
/// If the iteration fails to converge (not expected for ellipsoidal models
/// of the Earth) the distances come back negated and the azimuths
/// reversed, as an in-band signal.
#[must_use]
pub fn inverse(ellipsoid: &Ellipsoid, a: &LatLong<f64>, b: &LatLong<f64>, caps: Caps) -> GeodesicData {
    let mut data = GeodesicData {
        lat1: a.lat(),
        lon1: a.lon(),
        lat2: b.lat(),
        lon2: b.lon(),
        ..GeodesicData::default()
    };
    let caps = caps.outputs();

    let (lon12, lon12s) = angular::diff_degrees(a.lon().0, b.lon().0);
    let mut lon_sign = if lon12 >= 0.0 { 1.0 } else { -1.0 };
    let lon12 = lon_sign * angular::round_tiny(lon12);
    let lon12s = angular::round_tiny((180.0 - lon12) - lon_sign * lon12s);
    let lam12 = lon12.to_radians();
    let (sin_lambda12, cos_lambda12) = if lon12 > 90.0 {
        let (s, c) = angular::sincosd(lon12s);
        (s, -c)
    } else {
        angular::sincosd(lon12)
    };

    let mut lat1 = angular::round_tiny(angular::latitude_fix(a.lat().0));
    let mut lat2 = angular::round_tiny(angular::latitude_fix(b.lat().0));

    // solve with point 1 the furthest from the Equator, in the southern
    // hemisphere, remembering the flips
    let swapped = libm::fabs(lat1) < libm::fabs(lat2);
    if swapped {
        lon_sign = -lon_sign;
        core::mem::swap(&mut lat1, &mut lat2);
    }
    let lat_sign = if lat1 < 0.0 { 1.0 } else { -1.0 };
    lat1 *= lat_sign;
    lat2 *= lat_sign;

    let (mut sin_beta1, mut cos_beta1) = angular::sincosd(lat1);
    sin_beta1 *= ellipsoid.one_minus_f();
    angular::norm_pair(&mut sin_beta1, &mut cos_beta1);
    cos_beta1 = f64::max(TINY, cos_beta1);

    let (mut sin_beta2, mut cos_beta2) = angular::sincosd(lat2);
    sin_beta2 *= ellipsoid.one_minus_f();
    angular::norm_pair(&mut sin_beta2, &mut cos_beta2);
    cos_beta2 = f64::max(TINY, cos_beta2);

    // curb errors from the sincos ladder when one point sits much closer
    // to a pole than the other
    if cos_beta1 < -sin_beta1 {
        if cos_beta2 == cos_beta1 {
            sin_beta2 = if sin_beta2 < 0.0 { sin_beta1 } else { -sin_beta1 };
        }
    } else if libm::fabs(sin_beta2) == -sin_beta1 {
        cos_beta2 = cos_beta1;
    }

    let dn1 = libm::sqrt(1.0 + ellipsoid.ep_2() * sin_beta1 * sin_beta1);
    let dn2 = libm::sqrt(1.0 + ellipsoid.ep_2() * sin_beta2 * sin_beta2);

    let mut c1a = [0.0; 7];
    let mut c2a = [0.0; 7];
    let mut c3a = [0.0; 6];

    let mut meridian = lat1 == -90.0 || sin_lambda12 == 0.0;
    let mut sin_alpha1 = 0.0;
    let mut cos_alpha1 = 0.0;
    let mut sin_alpha2 = 0.0;
    let mut cos_alpha2 = 0.0;
    let mut sin_sigma1 = 0.0;
    let mut cos_sigma1 = 0.0;
    let mut sin_sigma2 = 0.0;
    let mut cos_sigma2 = 0.0;
    let mut sigma12: f64 = f64::NAN;
    let mut s12x = f64::NAN;
    let mut m12x = f64::NAN;
    let mut a12 = f64::NAN;
    let mut scale_12 = f64::NAN;
    let mut scale_21 = f64::NAN;
    let mut area = f64::NAN;
    let mut solved = true;

    if meridian {
        // the geodesic runs along a meridian: azimuths are known, only the
        // integrals are needed
        sin_alpha1 = sin_lambda12;
        cos_alpha1 = cos_lambda12;
        sin_alpha2 = 0.0;
        cos_alpha2 = 1.0;

        sin_sigma1 = sin_beta1;
        cos_sigma1 = cos_alpha1 * cos_beta1;
        sin_sigma2 = sin_beta2;
        cos_sigma2 = cos_alpha2 * cos_beta2;

        sigma12 = libm::atan2(
            f64::max(cos_sigma1 * sin_sigma2 - sin_sigma1 * cos_sigma2, 0.0),
            cos_sigma1 * cos_sigma2 + sin_sigma1 * sin_sigma2,
        );
        let (s12b, m12b, _, sc12, sc21) = calculate_lengths(
            ellipsoid,
            ellipsoid.n(),
            sigma12,
            sin_sigma1,
            cos_sigma1,
            dn1,
            sin_sigma2,
            cos_sigma2,
            dn2,
            cos_beta1,
            cos_beta2,
            caps | Caps::DISTANCE | Caps::REDUCED_LENGTH,
            &mut c1a,
            &mut c2a,
        );
        s12x = s12b;
        m12x = m12b;
        scale_12 = sc12;
        scale_21 = sc21;

        if sigma12 < 1.0 || m12x >= 0.0 {
            if sigma12 < 3.0 * TINY {
                sigma12 = 0.0;
                m12x = 0.0;
                s12x = 0.0;
            }
            m12x *= ellipsoid.b().0;
            s12x *= ellipsoid.b().0;
            a12 = sigma12.to_degrees();
        } else {
            // m12 < 0: the geodesic wraps past a pole and the meridian is
            // not the shortest path
            meridian = false;
        }
    }

    let mut sin_omega12 = 2.0;
    let mut cos_omega12 = 0.0;
    let mut omega12 = 0.0;
    let mut eps = 0.0;
    let mut domg12 = 0.0;
    if !meridian
        && sin_beta1 == 0.0
        && (ellipsoid.f() <= 0.0 || lon12s >= ellipsoid.f() * 180.0)
    {
        // both points on the Equator, short enough that the equator is the
        // geodesic
        cos_alpha1 = 0.0;
        cos_alpha2 = 0.0;
        sin_alpha1 = 1.0;
        sin_alpha2 = 1.0;

        s12x = ellipsoid.a().0 * lam12;
        sigma12 = lam12 / ellipsoid.one_minus_f();
        omega12 = sigma12;
        m12x = ellipsoid.b().0 * libm::sin(sigma12);
        if caps.intersects(Caps::GEODESIC_SCALE) {
            scale_12 = libm::cos(sigma12);
            scale_21 = scale_12;
        }
        a12 = lon12 / ellipsoid.one_minus_f();
    } else if !meridian {
        let start = inverse_start(
            ellipsoid,
            sin_beta1,
            cos_beta1,
            dn1,
            sin_beta2,
            cos_beta2,
            dn2,
            lam12,
            sin_lambda12,
            cos_lambda12,
            &mut c1a,
            &mut c2a,
        );
        sigma12 = start.0;
        sin_alpha1 = start.1;
        cos_alpha1 = start.2;
        sin_alpha2 = start.3;
        cos_alpha2 = start.4;
        let dnm = start.5;

        if sigma12 >= 0.0 {
            // short line: the spherical solution on a sphere of radius
            // b * dnm is already good enough
            s12x = sigma12 * ellipsoid.b().0 * dnm;
            m12x = dnm * dnm * ellipsoid.b().0 * libm::sin(sigma12 / dnm);
            if caps.intersects(Caps::GEODESIC_SCALE) {
                scale_12 = libm::cos(sigma12 / dnm);
                scale_21 = scale_12;
            }
            a12 = sigma12.to_degrees();
            omega12 = lam12 / (ellipsoid.one_minus_f() * dnm);
        } else {
            // Newton's iteration on alpha1, with a bisection fallback on
            // the bracket [alpha1a, alpha1b]
            let mut trip_near = false;
            let mut trip_bisect = false;
            let mut sin_alpha1a = TINY;
            let mut cos_alpha1a = 1.0;
            let mut sin_alpha1b = TINY;
            let mut cos_alpha1b = -1.0;
            solved = false;

            for numit in 0..MAXIT2 {
                let res = lambda12(
                    ellipsoid,
                    sin_beta1,
                    cos_beta1,
                    dn1,
                    sin_beta2,
                    cos_beta2,
                    dn2,
                    sin_alpha1,
                    cos_alpha1,
                    sin_lambda12,
                    cos_lambda12,
                    numit < MAXIT1,
                    &mut c1a,
                    &mut c2a,
                    &mut c3a,
                );
                // lambda12 measures eta against the target longitude, so
                // its value is already the residual
                let v = res.0;
                sin_alpha2 = res.1;
                cos_alpha2 = res.2;
                sigma12 = res.3;
                sin_sigma1 = res.4;
                cos_sigma1 = res.5;
                sin_sigma2 = res.6;
                cos_sigma2 = res.7;
                eps = res.8;
                domg12 = res.9;
                let dv = res.10;

                if trip_bisect || libm::fabs(v) < if trip_near { 8.0 } else { 1.0 } * TOL0 {
                    solved = true;
                    break;
                }
                if v.is_nan() {
                    break;
                }
                // maintain the bracket
                if v > 0.0
                    && (numit > MAXIT1 || cos_alpha1 / sin_alpha1 > cos_alpha1b / sin_alpha1b)
                {
                    sin_alpha1b = sin_alpha1;
                    cos_alpha1b = cos_alpha1;
                } else if v < 0.0
                    && (numit > MAXIT1 || cos_alpha1 / sin_alpha1 < cos_alpha1a / sin_alpha1a)
                {
                    sin_alpha1a = sin_alpha1;
                    cos_alpha1a = cos_alpha1;
                }
                if numit < MAXIT1 && dv > 0.0 {
                    let dalpha1 = -v / dv;
                    let sin_dalpha1 = libm::sin(dalpha1);
                    let cos_dalpha1 = libm::cos(dalpha1);
                    let next_sin = sin_alpha1 * cos_dalpha1 + cos_alpha1 * sin_dalpha1;
                    if next_sin > 0.0 && libm::fabs(dalpha1) < core::f64::consts::PI {
                        cos_alpha1 = cos_alpha1 * cos_dalpha1 - sin_alpha1 * sin_dalpha1;
                        sin_alpha1 = next_sin;
                        angular::norm_pair(&mut sin_alpha1, &mut cos_alpha1);
                        // near convergence the residual error scales as v^2
                        trip_near = libm::fabs(v) <= 16.0 * TOL0;
                        continue;
                    }
                }
                // the Newton step failed or ran outside [0, pi]: bisect
                sin_alpha1 = (sin_alpha1a + sin_alpha1b) / 2.0;
                cos_alpha1 = (cos_alpha1a + cos_alpha1b) / 2.0;
                angular::norm_pair(&mut sin_alpha1, &mut cos_alpha1);
                trip_near = false;
                trip_bisect = libm::fabs(sin_alpha1a - sin_alpha1) + (cos_alpha1a - cos_alpha1)
                    < TOLB
                    || libm::fabs(sin_alpha1 - sin_alpha1b) + (cos_alpha1 - cos_alpha1b) < TOLB;
            }
            if !solved {
                log::warn!(
                    "geodesic inverse failed to converge: ({lat1}, {lon12}) with f = {}",
                    ellipsoid.f()
                );
            }
            let length_caps = if caps.intersects(Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE) {
                caps | Caps::DISTANCE
            } else {
                caps
            };
            let (s12b, m12b, _, sc12, sc21) = calculate_lengths(
                ellipsoid,
                eps,
                sigma12,
                sin_sigma1,
                cos_sigma1,
                dn1,
                sin_sigma2,
                cos_sigma2,
                dn2,
                cos_beta1,
                cos_beta2,
                length_caps,
                &mut c1a,
                &mut c2a,
            );
            s12x = s12b * ellipsoid.b().0;
            m12x = m12b * ellipsoid.b().0;
            scale_12 = sc12;
            scale_21 = sc21;
            a12 = sigma12.to_degrees();
            if caps.intersects(Caps::AREA) {
                let sin_domg12 = libm::sin(domg12);
                let cos_domg12 = libm::cos(domg12);
                sin_omega12 = sin_lambda12 * cos_domg12 - cos_lambda12 * sin_domg12;
                cos_omega12 = cos_lambda12 * cos_domg12 + sin_lambda12 * sin_domg12;
            }
        }
    }

    if caps.intersects(Caps::DISTANCE) {
        data.distance = Metres(s12x);
    }
    if caps.intersects(Caps::REDUCED_LENGTH) {
        data.reduced_length = Metres(m12x);
    }
    if caps.intersects(Caps::GEODESIC_SCALE) {
        data.scale_12 = scale_12;
        data.scale_21 = scale_21;
    }
    if caps.intersects(Caps::AREA) {
        let sin_alpha0 = sin_alpha1 * cos_beta1;
        let cos_alpha0 = libm::hypot(cos_alpha1, sin_alpha1 * sin_beta1);
        area = if cos_alpha0 != 0.0 && sin_alpha0 != 0.0 {
            let mut sin_sig1 = sin_beta1;
            let mut cos_sig1 = cos_alpha1 * cos_beta1;
            let mut sin_sig2 = sin_beta2;
            let mut cos_sig2 = cos_alpha2 * cos_beta2;
            let k2 = cos_alpha0 * cos_alpha0 * ellipsoid.ep_2();
            let eps = crate::ellipsoid::calculate_epsilon(k2);
            let a4 = ellipsoid.a().0 * ellipsoid.a().0 * cos_alpha0 * sin_alpha0
                * ellipsoid.e_2();
            angular::norm_pair(&mut sin_sig1, &mut cos_sig1);
            angular::norm_pair(&mut sin_sig2, &mut cos_sig2);
            let c4a = crate::ellipsoid::coefficients::evaluate_coeffs_c4(ellipsoid.c4x(), eps);
            let b41 = sin_cos_series(false, sin_sig1, cos_sig1, &c4a);
            let b42 = sin_cos_series(false, sin_sig2, cos_sig2, &c4a);
            a4 * (b42 - b41)
        } else {
            0.0
        };

        if !meridian && sin_omega12 > 1.0 {
            sin_omega12 = libm::sin(omega12);
            cos_omega12 = libm::cos(omega12);
        }

        let alpha12 = if !meridian
            && cos_omega12 > -core::f64::consts::FRAC_1_SQRT_2
            && sin_beta2 - sin_beta1 < 1.75
        {
            // geodesic runs in one hemisphere: the spherical excess
            // formula is well conditioned
            let d_omega12 = 1.0 + cos_omega12;
            let d_beta1 = 1.0 + cos_beta1;
            let d_beta2 = 1.0 + cos_beta2;
            2.0 * libm::atan2(
                sin_omega12 * (sin_beta1 * d_beta2 + sin_beta2 * d_beta1),
                d_omega12 * (sin_beta1 * sin_beta2 + d_beta1 * d_beta2),
            )
        } else {
            let mut sin_alpha12 = sin_alpha2 * cos_alpha1 - cos_alpha2 * sin_alpha1;
            let mut cos_alpha12 = cos_alpha2 * cos_alpha1 + sin_alpha2 * sin_alpha1;
            if sin_alpha12 == 0.0 && cos_alpha12 < 0.0 {
                sin_alpha12 = TINY * cos_alpha1;
                cos_alpha12 = -1.0;
            }
            libm::atan2(sin_alpha12, cos_alpha12)
        };
        area += ellipsoid.c_2() * alpha12;
        area *= if swapped { -1.0 } else { 1.0 } * lon_sign * lat_sign;
        area += 0.0;
        data.area = area;
    }

    if swapped {
        core::mem::swap(&mut sin_alpha1, &mut sin_alpha2);
        core::mem::swap(&mut cos_alpha1, &mut cos_alpha2);
        if caps.intersects(Caps::GEODESIC_SCALE) {
            core::mem::swap(&mut data.scale_12, &mut data.scale_21);
        }
    }
    let swap_sign = if swapped { -1.0 } else { 1.0 };
    sin_alpha1 *= swap_sign * lon_sign;
    cos_alpha1 *= swap_sign * lat_sign;
    sin_alpha2 *= swap_sign * lon_sign;
    cos_alpha2 *= swap_sign * lat_sign;

    data.arc_length = Degrees(a12);
    if caps.intersects(Caps::AZIMUTH) {
        data.azi1 = Degrees(angular::atan2d(sin_alpha1, cos_alpha1));
        data.azi2 = Degrees(angular::atan2d(sin_alpha2, cos_alpha2));
    }

    if !solved {
        // signal non-convergence: negated magnitudes, reversed azimuths
        data.distance = Metres(-data.distance.0);
        data.reduced_length = Metres(-data.reduced_length.0);
        data.arc_length = Degrees(-data.arc_length.0);
        if caps.intersects(Caps::AZIMUTH) {
            data.azi1 = Degrees(angular::normalize(data.azi1.0 + 180.0));
            data.azi2 = Degrees(angular::normalize(data.azi2.0 + 180.0));
        }
    }
    data
}

/// Solve the direct geodesic problem with the length given in metres.
/// * `a` - the start position in geodetic coordinates.
/// * `azimuth` - the azimuth at the start position.
/// * `distance` - the distance along the geodesic in `Metres`.
/// * `caps` - the requested outputs.
#[must_use]
pub fn direct(
    ellipsoid: &Ellipsoid,
    a: &LatLong<f64>,
    azimuth: Degrees<f64>,
    distance: Metres<f64>,
    caps: Caps,
) -> GeodesicData {
    GeodesicLine::new(ellipsoid, a, azimuth, caps | Caps::DISTANCE_IN).position_internal(
        false,
        distance.0,
        caps,
    )
}

/// Solve the direct geodesic problem with the length given as an arc length
/// on the auxiliary sphere.
/// * `a` - the start position in geodetic coordinates.
/// * `azimuth` - the azimuth at the start position.
/// * `arc` - the arc length on the auxiliary sphere in `Degrees`.
/// * `caps` - the requested outputs.
#[must_use]
pub fn direct_arc(
    ellipsoid: &Ellipsoid,
    a: &LatLong<f64>,
    azimuth: Degrees<f64>,
    arc: Degrees<f64>,
    caps: Caps,
) -> GeodesicData {
    GeodesicLine::new(ellipsoid, a, azimuth, caps).position_internal(true, arc.0, caps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use angle_sc::is_within_tolerance;

    #[test]
    fn test_caps() {
        assert!(Caps::ALL.contains(Caps::AREA));
        assert!(Caps::STANDARD.contains(Caps::DISTANCE));
        assert!(!Caps::STANDARD.contains(Caps::AREA));
        assert!(Caps::DISTANCE_IN.contains(Caps::C1));
        assert!(Caps::DISTANCE_IN.contains(Caps::C1P));
        assert!(Caps::LONGITUDE.contains(Caps::C3));
        assert!(Caps::AREA.contains(Caps::C4));
        assert!((Caps::DISTANCE | Caps::AZIMUTH).intersects(Caps::AZIMUTH));
        assert_eq!(Caps::NONE, Caps::AREA & Caps::DISTANCE);
    }

    #[test]
    fn test_calculate_astroid() {
        assert_eq!(0.0, calculate_astroid(0.0, 0.0));
        assert_eq!(0.0, calculate_astroid(1.0, 0.0));

        // 0.0, 0.0 to 0.5, 179.5
        assert_eq!(
            0.91583665308532092,
            calculate_astroid(-0.82852367684428574, -0.82576675584253256)
        );
        // 0.0, 0.0 to 1.0, 179.0
        assert_eq!(
            1.9858096632693705,
            calculate_astroid(-1.6572357126833825, -1.6518470456464789)
        );
        // -30.0, 0.0 to 30.0, 179.0
        assert_eq!(
            0.9121190093974804,
            calculate_astroid(-1.9121190093974805, 0.0)
        );
        // -30.0, 0.0 to 30.5, 179.5
        assert_eq!(
            1.2324261949931818,
            calculate_astroid(-0.96091919533424308, -1.1124132048023443)
        );
    }

    #[test]
    fn test_inverse_equator() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(0.0), Degrees(0.0));
        let b = LatLong::new(Degrees(0.0), Degrees(90.0));

        let r = inverse(&wgs84, &a, &b, Caps::STANDARD);
        assert_eq!(90.0, r.azi1.0);
        assert_eq!(90.0, r.azi2.0);
        assert!(is_within_tolerance(10018754.171, r.distance.0, 1e-3));
    }

    #[test]
    fn test_inverse_meridian() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(0.0), Degrees(0.0));
        let b = LatLong::new(Degrees(90.0), Degrees(0.0));

        let r = inverse(&wgs84, &a, &b, Caps::STANDARD);
        assert_eq!(0.0, r.azi1.0);
        assert_eq!(0.0, r.azi2.0);
        assert!(is_within_tolerance(10001965.729, r.distance.0, 1e-3));
    }

    #[test]
    fn test_inverse_wrapped_identity() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(30.0), Degrees(-180.0));
        let b = LatLong::new(Degrees(30.0), Degrees(180.0));

        let r = inverse(&wgs84, &a, &b, Caps::STANDARD);
        assert_eq!(0.0, r.distance.0);
        assert_eq!(0.0, r.arc_length.0);
    }

    #[test]
    fn test_inverse_nearly_antipodal() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(0.0), Degrees(0.0));
        let b = LatLong::new(Degrees(0.5), Degrees(179.5));

        let r = inverse(&wgs84, &a, &b, Caps::STANDARD);
        assert!(is_within_tolerance(19936288.579, r.distance.0, 1e-2));
    }

    #[test]
    fn test_inverse_symmetry() {
        let wgs84 = Ellipsoid::wgs84();
        let caps = Caps::STANDARD | Caps::REDUCED_LENGTH | Caps::AREA;
        let a = LatLong::new(Degrees(-40.0), Degrees(70.0));
        let b = LatLong::new(Degrees(30.0), Degrees(0.0));

        let fwd = inverse(&wgs84, &a, &b, caps);
        let rev = inverse(&wgs84, &b, &a, caps);

        assert!(is_within_tolerance(fwd.distance.0, rev.distance.0, 1e-8));
        // reduced length is symmetric, area anti-symmetric
        assert!(is_within_tolerance(
            fwd.reduced_length.0,
            rev.reduced_length.0,
            1e-6
        ));
        assert!(is_within_tolerance(fwd.area, -rev.area, 1.0));
        // azimuths swap and reverse
        assert!(is_within_tolerance(
            fwd.azi1.0,
            angular::normalize(rev.azi2.0 + 180.0),
            1e-9
        ));
    }

    #[test]
    fn test_inverse_karney_example() {
        // Istanbul to Washington
        let wgs84 = Ellipsoid::wgs84();
        let istanbul = LatLong::new(Degrees(42.0), Degrees(29.0));
        let washington = LatLong::new(Degrees(39.0), Degrees(-77.0));

        let r = inverse(&wgs84, &istanbul, &washington, Caps::STANDARD);
        assert!(is_within_tolerance(-50.69375304113997, r.azi1.0, 1e-9));
        assert!(is_within_tolerance(8339863.136, r.distance.0, 1e-3));
    }
}
