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

//! The ellipsoid module contains functions for deriving the parameters of an
//! ellipsoid of revolution from its Semimajor axis and flattening ratio.

#![allow(clippy::suboptimal_flops)]

pub mod coefficients;
pub mod wgs84;

use crate::Metres;
use angle_sc::Angle;

/// Calculate the Semiminor axis of an ellipsoid.
/// * `a` - the Semimajor axis of an ellipsoid.
/// * `f` - the flattening ratio.
#[must_use]
pub fn calculate_minor_axis(a: Metres<f64>, f: f64) -> Metres<f64> {
    Metres(a.0 * (1.0 - f))
}

/// Calculate the square of the Eccentricity of an ellipsoid.
/// * `f` - the flattening ratio.
///
/// Note: negative for a prolate ellipsoid.
#[must_use]
pub fn calculate_sq_eccentricity(f: f64) -> f64 {
    f * (2.0 - f)
}

/// Calculate the square of the second Eccentricity of an ellipsoid.
/// * `f` - the flattening ratio.
#[must_use]
pub fn calculate_sq_2nd_eccentricity(f: f64) -> f64 {
    let one_minus_f = 1.0 - f;
    calculate_sq_eccentricity(f) / (one_minus_f * one_minus_f)
}

/// Calculate the third flattening of an ellipsoid.
/// * `f` - the flattening ratio.
#[must_use]
pub fn calculate_3rd_flattening(f: f64) -> f64 {
    f / (2.0 - f)
}

/// Calculate `e * atanh(e * x)` where `es` is the signed eccentricity:
/// positive for an oblate ellipsoid, negative (using `atan`) for a prolate
/// one.
#[must_use]
pub fn eatanhe(x: f64, es: f64) -> f64 {
    if es > 0.0 {
        es * libm::atanh(es * x)
    } else {
        -es * libm::atan(es * x)
    }
}

/// Calculate the authalic area constant `c²` of an ellipsoid; the total
/// surface area of the ellipsoid is `4 π c²`.
/// * `a` - the Semimajor axis.
/// * `b` - the Semiminor axis.
/// * `e_2` - the square of the (signed) Eccentricity.
/// * `f` - the flattening ratio.
#[must_use]
pub fn calculate_authalic_area_constant(a: Metres<f64>, b: Metres<f64>, e_2: f64, f: f64) -> f64 {
    let polar_ratio = if e_2 == 0.0 {
        // the e -> 0 limit of atanh(e) / e
        1.0
    } else {
        let es = libm::copysign(libm::sqrt(libm::fabs(e_2)), f);
        eatanhe(1.0, es) / e_2
    };
    (a.0 * a.0 + b.0 * b.0 * polar_ratio) / 2.0
}

/// Calculate `epsilon`, the variable used in the series expansions, from
/// `k²`, the square of the second eccentricity scaled by the cosine of the
/// equatorial azimuth.
///
/// Note: `epsilon` is positive and small.
#[must_use]
pub fn calculate_epsilon(k2: f64) -> f64 {
    k2 / (2.0 * (1.0 + libm::sqrt(1.0 + k2)) + k2)
}

/// Convert a `geodetic` Latitude to a `parametric` Latitude on the
/// auxiliary sphere.
/// * `lat` - the `geodetic` Latitude
/// * `one_minus_f` - one minus the flattening ratio.
#[must_use]
pub fn calculate_parametric_latitude(lat: Angle<f64>, one_minus_f: f64) -> Angle<f64> {
    Angle::from_y_x(one_minus_f * lat.sin().0, lat.cos().0)
}

/// Convert a `parametric` Latitude on the auxiliary sphere to a
/// `geodetic` Latitude.
/// * `lat` - the `parametric` Latitude
/// * `one_minus_f` - one minus the flattening ratio.
#[must_use]
pub fn calculate_geodetic_latitude(lat: Angle<f64>, one_minus_f: f64) -> Angle<f64> {
    Angle::from_y_x(lat.sin().0 / one_minus_f, lat.cos().0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use angle_sc::{is_within_tolerance, Degrees, Radians};

    #[test]
    fn test_derived_parameters_wgs84() {
        assert_eq!(
            Metres(6_356_752.314_245_179),
            calculate_minor_axis(wgs84::A, wgs84::F)
        );
        assert_eq!(0.0066943799901413165, calculate_sq_eccentricity(wgs84::F));
        assert_eq!(
            0.006739496742276434,
            calculate_sq_2nd_eccentricity(wgs84::F)
        );
        assert_eq!(0.0016792203863837047, calculate_3rd_flattening(wgs84::F));
    }

    #[test]
    fn test_authalic_area_constant() {
        // the limit case: a sphere keeps c^2 = a^2
        let r = Metres(6_371_000.0);
        assert_eq!(r.0 * r.0, calculate_authalic_area_constant(r, r, 0.0, 0.0));

        // WGS 84 authalic radius
        let b = calculate_minor_axis(wgs84::A, wgs84::F);
        let e_2 = calculate_sq_eccentricity(wgs84::F);
        let c2 = calculate_authalic_area_constant(wgs84::A, b, e_2, wgs84::F);
        let authalic_radius = libm::sqrt(c2);
        assert!(is_within_tolerance(6_371_007.181, authalic_radius, 1e-3));
    }

    #[test]
    fn test_calculate_epsilon() {
        let ep_2 = calculate_sq_2nd_eccentricity(wgs84::F);

        // k2 of a meridional geodesic, where epsilon equals the third
        // flattening of the ellipsoid
        assert!(is_within_tolerance(
            calculate_3rd_flattening(wgs84::F),
            calculate_epsilon(ep_2),
            f64::EPSILON
        ));
        // k2 of an equatorial geodesic
        assert_eq!(0.0, calculate_epsilon(0.0));
    }

    #[test]
    fn test_calculate_parametric_and_geodetic_latitude() {
        let one_minus_f = 1.0 - wgs84::F;

        for i in -90..91 {
            let latitude = f64::from(i);
            let lat = Angle::from(Degrees(latitude));
            let parametric_lat = calculate_parametric_latitude(lat, one_minus_f);
            let result = calculate_geodetic_latitude(parametric_lat, one_minus_f);

            assert!(is_within_tolerance(
                Radians::from(lat).0,
                Radians::from(result).0,
                f64::EPSILON
            ));
        }
    }
}
