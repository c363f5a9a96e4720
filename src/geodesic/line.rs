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

//! A geodesic line: one geodesic through a point at an azimuth, with the
//! integration constants precomputed so positions along it are cheap.

#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

use super::{Caps, GeodesicData, TINY};
use crate::angular;
use crate::ellipsoid::coefficients::{
    evaluate_a1, evaluate_a2, evaluate_coeffs_c1, evaluate_coeffs_c1p, evaluate_coeffs_c2,
    evaluate_coeffs_c3, evaluate_coeffs_c4, sin_cos_series,
};
use crate::{Degrees, Ellipsoid, Error, Metres};
use unit_sphere::LatLong;

/// A geodesic on the ellipsoid through a point at an azimuth, immutable
/// after construction.
///
/// The constructor computes the azimuth at the line's northward Equator
/// crossing, the offsets of the start point from that crossing, and
/// exactly the series coefficient tables its capability mask requires.
/// Position queries are then pure functions of the stored state.
#[derive(Clone, Debug)]
pub struct GeodesicLine<'e> {
    ellipsoid: &'e Ellipsoid,
    lat1: Degrees<f64>,
    lon1: Degrees<f64>,
    azi1: Degrees<f64>,
    caps: Caps,

    sin_alpha1: f64,
    cos_alpha1: f64,
    /// Azimuth of the line at its northward Equator crossing.
    sin_alpha0: f64,
    cos_alpha0: f64,
    /// Arc from the Equator crossing to the start point.
    sin_sigma1: f64,
    cos_sigma1: f64,
    /// Longitude offset of the start point on the auxiliary sphere.
    sin_omega1: f64,
    cos_omega1: f64,
    /// Scaled distance offset of the start point.
    sin_tau1: f64,
    cos_tau1: f64,
    k2: f64,

    a1m1: f64,
    a2m1: f64,
    a3c: f64,
    a4: f64,
    b11: f64,
    b21: f64,
    b31: f64,
    b41: f64,
    c1a: [f64; 7],
    c1pa: [f64; 7],
    c2a: [f64; 7],
    c3a: [f64; 6],
    c4a: [f64; 6],
}

impl<'e> GeodesicLine<'e> {
    /// Construct a `GeodesicLine`.
    /// * `ellipsoid` - a reference to the underlying `Ellipsoid`.
    /// * `a` - the start position in geodetic coordinates.
    /// * `azimuth` - the azimuth at the start position.
    /// * `caps` - the capabilities of the line; latitude and azimuth
    ///   output are always enabled.
    #[must_use]
    pub fn new(ellipsoid: &'e Ellipsoid, a: &LatLong<f64>, azimuth: Degrees<f64>, caps: Caps) -> Self {
        let caps = caps | Caps::LATITUDE | Caps::AZIMUTH;
        let lat1 = angular::latitude_fix(a.lat().0);
        let lon1 = angular::normalize(a.lon().0);
        let azi1 = angular::normalize(azimuth.0);

        // guard the subsequent sines against underflow
        let (sin_alpha1, cos_alpha1) = angular::sincosd(angular::round_tiny(azi1));
        let (mut sin_beta1, mut cos_beta1) = angular::sincosd(angular::round_tiny(lat1));
        sin_beta1 *= ellipsoid.one_minus_f();
        angular::norm_pair(&mut sin_beta1, &mut cos_beta1);
        // keep cos(beta1) positive at the poles so azimuths stay defined
        cos_beta1 = f64::max(TINY, cos_beta1);

        // alpha0 from sin(alpha1) * cos(beta1) = sin(alpha0)
        let sin_alpha0 = sin_alpha1 * cos_beta1;
        let cos_alpha0 = libm::hypot(cos_alpha1, sin_alpha1 * sin_beta1);

        // sigma1 from tan(beta1) = tan(sigma1) * cos(alpha1);
        // omega1 from tan(omega1) = sin(alpha0) * tan(sigma1).
        // sigma = 0 is the nearest northward crossing of the Equator;
        // an equatorial line eastward has sigma1 = 0
        let mut sin_sigma1 = sin_beta1;
        let mut sin_omega1 = sin_alpha0 * sin_beta1;
        let mut cos_sigma1 = if sin_beta1 != 0.0 || cos_alpha1 != 0.0 {
            cos_beta1 * cos_alpha1
        } else {
            1.0
        };
        let mut cos_omega1 = cos_sigma1;
        angular::norm_pair(&mut sin_sigma1, &mut cos_sigma1);
        angular::norm_pair(&mut sin_omega1, &mut cos_omega1);

        let k2 = cos_alpha0 * cos_alpha0 * ellipsoid.ep_2();
        let eps = crate::ellipsoid::calculate_epsilon(k2);

        let mut line = Self {
            ellipsoid,
            lat1: Degrees(lat1),
            lon1: Degrees(lon1),
            azi1: Degrees(azi1),
            caps,
            sin_alpha1,
            cos_alpha1,
            sin_alpha0,
            cos_alpha0,
            sin_sigma1,
            cos_sigma1,
            sin_omega1,
            cos_omega1,
            sin_tau1: f64::NAN,
            cos_tau1: f64::NAN,
            k2,
            a1m1: f64::NAN,
            a2m1: f64::NAN,
            a3c: f64::NAN,
            a4: f64::NAN,
            b11: f64::NAN,
            b21: f64::NAN,
            b31: f64::NAN,
            b41: f64::NAN,
            c1a: [0.0; 7],
            c1pa: [0.0; 7],
            c2a: [0.0; 7],
            c3a: [0.0; 6],
            c4a: [0.0; 6],
        };

        if caps.intersects(Caps::C1) {
            line.a1m1 = evaluate_a1(eps);
            line.c1a = evaluate_coeffs_c1(eps);
            line.b11 = sin_cos_series(true, sin_sigma1, cos_sigma1, &line.c1a);
            let (s, c) = (libm::sin(line.b11), libm::cos(line.b11));
            // tau1 = sigma1 + B11
            line.sin_tau1 = sin_sigma1 * c + cos_sigma1 * s;
            line.cos_tau1 = cos_sigma1 * c - sin_sigma1 * s;
        }
        if caps.intersects(Caps::C1P) {
            line.c1pa = evaluate_coeffs_c1p(eps);
        }
        if caps.intersects(Caps::C2) {
            line.a2m1 = evaluate_a2(eps);
            line.c2a = evaluate_coeffs_c2(eps);
            line.b21 = sin_cos_series(true, sin_sigma1, cos_sigma1, &line.c2a);
        }
        if caps.intersects(Caps::C3) {
            line.c3a = evaluate_coeffs_c3(ellipsoid.c3x(), eps);
            line.a3c = -ellipsoid.f() * sin_alpha0 * ellipsoid.calculate_a3f(eps);
            line.b31 = sin_cos_series(true, sin_sigma1, cos_sigma1, &line.c3a);
        }
        if caps.intersects(Caps::C4) {
            line.c4a = evaluate_coeffs_c4(ellipsoid.c4x(), eps);
            // multiplier = a^2 * e^2 * cos(alpha0) * sin(alpha0)
            line.a4 = ellipsoid.a().0 * ellipsoid.a().0 * cos_alpha0 * sin_alpha0
                * ellipsoid.e_2();
            line.b41 = sin_cos_series(false, sin_sigma1, cos_sigma1, &line.c4a);
        }
        line
    }

    /// The latitude of the start point.
    #[must_use]
    pub const fn lat1(&self) -> Degrees<f64> {
        self.lat1
    }

    /// The longitude of the start point.
    #[must_use]
    pub const fn lon1(&self) -> Degrees<f64> {
        self.lon1
    }

    /// The azimuth of the line at the start point.
    #[must_use]
    pub const fn azi1(&self) -> Degrees<f64> {
        self.azi1
    }

    /// The capabilities of the line.
    #[must_use]
    pub const fn caps(&self) -> Caps {
        self.caps
    }

    /// A reference to the underlying `Ellipsoid`.
    #[must_use]
    pub const fn ellipsoid(&self) -> &Ellipsoid {
        self.ellipsoid
    }

    /// The position (and other requested quantities) a distance along the
    /// line.
    /// * `distance` - the distance from the start point in `Metres`,
    ///   which may be negative.
    /// * `caps` - the requested outputs.
    ///
    /// # Errors
    ///
    /// `Error::UninitializedLine` if the line was constructed without
    /// `Caps::DISTANCE_IN`.
    pub fn position(&self, distance: Metres<f64>, caps: Caps) -> Result<GeodesicData, Error> {
        if self.caps.contains(Caps::DISTANCE_IN) {
            Ok(self.position_internal(false, distance.0, caps))
        } else {
            Err(Error::UninitializedLine)
        }
    }

    /// The position (and other requested quantities) at an arc length
    /// along the line on the auxiliary sphere.
    /// * `arc` - the arc length from the start point in `Degrees`.
    /// * `caps` - the requested outputs.
    #[must_use]
    pub fn position_arc(&self, arc: Degrees<f64>, caps: Caps) -> GeodesicData {
        self.position_internal(true, arc.0, caps)
    }

    /// The common position calculation: `value` is an arc length in
    /// degrees when `arcmode`, otherwise a distance in metres.
    pub(crate) fn position_internal(&self, arcmode: bool, value: f64, caps: Caps) -> GeodesicData {
        let mut data = GeodesicData {
            lat1: self.lat1,
            lon1: self.lon1,
            azi1: self.azi1,
            ..GeodesicData::default()
        };
        // only the outputs the line was built for
        let outmask = caps.outputs() & self.caps;
        if !(arcmode || self.caps.contains(Caps::DISTANCE_IN)) {
            // impossible distance calculation requested
            return data;
        }

        let mut b12 = 0.0;
        let mut ab1 = 0.0;
        let sigma12: f64;
        let sin_sigma12: f64;
        let cos_sigma12: f64;
        if arcmode {
            sigma12 = value.to_radians();
            let (s, c) = angular::sincosd(value);
            sin_sigma12 = s;
            cos_sigma12 = c;
        } else {
            // convert the distance to the scaled distance tau, then revert
            // the series to recover sigma
            let tau12 = value / (self.ellipsoid.b().0 * (1.0 + self.a1m1));
            let s = libm::sin(tau12);
            let c = libm::cos(tau12);
            // tau2 = tau1 + tau12
            b12 = -sin_cos_series(
                true,
                self.sin_tau1 * c + self.cos_tau1 * s,
                self.cos_tau1 * c - self.sin_tau1 * s,
                &self.c1pa,
            );
            sigma12 = tau12 - (b12 - self.b11);
            sin_sigma12 = libm::sin(sigma12);
            cos_sigma12 = libm::cos(sigma12);
        }

        // sigma2 = sigma1 + sigma12
        let sin_sigma2 = self.sin_sigma1 * cos_sigma12 + self.cos_sigma1 * sin_sigma12;
        let mut cos_sigma2 = self.cos_sigma1 * cos_sigma12 - self.sin_sigma1 * sin_sigma12;
        if outmask.intersects(Caps::DISTANCE | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE) {
            if arcmode {
                b12 = sin_cos_series(true, sin_sigma2, cos_sigma2, &self.c1a);
            }
            ab1 = (1.0 + self.a1m1) * (b12 - self.b11);
        }

        // sin(beta2) = cos(alpha0) * sin(sigma2)
        let sin_beta2 = self.cos_alpha0 * sin_sigma2;
        let mut cos_beta2 = libm::hypot(self.sin_alpha0, self.cos_alpha0 * cos_sigma2);
        if cos_beta2 == 0.0 {
            // the line runs along the equator through the point antipodal
            // to sigma1: break the degeneracy
            cos_beta2 = TINY;
            cos_sigma2 = TINY;
        }
        // tan(omega2) = sin(alpha0) * tan(sigma2)
        let sin_omega2 = self.sin_alpha0 * sin_sigma2;
        let cos_omega2 = cos_sigma2;
        // tan(alpha2) = tan(alpha0) / cos(sigma2)
        let sin_alpha2 = self.sin_alpha0;
        let cos_alpha2 = self.cos_alpha0 * cos_sigma2;
        // omega12 = omega2 - omega1
        let omega12 = libm::atan2(
            sin_omega2 * self.cos_omega1 - cos_omega2 * self.sin_omega1,
            cos_omega2 * self.cos_omega1 + sin_omega2 * self.sin_omega1,
        );

        if outmask.intersects(Caps::DISTANCE) {
            data.distance = Metres(if arcmode {
                self.ellipsoid.b().0 * ((1.0 + self.a1m1) * sigma12 + ab1)
            } else {
                value
            });
        } else if !arcmode {
            data.distance = Metres(value);
        }

        if outmask.intersects(Caps::LONGITUDE) {
            let lam12 = omega12
                + self.a3c
                    * (sigma12
                        + (sin_cos_series(true, sin_sigma2, cos_sigma2, &self.c3a) - self.b31));
            let mut lon12 = lam12.to_degrees();
            // the line may have wrapped the ellipsoid several times:
            // reduce mod 360 before normalising
            lon12 -= 360.0 * libm::floor(lon12 / 360.0 + 0.5);
            data.lon2 = Degrees(angular::normalize(self.lon1.0 + lon12));
        }

        if outmask.intersects(Caps::LATITUDE) {
            data.lat2 = Degrees(angular::atan2d(
                sin_beta2,
                self.ellipsoid.one_minus_f() * cos_beta2,
            ));
        }

        if outmask.intersects(Caps::AZIMUTH) {
            data.azi2 = Degrees(angular::atan2d(sin_alpha2, cos_alpha2));
        }

        if outmask.intersects(Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE) {
            let sin_sigma1_sq = self.sin_sigma1 * self.sin_sigma1;
            let sin_sigma2_sq = sin_sigma2 * sin_sigma2;
            let w1 = libm::sqrt(1.0 + self.k2 * sin_sigma1_sq);
            let w2 = libm::sqrt(1.0 + self.k2 * sin_sigma2_sq);
            let b22 = sin_cos_series(true, sin_sigma2, cos_sigma2, &self.c2a);
            let ab2 = (1.0 + self.a2m1) * (b22 - self.b21);
            let j12 = (self.a1m1 - self.a2m1) * sigma12 + (ab1 - ab2);
            if outmask.intersects(Caps::REDUCED_LENGTH) {
                // parenthesised for accurate cancellation when the points
                // coincide
                data.reduced_length = Metres(
                    self.ellipsoid.b().0
                        * ((w2 * (self.cos_sigma1 * sin_sigma2)
                            - w1 * (self.sin_sigma1 * cos_sigma2))
                            - self.cos_sigma1 * cos_sigma2 * j12),
                );
            }
            if outmask.intersects(Caps::GEODESIC_SCALE) {
                data.scale_12 = cos_sigma12
                    + (self.k2 * (sin_sigma2_sq - sin_sigma1_sq) * sin_sigma2 / (w1 + w2)
                        - cos_sigma2 * j12)
                        * self.sin_sigma1
                        / w1;
                data.scale_21 = cos_sigma12
                    - (self.k2 * (sin_sigma2_sq - sin_sigma1_sq) * self.sin_sigma1 / (w1 + w2)
                        - self.cos_sigma1 * j12)
                        * sin_sigma2
                        / w2;
            }
        }

        if outmask.intersects(Caps::AREA) {
            let b42 = sin_cos_series(false, sin_sigma2, cos_sigma2, &self.c4a);
            // alpha12 = alpha2 - alpha1, only used in atan2
            let mut sin_alpha12 = sin_alpha2 * self.cos_alpha1 - cos_alpha2 * self.sin_alpha1;
            let mut cos_alpha12 = cos_alpha2 * self.cos_alpha1 + sin_alpha2 * self.sin_alpha1;
            // alpha1 = +/-180 with alpha2 = 0 must give alpha12 = -180,
            // which needs the sign attached to a zero sine
            if sin_alpha12 == 0.0 && cos_alpha12 < 0.0 {
                sin_alpha12 = TINY * self.cos_alpha1;
                cos_alpha12 = -1.0;
            }
            data.area = self.ellipsoid.c_2() * libm::atan2(sin_alpha12, cos_alpha12)
                + self.a4 * (b42 - self.b41);
        }

        data.arc_length = Degrees(if arcmode { value } else { sigma12.to_degrees() });
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use angle_sc::is_within_tolerance;

    #[test]
    fn test_line_requires_distance_in() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(45.0), Degrees(45.0));
        let line = GeodesicLine::new(&wgs84, &a, Degrees(30.0), Caps::LATITUDE | Caps::LONGITUDE);

        assert_eq!(
            Err(Error::UninitializedLine),
            line.position(Metres(1000.0), Caps::LATITUDE)
        );

        // arc positions never need the inverse distance series
        let r = line.position_arc(Degrees(1.0), Caps::LATITUDE | Caps::LONGITUDE);
        assert!(r.lat2.0.is_finite());
        assert!(r.lon2.0.is_finite());
    }

    #[test]
    fn test_position_masks_unavailable_outputs() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(45.0), Degrees(45.0));
        let line = GeodesicLine::new(&wgs84, &a, Degrees(30.0), Caps::STANDARD | Caps::DISTANCE_IN);

        // the line has no C4 table, so asking for area yields NaN
        let r = line.position(Metres(1.0e6), Caps::STANDARD | Caps::AREA).unwrap();
        assert!(r.lat2.0.is_finite());
        assert!(r.area.is_nan());
    }

    #[test]
    fn test_position_round_trip_start() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(42.0), Degrees(29.0));
        let line = GeodesicLine::new(&wgs84, &a, Degrees(-50.0), Caps::ALL);

        let r = line.position(Metres(0.0), Caps::STANDARD).unwrap();
        assert!(is_within_tolerance(42.0, r.lat2.0, 1e-12));
        assert!(is_within_tolerance(29.0, r.lon2.0, 1e-12));
        assert!(is_within_tolerance(-50.0, r.azi2.0, 1e-12));
        assert_eq!(0.0, r.arc_length.0);
    }

    #[test]
    fn test_position_equator_quarter() {
        let wgs84 = Ellipsoid::wgs84();
        let a = LatLong::new(Degrees(0.0), Degrees(0.0));
        let line = GeodesicLine::new(&wgs84, &a, Degrees(90.0), Caps::ALL);

        // a quarter of the Equator: s = a * pi / 2
        let quarter = core::f64::consts::FRAC_PI_2 * wgs84.a().0;
        let r = line.position(Metres(quarter), Caps::STANDARD).unwrap();
        assert!(is_within_tolerance(0.0, r.lat2.0, 1e-12));
        assert!(is_within_tolerance(90.0, r.lon2.0, 1e-9));
        assert!(is_within_tolerance(90.0, r.azi2.0, 1e-12));

        // in arc, a quarter turn covers (1 - f) * 90 degrees of longitude
        // and b * pi / 2 metres
        let r = line.position_arc(Degrees(90.0), Caps::STANDARD);
        assert!(is_within_tolerance(0.0, r.lat2.0, 1e-12));
        assert!(is_within_tolerance(
            core::f64::consts::FRAC_PI_2 * wgs84.b().0,
            r.distance.0,
            1e-6
        ));
    }
}
