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

//! geodesic-intersect
//!
//! A library for geodesics and geodesic intersections on an ellipsoid of
//! revolution, oblate or prolate.
//!
//! The geodesic solvers follow
//! [Karney(2013)](https://link.springer.com/article/10.1007/s00190-012-0578-z):
//! a geodesic is mapped onto the auxiliary sphere and the corresponding
//! great-circle problem is corrected by series expansions in a small
//! parameter derived from the eccentricity. The *direct* problem (start
//! point, azimuth and distance to end point) is evaluated through a
//! [`GeodesicLine`]; the *inverse* problem (two end points to distance and
//! azimuths) starts from a spherical estimate — or the astroid root near
//! antipodal points — and polishes it with Newton's method. Both problems
//! also deliver the reduced length `m12`, the geodesic scales `M12`, `M21`
//! and the spheroidal area `S12` on request, selected by a capability mask
//! so that only the series a caller asks for are evaluated.
//!
//! The [`Intersect`] engine finds intersections of two geodesics following
//! [Karney(2023)](https://arxiv.org/abs/2308.00495): a spherical seed is
//! refined by iteration, and tiled searches over the two-line displacement
//! space locate the closest intersection, the intersection of two segments,
//! the next intersection beyond a known one, or all intersections within a
//! bounded L1 radius, detecting coincident (parallel or anti-parallel)
//! geodesics.
//!
//! The library depends upon the following crates:
//!
//! - [angle-sc](https://crates.io/crates/angle-sc) - to define `Angle`,
//!   `Degrees` and `Radians` and perform trigonometric calculations;
//! - [unit-sphere](https://crates.io/crates/unit-sphere) - to define
//!   `LatLong` and perform great-circle and vector calculations;
//! - [icao-units](https://crates.io/crates/icao-units) - to define `Metres`.
//!
//! The library is declared
//! [no_std](https://docs.rust-embedded.org/book/intro/no-std.html); the
//! `all` intersection query allocates its result vector through `alloc`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod angular;
pub mod ellipsoid;
pub mod geodesic;
pub mod intersect;

pub use angle_sc::{Angle, Degrees, Radians};
pub use geodesic::{Caps, GeodesicData, GeodesicLine};
pub use icao_units::si::Metres;
pub use intersect::{Intersect, Intersection};
pub use unit_sphere::LatLong;

use thiserror::Error;

/// The errors reported by constructors.
///
/// Per-call queries do not use this type: they report impossible requests
/// in-band, as NaN outputs or negated magnitudes, so that batch evaluation
/// never stops.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The Semimajor axis must be positive and the flattening ratio must
    /// lie in (-1, 1); the intersection engine narrows the band further.
    #[error("invalid ellipsoid: require a > 0 and f within the supported band")]
    InvalidEllipsoid,
    /// A distance query on a `GeodesicLine` built without `Caps::DISTANCE_IN`.
    #[error("geodesic line was constructed without distance input capability")]
    UninitializedLine,
    /// The intersection engine could not validate its conjugate-distance
    /// table for this ellipsoid.
    #[error("intersection engine infeasible: conjugate distance table is inconsistent")]
    IntersectInfeasible,
}

/// The parameters of an ellipsoid of revolution, immutable after
/// construction, with the precomputed coefficient tables of the geodesic
/// series.
#[derive(Clone, Debug, PartialEq)]
pub struct Ellipsoid {
    /// The Semimajor axis of the ellipsoid.
    a: Metres<f64>,
    /// The flattening of the ellipsoid, a ratio.
    f: f64,

    /// The Semiminor axis of the ellipsoid.
    b: Metres<f64>,
    /// One minus the flattening ratio.
    one_minus_f: f64,
    /// The reciprocal of one minus the flattening ratio.
    recip_one_minus_f: f64,
    /// The square of the Eccentricity of the ellipsoid.
    e_2: f64,
    /// The square of the second Eccentricity of the ellipsoid.
    ep_2: f64,
    /// The third flattening of the ellipsoid.
    n: f64,
    /// The authalic area constant: the ellipsoid surface area is `4 π c²`.
    c_2: f64,
    /// The spherical-estimate acceptance threshold of the inverse solver.
    etol2: f64,

    /// The A3 series coefficients of the ellipsoid.
    a3x: [f64; 6],
    /// The C3 series coefficient table of the ellipsoid.
    c3x: [f64; 15],
    /// The C4 (area) series coefficient table of the ellipsoid.
    c4x: [f64; 21],
}

impl Ellipsoid {
    /// Construct an `Ellipsoid`.
    /// * `a` - the Semimajor axis of the ellipsoid.
    /// * `f` - the flattening of the ellipsoid: zero for a sphere, negative
    ///   for a prolate ellipsoid.
    ///
    /// # Errors
    ///
    /// `Error::InvalidEllipsoid` if `a` is not positive and finite or if
    /// `|f| >= 1`.
    pub fn new(a: Metres<f64>, f: f64) -> Result<Self, Error> {
        if a.0 > 0.0 && a.0.is_finite() && libm::fabs(f) < 1.0 {
            Ok(Self::build(a, f))
        } else {
            Err(Error::InvalidEllipsoid)
        }
    }

    /// Construct an `Ellipsoid` from its inverse flattening.
    /// * `a` - the Semimajor axis of the ellipsoid.
    /// * `inv_f` - the inverse flattening: zero denotes a sphere, negative
    ///   a prolate ellipsoid.
    ///
    /// # Errors
    ///
    /// `Error::InvalidEllipsoid` as for `new`.
    pub fn from_inverse_flattening(a: Metres<f64>, inv_f: f64) -> Result<Self, Error> {
        let f = if inv_f == 0.0 { 0.0 } else { 1.0 / inv_f };
        Self::new(a, f)
    }

    /// Construct an `Ellipsoid` with the WGS 84 parameters.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::build(ellipsoid::wgs84::A, ellipsoid::wgs84::F)
    }

    fn build(a: Metres<f64>, f: f64) -> Self {
        let b = ellipsoid::calculate_minor_axis(a, f);
        let one_minus_f = 1.0 - f;
        let e_2 = ellipsoid::calculate_sq_eccentricity(f);
        let n = ellipsoid::calculate_3rd_flattening(f);
        let tol2 = libm::sqrt(f64::EPSILON);
        Self {
            a,
            f,
            b,
            one_minus_f,
            recip_one_minus_f: 1.0 / one_minus_f,
            e_2,
            ep_2: ellipsoid::calculate_sq_2nd_eccentricity(f),
            n,
            c_2: ellipsoid::calculate_authalic_area_constant(a, b, e_2, f),
            etol2: 0.1 * tol2
                / libm::sqrt(
                    f64::max(0.001, libm::fabs(f)) * f64::min(1.0, 1.0 - f / 2.0) / 2.0,
                ),
            a3x: ellipsoid::coefficients::evaluate_coeffs_a3(n),
            c3x: ellipsoid::coefficients::evaluate_coeffs_c3x(n),
            c4x: ellipsoid::coefficients::evaluate_coeffs_c4x(n),
        }
    }

    /// The Semimajor axis of the ellipsoid.
    #[must_use]
    pub const fn a(&self) -> Metres<f64> {
        self.a
    }

    /// The flattening of the ellipsoid, a ratio.
    #[must_use]
    pub const fn f(&self) -> f64 {
        self.f
    }

    /// The Semiminor axis of the ellipsoid.
    #[must_use]
    pub const fn b(&self) -> Metres<f64> {
        self.b
    }

    /// One minus the flattening ratio.
    #[must_use]
    pub const fn one_minus_f(&self) -> f64 {
        self.one_minus_f
    }

    /// The reciprocal of one minus the flattening ratio.
    #[must_use]
    pub const fn recip_one_minus_f(&self) -> f64 {
        self.recip_one_minus_f
    }

    /// The square of the Eccentricity of the ellipsoid.
    #[must_use]
    pub const fn e_2(&self) -> f64 {
        self.e_2
    }

    /// The square of the second Eccentricity of the ellipsoid.
    #[must_use]
    pub const fn ep_2(&self) -> f64 {
        self.ep_2
    }

    /// The third flattening of the ellipsoid.
    #[must_use]
    pub const fn n(&self) -> f64 {
        self.n
    }

    /// The authalic area constant of the ellipsoid; its surface area is
    /// `4 π c²` square metres.
    #[must_use]
    pub const fn c_2(&self) -> f64 {
        self.c_2
    }

    /// The spherical-estimate acceptance threshold of the inverse solver.
    #[must_use]
    pub(crate) const fn etol2(&self) -> f64 {
        self.etol2
    }

    /// The radius of the sphere with the same surface area as the
    /// ellipsoid.
    #[must_use]
    pub fn authalic_radius(&self) -> Metres<f64> {
        Metres(libm::sqrt(self.c_2))
    }

    /// The A3 series coefficients of the ellipsoid.
    #[must_use]
    pub const fn a3x(&self) -> &[f64; 6] {
        &self.a3x
    }

    /// The C3 series coefficient table of the ellipsoid.
    #[must_use]
    pub const fn c3x(&self) -> &[f64; 15] {
        &self.c3x
    }

    /// The C4 series coefficient table of the ellipsoid.
    #[must_use]
    pub const fn c4x(&self) -> &[f64; 21] {
        &self.c4x
    }

    /// Evaluate the `A3` polynomial at `eps`.
    #[must_use]
    pub fn calculate_a3f(&self, eps: f64) -> f64 {
        ellipsoid::coefficients::evaluate_polynomial(&self.a3x, eps)
    }

    /// Convert a geodetic Latitude to a parametric Latitude on the
    /// auxiliary sphere.
    /// * `lat` - the geodetic Latitude
    #[must_use]
    pub fn calculate_parametric_latitude(&self, lat: Angle<f64>) -> Angle<f64> {
        ellipsoid::calculate_parametric_latitude(lat, self.one_minus_f)
    }

    /// Convert a parametric Latitude on the auxiliary sphere to a
    /// geodetic Latitude.
    /// * `beta` - the parametric Latitude
    #[must_use]
    pub fn calculate_geodetic_latitude(&self, beta: Angle<f64>) -> Angle<f64> {
        ellipsoid::calculate_geodetic_latitude(beta, self.one_minus_f)
    }

    /// Solve the direct geodesic problem: the position, azimuth and other
    /// requested quantities a distance along a geodesic.
    /// * `a` - the start position in geodetic coordinates.
    /// * `azimuth` - the azimuth at the start position.
    /// * `distance` - the distance along the geodesic in `Metres`.
    /// * `caps` - the requested outputs.
    #[must_use]
    pub fn direct(
        &self,
        a: &LatLong<f64>,
        azimuth: Degrees<f64>,
        distance: Metres<f64>,
        caps: Caps,
    ) -> GeodesicData {
        geodesic::direct(self, a, azimuth, distance, caps)
    }

    /// Solve the direct geodesic problem with the length given as an arc
    /// length on the auxiliary sphere.
    /// * `a` - the start position in geodetic coordinates.
    /// * `azimuth` - the azimuth at the start position.
    /// * `arc` - the arc length on the auxiliary sphere in `Degrees`.
    /// * `caps` - the requested outputs.
    #[must_use]
    pub fn direct_arc(&self, a: &LatLong<f64>, azimuth: Degrees<f64>, arc: Degrees<f64>, caps: Caps) -> GeodesicData {
        geodesic::direct_arc(self, a, azimuth, arc, caps)
    }

    /// Solve the inverse geodesic problem: the distance, azimuths and other
    /// requested quantities of the geodesic between a pair of positions.
    /// * `a`, `b` - the start and finish positions in geodetic coordinates.
    /// * `caps` - the requested outputs.
    #[must_use]
    pub fn inverse(&self, a: &LatLong<f64>, b: &LatLong<f64>, caps: Caps) -> GeodesicData {
        geodesic::inverse(self, a, b, caps)
    }

    /// Construct a `GeodesicLine` through a position at an azimuth.
    /// * `a` - the start position in geodetic coordinates.
    /// * `azimuth` - the azimuth at the start position.
    /// * `caps` - the capabilities of the line.
    #[must_use]
    pub fn line(&self, a: &LatLong<f64>, azimuth: Degrees<f64>, caps: Caps) -> GeodesicLine<'_> {
        GeodesicLine::new(self, a, azimuth, caps)
    }
}

/// A default Ellipsoid: WGS 84.
impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipsoid_wgs84() {
        let geoid = Ellipsoid::wgs84();
        assert_eq!(ellipsoid::wgs84::A, geoid.a());
        assert_eq!(ellipsoid::wgs84::F, geoid.f());
        assert_eq!(
            ellipsoid::calculate_minor_axis(ellipsoid::wgs84::A, ellipsoid::wgs84::F),
            geoid.b()
        );
        assert_eq!(1.0 - ellipsoid::wgs84::F, geoid.one_minus_f());
        assert_eq!(
            1.0 / (1.0 - ellipsoid::wgs84::F),
            geoid.recip_one_minus_f()
        );
        assert_eq!(
            ellipsoid::calculate_sq_eccentricity(ellipsoid::wgs84::F),
            geoid.e_2()
        );
        assert_eq!(
            ellipsoid::calculate_sq_2nd_eccentricity(ellipsoid::wgs84::F),
            geoid.ep_2()
        );
        assert_eq!(
            ellipsoid::calculate_3rd_flattening(ellipsoid::wgs84::F),
            geoid.n()
        );
    }

    #[test]
    fn test_ellipsoid_validation() {
        assert_eq!(
            Err(Error::InvalidEllipsoid),
            Ellipsoid::new(Metres(0.0), 0.0)
        );
        assert_eq!(
            Err(Error::InvalidEllipsoid),
            Ellipsoid::new(Metres(-6378137.0), 0.0)
        );
        assert_eq!(
            Err(Error::InvalidEllipsoid),
            Ellipsoid::new(Metres(f64::NAN), 0.0)
        );
        assert_eq!(
            Err(Error::InvalidEllipsoid),
            Ellipsoid::new(Metres(6378137.0), 1.0)
        );
        assert!(Ellipsoid::new(Metres(6378137.0), -0.5).is_ok());
    }

    #[test]
    fn test_from_inverse_flattening() {
        // zero inverse flattening denotes a sphere
        let sphere = Ellipsoid::from_inverse_flattening(Metres(6371000.0), 0.0).unwrap();
        assert_eq!(0.0, sphere.f());
        assert_eq!(sphere.a(), sphere.b());
        assert_eq!(sphere.a().0 * sphere.a().0, sphere.c_2());

        let wgs84 =
            Ellipsoid::from_inverse_flattening(ellipsoid::wgs84::A, 298.257223563).unwrap();
        assert_eq!(Ellipsoid::wgs84(), wgs84);
    }

    #[test]
    fn test_ellipsoid_traits() {
        let geoid = Ellipsoid::default();

        let geoid_clone = geoid.clone();
        assert!(geoid_clone == geoid);

        println!("Ellipsoid: {geoid:?}");
    }
}
