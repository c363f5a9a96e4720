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

//! The intersect module finds the intersections of two geodesics.
//!
//! An intersection is reported as the pair of signed displacements `(x, y)`
//! in metres along the two geodesics from their starting points; the
//! closest intersection is the one minimising the L1 distance
//! `|x - x0| + |y - y0|` from a reference offset.
//!
//! The engine treats the two geodesics as great circles on the auxiliary
//! sphere to obtain a seed, refines the seed by iterating that spherical
//! solution at the current offsets, and drives the tiled searches
//! (closest, segment, next, all) from grids of such seeds spaced by
//! distances derived from the conjugate points of the ellipsoid, where
//! adjacent intersections can appear.

#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

use crate::angular;
use crate::geodesic::{Caps, GeodesicLine};
use crate::{Angle, Degrees, Ellipsoid, Error, Metres};
use alloc::vec::Vec;
use unit_sphere::{vector, LatLong};

/// The number of iterated spherical refinements allowed per candidate.
const MAX_REFINE: u32 = 20;

/// An intersection of two geodesics X and Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    /// The signed displacement along geodesic X from its starting point.
    pub x: Metres<f64>,
    /// The signed displacement along geodesic Y from its starting point.
    pub y: Metres<f64>,
    /// The coincidence indicator: 0 for a transversal intersection,
    /// +1 when the geodesics run along each other in parallel and
    /// -1 when they are anti-parallel.
    pub coincidence: i32,
}

/// The working point of the engine: displacements plus coincidence.
#[derive(Clone, Copy, Debug)]
struct XPoint {
    x: f64,
    y: f64,
    c: i32,
}

impl XPoint {
    const fn new(x: f64, y: f64, c: i32) -> Self {
        Self { x, y, c }
    }

    const fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, 0)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// The L1 distance from `p0`.
    fn dist(&self, p0: &Self) -> f64 {
        libm::fabs(self.x - p0.x) + libm::fabs(self.y - p0.y)
    }

    fn output(&self) -> Intersection {
        Intersection {
            x: Metres(self.x),
            y: Metres(self.y),
            coincidence: self.c,
        }
    }
}

/// The geodesic intersection engine for an ellipsoid.
///
/// Construction derives the authalic radius, the convergence and equality
/// tolerances and the characteristic distances of the ellipsoid; the query
/// methods are pure functions of that state and may be called from any
/// number of threads.
#[derive(Clone, Debug)]
pub struct Intersect<'e> {
    ellipsoid: &'e Ellipsoid,
    /// The authalic radius.
    r: f64,
    /// Half the circumference of the authalic sphere: the normalising
    /// distance of the engine.
    d: f64,
    /// The sine of the angle below which two geodesics count as
    /// coincident.
    sin_coincident: f64,
    /// The squared sine of the pole angle below which the auxiliary-sphere
    /// great circles are indistinguishable.
    sq_sin_coincident: f64,
    /// Convergence tolerance of the iterated spherical refinement.
    tol: f64,
    /// Equality slop of the fuzzy point set and the tiling safety margin.
    slop: f64,
    /// The smallest conjugate distance of the ellipsoid.
    t_min: f64,
    /// The largest conjugate distance of the ellipsoid.
    t_max: f64,
    /// Minimum L1 separation of two distinct intersections.
    s1: f64,
    /// Half the furthest L1 distance to the next intersection.
    s2: f64,
    /// Furthest L1 distance to the closest intersection.
    s3: f64,
    /// Capture radius of the spherical seed.
    s4: f64,
    /// The longest shortest geodesic.
    s5: f64,
    /// Tile spacing of the closest-intersection search.
    d1: f64,
    /// Tile spacing of the next-intersection search.
    d2: f64,
    /// Tile spacing of the all-intersections search.
    d3: f64,
}

impl<'e> Intersect<'e> {
    /// Construct an intersection engine for an ellipsoid.
    ///
    /// # Errors
    ///
    /// `Error::InvalidEllipsoid` when the flattening lies outside the
    /// validated band `-1/5 <= f <= 1/4`;
    /// `Error::IntersectInfeasible` when the conjugate-distance table
    /// violates its ordering invariants.
    pub fn new(ellipsoid: &'e Ellipsoid) -> Result<Self, Error> {
        const BAND: f64 = 1.0 / 1024.0;
        let f = ellipsoid.f();
        if !(-0.2 - BAND..=0.25 + BAND).contains(&f) {
            return Err(Error::InvalidEllipsoid);
        }

        let r = ellipsoid.authalic_radius().0;
        let d = core::f64::consts::PI * r;
        let tol = d * libm::pow(f64::EPSILON, 0.75);
        let slop = d * libm::sqrt(f64::EPSILON);

        let mut engine = Self {
            ellipsoid,
            r,
            d,
            sin_coincident: libm::pow(f64::EPSILON, 0.75),
            sq_sin_coincident: libm::pow(f64::EPSILON, 1.5),
            tol,
            slop,
            t_min: d,
            t_max: d,
            s1: d / 2.0,
            s2: d / 2.0,
            s3: d / 2.0,
            s4: d / 2.0,
            s5: d,
            d1: d / 2.0,
            d2: d / 2.0,
            d3: d / 2.0,
        };

        if f != 0.0 {
            // sweep the conjugate distance over the azimuth of a geodesic
            // leaving the Equator, from meridional (0) to equatorial (90),
            // to bracket the azimuthal minimum
            let mut t_min = f64::INFINITY;
            let mut t_max = 0.0_f64;
            let mut best_azimuth = 0.0;
            for i in 0..=6 {
                let azimuth = f64::from(i) * 15.0;
                let t = engine.conjugate_from_equator(Degrees(azimuth));
                if t < t_min {
                    t_min = t;
                    best_azimuth = azimuth;
                }
                t_max = f64::max(t_max, t);
            }

            // tighten the minimum with a golden-section search on the
            // bracket around the best sweep sample
            const INV_PHI: f64 = 0.618_033_988_749_894_8;
            let mut lo = f64::max(0.0, best_azimuth - 15.0);
            let mut hi = f64::min(90.0, best_azimuth + 15.0);
            let mut azi1 = hi - INV_PHI * (hi - lo);
            let mut azi2 = lo + INV_PHI * (hi - lo);
            let mut t1 = engine.conjugate_from_equator(Degrees(azi1));
            let mut t2 = engine.conjugate_from_equator(Degrees(azi2));
            for _ in 0..30 {
                if t1 <= t2 {
                    hi = azi2;
                    azi2 = azi1;
                    t2 = t1;
                    azi1 = hi - INV_PHI * (hi - lo);
                    t1 = engine.conjugate_from_equator(Degrees(azi1));
                } else {
                    lo = azi1;
                    azi1 = azi2;
                    t1 = t2;
                    azi2 = lo + INV_PHI * (hi - lo);
                    t2 = engine.conjugate_from_equator(Degrees(azi2));
                }
                t_min = f64::min(t_min, f64::min(t1, t2));
            }

            // fold the spherical value in, so the tiling spacings can only
            // tighten relative to the sphere
            let t_min = f64::min(t_min, d);
            let t_max = f64::max(t_max, d);

            // the table only makes sense when the conjugate points stay
            // within half a turn of their spherical positions
            if !(d / 2.0 < t_min && t_min <= t_max && t_max < 2.0 * d) {
                return Err(Error::IntersectInfeasible);
            }

            let f_abs = libm::fabs(f);
            engine.t_min = t_min;
            engine.t_max = t_max;
            engine.s1 = t_min / 2.0;
            engine.s2 = t_max / 2.0;
            engine.s3 = d / 2.0 * (1.0 + f_abs);
            engine.s4 = t_min / 2.0;
            engine.s5 = d * (1.0 + f_abs);
            engine.d1 = t_min / 2.0;
            engine.d2 = t_max / 2.0;
            engine.d3 = t_min / 2.0;
        }
        log::debug!(
            "intersect engine: R = {}, t_min = {}, t_max = {}",
            engine.r,
            engine.t_min,
            engine.t_max
        );
        Ok(engine)
    }

    /// The normalising distance of the engine: half the circumference of
    /// the sphere with the same surface area as the ellipsoid.
    #[must_use]
    pub fn norm_distance(&self) -> Metres<f64> {
        Metres(self.d)
    }

    /// The characteristic distances of the engine: the minimum L1
    /// separation of two intersections, half the furthest distance to the
    /// next intersection, the furthest distance to the closest
    /// intersection, the capture radius of the spherical seed, and the
    /// longest shortest geodesic.
    #[must_use]
    pub fn characteristic_distances(&self) -> [Metres<f64>; 5] {
        [
            Metres(self.s1),
            Metres(self.s2),
            Metres(self.s3),
            Metres(self.s4),
            Metres(self.s5),
        ]
    }

    /// The distance along a geodesic line to the conjugate point (where
    /// the reduced length vanishes), or to the semi-conjugate point
    /// (where `M13 + M31` vanishes) near a starting guess.
    /// * `line` - the geodesic line, which requires `Caps::INTERSECT`.
    /// * `s_guess` - the starting guess, e.g. the engine's norm distance.
    /// * `semi` - find the semi-conjugate point instead.
    #[must_use]
    pub fn conjugate_distance(&self, line: &GeodesicLine, s_guess: Metres<f64>, semi: bool) -> Metres<f64> {
        let mut s = s_guess.0;
        for _ in 0..100 {
            let g = line.position_internal(
                false,
                s,
                Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE,
            );
            let m13 = g.reduced_length.0;
            let scale_13 = g.scale_12;
            let scale_31 = g.scale_21;
            let (v, dv) = if semi {
                (scale_13 + scale_31, 2.0 * (scale_13 * scale_31 - 1.0) / m13)
            } else {
                (m13, scale_31)
            };
            let ds = -v / dv;
            s += ds;
            // the negated test also stops on NaN
            if !(libm::fabs(ds) > self.tol) {
                break;
            }
        }
        Metres(s)
    }

    /// The conjugate distance of a geodesic leaving the Equator at an
    /// azimuth, started from the spherical estimate.
    fn conjugate_from_equator(&self, azimuth: Degrees<f64>) -> f64 {
        let origin = LatLong::new(Degrees(0.0), Degrees(0.0));
        let line = GeodesicLine::new(self.ellipsoid, &origin, azimuth, Caps::INTERSECT);
        self.conjugate_distance(&line, Metres(self.d), false).0
    }

    /// Find the intersection of two geodesics closest to their starting
    /// points, each given by a position and an azimuth.
    #[must_use]
    pub fn closest(
        &self,
        a: &LatLong<f64>,
        azimuth_a: Degrees<f64>,
        b: &LatLong<f64>,
        azimuth_b: Degrees<f64>,
    ) -> Intersection {
        let line_x = GeodesicLine::new(self.ellipsoid, a, azimuth_a, Caps::INTERSECT);
        let line_y = GeodesicLine::new(self.ellipsoid, b, azimuth_b, Caps::INTERSECT);
        self.closest_from_lines(&line_x, &line_y, (Metres(0.0), Metres(0.0)))
    }

    /// Find the intersection of two `GeodesicLine`s closest to a reference
    /// offset.
    /// * `line_x`, `line_y` - the lines, built with at least
    ///   `Caps::INTERSECT`.
    /// * `offset` - the reference displacements along the lines.
    #[must_use]
    pub fn closest_from_lines(
        &self,
        line_x: &GeodesicLine,
        line_y: &GeodesicLine,
        offset: (Metres<f64>, Metres<f64>),
    ) -> Intersection {
        let p0 = XPoint::new(offset.0 .0, offset.1 .0, 0);
        self.closest_internal(line_x, line_y, &p0).output()
    }

    /// Find the intersection of two geodesic segments, each given by its
    /// end positions.
    ///
    /// Returns the intersection and the segment mode: zero when the
    /// segments intersect, otherwise `3 kx + ky` where `kx` is -1, 0 or +1
    /// as the intersection lies before, within or beyond segment X
    /// (`ky` likewise for segment Y).
    #[must_use]
    pub fn segment(
        &self,
        a1: &LatLong<f64>,
        a2: &LatLong<f64>,
        b1: &LatLong<f64>,
        b2: &LatLong<f64>,
    ) -> (Intersection, i32) {
        let gx = crate::geodesic::inverse(self.ellipsoid, a1, a2, Caps::STANDARD);
        let gy = crate::geodesic::inverse(self.ellipsoid, b1, b2, Caps::STANDARD);
        let line_x = GeodesicLine::new(self.ellipsoid, a1, gx.azi1, Caps::INTERSECT);
        let line_y = GeodesicLine::new(self.ellipsoid, b1, gy.azi1, Caps::INTERSECT);
        self.segment_from_lines(&line_x, gx.distance, &line_y, gy.distance)
    }

    /// Find the intersection of two geodesic segments given as lines and
    /// lengths.
    /// * `line_x`, `line_y` - the lines, built with at least
    ///   `Caps::INTERSECT`.
    /// * `sx`, `sy` - the segment lengths.
    #[must_use]
    pub fn segment_from_lines(
        &self,
        line_x: &GeodesicLine,
        sx: Metres<f64>,
        line_y: &GeodesicLine,
        sy: Metres<f64>,
    ) -> (Intersection, i32) {
        // search from the segment midpoints
        let p0 = XPoint::new(sx.0 / 2.0, sy.0 / 2.0, 0);
        let mut q = self.closest_internal(line_x, line_y, &p0);
        if q.c != 0 {
            q = Self::fix_segment(sx.0, sy.0, &q);
        }
        let mut segmode = Self::segment_mode(sx.0, sy.0, &q);

        // when the closest intersection lies outside a segment, an
        // intersection near the clamped corner may serve the caller better
        if segmode != 0 && q.c == 0 {
            let corner = XPoint::new(
                f64::min(f64::max(q.x, 0.0), sx.0),
                f64::min(f64::max(q.y, 0.0), sy.0),
                0,
            );
            let qc = self.refine(line_x, line_y, &corner);
            if qc.is_finite() {
                let corner_mode = Self::segment_mode(sx.0, sy.0, &qc);
                if corner_mode == 0 || (segmode != 0 && qc.dist(&p0) < q.dist(&p0)) {
                    q = qc;
                    segmode = corner_mode;
                }
            }
        }
        (q.output(), segmode)
    }

    /// Find the next closest intersection to a known one, the two
    /// geodesics given by their common position and their azimuths.
    #[must_use]
    pub fn next(&self, a: &LatLong<f64>, azimuth_x: Degrees<f64>, azimuth_y: Degrees<f64>) -> Intersection {
        let line_x = GeodesicLine::new(self.ellipsoid, a, azimuth_x, Caps::INTERSECT);
        let line_y = GeodesicLine::new(self.ellipsoid, a, azimuth_y, Caps::INTERSECT);
        self.next_from_lines(&line_x, &line_y)
    }

    /// Find the next closest intersection to a known one, the two
    /// geodesics given as lines starting at the known intersection.
    /// * `line_x`, `line_y` - the lines, built with at least
    ///   `Caps::INTERSECT`.
    #[must_use]
    pub fn next_from_lines(&self, line_x: &GeodesicLine, line_y: &GeodesicLine) -> Intersection {
        let origin = XPoint::new(0.0, 0.0, 0);
        let (probe, _) = self.spherical_step(line_x, line_y, &origin);
        if probe.c != 0 {
            // coincident lines: the next interaction of the pair is where
            // neighbouring geodesics refocus, at the conjugate points
            let c = f64::from(probe.c);
            let forward = self
                .conjugate_distance(line_x, Metres(self.d), false)
                .0;
            let backward = self
                .conjugate_distance(line_x, Metres(-self.d), false)
                .0;
            let q = if libm::fabs(backward) < forward {
                XPoint::new(backward, c * backward, probe.c)
            } else {
                XPoint::new(forward, c * forward, probe.c)
            };
            return q.output();
        }

        let mut found: Vec<XPoint> = Vec::new();
        // the known intersection at the origin absorbs every candidate
        // that converges back to it
        found.push(origin);
        for i in -2_i32..=2 {
            for j in -2_i32..=2 {
                if i == 0 && j == 0 {
                    continue;
                }
                let seed = XPoint::new(f64::from(i) * self.d2, f64::from(j) * self.d2, 0);
                let q = self.refine(line_x, line_y, &seed);
                if q.is_finite() {
                    self.push_unique(&mut found, q);
                }
            }
        }
        found
            .into_iter()
            .skip(1)
            .min_by(|p, q| Self::rank(p, q, &origin))
            .map_or_else(|| XPoint::nan().output(), |q| q.output())
    }

    /// Find all intersections within an L1 radius of the starting points,
    /// each geodesic given by a position and an azimuth.
    /// * `maxdist` - the L1 radius.
    #[must_use]
    pub fn all(
        &self,
        a: &LatLong<f64>,
        azimuth_a: Degrees<f64>,
        b: &LatLong<f64>,
        azimuth_b: Degrees<f64>,
        maxdist: Metres<f64>,
    ) -> Vec<Intersection> {
        let line_x = GeodesicLine::new(self.ellipsoid, a, azimuth_a, Caps::INTERSECT);
        let line_y = GeodesicLine::new(self.ellipsoid, b, azimuth_b, Caps::INTERSECT);
        self.all_from_lines(&line_x, &line_y, maxdist, (Metres(0.0), Metres(0.0)))
    }

    /// Find all intersections of two `GeodesicLine`s within an L1 radius
    /// of a reference offset, sorted by their distance from it.
    /// * `line_x`, `line_y` - the lines, built with at least
    ///   `Caps::INTERSECT`.
    /// * `maxdist` - the L1 radius.
    /// * `offset` - the reference displacements along the lines.
    #[must_use]
    pub fn all_from_lines(
        &self,
        line_x: &GeodesicLine,
        line_y: &GeodesicLine,
        maxdist: Metres<f64>,
        offset: (Metres<f64>, Metres<f64>),
    ) -> Vec<Intersection> {
        let p0 = XPoint::new(offset.0 .0, offset.1 .0, 0);
        let mut found: Vec<XPoint> = Vec::new();
        if !(maxdist.0 >= 0.0) {
            return Vec::new();
        }

        let extent = maxdist.0 + self.slop;
        let steps = libm::ceil(extent / self.d3) as i32;
        for i in -steps..=steps {
            for j in -steps..=steps {
                let seed = XPoint::new(
                    p0.x + f64::from(i) * self.d3,
                    p0.y + f64::from(j) * self.d3,
                    0,
                );
                let mut q = self.refine(line_x, line_y, &seed);
                if !q.is_finite() {
                    continue;
                }
                if q.c != 0 {
                    // one representative stands for the whole coincidence
                    // line, centred on the reference offset
                    q = Self::fix_coincident(&p0, &q);
                }
                self.push_unique(&mut found, q);
            }
        }

        found.retain(|q| q.dist(&p0) <= maxdist.0);
        found.sort_by(|p, q| Self::rank(p, q, &p0));
        found.into_iter().map(|q| q.output()).collect()
    }

    /// The closest-intersection search: a tile of seeds around the
    /// reference offset, each refined and deduplicated, ranked by L1
    /// distance from the reference.
    fn closest_internal(&self, line_x: &GeodesicLine, line_y: &GeodesicLine, p0: &XPoint) -> XPoint {
        let mut found: Vec<XPoint> = Vec::new();
        for i in -1_i32..=1 {
            for j in -1_i32..=1 {
                let seed = XPoint::new(
                    p0.x + f64::from(i) * self.d1,
                    p0.y + f64::from(j) * self.d1,
                    0,
                );
                let mut q = self.refine(line_x, line_y, &seed);
                if !q.is_finite() {
                    continue;
                }
                if q.c != 0 {
                    q = Self::fix_coincident(p0, &q);
                }
                self.push_unique(&mut found, q);
            }
        }
        found
            .into_iter()
            .min_by(|p, q| Self::rank(p, q, p0))
            .unwrap_or_else(XPoint::nan)
    }

    /// The iterated spherical refinement: repeat the spherical solution at
    /// the current offsets until the update is below tolerance. A
    /// candidate that has not settled within `MAX_REFINE` rounds is
    /// discarded.
    fn refine(&self, line_x: &GeodesicLine, line_y: &GeodesicLine, seed: &XPoint) -> XPoint {
        let mut q = *seed;
        for iteration in 0..MAX_REFINE {
            let (next, delta) = self.spherical_step(line_x, line_y, &q);
            q = next;
            if delta <= self.tol {
                log::trace!("refine converged after {iteration} iterations");
                return q;
            }
        }
        XPoint::nan()
    }

    /// One spherical step: solve the geodesic between the current
    /// positions of the two lines, then intersect the auxiliary-sphere
    /// great circles tangent to the lines there.
    ///
    /// Returns the stepped point and the L1 size of the step. When the
    /// connecting geodesic runs along both lines they are coincident: the
    /// step moves to the midpoint of the two positions and sets the
    /// coincidence indicator.
    fn spherical_step(
        &self,
        line_x: &GeodesicLine,
        line_y: &GeodesicLine,
        p: &XPoint,
    ) -> (XPoint, f64) {
        let gx = line_x.position_internal(false, p.x, Caps::STANDARD);
        let gy = line_y.position_internal(false, p.y, Caps::STANDARD);
        let position_x = LatLong::new(gx.lat2, gx.lon2);
        let position_y = LatLong::new(gy.lat2, gy.lon2);

        let between = crate::geodesic::inverse(
            self.ellipsoid,
            &position_x,
            &position_y,
            Caps::STANDARD,
        );
        let z = between.distance.0;
        if !(z > self.tol) {
            // the positions agree: intersection found, or the lines touch
            // at a shallow enough angle to count as coincident
            let (sin_g, cos_g) = angular::sincosd(gy.azi2.0 - gx.azi2.0);
            let c = if libm::fabs(sin_g) <= self.sin_coincident {
                if cos_g > 0.0 {
                    1
                } else {
                    -1
                }
            } else {
                0
            };
            return (XPoint::new(p.x, p.y, c), 0.0);
        }

        // the angles between the connecting geodesic and the two lines
        let (sin_gamma_x, cos_gamma_x) = angular::sincosd(between.azi1.0 - gx.azi2.0);
        let (sin_gamma_y, cos_gamma_y) = angular::sincosd(between.azi2.0 - gy.azi2.0);
        if libm::fabs(sin_gamma_x) <= self.sin_coincident
            && libm::fabs(sin_gamma_y) <= self.sin_coincident
        {
            // the connecting geodesic runs along both lines: coincident;
            // centre on the midpoint of the two positions
            let c = if cos_gamma_x * cos_gamma_y > 0.0 { 1 } else { -1 };
            let dx = cos_gamma_x * z / 2.0;
            let dy = -cos_gamma_y * z / 2.0;
            return (
                XPoint::new(p.x + dx, p.y + dy, c),
                libm::fabs(dx) + libm::fabs(dy),
            );
        }

        let beta_x = self.ellipsoid.calculate_parametric_latitude(Angle::from(gx.lat2));
        let lon_x = Angle::from(gx.lon2);
        let point_x = vector::to_point(beta_x, lon_x);
        let pole_x = vector::calculate_pole(beta_x, lon_x, Angle::from(gx.azi2));

        let beta_y = self.ellipsoid.calculate_parametric_latitude(Angle::from(gy.lat2));
        let lon_y = Angle::from(gy.lon2);
        let point_y = vector::to_point(beta_y, lon_y);
        let pole_y = vector::calculate_pole(beta_y, lon_y, Angle::from(gy.azi2));

        match vector::intersection::calculate_intersection(
            &pole_x,
            &pole_y,
            self.sq_sin_coincident,
        ) {
            Some(c) => {
                // prefer the intersection candidate on the near side
                let centroid = point_x + point_y;
                let c = if vector::intersection::use_antipodal_point(&c, &centroid) {
                    -c
                } else {
                    c
                };
                let dx = vector::calculate_great_circle_atd(&point_x, &pole_x, &c).0 * self.r;
                let dy = vector::calculate_great_circle_atd(&point_y, &pole_y, &c).0 * self.r;
                (
                    XPoint::new(p.x + dx, p.y + dy, 0),
                    libm::fabs(dx) + libm::fabs(dy),
                )
            }
            None => {
                // the tangent great circles are indistinguishable on the
                // auxiliary sphere: treat as coincident, oriented by the
                // agreement of their poles
                let c = if pole_x.dot(&pole_y) > 0.0 { 1 } else { -1 };
                let along = vector::calculate_great_circle_atd(&point_x, &pole_x, &point_y).0
                    * self.r;
                let dx = along / 2.0;
                let dy = -f64::from(c) * along / 2.0;
                (
                    XPoint::new(p.x + dx, p.y + dy, c),
                    libm::fabs(dx) + libm::fabs(dy),
                )
            }
        }
    }

    /// Insert `q` unless the set already holds a point within the L1 slop,
    /// or a point on the same coincidence line.
    fn push_unique(&self, found: &mut Vec<XPoint>, q: XPoint) {
        for p in found.iter() {
            if p.dist(&q) <= self.slop {
                return;
            }
            if p.c != 0 && p.c == q.c {
                let c = f64::from(p.c);
                if libm::fabs((q.y - p.y) - c * (q.x - p.x)) <= self.slop {
                    return;
                }
            }
        }
        found.push(q);
    }

    /// Rank points by L1 distance from `p0`, tie-broken on coordinates so
    /// the ordering is total for finite points.
    fn rank(p: &XPoint, q: &XPoint, p0: &XPoint) -> core::cmp::Ordering {
        p.dist(p0)
            .total_cmp(&q.dist(p0))
            .then_with(|| p.x.total_cmp(&q.x))
            .then_with(|| p.y.total_cmp(&q.y))
    }

    /// Centre a point of a coincidence line on the reference offset, so
    /// that `|x - x0| == |y - y0|`.
    fn fix_coincident(p0: &XPoint, p: &XPoint) -> XPoint {
        if p.c == 0 {
            return *p;
        }
        let c = f64::from(p.c);
        let s = ((p.x - p0.x) + c * (p.y - p0.y)) / 2.0;
        XPoint::new(p.x - s, p.y - c * s, p.c)
    }

    /// Centre a point of a coincidence line on the overlap of the two
    /// segments `[0, sx]` and `[0, sy]`.
    fn fix_segment(sx: f64, sy: f64, p: &XPoint) -> XPoint {
        if p.c > 0 {
            // y = x + t
            let t = p.y - p.x;
            let lo = f64::max(0.0, -t);
            let hi = f64::min(sx, sy - t);
            let x = (lo + hi) / 2.0;
            XPoint::new(x, x + t, p.c)
        } else {
            // y = -x + t
            let t = p.y + p.x;
            let lo = f64::max(0.0, t - sy);
            let hi = f64::min(sx, t);
            let x = (lo + hi) / 2.0;
            XPoint::new(x, t - x, p.c)
        }
    }

    /// The segment mode `3 kx + ky` of a point relative to segment
    /// lengths `sx` and `sy`.
    fn segment_mode(sx: f64, sy: f64, p: &XPoint) -> i32 {
        let kx = if p.x < 0.0 {
            -1
        } else if p.x <= sx {
            0
        } else {
            1
        };
        let ky = if p.y < 0.0 {
            -1
        } else if p.y <= sy {
            0
        } else {
            1
        };
        3 * kx + ky
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_validation() {
        let fat = Ellipsoid::new(Metres(6_378_137.0), 0.3).unwrap();
        assert!(matches!(Intersect::new(&fat), Err(Error::InvalidEllipsoid)));

        let thin = Ellipsoid::new(Metres(6_378_137.0), -0.3).unwrap();
        assert!(matches!(Intersect::new(&thin), Err(Error::InvalidEllipsoid)));

        let wgs84 = Ellipsoid::wgs84();
        assert!(Intersect::new(&wgs84).is_ok());
    }

    #[test]
    fn test_fix_coincident() {
        let p0 = XPoint::new(0.0, 0.0, 0);
        let p = Intersect::fix_coincident(&p0, &XPoint::new(4.0, 2.0, 1));
        assert_eq!(1.0, p.x);
        assert_eq!(-1.0, p.y);

        // the anti-parallel point lies on y = -x + 6
        let p = Intersect::fix_coincident(&p0, &XPoint::new(4.0, 2.0, -1));
        assert_eq!(3.0, p.x);
        assert_eq!(3.0, p.y);
    }

    #[test]
    fn test_segment_mode() {
        assert_eq!(0, Intersect::segment_mode(10.0, 10.0, &XPoint::new(5.0, 5.0, 0)));
        assert_eq!(-4, Intersect::segment_mode(10.0, 10.0, &XPoint::new(-1.0, -1.0, 0)));
        assert_eq!(4, Intersect::segment_mode(10.0, 10.0, &XPoint::new(11.0, 11.0, 0)));
        assert_eq!(1, Intersect::segment_mode(10.0, 10.0, &XPoint::new(5.0, 11.0, 0)));
        assert_eq!(-3, Intersect::segment_mode(10.0, 10.0, &XPoint::new(-1.0, 5.0, 0)));
    }
}
