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

extern crate geodesic_intersect;

use angle_sc::is_within_tolerance;
use geodesic_intersect::{geodesic, Caps, Degrees, Ellipsoid, LatLong, Metres};

#[test]
fn test_direct_10mm() {
    // a 10,000 km geodesic crossing mid latitudes, past its vertex
    let wgs84 = Ellipsoid::wgs84();
    let start = LatLong::new(Degrees(40.0), Degrees(-75.0));

    let r = wgs84.direct(
        &start,
        Degrees(45.0),
        Metres(10_000_000.0),
        Caps::STANDARD | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE,
    );

    assert!(is_within_tolerance(32.98, r.lat2.0, 0.5));
    assert!(is_within_tolerance(47.5, r.lon2.0, 0.5));
    assert!(is_within_tolerance(139.8, r.azi2.0, 0.5));
    assert!(r.reduced_length.0.is_finite());
    assert!(r.scale_12.is_finite() && r.scale_21.is_finite());

    // Clairaut's relation holds between the end points:
    // sin(azi) * cos(beta) is constant along the geodesic
    let one_minus_f = 1.0 - wgs84.f();
    let beta1 = (one_minus_f * 40.0_f64.to_radians().tan()).atan();
    let beta2 = (one_minus_f * r.lat2.0.to_radians().tan()).atan();
    let clairaut1 = 45.0_f64.to_radians().sin() * beta1.cos();
    let clairaut2 = r.azi2.0.to_radians().sin() * beta2.cos();
    assert!(is_within_tolerance(clairaut1, clairaut2, 1e-12));
}

#[test]
fn test_direct_inverse_round_trip() {
    let wgs84 = Ellipsoid::wgs84();
    let starts = [
        LatLong::new(Degrees(40.0), Degrees(-75.0)),
        LatLong::new(Degrees(-33.9), Degrees(18.4)),
        LatLong::new(Degrees(0.1), Degrees(170.0)),
        LatLong::new(Degrees(65.0), Degrees(-20.0)),
    ];
    let azimuths = [45.0, -135.0, 89.9, 3.0];
    let distances = [1.0e4, 5.0e6, 1.0e7, 1.9e7];

    for (start, (azi, s12)) in starts.iter().zip(azimuths.iter().zip(distances.iter())) {
        let fwd = wgs84.direct(start, Degrees(*azi), Metres(*s12), Caps::STANDARD);
        let end = LatLong::new(fwd.lat2, fwd.lon2);
        let inv = wgs84.inverse(start, &end, Caps::STANDARD);

        // the inverse recovers the distance and azimuths of the direct
        assert!(is_within_tolerance(*s12, inv.distance.0, 1e-6));
        assert!(is_within_tolerance(*azi, inv.azi1.0, 1e-7));
        assert!(is_within_tolerance(fwd.azi2.0, inv.azi2.0, 1e-7));
        assert!(is_within_tolerance(fwd.arc_length.0, inv.arc_length.0, 1e-9));
    }
}

#[test]
fn test_inverse_arc_length_bounds() {
    let wgs84 = Ellipsoid::wgs84();
    let pairs = [
        (0.0, 0.0, 0.0, 90.0),
        (40.0, -75.0, -40.0, 105.0),
        (0.0, 0.0, 0.5, 179.5),
        (30.0, 10.0, 30.0, 10.0),
    ];
    for (lat1, lon1, lat2, lon2) in pairs {
        let a = LatLong::new(Degrees(lat1), Degrees(lon1));
        let b = LatLong::new(Degrees(lat2), Degrees(lon2));
        let r = wgs84.inverse(&a, &b, Caps::STANDARD);
        assert!((0.0..=180.0).contains(&r.arc_length.0));
    }
}

#[test]
fn test_inverse_reciprocity() {
    let wgs84 = Ellipsoid::wgs84();
    let caps = Caps::STANDARD | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE | Caps::AREA;
    let a = LatLong::new(Degrees(35.0), Degrees(-120.0));
    let b = LatLong::new(Degrees(-20.0), Degrees(42.0));

    let fwd = wgs84.inverse(&a, &b, caps);
    let rev = wgs84.inverse(&b, &a, caps);

    // distance and reduced length are symmetric
    assert!(is_within_tolerance(fwd.distance.0, rev.distance.0, 1e-8));
    assert!(is_within_tolerance(
        fwd.reduced_length.0,
        rev.reduced_length.0,
        1e-6
    ));
    // the scales exchange and the area changes sign
    assert!(is_within_tolerance(fwd.scale_12, rev.scale_21, 1e-12));
    assert!(is_within_tolerance(fwd.scale_21, rev.scale_12, 1e-12));
    assert!(is_within_tolerance(fwd.area, -rev.area, 1.0));
}

#[test]
fn test_sphere_closed_forms() {
    // on a sphere the geodesic quantities have closed forms
    let radius = 6_371_000.0;
    let sphere = Ellipsoid::from_inverse_flattening(Metres(radius), 0.0).unwrap();
    let a = LatLong::new(Degrees(20.0), Degrees(-30.0));
    let b = LatLong::new(Degrees(-15.0), Degrees(70.0));

    let caps = Caps::STANDARD | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE;
    let r = sphere.inverse(&a, &b, caps);
    let sigma = r.arc_length.0.to_radians();

    assert!(is_within_tolerance(radius * sigma, r.distance.0, 1e-6));
    assert!(is_within_tolerance(
        radius * sigma.sin(),
        r.reduced_length.0,
        1e-6
    ));
    assert!(is_within_tolerance(sigma.cos(), r.scale_12, 1e-12));
    assert!(is_within_tolerance(sigma.cos(), r.scale_21, 1e-12));
}

#[test]
fn test_sphere_area_excess() {
    // on a sphere the area under a geodesic reduces to R^2 times the
    // azimuth excess alpha2 - alpha1
    let radius = 6_371_000.0;
    let sphere = Ellipsoid::from_inverse_flattening(Metres(radius), 0.0).unwrap();
    let a = LatLong::new(Degrees(20.0), Degrees(-30.0));
    let b = LatLong::new(Degrees(-15.0), Degrees(70.0));

    let r = sphere.inverse(&a, &b, Caps::STANDARD | Caps::AREA);
    let excess = (r.azi2.0 - r.azi1.0).to_radians();
    assert!(is_within_tolerance(radius * radius * excess, r.area, 1.0));
}

#[test]
fn test_direct_multiple_revolutions() {
    // a direct solve beyond a full revolution keeps longitudes finite and
    // normalised
    let wgs84 = Ellipsoid::wgs84();
    let start = LatLong::new(Degrees(10.0), Degrees(20.0));

    let r = wgs84.direct_arc(&start, Degrees(60.0), Degrees(720.0 + 30.0), Caps::STANDARD);
    assert!(r.lat2.0.is_finite());
    assert!((-180.0..180.0).contains(&r.lon2.0));

    let once = wgs84.direct_arc(&start, Degrees(60.0), Degrees(30.0), Caps::STANDARD);
    assert!(is_within_tolerance(once.lat2.0, r.lat2.0, 1e-9));
}

#[test]
fn test_direct_at_poles() {
    // azimuths at the poles follow the limiting meridian convention
    let wgs84 = Ellipsoid::wgs84();
    let north = LatLong::new(Degrees(90.0), Degrees(0.0));

    let r = wgs84.direct(&north, Degrees(180.0), Metres(1_000_000.0), Caps::STANDARD);
    assert!(r.lat2.0 < 90.0);
    assert!(r.lat2.0.is_finite());
    assert!(r.lon2.0.is_finite());
}

#[test]
fn test_dateline_wrap() {
    let wgs84 = Ellipsoid::wgs84();
    let a = LatLong::new(Degrees(10.0), Degrees(179.999_999));
    let b = LatLong::new(Degrees(10.0), Degrees(-179.999_999));

    let r = wgs84.inverse(&a, &b, Caps::STANDARD);
    assert!(r.distance.0.is_finite());
    assert!(r.distance.0 < 1000.0);
    assert!(r.azi1.0.is_finite());
}

#[test]
fn test_geodesic_scale_jacobi_relation() {
    // the reduced length of a split geodesic follows the addition rule
    // m13 = m12 M23 + m23 M21
    let wgs84 = Ellipsoid::wgs84();
    let start = LatLong::new(Degrees(25.0), Degrees(5.0));
    let caps = Caps::STANDARD | Caps::REDUCED_LENGTH | Caps::GEODESIC_SCALE;
    let line = wgs84.line(&start, Degrees(70.0), Caps::ALL);

    let s12 = 4.0e6;
    let s13 = 7.0e6;
    let g12 = line.position(Metres(s12), caps).unwrap();
    let g13 = line.position(Metres(s13), caps).unwrap();

    let mid = LatLong::new(g12.lat2, g12.lon2);
    let g23 = geodesic::direct(&wgs84, &mid, g12.azi2, Metres(s13 - s12), caps);

    let m13 = g13.reduced_length.0;
    let expected = g12.reduced_length.0 * g23.scale_12
        + g23.reduced_length.0 * g12.scale_21;
    assert!(is_within_tolerance(expected, m13, 1e-3));
}

#[test]
fn test_prolate_round_trip() {
    // a prolate ellipsoid exercises the negative-flattening branches
    let prolate = Ellipsoid::new(Metres(6_378_137.0), -1.0 / 150.0).unwrap();
    let start = LatLong::new(Degrees(30.0), Degrees(10.0));

    let fwd = prolate.direct(&start, Degrees(60.0), Metres(5.0e6), Caps::STANDARD);
    let end = LatLong::new(fwd.lat2, fwd.lon2);
    let inv = prolate.inverse(&start, &end, Caps::STANDARD);

    assert!(is_within_tolerance(5.0e6, inv.distance.0, 1e-6));
    assert!(is_within_tolerance(60.0, inv.azi1.0, 1e-7));
    assert!(is_within_tolerance(fwd.azi2.0, inv.azi2.0, 1e-7));
}
