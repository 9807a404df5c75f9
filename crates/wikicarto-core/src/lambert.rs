//! Geographic to Lambert-93 projection (EPSG:4326 → EPSG:2154).
//!
//! Lambert conformal conic with two standard parallels on the GRS80
//! ellipsoid, using the official RGF93 / Lambert-93 defining constants.

use std::f64::consts::FRAC_PI_4;

// GRS80 ellipsoid
const SEMI_MAJOR: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;

// Lambert-93 projection constants
const LAT_ORIGIN: f64 = 46.5;
const LON_ORIGIN: f64 = 3.0;
const LAT_PARALLEL_1: f64 = 44.0;
const LAT_PARALLEL_2: f64 = 49.0;
const FALSE_EASTING: f64 = 700_000.0;
const FALSE_NORTHING: f64 = 6_600_000.0;

/// Conformal latitude function t(φ).
fn conformal_t(lat_rad: f64, e: f64) -> f64 {
    let sin = lat_rad.sin();
    (FRAC_PI_4 - lat_rad / 2.0).tan() / ((1.0 - e * sin) / (1.0 + e * sin)).powf(e / 2.0)
}

/// Parallel radius function m(φ).
fn parallel_m(lat_rad: f64, e: f64) -> f64 {
    let sin = lat_rad.sin();
    lat_rad.cos() / (1.0 - e * e * sin * sin).sqrt()
}

/// Project geographic degrees onto the Lambert-93 plane, in meters.
pub fn project(lat_deg: f64, lon_deg: f64) -> (f64, f64) {
    let e = (2.0 * FLATTENING - FLATTENING * FLATTENING).sqrt();

    let phi = lat_deg.to_radians();
    let phi0 = LAT_ORIGIN.to_radians();
    let phi1 = LAT_PARALLEL_1.to_radians();
    let phi2 = LAT_PARALLEL_2.to_radians();

    let m1 = parallel_m(phi1, e);
    let m2 = parallel_m(phi2, e);
    let t = conformal_t(phi, e);
    let t0 = conformal_t(phi0, e);
    let t1 = conformal_t(phi1, e);
    let t2 = conformal_t(phi2, e);

    let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
    let big_f = m1 / (n * t1.powf(n));
    let rho = SEMI_MAJOR * big_f * t.powf(n);
    let rho0 = SEMI_MAJOR * big_f * t0.powf(n);
    let theta = n * (lon_deg - LON_ORIGIN).to_radians();

    (
        FALSE_EASTING + rho * theta.sin(),
        FALSE_NORTHING + rho0 - rho * theta.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn false_origin_maps_to_false_origin() {
        let (x, y) = project(LAT_ORIGIN, LON_ORIGIN);
        assert!((x - FALSE_EASTING).abs() < 1e-6, "x = {x}");
        assert!((y - FALSE_NORTHING).abs() < 1e-6, "y = {y}");
    }

    #[test]
    fn paris_lands_in_expected_envelope() {
        let (x, y) = project(48.8566, 2.3522);
        assert!((600_000.0..700_000.0).contains(&x), "x = {x}");
        assert!((6_800_000.0..6_900_000.0).contains(&y), "y = {y}");
    }

    #[test]
    fn northing_increases_with_latitude() {
        let (_, y_south) = project(44.0, 3.0);
        let (_, y_north) = project(49.0, 3.0);
        assert!(y_north > y_south);
    }

    #[test]
    fn easting_increases_with_longitude() {
        let (x_west, _) = project(46.5, 1.0);
        let (x_east, _) = project(46.5, 5.0);
        assert!(x_east > x_west);
    }
}
