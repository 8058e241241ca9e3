//! Base-32 spatial hash encoding and range-cover decomposition
//!
//! The hash interleaves longitude and latitude bits (longitude first) and
//! renders them in the standard base-32 alphabet, so geographically nearby
//! points tend to share long common prefixes. A radius query is answered by
//! picking a precision whose grid cell is at least as large as the radius,
//! then scanning the center cell and its eight neighbors as ordered string
//! ranges. Hash proximity is a superset filter only; callers must
//! post-filter by true distance.

use crate::error::{AppError, Result};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Hash length used when persisting provider locations.
pub const DEFAULT_PRECISION: usize = 9;

const MAX_PRECISION: usize = 12;

/// Meters per degree of latitude.
const METERS_PER_DEG_LAT: f64 = 110_574.0;

/// Meters per degree of longitude at the equator.
const METERS_PER_DEG_LNG: f64 = 111_320.0;

/// An inclusive `[lo, hi]` range over the spatial-hash index.
///
/// `hi` is the cell prefix followed by `'~'`, which sorts after every
/// base-32 hash character, so `lo <= hash <= hi` matches exactly the
/// hashes inside the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRange {
    pub lo: String,
    pub hi: String,
}

impl HashRange {
    fn for_cell(cell: String) -> Self {
        let hi = format!("{}~", cell);
        Self { lo: cell, hi }
    }
}

/// Encode a WGS84 coordinate into a spatial hash of the given precision.
pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
    let precision = precision.clamp(1, MAX_PRECISION);
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut even_bit = true; // longitude first
    let mut ch: u8 = 0;
    let mut bit = 0;

    while hash.len() < precision {
        if even_bit {
            let mid = (lng_range.0 + lng_range.1) / 2.0;
            if lng >= mid {
                ch = (ch << 1) | 1;
                lng_range.0 = mid;
            } else {
                ch <<= 1;
                lng_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                lat_range.0 = mid;
            } else {
                ch <<= 1;
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;

        bit += 1;
        if bit == 5 {
            hash.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    hash
}

/// Decode a spatial hash back to the center of its cell.
pub fn decode(hash: &str) -> Result<(f64, f64)> {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for c in hash.bytes() {
        let idx = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| AppError::Validation(format!("invalid hash character: {}", c as char)))?;

        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if even_bit {
                let mid = (lng_range.0 + lng_range.1) / 2.0;
                if bit == 1 {
                    lng_range.0 = mid;
                } else {
                    lng_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    Ok((
        (lat_range.0 + lat_range.1) / 2.0,
        (lng_range.0 + lng_range.1) / 2.0,
    ))
}

/// Grid cell dimensions in degrees at a given precision.
fn cell_dimensions_deg(precision: usize) -> (f64, f64) {
    let total_bits = precision * 5;
    let lng_bits = (total_bits + 1) / 2;
    let lat_bits = total_bits / 2;
    let height = 180.0 / (1u64 << lat_bits) as f64;
    let width = 360.0 / (1u64 << lng_bits) as f64;
    (height, width)
}

/// Longest precision whose grid cell covers at least `radius_m` in both
/// dimensions at the given latitude. A 3x3 cell neighborhood around the
/// center then covers every point within the radius.
///
/// Capped at the stored hash length: a range built from a longer prefix
/// sorts past every persisted hash and matches nothing.
fn precision_for_radius(lat: f64, radius_m: f64) -> usize {
    // Longitude degrees shrink toward the poles; be conservative there
    let lng_scale = lat.to_radians().cos().max(0.01);

    for precision in (1..=DEFAULT_PRECISION).rev() {
        let (height_deg, width_deg) = cell_dimensions_deg(precision);
        let cell_h_m = height_deg * METERS_PER_DEG_LAT;
        let cell_w_m = width_deg * METERS_PER_DEG_LNG * lng_scale;
        if cell_h_m >= radius_m && cell_w_m >= radius_m {
            return precision;
        }
    }

    1
}

/// Decompose a center + radius into the hash ranges to scan.
///
/// Returns the center cell plus its eight neighbors, each as an inclusive
/// string range. Ranges may overlap in the candidates they admit at prefix
/// borders; callers deduplicate by document id. Longitude neighbors wrap
/// across the 180th meridian; latitude rows past a pole are dropped.
pub fn cover_radius(lat: f64, lng: f64, radius_m: f64) -> Vec<HashRange> {
    let precision = precision_for_radius(lat, radius_m);
    let (height_deg, width_deg) = cell_dimensions_deg(precision);

    let mut cells: Vec<String> = Vec::with_capacity(9);
    for dy in [-1.0, 0.0, 1.0] {
        let n_lat = lat + dy * height_deg;
        if !(-90.0..=90.0).contains(&n_lat) {
            continue;
        }
        for dx in [-1.0, 0.0, 1.0] {
            let mut n_lng = lng + dx * width_deg;
            if n_lng >= 180.0 {
                n_lng -= 360.0;
            } else if n_lng < -180.0 {
                n_lng += 360.0;
            }
            let cell = encode(n_lat, n_lng, precision);
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    }

    cells.into_iter().map(HashRange::for_cell).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hashes() {
        // Reference vectors from the original geohash definition
        assert_eq!(encode(42.605, -5.603, 5), "ezs42");
        assert_eq!(encode(57.64911, 10.40744, 11), "u4pruydqqvj");
    }

    #[test]
    fn test_decode_roundtrip() {
        let (lat, lng) = (52.4064, 16.9252);
        let hash = encode(lat, lng, DEFAULT_PRECISION);
        let (d_lat, d_lng) = decode(&hash).unwrap();
        let (height, width) = cell_dimensions_deg(DEFAULT_PRECISION);
        assert!((d_lat - lat).abs() <= height);
        assert!((d_lng - lng).abs() <= width);
    }

    #[test]
    fn test_decode_rejects_bad_characters() {
        assert!(decode("u3~!").is_err());
    }

    #[test]
    fn test_prefix_monotonicity() {
        // A point and the center of its own cell hash identically
        let hash = encode(52.4064, 16.9252, 6);
        let (c_lat, c_lng) = decode(&hash).unwrap();
        assert_eq!(encode(c_lat, c_lng, 6), hash);
    }

    #[test]
    fn test_precision_shrinks_with_radius() {
        let coarse = precision_for_radius(52.0, 50_000.0);
        let fine = precision_for_radius(52.0, 500.0);
        assert!(fine > coarse);
    }

    #[test]
    fn test_tiny_radius_stays_within_stored_precision() {
        let (lat, lng) = (52.4064, 16.9252);
        let ranges = cover_radius(lat, lng, 0.5);
        let precision = ranges[0].lo.len();
        assert!(precision <= DEFAULT_PRECISION);

        // A hash persisted at the stored length still falls in a range
        let stored = encode(lat, lng, DEFAULT_PRECISION);
        assert!(ranges
            .iter()
            .any(|r| stored.as_str() >= r.lo.as_str() && stored.as_str() <= r.hi.as_str()));
    }

    #[test]
    fn test_cover_radius_midlatitude() {
        let ranges = cover_radius(52.4064, 16.9252, 5_000.0);
        assert_eq!(ranges.len(), 9);
        for range in &ranges {
            assert!(range.lo < range.hi);
            assert_eq!(range.hi, format!("{}~", range.lo));
        }
        // Center cell is one of the scanned ranges
        let precision = ranges[0].lo.len();
        let center = encode(52.4064, 16.9252, precision);
        assert!(ranges.iter().any(|r| r.lo == center));
    }

    #[test]
    fn test_cover_radius_contains_points_within_radius() {
        let (lat, lng, radius) = (52.4064, 16.9252, 5_000.0);
        let ranges = cover_radius(lat, lng, radius);
        let precision = ranges[0].lo.len();

        // Probe points a bit inside the radius in eight directions
        for angle_deg in (0..360).step_by(45) {
            let angle = (angle_deg as f64).to_radians();
            let d = radius * 0.9;
            let p_lat = lat + (d * angle.cos()) / super::METERS_PER_DEG_LAT;
            let p_lng = lng
                + (d * angle.sin())
                    / (super::METERS_PER_DEG_LNG * lat.to_radians().cos());
            let hash = encode(p_lat, p_lng, precision);
            assert!(
                ranges.iter().any(|r| hash >= r.lo && hash <= r.hi),
                "point at {} degrees not covered",
                angle_deg
            );
        }
    }

    #[test]
    fn test_cover_radius_wraps_antimeridian() {
        let ranges = cover_radius(0.0, 179.9999, 5_000.0);
        assert_eq!(ranges.len(), 9);
        let precision = ranges[0].lo.len();
        // A point just across the meridian still falls in a scanned range
        let hash = encode(0.0, -179.9999, precision);
        assert!(ranges.iter().any(|r| hash >= r.lo && hash <= r.hi));
    }

    #[test]
    fn test_cover_radius_near_pole() {
        let ranges = cover_radius(89.9, 0.0, 5_000.0);
        assert!(!ranges.is_empty() && ranges.len() <= 9);
    }
}
