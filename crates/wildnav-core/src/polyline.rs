//! Delta + base-32 polyline codec (Google/Valhalla wire format).
//!
//! The routing service returns shapes at precision 6; the codec keeps
//! precision configurable so fixtures at the classic precision 5 also
//! decode.

use crate::models::GeoPoint;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolylineError {
    #[error("invalid polyline character {0:?}")]
    InvalidCharacter(char),
    #[error("polyline ended mid-value")]
    Truncated,
    #[error("polyline value exceeds 64 bits")]
    Overflow,
}

/// Decode an encoded polyline into an ordered coordinate sequence.
pub fn decode(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>, PolylineError> {
    let factor = 10f64.powi(precision as i32);
    let mut path = Vec::new();
    let mut chars = encoded.chars();
    let mut lat = 0i64;
    let mut lon = 0i64;

    loop {
        let Some(dlat) = decode_value(&mut chars)? else {
            break;
        };
        let dlon = decode_value(&mut chars)?.ok_or(PolylineError::Truncated)?;
        lat += dlat;
        lon += dlon;
        path.push(GeoPoint::new(lat as f64 / factor, lon as f64 / factor));
    }

    Ok(path)
}

fn decode_value(chars: &mut std::str::Chars<'_>) -> Result<Option<i64>, PolylineError> {
    let mut value = 0i64;
    let mut shift = 0u32;
    let mut read_any = false;

    for c in chars.by_ref() {
        let byte = c as i64 - 63;
        if !(0..=63).contains(&byte) {
            return Err(PolylineError::InvalidCharacter(c));
        }
        read_any = true;
        // 13 chunks of 5 bits fill an i64; anything longer is not a
        // value this codec can have produced.
        if shift >= 64 {
            return Err(PolylineError::Overflow);
        }
        value |= (byte & 0x1f) << shift;
        shift += 5;
        if byte & 0x20 == 0 {
            let value = if value & 1 != 0 { !(value >> 1) } else { value >> 1 };
            return Ok(Some(value));
        }
    }

    if read_any {
        Err(PolylineError::Truncated)
    } else {
        Ok(None)
    }
}

/// Encode a coordinate sequence at the given precision.
///
/// Re-encoding a decoded shape reproduces distances within the
/// precision's rounding tolerance, not necessarily the same string.
pub fn encode(path: &[GeoPoint], precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let mut out = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;

    for point in path {
        let lat = (point.lat * factor).round() as i64;
        let lon = (point.lon * factor).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(((0x20 | (v & 0x1f)) + 63) as u8 as char);
        v >>= 5;
    }
    out.push((v + 63) as u8 as char);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::path_length_km;

    #[test]
    fn decodes_classic_precision5_fixture() {
        let path = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 5).unwrap();
        assert_eq!(path.len(), 3);
        assert!((path[0].lat - 38.5).abs() < 1e-9);
        assert!((path[0].lon - -120.2).abs() < 1e-9);
        assert!((path[2].lat - 43.252).abs() < 1e-9);
        assert!((path[2].lon - -126.453).abs() < 1e-9);
    }

    #[test]
    fn empty_string_decodes_to_empty_path() {
        assert!(decode("", 6).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_character() {
        assert_eq!(
            decode("_p~iF\u{7}", 5),
            Err(PolylineError::InvalidCharacter('\u{7}'))
        );
    }

    #[test]
    fn rejects_overlong_varint() {
        // Every `~` keeps the continuation bit set, so this value
        // never terminates and would overflow the accumulator.
        let hostile = "~".repeat(14);
        assert_eq!(decode(&hostile, 6), Err(PolylineError::Overflow));
    }

    #[test]
    fn rejects_truncated_value() {
        // A continuation bit with nothing after it.
        assert_eq!(decode("_", 5), Err(PolylineError::Truncated));
    }

    #[test]
    fn known_path_length_within_one_percent() {
        // Three points spanning roughly 10 km along the 11N parallel.
        let path = vec![
            GeoPoint::new(11.40, 76.70),
            GeoPoint::new(11.43, 76.74),
            GeoPoint::new(11.45, 76.78),
        ];
        let expected = path_length_km(&path);
        assert!(expected > 9.0 && expected < 12.0, "fixture spans {expected} km");

        let encoded = encode(&path, 6);
        let decoded = decode(&encoded, 6).unwrap();
        let actual = path_length_km(&decoded);
        assert!(
            (actual - expected).abs() / expected < 0.01,
            "expected {expected}, decoded {actual}"
        );
    }

    #[test]
    fn round_trip_preserves_distance_at_precision6() {
        let path = vec![
            GeoPoint::new(11.412345, 76.701234),
            GeoPoint::new(11.420001, 76.712345),
            GeoPoint::new(11.431111, 76.725555),
        ];
        let decoded = decode(&encode(&path, 6), 6).unwrap();
        for (a, b) in path.iter().zip(&decoded) {
            assert!((a.lat - b.lat).abs() < 1e-6);
            assert!((a.lon - b.lon).abs() < 1e-6);
        }
    }
}
