// CrashGuard - NMEA 0183 Parsing
//
// Only RMC matters here: it carries position, fix validity and ground speed
// in one sentence.

use thiserror::Error;

use crate::events::Location;

const KNOTS_TO_M_S: f64 = 0.514_444;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NmeaError {
    #[error("sentence does not start with '$'")]
    MissingStart,
    #[error("missing or malformed checksum")]
    BadChecksumField,
    #[error("checksum mismatch: expected {expected:02X}, computed {computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },
    #[error("malformed field {0}")]
    Field(&'static str),
}

/// Parse one sentence. `Ok(None)` for valid sentences that carry no fix:
/// other sentence types, or RMC with status `V`.
pub fn parse_rmc(line: &str) -> Result<Option<Location>, NmeaError> {
    let body = checked_body(line.trim())?;
    let fields: Vec<&str> = body.split(',').collect();

    if !fields[0].ends_with("RMC") {
        return Ok(None);
    }
    if fields.len() < 8 {
        return Err(NmeaError::Field("count"));
    }
    if fields[2] != "A" {
        return Ok(None);
    }

    let latitude = coordinate(fields[3], fields[4], 'S').ok_or(NmeaError::Field("latitude"))?;
    let longitude = coordinate(fields[5], fields[6], 'W').ok_or(NmeaError::Field("longitude"))?;
    let knots = if fields[7].is_empty() {
        0.0
    } else {
        fields[7].parse::<f64>().map_err(|_| NmeaError::Field("speed"))?
    };

    Ok(Some(Location {
        latitude,
        longitude,
        speed_m_s: knots * KNOTS_TO_M_S,
    }))
}

/// Strip `$` and `*hh`, returning the checksummed body.
fn checked_body(line: &str) -> Result<&str, NmeaError> {
    let rest = line.strip_prefix('$').ok_or(NmeaError::MissingStart)?;
    let (body, checksum) = rest.split_once('*').ok_or(NmeaError::BadChecksumField)?;
    let expected = u8::from_str_radix(checksum.get(..2).ok_or(NmeaError::BadChecksumField)?, 16)
        .map_err(|_| NmeaError::BadChecksumField)?;

    let computed = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if computed != expected {
        return Err(NmeaError::ChecksumMismatch { expected, computed });
    }
    Ok(body)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere -> signed decimal degrees.
fn coordinate(value: &str, hemisphere: &str, negative: char) -> Option<f64> {
    let raw: f64 = value.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    match hemisphere.chars().next()? {
        c if c == negative => Some(-decimal),
        'N' | 'S' | 'E' | 'W' => Some(decimal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_active_fix() {
        let fix = parse_rmc("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n")
            .unwrap()
            .unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_666).abs() < 1e-5);
        assert!((fix.speed_m_s - 22.4 * 0.514_444).abs() < 1e-9);
    }

    #[test]
    fn multi_constellation_talker_is_accepted() {
        let fix = parse_rmc("$GNRMC,083559.00,A,4100.0000,N,02900.0000,E,38.877,77.52,091202,,,A*70")
            .unwrap()
            .unwrap();
        assert_eq!(fix.latitude, 41.0);
        assert_eq!(fix.longitude, 29.0);
        assert!((fix.speed_kmh() - 72.0).abs() < 0.01);
    }

    #[test]
    fn southern_and_western_hemispheres_are_negative() {
        let fix = parse_rmc("$GPRMC,123519,A,3351.000,S,15112.000,W,000.0,,230394,,*3C")
            .unwrap()
            .unwrap();
        assert!((fix.latitude + 33.85).abs() < 1e-9);
        assert!((fix.longitude + 151.2).abs() < 1e-9);
        assert_eq!(fix.speed_m_s, 0.0);
    }

    #[test]
    fn void_fix_yields_nothing() {
        assert_eq!(
            parse_rmc("$GPRMC,225446,V,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E*7F"),
            Ok(None)
        );
    }

    #[test]
    fn other_sentences_are_skipped() {
        let body = "GPTXT,01,01,02,ANTSTATUS=OK";
        let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(parse_rmc(&format!("${body}*{checksum:02X}")), Ok(None));
    }

    #[test]
    fn corrupted_sentences_are_rejected() {
        assert!(matches!(
            parse_rmc("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6B"),
            Err(NmeaError::ChecksumMismatch { expected: 0x6B, computed: 0x6A })
        ));
        assert_eq!(parse_rmc("GPRMC,123519*6A"), Err(NmeaError::MissingStart));
        assert_eq!(parse_rmc("$GPRMC,123519,A"), Err(NmeaError::BadChecksumField));
    }
}
