use crate::error::{Result, VidsubError};

/// Format time in seconds to SRT time format (HH:MM:SS,mmm).
///
/// Hours, minutes and seconds come from the whole seconds; hours are
/// zero-padded to two digits but never wrap, so a 100 hour offset renders
/// as `100:00:00,000`. Milliseconds are the original fraction rounded to
/// the nearest millisecond, modulo 1000, so the clock fields never move.
/// Negative and non-finite input encodes as zero.
pub fn format_timestamp(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00:00,000".to_string();
    }

    let whole = seconds.floor();
    let total_secs = whole as u64;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let millis = ((seconds - whole) * 1000.0).round() as u64 % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT time code (`HH:MM:SS,mmm`) back into seconds.
///
/// A `.` millisecond separator is accepted as well, since some tools emit it.
pub fn parse_timestamp(value: &str) -> Result<f64> {
    let value = value.trim();
    let invalid = || VidsubError::Subtitle(format!("Invalid time code '{}'", value));

    let (clock, millis) = value
        .split_once(',')
        .or_else(|| value.rsplit_once('.'))
        .ok_or_else(invalid)?;

    let mut parts = clock.split(':');
    let hours: u64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let minutes: u64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let secs: u64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    if parts.next().is_some() || minutes > 59 || secs > 59 {
        return Err(invalid());
    }

    if millis.is_empty() || millis.len() > 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // "5" after the separator means 500 ms, not 5 ms
    let millis: u64 = format!("{:0<3}", millis).parse().map_err(|_| invalid())?;

    let total_millis = ((hours * 60 + minutes) * 60 + secs) * 1000 + millis;
    Ok(total_millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_time_code(code: &str) -> (u64, u64, u64, u64) {
        let (clock, millis) = code.split_once(',').unwrap();
        let parts: Vec<u64> = clock.split(':').map(|p| p.parse().unwrap()).collect();
        assert_eq!(millis.len(), 3, "milliseconds must be three digits in {}", code);
        (parts[0], parts[1], parts[2], millis.parse().unwrap())
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(65.123), "00:01:05,123");
        assert_eq!(format_timestamp(3661.500), "01:01:01,500");
        assert_eq!(format_timestamp(1.2), "00:00:01,200");
        assert_eq!(format_timestamp(3.005), "00:00:03,005");
    }

    #[test]
    fn milliseconds_are_rounded_not_truncated() {
        assert_eq!(format_timestamp(3725.4567), "01:02:05,457");
        assert_eq!(format_timestamp(0.0004), "00:00:00,000");
        assert_eq!(format_timestamp(0.0005), "00:00:00,001");
    }

    #[test]
    fn rounding_up_to_a_full_second_wraps_milliseconds_only() {
        assert_eq!(format_timestamp(59.9996), "00:00:59,000");
        assert_eq!(format_timestamp(3599.9999), "00:59:59,000");
        assert_eq!(format_timestamp(3599.9994), "00:59:59,999");
    }

    #[test]
    fn hours_do_not_wrap() {
        assert_eq!(format_timestamp(100.0 * 3600.0), "100:00:00,000");
        assert_eq!(format_timestamp(99.0 * 3600.0 + 59.0 * 60.0 + 59.25), "99:59:59,250");
    }

    #[test]
    fn degenerate_input_encodes_as_zero() {
        assert_eq!(format_timestamp(-1.5), "00:00:00,000");
        assert_eq!(format_timestamp(f64::NAN), "00:00:00,000");
        assert_eq!(format_timestamp(f64::INFINITY), "00:00:00,000");
    }

    #[test]
    fn first_hour_stays_in_range() {
        let mut s = 0.0;
        while s < 3600.0 {
            let code = format_timestamp(s);
            let (hours, minutes, secs, millis) = split_time_code(&code);
            assert_eq!(hours, 0, "{} -> {}", s, code);
            assert!(minutes <= 59, "{} -> {}", s, code);
            assert!(secs <= 59, "{} -> {}", s, code);
            assert!(millis <= 999, "{} -> {}", s, code);
            assert!(code.starts_with("00:"));
            s += 0.731;
        }
    }

    #[test]
    fn last_moments_of_the_first_hour_stay_in_range() {
        for s in [3599.5, 3599.9, 3599.9994, 3599.9995, 3599.9996, 3599.9999, 3599.99999] {
            let code = format_timestamp(s);
            let (hours, minutes, secs, millis) = split_time_code(&code);
            assert!(code.starts_with("00:"), "{} -> {}", s, code);
            assert_eq!((hours, minutes, secs), (0, 59, 59), "{} -> {}", s, code);
            assert!(millis <= 999, "{} -> {}", s, code);
        }
    }

    #[test]
    fn parses_time_codes() {
        assert_eq!(parse_timestamp("00:00:01,200").unwrap(), 1.2);
        assert_eq!(parse_timestamp("01:02:05,457").unwrap(), 3725.457);
        assert_eq!(parse_timestamp("00:00:03.005").unwrap(), 3.005);
        assert_eq!(parse_timestamp("100:00:00,000").unwrap(), 360000.0);
        assert_eq!(parse_timestamp("00:00:02,5").unwrap(), 2.5);
    }

    #[test]
    fn rejects_malformed_time_codes() {
        for bad in ["", "00:00:01", "00:61:00,000", "aa:00:00,000", "00:00:00,1234", "0:0:0:0,000"] {
            assert!(parse_timestamp(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
