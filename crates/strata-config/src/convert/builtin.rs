//! Built-in converters.

use super::{from_str, Converters, BUILTIN_PRIORITY};
use crate::error::ConversionError;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

macro_rules! parse_converters {
    ($converters:expr, $($ty:ty),+ $(,)?) => {
        $( $converters.register::<$ty, _>(BUILTIN_PRIORITY, from_str::<$ty>()); )+
    };
}

pub(super) fn register(converters: &mut Converters) {
    converters.register::<String, _>(BUILTIN_PRIORITY, convert_string);
    converters.register::<bool, _>(BUILTIN_PRIORITY, convert_bool);
    converters.register::<char, _>(BUILTIN_PRIORITY, convert_char);
    converters.register::<Duration, _>(BUILTIN_PRIORITY, convert_duration);
    converters.register::<PathBuf, _>(BUILTIN_PRIORITY, convert_path);

    parse_converters!(
        converters, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
        IpAddr, SocketAddr,
    );
}

fn convert_string(value: &str) -> Result<Option<String>, ConversionError> {
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn convert_path(value: &str) -> Result<Option<PathBuf>, ConversionError> {
    Ok((!value.is_empty()).then(|| PathBuf::from(value)))
}

fn convert_bool(value: &str) -> Result<Option<bool>, ConversionError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "n" | "off" => Ok(Some(false)),
        _ => Err(ConversionError::new(format!(
            "Cannot convert \"{}\" to bool",
            value
        ))),
    }
}

fn convert_char(value: &str) -> Result<Option<char>, ConversionError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(ConversionError::new(format!(
            "\"{}\" is not a single character",
            value
        ))),
    }
}

/// Plain numbers are seconds; `ms`, `s`, `m`, `h` and `d` suffixes select the unit.
fn convert_duration(value: &str) -> Result<Option<Duration>, ConversionError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let (digits, unit_ms) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = value.strip_suffix('d') {
        (n, 86_400_000)
    } else {
        (value, 1_000)
    };

    let amount: u64 = digits.trim().parse().map_err(|e| {
        ConversionError::with_cause(format!("Cannot convert \"{}\" to a duration", value), e)
    })?;
    let millis = amount.checked_mul(unit_ms).ok_or_else(|| {
        ConversionError::new(format!("Duration \"{}\" is out of range", value))
    })?;
    Ok(Some(Duration::from_millis(millis)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_paths() {
        let converters = Converters::new();
        assert_eq!(converters.convert::<String>("k", " a ").unwrap(), " a ");
        assert_eq!(converters.convert_optional::<String>("k", "").unwrap(), None);
        assert_eq!(
            converters.convert::<PathBuf>("k", "/tmp/x").unwrap(),
            PathBuf::from("/tmp/x")
        );
    }

    #[test]
    fn booleans() {
        let converters = Converters::new();
        for raw in ["true", "TRUE", "1", "yes", "Y", "on"] {
            assert!(converters.convert::<bool>("k", raw).unwrap(), "{}", raw);
        }
        for raw in ["false", "0", "no", "N", "OFF"] {
            assert!(!converters.convert::<bool>("k", raw).unwrap(), "{}", raw);
        }
        assert!(converters.convert::<bool>("k", "maybe").is_err());
    }

    #[test]
    fn numbers_trim_and_reject_garbage() {
        let converters = Converters::new();
        assert_eq!(converters.convert::<u16>("k", " 8080 ").unwrap(), 8080);
        assert_eq!(converters.convert::<i64>("k", "-5").unwrap(), -5);
        assert_eq!(converters.convert::<f64>("k", "1.5").unwrap(), 1.5);
        assert!(converters.convert::<u8>("k", "300").is_err());
        assert_eq!(converters.convert_optional::<u32>("k", "  ").unwrap(), None);
    }

    #[test]
    fn durations() {
        let converters = Converters::new();
        assert_eq!(converters.convert::<Duration>("k", "30").unwrap(), Duration::from_secs(30));
        assert_eq!(converters.convert::<Duration>("k", "250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(converters.convert::<Duration>("k", "5m").unwrap(), Duration::from_secs(300));
        assert_eq!(converters.convert::<Duration>("k", "2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(converters.convert::<Duration>("k", "1d").unwrap(), Duration::from_secs(86400));
        assert!(converters.convert::<Duration>("k", "soon").is_err());
    }

    #[test]
    fn chars_and_addresses() {
        let converters = Converters::new();
        assert_eq!(converters.convert::<char>("k", "x").unwrap(), 'x');
        assert!(converters.convert::<char>("k", "xy").is_err());
        assert_eq!(
            converters.convert::<SocketAddr>("k", "127.0.0.1:80").unwrap(),
            "127.0.0.1:80".parse::<SocketAddr>().unwrap()
        );
        assert!(converters.convert::<IpAddr>("k", "::1").is_ok());
    }
}
