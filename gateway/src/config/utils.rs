use std::env;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset.
pub(super) fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when the variable is unset and an error naming the key
/// when it is set but does not parse.
pub(super) fn env_parse<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}").into()),
        None => Ok(None),
    }
}

/// Read a boolean environment variable.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case.
pub(super) fn env_bool(key: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_string(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {key} value '{raw}': expected a boolean").into()),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_env_parse() {
        unsafe {
            env::set_var("SV_UTILS_TEST_NUM", "42");
            env::set_var("SV_UTILS_TEST_BAD", "forty-two");
            env::set_var("SV_UTILS_TEST_EMPTY", "  ");
        }

        assert_eq!(env_parse::<u32>("SV_UTILS_TEST_NUM").unwrap(), Some(42));
        assert_eq!(env_parse::<u32>("SV_UTILS_TEST_EMPTY").unwrap(), None);
        assert_eq!(env_parse::<u32>("SV_UTILS_TEST_UNSET").unwrap(), None);

        let err = env_parse::<u32>("SV_UTILS_TEST_BAD").unwrap_err();
        assert!(err.to_string().contains("SV_UTILS_TEST_BAD"));

        unsafe {
            env::remove_var("SV_UTILS_TEST_NUM");
            env::remove_var("SV_UTILS_TEST_BAD");
            env::remove_var("SV_UTILS_TEST_EMPTY");
        }
    }

    #[test]
    #[serial]
    fn test_env_bool() {
        unsafe {
            env::set_var("SV_UTILS_TEST_FLAG", "no");
            env::set_var("SV_UTILS_TEST_FLAG_BAD", "sometimes");
        }

        assert_eq!(env_bool("SV_UTILS_TEST_FLAG").unwrap(), Some(false));
        assert!(env_bool("SV_UTILS_TEST_FLAG_BAD").is_err());

        unsafe {
            env::remove_var("SV_UTILS_TEST_FLAG");
            env::remove_var("SV_UTILS_TEST_FLAG_BAD");
        }
    }
}
