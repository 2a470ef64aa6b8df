//! Loading pin maps and timing tables from JSON.
//!
//! Uses `serde-json-core`, so a configuration blob stored in flash can be
//! parsed without allocation. Timing sections may be omitted and fall back
//! to their defaults; the pin map is required.
//!
//! ```json
//! {
//!   "pins": { "left_motor": { "pwm": 48, "dir": { "port": 3, "bit": 7 }, ... }, ... },
//!   "switches": { "debounce_ms": 30, "polarity": "active_low" }
//! }
//! ```
//!
//! Parsed configuration still has to pass
//! [`RobotConfig::validate`](crate::config::RobotConfig::validate), which
//! [`RobotCore::new`](crate::RobotCore::new) runs.

use crate::config::{PinMap, RobotConfig};
use crate::error::ConfigError;

/// Parses a bare [`PinMap`].
///
/// # Errors
///
/// [`ConfigError::Malformed`] on invalid JSON or missing fields.
pub fn parse_pin_map(json: &[u8]) -> Result<PinMap, ConfigError> {
    serde_json_core::from_slice(json)
        .map(|(map, _)| map)
        .map_err(|_| ConfigError::Malformed)
}

/// Parses a full [`RobotConfig`], defaulting any omitted timing section.
///
/// # Errors
///
/// [`ConfigError::Malformed`] on invalid JSON or a missing `pins` section.
pub fn parse_robot_config(json: &[u8]) -> Result<RobotConfig, ConfigError> {
    serde_json_core::from_slice(json)
        .map(|(config, _)| config)
        .map_err(|_| ConfigError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwitchConfig;
    use crate::hal::mega2560;
    use crate::traits::Polarity;

    fn manifest_json(buf: &mut [u8]) -> &[u8] {
        let len = serde_json_core::to_slice(&mega2560::pin_map(), buf).unwrap();
        &buf[..len]
    }

    #[test]
    fn pin_map_from_json() {
        let mut buf = [0u8; 4096];
        let json = manifest_json(&mut buf);
        assert_eq!(parse_pin_map(json), Ok(mega2560::pin_map()));
    }

    #[test]
    fn robot_config_defaults_missing_sections() {
        let mut buf = [0u8; 4096];
        let pins = manifest_json(&mut buf).to_vec();

        let mut json = b"{\"pins\":".to_vec();
        json.extend_from_slice(&pins);
        json.extend_from_slice(br#","switches":{"debounce_ms":50,"polarity":"active_high"}}"#);

        let config = parse_robot_config(&json).unwrap();
        assert_eq!(config.pins, mega2560::pin_map());
        assert_eq!(
            config.switches,
            SwitchConfig::default()
                .with_debounce_ms(50)
                .with_polarity(Polarity::ActiveHigh)
        );
        assert_eq!(config.adc, RobotConfig::new(config.pins).adc);
    }

    #[test]
    fn malformed_input_rejected() {
        assert_eq!(parse_pin_map(b"{}"), Err(ConfigError::Malformed));
        assert_eq!(parse_pin_map(b"not json"), Err(ConfigError::Malformed));
        assert_eq!(
            parse_robot_config(br#"{"switches":{"debounce_ms":5,"polarity":"active_low"}}"#),
            Err(ConfigError::Malformed)
        );

        let mut buf = [0u8; 4096];
        let json = manifest_json(&mut buf);
        assert_eq!(
            parse_pin_map(&json[..json.len() / 2]),
            Err(ConfigError::Malformed)
        );
    }
}
