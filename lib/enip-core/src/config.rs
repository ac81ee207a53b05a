//! Configuration loaded once at startup and handed to `Endpoint::new`. Mirrors the
//! source's compile-time `OPENER_NUMBER_OF_SUPPORTED_SESSIONS` and friends as runtime,
//! `serdeconv`-loaded TOML fields instead, so a build doesn't need to be recompiled to
//! retune them.

use serde_derive::Deserialize;

use enip_support::error::{EnipError, EnipResult};

use crate::net::identity::DeviceIdentity;

/// Top level configuration: device identity plus the endpoint's tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub device: DeviceIdentity,
    /// Device's IPv4 address, dotted-quad, used to fill the ListIdentity sockaddr item.
    pub device_ip: String,
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

/// Tunables for the session table, delayed-reply queue, tick cadence, and CPF leniency.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,
    #[serde(default = "default_delayed_reply_capacity")]
    pub delayed_reply_capacity: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,
    /// Reject CPF length mismatches even when more than two items were declared. See the
    /// open-question note in DESIGN.md. Default false, matching the source's lenient
    /// behavior.
    #[serde(default)]
    pub strict_cpf: bool,
}

fn default_session_capacity() -> usize {
    20
}

fn default_delayed_reply_capacity() -> usize {
    2
}

fn default_tick_interval_ms() -> u32 {
    10
}

impl Default for EndpointConfig {
    fn default() -> EndpointConfig {
        EndpointConfig {
            session_capacity: default_session_capacity(),
            delayed_reply_capacity: default_delayed_reply_capacity(),
            tick_interval_ms: default_tick_interval_ms(),
            strict_cpf: false,
        }
    }
}

impl DeviceConfig {
    pub fn load(path: &str) -> EnipResult<DeviceConfig> {
        serdeconv::from_toml_file(path).map_err(|_| EnipError::Io(std::io::ErrorKind::InvalidData))
    }

    /// Parses `device_ip` into its big-endian u32 wire representation.
    pub fn device_ip_u32(&self) -> EnipResult<u32> {
        let octets: Vec<u8> = self
            .device_ip
            .split('.')
            .map(str::parse::<u8>)
            .collect::<Result<_, _>>()
            .map_err(|_| EnipError::Io(std::io::ErrorKind::InvalidData))?;

        if octets.len() != 4 {
            return Err(EnipError::Io(std::io::ErrorKind::InvalidData));
        }

        Ok(u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_match_the_documented_values() {
        let config = EndpointConfig::default();
        assert_eq!(config.session_capacity, 20);
        assert_eq!(config.delayed_reply_capacity, 2);
        assert_eq!(config.tick_interval_ms, 10);
        assert!(!config.strict_cpf);
    }

    #[test]
    fn device_ip_parses_dotted_quad_into_big_endian_u32() {
        let config = DeviceConfig {
            device: DeviceIdentity {
                vendor_id: 1,
                device_type: 1,
                product_code: 1,
                revision_major: 1,
                revision_minor: 0,
                status_word: 0,
                serial_number: 1,
                product_name: "opener".into(),
                state: 0xFF,
            },
            device_ip: "192.168.1.10".into(),
            endpoint: EndpointConfig::default(),
        };

        assert_eq!(config.device_ip_u32().unwrap(), 0xC0A8_010A);
    }

    #[test]
    fn device_ip_rejects_malformed_addresses() {
        let config = DeviceConfig {
            device: DeviceIdentity {
                vendor_id: 1,
                device_type: 1,
                product_code: 1,
                revision_major: 1,
                revision_minor: 0,
                status_word: 0,
                serial_number: 1,
                product_name: "opener".into(),
                state: 0xFF,
            },
            device_ip: "not-an-ip".into(),
            endpoint: EndpointConfig::default(),
        };

        assert!(config.device_ip_u32().is_err());
    }
}
