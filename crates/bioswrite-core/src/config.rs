//! Engine configuration
//!
//! Timings, the default verification policy and an optional geometry
//! override. With the `std` feature the configuration can be loaded from a
//! TOML file:
//!
//! ```toml
//! verify = true
//!
//! [timing]
//! program_poll_us = 10
//! program_timeout_us = 10000
//! erase_poll_us = 10000
//! erase_timeout_us = 1000000
//!
//! [geometry]
//! capacity = "1 MiB"
//! page_size = 256
//! erase_size = "4 KiB"
//! ```

use crate::error::Result;
use crate::geometry::Geometry;

/// Status polling parameters for program and erase cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Delay between status polls while a page program is in progress
    pub program_poll_us: u32,
    /// Give up on a page program after this long
    pub program_timeout_us: u32,
    /// Delay between status polls while an erase is in progress
    pub erase_poll_us: u32,
    /// Give up on a block erase after this long
    pub erase_timeout_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        // Page program typically takes 0.7-3ms, sector erase 45-400ms
        Self {
            program_poll_us: 10,
            program_timeout_us: 10_000,
            erase_poll_us: 10_000,
            erase_timeout_us: 1_000_000,
        }
    }
}

impl Timing {
    /// Number of status polls allowed for a page program
    pub fn program_polls(&self) -> u32 {
        max_polls(self.program_poll_us, self.program_timeout_us)
    }

    /// Number of status polls allowed for a block erase
    pub fn erase_polls(&self) -> u32 {
        max_polls(self.erase_poll_us, self.erase_timeout_us)
    }
}

fn max_polls(poll_us: u32, timeout_us: u32) -> u32 {
    let polls = if poll_us > 0 {
        timeout_us / poll_us
    } else {
        timeout_us
    };
    polls.max(1)
}

/// Geometry that replaces the one derived from the JEDEC ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryOverride {
    /// Total capacity in bytes
    pub capacity: u32,
    /// Program page size in bytes
    pub page_size: u32,
    /// Erase block size in bytes
    pub erase_size: u32,
}

impl GeometryOverride {
    /// Validated geometry
    pub fn to_geometry(&self) -> Result<Geometry> {
        let geometry = Geometry {
            capacity: self.capacity,
            page_size: self.page_size,
            erase_size: self.erase_size,
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Status polling parameters
    pub timing: Timing,
    /// Verify each page after programming unless the caller says otherwise
    pub verify: bool,
    /// Use this geometry instead of resolving it from the chip ID
    pub geometry: Option<GeometryOverride>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            verify: true,
            geometry: None,
        }
    }
}

#[cfg(feature = "std")]
mod toml_file {
    use std::fs;
    use std::path::Path;
    use std::string::String;
    use std::format;

    use super::{EngineConfig, GeometryOverride, Timing};
    use crate::error::{Error, Result};

    #[derive(Debug, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlConfig {
        verify: Option<bool>,
        timing: Option<TomlTiming>,
        geometry: Option<TomlGeometry>,
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlTiming {
        program_poll_us: Option<u32>,
        program_timeout_us: Option<u32>,
        erase_poll_us: Option<u32>,
        erase_timeout_us: Option<u32>,
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlGeometry {
        #[serde(deserialize_with = "deserialize_size")]
        capacity: u32,
        #[serde(default = "default_page_size", deserialize_with = "deserialize_size")]
        page_size: u32,
        #[serde(default = "default_erase_size", deserialize_with = "deserialize_size")]
        erase_size: u32,
    }

    fn default_page_size() -> u32 {
        crate::geometry::DEFAULT_PAGE_SIZE
    }

    fn default_erase_size() -> u32 {
        crate::geometry::DEFAULT_ERASE_SIZE
    }

    /// Deserialize a size given as an integer or as a string
    fn deserialize_size<'de, D>(deserializer: D) -> core::result::Result<u32, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SizeOrInt {
            Int(u32),
            Str(String),
        }

        match SizeOrInt::deserialize(deserializer)? {
            SizeOrInt::Int(n) => Ok(n),
            SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
        }
    }

    /// Parse a size string like "16 MiB", "0x1000" or "4096"
    pub(super) fn parse_size(s: &str) -> core::result::Result<u32, String> {
        let s = s.trim();

        if let Ok(n) = s.parse::<u32>() {
            return Ok(n);
        }

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
        }

        let s_lower = s.to_lowercase();
        let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
            (n.trim(), 1024 * 1024)
        } else if let Some(n) = s_lower.strip_suffix("kib") {
            (n.trim(), 1024)
        } else if let Some(n) = s_lower.strip_suffix('b') {
            (n.trim(), 1)
        } else {
            return Err(format!("invalid size: {}", s));
        };

        let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
        num.checked_mul(multiplier)
            .ok_or_else(|| format!("size too large: {}", s))
    }

    impl EngineConfig {
        /// Load a configuration from a TOML file
        pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let content = fs::read_to_string(path).map_err(|e| {
                log::error!("cannot read config {}: {}", path.display(), e);
                Error::Config
            })?;
            Self::from_toml_str(&content)
        }

        /// Parse a configuration from a TOML string
        ///
        /// Missing keys keep their default values. A `[geometry]` table is
        /// validated immediately.
        pub fn from_toml_str(content: &str) -> Result<Self> {
            let file: TomlConfig = toml::from_str(content).map_err(|e| {
                log::error!("invalid config: {}", e);
                Error::Config
            })?;

            let mut config = EngineConfig::default();
            if let Some(verify) = file.verify {
                config.verify = verify;
            }
            if let Some(t) = file.timing {
                let d = Timing::default();
                config.timing = Timing {
                    program_poll_us: t.program_poll_us.unwrap_or(d.program_poll_us),
                    program_timeout_us: t.program_timeout_us.unwrap_or(d.program_timeout_us),
                    erase_poll_us: t.erase_poll_us.unwrap_or(d.erase_poll_us),
                    erase_timeout_us: t.erase_timeout_us.unwrap_or(d.erase_timeout_us),
                };
            }
            if let Some(g) = file.geometry {
                let geometry = GeometryOverride {
                    capacity: g.capacity,
                    page_size: g.page_size,
                    erase_size: g.erase_size,
                };
                geometry.to_geometry().map_err(|_| Error::Config)?;
                config.geometry = Some(geometry);
            }
            Ok(config)
        }
    }
}
