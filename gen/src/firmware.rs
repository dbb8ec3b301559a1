// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Firmware override records.
//!
//! A ROM set may override firmware behaviour when it is the selected set:
//! CPU frequency (per MCU family), overclock permission, the Fire voltage
//! regulator, the status LED, SWD, and the Fire serve path.  The overrides
//! serialize into a fixed 16-byte record in the image.

use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use onerom_config::fw::{FireCpuFreq, FireServeMode, FireVreg, IceCpuFreq};

use crate::{Error, PAD_METADATA_BYTE, Result};

/// Serialized length of a firmware overrides record.
pub const FIRMWARE_OVERRIDES_LEN: usize = 16;

/// Serialized length of a serve-alg params record.
pub const SERVE_PARAMS_LEN: usize = 8;

// Framing bytes the serve-alg params must carry.  The inner five bytes are
// interpreted by the on-MCU PIO runtime only and pass through verbatim.
const SERVE_PARAMS_SIG: u8 = 0xFE;
const SERVE_PARAMS_END: u8 = 0xFF;

// override_present bit positions
const PRESENT_ICE_FREQ: u8 = 1 << 0;
const PRESENT_ICE_OVERCLOCK: u8 = 1 << 1;
const PRESENT_FIRE_FREQ: u8 = 1 << 2;
const PRESENT_FIRE_OVERCLOCK: u8 = 1 << 3;
const PRESENT_FIRE_VREG: u8 = 1 << 4;
const PRESENT_LED: u8 = 1 << 5;
const PRESENT_SWD: u8 = 1 << 6;
const PRESENT_FIRE_SERVE_MODE: u8 = 1 << 7;

// override_value bit positions
const VALUE_ICE_OVERCLOCK: u8 = 1 << 0;
const VALUE_FIRE_OVERCLOCK: u8 = 1 << 1;
const VALUE_LED: u8 = 1 << 2;
const VALUE_SWD: u8 = 1 << 3;
const VALUE_FIRE_SERVE_PIO: u8 = 1 << 4;

/// Top level firmware overrides structure
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FirmwareConfig {
    /// Optional Ice specific configuration
    pub ice: Option<IceConfig>,

    /// Optional Fire specific configuration
    pub fire: Option<FireConfig>,

    /// Optional LED configuration
    pub led: Option<LedConfig>,

    /// Optional debug configuration
    pub swd: Option<DebugConfig>,
}

/// Ice configuration structure
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct IceConfig {
    /// CPU frequency in MHz, or "Stock"
    pub cpu_freq: Option<IceCpuFreq>,

    /// Whether overclocking is permitted
    #[serde(default)]
    pub overclock: Option<bool>,
}

/// Fire configuration structure
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FireConfig {
    /// CPU frequency in MHz, or "Stock"
    pub cpu_freq: Option<FireCpuFreq>,

    /// Whether overclocking is permitted
    #[serde(default)]
    pub overclock: Option<bool>,

    /// Optional Vreg output voltage setting for RP2350 MCUs
    #[serde(default)]
    pub vreg: Option<FireVreg>,

    /// Optional PIO/CPU serve path override
    pub serve_mode: Option<FireServeMode>,
}

/// LED configuration structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct LedConfig {
    /// Whether the status LED is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Debug configuration structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct DebugConfig {
    /// Whether the SWD debug interface is enabled
    #[serde(default = "default_true")]
    pub swd_enabled: bool,
}

/// Low-level serving algorithm parameters.
///
/// The 8-byte vector passes through to the image verbatim; only the
/// framing is checked (bytes 0 and 6 must be 0xFE, byte 7 must be 0xFF).
/// The inner bytes belong to the on-MCU PIO runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct ServeAlgParams {
    pub params: Vec<u8>,
}

impl ServeAlgParams {
    /// Checks structural framing without interpreting the payload.
    pub fn validate(&self) -> Result<()> {
        if self.params.len() != SERVE_PARAMS_LEN {
            return Err(Error::InvalidServeParams {
                error: format!(
                    "params must be exactly {} bytes, found {}",
                    SERVE_PARAMS_LEN,
                    self.params.len()
                ),
            });
        }
        if self.params[0] != SERVE_PARAMS_SIG || self.params[6] != SERVE_PARAMS_SIG {
            return Err(Error::InvalidServeParams {
                error: "bytes 0 and 6 must be 0xFE".to_string(),
            });
        }
        if self.params[7] != SERVE_PARAMS_END {
            return Err(Error::InvalidServeParams {
                error: "byte 7 must be 0xFF".to_string(),
            });
        }
        Ok(())
    }
}

impl FirmwareConfig {
    /// True when no override is actually present.
    pub fn is_empty(&self) -> bool {
        self.ice.is_none() && self.fire.is_none() && self.led.is_none() && self.swd.is_none()
    }

    /// Serialize into the 16-byte overrides record.
    pub fn write_record(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < FIRMWARE_OVERRIDES_LEN {
            return Err(Error::BufferTooSmall {
                location: "FirmwareConfig::write_record",
                expected: FIRMWARE_OVERRIDES_LEN,
                actual: buf.len(),
            });
        }

        let mut present = 0u8;
        let mut value = 0u8;

        if let Some(ref ice) = self.ice {
            if ice.cpu_freq.is_some() {
                present |= PRESENT_ICE_FREQ;
            }
            if let Some(overclock) = ice.overclock {
                present |= PRESENT_ICE_OVERCLOCK;
                if overclock {
                    value |= VALUE_ICE_OVERCLOCK;
                }
            }
        }

        if let Some(ref fire) = self.fire {
            if fire.cpu_freq.is_some() {
                present |= PRESENT_FIRE_FREQ;
            }
            if let Some(overclock) = fire.overclock {
                present |= PRESENT_FIRE_OVERCLOCK;
                if overclock {
                    value |= VALUE_FIRE_OVERCLOCK;
                }
            }
            if fire.vreg.is_some() {
                present |= PRESENT_FIRE_VREG;
            }
            if let Some(ref serve_mode) = fire.serve_mode {
                present |= PRESENT_FIRE_SERVE_MODE;
                if *serve_mode == FireServeMode::Pio {
                    value |= VALUE_FIRE_SERVE_PIO;
                }
            }
        }

        if let Some(ref led) = self.led {
            present |= PRESENT_LED;
            if led.enabled {
                value |= VALUE_LED;
            }
        }

        if let Some(ref swd) = self.swd {
            present |= PRESENT_SWD;
            if swd.swd_enabled {
                value |= VALUE_SWD;
            }
        }

        buf[0] = present;
        buf[1] = value;

        let ice_freq = self
            .ice
            .as_ref()
            .and_then(|c| c.cpu_freq)
            .map(|f| f.get())
            .unwrap_or(IceCpuFreq::STOCK);
        buf[2..4].copy_from_slice(&ice_freq.to_le_bytes());

        let fire_freq = self
            .fire
            .as_ref()
            .and_then(|c| c.cpu_freq)
            .map(|f| f.get())
            .unwrap_or(FireCpuFreq::STOCK);
        buf[4..6].copy_from_slice(&fire_freq.to_le_bytes());

        buf[6] = self
            .fire
            .as_ref()
            .and_then(|c| c.vreg)
            .map(|v| v as u8)
            .unwrap_or(FireVreg::Stock as u8);

        buf[7..FIRMWARE_OVERRIDES_LEN].fill(PAD_METADATA_BYTE);

        Ok(FIRMWARE_OVERRIDES_LEN)
    }

    /// Deserialize a 16-byte overrides record.
    pub fn from_record(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIRMWARE_OVERRIDES_LEN {
            return Err(Error::BufferTooSmall {
                location: "FirmwareConfig::from_record",
                expected: FIRMWARE_OVERRIDES_LEN,
                actual: buf.len(),
            });
        }

        let present = buf[0];
        let value = buf[1];
        let ice_freq = u16::from_le_bytes([buf[2], buf[3]]);
        let fire_freq = u16::from_le_bytes([buf[4], buf[5]]);
        let fire_vreg = buf[6];

        let ice = if present & (PRESENT_ICE_FREQ | PRESENT_ICE_OVERCLOCK) != 0 {
            let mut ice = IceConfig::default();
            if present & PRESENT_ICE_FREQ != 0 {
                ice.cpu_freq = Some(ice_freq.try_into().map_err(|_| Error::InvalidConfig {
                    error: format!("Invalid ice_freq: {}", ice_freq),
                })?);
            }
            if present & PRESENT_ICE_OVERCLOCK != 0 {
                ice.overclock = Some(value & VALUE_ICE_OVERCLOCK != 0);
            }
            Some(ice)
        } else {
            None
        };

        let fire = if present
            & (PRESENT_FIRE_FREQ
                | PRESENT_FIRE_OVERCLOCK
                | PRESENT_FIRE_VREG
                | PRESENT_FIRE_SERVE_MODE)
            != 0
        {
            let mut fire = FireConfig::default();
            if present & PRESENT_FIRE_FREQ != 0 {
                fire.cpu_freq = Some(fire_freq.try_into().map_err(|_| Error::InvalidConfig {
                    error: format!("Invalid fire_freq: {}", fire_freq),
                })?);
            }
            if present & PRESENT_FIRE_OVERCLOCK != 0 {
                fire.overclock = Some(value & VALUE_FIRE_OVERCLOCK != 0);
            }
            if present & PRESENT_FIRE_VREG != 0 {
                fire.vreg = Some(fire_vreg.try_into().map_err(|_| Error::InvalidConfig {
                    error: format!("Invalid fire_vreg: {:#04X}", fire_vreg),
                })?);
            }
            if present & PRESENT_FIRE_SERVE_MODE != 0 {
                fire.serve_mode = Some(if value & VALUE_FIRE_SERVE_PIO != 0 {
                    FireServeMode::Pio
                } else {
                    FireServeMode::Cpu
                });
            }
            Some(fire)
        } else {
            None
        };

        let led = (present & PRESENT_LED != 0).then(|| LedConfig {
            enabled: value & VALUE_LED != 0,
        });

        let swd = (present & PRESENT_SWD != 0).then(|| DebugConfig {
            swd_enabled: value & VALUE_SWD != 0,
        });

        Ok(FirmwareConfig {
            ice,
            fire,
            led,
            swd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_overrides_record_round_trip() {
        let config = FirmwareConfig {
            ice: None,
            fire: Some(FireConfig {
                cpu_freq: Some(FireCpuFreq::mhz(300).unwrap()),
                overclock: Some(true),
                vreg: Some(FireVreg::V1_20),
                serve_mode: None,
            }),
            led: None,
            swd: None,
        };

        let mut buf = [0u8; FIRMWARE_OVERRIDES_LEN];
        assert_eq!(config.write_record(&mut buf).unwrap(), 16);

        // Fire freq, overclock and vreg present: bits 2, 3, 4
        assert_eq!(buf[0], 0b0001_1100);
        // Fire overclock enabled: bit 1
        assert_eq!(buf[1], 0b0000_0010);
        assert_eq!(u16::from_le_bytes([buf[4], buf[5]]), 300);
        assert_eq!(buf[6], 0x0D);
        // Ice freq absent: stock sentinel
        assert_eq!(u16::from_le_bytes([buf[2], buf[3]]), 0xFFFF);

        let parsed = FirmwareConfig::from_record(&buf).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_overrides_all_fields() {
        let config = FirmwareConfig {
            ice: Some(IceConfig {
                cpu_freq: Some(IceCpuFreq::mhz(100).unwrap()),
                overclock: Some(false),
            }),
            fire: Some(FireConfig {
                cpu_freq: None,
                overclock: None,
                vreg: None,
                serve_mode: Some(FireServeMode::Pio),
            }),
            led: Some(LedConfig { enabled: false }),
            swd: Some(DebugConfig { swd_enabled: true }),
        };

        let mut buf = [0u8; FIRMWARE_OVERRIDES_LEN];
        config.write_record(&mut buf).unwrap();
        let parsed = FirmwareConfig::from_record(&buf).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_serve_params_framing() {
        let good = ServeAlgParams {
            params: vec![0xFE, 1, 2, 3, 4, 5, 0xFE, 0xFF],
        };
        assert!(good.validate().is_ok());

        let bad_sig = ServeAlgParams {
            params: vec![0x00, 1, 2, 3, 4, 5, 0xFE, 0xFF],
        };
        assert!(bad_sig.validate().is_err());

        let bad_end = ServeAlgParams {
            params: vec![0xFE, 1, 2, 3, 4, 5, 0xFE, 0x00],
        };
        assert!(bad_end.validate().is_err());

        let bad_len = ServeAlgParams {
            params: vec![0xFE, 0xFE, 0xFF],
        };
        assert!(bad_len.validate().is_err());
    }
}
