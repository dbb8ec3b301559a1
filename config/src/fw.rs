// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Firmware override value types.
//!
//! These are the closed vocabularies a ROM set's `firmware_overrides`
//! config may use: CPU frequencies for both MCU families, the Fire voltage
//! regulator codes, and the Fire serve mode.  All of them serialize to the
//! forms the JSON config document uses.

use alloc::format;
use core::fmt;

/// How a ROM set is served - persisted in each ROM set record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum ServeMode {
    /// Single chip - the default
    #[default]
    Single,

    /// Set of multiple chips selected by CS lines.  Allows a single One ROM
    /// to serve up to 3 sockets simultaneously.
    MultiAnyCs,

    /// Set of dynamically banked chips, switched via the X jumpers.
    BankSwitched,
}

impl ServeMode {
    pub fn wire_value(&self) -> u8 {
        match self {
            ServeMode::Single => 0,
            ServeMode::MultiAnyCs => 1,
            ServeMode::BankSwitched => 2,
        }
    }

    pub fn try_from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(ServeMode::Single),
            1 => Some(ServeMode::MultiAnyCs),
            2 => Some(ServeMode::BankSwitched),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServeMode::Single => "single",
            ServeMode::MultiAnyCs => "multi_any_cs",
            ServeMode::BankSwitched => "bank_switched",
        }
    }
}

impl fmt::Display for ServeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fire serve mode override - CPU loop or PIO state machines.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum FireServeMode {
    /// PIO mode
    Pio,
    /// CPU mode
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFreq(pub u16);

impl fmt::Display for InvalidFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid frequency: {}MHz", self.0)
    }
}

macro_rules! cpu_freq {
    ($name:ident, $min:expr, $max:expr) => {
        /// CPU frequency code.  0 = none, 0xFFFF = stock, otherwise MHz.
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
        pub struct $name(u16);

        impl $name {
            pub const NONE: u16 = 0;
            pub const STOCK: u16 = 0xFFFF;
            pub const MIN_MHZ: u16 = $min;
            pub const MAX_MHZ: u16 = $max;

            pub fn none() -> Self {
                Self(Self::NONE)
            }

            pub fn stock() -> Self {
                Self(Self::STOCK)
            }

            pub fn mhz(freq: u16) -> Result<Self, InvalidFreq> {
                if (Self::MIN_MHZ..=Self::MAX_MHZ).contains(&freq) {
                    Ok(Self(freq))
                } else {
                    Err(InvalidFreq(freq))
                }
            }

            pub fn is_none(&self) -> bool {
                self.0 == Self::NONE
            }

            pub fn is_stock(&self) -> bool {
                self.0 == Self::STOCK
            }

            pub fn get(&self) -> u16 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::stock()
            }
        }

        impl TryFrom<u16> for $name {
            type Error = InvalidFreq;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    Self::NONE => Ok(Self::none()),
                    Self::STOCK => Ok(Self::stock()),
                    freq if (Self::MIN_MHZ..=Self::MAX_MHZ).contains(&freq) => Ok(Self(freq)),
                    _ => Err(InvalidFreq(value)),
                }
            }
        }

        impl From<$name> for u16 {
            fn from(freq: $name) -> u16 {
                freq.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                match self.0 {
                    Self::NONE => serializer.serialize_str("None"),
                    Self::STOCK => serializer.serialize_str("Stock"),
                    freq => serializer.serialize_u16(freq),
                }
            }
        }

        // The config document gives frequencies as an integer MHz value or
        // the string "Stock".
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                struct FreqVisitor;

                impl<'de> serde::de::Visitor<'de> for FreqVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(
                            f,
                            "an integer frequency in MHz ({}-{}) or \"Stock\"",
                            $name::MIN_MHZ,
                            $name::MAX_MHZ
                        )
                    }

                    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        let freq = u16::try_from(value)
                            .map_err(|_| E::custom(format!("Frequency out of range: {}", value)))?;
                        $name::mhz(freq).map_err(|e| E::custom(format!("{}", e)))
                    }

                    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        if value < 0 {
                            return Err(E::custom(format!("Frequency out of range: {}", value)));
                        }
                        self.visit_u64(value as u64)
                    }

                    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        match value {
                            "Stock" => Ok($name::stock()),
                            "None" => Ok($name::none()),
                            _ => Err(E::custom(format!(
                                "Invalid frequency: {} (integer MHz or \"Stock\")",
                                value
                            ))),
                        }
                    }
                }

                deserializer.deserialize_any(FreqVisitor)
            }
        }
    };
}

cpu_freq!(IceCpuFreq, 1, 450);
cpu_freq!(FireCpuFreq, 16, 800);

/// Voltage regulator setting for RP2350 MCUs
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum FireVreg {
    #[serde(rename = "0.55V")]
    V0_55 = 0x00,
    #[serde(rename = "0.60V")]
    V0_60 = 0x01,
    #[serde(rename = "0.65V")]
    V0_65 = 0x02,
    #[serde(rename = "0.70V")]
    V0_70 = 0x03,
    #[serde(rename = "0.75V")]
    V0_75 = 0x04,
    #[serde(rename = "0.80V")]
    V0_80 = 0x05,
    #[serde(rename = "0.85V")]
    V0_85 = 0x06,
    #[serde(rename = "0.90V")]
    V0_90 = 0x07,
    #[serde(rename = "0.95V")]
    V0_95 = 0x08,
    #[serde(rename = "1.00V")]
    V1_00 = 0x09,
    #[serde(rename = "1.05V")]
    V1_05 = 0x0A,
    #[serde(rename = "1.10V")]
    V1_10 = 0x0B,
    #[serde(rename = "1.15V")]
    V1_15 = 0x0C,
    #[serde(rename = "1.20V")]
    V1_20 = 0x0D,
    #[serde(rename = "1.25V")]
    V1_25 = 0x0E,
    #[serde(rename = "1.30V")]
    V1_30 = 0x0F,
    #[serde(rename = "1.35V")]
    V1_35 = 0x10,
    #[serde(rename = "1.40V")]
    V1_40 = 0x11,
    #[serde(rename = "1.50V")]
    V1_50 = 0x12,
    #[serde(rename = "1.60V")]
    V1_60 = 0x13,
    #[serde(rename = "1.65V")]
    V1_65 = 0x14,
    #[serde(rename = "1.70V")]
    V1_70 = 0x15,
    #[serde(rename = "1.80V")]
    V1_80 = 0x16,
    #[serde(rename = "1.90V")]
    V1_90 = 0x17,
    #[serde(rename = "2.00V")]
    V2_00 = 0x18,
    #[serde(rename = "2.35V")]
    V2_35 = 0x19,
    #[serde(rename = "2.50V")]
    V2_50 = 0x1A,
    #[serde(rename = "2.65V")]
    V2_65 = 0x1B,
    #[serde(rename = "2.80V")]
    V2_80 = 0x1C,
    #[serde(rename = "3.00V")]
    V3_00 = 0x1D,
    #[serde(rename = "3.15V")]
    V3_15 = 0x1E,
    #[serde(rename = "3.30V")]
    V3_30 = 0x1F,
    #[default]
    Stock = 0xFF,
}

impl TryFrom<u8> for FireVreg {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::V0_55),
            0x01 => Ok(Self::V0_60),
            0x02 => Ok(Self::V0_65),
            0x03 => Ok(Self::V0_70),
            0x04 => Ok(Self::V0_75),
            0x05 => Ok(Self::V0_80),
            0x06 => Ok(Self::V0_85),
            0x07 => Ok(Self::V0_90),
            0x08 => Ok(Self::V0_95),
            0x09 => Ok(Self::V1_00),
            0x0A => Ok(Self::V1_05),
            0x0B => Ok(Self::V1_10),
            0x0C => Ok(Self::V1_15),
            0x0D => Ok(Self::V1_20),
            0x0E => Ok(Self::V1_25),
            0x0F => Ok(Self::V1_30),
            0x10 => Ok(Self::V1_35),
            0x11 => Ok(Self::V1_40),
            0x12 => Ok(Self::V1_50),
            0x13 => Ok(Self::V1_60),
            0x14 => Ok(Self::V1_65),
            0x15 => Ok(Self::V1_70),
            0x16 => Ok(Self::V1_80),
            0x17 => Ok(Self::V1_90),
            0x18 => Ok(Self::V2_00),
            0x19 => Ok(Self::V2_35),
            0x1A => Ok(Self::V2_50),
            0x1B => Ok(Self::V2_65),
            0x1C => Ok(Self::V2_80),
            0x1D => Ok(Self::V3_00),
            0x1E => Ok(Self::V3_15),
            0x1F => Ok(Self::V3_30),
            0xFF => Ok(Self::Stock),
            _ => Err(value),
        }
    }
}
