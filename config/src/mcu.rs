// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MCU family data.  One ROM ships on two families: STM32F4 ("Ice") and
//! RP2350 ("Fire").

use alloc::string::String;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum Family {
    Stm32f4,
    Rp2350,
}

impl Family {
    const MAX_STM_PIN_NUM: u8 = 15;
    const MAX_STM_DATA_PIN_NUM: u8 = 7;
    const MAX_RP2350_PIN_NUM: u8 = 29;
    const MAX_RP2350_DATA_PIN_NUM: u8 = 23; // 3rd byte of the GPIO word

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "f4" | "stm32f4" | "ice" => Some(Family::Stm32f4),
            "rp2350" | "fire" => Some(Family::Rp2350),
            _ => None,
        }
    }

    pub fn valid_pin_num(&self, pin: u8) -> bool {
        match self {
            Family::Stm32f4 => pin <= Self::MAX_STM_PIN_NUM,
            Family::Rp2350 => pin <= Self::MAX_RP2350_PIN_NUM,
        }
    }

    /// Highest GPIO a data line may sit on.  The RP2350 port write is an
    /// 8-bit store, so data stays within the first three bytes of the
    /// GPIO word.
    pub fn max_valid_data_pin(&self) -> u8 {
        match self {
            Family::Stm32f4 => Self::MAX_STM_DATA_PIN_NUM,
            Family::Rp2350 => Self::MAX_RP2350_DATA_PIN_NUM,
        }
    }

    /// Default flash capacity for the family's stock part, in bytes.
    ///
    /// Ice boards ship an STM32F401RE (512KB); Fire boards an RP2350A with
    /// 2MB of QSPI flash.
    pub fn default_flash_bytes(&self) -> usize {
        match self {
            Family::Stm32f4 => 512 * 1024,
            Family::Rp2350 => 2 * 1024 * 1024,
        }
    }

    /// Rated (non-overclocked) maximum system clock, MHz.
    pub fn rated_max_mhz(&self) -> u16 {
        match self {
            Family::Stm32f4 => 180,
            Family::Rp2350 => 150,
        }
    }

    /// Absolute maximum system clock with overclocking permitted, MHz.
    pub fn absolute_max_mhz(&self) -> u16 {
        match self {
            Family::Stm32f4 => 450,
            Family::Rp2350 => 800,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Stm32f4 => write!(f, "F4"),
            Family::Rp2350 => write!(f, "RP2350"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Family {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Family::try_from_str(&s).ok_or_else(|| {
            serde::de::Error::custom(alloc::format!(
                "Invalid MCU family: {}, must be f4 or rp2350",
                s
            ))
        })
    }
}
