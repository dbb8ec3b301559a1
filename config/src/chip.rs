// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The chip catalog - every ROM/RAM type One ROM can stand in for.
//!
//! This is the single source of truth for which control lines exist on a
//! given chip and what their active polarity means.  The mangler is
//! polymorphic over this data; nothing else in the workspace hard-codes
//! per-chip behaviour.

use alloc::format;
use alloc::string::String;
use core::fmt;

/// Supported chip types.
///
/// Wire values (used in metadata and shared with the firmware's
/// `rom_type_t`) are fixed - see [`ChipType::wire_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum ChipType {
    Chip2316,
    Chip2332,
    Chip2364,
    Chip23128,
    Chip23256,
    Chip23512,
    Chip2704,
    Chip2708,
    Chip2716,
    Chip2732,
    Chip2764,
    Chip27128,
    Chip27256,
    Chip27512,
    Chip231024,
    Chip27C010,
    Chip27C020,
    Chip27C040,
    Chip27C080,
    Chip27C400,
    Chip6116,
}

/// What the chip is, as far as serving goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum ChipFunction {
    Rom,
    Ram,
}

/// Control line model for a chip type.
///
/// Mask ROMs expose 1-3 chip select lines whose active polarity is set per
/// board (the 2364's single CS may be active low or high depending on the
/// machine).  The 27 series EPROMs instead have CE and OE, both always
/// active low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLines {
    /// `count` configurable chip selects, CS1 upwards.
    ChipSelect { count: u8 },

    /// Fixed active-low CE/OE pair.
    CeOe,
}

/// Possible chip select line logic options.
///
/// Wire values: active low = 0, active high = 1, not used = 2 (matches the
/// firmware's `cs_state_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum CsLogic {
    /// Chip select line is active low
    ActiveLow,

    /// Chip select line is active high
    ActiveHigh,

    /// Used when a CS line isn't wired, or is always tied active.
    NotUsed,
}

impl CsLogic {
    pub fn wire_value(&self) -> u8 {
        match self {
            CsLogic::ActiveLow => 0,
            CsLogic::ActiveHigh => 1,
            CsLogic::NotUsed => 2,
        }
    }

    pub fn try_from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(CsLogic::ActiveLow),
            1 => Some(CsLogic::ActiveHigh),
            2 => Some(CsLogic::NotUsed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CsLogic::ActiveLow => "active_low",
            CsLogic::ActiveHigh => "active_high",
            CsLogic::NotUsed => "not_used",
        }
    }
}

impl fmt::Display for CsLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// All chip types, in wire value order.
pub const CHIP_TYPES: [ChipType; 21] = [
    ChipType::Chip2316,
    ChipType::Chip2332,
    ChipType::Chip2364,
    ChipType::Chip23128,
    ChipType::Chip23256,
    ChipType::Chip23512,
    ChipType::Chip2704,
    ChipType::Chip2708,
    ChipType::Chip2716,
    ChipType::Chip2732,
    ChipType::Chip2764,
    ChipType::Chip27128,
    ChipType::Chip27256,
    ChipType::Chip27512,
    ChipType::Chip231024,
    ChipType::Chip27C010,
    ChipType::Chip27C020,
    ChipType::Chip27C040,
    ChipType::Chip27C080,
    ChipType::Chip27C400,
    ChipType::Chip6116,
];

impl ChipType {
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "2316" => Some(ChipType::Chip2316),
            "2332" => Some(ChipType::Chip2332),
            "2364" => Some(ChipType::Chip2364),
            "23128" => Some(ChipType::Chip23128),
            "23256" => Some(ChipType::Chip23256),
            "23512" => Some(ChipType::Chip23512),
            "2704" => Some(ChipType::Chip2704),
            "2708" => Some(ChipType::Chip2708),
            "2716" => Some(ChipType::Chip2716),
            "2732" => Some(ChipType::Chip2732),
            "2764" => Some(ChipType::Chip2764),
            "27128" => Some(ChipType::Chip27128),
            "27256" => Some(ChipType::Chip27256),
            "27512" => Some(ChipType::Chip27512),
            "231024" => Some(ChipType::Chip231024),
            "27c010" => Some(ChipType::Chip27C010),
            "27c020" => Some(ChipType::Chip27C020),
            "27c040" => Some(ChipType::Chip27C040),
            "27c080" => Some(ChipType::Chip27C080),
            "27c400" => Some(ChipType::Chip27C400),
            "6116" => Some(ChipType::Chip6116),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChipType::Chip2316 => "2316",
            ChipType::Chip2332 => "2332",
            ChipType::Chip2364 => "2364",
            ChipType::Chip23128 => "23128",
            ChipType::Chip23256 => "23256",
            ChipType::Chip23512 => "23512",
            ChipType::Chip2704 => "2704",
            ChipType::Chip2708 => "2708",
            ChipType::Chip2716 => "2716",
            ChipType::Chip2732 => "2732",
            ChipType::Chip2764 => "2764",
            ChipType::Chip27128 => "27128",
            ChipType::Chip27256 => "27256",
            ChipType::Chip27512 => "27512",
            ChipType::Chip231024 => "231024",
            ChipType::Chip27C010 => "27C010",
            ChipType::Chip27C020 => "27C020",
            ChipType::Chip27C040 => "27C040",
            ChipType::Chip27C080 => "27C080",
            ChipType::Chip27C400 => "27C400",
            ChipType::Chip6116 => "6116",
        }
    }

    /// Value stored in metadata, shared with the firmware's `rom_type_t`.
    pub fn wire_value(&self) -> u8 {
        match self {
            ChipType::Chip2316 => 0,
            ChipType::Chip2332 => 1,
            ChipType::Chip2364 => 2,
            ChipType::Chip23128 => 3,
            ChipType::Chip23256 => 4,
            ChipType::Chip23512 => 5,
            ChipType::Chip2704 => 6,
            ChipType::Chip2708 => 7,
            ChipType::Chip2716 => 8,
            ChipType::Chip2732 => 9,
            ChipType::Chip2764 => 10,
            ChipType::Chip27128 => 11,
            ChipType::Chip27256 => 12,
            ChipType::Chip27512 => 13,
            ChipType::Chip231024 => 14,
            ChipType::Chip27C010 => 15,
            ChipType::Chip27C020 => 16,
            ChipType::Chip27C040 => 17,
            ChipType::Chip27C080 => 18,
            ChipType::Chip27C400 => 19,
            ChipType::Chip6116 => 20,
        }
    }

    pub fn try_from_wire(value: u8) -> Option<Self> {
        CHIP_TYPES.get(value as usize).copied()
    }

    /// Package pin count.
    pub fn pins(&self) -> u8 {
        match self {
            ChipType::Chip2316
            | ChipType::Chip2332
            | ChipType::Chip2364
            | ChipType::Chip2704
            | ChipType::Chip2708
            | ChipType::Chip2716
            | ChipType::Chip2732
            | ChipType::Chip6116 => 24,
            ChipType::Chip23128
            | ChipType::Chip23256
            | ChipType::Chip23512
            | ChipType::Chip2764
            | ChipType::Chip27128
            | ChipType::Chip27256
            | ChipType::Chip27512 => 28,
            ChipType::Chip231024
            | ChipType::Chip27C010
            | ChipType::Chip27C020
            | ChipType::Chip27C040
            | ChipType::Chip27C080 => 32,
            ChipType::Chip27C400 => 40,
        }
    }

    /// Number of address lines.  For the 16-bit 27C400 this is the word
    /// address width.
    pub fn num_addr_lines(&self) -> usize {
        match self {
            ChipType::Chip2704 => 9,
            ChipType::Chip2708 => 10,
            ChipType::Chip2316 | ChipType::Chip2716 | ChipType::Chip6116 => 11,
            ChipType::Chip2332 | ChipType::Chip2732 => 12,
            ChipType::Chip2364 | ChipType::Chip2764 => 13,
            ChipType::Chip23128 | ChipType::Chip27128 => 14,
            ChipType::Chip23256 | ChipType::Chip27256 => 15,
            ChipType::Chip23512 | ChipType::Chip27512 => 16,
            ChipType::Chip231024 | ChipType::Chip27C010 => 17,
            ChipType::Chip27C020 | ChipType::Chip27C400 => 18,
            ChipType::Chip27C040 => 19,
            ChipType::Chip27C080 => 20,
        }
    }

    /// Capacity in bytes.
    pub fn size_bytes(&self) -> usize {
        let bytes_per_word = self.data_width() as usize / 8;
        (1usize << self.num_addr_lines()) * bytes_per_word
    }

    /// Data bus width in bits.
    pub fn data_width(&self) -> u8 {
        match self {
            ChipType::Chip27C400 => 16,
            _ => 8,
        }
    }

    pub fn chip_function(&self) -> ChipFunction {
        match self {
            ChipType::Chip6116 => ChipFunction::Ram,
            _ => ChipFunction::Rom,
        }
    }

    /// The control line model - which lines exist and whether their
    /// polarity is configurable.
    pub fn control_lines(&self) -> ControlLines {
        match self {
            ChipType::Chip2316 | ChipType::Chip23128 => ControlLines::ChipSelect { count: 3 },
            ChipType::Chip2332 | ChipType::Chip23256 | ChipType::Chip23512 => {
                ControlLines::ChipSelect { count: 2 }
            }
            ChipType::Chip2364 | ChipType::Chip231024 | ChipType::Chip2704 | ChipType::Chip2708 => {
                ControlLines::ChipSelect { count: 1 }
            }
            ChipType::Chip6116 => ControlLines::ChipSelect { count: 1 },
            ChipType::Chip2716
            | ChipType::Chip2732
            | ChipType::Chip2764
            | ChipType::Chip27128
            | ChipType::Chip27256
            | ChipType::Chip27512
            | ChipType::Chip27C010
            | ChipType::Chip27C020
            | ChipType::Chip27C040
            | ChipType::Chip27C080
            | ChipType::Chip27C400 => ControlLines::CeOe,
        }
    }

    /// Number of control lines (1-3).
    pub fn num_control_lines(&self) -> u8 {
        match self.control_lines() {
            ControlLines::ChipSelect { count } => count,
            ControlLines::CeOe => 2,
        }
    }

    /// Whether this is a 27 series EPROM (fixed active-low CE/OE).
    pub fn is_27_series(&self) -> bool {
        matches!(self.control_lines(), ControlLines::CeOe)
    }

    /// Whether a mangled table can be generated for this chip at all.
    ///
    /// Chips whose address space doesn't fit the 16-bit GPIO index window,
    /// and the 16-bit-data 27C400, have a data model here but no table
    /// generation until the runtime contract for them is fixed.
    pub fn supports_table_generation(&self) -> bool {
        self.data_width() == 8 && self.num_addr_lines() <= 16
    }
}

impl fmt::Display for ChipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl serde::Serialize for ChipType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for ChipType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::try_from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Unknown chip type: {}", s)))
    }
}
