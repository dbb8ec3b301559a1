// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Hardware descriptors - the per-PCB-revision pin maps.
//!
//! A [`PinMap`] records which MCU GPIO carries each logical line of the ROM
//! socket: address lines, data lines, the per-chip-type CS/CE/OE variants,
//! the X jumpers, image select jumpers and the status LED.  Revisions are
//! available from the built-in catalog via [`lookup_pcb`], or can be loaded
//! from a JSON descriptor with [`PinMap::from_json`].
//!
//! Some CS pins differ between chip types even on the same PCB (a 2364's
//! CS1 lands on a different GPIO than a 2316's), so control lines map from
//! (line, chip type) to GPIO rather than a single assignment.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use serde::{Deserialize, Deserializer};

use crate::chip::{ChipType, ControlLines};
use crate::fw::ServeMode;
use crate::mcu::Family;

/// Pin value meaning "not wired on this board" - assumed tied low.
pub const UNUSED_PIN: u8 = 0xFF;

// Width of the GPIO index window the mangled tables are built over.
const INDEX_BITS: u8 = 16;

/// Built-in PCB revisions.
pub const PCB_REVISIONS: [&str; 4] = ["ice-24-j", "ice-28-a", "fire-24-a", "fire-24-d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    None,
    Zero, // RP2350
    A,
    B,
    C,
    D,
}

impl Port {
    fn try_from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "0" => Some(Port::Zero),
            "A" => Some(Port::A),
            "B" => Some(Port::B),
            "C" => Some(Port::C),
            "D" => Some(Port::D),
            "NONE" => Some(Port::None),
            _ => None,
        }
    }
}

impl core::fmt::Display for Port {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Port::None => write!(f, "PORT_NONE"),
            Port::Zero => write!(f, "PORT_0"),
            Port::A => write!(f, "PORT_A"),
            Port::B => write!(f, "PORT_B"),
            Port::C => write!(f, "PORT_C"),
            Port::D => write!(f, "PORT_D"),
        }
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Port::try_from_str(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("Invalid port: {}, must be None, 0, A, B, C, or D", s))
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct McuPorts {
    pub data: Port,
    pub addr: Port,
    pub cs: Port,
    pub sel: Port,
    pub status: Port,
}

#[derive(Debug, Deserialize, Clone)]
pub struct McuPins {
    pub data: Vec<u8>,
    pub addr: Vec<u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs1: BTreeMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs2: BTreeMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs3: BTreeMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub ce: BTreeMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub oe: BTreeMap<ChipType, u8>,
    pub x1: Option<u8>,
    pub x2: Option<u8>,
    pub x_jumper_pull: u8,
    pub sel: Vec<u8>,
    pub sel_jumper_pull: u8,
    pub status: u8,
    #[serde(default)]
    pub vbus: Option<u8>,
    /// SWDIO/SWCLK, on parts where they share GPIOs (the RP2350 has
    /// dedicated SWD pins)
    #[serde(default)]
    pub swd: Option<[u8; 2]>,
}

fn deserialize_chip_map<'de, D>(deserializer: D) -> Result<BTreeMap<ChipType, u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: BTreeMap<String, u8> = BTreeMap::deserialize(deserializer)?;
    let mut chip_map = BTreeMap::new();

    for (key, value) in string_map {
        match ChipType::try_from_str(&key) {
            Some(chip_type) => {
                chip_map.insert(chip_type, value);
            }
            None => {
                return Err(serde::de::Error::custom(format!(
                    "Invalid chip type: {}",
                    key
                )));
            }
        }
    }

    Ok(chip_map)
}

/// Errors raised while looking up or validating a hardware descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    UnknownRevision { name: String },
    InvalidDescriptor { name: String, reason: String },
}

impl core::fmt::Display for HwError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HwError::UnknownRevision { name } => {
                write!(f, "Unknown PCB revision '{}'", name)
            }
            HwError::InvalidDescriptor { name, reason } => {
                write!(f, "Invalid hardware descriptor '{}': {}", name, reason)
            }
        }
    }
}

impl core::error::Error for HwError {}

/// One PCB revision's pin assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct PinMap {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub family: Family,
    /// Socket pin count - 24 or 28.
    pub rom_pins: u8,
    pub ports: McuPorts,
    pub pins: McuPins,

    // Derived on construction.
    #[serde(skip)]
    phys_bit_to_addr_map: Vec<Option<usize>>,
    #[serde(skip)]
    phys_pin_to_data_map: [usize; 8],
    #[serde(skip)]
    index_shift: u8,
}

impl PinMap {
    /// Parse and validate a JSON hardware descriptor.
    pub fn from_json(json: &str, name: &str) -> Result<Self, HwError> {
        let mut map: PinMap =
            serde_json::from_str(json).map_err(|e| HwError::InvalidDescriptor {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        map.name = normalize_name(name);
        map.finish()?;
        Ok(map)
    }

    // Validates the raw pin assignment and builds the derived maps.
    fn finish(&mut self) -> Result<(), HwError> {
        validate_pin_map(self)?;

        // If data and address share a port and data occupies the low byte,
        // address/CS/X lines sit in the upper bits and every index is
        // shifted down by 8 so the table is indexed from bit 0.
        self.index_shift = if self.ports.addr == self.ports.data
            && self.pins.data.iter().all(|&p| p < 8)
        {
            8
        } else {
            0
        };

        // Address map, indexed by index-bit position.  28-pin sockets pack
        // densely from bit 0 by subtracting the lowest address pin.
        let addr_shift = self.addr_index_shift();
        self.phys_bit_to_addr_map = vec![None; INDEX_BITS as usize];
        for (addr_line, &phys_pin) in self.pins.addr.iter().enumerate() {
            if phys_pin == UNUSED_PIN {
                continue;
            }
            let Some(bit) = phys_pin.checked_sub(addr_shift) else {
                return Err(invalid(
                    &self.name,
                    format!(
                        "address pin {} below the shared-port data byte",
                        phys_pin
                    ),
                ));
            };
            if (bit as usize) < self.phys_bit_to_addr_map.len() {
                self.phys_bit_to_addr_map[bit as usize] = Some(addr_line);
            }
        }

        // Data map, indexed by (pin mod 8).  On RP2350 data pins may sit on
        // GPIO 16..23; the port write is an 8-bit store relative to a base,
        // so only the position within the byte matters.
        self.phys_pin_to_data_map = [0; 8];
        for (data_line, &phys_pin) in self.pins.data.iter().enumerate() {
            self.phys_pin_to_data_map[phys_pin as usize % 8] = data_line;
        }

        Ok(())
    }

    // Shift applied to address pins to obtain index bits.
    fn addr_index_shift(&self) -> u8 {
        if self.rom_pins == 28 {
            self.pins
                .addr
                .iter()
                .copied()
                .filter(|&p| p != UNUSED_PIN)
                .min()
                .unwrap_or(0)
        } else {
            self.index_shift
        }
    }

    /// Map of index-bit position to logical address line, truncated to
    /// `num_addr_lines`.
    pub fn phys_bit_to_addr_map(&self, num_addr_lines: usize) -> Vec<Option<usize>> {
        let mut map = self.phys_bit_to_addr_map.clone();
        for bit in &mut map {
            if let Some(addr) = bit
                && *addr >= num_addr_lines
            {
                *bit = None;
            }
        }
        map
    }

    /// Map of (data pin mod 8) to logical data line.
    pub fn phys_pin_to_data_map(&self) -> [usize; 8] {
        self.phys_pin_to_data_map
    }

    /// GPIO pins of the logical data lines, D0 upwards.
    pub fn data_pins(&self) -> &[u8] {
        &self.pins.data
    }

    // Converts a raw control/X pin to an index-bit position, or None if the
    // pin is unused or lands outside the index window.
    fn index_bit(&self, pin: u8) -> Option<u8> {
        if pin == UNUSED_PIN || pin < self.index_shift {
            return None;
        }
        let bit = pin - self.index_shift;
        (bit < INDEX_BITS).then_some(bit)
    }

    /// Index bit of control line `line` (1-3) for the given chip type.
    ///
    /// For 27 series chips line 1 is CE and line 2 is OE.  Returns None
    /// when the line has no pin inside the index window - the runtime gates
    /// it instead.
    pub fn control_index_bit(&self, chip_type: ChipType, line: u8) -> Option<u8> {
        let map = match (chip_type.control_lines(), line) {
            (ControlLines::CeOe, 1) => &self.pins.ce,
            (ControlLines::CeOe, 2) => &self.pins.oe,
            (ControlLines::CeOe, _) => return None,
            (ControlLines::ChipSelect { count }, line) if line <= count => match line {
                1 => &self.pins.cs1,
                2 => &self.pins.cs2,
                _ => &self.pins.cs3,
            },
            _ => return None,
        };
        map.get(&chip_type).and_then(|&pin| self.index_bit(pin))
    }

    pub fn x1_index_bit(&self) -> Option<u8> {
        self.pins.x1.and_then(|pin| self.index_bit(pin))
    }

    pub fn x2_index_bit(&self) -> Option<u8> {
        self.pins.x2.and_then(|pin| self.index_bit(pin))
    }

    /// Index bit of the line selecting ROM `rom_index` of a multi set:
    /// CS1 for the first ROM, X1/X2 for the second and third.
    pub fn select_bit_for_rom_in_set(&self, chip_type: ChipType, rom_index: usize) -> Option<u8> {
        match rom_index {
            0 => self.control_index_bit(chip_type, 1),
            1 => self.x1_index_bit(),
            2 => self.x2_index_bit(),
            _ => None,
        }
    }

    pub fn x_jumper_pull(&self) -> u8 {
        self.pins.x_jumper_pull
    }

    pub fn sel_jumper_pull(&self) -> u8 {
        self.pins.sel_jumper_pull
    }

    /// Banked sets need both X jumpers.
    pub fn supports_multi_rom_sets(&self) -> bool {
        self.x1_index_bit().is_some() && self.x2_index_bit().is_some()
    }

    /// Decodes the bank number (0-3) from the raw X1/X2 port bits,
    /// honouring the jumper pull polarity.
    pub fn bank_from_x(&self, x1_raw: u8, x2_raw: u8) -> u8 {
        let (x1, x2) = if self.pins.x_jumper_pull == 1 {
            (x1_raw & 1, x2_raw & 1)
        } else {
            // Jumpers pull the opposite way to the MCU - closed reads 0
            (!x1_raw & 1, !x2_raw & 1)
        };
        (x2 << 1) | x1
    }

    /// Decodes the image select value from a raw read of the sel port.
    pub fn sel_value(&self, raw: u32) -> u8 {
        let mut value = 0;
        for (ii, &pin) in self.pins.sel.iter().enumerate() {
            if pin == UNUSED_PIN {
                continue;
            }
            let mut bit = ((raw >> pin) & 1) as u8;
            if self.pins.sel_jumper_pull == 0 {
                bit ^= 1;
            }
            value |= bit << ii;
        }
        value
    }

    /// Mangled table size in bytes for a set served in the given mode.
    ///
    /// Fire reads the full 16-bit window for every set.  Ice masks the X
    /// jumpers out of single-set reads, so single 24-pin tables are 16KB.
    pub fn table_size(&self, mode: ServeMode, chip_pins: u8) -> usize {
        match self.family {
            Family::Rp2350 => 65536,
            Family::Stm32f4 => match mode {
                ServeMode::Single => {
                    if chip_pins == 24 {
                        16384
                    } else {
                        65536
                    }
                }
                ServeMode::MultiAnyCs | ServeMode::BankSwitched => 65536,
            },
        }
    }

    pub fn status_pin(&self) -> u8 {
        self.pins.status
    }

    pub fn vbus_pin(&self) -> Option<u8> {
        self.pins.vbus
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace("_", "-")
}

fn invalid(name: &str, reason: String) -> HwError {
    HwError::InvalidDescriptor {
        name: name.to_string(),
        reason,
    }
}

fn validate_pin_array(
    family: Family,
    pins: &[u8],
    pin_type: &str,
    name: &str,
    max_pins: usize,
) -> Result<(), HwError> {
    let mut seen = BTreeSet::new();
    for &pin in pins {
        if pin != UNUSED_PIN && !family.valid_pin_num(pin) {
            return Err(invalid(
                name,
                format!("invalid pin number {} in {} array", pin, pin_type),
            ));
        }
        if pin != UNUSED_PIN && !seen.insert(pin) {
            return Err(invalid(
                name,
                format!("duplicate pin {} in {} array", pin, pin_type),
            ));
        }
    }
    if pins.len() > max_pins {
        return Err(invalid(
            name,
            format!(
                "too many pins in {} array, maximum is {}",
                pin_type, max_pins
            ),
        ));
    }
    Ok(())
}

fn validate_chip_map(
    family: Family,
    map: &BTreeMap<ChipType, u8>,
    pin_type: &str,
    name: &str,
) -> Result<(), HwError> {
    for (chip_type, &pin) in map {
        if pin != UNUSED_PIN && !family.valid_pin_num(pin) {
            return Err(invalid(
                name,
                format!("invalid pin number {} for {}[{}]", pin, pin_type, chip_type),
            ));
        }
    }
    Ok(())
}

fn validate_pin_map(map: &PinMap) -> Result<(), HwError> {
    let name = &map.name;
    let family = map.family;

    if map.rom_pins != 24 && map.rom_pins != 28 {
        return Err(invalid(
            name,
            format!("unsupported socket, expected 24 or 28 pins, found {}", map.rom_pins),
        ));
    }

    // Data pins: exactly 8, distinct, one contiguous byte-aligned block.
    if map.pins.data.len() != 8 {
        return Err(invalid(
            name,
            format!("data pins must be exactly 8, found {}", map.pins.data.len()),
        ));
    }
    validate_pin_array(family, &map.pins.data, "data", name, 8)?;
    let data_min = *map.pins.data.iter().min().unwrap();
    let data_max = *map.pins.data.iter().max().unwrap();
    if data_max - data_min != 7 || data_min % 8 != 0 {
        return Err(invalid(
            name,
            format!(
                "data pins must occupy one aligned byte of a port, found {}-{}",
                data_min, data_max
            ),
        ));
    }
    if data_max > family.max_valid_data_pin() {
        return Err(invalid(
            name,
            format!(
                "data pin {} beyond the family's data window (max {})",
                data_max,
                family.max_valid_data_pin()
            ),
        ));
    }

    validate_pin_array(family, &map.pins.addr, "addr", name, 17)?;
    validate_pin_array(family, &map.pins.sel, "sel", name, 7)?;

    validate_chip_map(family, &map.pins.cs1, "cs1", name)?;
    validate_chip_map(family, &map.pins.cs2, "cs2", name)?;
    validate_chip_map(family, &map.pins.cs3, "cs3", name)?;
    validate_chip_map(family, &map.pins.ce, "ce", name)?;
    validate_chip_map(family, &map.pins.oe, "oe", name)?;

    // Port assignment is fixed per family.
    let (data_port, addr_port, cs_port, sel_port) = match family {
        Family::Stm32f4 => (Port::A, Port::C, Port::C, Port::B),
        Family::Rp2350 => (Port::Zero, Port::Zero, Port::Zero, Port::Zero),
    };
    if map.ports.data != data_port {
        return Err(invalid(
            name,
            format!("data port must be {}, found {}", data_port, map.ports.data),
        ));
    }
    if map.ports.addr != addr_port {
        return Err(invalid(
            name,
            format!("address port must be {}, found {}", addr_port, map.ports.addr),
        ));
    }
    if map.ports.cs != cs_port {
        return Err(invalid(
            name,
            format!("CS port must be {}, found {}", cs_port, map.ports.cs),
        ));
    }
    if map.ports.sel != sel_port {
        return Err(invalid(
            name,
            format!("SEL port must be {}, found {}", sel_port, map.ports.sel),
        ));
    }

    // X1 and X2 must both be provided, or neither.
    if map.pins.x1.is_some() != map.pins.x2.is_some() {
        return Err(invalid(
            name,
            "X1 and X2 pins must both be provided or both omitted".to_string(),
        ));
    }

    if map.pins.x_jumper_pull > 1 {
        return Err(invalid(
            name,
            "x_jumper_pull must be 0 (jumper pulls to GND) or 1 (jumper pulls up)".to_string(),
        ));
    }
    if map.pins.sel_jumper_pull > 1 {
        return Err(invalid(
            name,
            "sel_jumper_pull must be 0 (jumper pulls to GND) or 1 (jumper pulls up)".to_string(),
        ));
    }

    Ok(())
}

/// Looks up a built-in PCB revision by name.
pub fn lookup_pcb(rev: &str) -> Result<PinMap, HwError> {
    let normalized = normalize_name(rev);
    let mut map = match normalized.as_str() {
        "ice-24-j" => ice_24_j(),
        "ice-28-a" => ice_28_a(),
        "fire-24-a" => fire_24_a(),
        "fire-24-d" => fire_24_d(),
        _ => {
            return Err(HwError::UnknownRevision { name: normalized });
        }
    };
    map.finish()?;
    Ok(map)
}

// The 24-pin ROM socket multiplexes its top pins: socket pin 20 is CS1 on
// a 2364 but CS3 on a 2316, pin 21 is A11 or CS2, pin 18 is A12 or CS1.
// Each board therefore routes those socket pins to one GPIO apiece and the
// per-chip-type maps below record which logical line that GPIO carries.
fn chip_map_24(cs1: u8, cs2: u8, cs3: u8) -> (BTreeMap<ChipType, u8>, BTreeMap<ChipType, u8>, BTreeMap<ChipType, u8>) {
    let cs1_map = BTreeMap::from([
        (ChipType::Chip2316, cs1),
        (ChipType::Chip2332, cs1),
        (ChipType::Chip2364, cs1),
        (ChipType::Chip2704, cs1),
        (ChipType::Chip2708, cs1),
        (ChipType::Chip6116, cs1),
    ]);
    let cs2_map = BTreeMap::from([(ChipType::Chip2316, cs2), (ChipType::Chip2332, cs2)]);
    let cs3_map = BTreeMap::from([(ChipType::Chip2316, cs3)]);
    (cs1_map, cs2_map, cs3_map)
}

// 24-pin 27 series: CE sits on socket pin 18 (the A11 position) and OE on
// pin 20 (the CS1 position).  The 2732's A11 moves to pin 21; the mangler
// swaps A11/A12 to account for it.
fn ce_oe_map_24(ce: u8, oe: u8) -> (BTreeMap<ChipType, u8>, BTreeMap<ChipType, u8>) {
    let ce_map = BTreeMap::from([(ChipType::Chip2716, ce), (ChipType::Chip2732, ce)]);
    let oe_map = BTreeMap::from([(ChipType::Chip2716, oe), (ChipType::Chip2732, oe)]);
    (ce_map, oe_map)
}

fn ice_24_j() -> PinMap {
    let (cs1, cs2, cs3) = chip_map_24(13, 12, 11);
    let (ce, oe) = ce_oe_map_24(11, 13);
    PinMap {
        name: "ice-24-j".to_string(),
        description: "Ice 24-pin, STM32F4, USB-C".to_string(),
        family: Family::Stm32f4,
        rom_pins: 24,
        ports: McuPorts {
            data: Port::A,
            addr: Port::C,
            cs: Port::C,
            sel: Port::B,
            status: Port::B,
        },
        pins: McuPins {
            // PA3..PA7 are routed in reverse order to ease PCB layout
            data: vec![0, 1, 2, 7, 6, 5, 4, 3],
            addr: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            cs1,
            cs2,
            cs3,
            ce,
            oe,
            x1: Some(14),
            x2: Some(15),
            x_jumper_pull: 0,
            sel: vec![4, 5, 6],
            sel_jumper_pull: 0,
            status: 7,
            vbus: None,
            swd: Some([13, 14]),
        },
        phys_bit_to_addr_map: Vec::new(),
        phys_pin_to_data_map: [0; 8],
        index_shift: 0,
    }
}

fn ice_28_a() -> PinMap {
    PinMap {
        name: "ice-28-a".to_string(),
        description: "Ice 28-pin, STM32F4".to_string(),
        family: Family::Stm32f4,
        rom_pins: 28,
        ports: McuPorts {
            data: Port::A,
            addr: Port::C,
            cs: Port::C,
            sel: Port::B,
            status: Port::B,
        },
        pins: McuPins {
            data: vec![0, 1, 2, 3, 4, 5, 6, 7],
            addr: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
            cs1: BTreeMap::from([
                (ChipType::Chip23128, 14),
                (ChipType::Chip23256, 15),
            ]),
            cs2: BTreeMap::from([(ChipType::Chip23128, 15)]),
            cs3: BTreeMap::new(),
            // Larger EPROMs claim the top GPIOs for address lines, pushing
            // CE/OE out of the index window; the runtime gates those.
            ce: BTreeMap::from([
                (ChipType::Chip2764, 14),
                (ChipType::Chip27128, 14),
                (ChipType::Chip27256, 15),
            ]),
            oe: BTreeMap::from([
                (ChipType::Chip2764, 15),
                (ChipType::Chip27128, 15),
            ]),
            x1: None,
            x2: None,
            x_jumper_pull: 0,
            sel: vec![4, 5, 6],
            sel_jumper_pull: 0,
            status: 7,
            vbus: None,
            swd: Some([13, 14]),
        },
        phys_bit_to_addr_map: Vec::new(),
        phys_pin_to_data_map: [0; 8],
        index_shift: 0,
    }
}

fn fire_24_a() -> PinMap {
    let (cs1, cs2, cs3) = chip_map_24(13, 12, 11);
    let (ce, oe) = ce_oe_map_24(11, 13);
    PinMap {
        name: "fire-24-a".to_string(),
        description: "Fire 24-pin rev A, RP2350, data on GPIO 16-23".to_string(),
        family: Family::Rp2350,
        rom_pins: 24,
        ports: McuPorts {
            data: Port::Zero,
            addr: Port::Zero,
            cs: Port::Zero,
            sel: Port::Zero,
            status: Port::Zero,
        },
        pins: McuPins {
            data: vec![16, 17, 18, 23, 22, 21, 20, 19],
            addr: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            cs1,
            cs2,
            cs3,
            ce,
            oe,
            x1: Some(14),
            x2: Some(15),
            x_jumper_pull: 1,
            sel: vec![24, 25, 26],
            sel_jumper_pull: 1,
            status: 27,
            vbus: Some(28),
            swd: None,
        },
        phys_bit_to_addr_map: Vec::new(),
        phys_pin_to_data_map: [0; 8],
        index_shift: 0,
    }
}

fn fire_24_d() -> PinMap {
    let (cs1, cs2, cs3) = chip_map_24(21, 20, 19);
    let (ce, oe) = ce_oe_map_24(19, 21);
    PinMap {
        name: "fire-24-d".to_string(),
        description: "Fire 24-pin rev D, RP2350, data on GPIO 0-7".to_string(),
        family: Family::Rp2350,
        rom_pins: 24,
        ports: McuPorts {
            data: Port::Zero,
            addr: Port::Zero,
            cs: Port::Zero,
            sel: Port::Zero,
            status: Port::Zero,
        },
        pins: McuPins {
            data: vec![0, 1, 2, 3, 4, 5, 6, 7],
            addr: vec![8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            cs1,
            cs2,
            cs3,
            ce,
            oe,
            x1: Some(22),
            x2: Some(23),
            x_jumper_pull: 0,
            sel: vec![24, 25, 26],
            sel_jumper_pull: 0,
            status: 27,
            vbus: Some(28),
            swd: None,
        },
        phys_bit_to_addr_map: Vec::new(),
        phys_pin_to_data_map: [0; 8],
        index_shift: 0,
    }
}
