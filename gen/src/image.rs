// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Mangled ROM table generation.
//!
//! Create one or more [`Rom`] instances and group them into [`RomSet`]s.
//! [`RomSet::get_byte`] returns the byte the MCU must drive for a given
//! GPIO index value, with both the address permutation and the data bit
//! permutation applied; [`RomSet::build_table`] walks the whole index space
//! to produce the mangled table stored in the image.

use alloc::string::String;
use alloc::vec::Vec;

use onerom_config::chip::{ChipFunction, ChipType, CsLogic};
use onerom_config::fw::ServeMode;
use onerom_config::hw::PinMap;

use crate::firmware::{FirmwareConfig, ServeAlgParams};
use crate::{Error, Result};

/// Byte stored at every index no ROM answers for.
pub const FILL_BYTE: u8 = 0xAA;

/// Byte served for RAM chips, which have no source image.
pub const RAM_FILL_BYTE: u8 = 0x55;

/// Transforms a data byte by rearranging its bit positions to match the
/// hardware's data pin connections.
///
/// Data pins are projected mod 8: on RP2350 boards they may sit on GPIO
/// 16-23, but the port write is an 8-bit store relative to a base, so only
/// the position within the byte matters.
pub fn mangle_byte(byte: u8, pin_map: &PinMap) -> u8 {
    let data_pins = pin_map.data_pins();
    let mut result = 0;

    for (bit_pos, &pin) in data_pins.iter().enumerate() {
        if (byte & (1 << bit_pos)) != 0 {
            result |= 1 << (pin % 8);
        }
    }

    result
}

/// Inverse of [`mangle_byte`] - recovers the logical byte from a table
/// byte.  Used by the validator and the parser's ROM recovery.
pub fn demangle_byte(byte: u8, pin_map: &PinMap) -> u8 {
    let data_map = pin_map.phys_pin_to_data_map();
    let mut result = 0;

    for (pin, &data_line) in data_map.iter().enumerate() {
        if (byte & (1 << pin)) != 0 {
            result |= 1 << data_line;
        }
    }

    result
}

// Widest address bus in the chip catalog; requesting this many lines
// yields the board's untruncated address map.
const MAX_ADDR_LINES: usize = 20;

// Map of index-bit position to logical address line for a chip, with
// chip-type quirks applied.  The only quirk today is the 2732, which has
// A11 and A12 swapped relative to the other 24-pin types (physical pin 21
// carries A11 rather than pin 18).  The swap is applied before truncating
// to the chip's address width, so A11 lands on the A12-position GPIO.
fn phys_bit_to_addr_map(pin_map: &PinMap, chip_type: ChipType) -> Vec<Option<usize>> {
    let mut map = pin_map.phys_bit_to_addr_map(MAX_ADDR_LINES);
    if chip_type == ChipType::Chip2732 {
        let a11 = map.iter().position(|&x| x == Some(11));
        let a12 = map.iter().position(|&x| x == Some(12));
        if let (Some(i11), Some(i12)) = (a11, a12) {
            map[i11] = Some(12);
            map[i12] = Some(11);
        }
    }
    for bit in &mut map {
        if let Some(addr_line) = bit
            && *addr_line >= chip_type.num_addr_lines()
        {
            *bit = None;
        }
    }
    map
}

/// Builds a mangled GPIO index from a logical address and control line
/// states.
///
/// `cs` holds the raw line levels (0/1) for control lines 1-3; lines whose
/// pin is outside the index window contribute nothing.  X values are only
/// applied when the board routes them into the window.
pub fn mangle_index(
    pin_map: &PinMap,
    chip_type: ChipType,
    address: usize,
    cs: [u8; 3],
    x1: u8,
    x2: u8,
) -> usize {
    let mut index = 0;

    let addr_map = phys_bit_to_addr_map(pin_map, chip_type);
    for (bit, item) in addr_map.iter().enumerate() {
        if let Some(addr_line) = item
            && (address & (1 << addr_line)) != 0
        {
            index |= 1 << bit;
        }
    }

    for (line, &level) in cs.iter().enumerate() {
        if level == 1
            && let Some(bit) = pin_map.control_index_bit(chip_type, line as u8 + 1)
        {
            index |= 1 << bit;
        }
    }

    if x1 == 1
        && let Some(bit) = pin_map.x1_index_bit()
    {
        index |= 1 << bit;
    }
    if x2 == 1
        && let Some(bit) = pin_map.x2_index_bit()
    {
        index |= 1 << bit;
    }

    index
}

// Extracts the logical address from a GPIO index value.  Index bits which
// don't carry an address line (CS, X, unused) are ignored.
fn extract_address(index: usize, addr_map: &[Option<usize>]) -> usize {
    let mut result = 0;

    for (bit, item) in addr_map.iter().enumerate() {
        if let Some(addr_line) = item
            && (index & (1 << bit)) != 0
        {
            result |= 1 << addr_line;
        }
    }

    result
}

fn pin_active(index: usize, bit: u8, active_high: bool) -> bool {
    let set = (index & (1 << bit)) != 0;
    if active_high { set } else { !set }
}

/// Single ROM image.  May be part of a ROM set.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Rom {
    index: usize,

    source_name: String,

    description: Option<String>,

    chip_type: ChipType,

    cs: [CsLogic; 3],

    data: Option<Vec<u8>>,
}

impl Rom {
    /// Creates a ROM from its post-transform image bytes.
    ///
    /// `data` must already be exactly the chip's capacity - the builder
    /// applies the config transforms before constructing ROMs.  RAM chips
    /// take no data.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        source_name: String,
        description: Option<String>,
        chip_type: ChipType,
        cs1: Option<CsLogic>,
        cs2: Option<CsLogic>,
        cs3: Option<CsLogic>,
        data: Option<Vec<u8>>,
    ) -> Result<Self> {
        // 27 series control lines are CE/OE, both fixed active low.
        let cs = if chip_type.is_27_series() {
            [CsLogic::ActiveLow, CsLogic::ActiveLow, CsLogic::NotUsed]
        } else {
            [
                cs1.unwrap_or(CsLogic::NotUsed),
                cs2.unwrap_or(CsLogic::NotUsed),
                cs3.unwrap_or(CsLogic::NotUsed),
            ]
        };

        match (&data, chip_type.chip_function()) {
            (None, ChipFunction::Ram) => {}
            (None, ChipFunction::Rom) => {
                return Err(Error::MissingFile { id: index });
            }
            (Some(data), _) => {
                if data.len() != chip_type.size_bytes() {
                    return Err(Error::SizeMismatch {
                        id: index,
                        expected: chip_type.size_bytes(),
                        got: data.len(),
                    });
                }
            }
        }

        Ok(Self {
            index,
            source_name,
            description,
            chip_type,
            cs,
            data,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The source name recorded in metadata when filenames are enabled.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    /// State of control line 1-3.
    pub fn cs_state(&self, line: u8) -> CsLogic {
        self.cs[(line - 1) as usize]
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Logical ROM byte, wrapping for addresses beyond the image (smaller
    /// ROMs in a set repeat through the larger address space).
    pub fn logical_byte(&self, address: usize) -> u8 {
        let data = self
            .data
            .as_ref()
            .expect("logical_byte called on a RAM chip");
        data[address % data.len()]
    }

    // True when every wired control line of this ROM is at its active
    // level in the given index.  Lines outside the index window are the
    // runtime's problem and are treated as active here.
    fn cs_active(&self, index: usize, pin_map: &PinMap) -> bool {
        for line in 1..=3u8 {
            let logic = self.cs[(line - 1) as usize];
            let active_high = match logic {
                CsLogic::NotUsed => continue,
                CsLogic::ActiveHigh => true,
                CsLogic::ActiveLow => false,
            };
            let Some(bit) = pin_map.control_index_bit(self.chip_type, line) else {
                continue;
            };
            if !pin_active(index, bit, active_high) {
                return false;
            }
        }
        true
    }

    // Checks CS2/CS3 only - used in the multi-set scan, where line 1 is
    // the per-ROM select line.
    fn cs23_ok(&self, index: usize, pin_map: &PinMap) -> bool {
        for line in 2..=3u8 {
            let logic = self.cs[(line - 1) as usize];
            let active_high = match logic {
                CsLogic::NotUsed => continue,
                CsLogic::ActiveHigh => true,
                CsLogic::ActiveLow => false,
            };
            let Some(bit) = pin_map.control_index_bit(self.chip_type, line) else {
                continue;
            };
            if !pin_active(index, bit, active_high) {
                return false;
            }
        }
        true
    }
}

/// A set of ROMs sharing one mangled table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RomSet {
    pub id: usize,

    pub serve_mode: ServeMode,

    pub roms: Vec<Rom>,

    pub firmware_overrides: Option<FirmwareConfig>,

    pub serve_alg_params: Option<ServeAlgParams>,
}

impl RomSet {
    pub fn new(
        id: usize,
        serve_mode: ServeMode,
        roms: Vec<Rom>,
        firmware_overrides: Option<FirmwareConfig>,
        serve_alg_params: Option<ServeAlgParams>,
    ) -> Result<Self> {
        if roms.is_empty() {
            return Err(Error::NoRoms);
        }

        match serve_mode {
            ServeMode::Single => {
                if roms.len() > 1 {
                    return Err(Error::TooManyRoms {
                        expected: 1,
                        actual: roms.len(),
                    });
                }
            }
            ServeMode::MultiAnyCs => {
                if roms.len() < 2 {
                    return Err(Error::TooFewRoms {
                        expected: 2,
                        actual: roms.len(),
                    });
                }
                if roms.len() > 3 {
                    return Err(Error::TooManyRoms {
                        expected: 3,
                        actual: roms.len(),
                    });
                }
            }
            ServeMode::BankSwitched => {
                if roms.len() < 2 {
                    return Err(Error::TooFewRoms {
                        expected: 2,
                        actual: roms.len(),
                    });
                }
                if roms.len() > 4 {
                    return Err(Error::TooManyRoms {
                        expected: 4,
                        actual: roms.len(),
                    });
                }
            }
        }

        let set = Self {
            id,
            serve_mode,
            roms,
            firmware_overrides,
            serve_alg_params,
        };

        // Multi and banked sets share the CS1/X selection matrix, so every
        // ROM must agree on the active polarity.
        if set.serve_mode != ServeMode::Single {
            set.shared_cs1_logic()?;
        }

        // Multi sets select by CS1/X1/X2 alone - a ROM gated additionally
        // on CS2/CS3 cannot share a socket family that way.
        if set.serve_mode == ServeMode::MultiAnyCs {
            for rom in &set.roms {
                for line in 2..=3u8 {
                    if rom.cs_state(line) != CsLogic::NotUsed {
                        return Err(Error::InconsistentCsLogic {
                            first: CsLogic::NotUsed,
                            other: rom.cs_state(line),
                        });
                    }
                }
            }
        }

        Ok(set)
    }

    /// The CS1 polarity shared by every ROM in the set.
    pub fn shared_cs1_logic(&self) -> Result<CsLogic> {
        let first = self.roms[0].cs_state(1);
        for rom in &self.roms {
            if rom.cs_state(1) != first {
                return Err(Error::InconsistentCsLogic {
                    first,
                    other: rom.cs_state(1),
                });
            }
        }
        Ok(first)
    }

    pub fn chip_function(&self) -> ChipFunction {
        self.roms[0].chip_type.chip_function()
    }

    pub fn has_data(&self) -> bool {
        self.roms[0].has_data()
    }

    /// Size of this set's mangled table, in bytes.
    pub fn table_size(&self, pin_map: &PinMap) -> Result<usize> {
        let chip_type = self.roms[0].chip_type;
        if !chip_type.supports_table_generation() {
            return Err(Error::UnsupportedChipType { chip_type });
        }
        Ok(pin_map.table_size(self.serve_mode, chip_type.pins()))
    }

    /// Byte to store at `index` - the value the MCU drives when the GPIO
    /// port reads `index`.
    pub fn get_byte(&self, index: usize, pin_map: &PinMap) -> u8 {
        // RAM chips have no image; the runtime serves writes from RAM and
        // the table only provides the pre-write fill.
        if self.chip_function() == ChipFunction::Ram {
            return mangle_byte(RAM_FILL_BYTE, pin_map);
        }

        match self.serve_mode {
            ServeMode::Single => self.rom_byte(&self.roms[0], index, pin_map),
            ServeMode::BankSwitched => {
                let x1 = pin_map
                    .x1_index_bit()
                    .map_or(0, |bit| ((index >> bit) & 1) as u8);
                let x2 = pin_map
                    .x2_index_bit()
                    .map_or(0, |bit| ((index >> bit) & 1) as u8);
                let bank = pin_map.bank_from_x(x1, x2) as usize % self.roms.len();
                self.rom_byte(&self.roms[bank], index, pin_map)
            }
            ServeMode::MultiAnyCs => self.multi_byte(index, pin_map),
        }
    }

    // Serves one ROM: its byte when every wired CS line is active, the
    // fill byte otherwise.
    fn rom_byte(&self, rom: &Rom, index: usize, pin_map: &PinMap) -> u8 {
        if !rom.cs_active(index, pin_map) {
            return mangle_byte(FILL_BYTE, pin_map);
        }

        let addr_map = phys_bit_to_addr_map(pin_map, rom.chip_type);
        let address = extract_address(index, &addr_map);
        mangle_byte(rom.logical_byte(address), pin_map)
    }

    // Multi-set scan: ROM i answers on select line i (CS1, X1, X2), and
    // only when exactly one of the three select lines is active.
    fn multi_byte(&self, index: usize, pin_map: &PinMap) -> u8 {
        // Polarity is shared across CS1/X1/X2; validated at construction.
        let active_high = self.roms[0].cs_state(1) == CsLogic::ActiveHigh;

        for (ii, rom) in self.roms.iter().enumerate() {
            let Some(sel_bit) = pin_map.select_bit_for_rom_in_set(rom.chip_type, ii) else {
                continue;
            };
            if !pin_active(index, sel_bit, active_high) {
                continue;
            }

            let select_bits = [
                pin_map.control_index_bit(rom.chip_type, 1),
                pin_map.x1_index_bit(),
                pin_map.x2_index_bit(),
            ];
            let active_count = select_bits
                .iter()
                .flatten()
                .filter(|&&bit| pin_active(index, bit, active_high))
                .count();

            if active_count == 1 && rom.cs23_ok(index, pin_map) {
                let addr_map = phys_bit_to_addr_map(pin_map, rom.chip_type);
                let address = extract_address(index, &addr_map);
                return mangle_byte(rom.logical_byte(address), pin_map);
            }
        }

        mangle_byte(FILL_BYTE, pin_map)
    }

    /// Builds the complete mangled table for this set.
    pub fn build_table(&self, pin_map: &PinMap) -> Result<Vec<u8>> {
        let size = self.table_size(pin_map)?;
        let mut table = Vec::with_capacity(size);
        for index in 0..size {
            table.push(self.get_byte(index, pin_map));
        }
        Ok(table)
    }
}
