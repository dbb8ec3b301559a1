// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Round-trip validation of composed images.
//!
//! For every ROM set, every legal (address, CS, X) tuple is replayed
//! through the same permutation the runtime uses: mangle the tuple to a
//! GPIO index, read the table byte, demangle it, and compare against the
//! source byte (or the fill byte for tuples that don't activate any ROM).
//! This is the canonical pre-release check - any mismatch is fatal.

use alloc::vec::Vec;

use onerom_config::chip::CsLogic;
use onerom_config::fw::ServeMode;
use onerom_config::hw::PinMap;

use crate::compose::ComposedImage;
use crate::image::{FILL_BYTE, Rom, RomSet, demangle_byte, mangle_index};

/// One failed tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub address: usize,
    pub cs: [u8; 3],
    pub x: [u8; 2],
    pub index: usize,
    pub expected: u8,
    pub got: u8,
}

/// Per-set validation result.  Only the first few mismatches are kept.
#[derive(Debug, Clone)]
pub struct SetReport {
    pub set: usize,
    pub rom_count: usize,
    pub checked: u64,
    pub mismatch_count: u64,
    pub first_mismatches: Vec<Mismatch>,
}

/// Mismatches retained per set for reporting.
pub const MAX_REPORTED_MISMATCHES: usize = 5;

/// Whole-image validation result.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub sets: Vec<SetReport>,
}

impl Report {
    pub fn total_checked(&self) -> u64 {
        self.sets.iter().map(|s| s.checked).sum()
    }

    pub fn total_mismatches(&self) -> u64 {
        self.sets.iter().map(|s| s.mismatch_count).sum()
    }

    pub fn passed(&self) -> bool {
        self.total_mismatches() == 0
    }
}

/// Validates a freshly composed image against its source ROM sets.
pub fn validate_image(rom_sets: &[RomSet], image: &ComposedImage, pin_map: &PinMap) -> Report {
    let tables: Vec<Option<&[u8]>> = (0..rom_sets.len()).map(|ii| image.table(ii)).collect();
    validate_tables(rom_sets, &tables, pin_map)
}

/// Validates mangled tables (composed or parsed back out of an image)
/// against source ROM sets.
pub fn validate_tables(
    rom_sets: &[RomSet],
    tables: &[Option<&[u8]>],
    pin_map: &PinMap,
) -> Report {
    let mut report = Report::default();
    for (set, table) in rom_sets.iter().zip(tables.iter()) {
        report.sets.push(validate_set(set, *table, pin_map));
    }
    report
}

// Levels a control line takes during enumeration: both for lines whose pin
// participates in the index, the active level alone for lines the runtime
// gates (or which aren't wired at all).
fn line_levels(rom: &Rom, line: u8, pin_map: &PinMap, table_bits: u32) -> (Vec<u8>, u8) {
    let logic = rom.cs_state(line);
    let active_level = match logic {
        CsLogic::ActiveHigh => 1,
        _ => 0,
    };
    if logic == CsLogic::NotUsed {
        return (Vec::from([active_level]), active_level);
    }
    match pin_map.control_index_bit(rom.chip_type(), line) {
        Some(bit) if (bit as u32) < table_bits => (Vec::from([0, 1]), active_level),
        _ => (Vec::from([active_level]), active_level),
    }
}

fn validate_set(set: &RomSet, table: Option<&[u8]>, pin_map: &PinMap) -> SetReport {
    let mut result = SetReport {
        set: set.id,
        rom_count: set.roms.len(),
        checked: 0,
        mismatch_count: 0,
        first_mismatches: Vec::new(),
    };

    // RAM sets and unsupported chips carry no table to check.
    let Some(table) = table else {
        return result;
    };
    if table.is_empty() {
        return result;
    }

    let table_bits = table.len().trailing_zeros();
    let chip_type = set.roms[0].chip_type();

    let (cs1_levels, cs1_active) = line_levels(&set.roms[0], 1, pin_map, table_bits);
    let (cs2_levels, cs2_active) = line_levels(&set.roms[0], 2, pin_map, table_bits);
    let (cs3_levels, cs3_active) = line_levels(&set.roms[0], 3, pin_map, table_bits);

    // X jumpers are enumerated whenever their bits fall inside the table.
    let x_in_window = |bit: Option<u8>| matches!(bit, Some(b) if (b as u32) < table_bits);
    let x_levels: &[u8] =
        if x_in_window(pin_map.x1_index_bit()) && x_in_window(pin_map.x2_index_bit()) {
            &[0, 1]
        } else {
            &[0]
        };

    for address in 0..chip_type.size_bytes() {
        for &cs1 in &cs1_levels {
            for &cs2 in &cs2_levels {
                for &cs3 in &cs3_levels {
                    for &x1 in x_levels {
                        for &x2 in x_levels {
                            let cs = [cs1, cs2, cs3];
                            let cs_active =
                                cs1 == cs1_active && cs2 == cs2_active && cs3 == cs3_active;

                            let expected = match set.serve_mode {
                                ServeMode::Single => {
                                    expected_single(&set.roms[0], address, cs_active)
                                }
                                ServeMode::BankSwitched => {
                                    let bank =
                                        pin_map.bank_from_x(x1, x2) as usize % set.roms.len();
                                    expected_single(&set.roms[bank], address, cs_active)
                                }
                                ServeMode::MultiAnyCs => {
                                    expected_multi(set, address, cs1, x1, x2)
                                }
                            };

                            let index = mangle_index(pin_map, chip_type, address, cs, x1, x2);
                            let got = demangle_byte(table[index], pin_map);

                            result.checked += 1;
                            if got != expected {
                                if result.first_mismatches.len() < MAX_REPORTED_MISMATCHES {
                                    result.first_mismatches.push(Mismatch {
                                        address,
                                        cs,
                                        x: [x1, x2],
                                        index,
                                        expected,
                                        got,
                                    });
                                }
                                result.mismatch_count += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    result
}

fn expected_single(rom: &Rom, address: usize, cs_active: bool) -> u8 {
    if cs_active {
        rom.logical_byte(address)
    } else {
        FILL_BYTE
    }
}

// Which ROM, if any, a multi-set tuple activates: ROM i answers when its
// select line (CS1, X1, X2 in order) is the only one of the three at the
// active level.
fn expected_multi(set: &RomSet, address: usize, cs1: u8, x1: u8, x2: u8) -> u8 {
    let active_level = match set.roms[0].cs_state(1) {
        CsLogic::ActiveHigh => 1,
        _ => 0,
    };
    let levels = [cs1, x1, x2];
    let active_count = levels.iter().filter(|&&l| l == active_level).count();
    if active_count != 1 {
        return FILL_BYTE;
    }
    let selected = levels.iter().position(|&l| l == active_level).unwrap();
    match set.roms.get(selected) {
        Some(rom) => rom.logical_byte(address),
        None => FILL_BYTE,
    }
}
