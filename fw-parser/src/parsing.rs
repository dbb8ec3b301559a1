// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Image parsing internals.
//!
//! The fixed records are described with deku and reflect the layout the
//! composer writes - see `onerom-gen`'s compose module for the authoritative
//! description.  Table positions are not stored in the image; they are
//! re-derived here from the metadata end and each table's power-of-two
//! alignment, which the composer guarantees.

use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use deku::prelude::*;
use static_assertions::const_assert_eq;

use onerom_config::chip::{ChipType, CsLogic};
use onerom_config::fw::ServeMode;
use onerom_config::hw::PinMap;
use onerom_gen::firmware::{FIRMWARE_OVERRIDES_LEN, SERVE_PARAMS_LEN};
use onerom_gen::image::{demangle_byte, mangle_index};
use onerom_gen::{FirmwareConfig, HEADER_MAGIC, METADATA_VERSION};

use crate::{MAX_HEADER_SCAN, ParseError};

const HEADER_FIXED_LEN: usize = 20;
const SET_RECORD_FIXED_LEN: usize = 16;
const DESCRIPTOR_LEN: usize = 4;
const ABSENT_OFFSET: u32 = 0xFFFF_FFFF;

const EXTRA_INFO_OVERRIDES: u8 = 1 << 0;
const EXTRA_INFO_FILENAMES: u8 = 1 << 1;

#[derive(Debug, DekuRead, DekuWrite)]
#[deku(endian = "little", magic = b"ONEROM_METADATA\0")]
// Reflects the metadata header the composer writes
struct MetadataHeaderRaw {
    version: u8,
    rom_set_count: u8,
    pad: [u8; 2],
    #[deku(count = "rom_set_count")]
    set_offsets: Vec<u32>,
}

#[derive(Debug, DekuRead, DekuWrite)]
#[deku(endian = "little")]
// Reflects one ROM set record
struct RomSetRecordRaw {
    rom_count: u8,
    serve_mode: u8,
    extra_info: u8,
    pad: u8,
    table_size: u32,
    overrides_offset: u32,
    params_offset: u32,
    #[deku(count = "rom_count")]
    rom_offsets: Vec<u32>,
}

#[derive(Debug, DekuRead, DekuWrite)]
// Reflects the fixed part of a ROM descriptor
struct RomDescriptorRaw {
    chip_type: u8,
    cs1_state: u8,
    cs2_state: u8,
    cs3_state: u8,
}

const_assert_eq!(core::mem::size_of::<RomDescriptorRaw>(), DESCRIPTOR_LEN);

/// One ROM's descriptor, borrowed from the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomDescriptor<'a> {
    pub chip_type: ChipType,
    pub cs1_state: CsLogic,
    pub cs2_state: CsLogic,
    pub cs3_state: CsLogic,
    pub filename: Option<&'a str>,
}

/// One ROM set's view of the parsed image.
#[derive(Debug, Clone)]
pub struct RomSetView<'a> {
    pub serve_mode: ServeMode,
    pub roms: Vec<RomDescriptor<'a>>,
    pub firmware_overrides: Option<FirmwareConfig>,
    pub serve_alg_params: Option<&'a [u8]>,

    /// Offset of the mangled table from the image base; 0 when the set
    /// carries no table (RAM sets).
    pub table_offset: usize,
    pub table_size: usize,
}

impl<'a> RomSetView<'a> {
    pub fn rom_count(&self) -> usize {
        self.roms.len()
    }
}

/// A parsed One ROM image, borrowing from the underlying bytes.
#[derive(Debug)]
pub struct Image<'a> {
    data: &'a [u8],
    header_offset: usize,
    version: u8,
    rom_sets: Vec<RomSetView<'a>>,
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl<'a> Image<'a> {
    /// Locates the metadata header by scanning for the magic within the
    /// first 4MB and parses the image.  The header is 16-byte aligned by
    /// construction, so the scan steps by 16.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        let window = data.len().min(MAX_HEADER_SCAN);
        let mut last_err = ParseError::BadMagic;

        if window < HEADER_MAGIC.len() {
            return Err(last_err);
        }

        // Inclusive upper bound: the magic may start at the last aligned
        // position that still fits inside the window.
        for offset in (0..=window - HEADER_MAGIC.len()).step_by(16) {
            if &data[offset..offset + HEADER_MAGIC.len()] != HEADER_MAGIC {
                continue;
            }
            // The magic can also occur inside the code region (the
            // firmware carries the string too) - keep scanning if this
            // candidate doesn't parse.
            match Self::parse_at(data, offset) {
                Ok(image) => return Ok(image),
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }

    /// Parses with a known header offset, skipping the scan.
    pub fn parse_at(data: &'a [u8], header_offset: usize) -> Result<Self, ParseError> {
        if data.len() < header_offset + HEADER_FIXED_LEN {
            return Err(ParseError::TruncatedImage {
                needed: header_offset + HEADER_FIXED_LEN,
                actual: data.len(),
            });
        }

        // rom_set_count sits right after the magic and version; check the
        // offset table fits before handing the buffer to deku, so a short
        // image reads as truncation rather than a bad magic.
        let set_count = data[header_offset + HEADER_MAGIC.len() + 1] as usize;
        let needed = header_offset + HEADER_FIXED_LEN + 4 * set_count;
        if data.len() < needed {
            return Err(ParseError::TruncatedImage {
                needed,
                actual: data.len(),
            });
        }

        let (_, header) = MetadataHeaderRaw::from_bytes((&data[header_offset..], 0))
            .map_err(|_| ParseError::BadMagic)?;

        if header.version != METADATA_VERSION {
            return Err(ParseError::UnsupportedVersion {
                version: header.version,
            });
        }

        // Everything below tracks the furthest relative offset used, which
        // is where the metadata ends and the tables begin.
        let mut metadata_end = HEADER_FIXED_LEN + 4 * header.rom_set_count as usize;

        let mut raw_sets = Vec::with_capacity(header.rom_set_count as usize);
        for &set_offset in &header.set_offsets {
            let at = header_offset + set_offset as usize;
            if set_offset as usize > MAX_HEADER_SCAN || at + SET_RECORD_FIXED_LEN > data.len() {
                return Err(ParseError::InconsistentOffset {
                    offset: set_offset as usize,
                });
            }

            let (_, record) = RomSetRecordRaw::from_bytes((&data[at..], 0)).map_err(|e| {
                ParseError::InvalidRecord {
                    detail: format!("ROM set record at {:#X}: {}", set_offset, e),
                }
            })?;

            metadata_end = metadata_end
                .max(set_offset as usize + SET_RECORD_FIXED_LEN + 4 * record.rom_count as usize);
            raw_sets.push((set_offset as usize, record));
        }

        let mut rom_sets = Vec::with_capacity(raw_sets.len());
        for (set_offset, record) in &raw_sets {
            let serve_mode = ServeMode::try_from_wire(record.serve_mode).ok_or_else(|| {
                ParseError::InvalidRecord {
                    detail: format!(
                        "ROM set at {:#X}: unknown serve mode {}",
                        set_offset, record.serve_mode
                    ),
                }
            })?;

            let with_filenames = record.extra_info & EXTRA_INFO_FILENAMES != 0;

            let mut roms = Vec::with_capacity(record.rom_count as usize);
            for &rom_offset in &record.rom_offsets {
                let (descriptor, end) =
                    parse_descriptor(data, header_offset, rom_offset as usize, with_filenames)?;
                metadata_end = metadata_end.max(end);
                roms.push(descriptor);
            }

            let firmware_overrides = if record.overrides_offset != ABSENT_OFFSET {
                let at = header_offset + record.overrides_offset as usize;
                let end = at + FIRMWARE_OVERRIDES_LEN;
                if end > data.len() {
                    return Err(ParseError::TruncatedImage {
                        needed: end,
                        actual: data.len(),
                    });
                }
                metadata_end =
                    metadata_end.max(record.overrides_offset as usize + FIRMWARE_OVERRIDES_LEN);
                Some(
                    FirmwareConfig::from_record(&data[at..end]).map_err(|e| {
                        ParseError::InvalidRecord {
                            detail: e.to_string(),
                        }
                    })?,
                )
            } else {
                None
            };

            let serve_alg_params = if record.params_offset != ABSENT_OFFSET {
                let at = header_offset + record.params_offset as usize;
                let end = at + SERVE_PARAMS_LEN;
                if end > data.len() {
                    return Err(ParseError::TruncatedImage {
                        needed: end,
                        actual: data.len(),
                    });
                }
                metadata_end = metadata_end.max(record.params_offset as usize + SERVE_PARAMS_LEN);
                Some(&data[at..end])
            } else {
                None
            };

            rom_sets.push(RomSetView {
                serve_mode,
                roms,
                firmware_overrides,
                serve_alg_params,
                table_offset: 0,
                table_size: record.table_size as usize,
            });
        }

        // Re-derive the table positions: tables follow the metadata in set
        // order, each aligned to its own size relative to the image base.
        let mut cursor = header_offset + metadata_end;
        for set in rom_sets.iter_mut() {
            if set.table_size == 0 {
                continue;
            }
            if !set.table_size.is_power_of_two() {
                return Err(ParseError::InvalidRecord {
                    detail: format!("table size {:#X} is not a power of two", set.table_size),
                });
            }
            let aligned = align_up(cursor, set.table_size);
            if aligned + set.table_size > data.len() {
                return Err(ParseError::TruncatedImage {
                    needed: aligned + set.table_size,
                    actual: data.len(),
                });
            }
            set.table_offset = aligned;
            cursor = aligned + set.table_size;
        }

        Ok(Self {
            data,
            header_offset,
            version: header.version,
            rom_sets,
        })
    }

    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn rom_sets(&self) -> &[RomSetView<'a>] {
        &self.rom_sets
    }

    /// The mangled table of set `index`, or None for table-less sets.
    pub fn table(&self, index: usize) -> Option<&'a [u8]> {
        let set = self.rom_sets.get(index)?;
        if set.table_size == 0 {
            return None;
        }
        Some(&self.data[set.table_offset..set.table_offset + set.table_size])
    }

    /// Recovers a ROM's logical bytes from its mangled table.
    ///
    /// Replays the address permutation for a representative activating
    /// tuple (all control lines at their active level; X jumpers selecting
    /// this ROM for banked and multi sets) and demangles each byte.
    pub fn demangle_rom(
        &self,
        set_index: usize,
        rom_index: usize,
        pin_map: &PinMap,
    ) -> Result<Vec<u8>, ParseError> {
        let set = self
            .rom_sets
            .get(set_index)
            .ok_or(ParseError::InconsistentOffset { offset: set_index })?;
        let rom = set
            .roms
            .get(rom_index)
            .ok_or(ParseError::InconsistentOffset { offset: rom_index })?;
        let table = self
            .table(set_index)
            .ok_or_else(|| ParseError::InvalidRecord {
                detail: "set carries no mangled table".to_string(),
            })?;

        let level = |state: CsLogic| if state == CsLogic::ActiveHigh { 1u8 } else { 0 };
        let cs = [
            level(rom.cs1_state),
            level(rom.cs2_state),
            level(rom.cs3_state),
        ];

        let (cs, x1, x2) = match set.serve_mode {
            ServeMode::Single => (cs, 0, 0),
            ServeMode::BankSwitched => {
                // Raw X levels that select this bank
                let logical = (rom_index as u8 & 1, (rom_index as u8 >> 1) & 1);
                let (x1, x2) = if pin_map.x_jumper_pull() == 1 {
                    logical
                } else {
                    (logical.0 ^ 1, logical.1 ^ 1)
                };
                (cs, x1, x2)
            }
            ServeMode::MultiAnyCs => {
                let active = level(rom.cs1_state);
                let inactive = active ^ 1;
                let mut levels = [inactive; 3];
                if rom_index < 3 {
                    levels[rom_index] = active;
                }
                ([levels[0], cs[1], cs[2]], levels[1], levels[2])
            }
        };

        let capacity = rom.chip_type.size_bytes();
        let mut out = Vec::with_capacity(capacity);
        for address in 0..capacity {
            let index = mangle_index(pin_map, rom.chip_type, address, cs, x1, x2);
            let byte = *table
                .get(index)
                .ok_or(ParseError::InconsistentOffset { offset: index })?;
            out.push(demangle_byte(byte, pin_map));
        }

        Ok(out)
    }
}

fn parse_descriptor<'a>(
    data: &'a [u8],
    header_offset: usize,
    rom_offset: usize,
    with_filename: bool,
) -> Result<(RomDescriptor<'a>, usize), ParseError> {
    let at = header_offset + rom_offset;
    if at + DESCRIPTOR_LEN > data.len() {
        return Err(ParseError::TruncatedImage {
            needed: at + DESCRIPTOR_LEN,
            actual: data.len(),
        });
    }

    let (_, raw) =
        RomDescriptorRaw::from_bytes((&data[at..], 0)).map_err(|e| ParseError::InvalidRecord {
            detail: format!("ROM descriptor at {:#X}: {}", rom_offset, e),
        })?;

    let chip_type =
        ChipType::try_from_wire(raw.chip_type).ok_or_else(|| ParseError::InvalidRecord {
            detail: format!("unknown chip type {}", raw.chip_type),
        })?;
    let cs_state = |value: u8, line: &str| {
        CsLogic::try_from_wire(value).ok_or_else(|| ParseError::InvalidRecord {
            detail: format!("invalid {} state {}", line, value),
        })
    };

    let mut end = rom_offset + DESCRIPTOR_LEN;
    let filename = if with_filename {
        let name_at = at + DESCRIPTOR_LEN;
        let terminator = data[name_at..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ParseError::TruncatedImage {
                needed: data.len() + 1,
                actual: data.len(),
            })?;
        let name = core::str::from_utf8(&data[name_at..name_at + terminator]).map_err(|_| {
            ParseError::InvalidRecord {
                detail: "filename is not valid UTF-8".to_string(),
            }
        })?;
        end += terminator + 1;
        Some(name)
    } else {
        None
    };

    Ok((
        RomDescriptor {
            chip_type,
            cs1_state: cs_state(raw.cs1_state, "cs1")?,
            cs2_state: cs_state(raw.cs2_state, "cs2")?,
            cs3_state: cs_state(raw.cs3_state, "cs3")?,
            filename,
        },
        end,
    ))
}
