// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Image composition.
//!
//! Assembles the firmware code region, the metadata header, the ROM set
//! records and their mangled tables into a single flashable image:
//!
//! ```text
//! +0                firmware code region (opaque)
//! align 16          metadata header: magic, version, set count, offset table
//! ...               ROM set records
//! ...               ROM descriptors (+ optional filenames)
//! ...               firmware override records (16 bytes each)
//! ...               serve-alg params records (8 bytes each)
//! align to size     mangled tables, each aligned to its own size
//! ```
//!
//! All integers are little-endian; offsets inside the metadata are relative
//! to the header start.  Tables carry no stored pointer - their positions
//! follow deterministically from the metadata end and the per-set sizes,
//! because each table is aligned to its own power-of-two size relative to
//! the image base.  Gaps are filled with 0xFF (erased flash).

use alloc::vec;
use alloc::vec::Vec;

use onerom_config::chip::ChipFunction;

use crate::builder::ComposeProps;
use crate::firmware::{FIRMWARE_OVERRIDES_LEN, SERVE_PARAMS_LEN};
use crate::image::RomSet;
use crate::{Error, HEADER_ALIGN, HEADER_MAGIC, METADATA_VERSION, PAD_METADATA_BYTE, Result};

/// Sentinel for an absent offset field.
pub const ABSENT_OFFSET: u32 = 0xFFFF_FFFF;

/// Fixed part of the metadata header, before the offset table.
pub const HEADER_FIXED_LEN: usize = 20;

/// Fixed part of a ROM set record, before the descriptor offsets.
pub const SET_RECORD_FIXED_LEN: usize = 16;

/// Fixed part of a ROM descriptor, before the optional filename.
pub const DESCRIPTOR_LEN: usize = 4;

/// extra_info flag: firmware overrides / serve-alg params present.
pub const EXTRA_INFO_OVERRIDES: u8 = 1 << 0;

/// extra_info flag: descriptors carry inline null-terminated filenames.
pub const EXTRA_INFO_FILENAMES: u8 = 1 << 1;

/// The header must start within this window for the parser's magic scan.
pub const MAX_HEADER_SCAN: usize = 4 * 1024 * 1024;

fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Where one ROM set's pieces ended up in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLayout {
    /// Offset of the set record, relative to the header.
    pub record_offset: usize,

    /// Offset of the mangled table from the image base.  Meaningless when
    /// `table_size` is zero (RAM sets carry no table).
    pub table_offset: usize,

    pub table_size: usize,
}

/// A composed image plus the layout the composer chose.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub bytes: Vec<u8>,

    /// Offset of the metadata header from the image base.
    pub header_offset: usize,

    pub sets: Vec<SetLayout>,
}

impl ComposedImage {
    /// The mangled table of set `index`, or None for table-less sets.
    pub fn table(&self, index: usize) -> Option<&[u8]> {
        let layout = self.sets.get(index)?;
        if layout.table_size == 0 {
            return None;
        }
        Some(&self.bytes[layout.table_offset..layout.table_offset + layout.table_size])
    }
}

/// Composes the full image from built ROM sets.
pub fn compose(rom_sets: &[RomSet], props: &ComposeProps) -> Result<ComposedImage> {
    let header_offset = align_up(props.fw_image.len(), HEADER_ALIGN);
    if header_offset + HEADER_FIXED_LEN > MAX_HEADER_SCAN {
        return Err(Error::FlashOverflow {
            required: header_offset + HEADER_FIXED_LEN,
            capacity: MAX_HEADER_SCAN,
        });
    }

    // Table sizes first - they also reject unsupported chip types.  RAM
    // sets are served from RAM at runtime and carry no table.
    let mut table_sizes = Vec::with_capacity(rom_sets.len());
    for set in rom_sets {
        let size = if set.chip_function() == ChipFunction::Ram && !set.has_data() {
            0
        } else {
            set.table_size(props.pin_map)?
        };
        table_sizes.push(size);
    }

    // Lay out the metadata, all offsets relative to the header.
    let mut offset = HEADER_FIXED_LEN + 4 * rom_sets.len();

    let mut record_offsets = Vec::with_capacity(rom_sets.len());
    for set in rom_sets {
        record_offsets.push(offset);
        offset += SET_RECORD_FIXED_LEN + 4 * set.roms.len();
    }

    let mut descriptor_offsets: Vec<Vec<usize>> = Vec::with_capacity(rom_sets.len());
    for set in rom_sets {
        let mut offsets = Vec::with_capacity(set.roms.len());
        for rom in &set.roms {
            offsets.push(offset);
            offset += DESCRIPTOR_LEN;
            if props.filenames {
                offset += rom.source_name().len() + 1;
            }
        }
        descriptor_offsets.push(offsets);
    }

    let mut override_offsets = Vec::with_capacity(rom_sets.len());
    for set in rom_sets {
        if set.firmware_overrides.is_some() {
            override_offsets.push(Some(offset));
            offset += FIRMWARE_OVERRIDES_LEN;
        } else {
            override_offsets.push(None);
        }
    }

    let mut params_offsets = Vec::with_capacity(rom_sets.len());
    for set in rom_sets {
        if set.serve_alg_params.is_some() {
            params_offsets.push(Some(offset));
            offset += SERVE_PARAMS_LEN;
        } else {
            params_offsets.push(None);
        }
    }

    let metadata_len = offset;

    // Tables follow the metadata, each aligned to its own size relative to
    // the image base so the runtime can use the base address as the high
    // bits of a pointer.
    let mut cursor = header_offset + metadata_len;
    let mut sets = Vec::with_capacity(rom_sets.len());
    for (ii, &size) in table_sizes.iter().enumerate() {
        let table_offset = if size == 0 {
            0
        } else {
            let aligned = align_up(cursor, size);
            cursor = aligned + size;
            aligned
        };
        sets.push(SetLayout {
            record_offset: record_offsets[ii],
            table_offset,
            table_size: size,
        });
    }

    let total = cursor;
    if total > props.flash_size {
        return Err(Error::FlashOverflow {
            required: total,
            capacity: props.flash_size,
        });
    }

    let mut bytes = vec![PAD_METADATA_BYTE; total];
    bytes[..props.fw_image.len()].copy_from_slice(props.fw_image);

    // Header
    let header = &mut bytes[header_offset..];
    header[0..16].copy_from_slice(HEADER_MAGIC);
    header[16] = METADATA_VERSION;
    header[17] = rom_sets.len() as u8;
    header[18] = PAD_METADATA_BYTE;
    header[19] = PAD_METADATA_BYTE;
    for (ii, &record_offset) in record_offsets.iter().enumerate() {
        let at = HEADER_FIXED_LEN + 4 * ii;
        header[at..at + 4].copy_from_slice(&(record_offset as u32).to_le_bytes());
    }

    // Set records
    for (ii, set) in rom_sets.iter().enumerate() {
        let mut extra_info = 0u8;
        if set.firmware_overrides.is_some() || set.serve_alg_params.is_some() {
            extra_info |= EXTRA_INFO_OVERRIDES;
        }
        if props.filenames {
            extra_info |= EXTRA_INFO_FILENAMES;
        }

        let at = record_offsets[ii];
        let record = &mut bytes[header_offset + at..];
        record[0] = set.roms.len() as u8;
        record[1] = set.serve_mode.wire_value();
        record[2] = extra_info;
        record[3] = PAD_METADATA_BYTE;
        record[4..8].copy_from_slice(&(table_sizes[ii] as u32).to_le_bytes());
        let overrides_off = override_offsets[ii].map_or(ABSENT_OFFSET, |o| o as u32);
        record[8..12].copy_from_slice(&overrides_off.to_le_bytes());
        let params_off = params_offsets[ii].map_or(ABSENT_OFFSET, |o| o as u32);
        record[12..16].copy_from_slice(&params_off.to_le_bytes());
        for (jj, &desc_off) in descriptor_offsets[ii].iter().enumerate() {
            let at = SET_RECORD_FIXED_LEN + 4 * jj;
            record[at..at + 4].copy_from_slice(&(desc_off as u32).to_le_bytes());
        }
    }

    // ROM descriptors
    for (ii, set) in rom_sets.iter().enumerate() {
        for (jj, rom) in set.roms.iter().enumerate() {
            let at = header_offset + descriptor_offsets[ii][jj];
            bytes[at] = rom.chip_type().wire_value();
            bytes[at + 1] = rom.cs_state(1).wire_value();
            bytes[at + 2] = rom.cs_state(2).wire_value();
            bytes[at + 3] = rom.cs_state(3).wire_value();
            if props.filenames {
                let name = rom.source_name().as_bytes();
                let at = at + DESCRIPTOR_LEN;
                bytes[at..at + name.len()].copy_from_slice(name);
                bytes[at + name.len()] = 0;
            }
        }
    }

    // Firmware overrides and serve-alg params
    for (ii, set) in rom_sets.iter().enumerate() {
        if let Some(ref overrides) = set.firmware_overrides {
            let at = header_offset + override_offsets[ii].unwrap();
            overrides.write_record(&mut bytes[at..at + FIRMWARE_OVERRIDES_LEN])?;
        }
        if let Some(ref params) = set.serve_alg_params {
            params.validate()?;
            let at = header_offset + params_offsets[ii].unwrap();
            bytes[at..at + SERVE_PARAMS_LEN].copy_from_slice(&params.params);
        }
    }

    // Mangled tables
    for (ii, set) in rom_sets.iter().enumerate() {
        if table_sizes[ii] == 0 {
            continue;
        }
        let table = set.build_table(props.pin_map)?;
        debug_assert_eq!(table.len(), table_sizes[ii]);
        let at = sets[ii].table_offset;
        bytes[at..at + table.len()].copy_from_slice(&table);
    }

    Ok(ComposedImage {
        bytes,
        header_offset,
        sets,
    })
}
