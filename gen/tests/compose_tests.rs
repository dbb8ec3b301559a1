// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Tests for the onerom-gen Builder and composer.
//!
//! Progressive validation of the composed image layout.  The tests parse
//! the produced bytes by hand against the published layout rather than
//! going through the parser crate, so the two sides stay independently
//! honest.
//!
//! # Test Plan
//!
//! ## Phase 1: Header Structure
//! - [x] Magic, version, set count at the right offsets
//! - [x] Header placed at the first 16-byte boundary after the code region
//! - [x] Offset table entries point at valid records
//!
//! ## Phase 2: ROM Set Records
//! - [x] rom_count / serve_mode / extra_info / table size fields
//! - [x] Descriptor offset arrays
//! - [x] Override and params sentinels when absent
//!
//! ## Phase 3: Mangled Tables
//! - [x] Table aligned to its own size relative to the image base
//! - [x] Activating tuples demangle to source bytes
//! - [x] Non-activating tuples demangle to the fill byte
//!
//! ## Phase 4: Overrides and Params
//! - [x] 16-byte override record content (present/value bitmaps, freqs, vreg)
//! - [x] 8-byte serve-alg params passed through verbatim
//!
//! ## Phase 5: Determinism and Boundaries
//! - [x] Identical inputs compose bit-identical images
//! - [x] Zero ROM sets
//! - [x] Flash overflow rejection

use onerom_config::chip::ChipType;
use onerom_config::hw::{PinMap, lookup_pcb};
use onerom_gen::builder::{Builder, ComposeProps, FileData};
use onerom_gen::image::{demangle_byte, mangle_index};
use onerom_gen::{ComposedImage, Error, FILL_BYTE, HEADER_MAGIC, METADATA_VERSION};

// ============================================================================
// Constants from the published layout
// ============================================================================

const HEADER_FIXED_LEN: usize = 20;
const SET_RECORD_FIXED_LEN: usize = 16;
const ABSENT: u32 = 0xFFFF_FFFF;

// ============================================================================
// Helpers: hand-parse the metadata
// ============================================================================

#[derive(Debug)]
struct Header {
    magic: [u8; 16],
    version: u8,
    set_count: u8,
    set_offsets: Vec<u32>,
}

impl Header {
    fn parse(image: &ComposedImage) -> Self {
        let buf = &image.bytes[image.header_offset..];
        let mut magic = [0u8; 16];
        magic.copy_from_slice(&buf[0..16]);
        let version = buf[16];
        let set_count = buf[17];
        let set_offsets = (0..set_count as usize)
            .map(|ii| {
                let at = HEADER_FIXED_LEN + 4 * ii;
                u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
            })
            .collect();
        Self {
            magic,
            version,
            set_count,
            set_offsets,
        }
    }

    fn validate_basic(&self) {
        assert_eq!(&self.magic, HEADER_MAGIC, "magic mismatch");
        assert_eq!(self.version, METADATA_VERSION, "version mismatch");
        assert_eq!(self.set_offsets.len(), self.set_count as usize);
    }
}

#[derive(Debug)]
struct SetRecord {
    rom_count: u8,
    serve_mode: u8,
    extra_info: u8,
    table_size: u32,
    overrides_offset: u32,
    params_offset: u32,
    descriptor_offsets: Vec<u32>,
}

impl SetRecord {
    fn parse(image: &ComposedImage, record_offset: usize) -> Self {
        let buf = &image.bytes[image.header_offset + record_offset..];
        let rom_count = buf[0];
        let descriptor_offsets = (0..rom_count as usize)
            .map(|ii| {
                let at = SET_RECORD_FIXED_LEN + 4 * ii;
                u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
            })
            .collect();
        Self {
            rom_count,
            serve_mode: buf[1],
            extra_info: buf[2],
            table_size: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            overrides_offset: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            params_offset: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            descriptor_offsets,
        }
    }
}

fn compose(json: &str, files: Vec<(usize, Vec<u8>)>, rev: &str) -> (ComposedImage, PinMap) {
    let mut builder = Builder::from_json(json).expect("config should parse");
    for (id, data) in files {
        builder.add_file(FileData { id, data }).unwrap();
    }
    let pin_map = lookup_pcb(rev).unwrap();
    let firmware = vec![0x5Au8; 30000];
    let image = builder
        .compose(&ComposeProps::new(&pin_map, &firmware))
        .expect("compose should succeed");
    (image, pin_map)
}

fn kernal_bytes() -> Vec<u8> {
    (0..8192u32).map(|ii| (ii.wrapping_mul(31) % 256) as u8).collect()
}

// ============================================================================
// Phase 1/2: header and record structure
// ============================================================================

#[test]
fn test_header_basic() {
    let json = r#"{
        "version": 1,
        "description": "one set",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let (image, _) = compose(json, vec![(0, kernal_bytes())], "fire-24-d");

    // Header lands at the first 16-byte boundary after the 30000-byte code
    assert_eq!(image.header_offset, 30000_usize.div_ceil(16) * 16);

    let header = Header::parse(&image);
    header.validate_basic();
    assert_eq!(header.set_count, 1);

    let record = SetRecord::parse(&image, header.set_offsets[0] as usize);
    assert_eq!(record.rom_count, 1);
    assert_eq!(record.serve_mode, 0); // single
    assert_eq!(record.extra_info, 0);
    assert_eq!(record.table_size, 65536);
    assert_eq!(record.overrides_offset, ABSENT);
    assert_eq!(record.params_offset, ABSENT);

    // Descriptor: chip type 2364 (wire 2), cs1 active low, cs2/cs3 unused
    let desc_at = image.header_offset + record.descriptor_offsets[0] as usize;
    assert_eq!(image.bytes[desc_at], 2);
    assert_eq!(image.bytes[desc_at + 1], 0);
    assert_eq!(image.bytes[desc_at + 2], 2);
    assert_eq!(image.bytes[desc_at + 3], 2);
}

#[test]
fn test_five_single_sets_in_declaration_order() {
    // VIC-20 style: five single sets, selected by image select jumpers
    let mut sets = Vec::new();
    for _ in 0..5 {
        sets.push(
            r#"{
                "type": "single",
                "roms": [{"file": "rom.bin", "type": "2364", "cs1": "active_low"}]
            }"#
            .to_string(),
        );
    }
    let json = format!(
        r#"{{"version": 1, "description": "vic20 ntsc", "rom_sets": [{}]}}"#,
        sets.join(",")
    );

    let files: Vec<(usize, Vec<u8>)> = (0..5).map(|ii| (ii, vec![ii as u8; 8192])).collect();
    let (image, pin_map) = compose(&json, files, "ice-24-j");

    let header = Header::parse(&image);
    header.validate_basic();
    assert_eq!(header.set_count, 5);

    // Records appear in declaration order and tables carry each set's data
    for ii in 0..5 {
        let record = SetRecord::parse(&image, header.set_offsets[ii] as usize);
        assert_eq!(record.rom_count, 1);
        assert_eq!(record.table_size, 16384);

        let table = image.table(ii).unwrap();
        let index = mangle_index(&pin_map, ChipType::Chip2364, 0, [0, 0, 0], 0, 0);
        assert_eq!(demangle_byte(table[index], &pin_map), ii as u8);
    }
}

#[test]
fn test_filenames_flag_embeds_names() {
    let json = r#"{
        "version": 1,
        "description": "named",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal-901486-06.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let mut builder = Builder::from_json(json).unwrap();
    builder
        .add_file(FileData {
            id: 0,
            data: kernal_bytes(),
        })
        .unwrap();
    let pin_map = lookup_pcb("ice-24-j").unwrap();
    let firmware = vec![0u8; 1024];
    let image = builder
        .compose(&ComposeProps::new(&pin_map, &firmware).with_filenames(true))
        .unwrap();

    let header = Header::parse(&image);
    let record = SetRecord::parse(&image, header.set_offsets[0] as usize);
    assert_eq!(record.extra_info & 0x02, 0x02);

    let desc_at = image.header_offset + record.descriptor_offsets[0] as usize;
    let name_at = desc_at + 4;
    let name_end = name_at + "kernal-901486-06.bin".len();
    assert_eq!(&image.bytes[name_at..name_end], b"kernal-901486-06.bin");
    assert_eq!(image.bytes[name_end], 0);
}

// ============================================================================
// Phase 3: mangled tables
// ============================================================================

#[test]
fn test_single_2364_kernal_on_fire() {
    // Address on GPIO 8-20, CS1 on GPIO 21, data on GPIO 0-7: table is
    // 64KB, index 0 holds source[0], CS1 high demangles to the fill byte.
    let json = r#"{
        "version": 1,
        "description": "kernal",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let source = kernal_bytes();
    let (image, pin_map) = compose(json, vec![(0, source.clone())], "fire-24-d");

    let table = image.table(0).unwrap();
    assert_eq!(table.len(), 65536);

    assert_eq!(
        mangle_index(&pin_map, ChipType::Chip2364, 0, [0, 0, 0], 0, 0),
        0
    );
    assert_eq!(demangle_byte(table[0], &pin_map), source[0]);

    // CS1 = 1: GPIO 21 shifts down to index bit 13
    let inactive = mangle_index(&pin_map, ChipType::Chip2364, 0, [1, 0, 0], 0, 0);
    assert_eq!(inactive, 1 << 13);
    assert_eq!(demangle_byte(table[inactive], &pin_map), FILL_BYTE);

    for addr in (0..8192).step_by(997) {
        let index = mangle_index(&pin_map, ChipType::Chip2364, addr, [0, 0, 0], 0, 0);
        assert_eq!(demangle_byte(table[index], &pin_map), source[addr]);
    }
}

#[test]
fn test_table_alignment_power_of_two() {
    // Two sets of different table sizes; each table offset must be a
    // multiple of its own size relative to the image base.
    let json = r#"{
        "version": 1,
        "description": "two sets",
        "rom_sets": [
            {"type": "single", "roms": [{"file": "a.bin", "type": "2364", "cs1": "active_low"}]},
            {"type": "single", "roms": [{"file": "b.bin", "type": "2332", "cs1": "active_low", "cs2": "active_low"}]}
        ]
    }"#;
    let files = vec![(0, vec![1u8; 8192]), (1, vec![2u8; 4096])];
    let (image, _) = compose(json, files, "ice-24-j");

    for layout in &image.sets {
        assert!(layout.table_size > 0);
        assert_eq!(
            layout.table_offset % layout.table_size,
            0,
            "table at {:#X} not aligned to size {:#X}",
            layout.table_offset,
            layout.table_size
        );
    }
    // Tables don't overlap and sit after the metadata
    assert!(image.sets[0].table_offset >= image.header_offset);
    assert!(
        image.sets[1].table_offset >= image.sets[0].table_offset + image.sets[0].table_size
            || image.sets[0].table_offset >= image.sets[1].table_offset + image.sets[1].table_size
    );
}

#[test]
fn test_banked_character_roms() {
    // Four banked character ROMs; X jumpers select the bank.  fire-24-a
    // pulls X up (no inversion), fire-24-d pulls down (inverted).
    let json = r#"{
        "version": 1,
        "description": "banked chargen",
        "rom_sets": [{
            "type": "banked",
            "roms": [
                {"file": "bank0.bin", "type": "2364", "cs1": "active_low"},
                {"file": "bank1.bin", "type": "2364", "cs1": "active_low"},
                {"file": "bank2.bin", "type": "2364", "cs1": "active_low"},
                {"file": "bank3.bin", "type": "2364", "cs1": "active_low"}
            ]
        }]
    }"#;
    let files: Vec<(usize, Vec<u8>)> = (0..4).map(|ii| (ii, vec![0xB0 + ii as u8; 8192])).collect();
    let (image, pin_map) = compose(json, files.clone(), "fire-24-d");

    let header = Header::parse(&image);
    let record = SetRecord::parse(&image, header.set_offsets[0] as usize);
    assert_eq!(record.rom_count, 4);
    assert_eq!(record.serve_mode, 2); // bank_switched

    let table = image.table(0).unwrap();

    // Jumpers pull up, MCU pulls down (pull = 0): raw X1=0/X2=1 reads as
    // logical X1=1, X2=0, selecting bank 1.
    let index = mangle_index(&pin_map, ChipType::Chip2364, 0, [0, 0, 0], 0, 1);
    assert_eq!(demangle_byte(table[index], &pin_map), 0xB1);

    // All jumpers closed (raw 0,0) reads logical 1,1: bank 3
    let index = mangle_index(&pin_map, ChipType::Chip2364, 0, [0, 0, 0], 0, 0);
    assert_eq!(demangle_byte(table[index], &pin_map), 0xB3);
}

#[test]
fn test_banked_three_roms_wraps() {
    let json = r#"{
        "version": 1,
        "description": "banked x3",
        "rom_sets": [{
            "type": "banked",
            "roms": [
                {"file": "bank0.bin", "type": "2364", "cs1": "active_low"},
                {"file": "bank1.bin", "type": "2364", "cs1": "active_low"},
                {"file": "bank2.bin", "type": "2364", "cs1": "active_low"}
            ]
        }]
    }"#;
    let files: Vec<(usize, Vec<u8>)> = (0..3).map(|ii| (ii, vec![0xC0 + ii as u8; 8192])).collect();
    let (image, pin_map) = compose(json, files, "fire-24-a");

    let table = image.table(0).unwrap();
    // Bank 3 (x1 = x2 = 1, pull up so no inversion) wraps to ROM 0
    let index = mangle_index(&pin_map, ChipType::Chip2364, 100, [0, 0, 0], 1, 1);
    assert_eq!(demangle_byte(table[index], &pin_map), 0xC0);
}

#[test]
fn test_27128_ce_oe_gating() {
    // 27 series EPROM on the 28-pin board: CE and OE both active low.
    // Only the (ce=0, oe=0) tuple serves data.
    let json = r#"{
        "version": 1,
        "description": "eprom",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "eprom.bin", "type": "27128"}]
        }]
    }"#;
    let source: Vec<u8> = (0..16384u32).map(|ii| (ii % 253) as u8) .collect();
    let (image, pin_map) = compose(json, vec![(0, source.clone())], "ice-28-a");

    let table = image.table(0).unwrap();
    assert_eq!(table.len(), 65536);

    for addr in (0..16384).step_by(1283) {
        let active = mangle_index(&pin_map, ChipType::Chip27128, addr, [0, 0, 0], 0, 0);
        assert_eq!(demangle_byte(table[active], &pin_map), source[addr]);

        for cs in [[1, 0, 0], [0, 1, 0], [1, 1, 0]] {
            let inactive = mangle_index(&pin_map, ChipType::Chip27128, addr, cs, 0, 0);
            assert_eq!(demangle_byte(table[inactive], &pin_map), FILL_BYTE);
        }
    }
}

#[test]
fn test_2732_address_swap() {
    // The 2732 carries A11 on physical pin 21, so its table places source
    // bytes with the A11/A12 index bits exchanged relative to a 2332.
    let json = r#"{
        "version": 1,
        "description": "2732",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "eprom.bin", "type": "2732"}]
        }]
    }"#;
    let mut source = vec![0u8; 4096];
    source[0x800] = 0xD5; // A11 set
    let (image, pin_map) = compose(json, vec![(0, source)], "ice-24-j");

    let table = image.table(0).unwrap();
    // A11 lands on index bit 12 for the 2732 (the A12-position GPIO)
    let index = mangle_index(&pin_map, ChipType::Chip2732, 0x800, [0, 0, 0], 0, 0);
    assert_eq!(index, 1 << 12);
    assert_eq!(demangle_byte(table[index], &pin_map), 0xD5);
    // Bit 11 is the 2732's CE - raising it deactivates the chip
    assert_eq!(demangle_byte(table[1 << 11], &pin_map), FILL_BYTE);
    // A 2332 on the same board keeps A11 on bit 11
    let index_2332 = mangle_index(&pin_map, ChipType::Chip2332, 0x800, [0, 0, 0], 0, 0);
    assert_eq!(index_2332, 1 << 11);
}

// ============================================================================
// Phase 4: overrides and params
// ============================================================================

#[test]
fn test_firmware_overrides_record() {
    // Fire at 300MHz with overclock and 1.20V vreg: present bits 2/3/4,
    // fire_freq 300, vreg code 0x0D.
    let json = r#"{
        "version": 1,
        "description": "overclocked",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}],
            "firmware_overrides": {
                "fire": {"cpu_freq": 300, "overclock": true, "vreg": "1.20V"}
            }
        }]
    }"#;
    let (image, _) = compose(json, vec![(0, kernal_bytes())], "fire-24-d");

    let header = Header::parse(&image);
    let record = SetRecord::parse(&image, header.set_offsets[0] as usize);
    assert_eq!(record.extra_info & 0x01, 0x01);
    assert_ne!(record.overrides_offset, ABSENT);
    assert_eq!(record.params_offset, ABSENT);

    let at = image.header_offset + record.overrides_offset as usize;
    let overrides = &image.bytes[at..at + 16];
    assert_eq!(overrides[0], 0b0001_1100); // present: bits 2, 3, 4
    assert_eq!(overrides[1], 0b0000_0010); // value: fire overclock on
    assert_eq!(u16::from_le_bytes([overrides[2], overrides[3]]), 0xFFFF); // ice stock
    assert_eq!(u16::from_le_bytes([overrides[4], overrides[5]]), 300);
    assert_eq!(overrides[6], 0x0D);
}

#[test]
fn test_serve_alg_params_passthrough() {
    let json = r#"{
        "version": 1,
        "description": "params",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}],
            "serve_alg_params": {"params": [254, 10, 20, 30, 40, 50, 254, 255]}
        }]
    }"#;
    let (image, _) = compose(json, vec![(0, kernal_bytes())], "fire-24-d");

    let header = Header::parse(&image);
    let record = SetRecord::parse(&image, header.set_offsets[0] as usize);
    assert_eq!(record.extra_info & 0x01, 0x01);
    assert_ne!(record.params_offset, ABSENT);

    let at = image.header_offset + record.params_offset as usize;
    assert_eq!(
        &image.bytes[at..at + 8],
        &[0xFE, 10, 20, 30, 40, 50, 0xFE, 0xFF]
    );
}

// ============================================================================
// Phase 5: determinism and boundaries
// ============================================================================

#[test]
fn test_determinism() {
    let json = r#"{
        "version": 1,
        "description": "determinism",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let (image_a, _) = compose(json, vec![(0, kernal_bytes())], "fire-24-d");
    let (image_b, _) = compose(json, vec![(0, kernal_bytes())], "fire-24-d");
    assert_eq!(image_a.bytes, image_b.bytes);
}

#[test]
fn test_empty_config() {
    let json = r#"{"version": 1, "description": "empty", "rom_sets": []}"#;
    let (image, _) = compose(json, vec![], "ice-24-j");

    let header = Header::parse(&image);
    assert_eq!(&header.magic, HEADER_MAGIC);
    assert_eq!(header.set_count, 0);
    assert!(header.set_offsets.is_empty());
    // Image is just the padded code region plus the fixed header
    assert_eq!(image.bytes.len(), image.header_offset + 20);
}

#[test]
fn test_flash_overflow_rejected() {
    let json = r#"{
        "version": 1,
        "description": "too big",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let mut builder = Builder::from_json(json).unwrap();
    builder
        .add_file(FileData {
            id: 0,
            data: kernal_bytes(),
        })
        .unwrap();
    let pin_map = lookup_pcb("fire-24-d").unwrap();
    let firmware = vec![0u8; 30000];
    let result = builder.compose(
        &ComposeProps::new(&pin_map, &firmware).with_flash_size(64 * 1024),
    );
    assert!(matches!(result, Err(Error::FlashOverflow { .. })));
}

#[test]
fn test_missing_file_rejected() {
    let json = r#"{
        "version": 1,
        "description": "missing",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let builder = Builder::from_json(json).unwrap();
    let pin_map = lookup_pcb("fire-24-d").unwrap();
    let firmware = vec![0u8; 1024];
    let result = builder.compose(&ComposeProps::new(&pin_map, &firmware));
    assert!(matches!(result, Err(Error::MissingFile { id: 0 })));
}

#[test]
fn test_socket_mismatch_rejected() {
    // 28-pin chip on a 24-pin board
    let json = r#"{
        "version": 1,
        "description": "mismatch",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "eprom.bin", "type": "27128"}]
        }]
    }"#;
    let mut builder = Builder::from_json(json).unwrap();
    builder
        .add_file(FileData {
            id: 0,
            data: vec![0; 16384],
        })
        .unwrap();
    let pin_map = lookup_pcb("ice-24-j").unwrap();
    let firmware = vec![0u8; 1024];
    let result = builder.compose(&ComposeProps::new(&pin_map, &firmware));
    assert!(matches!(result, Err(Error::SocketMismatch { .. })));
}

#[test]
fn test_multi_set_on_28_pin_board_rejected() {
    let json = r#"{
        "version": 1,
        "description": "multi on 28",
        "rom_sets": [{
            "type": "multi",
            "roms": [
                {"file": "a.bin", "type": "23128", "cs1": "active_low", "cs2": "not_used", "cs3": "not_used"},
                {"file": "b.bin", "type": "23128", "cs1": "active_low", "cs2": "not_used", "cs3": "not_used"}
            ]
        }]
    }"#;
    let mut builder = Builder::from_json(json).unwrap();
    builder
        .add_file(FileData {
            id: 0,
            data: vec![0; 16384],
        })
        .unwrap();
    builder
        .add_file(FileData {
            id: 1,
            data: vec![1; 16384],
        })
        .unwrap();
    let pin_map = lookup_pcb("ice-28-a").unwrap();
    let firmware = vec![0u8; 1024];
    let result = builder.compose(&ComposeProps::new(&pin_map, &firmware));
    assert!(matches!(result, Err(Error::MultiSetsUnsupported)));
}
