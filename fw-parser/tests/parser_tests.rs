// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Round-trip tests: compose an image with onerom-gen, parse it back, and
//! check the parsed structure and recovered ROM bytes match the inputs.

use onerom_config::chip::{ChipType, CsLogic};
use onerom_config::fw::{FireServeMode, ServeMode};
use onerom_config::hw::{PinMap, lookup_pcb};
use onerom_fw_parser::{Image, ParseError};
use onerom_gen::builder::{Builder, ComposeProps, FileData};

fn compose(
    json: &str,
    files: Vec<(usize, Vec<u8>)>,
    rev: &str,
    filenames: bool,
) -> (Vec<u8>, PinMap) {
    let mut builder = Builder::from_json(json).expect("config should parse");
    for (id, data) in files {
        builder.add_file(FileData { id, data }).unwrap();
    }
    let pin_map = lookup_pcb(rev).unwrap();
    let firmware = vec![0xEEu8; 20480];
    let image = builder
        .compose(&ComposeProps::new(&pin_map, &firmware).with_filenames(filenames))
        .expect("compose should succeed");
    (image.bytes, pin_map)
}

#[test]
fn test_parse_single_set() {
    let json = r#"{
        "version": 1,
        "description": "single",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let source: Vec<u8> = (0..8192u32).map(|ii| (ii % 256) as u8).collect();
    let (bytes, _) = compose(json, vec![(0, source)], "fire-24-d", false);

    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.version(), 1);
    assert_eq!(image.rom_sets().len(), 1);

    let set = &image.rom_sets()[0];
    assert_eq!(set.serve_mode, ServeMode::Single);
    assert_eq!(set.rom_count(), 1);
    assert_eq!(set.table_size, 65536);
    assert_eq!(set.table_offset % set.table_size, 0);

    let rom = &set.roms[0];
    assert_eq!(rom.chip_type, ChipType::Chip2364);
    assert_eq!(rom.cs1_state, CsLogic::ActiveLow);
    assert_eq!(rom.cs2_state, CsLogic::NotUsed);
    assert_eq!(rom.cs3_state, CsLogic::NotUsed);
    assert_eq!(rom.filename, None);
    assert!(set.firmware_overrides.is_none());
    assert!(set.serve_alg_params.is_none());
}

#[test]
fn test_parse_five_sets_in_order() {
    // Image select value picks the set at boot; the parser must return
    // sets in declaration order for the selection to line up.
    let mut sets = Vec::new();
    for ii in 0..5 {
        sets.push(format!(
            r#"{{
                "type": "single",
                "roms": [{{"file": "rom{}.bin", "type": "2364", "cs1": "active_low"}}]
            }}"#,
            ii
        ));
    }
    let json = format!(
        r#"{{"version": 1, "description": "vic20", "rom_sets": [{}]}}"#,
        sets.join(",")
    );
    let files: Vec<(usize, Vec<u8>)> = (0..5).map(|ii| (ii, vec![ii as u8; 8192])).collect();
    let (bytes, pin_map) = compose(&json, files, "ice-24-j", true);

    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.rom_sets().len(), 5);
    for (ii, set) in image.rom_sets().iter().enumerate() {
        assert_eq!(set.roms[0].filename, Some(format!("rom{}.bin", ii).as_str()));
        let recovered = image.demangle_rom(ii, 0, &pin_map).unwrap();
        assert_eq!(recovered, vec![ii as u8; 8192]);
    }
}

#[test]
fn test_parse_firmware_overrides() {
    let json = r#"{
        "version": 1,
        "description": "overrides",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}],
            "firmware_overrides": {
                "fire": {"cpu_freq": 300, "overclock": true, "vreg": "1.20V"},
                "led": {"enabled": true}
            },
            "serve_alg_params": {"params": [254, 1, 2, 3, 4, 5, 254, 255]}
        }]
    }"#;
    let (bytes, _) = compose(json, vec![(0, vec![0u8; 8192])], "fire-24-d", false);

    let image = Image::parse(&bytes).unwrap();
    let set = &image.rom_sets()[0];

    let overrides = set.firmware_overrides.as_ref().unwrap();
    let fire = overrides.fire.as_ref().unwrap();
    assert_eq!(fire.cpu_freq.unwrap().get(), 300);
    assert_eq!(fire.overclock, Some(true));
    assert_eq!(fire.vreg.map(|v| v as u8), Some(0x0D));
    assert_eq!(fire.serve_mode, None);
    assert!(overrides.ice.is_none());
    assert!(overrides.led.as_ref().unwrap().enabled);

    assert_eq!(
        set.serve_alg_params.unwrap(),
        &[0xFE, 1, 2, 3, 4, 5, 0xFE, 0xFF]
    );
}

#[test]
fn test_parse_fire_serve_mode_override() {
    let json = r#"{
        "version": 1,
        "description": "pio",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}],
            "firmware_overrides": {"fire": {"serve_mode": "Pio"}}
        }]
    }"#;
    let (bytes, _) = compose(json, vec![(0, vec![0u8; 8192])], "fire-24-d", false);

    let image = Image::parse(&bytes).unwrap();
    let overrides = image.rom_sets()[0].firmware_overrides.as_ref().unwrap();
    assert_eq!(
        overrides.fire.as_ref().unwrap().serve_mode,
        Some(FireServeMode::Pio)
    );
}

#[test]
fn test_parse_empty_image() {
    let json = r#"{"version": 1, "description": "empty", "rom_sets": []}"#;
    let (bytes, _) = compose(json, vec![], "ice-24-j", false);

    let image = Image::parse(&bytes).unwrap();
    assert!(image.rom_sets().is_empty());
}

#[test]
fn test_demangle_banked_set() {
    let json = r#"{
        "version": 1,
        "description": "banked",
        "rom_sets": [{
            "type": "banked",
            "roms": [
                {"file": "b0.bin", "type": "2364", "cs1": "active_low"},
                {"file": "b1.bin", "type": "2364", "cs1": "active_low"},
                {"file": "b2.bin", "type": "2364", "cs1": "active_low"},
                {"file": "b3.bin", "type": "2364", "cs1": "active_low"}
            ]
        }]
    }"#;
    let files: Vec<(usize, Vec<u8>)> = (0..4)
        .map(|ii| {
            let data: Vec<u8> = (0..8192u32).map(|a| ((a as usize + ii * 37) % 256) as u8).collect();
            (ii, data)
        })
        .collect();
    let (bytes, pin_map) = compose(json, files.clone(), "fire-24-d", false);

    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.rom_sets()[0].serve_mode, ServeMode::BankSwitched);
    for (ii, (_, source)) in files.iter().enumerate() {
        let recovered = image.demangle_rom(0, ii, &pin_map).unwrap();
        assert_eq!(&recovered, source, "bank {} mismatch", ii);
    }
}

#[test]
fn test_demangle_multi_set() {
    let json = r#"{
        "version": 1,
        "description": "multi",
        "rom_sets": [{
            "type": "multi",
            "roms": [
                {"file": "kernal.bin", "type": "2364", "cs1": "active_low"},
                {"file": "basic.bin", "type": "2364", "cs1": "active_low"},
                {"file": "chargen.bin", "type": "2364", "cs1": "active_low"}
            ]
        }]
    }"#;
    let files: Vec<(usize, Vec<u8>)> = (0..3)
        .map(|ii| (ii, vec![0x40 + ii as u8; 8192]))
        .collect();
    let (bytes, pin_map) = compose(json, files.clone(), "ice-24-j", false);

    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.rom_sets()[0].serve_mode, ServeMode::MultiAnyCs);
    for (ii, (_, source)) in files.iter().enumerate() {
        let recovered = image.demangle_rom(0, ii, &pin_map).unwrap();
        assert_eq!(&recovered, source, "rom {} mismatch", ii);
    }
}

#[test]
fn test_parse_rejects_garbage() {
    let bytes = vec![0u8; 4096];
    assert!(matches!(Image::parse(&bytes), Err(ParseError::BadMagic)));
}

#[test]
fn test_parse_rejects_bad_version() {
    let json = r#"{"version": 1, "description": "v", "rom_sets": []}"#;
    let (mut bytes, _) = compose(json, vec![], "ice-24-j", false);

    let image = Image::parse(&bytes).unwrap();
    let header_offset = image.header_offset();
    drop(image);
    bytes[header_offset + 16] = 9;

    assert!(matches!(
        Image::parse_at(&bytes, header_offset),
        Err(ParseError::UnsupportedVersion { version: 9 })
    ));
}

#[test]
fn test_parse_rejects_truncated_offset_table() {
    let json = r#"{
        "version": 1,
        "description": "truncated header",
        "rom_sets": [
            {"type": "single", "roms": [{"file": "a.bin", "type": "2364", "cs1": "active_low"}]},
            {"type": "single", "roms": [{"file": "b.bin", "type": "2364", "cs1": "active_low"}]}
        ]
    }"#;
    let files = vec![(0, vec![0u8; 8192]), (1, vec![1u8; 8192])];
    let (bytes, _) = compose(json, files, "ice-24-j", false);

    let header_offset = Image::parse(&bytes).unwrap().header_offset();

    // Cut the image off inside the header's offset table: the magic is
    // intact, so this must read as truncation, not a bad magic
    let truncated = &bytes[..header_offset + 22];
    assert!(matches!(
        Image::parse_at(truncated, header_offset),
        Err(ParseError::TruncatedImage { .. })
    ));
    assert!(matches!(
        Image::parse(truncated),
        Err(ParseError::TruncatedImage { .. })
    ));
}

#[test]
fn test_parse_rejects_truncated_table() {
    let json = r#"{
        "version": 1,
        "description": "truncated",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let (bytes, _) = compose(json, vec![(0, vec![0u8; 8192])], "ice-24-j", false);

    // Cut the image off in the middle of the mangled table
    let truncated = &bytes[..bytes.len() - 1000];
    assert!(matches!(
        Image::parse(truncated),
        Err(ParseError::TruncatedImage { .. })
    ));
}

#[test]
fn test_parse_tolerates_trailing_bytes() {
    let json = r#"{
        "version": 1,
        "description": "trailing",
        "rom_sets": [{
            "type": "single",
            "roms": [{"file": "kernal.bin", "type": "2364", "cs1": "active_low"}]
        }]
    }"#;
    let (mut bytes, _) = compose(json, vec![(0, vec![0x21u8; 8192])], "ice-24-j", false);
    bytes.extend_from_slice(&[0xDE; 512]);

    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.rom_sets().len(), 1);
}
