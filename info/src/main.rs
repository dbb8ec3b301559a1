// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! One ROM image inspector.
//!
//! Extracts the ROM set structure from a composed One ROM image, verifies
//! an image against the configuration that produced it, and recovers
//! de-mangled ROM images.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::debug;

use onerom_compose::fetch::{HttpFetcher, resolve_source};
use onerom_compose::{load_pin_map, print_error};
use onerom_fw_parser::Image;
use onerom_gen::builder::{Builder, FileData};
use onerom_gen::validate::{Report, validate_tables};

#[derive(Parser, Debug)]
#[clap(name = "onerom-info", about = "One ROM image inspector", version)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the ROM sets inside an image
    Info {
        /// Composed image file
        image: PathBuf,
    },

    /// Round-trip check an image against its configuration
    Verify {
        /// Composed image file
        image: PathBuf,

        /// ROM set configuration the image was composed from
        #[clap(long)]
        json: PathBuf,

        /// Hardware revision the image was composed for
        #[clap(long)]
        hw_rev: String,
    },

    /// Recover one ROM's original bytes from an image
    Extract {
        /// Composed image file
        image: PathBuf,

        /// ROM set index
        #[clap(long)]
        set: usize,

        /// ROM index within the set
        #[clap(long, default_value = "0")]
        rom: usize,

        /// Hardware revision the image was composed for
        #[clap(long)]
        hw_rev: String,

        /// Output file for the recovered bytes
        #[clap(long)]
        out: PathBuf,
    },
}

fn print_info(image_path: &PathBuf) -> Result<()> {
    let bytes = fs::read(image_path)
        .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
    let image = Image::parse(&bytes)?;

    println!("One ROM image: {}", image_path.display());
    println!("  Metadata at {:#X}, version {}", image.header_offset(), image.version());
    println!("  ROM sets: {}", image.rom_sets().len());

    for (ii, set) in image.rom_sets().iter().enumerate() {
        println!();
        println!("Set {}: {} ({} ROM(s))", ii, set.serve_mode, set.rom_count());
        if set.table_size > 0 {
            println!(
                "  Mangled table: {:#X}..{:#X} ({} bytes)",
                set.table_offset,
                set.table_offset + set.table_size,
                set.table_size
            );
        } else {
            println!("  No mangled table (RAM set)");
        }

        for (jj, rom) in set.roms.iter().enumerate() {
            let filename = rom.filename.unwrap_or("-");
            println!(
                "  ROM {}: {} cs1={} cs2={} cs3={} {}",
                jj, rom.chip_type, rom.cs1_state, rom.cs2_state, rom.cs3_state, filename
            );
        }

        if let Some(ref overrides) = set.firmware_overrides {
            if let Some(ref ice) = overrides.ice {
                println!("  Ice overrides: {:?}", ice);
            }
            if let Some(ref fire) = overrides.fire {
                println!("  Fire overrides: {:?}", fire);
            }
            if let Some(ref led) = overrides.led {
                println!("  LED enabled: {}", led.enabled);
            }
            if let Some(ref swd) = overrides.swd {
                println!("  SWD enabled: {}", swd.swd_enabled);
            }
        }
        if let Some(params) = set.serve_alg_params {
            println!("  Serve alg params: {:02X?}", params);
        }
    }

    Ok(())
}

fn print_report(report: &Report) {
    for set in &report.sets {
        println!(
            "Set {}: {} ROM(s), {} tuples checked, {} errors",
            set.set, set.rom_count, set.checked, set.mismatch_count
        );
        for m in &set.first_mismatches {
            println!(
                "  MISMATCH at addr {:#06X} (CS1={} CS2={} CS3={} X1={} X2={}): index {:#06X} expected {:#04X}, got {:#04X}",
                m.address, m.cs[0], m.cs[1], m.cs[2], m.x[0], m.x[1], m.index, m.expected, m.got
            );
        }
    }

    println!();
    println!("Overall validation:");
    println!("  Total ROM sets: {}", report.sets.len());
    println!("  Total tuples checked: {}", report.total_checked());
    println!("  Total errors found: {}", report.total_mismatches());
    println!(
        "  Result: {}",
        if report.passed() { "PASS" } else { "FAIL" }
    );
}

fn verify(image_path: &PathBuf, json_path: &PathBuf, hw_rev: &str) -> Result<bool> {
    let pin_map = load_pin_map(hw_rev)?;

    let json = fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read config: {}", json_path.display()))?;
    let mut builder = Builder::from_json(&json)?;

    let fetcher = HttpFetcher::new();
    for spec in builder.file_specs() {
        debug!("Resolving ROM {}: {}", spec.id, spec.source);
        let data = resolve_source(&fetcher, &spec.source, spec.zip_member.as_deref())
            .with_context(|| format!("ROM {} ({})", spec.id, spec.source))?;
        builder.add_file(FileData { id: spec.id, data })?;
    }
    let rom_sets = builder.build_rom_sets(&pin_map)?;

    let bytes = fs::read(image_path)
        .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
    let image = Image::parse(&bytes)?;

    if image.rom_sets().len() != rom_sets.len() {
        bail!(
            "Image contains {} ROM set(s), config declares {}",
            image.rom_sets().len(),
            rom_sets.len()
        );
    }

    println!("=== Validating All ROM Sets ===");
    let tables: Vec<Option<&[u8]>> = (0..rom_sets.len()).map(|ii| image.table(ii)).collect();
    let report = validate_tables(&rom_sets, &tables, &pin_map);
    print_report(&report);

    Ok(report.passed())
}

fn extract(
    image_path: &PathBuf,
    set: usize,
    rom: usize,
    hw_rev: &str,
    out: &PathBuf,
) -> Result<()> {
    let pin_map = load_pin_map(hw_rev)?;
    let bytes = fs::read(image_path)
        .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
    let image = Image::parse(&bytes)?;

    let recovered = image.demangle_rom(set, rom, &pin_map)?;
    fs::write(out, &recovered)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Recovered {} bytes from set {} ROM {} to {}",
        recovered.len(),
        set,
        rom,
        out.display()
    );
    Ok(())
}

fn run(args: &Args) -> Result<bool> {
    match &args.command {
        Command::Info { image } => print_info(image).map(|_| true),
        Command::Verify {
            image,
            json,
            hw_rev,
        } => verify(image, json, hw_rev),
        Command::Extract {
            image,
            set,
            rom,
            hw_rev,
            out,
        } => extract(image, *set, *rom, hw_rev, out).map(|_| true),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}
