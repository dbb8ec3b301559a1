// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! One ROM image composer.
//!
//! Takes a declarative ROM set configuration plus the firmware binary and
//! produces a single flashable image with every byte pre-permuted for the
//! target hardware revision.  The round-trip validator runs on every
//! compose; a mangling mismatch aborts before anything is written.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{debug, info};
use tempfile::NamedTempFile;

use onerom_compose::fetch::{HttpFetcher, resolve_source};
use onerom_compose::{load_pin_map, print_error};
use onerom_gen::builder::{Builder, ComposeProps, FileData};
use onerom_gen::validate::validate_image;

#[derive(Parser, Debug)]
#[clap(
    name = "onerom-compose",
    about = "One ROM image composer",
    version
)]
struct Args {
    /// Firmware binary (code region of the image)
    #[clap(long)]
    fw_image: PathBuf,

    /// ROM set configuration (JSON)
    #[clap(long)]
    json: PathBuf,

    /// Hardware revision: built-in name (e.g. fire-24-d) or a JSON pin map
    #[clap(long)]
    hw_rev: String,

    /// Output image path
    #[clap(long)]
    out: PathBuf,

    /// Target flash capacity in bytes (default: the revision's stock part)
    #[clap(long)]
    flash_size: Option<usize>,

    /// Embed source names in the ROM descriptors
    #[clap(long)]
    filenames: bool,

    /// Automatically answer [y]es to questions
    #[clap(long, short = 'y')]
    yes: bool,
}

fn confirm_licenses(builder: &Builder, auto_yes: bool) -> Result<()> {
    let licenses = builder.licenses();
    if licenses.is_empty() {
        return Ok(());
    }

    println!("Some ROM images require licence acceptance:");
    println!();
    for (set, license) in &licenses {
        println!("Set {}: {}", set, license);
    }
    println!();

    if auto_yes {
        println!("Automatically accepting licence terms due to --yes flag.");
        return Ok(());
    }

    print!("Do you accept the licence terms for the above ROM(s)? (y/n): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;

    let response = input.trim().to_lowercase();
    if response != "y" && response != "yes" {
        return Err(anyhow!("Licence terms not accepted. Aborting."));
    }

    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let pin_map = load_pin_map(&args.hw_rev)?;

    let fw_image = fs::read(&args.fw_image).with_context(|| {
        format!(
            "Failed to read firmware image: {}",
            args.fw_image.display()
        )
    })?;

    let json = fs::read_to_string(&args.json)
        .with_context(|| format!("Failed to read config: {}", args.json.display()))?;
    let mut builder = Builder::from_json(&json)?;

    confirm_licenses(&builder, args.yes)?;

    // Resolve every source the config references
    let fetcher = HttpFetcher::new();
    for spec in builder.file_specs() {
        debug!("Resolving ROM {}: {}", spec.id, spec.source);
        let data = resolve_source(&fetcher, &spec.source, spec.zip_member.as_deref())
            .with_context(|| format!("ROM {} ({})", spec.id, spec.source))?;
        builder.add_file(FileData { id: spec.id, data })?;
    }

    let mut props = ComposeProps::new(&pin_map, &fw_image).with_filenames(args.filenames);
    if let Some(flash_size) = args.flash_size {
        props = props.with_flash_size(flash_size);
    }

    let image = builder.compose(&props)?;

    // Round-trip check before anything touches disk
    let rom_sets = builder.build_rom_sets(&pin_map)?;
    let report = validate_image(&rom_sets, &image, &pin_map);
    info!(
        "Validated {} tuples across {} set(s)",
        report.total_checked(),
        report.sets.len()
    );
    if !report.passed() {
        for set in report.sets.iter().filter(|s| s.mismatch_count > 0) {
            for m in &set.first_mismatches {
                log::error!(
                    "Set {}: mismatch at addr {:#06X} (CS={:?} X={:?}): expected {:#04X}, got {:#04X}",
                    set.set, m.address, m.cs, m.x, m.expected, m.got
                );
            }
        }
        return Err(onerom_gen::Error::RoundTripMismatch {
            set: report
                .sets
                .iter()
                .find(|s| s.mismatch_count > 0)
                .map(|s| s.set)
                .unwrap_or(0),
            mismatches: report.total_mismatches() as usize,
        }
        .into());
    }

    // Compose to a temp path and rename, so a failure never leaves a
    // partial image behind
    let dir = args.out.parent().filter(|p| !p.as_os_str().is_empty());
    let mut temp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .context("Failed to create temporary output file")?;
    temp.write_all(&image.bytes)
        .context("Failed to write image")?;
    temp.persist(&args.out)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    println!(
        "Composed {} set(s), {} bytes, metadata at {:#X}: {}",
        image.sets.len(),
        image.bytes.len(),
        image.header_offset,
        args.out.display()
    );

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}
