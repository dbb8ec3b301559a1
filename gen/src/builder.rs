// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The image Builder.
//!
//! Model is to create the builder from a JSON config, retrieve the list of
//! files that need to be loaded, call `add_file` for each file once loaded,
//! then call `compose` to generate the flashable image.  Resolving file
//! references (local reads, HTTPS fetches, zip extraction) is the caller's
//! job - the core stays free of I/O.
//!
//! # Example
//! ```no_run
//! use onerom_config::hw::lookup_pcb;
//! use onerom_gen::builder::{Builder, ComposeProps, FileData};
//! # use onerom_gen::Error;
//!
//! # fn fetch_file(url: &str) -> Result<Vec<u8>, Error> {
//! #     Ok(vec![0u8; 8192])
//! # }
//! #
//! let json = r#"{
//!     "version": 1,
//!     "description": "Example ROM configuration",
//!     "rom_sets": [{
//!         "type": "single",
//!         "roms": [{
//!             "file": "http://example.com/kernal.bin",
//!             "type": "2364",
//!             "cs1": "active_low"
//!         }]
//!     }]
//! }"#;
//!
//! let mut builder = Builder::from_json(json)?;
//!
//! for spec in builder.file_specs() {
//!     let data = fetch_file(&spec.source)?; // Your implementation
//!     builder.add_file(FileData { id: spec.id, data })?;
//! }
//!
//! let pin_map = lookup_pcb("fire-24-d").expect("known revision");
//! let firmware = vec![0u8; 32768]; // Firmware binary, loaded by caller
//! let image = builder.compose(&ComposeProps::new(&pin_map, &firmware))?;
//! // image.bytes is ready to flash
//! # Ok::<(), onerom_gen::Error>(())
//! ```

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use onerom_config::chip::{ChipFunction, ChipType, ControlLines, CsLogic};
use onerom_config::fw::ServeMode;
use onerom_config::hw::PinMap;

use crate::compose::{self, ComposedImage};
use crate::firmware::{FirmwareConfig, ServeAlgParams};
use crate::image::{Rom, RomSet};
use crate::{Error, FILL_BYTE, Result};

/// Main Builder object
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Builder {
    config: Config,
    files: BTreeMap<usize, Vec<u8>>,
}

/// Inputs to composition beyond the config: the target hardware, the
/// firmware binary, and compose-time options.
#[derive(Debug, Clone, Copy)]
pub struct ComposeProps<'a> {
    pub pin_map: &'a PinMap,
    pub fw_image: &'a [u8],
    pub flash_size: usize,
    pub filenames: bool,
}

impl<'a> ComposeProps<'a> {
    pub fn new(pin_map: &'a PinMap, fw_image: &'a [u8]) -> Self {
        Self {
            pin_map,
            fw_image,
            flash_size: pin_map.family.default_flash_bytes(),
            filenames: false,
        }
    }

    pub fn with_flash_size(mut self, flash_size: usize) -> Self {
        self.flash_size = flash_size;
        self
    }

    pub fn with_filenames(mut self, filenames: bool) -> Self {
        self.filenames = filenames;
        self
    }
}

impl Builder {
    /// Create from JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::InvalidConfig {
            error: e.to_string(),
        })?;

        Self::validate_config(&config)?;

        Ok(Self {
            config,
            files: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn validate_config(config: &Config) -> Result<()> {
        if config.version != 1 {
            return Err(Error::UnsupportedConfigVersion {
                version: config.version,
            });
        }

        for set in config.rom_sets.iter() {
            if set.roms.is_empty() {
                return Err(Error::NoRoms);
            }

            match set.set_type {
                SetType::Single => {
                    if set.roms.len() > 1 {
                        return Err(Error::TooManyRoms {
                            expected: 1,
                            actual: set.roms.len(),
                        });
                    }
                }
                SetType::Multi => {
                    if set.roms.len() > 3 {
                        return Err(Error::TooManyRoms {
                            expected: 3,
                            actual: set.roms.len(),
                        });
                    }
                    if set.roms.len() < 2 {
                        return Err(Error::TooFewRoms {
                            expected: 2,
                            actual: set.roms.len(),
                        });
                    }
                }
                SetType::Banked => {
                    if set.roms.len() > 4 {
                        return Err(Error::TooManyRoms {
                            expected: 4,
                            actual: set.roms.len(),
                        });
                    }
                    if set.roms.len() < 2 {
                        return Err(Error::TooFewRoms {
                            expected: 2,
                            actual: set.roms.len(),
                        });
                    }
                }
            }

            for rom in set.roms.iter() {
                Self::validate_cs_config(rom)?;
                Self::validate_transforms(rom)?;
            }

            // Multi sets select ROMs via the CS1/X matrix - the 27 series
            // CE/OE model doesn't take part in it, and every ROM must share
            // one chip type so the selection bits are unambiguous.
            if set.set_type != SetType::Single {
                let first_type = set.roms[0].chip_type;
                for rom in &set.roms[1..] {
                    if rom.chip_type != first_type {
                        return Err(Error::InvalidConfig {
                            error: format!(
                                "all ROMs in a {} set must share one chip type, found {} and {}",
                                set.set_type.name(),
                                first_type,
                                rom.chip_type
                            ),
                        });
                    }
                }
                if first_type.is_27_series() {
                    return Err(Error::InvalidConfig {
                        error: format!(
                            "chip type {} cannot be used in a {} set",
                            first_type,
                            set.set_type.name()
                        ),
                    });
                }
            }

            // Banked ROMs swap transparently, so the CS wiring must match.
            if set.set_type == SetType::Banked {
                let first = &set.roms[0];
                for rom in &set.roms[1..] {
                    if rom.cs1 != first.cs1 || rom.cs2 != first.cs2 || rom.cs3 != first.cs3 {
                        return Err(Error::InvalidConfig {
                            error: "all ROMs in a banked set must share one CS configuration"
                                .to_string(),
                        });
                    }
                }
            }

            if let Some(ref overrides) = set.firmware_overrides {
                Self::validate_overrides(overrides)?;
            }

            if let Some(ref params) = set.serve_alg_params {
                params.validate()?;
            }
        }

        Ok(())
    }

    fn validate_cs_config(rom: &RomConfig) -> Result<()> {
        match rom.chip_type.control_lines() {
            ControlLines::ChipSelect { count } => {
                // CS1 drives selection and can never be tied off
                match rom.cs1 {
                    None => return Err(Error::MissingCsConfig { line: "cs1" }),
                    Some(CsLogic::NotUsed) => {
                        return Err(Error::InvalidConfig {
                            error: "cs1 cannot be not_used - it must be active_low or active_high"
                                .to_string(),
                        });
                    }
                    Some(_) => {}
                }

                for (name, value, line) in [("cs2", rom.cs2, 2u8), ("cs3", rom.cs3, 3u8)] {
                    if line <= count {
                        if value.is_none() {
                            return Err(Error::MissingCsConfig { line: name });
                        }
                    } else if matches!(value, Some(CsLogic::ActiveLow | CsLogic::ActiveHigh)) {
                        return Err(Error::UnexpectedCsConfig {
                            line: name,
                            chip_type: rom.chip_type,
                        });
                    }
                }
            }
            ControlLines::CeOe => {
                // CE and OE are fixed active low; the config may state that
                // explicitly but can't change it
                for (name, value) in [("cs1", rom.cs1), ("cs2", rom.cs2), ("cs3", rom.cs3)] {
                    if value == Some(CsLogic::ActiveHigh) {
                        return Err(Error::UnexpectedCsConfig {
                            line: name,
                            chip_type: rom.chip_type,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_transforms(rom: &RomConfig) -> Result<()> {
        let capacity = rom.chip_type.size_bytes();

        if rom.length == Some(0) {
            return Err(Error::InvalidConfig {
                error: "length must be non-zero".to_string(),
            });
        }
        if rom.pad_to.is_some() && rom.truncate_to.is_some() {
            return Err(Error::InvalidConfig {
                error: "pad_to and truncate_to are mutually exclusive".to_string(),
            });
        }
        for target in [rom.duplicate_to, rom.pad_to, rom.truncate_to] {
            if let Some(target) = target
                && target > capacity
            {
                return Err(Error::TransformBeyondCapacity {
                    id: 0,
                    target,
                    capacity,
                });
            }
        }

        Ok(())
    }

    fn validate_overrides(overrides: &FirmwareConfig) -> Result<()> {
        if overrides.is_empty() {
            return Err(Error::InvalidConfig {
                error: "firmware_overrides specified but all fields are None".to_string(),
            });
        }

        // Overclock guard: a frequency beyond the rated maximum needs the
        // matching overclock flag.
        if let Some(ref ice) = overrides.ice
            && let Some(freq) = ice.cpu_freq
            && !freq.is_stock()
            && !freq.is_none()
        {
            let rated = onerom_config::mcu::Family::Stm32f4.rated_max_mhz();
            if freq.get() > rated && ice.overclock != Some(true) {
                return Err(Error::OverclockRequired {
                    frequency_mhz: freq.get(),
                    rated_max_mhz: rated,
                });
            }
        }
        if let Some(ref fire) = overrides.fire
            && let Some(freq) = fire.cpu_freq
            && !freq.is_stock()
            && !freq.is_none()
        {
            let rated = onerom_config::mcu::Family::Rp2350.rated_max_mhz();
            if freq.get() > rated && fire.overclock != Some(true) {
                return Err(Error::OverclockRequired {
                    frequency_mhz: freq.get(),
                    rated_max_mhz: rated,
                });
            }
        }

        Ok(())
    }

    /// Get list of files that need to be loaded.
    ///
    /// RAM chips have no source image and don't appear here.
    pub fn file_specs(&self) -> Vec<FileSpec> {
        let mut specs = Vec::new();
        let mut id = 0;

        for (set_id, rom_set) in self.config.rom_sets.iter().enumerate() {
            for rom in &rom_set.roms {
                if rom.chip_type.chip_function() == ChipFunction::Rom {
                    specs.push(FileSpec {
                        id,
                        description: rom.description.clone(),
                        source: rom.file.clone(),
                        zip_member: rom.zip_member.clone(),
                        chip_type: rom.chip_type,
                        set_id,
                    });
                }
                id += 1;
            }
        }

        specs
    }

    /// All licenses declared across the config, with their set ids.
    pub fn licenses(&self) -> Vec<(usize, &str)> {
        self.config
            .rom_sets
            .iter()
            .enumerate()
            .flat_map(|(ii, set)| set.licenses.iter().map(move |l| (ii, l.as_str())))
            .collect()
    }

    /// Add a loaded file - called once for each [`FileSpec`].
    pub fn add_file(&mut self, file: FileData) -> Result<()> {
        if self.files.contains_key(&file.id) {
            return Err(Error::DuplicateFile { id: file.id });
        }

        let total_files = self.total_rom_count();
        if file.id >= total_files {
            return Err(Error::InvalidFile {
                id: file.id,
                total: total_files,
            });
        }

        self.files.insert(file.id, file.data);
        Ok(())
    }

    fn total_rom_count(&self) -> usize {
        self.config.rom_sets.iter().map(|set| set.roms.len()).sum()
    }

    /// Builds the [`RomSet`] objects, applying the per-ROM transforms.
    ///
    /// Fails if any ROM file is missing, a transform cannot be satisfied,
    /// or a set doesn't fit the target hardware.
    pub fn build_rom_sets(&self, pin_map: &PinMap) -> Result<Vec<RomSet>> {
        let mut rom_sets = Vec::new();
        let mut rom_id = 0;

        for (set_id, set_config) in self.config.rom_sets.iter().enumerate() {
            let serve_mode = set_config.set_type.serve_mode();

            if serve_mode != ServeMode::Single && !pin_map.supports_multi_rom_sets() {
                return Err(Error::MultiSetsUnsupported);
            }

            let mut roms = Vec::new();
            for rom_config in &set_config.roms {
                if rom_config.chip_type.pins() != pin_map.rom_pins {
                    return Err(Error::SocketMismatch {
                        chip_type: rom_config.chip_type,
                        socket_pins: pin_map.rom_pins,
                    });
                }

                let data = match rom_config.chip_type.chip_function() {
                    ChipFunction::Ram => None,
                    ChipFunction::Rom => {
                        let raw = self
                            .files
                            .get(&rom_id)
                            .ok_or(Error::MissingFile { id: rom_id })?;
                        Some(apply_transforms(rom_id, raw, rom_config)?)
                    }
                };

                let source_name = match &rom_config.zip_member {
                    Some(member) => format!("{}|{}", rom_config.file, member),
                    None => rom_config.file.clone(),
                };

                roms.push(Rom::new(
                    rom_id,
                    source_name,
                    rom_config.description.clone(),
                    rom_config.chip_type,
                    rom_config.cs1,
                    rom_config.cs2,
                    rom_config.cs3,
                    data,
                )?);
                rom_id += 1;
            }

            rom_sets.push(RomSet::new(
                set_id,
                serve_mode,
                roms,
                set_config.firmware_overrides.clone(),
                set_config.serve_alg_params.clone(),
            )?);
        }

        Ok(rom_sets)
    }

    /// Generates the flashable image once all files are loaded.
    pub fn compose(&self, props: &ComposeProps) -> Result<ComposedImage> {
        let rom_sets = self.build_rom_sets(props.pin_map)?;
        compose::compose(&rom_sets, props)
    }
}

// Applies the config transforms in order: slice, duplicate, pad/truncate.
// The result must exactly fill the chip.
fn apply_transforms(id: usize, raw: &[u8], config: &RomConfig) -> Result<Vec<u8>> {
    let capacity = config.chip_type.size_bytes();

    // Slice
    let start = config.offset.unwrap_or(0);
    let len = match config.length {
        Some(len) => len,
        None => raw.len().saturating_sub(start),
    };
    let end = start.checked_add(len).ok_or(Error::SliceOutOfRange {
        id,
        end: usize::MAX,
        actual: raw.len(),
    })?;
    if end > raw.len() || len == 0 {
        return Err(Error::SliceOutOfRange {
            id,
            end,
            actual: raw.len(),
        });
    }
    let mut data = raw[start..end].to_vec();

    // Duplicate
    if let Some(target) = config.duplicate_to {
        if target < data.len() || target % data.len() != 0 {
            return Err(Error::DuplicateNotExactMultiple {
                image_size: data.len(),
                target,
            });
        }
        data = data.repeat(target / data.len());
    }

    // Pad or truncate
    if let Some(target) = config.pad_to {
        if target < data.len() {
            return Err(Error::InvalidConfig {
                error: format!(
                    "pad_to {} is smaller than the current image size {}",
                    target,
                    data.len()
                ),
            });
        }
        data.resize(target, FILL_BYTE);
    }
    if let Some(target) = config.truncate_to {
        if target > data.len() {
            return Err(Error::InvalidConfig {
                error: format!(
                    "truncate_to {} is larger than the current image size {}",
                    target,
                    data.len()
                ),
            });
        }
        data.truncate(target);
    }

    if data.len() != capacity {
        return Err(Error::SizeMismatch {
            id,
            expected: capacity,
            got: data.len(),
        });
    }

    Ok(data)
}

/// Details about a file to be loaded by the caller
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileSpec {
    pub id: usize,
    pub description: Option<String>,
    pub source: String,
    pub zip_member: Option<String>,
    pub chip_type: ChipType,
    pub set_id: usize,
}

/// File data loaded by the caller, passed back to the builder
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct FileData {
    pub id: usize,
    pub data: Vec<u8>,
}

/// ROM set type vocabulary of the config document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    #[default]
    Single,
    Multi,
    Banked,
}

impl SetType {
    pub fn serve_mode(&self) -> ServeMode {
        match self {
            SetType::Single => ServeMode::Single,
            SetType::Multi => ServeMode::MultiAnyCs,
            SetType::Banked => ServeMode::BankSwitched,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SetType::Single => "single",
            SetType::Multi => "multi",
            SetType::Banked => "banked",
        }
    }
}

/// Top level configuration structure, deserialized from JSON
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: u32,
    pub description: String,
    pub rom_sets: Vec<RomSetConfig>,
}

/// ROM set configuration structure, deserialized from JSON
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RomSetConfig {
    #[serde(rename = "type")]
    pub set_type: SetType,
    #[serde(default)]
    pub description: Option<String>,
    pub roms: Vec<RomConfig>,
    #[serde(default)]
    pub firmware_overrides: Option<FirmwareConfig>,
    #[serde(default)]
    pub serve_alg_params: Option<ServeAlgParams>,
    #[serde(default)]
    pub licenses: Vec<String>,
}

/// ROM configuration structure, deserialized from JSON
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RomConfig {
    /// URL or local path of the source image
    pub file: String,
    /// Member to extract when `file` is a zip archive
    #[serde(default)]
    pub zip_member: Option<String>,
    #[serde(rename = "type")]
    pub chip_type: ChipType,
    #[serde(default)]
    pub cs1: Option<CsLogic>,
    #[serde(default)]
    pub cs2: Option<CsLogic>,
    #[serde(default)]
    pub cs3: Option<CsLogic>,
    /// Slice: start offset into the source
    #[serde(default)]
    pub offset: Option<usize>,
    /// Slice: length taken from the source
    #[serde(default)]
    pub length: Option<usize>,
    /// Repeat the (sliced) image up to this size
    #[serde(default)]
    pub duplicate_to: Option<usize>,
    /// Pad with the fill byte up to this size
    #[serde(default)]
    pub pad_to: Option<usize>,
    /// Truncate down to this size
    #[serde(default)]
    pub truncate_to: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}
