// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Generates flashable images for One ROM.
//!
//! The pipeline is pure: a declarative JSON configuration plus the firmware
//! binary and source ROM bytes go in, a single deterministic image comes
//! out, with every ROM byte pre-permuted so the runtime can serve a GPIO
//! read with zero arithmetic.  No I/O happens here - the caller resolves
//! file references (see [`builder::FileSpec`]) and feeds the bytes in.

#![no_std]

extern crate alloc;

pub mod builder;
pub mod compose;
pub mod firmware;
pub mod image;
pub mod validate;

pub use builder::{Builder, ComposeProps, Config, FileData, FileSpec};
pub use compose::{ComposedImage, SetLayout};
pub use firmware::{FirmwareConfig, ServeAlgParams};
pub use image::{FILL_BYTE, RAM_FILL_BYTE, Rom, RomSet};
pub use validate::{Mismatch, Report};

use alloc::string::String;
use onerom_config::chip::{ChipType, CsLogic};

/// Version of the metadata layout produced by this version of the crate.
pub const METADATA_VERSION: u8 = 1;

/// Magic identifying the metadata header, null-terminated.
pub const HEADER_MAGIC: &[u8; 16] = b"ONEROM_METADATA\0";

/// The metadata header is placed at the first 16-byte boundary after the
/// firmware code region.
pub const HEADER_ALIGN: usize = 16;

/// Pad value for erased-flash gaps and reserved metadata bytes.
pub const PAD_METADATA_BYTE: u8 = 0xFF;

/// Error type
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Error {
    InvalidConfig {
        error: String,
    },
    UnsupportedConfigVersion {
        version: u32,
    },
    NoRoms,
    TooManyRoms {
        expected: usize,
        actual: usize,
    },
    TooFewRoms {
        expected: usize,
        actual: usize,
    },
    MissingCsConfig {
        line: &'static str,
    },
    UnexpectedCsConfig {
        line: &'static str,
        chip_type: ChipType,
    },
    InconsistentCsLogic {
        first: CsLogic,
        other: CsLogic,
    },
    UnsupportedChipType {
        chip_type: ChipType,
    },
    SocketMismatch {
        chip_type: ChipType,
        socket_pins: u8,
    },
    MultiSetsUnsupported,
    OverclockRequired {
        frequency_mhz: u16,
        rated_max_mhz: u16,
    },
    InvalidServeParams {
        error: String,
    },
    DuplicateFile {
        id: usize,
    },
    InvalidFile {
        id: usize,
        total: usize,
    },
    MissingFile {
        id: usize,
    },
    SliceOutOfRange {
        id: usize,
        end: usize,
        actual: usize,
    },
    DuplicateNotExactMultiple {
        image_size: usize,
        target: usize,
    },
    TransformBeyondCapacity {
        id: usize,
        target: usize,
        capacity: usize,
    },
    SizeMismatch {
        id: usize,
        expected: usize,
        got: usize,
    },
    BufferTooSmall {
        location: &'static str,
        expected: usize,
        actual: usize,
    },
    FlashOverflow {
        required: usize,
        capacity: usize,
    },
    RoundTripMismatch {
        set: usize,
        mismatches: usize,
    },
}

impl Error {
    /// The coarse error kind, used by the CLI's structured error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig { .. }
            | Error::UnsupportedConfigVersion { .. }
            | Error::NoRoms
            | Error::TooManyRoms { .. }
            | Error::TooFewRoms { .. }
            | Error::MissingCsConfig { .. }
            | Error::UnexpectedCsConfig { .. }
            | Error::InconsistentCsLogic { .. }
            | Error::SocketMismatch { .. }
            | Error::OverclockRequired { .. }
            | Error::InvalidServeParams { .. }
            | Error::SliceOutOfRange { .. }
            | Error::DuplicateNotExactMultiple { .. }
            | Error::TransformBeyondCapacity { .. }
            | Error::SizeMismatch { .. } => "input",
            Error::DuplicateFile { .. } | Error::InvalidFile { .. } | Error::MissingFile { .. } => {
                "source"
            }
            Error::BufferTooSmall { .. } | Error::FlashOverflow { .. } => "layout",
            Error::RoundTripMismatch { .. } => "integrity",
            Error::UnsupportedChipType { .. } | Error::MultiSetsUnsupported => "unsupported",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidConfig { error } => write!(f, "Invalid configuration: {}", error),
            Error::UnsupportedConfigVersion { version } => {
                write!(f, "Unsupported configuration version {}", version)
            }
            Error::NoRoms => write!(f, "ROM set contains no ROMs"),
            Error::TooManyRoms { expected, actual } => write!(
                f,
                "Too many ROMs in set: expected {}, found {}",
                expected, actual
            ),
            Error::TooFewRoms { expected, actual } => write!(
                f,
                "Too few ROMs in set: expected {}, found {}",
                expected, actual
            ),
            Error::MissingCsConfig { line } => write!(f, "Missing {} configuration", line),
            Error::UnexpectedCsConfig { line, chip_type } => {
                write!(f, "Chip type {} does not have a {} line", chip_type, line)
            }
            Error::InconsistentCsLogic { first, other } => write!(
                f,
                "Inconsistent CS logic across set: {} vs {}",
                first, other
            ),
            Error::UnsupportedChipType { chip_type } => write!(
                f,
                "Chip type {} is not supported for image generation",
                chip_type
            ),
            Error::SocketMismatch {
                chip_type,
                socket_pins,
            } => write!(
                f,
                "Chip type {} does not fit the board's {}-pin socket",
                chip_type, socket_pins
            ),
            Error::MultiSetsUnsupported => write!(
                f,
                "This hardware revision does not support multi or banked ROM sets"
            ),
            Error::OverclockRequired {
                frequency_mhz,
                rated_max_mhz,
            } => write!(
                f,
                "{}MHz exceeds the rated maximum of {}MHz - set overclock: true to allow",
                frequency_mhz, rated_max_mhz
            ),
            Error::InvalidServeParams { error } => {
                write!(f, "Invalid serve_alg_params: {}", error)
            }
            Error::DuplicateFile { id } => write!(f, "File {} added twice", id),
            Error::InvalidFile { id, total } => {
                write!(f, "File id {} out of range (total {})", id, total)
            }
            Error::MissingFile { id } => write!(f, "File {} was never added", id),
            Error::SliceOutOfRange { id, end, actual } => write!(
                f,
                "ROM {}: slice extends to {:#X} but the source is {:#X} bytes",
                id, end, actual
            ),
            Error::DuplicateNotExactMultiple { image_size, target } => write!(
                f,
                "Image size {} is not an exact divisor of duplicate_to {}",
                image_size, target
            ),
            Error::TransformBeyondCapacity {
                id,
                target,
                capacity,
            } => write!(
                f,
                "ROM {}: transform target {} exceeds chip capacity {}",
                id, target, capacity
            ),
            Error::SizeMismatch { id, expected, got } => write!(
                f,
                "ROM {}: expected {} bytes after transforms, got {}",
                id, expected, got
            ),
            Error::BufferTooSmall {
                location,
                expected,
                actual,
            } => write!(
                f,
                "Buffer too small in {}: expected {}, actual {}",
                location, expected, actual
            ),
            Error::FlashOverflow { required, capacity } => write!(
                f,
                "Image requires {} bytes but the target flash is {} bytes",
                required, capacity
            ),
            Error::RoundTripMismatch { set, mismatches } => {
                write!(f, "Set {}: {} round-trip mismatches", set, mismatches)
            }
        }
    }
}

impl core::error::Error for Error {}

pub(crate) type Result<T> = core::result::Result<T, Error>;

pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
