// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! onerom-fw-parser
//!
//! Parses a composed One ROM image: locates the metadata header, walks the
//! ROM set records, and exposes descriptors, firmware overrides, serve-alg
//! params and mangled table positions.  On request a ROM's logical bytes
//! can be recovered by replaying the mangling permutation in reverse.
//!
//! Parsed views borrow from the image bytes - nothing is copied out except
//! the small fixed records.

#![no_std]

extern crate alloc;

mod parsing;

pub use parsing::{Image, RomDescriptor, RomSetView};

use alloc::string::String;

/// Maximum distance from the image base the metadata header may start at.
pub const MAX_HEADER_SCAN: usize = 4 * 1024 * 1024;

/// Parse error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No metadata header found within the scan window
    BadMagic,

    /// The image ends before a structure it declares
    TruncatedImage {
        needed: usize,
        actual: usize,
    },

    /// Metadata layout version newer than this parser understands
    UnsupportedVersion {
        version: u8,
    },

    /// An offset field points outside the image or at garbage
    InconsistentOffset {
        offset: usize,
    },

    InvalidRecord {
        detail: String,
    },
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParseError::BadMagic => write!(f, "No One ROM metadata header found"),
            ParseError::TruncatedImage { needed, actual } => {
                write!(
                    f,
                    "Image truncated: needs {} bytes, only {} present",
                    needed, actual
                )
            }
            ParseError::UnsupportedVersion { version } => {
                write!(f, "Unsupported metadata version {}", version)
            }
            ParseError::InconsistentOffset { offset } => {
                write!(f, "Inconsistent offset {:#X} in metadata", offset)
            }
            ParseError::InvalidRecord { detail } => write!(f, "Invalid record: {}", detail),
        }
    }
}

impl core::error::Error for ParseError {}
