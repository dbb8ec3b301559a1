// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Shared pieces of the One ROM command line tools: source fetching and
//! hardware revision resolution.  The composing itself lives in
//! `onerom-gen`; this crate supplies the I/O around it.

pub mod fetch;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use onerom_config::hw::{self, PCB_REVISIONS, PinMap};

/// Resolves a hardware revision argument: a built-in PCB revision name, or
/// a path to a JSON pin map descriptor.
pub fn load_pin_map(hw_rev: &str) -> Result<PinMap> {
    match hw::lookup_pcb(hw_rev) {
        Ok(pin_map) => Ok(pin_map),
        Err(hw::HwError::UnknownRevision { .. }) => {
            let path = Path::new(hw_rev);
            if !path.exists() {
                bail!(
                    "Unknown hardware revision '{}' - built-in revisions: {}",
                    hw_rev,
                    PCB_REVISIONS.join(", ")
                );
            }
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read pin map file {}", path.display()))?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("custom");
            Ok(PinMap::from_json(&json, name)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Maps an error chain to the coarse kind reported in the CLI's JSON error
/// object.
pub fn error_kind(error: &anyhow::Error) -> &'static str {
    if let Some(gen_err) = error.downcast_ref::<onerom_gen::Error>() {
        return gen_err.kind();
    }
    if let Some(hw_err) = error.downcast_ref::<hw::HwError>() {
        return match hw_err {
            hw::HwError::UnknownRevision { .. } => "unsupported",
            hw::HwError::InvalidDescriptor { .. } => "input",
        };
    }
    if let Some(parse_err) = error.downcast_ref::<onerom_fw_parser::ParseError>() {
        return match parse_err {
            onerom_fw_parser::ParseError::UnsupportedVersion { .. } => "unsupported",
            _ => "integrity",
        };
    }
    if error.downcast_ref::<fetch::FetchError>().is_some() {
        return "source";
    }
    if error.downcast_ref::<std::io::Error>().is_some() {
        return "source";
    }
    "input"
}

/// Prints the single structured error object the tools emit on failure.
pub fn print_error(error: &anyhow::Error) {
    let detail = format!("{:#}", error);
    eprintln!(
        "{}",
        serde_json::json!({"error": error_kind(error), "detail": detail})
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_pin_map_builtin() {
        let pin_map = load_pin_map("fire-24-d").unwrap();
        assert_eq!(pin_map.name, "fire-24-d");
    }

    #[test]
    fn test_load_pin_map_unknown() {
        let err = load_pin_map("no-such-rev").unwrap_err();
        assert!(err.to_string().contains("Unknown hardware revision"));
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = anyhow::Error::new(onerom_gen::Error::NoRoms);
        assert_eq!(error_kind(&err), "input");
        let err = anyhow::Error::new(onerom_gen::Error::FlashOverflow {
            required: 10,
            capacity: 5,
        });
        assert_eq!(error_kind(&err), "layout");
        let err = anyhow::Error::new(hw::HwError::UnknownRevision {
            name: "x".to_string(),
        });
        assert_eq!(error_kind(&err), "unsupported");
    }
}
