// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Configuration data for One ROM: the chip catalog, per-PCB-revision
//! hardware descriptors, and firmware override value types.
//!
//! Everything in this crate is pure data - no I/O is performed here, other
//! than parsing JSON hardware descriptors handed in by the caller.

#![no_std]

extern crate alloc;

pub mod chip;
pub mod fw;
pub mod hw;
pub mod mcu;

pub use chip::{ChipFunction, ChipType, ControlLines, CsLogic};
pub use fw::{FireCpuFreq, FireServeMode, FireVreg, IceCpuFreq, ServeMode};
pub use hw::{PinMap, Port, UNUSED_PIN};
pub use mcu::Family;
