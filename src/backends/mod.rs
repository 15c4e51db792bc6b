// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for capture hardware
//!
//! The backend layer hides how devices are discovered and how frames and
//! movie files are produced, so the session logic stays the same whether it
//! drives real hardware or the in-process simulation.
//!
//! # Modules
//!
//! - [`camera`]: capture backend trait, device enumeration, simulated and
//!   GStreamer implementations

pub mod camera;
