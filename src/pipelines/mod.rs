// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for photo and video capture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Still Frame  │ ──▶ │  Photo Pipeline   │ ──▶ │ Asset store  │
//! │ (JPEG/RGBA)  │     │  - Decode         │     │  (JPEG)      │
//! │              │     │  - JPEG encode    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Movie output │ ──▶ │  Scratch file     │ ──▶ │ Asset store  │
//! │  (backend)   │     │  (random name)    │     │  (moved in)  │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: still frame decoding and JPEG encoding
//! - [`video`]: scratch files for in-progress recordings

pub mod photo;
pub mod video;
