//! Mobile Forensic Toolkit
//!
//! Guided acquisition of Android and iOS devices for examiners. Every
//! acquisition lands in a case folder with an evidence registry
//! (`case.json`), an append-only activity log (`journal.log`) and SHA-256
//! digests taken at acquisition time.
//!
//! - [`case`]: case folders, evidence registry, activity log
//! - [`device`]: `adb`, `idevicebackup2` and `ideviceinfo` wrappers
//! - [`extract`]: Android backup decoding, file listing and export
//! - [`analysis`]: keyword search, iLEAPP and the AI assistant
//! - [`report`]: Markdown and PDF case reports
//! - [`session`] and [`menu`]: the interactive program

pub mod analysis;
pub mod case;
pub mod cli;
pub mod common;
pub mod config;
pub mod device;
pub mod error;
pub mod extract;
pub mod logging;
pub mod menu;
pub mod report;
pub mod session;

pub use error::{ToolkitError, ToolkitResult};
pub use session::Session;
