//! Device acquisition through external tools
//!
//! - [`runner`]: spawning tools, streaming output, transcript
//! - [`android`]: `adb` wrapper and output parsers
//! - [`ios`]: `ideviceinfo` / `idevicebackup2` wrapper

pub mod android;
pub mod ios;
pub mod runner;

pub use android::{AdbClient, AdbDevice, BrowseCommand, DeviceState, RemoteBrowser};
pub use ios::{IosClient, IosDeviceInfo};
pub use runner::{check_tools, CommandOutput, MissingTool, ToolRunner};
