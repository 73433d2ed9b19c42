//! Command-line flags
//!
//! The program itself is interactive; flags only shape the session it
//! starts with.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigOverrides, ACQUISITION_DIR_ENV, CONFIG_ENV};

#[derive(Debug, Parser)]
#[command(name = "mft")]
#[command(about = "Mobile Forensic Toolkit - guided Android and iOS acquisition")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Folder holding every case
    #[arg(long, env = ACQUISITION_DIR_ENV)]
    pub acquisition_dir: Option<PathBuf>,

    /// Open this case at start-up
    #[arg(long)]
    pub case: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            acquisition_dir: self.acquisition_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "mft",
            "--acquisition-dir",
            "/evidence",
            "--case",
            "Case_042",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.case.as_deref(), Some("Case_042"));
        assert_eq!(cli.overrides().acquisition_dir, Some(PathBuf::from("/evidence")));
    }

    #[test]
    fn test_verify_command() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
