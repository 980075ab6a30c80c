use std::path::PathBuf;

use thiserror::Error;

/// Errors of the command line tools: configuration and script input, device access and
/// everything the environment engine reports.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    EnvError(#[from] fw_env::error::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    InvalidConfig(String),

    #[error("cannot access MTD device {}: {source}", .path.display())]
    Device {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot query MTD device {}: {source}", .path.display())]
    DeviceInfo {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("unable to open file {} for reading: {source}", .path.display())]
    Script {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Environment overflow.  Unable to process \"{0}\".")]
    Overflow(String),

    #[error("`-n' option requires exactly one argument")]
    ValueOnlyArguments,

    #[error("Using stdin as the input file also requires the '-f' option.")]
    StdinRequiresForce,
}
