//! Reader for `fw_env.config`.
//!
//! Every line describes one environment copy:
//!
//! ```text
//! # device      offset   env size   erase size   sectors
//! /dev/mtd1     0x0000   0x4000     0x10000      1
//! /dev/mtd2     0x0000   0x4000     0x10000
//! ```
//!
//! Numbers are hexadecimal with an optional `0x` prefix. The first two usable lines are taken,
//! a second one enables the redundant environment.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use fw_env::Descriptor;

use crate::error::Error;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fw_env.config";

/// At most two copies: primary and redundant.
pub const MAX_DEVICES: usize = 2;

/// One configured environment copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub descriptor: Descriptor,
}

/// The parsed configuration file, holding one or two devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Parse configuration content from a string.
    ///
    /// Lines starting with `#` and lines with fewer than four fields are skipped. A missing
    /// sector count defaults to 1. Fails if no usable line is found.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let mut devices = Vec::new();

        for (index, line) in content.lines().enumerate() {
            if devices.len() == MAX_DEVICES {
                break;
            }

            let line = line.trim_start();
            if line.starts_with('#') {
                continue;
            }

            if let Some(device) = parse_line(line, index + 1)? {
                devices.push(device);
            }
        }

        if devices.is_empty() {
            return Err(Error::InvalidConfig("no valid entries found".to_string()));
        }

        Ok(Config { devices })
    }

    /// Parse the configuration file at the given `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::InvalidConfig(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    pub fn is_redundant(&self) -> bool {
        self.devices.len() > 1
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<Option<DeviceConfig>, Error> {
    let mut fields = line.split_whitespace();
    let Some(path) = fields.next() else {
        return Ok(None);
    };

    // like scanf: conversion stops at the first field that is not a number
    let numbers: Vec<u64> = fields.map_while(parse_hex).take(4).collect();
    if numbers.len() < 3 {
        return Ok(None);
    }

    let offset = u32::try_from(numbers[0]).map_err(|_| {
        Error::InvalidConfig(format!("line {line_number}: offset {:#x} out of range", numbers[0]))
    })?;
    let image_size = to_usize(numbers[1], line_number)?;
    let erase_size = to_usize(numbers[2], line_number)?;
    let sectors = match numbers.get(3) {
        Some(&sectors) => to_usize(sectors, line_number)?,
        None => 1,
    };

    Ok(Some(DeviceConfig {
        path: PathBuf::from(path),
        descriptor: Descriptor::new(offset, image_size, erase_size, sectors),
    }))
}

fn parse_hex(s: &str) -> Option<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

fn to_usize(value: u64, line_number: usize) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| {
        Error::InvalidConfig(format!("line {line_number}: value {value:#x} out of range"))
    })
}
