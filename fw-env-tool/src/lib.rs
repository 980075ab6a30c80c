//! `fw_printenv` / `fw_setenv` for U-Boot environments stored on Linux MTD devices or image
//! files.

pub mod config;
pub mod error;
pub mod mtd;
pub mod script;

use std::io::{
    self,
    BufRead,
    Write,
};

pub use config::{
    Config,
    DeviceConfig,
    DEFAULT_CONFIG_PATH,
};
pub use error::Error;
use fw_env::platform::Platform;
use fw_env::Environment;
pub use mtd::MtdDevice;
pub use script::Update;

/// A loaded environment together with the semantics of the two commands.
pub struct Tool<T: Platform> {
    env: Environment<T>,
}

impl Tool<MtdDevice> {
    /// Opens the configured devices and loads the environment. Devices are opened read only
    /// unless `writable`.
    pub fn open(config: &Config, writable: bool) -> Result<Self, Error> {
        let mut devices = config
            .devices
            .iter()
            .map(|device| -> Result<_, Error> {
                Ok((
                    MtdDevice::open(&device.path, writable)?,
                    device.descriptor.clone(),
                ))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();

        let primary = devices
            .next()
            .ok_or_else(|| Error::InvalidConfig("no device configured".to_string()))?;
        let env = Environment::load(primary, devices.next())?;

        Ok(Tool::new(env))
    }
}

impl<T: Platform> Tool<T> {
    pub fn new(env: Environment<T>) -> Self {
        Tool { env }
    }

    pub fn environment(&self) -> &Environment<T> {
        &self.env
    }

    pub fn into_environment(self) -> Environment<T> {
        self.env
    }

    /// Prints `name=value` lines to `out`: every stored entry verbatim if `names` is empty,
    /// otherwise the requested variables in the given order. With `value_only` just the value is printed, which
    /// requires exactly one name.
    ///
    /// Returns the names that are not defined.
    pub fn printenv<S: AsRef<str>, W: Write>(
        &self,
        names: &[S],
        value_only: bool,
        out: &mut W,
    ) -> Result<Vec<String>, Error> {
        if value_only && names.len() != 1 {
            return Err(Error::ValueOnlyArguments);
        }

        if names.is_empty() {
            // entries are printed as stored, even those without a separator
            for entry in self.env.entries() {
                out.write_all(entry)?;
                out.write_all(b"\n")?;
            }
            return Ok(Vec::new());
        }

        let mut missing = Vec::new();
        for name in names {
            let name = name.as_ref();
            match self.env.get(name) {
                Some(value) => print_variable(out, name.as_bytes(), value, value_only)?,
                None => missing.push(name.to_string()),
            }
        }

        Ok(missing)
    }

    /// Applies `updates` in memory, in order. Unless `force`, every change is announced on
    /// `log`. Deleting an undefined variable is not a change.
    ///
    /// Returns whether anything changed. Nothing is written until [`Self::commit`].
    pub fn setenv<W: Write>(
        &mut self,
        updates: &[Update],
        force: bool,
        log: &mut W,
    ) -> Result<bool, Error> {
        let mut modified = false;

        for update in updates {
            let changed = self
                .env
                .apply(&update.name, update.value.as_slice())
                .map_err(|e| match e {
                    fw_env::error::Error::Overflow => Error::Overflow(update.name.clone()),
                    e => e.into(),
                })?;

            if changed && !force {
                match &update.value {
                    Some(value) => writeln!(
                        log,
                        "Updating environment variable: `{}={value}'",
                        update.name
                    )?,
                    None => writeln!(log, "Deleting environment variable: `{}'", update.name)?,
                }
            }

            modified |= changed;
        }

        Ok(modified)
    }

    /// Writes the environment back to flash.
    pub fn commit(&mut self) -> Result<(), Error> {
        Ok(self.env.commit()?)
    }
}

impl Tool<MtdDevice> {
    /// Releases and closes the devices.
    pub fn close(self) -> Result<(), Error> {
        let (primary, secondary) = self.env.into_devices();
        primary.close()?;
        if let Some(secondary) = secondary {
            secondary.close()?;
        }
        Ok(())
    }
}

fn print_variable<W: Write>(
    out: &mut W,
    name: &[u8],
    value: &[u8],
    value_only: bool,
) -> io::Result<()> {
    if !value_only {
        out.write_all(name)?;
        out.write_all(b"=")?;
    }
    out.write_all(value)?;
    out.write_all(b"\n")
}

/// Asks on `prompt` whether to go ahead and reads the answer from `input`. Only an answer
/// starting with `y` or `Y` confirms.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, prompt: &mut W) -> io::Result<bool> {
    write!(prompt, "Proceed with update [N/y]? ")?;
    prompt.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.chars().next(), Some('y' | 'Y')))
}
