//! Batch updates for `setenv -s FILE`.
//!
//! One request per line: the name up to the first whitespace, then the value. A line with a
//! name only deletes the variable. Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;

use crate::error::Error;

/// A single set or delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub name: String,
    /// `None` deletes the variable.
    pub value: Option<String>,
}

impl Update {
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Update {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Update {
            name: name.into(),
            value: None,
        }
    }

    /// Builds the request of a command line `NAME [VALUE...]`. The values are joined with
    /// single spaces, no values at all deletes.
    pub fn from_args(name: impl Into<String>, values: &[String]) -> Self {
        Update {
            name: name.into(),
            value: (!values.is_empty()).then(|| values.join(" ")),
        }
    }
}

/// Parse batch content from a string.
pub fn parse_str(content: &str) -> Vec<Update> {
    content.lines().filter_map(parse_line).collect()
}

/// Parse batch content line by line from `reader`.
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Update>, Error> {
    let mut updates = Vec::new();
    for line in reader.lines() {
        updates.extend(parse_line(&line?));
    }
    Ok(updates)
}

/// Parse the batch file at the given `path`.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Update>, Error> {
    let file = File::open(&path).map_err(|source| Error::Script {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    parse(BufReader::new(file))
}

fn parse_line(line: &str) -> Option<Update> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (name, value) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };

    Some(match value {
        "" => Update::delete(name),
        value => Update::set(name, value),
    })
}
