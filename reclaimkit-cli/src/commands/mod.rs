use std::{
    io::Read as _,
    path::{Path, PathBuf},
};

use eyre::Context as _;

pub mod inspect;
pub mod request;
pub mod track;
pub mod verify;

/// Parses a `key=value` pair. The value may contain further `=` characters.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Reads a file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> eyre::Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("while reading stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("while reading {}", path.display()))
}

/// Writes `text` to `path`, or prints it when no path is given.
pub fn write_output(path: Option<&PathBuf>, text: &str) -> eyre::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("while writing {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
