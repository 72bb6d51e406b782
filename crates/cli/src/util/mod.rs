use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};

/// Parses a `-D NAME=VALUE` definition; a bare `NAME` defines an empty value.
pub fn parse_definition(value: &str) -> Result<(String, String), String> {
    let (name, value) = value.split_once('=').unwrap_or((value, ""));
    let name = name.trim();
    if !confpp::interpolate::is_symbol_name(name) {
        return Err(format!("invalid symbol name: '{name}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

pub fn read_stdin() -> anyhow::Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text).context("failed to read standard input")?;
    Ok(text)
}

pub fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            std::io::Write::write_all(&mut stdout, text.as_bytes()).context("failed to write standard output")
        }
    }
}

pub fn ensure_readable(path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        bail!("input file not found: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("target=release", Some(("target", "release")))]
    #[case("flag", Some(("flag", "")))]
    #[case("url=a=b", Some(("url", "a=b")))]
    #[case("1bad=x", None)]
    #[case("=x", None)]
    fn definitions(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        let parsed = parse_definition(input).ok();
        assert_eq!(parsed.as_ref().map(|(n, v)| (n.as_str(), v.as_str())), expected);
    }
}
