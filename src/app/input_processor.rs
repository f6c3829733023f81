//! Assembly of input URLs from positional arguments and/or stdin.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};

/// Collects inputs from `urls`, then from piped stdin when it is not a
/// terminal.
pub(crate) fn collect_inputs(urls: &[String]) -> Result<Vec<String>> {
    let mut inputs = parse_lines(&urls.join("\n"));
    if urls.is_empty() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read URLs from stdin")?;
        inputs.extend(parse_lines(&buffer));
    }
    Ok(inputs)
}

/// One input per non-empty line; `#` starts a comment line.
fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
