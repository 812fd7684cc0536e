//! Line-oriented stdin prompts.

use std::io::{self, Write};
use std::str::FromStr;

use anyhow::{bail, Result};

/// Prompt for a line, returning `default` when the answer is empty.
pub fn line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) if !d.is_empty() => print!("{} [{}]: ", label, d),
        _ => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(input.to_string())
    }
}

pub fn password(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password(format!("{}: ", label))?)
}

/// Prompt until the answer parses as `T`, listing the accepted values.
pub fn choice<T>(label: &str, options: &[T], current: Option<&str>) -> Result<T>
where
    T: FromStr + std::fmt::Display,
{
    let listed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    println!("{} options: {}", label, listed.join(", "));

    for _ in 0..3 {
        let answer = line(label, current)?;
        if let Ok(value) = answer.parse::<T>() {
            return Ok(value);
        }
        println!("Unknown {}: {}", label.to_lowercase(), answer);
    }
    bail!("No valid {} given", label.to_lowercase())
}

pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
