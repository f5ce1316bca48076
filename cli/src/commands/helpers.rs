use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};

/// Use the given password or ask for one on stdin.
pub(crate) fn resolve_password(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

pub(crate) fn grams(v: f64) -> String {
    format!("{:.1} g", no_neg_zero(v))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}
