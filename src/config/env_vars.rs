use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENV_VAR: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("environment variable pattern is valid");
}

/// Replace `$VAR` and `${VAR}` with their values.
///
/// Variables that are not set are left untouched so the failure is visible
/// in the resulting path.
pub fn expand_env_vars(raw: &str) -> String {
    ENV_VAR
        .replace_all(raw, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Expand a leading `~` and environment variables in a configured path
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw.trim());

    if expanded == "~" || expanded.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(format!("{}{}", home, &expanded[1..]));
        }
    }

    PathBuf::from(expanded)
}
