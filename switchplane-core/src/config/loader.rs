use std::fs;
use std::path::Path;

use crate::config::{validator, Config};
use crate::error::{DataplaneError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| DataplaneError::Invalid(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| DataplaneError::Invalid(format!("failed to parse config: {e}")))?;

    validator::validate(&cfg)?;

    Ok(cfg)
}
