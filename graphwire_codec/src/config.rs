use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;

pub const ENV_VAR_INITIAL_CAPACITY: &str = "GRAPHWIRE_INITIAL_CAPACITY";
pub const ENV_VAR_MAX_DEPTH: &str = "GRAPHWIRE_MAX_DEPTH";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CodecConfig {
    /// Bytes reserved for the output buffer before encoding starts.
    pub initial_capacity: usize,
    /// Deepest allowed nesting of Reference/Array brackets, root included.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1000,
            max_depth: 1000,
        }
    }
}

impl CodecConfig {
    /// Defaults, overridden by whichever env vars are set.
    pub fn from_env() -> Result<Self> {
        let dflt = Self::default();
        Ok(Self {
            initial_capacity: env_or(ENV_VAR_INITIAL_CAPACITY, dflt.initial_capacity)?,
            max_depth: env_or(ENV_VAR_MAX_DEPTH, dflt.max_depth)?,
        })
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn env_or<T: FromStr>(var: &str, dflt: T) -> Result<T> {
    match env::var(var) {
        Err(_) => Ok(dflt),
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{var}={s:?} is not a valid setting")),
    }
}
