//! Command line parsing for the karst driver.
use argh::FromArgs;
use itertools::Itertools;
use karst_models::MODEL_NAMES;
use karst_utils::{Error, Id, KarstResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// A `name=value` override of a configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigOverride {
    pub name: Id,
    pub value: i64,
}

impl FromStr for ConfigOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `name=value', found `{s}'"))?;
        let value = value
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("bad value for `{name}': {e}"))?;
        Ok(Self {
            name: Id::from(name.trim()),
            value,
        })
    }
}

#[derive(FromArgs, Debug)]
/// Functional memory models and their scheduling bounds.
pub struct Opts {
    /// model to analyze: sram, fifo, line-buffer or double-buffer
    #[argh(positional)]
    pub model: String,

    /// set a configurable (name=value), may be repeated
    #[argh(option, short = 'x', long = "set")]
    pub overrides: Vec<ConfigOverride>,

    /// json object mapping configurables to values. `-x` takes precedence
    #[argh(option, long = "config")]
    pub config_file: Option<PathBuf>,

    /// number of physical memory ports (1 or 2)
    #[argh(option, default = "1")]
    pub ports: u64,

    /// words of the SRAM macro the model is mapped onto
    #[argh(option, long = "sram-size")]
    pub sram_size: Option<u64>,

    /// the SRAM macro supports partial writes
    #[argh(switch, long = "partial-write")]
    pub partial_write: bool,

    /// rows of the line buffer
    #[argh(option, default = "4")]
    pub rows: u64,

    /// cycles between two invocations, defaults to the minimum cycle count
    #[argh(option)]
    pub throughput: Option<u64>,

    /// cycles available to the accesses of one invocation, defaults to the
    /// throughput
    #[argh(option)]
    pub total: Option<u64>,

    /// print the recorded model instead of the scheduling report
    #[argh(switch, long = "print-ir")]
    pub print_ir: bool,

    /// emit the scheduling report as json
    #[argh(switch)]
    pub json: bool,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

impl Opts {
    /// Parse and validate the command line.
    pub fn get_opts() -> KarstResult<Self> {
        let opts: Opts = argh::from_env();
        if !MODEL_NAMES.contains(&opts.model.as_str()) {
            return Err(Error::invalid_input(format!(
                "unknown model `{}', expected one of: {}",
                opts.model,
                MODEL_NAMES.iter().join(", ")
            )));
        }
        Ok(opts)
    }

    /// Configuration to apply to the model: the file first, then every
    /// `-x` override in order.
    pub fn configuration(&self) -> KarstResult<Vec<(Id, i64)>> {
        let mut config = vec![];
        if let Some(path) = &self.config_file {
            let text = std::fs::read_to_string(path)?;
            let values: BTreeMap<String, i64> = serde_json::from_str(&text)
                .map_err(|e| {
                    Error::invalid_input(format!("{}: {e}", path.display()))
                })?;
            config.extend(values.into_iter().map(|(k, v)| (Id::from(k), v)));
        }
        config.extend(self.overrides.iter().map(|o| (o.name, o.value)));
        Ok(config)
    }
}
