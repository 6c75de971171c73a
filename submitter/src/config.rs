use crate::submitters::SubmitterError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap, fs::File, os::unix::fs::MetadataExt, path::PathBuf, time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &PathBuf) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound)
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::ReadFailed(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Submitter not supported")]
    UnsupportedSubmitter(String),
    #[error("Submitter failed to load")]
    FailedLoadSubmitter(#[from] SubmitterError),
    #[error("Config file could not be parsed")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("File not found")]
    FileNotFound,
    #[error("Failed to read file")]
    ReadFailed(#[from] std::io::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    // The sweep this round submits agents for
    pub sweep: Sweep,
    // Submission backend, see Submitters::load for the selection proccess
    pub submitter: SubmitterConfig,
    // Shape of the submission round itself
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Sweep {
    // Sweep identifier handed to the companion script as its only positional argument
    pub id: String,
    // Companion script that every submitted copy executes
    pub script: PathBuf,
    // Extra arguments placed between the script and the sweep identifier
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SubmitterConfig {
    // Name of the selected submitter
    pub name: String,
    // parameters for the submitter that apply over the whole round
    // TODO: Make this fully typed with an enum
    pub parameter: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_delay")]
    pub delay_seconds: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            delay_seconds: default_delay(),
        }
    }
}

impl SweepConfig {
    /// read and parse a config file
    pub fn load(path: &PathBuf) -> Result<Self, ConfigErrors> {
        let raw = std::fs::read_to_string(path)?;

        Ok(serde_yaml::from_str(&raw)?)
    }

    /// delay between consecutive submissions
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.batch.delay_seconds)
    }

    pub fn preflight_checks(&mut self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        self.submitter.name = self.submitter.name.to_lowercase();

        match self.submitter.name.as_str() {
            "slurm" | "process" => {}
            submitter_name => {
                error!("submitter.name ({submitter_name}) is not supported, please use `slurm` or `process`");
                contains_error = true;
            }
        }

        if let Some(parameter) = self.submitter.parameter.as_ref() {
            if parameter
                .get("sbatch")
                .filter(|value| !value.is_string())
                .is_some()
            {
                error!("submitter.parameter.sbatch must be a path to the submission program");
                contains_error = true;
            }

            if parameter
                .get("timeout")
                .filter(|value| value.as_u64().is_none())
                .is_some()
            {
                error!("submitter.parameter.timeout must be a natural number of seconds");
                contains_error = true;
            }

            if parameter
                .get("args")
                .filter(|value| !value.is_sequence())
                .is_some()
            {
                error!("submitter.parameter.args must be a list of strings");
                contains_error = true;
            }
        }

        if self.sweep.id.trim().is_empty() {
            error!("sweep.id is empty, the companion script needs a sweep identifier");
            contains_error = true;
        }

        if self.batch.count == 0 {
            error!("batch.count cannot be 0. A submission round has to submit at least one copy.");
            contains_error = true;
        }

        if self.batch.delay_seconds == 0 {
            warn!("batch.delay_seconds is 0, copies will be submitted back to back");
        }

        if !self.sweep.script.is_file() {
            error!(
                "Failed to find sweep.script. Either not a file or not found at {}",
                self.sweep.script.to_string_lossy()
            );

            contains_error = true;
        } else {
            match check_executable(&self.sweep.script) {
                Ok(is_executable) => {
                    if !is_executable {
                        warn!(
                            "sweep.script target {} is not executable, this might cause problems",
                            self.sweep.script.to_string_lossy()
                        );
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to determine if sweep.script ({}) is an executable: {e}",
                        self.sweep.script.to_string_lossy()
                    );

                    contains_error = true;
                }
            }
        }

        contains_error
    }
}

fn default_count() -> usize {
    10
}

fn default_delay() -> u64 {
    5
}
