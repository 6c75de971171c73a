pub mod process;
pub mod slurm;

#[cfg(test)]
mod process_test;

use crate::{
    batch::Batch,
    config::{ConfigErrors, SweepConfig},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Submission program not found: {0}")]
    MissingProgram(String),
    #[error("Failed to wait for a submission child")]
    ChildError(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum Submitters {
    Slurm(slurm::SlurmSubmitter),
    Process(process::ProcessSubmitter),
}

impl Submitters {
    pub fn load(config: SweepConfig, dry_run: bool) -> Result<Self, ConfigErrors> {
        match config.submitter.name.as_str() {
            "slurm" => Ok(Self::Slurm(slurm::SlurmSubmitter::load(config, dry_run)?)),
            "process" => Ok(Self::Process(process::ProcessSubmitter::load(
                config, dry_run,
            )?)),
            _ => Err(ConfigErrors::UnsupportedSubmitter(config.submitter.name)),
        }
    }

    pub fn submit(&mut self) -> Result<Batch, SubmitterError> {
        match self {
            Self::Slurm(submitter) => submitter.submit(),
            Self::Process(submitter) => submitter.submit(),
        }
    }
}
