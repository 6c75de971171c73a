use super::SubmitterError;
use crate::{
    batch::{Batch, SubmissionStatus},
    config::SweepConfig,
};
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::{
    ffi::OsString,
    io::Read,
    process::{Command, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

pub static DEFAULT_SBATCH: Lazy<OsString> = Lazy::new(|| OsString::from("sbatch"));

const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Submitter that hands every copy to the SLURM controller via sbatch
#[derive(Debug)]
pub struct SlurmSubmitter {
    config: SweepConfig,
    dry_run: bool,
}

impl SlurmSubmitter {
    pub fn load(config: SweepConfig, dry_run: bool) -> Result<Self, SubmitterError> {
        Ok(Self { config, dry_run })
    }

    /// submission program, overridable through the parameter map
    pub fn sbatch(&self) -> OsString {
        if let Some(Some(Some(exec))) = self
            .config
            .submitter
            .parameter
            .as_ref()
            .map(|parameters| parameters.get("sbatch").map(|value| value.as_str()))
        {
            OsString::from(exec)
        } else {
            DEFAULT_SBATCH.clone()
        }
    }

    /// how long a single sbatch invocation may take before it is killed
    pub fn submission_timeout(&self) -> Duration {
        if let Some(Some(Some(seconds))) = self
            .config
            .submitter
            .parameter
            .as_ref()
            .map(|parameters| parameters.get("timeout").map(|value| value.as_u64()))
        {
            Duration::from_secs(seconds)
        } else {
            DEFAULT_SUBMISSION_TIMEOUT
        }
    }

    /// full argument vector for one copy: sbatch [args] script [sweep args] sweep-id
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = vec![self.sbatch()];

        if let Some(Some(args)) = self
            .config
            .submitter
            .parameter
            .as_ref()
            .map(|parameters| parameters.get("args").and_then(|value| value.as_sequence()))
        {
            argv.extend(args.iter().filter_map(|value| match value.as_str() {
                Some(arg) => Some(OsString::from(arg)),
                None => {
                    warn!("Skipping non-string entry in submitter.parameter.args");

                    None
                }
            }));
        }

        argv.push(self.config.sweep.script.clone().into_os_string());
        argv.extend(self.config.sweep.args.iter().map(OsString::from));
        argv.push(OsString::from(&self.config.sweep.id));

        argv
    }

    #[instrument(skip(self), level = "info")]
    pub fn submit(&mut self) -> Result<Batch, SubmitterError> {
        let mut batch = Batch::new(self.config.sweep.id.clone());
        let total = self.config.batch.count;
        let delay = self.config.delay();
        let timeout = self.submission_timeout();
        let argv = self.argv();
        let rendered = argv.iter().map(|arg| arg.to_string_lossy()).join(" ");

        for index in 1..=total {
            // delay applies between submissions, not after the final one
            if index > 1 && !self.dry_run && !delay.is_zero() {
                sleep(delay);
            }

            if self.dry_run {
                info!("Would run ({index}/{total}): {rendered}");
                batch.record(index, None, SubmissionStatus::DryRun);

                continue;
            }

            debug!("Running ({index}/{total}): {rendered}");
            let start = Instant::now();

            match Command::new(&argv[0])
                .args(&argv[1..])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
            {
                Ok(mut child) => match child.wait_timeout(timeout)? {
                    Some(status) => {
                        let mut output = String::new();

                        if let Some(mut stdout) = child.stdout.take() {
                            if let Err(error) = stdout.read_to_string(&mut output) {
                                warn!("Failed to read sbatch output: {error}");
                            }
                        }

                        debug!(
                            "sbatch returned in {} ms | status: {}",
                            start.elapsed().as_millis(),
                            status.success()
                        );

                        if status.success() {
                            let job = parse_job_id(&output);

                            if job.is_none() {
                                warn!("sbatch output did not contain a job id: {output}");
                            }

                            info!("Submitted copy {index}/{total} as job {job:?}");
                            batch.record(index, job, SubmissionStatus::Submitted);
                        } else {
                            let mut stderr_buffer = String::new();

                            if let Some(mut stderr) = child.stderr.take() {
                                if let Err(error) = stderr.read_to_string(&mut stderr_buffer) {
                                    warn!("Failed to read sbatch stderr: {error}");
                                }
                            }

                            warn!(
                                stderr = stderr_buffer,
                                "sbatch rejected copy {index}/{total}"
                            );
                            batch.record(index, None, SubmissionStatus::Failed);
                        }
                    }
                    None => {
                        // child hasn't exited yet
                        if let Err(error) = child.kill() {
                            warn!("Failed to kill timed out sbatch child: {error}");
                        }

                        warn!("sbatch ran into the submission timeout for copy {index}/{total}");
                        batch.record(index, None, SubmissionStatus::Failed);
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // every following copy would fail the same way, abort the round
                    return Err(SubmitterError::MissingProgram(
                        argv[0].to_string_lossy().into_owned(),
                    ));
                }
                Err(e) => {
                    warn!("Failed to spawn sbatch for copy {index}/{total}: {e}");
                    batch.record(index, None, SubmissionStatus::Failed);
                }
            };
        }

        info!("Done with the submission round");

        Ok(batch)
    }
}

/// extract the job id from sbatch output
/// understands the default `Submitted batch job <id>` line as well as --parsable output
pub fn parse_job_id(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Submitted batch job") {
            rest.split_whitespace().next()?.parse().ok()
        } else {
            // --parsable prints `<id>` or `<id>;<cluster>`
            line.split(';').next()?.parse().ok()
        }
    })
}
