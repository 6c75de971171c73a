use super::SubmitterError;
use crate::{
    batch::{Batch, SubmissionStatus},
    config::SweepConfig,
};
use itertools::Itertools;
use std::{
    ffi::OsString,
    io::Read,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, trace, warn};
use wait_timeout::ChildExt;

const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(3600);

/// Submitter that runs the companion script directly, one copy after another
/// meant for machines without a SLURM controller
#[derive(Debug)]
pub struct ProcessSubmitter {
    config: SweepConfig,
    dry_run: bool,
}

impl ProcessSubmitter {
    pub fn load(config: SweepConfig, dry_run: bool) -> Result<Self, SubmitterError> {
        Ok(Self { config, dry_run })
    }

    /// how long one copy may run before it is killed
    pub fn run_timeout(&self) -> Duration {
        if let Some(Some(Some(seconds))) = self
            .config
            .submitter
            .parameter
            .as_ref()
            .map(|parameters| parameters.get("timeout").map(|value| value.as_u64()))
        {
            Duration::from_secs(seconds)
        } else {
            DEFAULT_RUN_TIMEOUT
        }
    }

    /// argument vector for one copy: script [sweep args] sweep-id
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = vec![self.config.sweep.script.clone().into_os_string()];

        argv.extend(self.config.sweep.args.iter().map(OsString::from));
        argv.push(OsString::from(&self.config.sweep.id));

        argv
    }

    #[instrument(skip(self), level = "info")]
    pub fn submit(&mut self) -> Result<Batch, SubmitterError> {
        let mut batch = Batch::new(self.config.sweep.id.clone());
        let total = self.config.batch.count;
        let delay = self.config.delay();
        let timeout = self.run_timeout();
        let argv = self.argv();
        let rendered = argv.iter().map(|arg| arg.to_string_lossy()).join(" ");

        for index in 1..=total {
            if index > 1 && !self.dry_run && !delay.is_zero() {
                thread::sleep(delay);
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
                Ok(mut child) => {
                    // the pid stands in for a scheduler job id
                    let pid = u64::from(child.id());

                    // drain stdout on a separate thread, a script writing more than the
                    // pipe buffer would otherwise block until the timeout kills it
                    let reader = child.stdout.take().map(|mut stdout| {
                        thread::spawn(move || {
                            let mut output = String::new();

                            if let Err(error) = stdout.read_to_string(&mut output) {
                                warn!("Failed to read script output: {error}");
                            }

                            output
                        })
                    });

                    match child.wait_timeout(timeout)? {
                        Some(status) => {
                            let output = reader
                                .and_then(|handle| handle.join().ok())
                                .unwrap_or_default();

                            debug!(
                                "Finished in {} ms | status: {}",
                                start.elapsed().as_millis(),
                                status.success()
                            );
                            trace!("Output: {output}");

                            if status.success() {
                                info!("Finished copy {index}/{total} as pid {pid}");
                                batch.record(index, Some(pid), SubmissionStatus::Submitted);
                            } else {
                                warn!("Copy {index}/{total} exited with a failure");
                                batch.record(index, Some(pid), SubmissionStatus::Failed);
                            }
                        }
                        None => {
                            // child hasn't exited yet
                            if let Err(error) = child.kill() {
                                warn!("Failed to kill timed out copy: {error}");
                            }

                            // the kill closes the pipe, let the reader run out
                            if let Some(handle) = reader {
                                let _ = handle.join();
                            }

                            warn!("Copy {index}/{total} ran into the run timeout");
                            batch.record(index, Some(pid), SubmissionStatus::Failed);
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SubmitterError::MissingProgram(
                        argv[0].to_string_lossy().into_owned(),
                    ));
                }
                Err(e) => {
                    warn!("Failed to spawn the companion script for copy {index}/{total}: {e}");
                    batch.record(index, None, SubmissionStatus::Failed);
                }
            };
        }

        info!("Done with the submission round");

        Ok(batch)
    }
}
