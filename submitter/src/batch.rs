use nix::unistd::gethostname;
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_unwrap::ResultExt;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum SubmissionStatus {
    Submitted,
    Failed,
    DryRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    // 1-based position within the round
    pub index: usize,
    // scheduler side handle, e.g. the SLURM job id, if one could be determined
    pub job: Option<u64>,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Serialize)]
/// record of one submission round
/// supposed to be rendered as the YAML receipt
pub struct Batch {
    pub sweep: String,
    pub host: String,
    pub submissions: Vec<Submission>,
}

impl Batch {
    pub fn new(sweep: String) -> Self {
        Self {
            sweep,
            host: local_hostname(),
            submissions: Vec::new(),
        }
    }

    pub fn record(&mut self, index: usize, job: Option<u64>, status: SubmissionStatus) {
        self.submissions.push(Submission { index, job, status });
    }

    pub fn submitted(&self) -> usize {
        self.count(SubmissionStatus::Submitted)
    }

    pub fn failed(&self) -> usize {
        self.count(SubmissionStatus::Failed)
    }

    fn count(&self, status: SubmissionStatus) -> usize {
        self.submissions
            .iter()
            .filter(|submission| submission.status == status)
            .count()
    }

    /// render the round as YAML and persist it
    pub fn write_receipt(&self, path: &PathBuf) -> Result<(), std::io::Error> {
        // serializing plain owned fields, the render itself cannot fail
        let rendered = serde_yaml::to_string(self).unwrap_or_log();

        std::fs::write(path, rendered)
    }
}

fn local_hostname() -> String {
    match gethostname() {
        Ok(hostname) => hostname.to_string_lossy().into_owned(),
        Err(error) => {
            error!(error = ?error, "Failed to retrieve hostname for the receipt: {error}");

            String::from("unknown")
        }
    }
}
