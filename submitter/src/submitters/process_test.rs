use super::{process::ProcessSubmitter, SubmitterError};
use crate::batch::SubmissionStatus;
use std::time::Duration;

fn submitter(raw: &str) -> ProcessSubmitter {
    ProcessSubmitter::load(serde_yaml::from_str(raw).unwrap(), false).unwrap()
}

#[test]
pub fn runs_every_copy() {
    let mut submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: /bin/sh
  args: [\"-c\", \"exit 0\"]
submitter:
  name: process
batch:
  count: 2
  delay_seconds: 0
",
    );

    let batch = submitter.submit().unwrap();

    assert_eq!(batch.submissions.len(), 2);
    assert_eq!(batch.submitted(), 2);
    assert!(batch
        .submissions
        .iter()
        .all(|submission| submission.job.is_some()));
}

#[test]
pub fn records_failing_copies() {
    let mut submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: /bin/sh
  args: [\"-c\", \"exit 3\"]
submitter:
  name: process
batch:
  count: 1
  delay_seconds: 0
",
    );

    let batch = submitter.submit().unwrap();

    assert_eq!(batch.failed(), 1);
    assert_eq!(batch.submissions[0].status, SubmissionStatus::Failed);
}

#[test]
pub fn timeout_kills_the_copy_and_continues() {
    let mut submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: /bin/sh
  args: [\"-c\", \"sleep 30\"]
submitter:
  name: process
  parameter:
    timeout: 1
batch:
  count: 2
  delay_seconds: 0
",
    );

    let batch = submitter.submit().unwrap();

    assert_eq!(batch.submissions.len(), 2);
    assert_eq!(batch.failed(), 2);
    assert!(batch
        .submissions
        .iter()
        .all(|submission| submission.status == SubmissionStatus::Failed));
}

#[test]
pub fn drains_output_larger_than_the_pipe_buffer() {
    let mut submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: /bin/sh
  args: [\"-c\", \"yes x | head -c 200000\"]
submitter:
  name: process
  parameter:
    timeout: 10
batch:
  count: 1
  delay_seconds: 0
",
    );

    let batch = submitter.submit().unwrap();

    assert_eq!(batch.submitted(), 1);
}

#[test]
pub fn missing_script_aborts_the_round() {
    let mut submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: /definitely/not/here/run_one.sh
submitter:
  name: process
batch:
  count: 2
  delay_seconds: 0
",
    );

    assert!(matches!(
        submitter.submit(),
        Err(SubmitterError::MissingProgram(_))
    ));
}

#[test]
pub fn run_timeout_override() {
    let submitter = submitter(
        "
sweep:
  id: simx0pgt
  script: run_one.sh
submitter:
  name: process
  parameter:
    timeout: 120
",
    );

    assert_eq!(submitter.run_timeout(), Duration::from_secs(120));
}
