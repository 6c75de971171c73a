use crate::config::{check_executable, BatchConfig, ConfigErrors, SweepConfig};
use std::{path::PathBuf, time::Duration};

fn parse(raw: &str) -> SweepConfig {
    serde_yaml::from_str(raw).unwrap()
}

#[test]
pub fn parse_full_config() {
    let config = parse(
        "
sweep:
  id: simx0pgt
  script: /opt/sweeps/run_one.sh
  args: [\"--offline\"]
submitter:
  name: slurm
  parameter:
    sbatch: /opt/slurm/bin/sbatch
    timeout: 10
    args: [\"--partition=gpu\"]
batch:
  count: 4
  delay_seconds: 1
",
    );

    assert_eq!(config.sweep.id, "simx0pgt");
    assert_eq!(config.sweep.script, PathBuf::from("/opt/sweeps/run_one.sh"));
    assert_eq!(config.sweep.args, vec!["--offline"]);
    assert_eq!(config.submitter.name, "slurm");
    assert_eq!(config.batch.count, 4);
    assert_eq!(config.batch.delay_seconds, 1);
    assert_eq!(config.delay(), Duration::from_secs(1));
}

#[test]
pub fn batch_defaults() {
    let config = parse(
        "
sweep:
  id: simx0pgt
  script: run_one.sh
submitter:
  name: slurm
",
    );

    assert_eq!(config.batch.count, 10);
    assert_eq!(config.batch.delay_seconds, 5);
    assert_eq!(config.delay(), Duration::from_secs(5));
    assert!(config.submitter.parameter.is_none());
    assert!(config.sweep.args.is_empty());

    let defaults = BatchConfig::default();
    assert_eq!(defaults.count, 10);
    assert_eq!(defaults.delay_seconds, 5);
}

#[test]
pub fn unknown_fields_are_rejected() {
    let result = serde_yaml::from_str::<SweepConfig>(
        "
sweep:
  id: simx0pgt
  script: run_one.sh
submitter:
  name: slurm
retries: 3
",
    );

    assert!(result.is_err());
}

#[test]
pub fn preflight_collects_all_problems() {
    let mut config = parse(
        "
sweep:
  id: \"  \"
  script: /definitely/not/here/run_one.sh
submitter:
  name: qsub
  parameter:
    timeout: never
    args: \"--partition=gpu\"
batch:
  count: 0
",
    );

    assert!(config.preflight_checks());
}

#[test]
pub fn preflight_lowercases_submitter_name() {
    let mut config = parse(
        "
sweep:
  id: simx0pgt
  script: /bin/sh
submitter:
  name: SLURM
",
    );

    assert!(!config.preflight_checks());
    assert_eq!(config.submitter.name, "slurm");
}

#[test]
pub fn executable_check() {
    assert!(check_executable(&PathBuf::from("/bin/sh")).unwrap());

    let plain = std::env::temp_dir().join(format!("sweep-submitter-plain-{}", std::process::id()));
    std::fs::write(&plain, "not a script").unwrap();
    assert!(!check_executable(&plain).unwrap());
    std::fs::remove_file(&plain).unwrap();

    assert!(matches!(
        check_executable(&PathBuf::from("/definitely/not/here")),
        Err(ConfigErrors::FileNotFound)
    ));
}
