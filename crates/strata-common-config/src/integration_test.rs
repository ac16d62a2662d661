use std::fs;
use tempfile::tempdir;

use super::*;

#[test]
fn test_full_config_loading_workflow() {
    std::env::set_var("STRATA_IT_REPLICA_DSN", "sqlite://replica.db");

    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.yaml");

    let config_content = r#"
primary: ${STRATA_IT_PRIMARY_DSN:-sqlite://primary.db}
type: sqlite
replicas:
  - dsn: ${STRATA_IT_REPLICA_DSN}
    weight: 3
  - dsn: "sqlite://replica-2.db"
    weight: 0
log:
  level: info
  colorful: true
slow_query:
  enabled: true
  threshold_ms: 150
  log_params: true

# Monitor config will use defaults since not specified
"#;

    fs::write(&path, config_content).unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();

    assert_eq!(config.primary, "sqlite://primary.db");
    assert_eq!(config.replicas[0].dsn, "sqlite://replica.db");
    assert_eq!(config.replicas[0].weight, 3);
    assert_eq!(config.replicas[1].weight, 0);
    assert_eq!(config.log.level, "info");
    assert!(config.log.colorful);
    assert!(config.slow_query.enabled);
    assert_eq!(config.slow_query.threshold.as_millis(), 150);
    assert!(!config.monitor.enabled);

    std::env::remove_var("STRATA_IT_REPLICA_DSN");
}
