//! Backup configuration
//!
//! The workload list, retention policy, and snapshot store location used by
//! one pipeline run. Parsed from JSON or YAML and validated before the
//! pipeline starts.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ColdsnapError, ColdsnapResult};
use crate::models::{RetentionPolicy, Timeouts, Workload, WorkloadKind};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Everything a run needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding one sub-directory per snapshot
    #[serde(alias = "backup_root")]
    pub snapshot_root: PathBuf,

    /// Retention policy applied after each run
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Per-call timeouts for stop, start, and archive
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Workloads, in the order they are stopped and restarted
    #[serde(default)]
    pub workloads: Vec<Workload>,
}

impl BackupConfig {
    /// Parse configuration text in the given format and validate it
    pub fn parse(text: &str, format: ConfigFormat) -> ColdsnapResult<Self> {
        let config: BackupConfig = match format {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| {
                ColdsnapError::Config(format!("Failed to parse configuration: {}", e))
            })?,
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| {
                ColdsnapError::Config(format!("Failed to parse configuration: {}", e))
            })?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> ColdsnapResult<()> {
        if self.snapshot_root.as_os_str().is_empty() {
            return Err(ColdsnapError::Config("snapshot_root must not be empty".into()));
        }

        let timeouts = &self.timeouts;
        if timeouts.stop_secs == 0 || timeouts.start_secs == 0 || timeouts.archive_secs == 0 {
            return Err(ColdsnapError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }

        let mut names = HashSet::new();
        for workload in &self.workloads {
            if workload.name.trim().is_empty() {
                return Err(ColdsnapError::Config("workload name must not be empty".into()));
            }
            if !names.insert(workload.name.as_str()) {
                return Err(ColdsnapError::Config(format!(
                    "duplicate workload name: {}",
                    workload.name
                )));
            }
            if workload.project_dir.is_some() && workload.kind != WorkloadKind::ContainerGroup {
                return Err(ColdsnapError::Config(format!(
                    "project_dir is only valid for container groups (workload '{}')",
                    workload.name
                )));
            }
            for path in &workload.paths {
                validate_source_path(&workload.name, path)?;
            }
        }

        self.validate_source_layout()
    }

    /// Sources must be distinct and must not contain the snapshot store;
    /// otherwise archives collide or an archive walks into itself.
    fn validate_source_layout(&self) -> ColdsnapResult<()> {
        let store = resolve_path(&self.snapshot_root);
        let mut seen = HashSet::new();

        for workload in &self.workloads {
            for path in &workload.paths {
                let source = resolve_path(path);
                if store.starts_with(&source) {
                    return Err(ColdsnapError::Config(format!(
                        "snapshot_root {} is inside source path {} of workload '{}'",
                        self.snapshot_root.display(),
                        path.display(),
                        workload.name
                    )));
                }
                if !seen.insert(source) {
                    return Err(ColdsnapError::Config(format!(
                        "source path {} is listed more than once",
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Total number of configured source paths
    pub fn source_count(&self) -> usize {
        self.workloads.iter().map(|w| w.paths.len()).sum()
    }
}

/// Absolute form of `path`, with links resolved for the part that exists
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut existing = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |resolved, part| resolved.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

fn validate_source_path(workload: &str, path: &Path) -> ColdsnapResult<()> {
    if !path.is_absolute() {
        return Err(ColdsnapError::Config(format!(
            "source path for workload '{}' must be absolute: {}",
            workload,
            path.display()
        )));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ColdsnapError::Config(format!(
            "source path for workload '{}' must not contain '..': {}",
            workload,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(p: &str) -> String {
        if cfg!(windows) {
            format!("C:{}", p)
        } else {
            p.to_string()
        }
    }

    fn sample_json() -> String {
        serde_json::json!({
            "snapshot_root": abs("/backups"),
            "retention": { "days": 7, "min_versions": 2, "max_versions": 10 },
            "workloads": [
                { "name": "gitea", "kind": "service", "paths": [abs("/srv/gitea")] },
                { "name": "immich", "kind": "container_group", "paths": [abs("/srv/immich")],
                  "project_dir": abs("/stacks/immich") }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_json() {
        let config = BackupConfig::parse(&sample_json(), ConfigFormat::Json).unwrap();
        assert_eq!(config.workloads.len(), 2);
        assert_eq!(config.workloads[1].kind, WorkloadKind::ContainerGroup);
        assert_eq!(config.retention.max_versions, 10);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.source_count(), 2);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = format!(
            "snapshot_root: {}\nworkloads:\n  - name: redis\n    kind: service\n    paths:\n      - {}\n",
            abs("/backups"),
            abs("/var/lib/redis")
        );
        let config = BackupConfig::parse(&yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.workloads[0].name, "redis");
        assert_eq!(config.retention, RetentionPolicy::default());
    }

    #[test]
    fn test_backup_root_alias() {
        let json = format!(r#"{{"backup_root": "{}"}}"#, abs("/backups").replace('\\', "\\\\"));
        let config = BackupConfig::parse(&json, ConfigFormat::Json).unwrap();
        assert!(config.workloads.is_empty());
    }

    #[test]
    fn test_malformed_is_config_error() {
        let err = BackupConfig::parse("{ not json", ConfigFormat::Json).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_rejects_relative_path() {
        let json = format!(
            r#"{{"snapshot_root": "{}", "workloads": [{{"name": "a", "kind": "service", "paths": ["data"]}}]}}"#,
            abs("/backups")
        );
        let err = BackupConfig::parse(&json, ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut config = BackupConfig::parse(&sample_json(), ConfigFormat::Json).unwrap();
        config.workloads[1].name = "gitea".into();
        config.workloads[1].project_dir = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate workload name"));
    }

    #[test]
    fn test_rejects_snapshot_root_inside_source() {
        let mut config = BackupConfig::parse(&sample_json(), ConfigFormat::Json).unwrap();
        config.snapshot_root = PathBuf::from(abs("/srv/gitea/backups"));
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("inside source path"));

        config.snapshot_root = PathBuf::from(abs("/srv/gitea"));
        assert!(config.validate().is_err());

        // a sibling that merely shares a name prefix is fine
        config.snapshot_root = PathBuf::from(abs("/srv/gitea-backups"));
        config.validate().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_snapshot_root_inside_linked_source() {
        let temp = tempfile::TempDir::new().unwrap();
        let real = temp.path().join("srv");
        fs::create_dir_all(real.join("backups")).unwrap();
        let link = temp.path().join("data");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let config = BackupConfig {
            snapshot_root: real.join("backups"),
            retention: RetentionPolicy::default(),
            timeouts: Timeouts::default(),
            workloads: vec![Workload::service("gitea", vec![link])],
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("inside source path"));
    }

    #[test]
    fn test_rejects_duplicate_source_path() {
        let mut config = BackupConfig::parse(&sample_json(), ConfigFormat::Json).unwrap();
        config.workloads[1].paths = vec![PathBuf::from(abs("/srv/gitea"))];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("listed more than once"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = BackupConfig::parse(&sample_json(), ConfigFormat::Json).unwrap();
        config.timeouts.stop_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("c.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("c.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("c.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }
}
