//! Workload definitions
//!
//! A workload is a stoppable/startable unit whose on-disk state is backed up
//! while it is quiesced.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a workload is stopped and started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// An OS-managed service (Windows service, systemd unit)
    Service,
    /// A docker compose project
    #[serde(alias = "compose")]
    ContainerGroup,
    /// A single docker container, addressed by name
    #[serde(alias = "docker")]
    Container,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Service => write!(f, "service"),
            WorkloadKind::ContainerGroup => write!(f, "container-group"),
            WorkloadKind::Container => write!(f, "container"),
        }
    }
}

/// A workload and the data paths it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Service name or compose project name
    pub name: String,

    /// Capability kind
    pub kind: WorkloadKind,

    /// Files or directories to archive while the workload is stopped
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Compose project directory (container groups only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,
}

impl Workload {
    /// Create a service workload
    pub fn service(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: WorkloadKind::Service,
            paths,
            project_dir: None,
        }
    }

    /// Create a container-group workload
    pub fn container_group(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: WorkloadKind::ContainerGroup,
            paths,
            project_dir: None,
        }
    }

    /// Create a plain container workload
    pub fn container(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: WorkloadKind::Container,
            paths,
            project_dir: None,
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_deserialize() {
        let kind: WorkloadKind = serde_json::from_str("\"service\"").unwrap();
        assert_eq!(kind, WorkloadKind::Service);

        let kind: WorkloadKind = serde_json::from_str("\"container_group\"").unwrap();
        assert_eq!(kind, WorkloadKind::ContainerGroup);

        let kind: WorkloadKind = serde_json::from_str("\"compose\"").unwrap();
        assert_eq!(kind, WorkloadKind::ContainerGroup);

        let kind: WorkloadKind = serde_json::from_str("\"container\"").unwrap();
        assert_eq!(kind, WorkloadKind::Container);

        let kind: WorkloadKind = serde_json::from_str("\"docker\"").unwrap();
        assert_eq!(kind, WorkloadKind::Container);
    }

    #[test]
    fn test_display() {
        let workload = Workload::service("gitea", vec![]);
        assert_eq!(workload.to_string(), "service 'gitea'");

        let workload = Workload::container_group("immich", vec![]);
        assert_eq!(workload.to_string(), "container-group 'immich'");

        let workload = Workload::container("redis", vec![]);
        assert_eq!(workload.to_string(), "container 'redis'");
    }

    #[test]
    fn test_paths_default_empty() {
        let workload: Workload =
            serde_json::from_str(r#"{"name": "redis", "kind": "service"}"#).unwrap();
        assert!(workload.paths.is_empty());
        assert!(workload.project_dir.is_none());
    }
}
