//! Archive placement inside a snapshot
//!
//! Each source path maps to `<volume>/<path without volume prefix>.zip`
//! under the snapshot root, so `C:\ProgramData\Gitea\data` becomes
//! `C/ProgramData/Gitea/data.zip` and `/srv/redis` becomes
//! `root/srv/redis.zip`.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf, Prefix};

/// Volume name used for paths that start at a bare root
pub const ROOT_VOLUME: &str = "root";

/// Archive file extension
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Identifier of the volume a path lives on
fn volume_identifier(prefix: Prefix<'_>) -> OsString {
    match prefix {
        Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
            OsString::from((letter as char).to_ascii_uppercase().to_string())
        }
        Prefix::UNC(server, share) | Prefix::VerbatimUNC(server, share) => {
            let mut id = server.to_os_string();
            id.push("_");
            id.push(share);
            id
        }
        Prefix::Verbatim(name) | Prefix::DeviceNS(name) => name.to_os_string(),
    }
}

/// Archive path for `source`, relative to the snapshot root
pub fn relative_archive_path(source: &Path) -> PathBuf {
    let mut volume: Option<OsString> = None;
    let mut segments: Vec<OsString> = Vec::new();

    for component in source.components() {
        match component {
            Component::Prefix(prefix) => volume = Some(volume_identifier(prefix.kind())),
            Component::RootDir => {
                volume.get_or_insert_with(|| OsString::from(ROOT_VOLUME));
            }
            Component::Normal(part) => segments.push(part.to_os_string()),
            Component::CurDir | Component::ParentDir => {}
        }
    }

    let volume = volume.unwrap_or_else(|| OsString::from(ROOT_VOLUME));
    let mut relative = PathBuf::from(&volume);

    match segments.split_last() {
        Some((last, parents)) => {
            for parent in parents {
                relative.push(parent);
            }
            let mut file_name = last.clone();
            file_name.push(".");
            file_name.push(ARCHIVE_EXTENSION);
            relative.push(file_name);
        }
        None => {
            // the whole volume; keep it next to the other volume directories
            let mut file_name = volume;
            file_name.push(".");
            file_name.push(ARCHIVE_EXTENSION);
            relative = PathBuf::from(file_name);
        }
    }

    relative
}

/// Full archive destination for `source` inside `snapshot_root`
pub fn archive_destination(snapshot_root: &Path, source: &Path) -> PathBuf {
    snapshot_root.join(relative_archive_path(source))
}
