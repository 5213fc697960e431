//! `list` command handler

use chrono::Local;

use super::format::{format_duration, format_size};
use crate::config::{ColdsnapPaths, ConfigSource, FileConfigSource};
use crate::error::ColdsnapResult;
use crate::store::SnapshotStore;

/// List every snapshot in the configured store, oldest first
pub fn handle_list_command(paths: &ColdsnapPaths, verbose: bool) -> ColdsnapResult<()> {
    let loaded = FileConfigSource::from_paths(paths).load()?;
    let store = SnapshotStore::new(&loaded.config.snapshot_root);
    let snapshots = store.list()?;

    if snapshots.is_empty() {
        println!("No snapshots found in {}.", store.root().display());
        println!("Create one with: coldsnap run");
        return Ok(());
    }

    println!("Snapshots in {}", store.root().display());
    println!("=============");
    println!();

    let now = Local::now().naive_local();
    let mut total_bytes = 0;

    for (i, snapshot) in snapshots.iter().enumerate() {
        let age = format_duration(now.signed_duration_since(snapshot.id.datetime()));
        let size = store.size_of(snapshot);
        total_bytes += size;

        // a snapshot without a readable manifest is shown, not fatal
        let manifest = store.read_manifest(snapshot).ok().flatten();
        let marker = match &manifest {
            Some(m) if m.complete => "",
            Some(_) => " [incomplete]",
            None => " [no manifest]",
        };

        println!(
            "  {}. {} ({} ago, {}){}",
            i + 1,
            snapshot.id,
            age,
            format_size(size),
            marker
        );

        if verbose {
            if let Some(manifest) = manifest {
                for entry in &manifest.entries {
                    println!(
                        "       {} {} -> {} ({} files, {})",
                        entry.workload,
                        entry.source.display(),
                        entry.archive.display(),
                        entry.files,
                        format_size(entry.bytes)
                    );
                }
                for missing in &manifest.missing_sources {
                    println!("       missing: {}", missing.display());
                }
            }
        }
    }

    println!();
    println!(
        "Total: {} snapshot(s), {}",
        snapshots.len(),
        format_size(total_bytes)
    );
    Ok(())
}
