//! Archival run orchestration.
//!
//! A run discovers source files, partitions them by subdirectory, opens one
//! remote connection, and for every partition makes sure the remote directory
//! exists before pushing its date groups: single files go across as they are,
//! larger date groups are split by cumulative size and sent as tar archives
//! named `{project}_{subdir}_{date}[_{part}].{tar|tar.gz}`.
//!
//! Individual transfer failures are recorded and the run carries on. A failed
//! connection aborts the run before any transfer; any other error aborts it
//! with a single wrapped failure. The connection is dropped on every path.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};

use crate::archive::{archive_suffix, transfer_archive_with_manifest, transfer_single};
use crate::constants::{DEFAULT_FILE_PATTERN, DEFAULT_SIZE_LIMIT, ERROR_RUN_FAILED};
use crate::grouping::{group_by_deciphered_date, group_by_size, group_by_subdirectories, Grouping};
use crate::models::{FileEntry, Group, GroupKey, RunSummary, TransferOutcome};
use crate::transport::{make_remote_directory, PollPolicy, Transport};
use crate::utils::discovery::{find_files, SourceSpec};

/// Everything a run needs besides the connection itself
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub source: SourceSpec,
    /// Root used to derive subdirectory groups; defaults to the discovered base
    pub common_path: Option<PathBuf>,
    /// Remote directory receiving the backup
    pub target: PathBuf,
    /// Prefix of archive names; defaults to the target directory name
    pub project_name: Option<String>,
    pub file_pattern: String,
    pub overwrite: bool,
    pub compression: bool,
    pub recursive: bool,
    pub use_grouping: bool,
    pub use_subdirectories: bool,
    /// Cumulative size limit of one archive in bytes
    pub size_limit: u64,
    pub poll: PollPolicy,
}

impl ArchiveOptions {
    pub fn new(source: SourceSpec, target: impl Into<PathBuf>) -> Self {
        Self {
            source,
            common_path: None,
            target: target.into(),
            project_name: None,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            overwrite: false,
            compression: false,
            recursive: false,
            use_grouping: true,
            use_subdirectories: true,
            size_limit: DEFAULT_SIZE_LIMIT,
            poll: PollPolicy::default(),
        }
    }

    pub fn project_name(&self) -> String {
        match &self.project_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// One upload decided by the planner
#[derive(Debug, Clone)]
pub enum PlannedTransfer {
    Single { source: FileEntry, destination: PathBuf },
    Archive { sources: Group, destination: PathBuf },
}

impl PlannedTransfer {
    pub fn destination(&self) -> &Path {
        match self {
            PlannedTransfer::Single { destination, .. }
            | PlannedTransfer::Archive { destination, .. } => destination,
        }
    }

    pub fn sources(&self) -> &[FileEntry] {
        match self {
            PlannedTransfer::Single { source, .. } => std::slice::from_ref(source),
            PlannedTransfer::Archive { sources, .. } => sources,
        }
    }
}

impl fmt::Display for PlannedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedTransfer::Single { source, destination } => {
                write!(f, "{} -> {}", source.path().display(), destination.display())
            }
            PlannedTransfer::Archive { sources, destination } => {
                write!(f, "{} files -> {}", sources.len(), destination.display())
            }
        }
    }
}

/// Transfers for one subdirectory partition
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub key: GroupKey,
    pub remote_dir: PathBuf,
    pub transfers: Vec<PlannedTransfer>,
    /// Files in this partition whose names carried no date
    pub undated: Vec<PathBuf>,
}

/// Full set of transfers a run would perform
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    pub base: PathBuf,
    pub files: Vec<FileEntry>,
    pub partitions: Vec<PartitionPlan>,
}

impl ArchivePlan {
    pub fn transfers(&self) -> impl Iterator<Item = &PlannedTransfer> {
        self.partitions.iter().flat_map(|p| p.transfers.iter())
    }

    pub fn log(&self) {
        info!("Plan for {} files under {}", self.files.len(), self.base.display());
        for partition in &self.partitions {
            info!("[{}] -> {}", partition.key, partition.remote_dir.display());
            for transfer in &partition.transfers {
                info!("  {}", transfer);
            }
        }
    }
}

/// Discovered files split by subdirectory, before any remote work
struct Discovery {
    base: PathBuf,
    files: Vec<FileEntry>,
    partitions: Grouping,
}

fn discover(options: &ArchiveOptions) -> Result<Discovery> {
    let (files, base) = find_files(&options.source, &options.file_pattern, options.recursive)?;

    let partitions = if options.use_subdirectories {
        let within = options.common_path.as_deref().unwrap_or(&base);
        group_by_subdirectories(&files, within)?
    } else {
        let mut flat = Grouping::new();
        flat.insert(GroupKey::Subdirectory(PathBuf::new()), files.clone());
        flat
    };

    Ok(Discovery { base, files, partitions })
}

/// Decide the transfers for one subdirectory partition
fn plan_partition(
    options: &ArchiveOptions,
    key: &GroupKey,
    members: &[FileEntry],
) -> Result<PartitionPlan> {
    let remote_dir = match key {
        GroupKey::Subdirectory(relative) if !relative.as_os_str().is_empty() => {
            options.target.join(relative)
        }
        _ => options.target.clone(),
    };

    let (dated, undated) = if options.use_grouping {
        let dated = group_by_deciphered_date(members);
        (dated.groups, dated.unmatched)
    } else {
        let mut single = BTreeMap::new();
        single.insert(key.clone(), members.to_vec());
        (single, Vec::new())
    };

    let project = options.project_name();
    let suffix = archive_suffix(options.compression);
    let mut transfers = Vec::new();

    for (date_key, files) in &dated {
        if !options.use_grouping || files.len() == 1 {
            for file in files {
                transfers.push(PlannedTransfer::Single {
                    source: file.clone(),
                    destination: remote_dir.join(file.file_name()),
                });
            }
            continue;
        }

        let sized_groups = group_by_size(files, options.size_limit)?;
        let parts = sized_groups.len();
        for (index, sized_group) in sized_groups.into_iter().enumerate() {
            let part = if parts > 1 { format!("_{:03}", index + 1) } else { String::new() };
            let name = format!(
                "{}_{}_{}{}.{}",
                project,
                key.file_label(),
                date_key.file_label(),
                part,
                suffix
            );
            transfers.push(PlannedTransfer::Archive {
                sources: sized_group,
                destination: remote_dir.join(name),
            });
        }
    }

    Ok(PartitionPlan {
        key: key.clone(),
        remote_dir,
        transfers,
        undated,
    })
}

/// Work out every transfer a run would make without touching the remote.
pub fn plan(options: &ArchiveOptions) -> Result<ArchivePlan> {
    let discovery = discover(options)?;
    let partitions = discovery
        .partitions
        .iter()
        .map(|(key, members)| plan_partition(options, key, members))
        .collect::<Result<Vec<_>>>()?;

    Ok(ArchivePlan {
        base: discovery.base,
        files: discovery.files,
        partitions,
    })
}

/// Run one archival pass.
///
/// `connect` is called once, after discovery, to open the connection used for
/// the whole run. Its error is returned untouched; any later error is wrapped
/// as a run failure. Per-file and per-archive transfer failures only show up
/// in the returned summary.
pub fn run<T, F>(options: &ArchiveOptions, connect: F) -> Result<RunSummary>
where
    T: Transport,
    F: FnOnce() -> Result<T>,
{
    let discovery = discover(options)?;

    let mut transport = match connect() {
        Ok(transport) => transport,
        Err(e) => {
            error!("Unable to connect to remote host: {:#}", e);
            return Err(e);
        }
    };
    info!("Connected via {}", transport.describe());

    match execute(options, &discovery, &mut transport) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            error!("{:#} {}.", e, ERROR_RUN_FAILED);
            Err(e.context(ERROR_RUN_FAILED))
        }
    }
}

fn execute(
    options: &ArchiveOptions,
    discovery: &Discovery,
    transport: &mut dyn Transport,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(&discovery.files);

    for (key, members) in &discovery.partitions {
        let partition = plan_partition(options, key, members)?;

        if !partition.undated.is_empty() {
            info!(
                "{} file(s) in {} have no date in their name: {:?}",
                partition.undated.len(),
                key,
                partition.undated
            );
            summary.undated.extend(partition.undated.iter().cloned());
        }

        if !transport.exists(&partition.remote_dir)? {
            make_remote_directory(&partition.remote_dir, transport, &options.poll)?;
        }

        for transfer in &partition.transfers {
            let destination = transfer.destination();
            let exists = transport
                .exists(destination)
                .context(format!("Failed to check {}", destination.display()))?;
            if exists {
                if !options.overwrite {
                    info!("{} exists. Skipping file.", destination.display());
                    summary.record(TransferOutcome::Skipped, transfer.sources());
                    continue;
                }
                info!("{} exists. Overwriting.", destination.display());
            }

            match transfer {
                PlannedTransfer::Single { source, destination } => {
                    let outcome = if transfer_single(source.path(), destination, transport) {
                        TransferOutcome::Transferred
                    } else {
                        TransferOutcome::Failed
                    };
                    summary.record(outcome, std::slice::from_ref(source));
                }
                PlannedTransfer::Archive { sources, destination } => {
                    match transfer_archive_with_manifest(
                        sources,
                        &discovery.base,
                        destination,
                        transport,
                        options.compression,
                        options.recursive,
                    ) {
                        Some(manifest) => {
                            let (added, skipped): (Vec<FileEntry>, Vec<FileEntry>) = sources
                                .iter()
                                .cloned()
                                .partition(|f| manifest.added.iter().any(|p| p == f.path()));
                            summary.record(TransferOutcome::Transferred, &added);
                            summary.record(TransferOutcome::Failed, &skipped);
                        }
                        None => summary.record(TransferOutcome::Failed, sources),
                    }
                }
            }
        }
    }

    summary.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_files(root: &Path, files: &[(&str, usize)]) {
        for (name, size) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, vec![b'x'; *size]).unwrap();
        }
    }

    fn options_for(source: &TempDir, target: &str) -> ArchiveOptions {
        ArchiveOptions::new(SourceSpec::Directory(source.path().to_path_buf()), target)
    }

    fn destinations(plan: &ArchivePlan) -> Vec<String> {
        plan.transfers()
            .map(|t| t.destination().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_project_name_defaults_to_target_name() {
        let options = ArchiveOptions::new(SourceSpec::Files(vec![]), "/backup/era5");
        assert_eq!(options.project_name(), "era5");

        let mut named = options.clone();
        named.project_name = Some("reanalysis".to_string());
        assert_eq!(named.project_name(), "reanalysis");
    }

    #[test]
    fn test_plan_archives_date_groups_and_sends_singletons() {
        let source = TempDir::new().unwrap();
        write_files(
            source.path(),
            &[
                ("x/2020-01-01.nc", 10),
                ("x/2020-01-02.nc", 10),
                ("x/2020-02-01.nc", 10),
            ],
        );

        let mut options = options_for(&source, "/backup/era5");
        options.recursive = true;
        let plan = plan(&options).unwrap();

        assert_eq!(plan.partitions.len(), 1);
        assert_eq!(plan.partitions[0].remote_dir, PathBuf::from("/backup/era5/x"));
        assert_eq!(destinations(&plan), vec!["era5_x_2020-01.tar", "2020-02-01.nc"]);
    }

    #[test]
    fn test_plan_numbers_size_parts() {
        let source = TempDir::new().unwrap();
        write_files(
            source.path(),
            &[("2020-01-01.nc", 6), ("2020-01-02.nc", 6), ("2020-01-03.nc", 6)],
        );

        let mut options = options_for(&source, "/backup/era5");
        options.size_limit = 10;
        options.compression = true;
        let plan = plan(&options).unwrap();

        assert_eq!(
            destinations(&plan),
            vec![
                "era5_._2020-01_001.tar.gz",
                "era5_._2020-01_002.tar.gz",
                "era5_._2020-01_003.tar.gz"
            ]
        );
    }

    #[test]
    fn test_plan_without_grouping_sends_everything_individually() {
        let source = TempDir::new().unwrap();
        write_files(source.path(), &[("x/a.nc", 1), ("x/b.nc", 1), ("y/c.nc", 1)]);

        let mut options = options_for(&source, "/backup/t");
        options.recursive = true;
        options.use_grouping = false;
        let plan = plan(&options).unwrap();

        assert_eq!(destinations(&plan), vec!["a.nc", "b.nc", "c.nc"]);
        assert_eq!(plan.partitions[1].remote_dir, PathBuf::from("/backup/t/y"));
    }

    #[test]
    fn test_plan_undated_partition_becomes_one_archive() {
        let source = TempDir::new().unwrap();
        write_files(source.path(), &[("2020-01-01.nc", 1), ("stations.nc", 1)]);

        let options = options_for(&source, "/backup/obs");
        let plan = plan(&options).unwrap();

        assert_eq!(destinations(&plan), vec!["obs_._data.tar"]);
        assert_eq!(plan.partitions[0].undated.len(), 1);
    }

    #[test]
    fn test_plan_flat_when_subdirectories_disabled() {
        let source = TempDir::new().unwrap();
        write_files(source.path(), &[("x/a.nc", 1), ("y/b.nc", 1)]);

        let mut options = options_for(&source, "/backup/t");
        options.recursive = true;
        options.use_subdirectories = false;
        let plan = plan(&options).unwrap();

        assert_eq!(plan.partitions.len(), 1);
        assert_eq!(plan.partitions[0].remote_dir, PathBuf::from("/backup/t"));
        assert_eq!(destinations(&plan), vec!["t_._data.tar"]);
    }
}
