//! Property tests for the grouping strategies.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use proptest::prelude::*;

use climate_archiver::grouping::{group_by_deciphered_date, group_by_length, group_by_size};
use climate_archiver::models::{FileEntry, GroupKey};

/// Unique names paired with sizes
fn sized_files(max: usize) -> impl Strategy<Value = Vec<FileEntry>> {
    prop::collection::btree_map("[a-z]{1,8}\\.nc", 0u64..5_000, 0..max)
        .prop_map(|files| {
            files
                .into_iter()
                .map(|(name, size)| FileEntry::with_size(name, size))
                .collect()
        })
}

fn sorted_names(files: &[FileEntry]) -> Vec<String> {
    let mut names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
    names.sort();
    names
}

fn flattened(groups: &[Vec<FileEntry>]) -> Vec<String> {
    groups.iter().flatten().map(|f| f.file_name()).collect()
}

proptest! {
    #[test]
    fn length_groups_cover_input_in_order(files in sized_files(60), size in 1usize..12) {
        let groups = group_by_length(&files, NonZeroUsize::new(size).unwrap());

        prop_assert_eq!(groups.len(), (files.len() + size - 1) / size);
        prop_assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= size));
        if let Some((_, full)) = groups.split_last() {
            prop_assert!(full.iter().all(|g| g.len() == size));
        }
        prop_assert_eq!(flattened(&groups), sorted_names(&files));
    }

    #[test]
    fn size_groups_respect_threshold(files in sized_files(60), threshold in 1u64..20_000) {
        let groups = group_by_size(&files, threshold).unwrap();

        prop_assert_eq!(flattened(&groups), sorted_names(&files));
        for group in &groups {
            prop_assert!(!group.is_empty());
            let total: u64 = group.iter().map(|f| f.size().unwrap()).sum();
            prop_assert!(total <= threshold || group.len() == 1);
        }
    }

    #[test]
    fn size_groups_are_not_split_needlessly(files in sized_files(60), threshold in 1u64..20_000) {
        let groups = group_by_size(&files, threshold).unwrap();

        // The first file of each group would not have fit into the previous one
        for pair in groups.windows(2) {
            let previous: u64 = pair[0].iter().map(|f| f.size().unwrap()).sum();
            let next = pair[1][0].size().unwrap();
            prop_assert!(previous + next > threshold);
        }
    }

    #[test]
    fn dated_names_are_all_grouped(
        days in prop::collection::btree_set((1990u32..2030, 1u32..13, 1u32..29), 1..40)
    ) {
        let files: Vec<FileEntry> = days
            .iter()
            .map(|(y, m, d)| FileEntry::with_size(format!("pr_{:04}{:02}{:02}.nc", y, m, d), 1))
            .collect();
        let dated = group_by_deciphered_date(&files);

        prop_assert!(dated.unmatched.is_empty());
        let months: BTreeSet<String> =
            days.iter().map(|(y, m, _)| format!("{:04}-{:02}", y, m)).collect();
        let keys: BTreeSet<String> = dated.groups.keys().map(|k| k.to_string()).collect();
        prop_assert_eq!(keys, months);
        prop_assert_eq!(dated.groups.values().map(Vec::len).sum::<usize>(), files.len());
    }

    #[test]
    fn one_undated_name_abandons_date_grouping(files in sized_files(30)) {
        let mut files: Vec<FileEntry> = files
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let name = format!("tas_2001-{:02}-01_{}", i % 12 + 1, f.file_name());
                FileEntry::with_size(name, 1)
            })
            .collect();
        files.push(FileEntry::with_size("readme.nc", 1));

        let dated = group_by_deciphered_date(&files);

        prop_assert_eq!(dated.groups.len(), 1);
        prop_assert_eq!(dated.groups[&GroupKey::Ungrouped].len(), files.len());
        prop_assert_eq!(dated.unmatched.len(), 1);
    }
}
