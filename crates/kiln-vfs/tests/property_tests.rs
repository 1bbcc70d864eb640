//! Property tests for the diff engine and undo history.

use std::collections::BTreeSet;

use proptest::prelude::*;

use kiln_vfs::{ChangeStatus, FileMap, Vfs, Workspace, compute_diff, is_placeholder};

/// Small path alphabet so generated maps overlap often.
fn arb_path() -> impl Strategy<Value = String> {
    prop_oneof![
        "/[a-c]\\.txt",
        "/[a-b]/[a-c]\\.js",
        Just("/d/.placeholder".to_string()),
    ]
}

fn arb_map() -> impl Strategy<Value = FileMap> {
    prop::collection::btree_map(arb_path(), "[xy]{0,2}", 0..8)
}

proptest! {
    #[test]
    fn diff_of_identical_maps_is_empty(map in arb_map()) {
        prop_assert!(compute_diff(&map, &map).is_empty());
    }

    #[test]
    fn diff_has_one_record_per_differing_path(current in arb_map(), baseline in arb_map()) {
        let changes = compute_diff(&current, &baseline);

        let expected: BTreeSet<&String> = current
            .keys()
            .chain(baseline.keys())
            .filter(|p| !is_placeholder(p))
            .filter(|p| current.get(*p) != baseline.get(*p))
            .collect();
        let actual: BTreeSet<&String> = changes.iter().map(|c| &c.path).collect();

        prop_assert_eq!(actual.len(), changes.len(), "no duplicate records");
        prop_assert_eq!(actual, expected);

        for change in &changes {
            let status = match (current.contains_key(&change.path), baseline.contains_key(&change.path)) {
                (true, false) => ChangeStatus::Added,
                (false, true) => ChangeStatus::Deleted,
                (true, true) => ChangeStatus::Modified,
                (false, false) => unreachable!("record for a path in neither map"),
            };
            prop_assert_eq!(change.status, status);
        }
    }

    #[test]
    fn n_undos_restore_initial_state(
        initial in arb_map(),
        edits in prop::collection::vec(("/[a-c]\\.txt", "[a-z]{0,4}"), 1..10),
    ) {
        let mut ws = Workspace::default();
        let mut vfs = Vfs::new();
        vfs.import(initial.iter().map(|(k, v)| (k.as_str(), v.as_str()))).unwrap();
        ws.reset_synced(vfs.clone());

        for (path, content) in &edits {
            ws.write_file(path, content.as_str()).unwrap();
        }
        for _ in 0..edits.len() {
            prop_assert!(ws.undo());
        }

        prop_assert_eq!(ws.vfs(), &vfs);
        prop_assert!(ws.changes().is_empty());
        prop_assert!(!ws.undo());
    }
}
