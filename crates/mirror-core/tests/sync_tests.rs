//! Tests for the SyncEngine

use mirror_core::{Error, MirrorGroup, Registry, SyncEngine};
use mirror_test_utils::MirrorFixture;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;

struct Setup {
    fx: MirrorFixture,
    registry: Registry,
    group: MirrorGroup,
    engine: SyncEngine,
}

fn setup(folders: &[&str]) -> Setup {
    let fx = MirrorFixture::new();
    let paths: Vec<_> = folders.iter().map(|f| fx.folder(f)).collect();
    let registry = Registry::open(fx.registry_path());
    let group = registry.create_group(&paths, None, true).unwrap();
    let engine = SyncEngine::for_registry(&registry);
    Setup {
        fx,
        registry,
        group,
        engine,
    }
}

fn manifest(s: &Setup) -> BTreeSet<String> {
    s.registry.manifests().load(&s.group.id).unwrap()
}

#[test]
fn test_sync_group_links_everything_everywhere() {
    let s = setup(&["P", "Q", "R"]);
    s.fx.write("P/a.txt", "a");
    s.fx.write("Q/notes/deep/b.txt", "b");

    let report = s.engine.sync_group(&s.group).unwrap();

    assert_eq!(report.created.len(), 4);
    assert!(report.deleted.is_empty());
    for folder in ["Q", "R"] {
        s.fx.assert_same_file("P/a.txt", &format!("{folder}/a.txt"));
    }
    for folder in ["P", "R"] {
        s.fx.assert_same_file("Q/notes/deep/b.txt", &format!("{folder}/notes/deep/b.txt"));
    }
    assert_eq!(s.fx.link_count("P/a.txt"), 3);
    assert_eq!(
        manifest(&s),
        BTreeSet::from(["a.txt".to_string(), "notes/deep/b.txt".to_string()])
    );
}

#[test]
fn test_sync_group_is_idempotent() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/a.txt", "a");
    s.fx.write("Q/sub/b.txt", "b");
    s.engine.sync_group(&s.group).unwrap();

    let second = s.engine.sync_group(&s.group).unwrap();

    assert!(second.is_noop(), "second pass changed things: {second:?}");
    assert!(second.collisions.is_empty());
}

#[test]
fn test_sync_group_propagates_deletion_and_prunes() {
    let s = setup(&["P", "Q", "R"]);
    s.fx.write("P/notes/x.txt", "x");
    s.fx.write("P/keep.txt", "k");
    s.engine.sync_group(&s.group).unwrap();

    fs::remove_file(s.fx.path("Q/notes/x.txt")).unwrap();
    let report = s.engine.sync_group(&s.group).unwrap();

    assert_eq!(report.deleted.len(), 2);
    assert!(report.created.is_empty());
    for folder in ["P", "Q", "R"] {
        s.fx.assert_not_exists(&format!("{folder}/notes"));
        s.fx.assert_exists(&format!("{folder}/keep.txt"));
    }
    assert_eq!(manifest(&s), BTreeSet::from(["keep.txt".to_string()]));
}

#[test]
fn test_deleted_everywhere_leaves_manifest() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/dir/gone.txt", "g");
    s.engine.sync_group(&s.group).unwrap();

    fs::remove_file(s.fx.path("P/dir/gone.txt")).unwrap();
    fs::remove_file(s.fx.path("Q/dir/gone.txt")).unwrap();
    fs::remove_dir(s.fx.path("P/dir")).unwrap();
    fs::remove_dir(s.fx.path("Q/dir")).unwrap();
    let report = s.engine.sync_group(&s.group).unwrap();

    assert!(report.is_noop());
    assert!(manifest(&s).is_empty());
}

#[test]
fn test_unsynced_file_is_added_not_deleted() {
    // A file present in only one folder and unknown to the manifest is new
    let s = setup(&["P", "Q"]);
    s.engine.sync_group(&s.group).unwrap();
    s.fx.write("Q/new.txt", "n");

    let report = s.engine.sync_group(&s.group).unwrap();

    assert!(report.deleted.is_empty());
    s.fx.assert_same_file("Q/new.txt", "P/new.txt");
}

#[test]
fn test_name_collision_is_reported_not_resolved() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/same.txt", "from P");
    s.fx.write("Q/same.txt", "from Q");

    let report = s.engine.sync_group(&s.group).unwrap();

    assert_eq!(report.collisions, vec![s.fx.path("Q/same.txt")]);
    assert_eq!(fs::read_to_string(s.fx.path("Q/same.txt")).unwrap(), "from Q");
    assert_eq!(s.fx.link_count("P/same.txt"), 1);
}

#[test]
fn test_directory_blocking_file_is_a_collision() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/thing", "file");
    s.fx.folder("Q/thing");

    let report = s.engine.sync_group(&s.group).unwrap();

    assert_eq!(report.collisions, vec![s.fx.path("Q/thing")]);
    assert!(s.fx.path("Q/thing").is_dir());
}

#[test]
fn test_markers_are_never_synced() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/a.txt", "a");

    s.engine.sync_group(&s.group).unwrap();

    assert_ne!(
        mirror_fs::identity(&mirror_core::marker::marker_path(&s.fx.path("P"))).unwrap(),
        mirror_fs::identity(&mirror_core::marker::marker_path(&s.fx.path("Q"))).unwrap()
    );
    assert!(!manifest(&s).contains(mirror_core::MARKER_FILE_NAME));
}

#[test]
fn test_sync_needs_two_readable_folders() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/a.txt", "a");
    fs::remove_dir_all(s.fx.path("Q")).unwrap();

    let report = s.engine.sync_group(&s.group).unwrap();

    assert!(report.is_noop());
    assert!(!s.registry.manifests().path_for(&s.group.id).exists());
}

#[test]
fn test_corrupt_manifest_aborts_sync() {
    let s = setup(&["P", "Q"]);
    s.fx.write("P/a.txt", "a");
    let manifest_path = s.registry.manifests().path_for(&s.group.id);
    fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();
    fs::write(&manifest_path, "{ broken").unwrap();

    let result = s.engine.sync_group(&s.group);

    assert!(matches!(result, Err(Error::Persistence { .. })));
    s.fx.assert_not_exists("Q/a.txt");
}

#[test]
fn test_sync_file_to_group_creates_nested_links() {
    let s = setup(&["P", "Q", "R"]);
    let source = s.fx.write("P/notes/x.txt", "x");

    let created = s.engine.sync_file_to_group(&source, &s.group).unwrap();

    assert_eq!(created, vec![s.fx.path("Q/notes/x.txt"), s.fx.path("R/notes/x.txt")]);
    s.fx.assert_same_file("P/notes/x.txt", "R/notes/x.txt");

    // Second call finds everything already linked
    assert!(s.engine.sync_file_to_group(&source, &s.group).unwrap().is_empty());
}

#[test]
fn test_sync_file_to_group_skips_collisions_and_markers() {
    let s = setup(&["P", "Q"]);
    let source = s.fx.write("P/a.txt", "mine");
    s.fx.write("Q/a.txt", "theirs");

    assert!(s.engine.sync_file_to_group(&source, &s.group).unwrap().is_empty());
    assert_eq!(fs::read_to_string(s.fx.path("Q/a.txt")).unwrap(), "theirs");

    let marker = mirror_core::marker::marker_path(&s.fx.path("P"));
    assert!(s.engine.sync_file_to_group(&marker, &s.group).unwrap().is_empty());
}

#[test]
fn test_sync_file_outside_group_is_ignored() {
    let s = setup(&["P", "Q"]);
    let outside = s.fx.write("elsewhere/a.txt", "a");

    assert!(s.engine.sync_file_to_group(&outside, &s.group).unwrap().is_empty());
}

#[test]
fn test_delete_from_group_matches_identity() {
    let s = setup(&["P", "Q", "R"]);
    s.fx.write("P/a.txt", "a");
    s.engine.sync_group(&s.group).unwrap();
    // R holds an unrelated file under the same name
    fs::remove_file(s.fx.path("R/a.txt")).unwrap();
    s.fx.write("R/a.txt", "unrelated");

    let deleted = s
        .engine
        .delete_from_group(&s.fx.path("Q/a.txt"), &s.group)
        .unwrap();

    assert_eq!(deleted, vec![s.fx.path("P/a.txt"), s.fx.path("Q/a.txt")]);
    s.fx.assert_exists("R/a.txt");
}

#[test]
fn test_delete_from_group_missing_source_fails() {
    let s = setup(&["P", "Q"]);

    let result = s.engine.delete_from_group(&s.fx.path("P/none.txt"), &s.group);

    assert!(matches!(
        result,
        Err(Error::Fs(mirror_fs::Error::NotFound { .. }))
    ));
}

#[test]
fn test_propagate_delete_matches_by_name() {
    let s = setup(&["P", "Q", "R"]);
    s.fx.write("P/sub/a.txt", "a");
    s.engine.sync_group(&s.group).unwrap();
    s.fx.folder("R/sub/dir");

    fs::remove_file(s.fx.path("P/sub/a.txt")).unwrap();
    let removed = s
        .engine
        .propagate_delete_to_group(&s.fx.path("P/sub/a.txt"), &s.group)
        .unwrap();

    assert_eq!(removed, vec![s.fx.path("Q/sub/a.txt"), s.fx.path("R/sub/a.txt")]);

    // Directories are never removed by name
    fs::remove_dir(s.fx.folder("P/sub/dir")).unwrap();
    assert!(s
        .engine
        .propagate_delete_to_group(&s.fx.path("P/sub/dir"), &s.group)
        .unwrap()
        .is_empty());
    assert!(s.fx.path("R/sub/dir").is_dir());
}

#[cfg(unix)]
#[test]
fn test_folder_symlinks_are_replicated_verbatim() {
    let s = setup(&["P", "Q"]);
    let target = s.fx.folder("library");
    s.fx.write("library/inside.txt", "i");
    std::os::unix::fs::symlink(&target, s.fx.path("P/lib")).unwrap();

    let report = s.engine.sync_group(&s.group).unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(fs::read_link(s.fx.path("Q/lib")).unwrap(), target);
    // The link target is not descended into
    assert_eq!(manifest(&s), BTreeSet::from(["lib".to_string()]));

    // Removing one copy removes the link, never the target contents
    mirror_fs::delete_folder_symlink(&s.fx.path("P/lib")).unwrap();
    let report = s.engine.sync_group(&s.group).unwrap();
    assert_eq!(report.deleted, vec![s.fx.path("Q/lib")]);
    s.fx.assert_exists("library/inside.txt");
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_are_linked_under_the_same_name() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let s = setup(&["P", "Q"]);
    let acute = OsStr::from_bytes(b"caf\xE9.txt");
    let grave = OsStr::from_bytes(b"caf\xE8.txt");
    fs::write(s.fx.path("P").join(acute), "acute").unwrap();
    fs::write(s.fx.path("P").join(grave), "grave").unwrap();

    let report = s.engine.sync_group(&s.group).unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.created.len(), 2);
    for name in [acute, grave] {
        assert_eq!(
            mirror_fs::identity(&s.fx.path("P").join(name)).unwrap(),
            mirror_fs::identity(&s.fx.path("Q").join(name)).unwrap()
        );
    }
    assert_eq!(
        manifest(&s),
        BTreeSet::from(["caf%E8.txt".to_string(), "caf%E9.txt".to_string()])
    );

    // The escaped manifest entries match on the next pass
    assert!(s.engine.sync_group(&s.group).unwrap().is_noop());
    fs::remove_file(s.fx.path("Q").join(acute)).unwrap();
    let report = s.engine.sync_group(&s.group).unwrap();
    assert_eq!(report.deleted, vec![s.fx.path("P").join(acute)]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// After a full pass every path exists in both folders with one identity.
    #[test]
    fn prop_sync_converges(files in prop::collection::btree_map("[a-d]{1,2}(/[a-d]{1,2})?", any::<bool>(), 1..8)) {
        let s = setup(&["P", "Q"]);
        for (rel, in_p) in &files {
            let folder = if *in_p { "P" } else { "Q" };
            s.fx.write(&format!("{folder}/{rel}.txt"), rel);
        }

        let report = s.engine.sync_group(&s.group).unwrap();
        prop_assert_eq!(report.created.len(), files.len());

        for rel in files.keys() {
            let p = mirror_fs::identity(&s.fx.path(&format!("P/{rel}.txt"))).unwrap();
            let q = mirror_fs::identity(&s.fx.path(&format!("Q/{rel}.txt"))).unwrap();
            prop_assert_eq!(p, q);
        }
        prop_assert!(s.engine.sync_group(&s.group).unwrap().is_noop());
    }
}
