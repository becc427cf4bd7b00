//! End-to-end flows across the partition and filesystem layers: disk
//! creation, partitioning, mounting, formatting, file I/O, permissions and
//! journal recovery.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use vdisk_ext::fs::{journal, ExtFs, FsKind};
use vdisk_ext::ops;
use vdisk_ext::session::login;
use vdisk_ext::{FsError, Session};
use vdisk_part::manager::{PartitionKind, PartitionSpec};
use vdisk_part::mount::MountRegistry;
use vdisk_part::{create_disk, create_partition, list_partitions, open_disk, Fit, PartError,
    MBR_SIZE};

const MIB: i64 = 1024 * 1024;

fn new_disk(dir: &tempfile::TempDir, name: &str, mib: i64) -> PathBuf {
    let path = dir.path().join(name);
    create_disk(&path, mib * MIB, Fit::First).unwrap();
    path
}

fn primary(name: &str, size: i64) -> PartitionSpec {
    PartitionSpec {
        name: name.to_string(),
        size,
        kind: PartitionKind::Primary,
        fit: Fit::Worst,
    }
}

#[test]
fn created_disk_has_exact_size_and_blank_table() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 10);

    let meta = std::fs::metadata(&disk).unwrap();
    assert_eq!(meta.len(), 10 * MIB as u64);

    let (_file, mbr) = open_disk(&disk).unwrap();
    assert_eq!(mbr.size, 10 * MIB);
    assert_ne!(mbr.signature, 0);
    assert_eq!(mbr.fit, b'F');
    for slot in &mbr.partitions {
        assert!(slot.is_empty());
        assert_eq!(slot.status, 0);
    }
}

#[test]
fn three_primaries_fit_and_the_fourth_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 10);

    create_partition(&disk, &primary("p1", 3 * MIB)).unwrap();
    create_partition(&disk, &primary("p2", 3 * MIB)).unwrap();

    let rows = list_partitions(&disk).unwrap();
    assert_eq!(rows[0].start, MBR_SIZE);
    assert_eq!(rows[1].start, MBR_SIZE + 3 * MIB);

    create_partition(&disk, &primary("p3", 3 * MIB)).unwrap();
    assert!(matches!(
        create_partition(&disk, &primary("p4", 3 * MIB)),
        Err(PartError::NoSpace(_))
    ));
}

#[test]
fn mount_ids_count_per_disk_and_letter_per_disk() {
    let dir = tempfile::tempdir().unwrap();
    let disk_a = new_disk(&dir, "a.img", 10);
    let disk_b = new_disk(&dir, "b.img", 10);
    for disk in [&disk_a, &disk_b] {
        create_partition(disk, &primary("p1", 2 * MIB)).unwrap();
        create_partition(disk, &primary("p2", 2 * MIB)).unwrap();
    }

    let mut registry = MountRegistry::new();
    assert_eq!(registry.mount(&disk_a, "p1").unwrap(), "681A");
    assert_eq!(registry.mount(&disk_a, "p2").unwrap(), "682A");
    assert_eq!(registry.mount(&disk_b, "p1").unwrap(), "681B");
}

#[test]
fn format_login_write_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 10);
    create_partition(&disk, &primary("p1", 3 * MIB)).unwrap();

    let mut registry = MountRegistry::new();
    let id = registry.mount(&disk, "p1").unwrap();
    let mount = registry.get(&id).unwrap();

    let mut fs = ExtFs::format(&mount.disk, mount.start, mount.size, FsKind::Ext2).unwrap();
    let session = login(&fs, None, "root", "123", &id).unwrap();

    let content = ops::mkfile_content(Some(10), None).unwrap();
    assert_eq!(content.len(), 10);
    ops::mkfile(&mut fs, &session, "/a.txt", false, &content).unwrap();
    assert_eq!(ops::cat(&fs, &session, "/a.txt").unwrap(), "0123456789");
}

#[test]
fn ext3_journal_survives_loss_and_recovery_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 10);
    create_partition(&disk, &primary("p1", 3 * MIB)).unwrap();

    let mut registry = MountRegistry::new();
    let id = registry.mount(&disk, "p1").unwrap();
    let mount = registry.get(&id).unwrap();

    let mut fs = ExtFs::format(&mount.disk, mount.start, mount.size, FsKind::Ext3).unwrap();
    let session = login(&fs, None, "root", "123", &id).unwrap();

    ops::mkfile(&mut fs, &session, "/b.txt", false, b"hi").unwrap();
    let entries = journal::entries(&fs).unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.op(), "mkfile");
    assert_eq!(last.path(), "/b.txt");
    assert_eq!(last.content(), "hi");

    journal::simulate_loss(&fs).unwrap();
    assert!(ops::cat(&fs, &session, "/b.txt").is_err());

    journal::recover(&mut fs).unwrap();
    assert_eq!(ops::cat(&fs, &session, "/b.txt").unwrap(), "hi");
}

#[test]
fn journal_replay_matches_the_direct_run() {
    // The same op sequence, with and without a loss/recovery cycle in the
    // middle, must list identically.
    let dir = tempfile::tempdir().unwrap();

    let mut trees: Vec<Vec<String>> = Vec::new();
    for (name, interrupt) in [("plain.img", false), ("lossy.img", true)] {
        let disk = new_disk(&dir, name, 10);
        create_partition(&disk, &primary("p1", 3 * MIB)).unwrap();
        let mut registry = MountRegistry::new();
        let id = registry.mount(&disk, "p1").unwrap();
        let mount = registry.get(&id).unwrap();
        let mut fs =
            ExtFs::format(&mount.disk, mount.start, mount.size, FsKind::Ext3).unwrap();
        let session = login(&fs, None, "root", "123", &id).unwrap();

        ops::mkdir(&mut fs, &session, "/docs/notes", true).unwrap();
        ops::mkfile(&mut fs, &session, "/docs/a.txt", false, b"alpha").unwrap();
        ops::mkfile(&mut fs, &session, "/docs/notes/b.txt", false, b"beta").unwrap();
        ops::edit(&mut fs, &session, "/docs/a.txt", b"alpha2").unwrap();

        if interrupt {
            journal::simulate_loss(&fs).unwrap();
            journal::recover(&mut fs).unwrap();
        }

        let mut paths = ops::find(&fs, &session, "/", "*").unwrap();
        paths.sort();
        let mut listing: Vec<String> = Vec::new();
        for path in paths {
            match ops::cat(&fs, &session, &path) {
                Ok(content) => listing.push(format!("{path}:{content}")),
                Err(FsError::NotAFile(_)) => listing.push(format!("{path}/")),
                Err(e) => panic!("unexpected error on {path}: {e}"),
            }
        }
        trees.push(listing);
    }
    assert_eq!(trees[0], trees[1]);
}

#[test]
fn ugo_categories_apply_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 10);
    create_partition(&disk, &primary("p1", 3 * MIB)).unwrap();
    let mut registry = MountRegistry::new();
    let id = registry.mount(&disk, "p1").unwrap();
    let mount = registry.get(&id).unwrap();
    let mut fs = ExtFs::format(&mount.disk, mount.start, mount.size, FsKind::Ext2).unwrap();
    let root = login(&fs, None, "root", "123", &id).unwrap();

    // ana: uid 2 gid 2, bob: uid 3 gid 2, carol: uid 4 gid 3.
    ops::mkgrp(&mut fs, &root, "g2").unwrap();
    ops::mkgrp(&mut fs, &root, "g3").unwrap();
    ops::mkusr(&mut fs, &root, "ana", "pw", "g2").unwrap();
    ops::mkusr(&mut fs, &root, "bob", "pw", "g2").unwrap();
    ops::mkusr(&mut fs, &root, "carol", "pw", "g3").unwrap();

    ops::mkfile(&mut fs, &root, "/s.txt", false, b"secret").unwrap();
    ops::chown(&mut fs, &root, "/s.txt", "ana", false).unwrap();
    ops::chmod(&mut fs, &root, "/s.txt", 640, false).unwrap();

    let ana = login(&fs, None, "ana", "pw", &id).unwrap();
    let bob = login(&fs, None, "bob", "pw", &id).unwrap();
    let carol = login(&fs, None, "carol", "pw", &id).unwrap();
    assert_eq!((ana.uid, ana.gid), (2, 2));
    assert_eq!((bob.uid, bob.gid), (3, 2));
    assert_eq!((carol.uid, carol.gid), (4, 3));

    // Owner digit 6: read and write.
    assert_eq!(ops::cat(&fs, &ana, "/s.txt").unwrap(), "secret");
    ops::edit(&mut fs, &ana, "/s.txt", b"owner write").unwrap();

    // Group digit 4: read only.
    assert!(ops::cat(&fs, &bob, "/s.txt").is_ok());
    assert!(matches!(
        ops::edit(&mut fs, &bob, "/s.txt", b"x"),
        Err(FsError::PermissionDenied(_))
    ));

    // Other digit 0: nothing.
    assert!(matches!(
        ops::cat(&fs, &carol, "/s.txt"),
        Err(FsError::PermissionDenied(_))
    ));
    assert!(matches!(
        ops::edit(&mut fs, &carol, "/s.txt", b"x"),
        Err(FsError::PermissionDenied(_))
    ));

    // Root always passes.
    assert!(ops::cat(&fs, &root, "/s.txt").is_ok());
    ops::edit(&mut fs, &root, "/s.txt", b"root write").unwrap();
}

#[test]
fn logical_partitions_can_host_filesystems() {
    let dir = tempfile::tempdir().unwrap();
    let disk = new_disk(&dir, "d.img", 16);
    create_partition(
        &disk,
        &PartitionSpec {
            name: "ext".into(),
            size: 8 * MIB,
            kind: PartitionKind::Extended,
            fit: Fit::Worst,
        },
    )
    .unwrap();
    create_partition(
        &disk,
        &PartitionSpec {
            name: "l1".into(),
            size: 4 * MIB,
            kind: PartitionKind::Logical,
            fit: Fit::Worst,
        },
    )
    .unwrap();

    let mut registry = MountRegistry::new();
    let id = registry.mount(&disk, "l1").unwrap();
    let mount = registry.get(&id).unwrap();
    assert_eq!(mount.kind, PartitionKind::Logical);

    let mut fs = ExtFs::format(&mount.disk, mount.start, mount.size, FsKind::Ext2).unwrap();
    let session: Session = login(&fs, None, "root", "123", &id).unwrap();
    ops::mkfile(&mut fs, &session, "/on-log.txt", false, b"works").unwrap();
    assert_eq!(
        ops::cat(&fs, &session, "/on-log.txt").unwrap(),
        "works"
    );
}
