use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use slipguard_archive::{Error, ExtractOptions, Rejection, extract_archive};
use tar::EntryType;
use zip::write::SimpleFileOptions;

/// Header with the raw name and link name copied in, so traversal and
/// absolute paths survive the builder.
fn raw_header(name: &str, entry_type: EntryType, size: u64, link: Option<&str>) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    {
        let old = header.as_old_mut();
        old.name[..name.len()].copy_from_slice(name.as_bytes());
        if let Some(link) = link {
            old.linkname[..link.len()].copy_from_slice(link.as_bytes());
        }
    }
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(if entry_type.is_dir() { 0o755 } else { 0o644 });
    header.set_cksum();
    header
}

enum Item<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
    HardLink(&'a str, &'a str),
}

fn write_tar_gz(path: &Path, items: &[Item<'_>]) {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for item in items {
        match item {
            Item::Dir(name) => {
                let header = raw_header(name, EntryType::Directory, 0, None);
                builder.append(&header, &[][..]).unwrap();
            }
            Item::File(name, content) => {
                let header = raw_header(name, EntryType::Regular, content.len() as u64, None);
                builder.append(&header, *content).unwrap();
            }
            Item::Symlink(name, target) => {
                let header = raw_header(name, EntryType::Symlink, 0, Some(target));
                builder.append(&header, &[][..]).unwrap();
            }
            Item::HardLink(name, target) => {
                let header = raw_header(name, EntryType::Link, 0, Some(target));
                builder.append(&header, &[][..]).unwrap();
            }
        }
    }

    let bytes = builder.into_inner().unwrap().finish().unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_zip(path: &Path, items: &[Item<'_>]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    for item in items {
        match item {
            Item::Dir(name) => zip.add_directory(*name, options).unwrap(),
            Item::File(name, content) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
            Item::Symlink(name, target) => zip.add_symlink(*name, *target, options).unwrap(),
            Item::HardLink(..) => unreachable!("zip has no hard links"),
        }
    }

    zip.finish().unwrap();
}

const SCENARIO: &[Item<'static>] = &[
    Item::Dir("a/"),
    Item::File("a/b.txt", b"0123456789"),
    Item::File("../escape.txt", b"evil!"),
];

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("slipguard-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        Self { dir }
    }

    fn archive(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn dest(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

fn assert_scenario_extracted(fixture: &Fixture, archive: &Path) {
    let options = ExtractOptions::default().max_size(1000);
    let report = extract_archive(archive, &fixture.dest(), &options);

    assert!(report.fatal.is_none(), "unexpected fatal: {:?}", report.fatal);
    assert!(fixture.dest().join("a").is_dir());
    assert_eq!(
        fs::read(fixture.dest().join("a/b.txt")).unwrap(),
        b"0123456789"
    );
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].entry, PathBuf::from("../escape.txt"));
    assert!(matches!(
        report.warnings[0].reason,
        Rejection::OutsideRoot { .. }
    ));
    assert!(!fixture.dir.path().join("escape.txt").exists());
    assert!(report.is_partially_rejected());
}

fn assert_scenario_overflows(fixture: &Fixture, archive: &Path) {
    let options = ExtractOptions::default().max_size(8);
    let report = extract_archive(archive, &fixture.dest(), &options);

    match &report.fatal {
        Some(Error::SizeLimitExceeded {
            entry,
            limit,
            would_be,
        }) => {
            assert_eq!(entry, Path::new("a/b.txt"));
            assert_eq!(*limit, 8);
            assert_eq!(*would_be, 10);
        }
        other => panic!("expected size limit error, got {other:?}"),
    }
    assert!(report.warnings.len() <= 1);
    assert!(!fixture.dest().join("a/b.txt").exists());
}

#[test]
fn extract_tar_gz() {
    let fixture = Fixture::new();
    let archive = fixture.archive("scenario.tar.gz");
    write_tar_gz(&archive, SCENARIO);

    assert_scenario_extracted(&fixture, &archive);
}

#[test]
fn extract_zip() {
    let fixture = Fixture::new();
    let archive = fixture.archive("scenario.zip");
    write_zip(&archive, SCENARIO);

    assert_scenario_extracted(&fixture, &archive);
}

#[test]
fn tar_gz_size_limit_is_fatal() {
    let fixture = Fixture::new();
    let archive = fixture.archive("scenario.tar.gz");
    write_tar_gz(&archive, SCENARIO);

    assert_scenario_overflows(&fixture, &archive);
}

#[test]
fn zip_size_limit_is_fatal() {
    let fixture = Fixture::new();
    let archive = fixture.archive("scenario.zip");
    write_zip(&archive, SCENARIO);

    assert_scenario_overflows(&fixture, &archive);
}

#[test]
fn tar_gz_absolute_symlink_target_is_skipped() {
    let fixture = Fixture::new();
    let archive = fixture.archive("link.tar.gz");
    write_tar_gz(&archive, &[Item::Symlink("shadow", "/etc/shadow")]);

    let options = ExtractOptions::default().allow_symlinks(true);
    let report = extract_archive(&archive, &fixture.dest(), &options);

    assert!(report.fatal.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(
        report.warnings[0].reason,
        Rejection::SymlinkEscape {
            target: PathBuf::from("/etc/shadow")
        }
    );
    assert!(fs::symlink_metadata(fixture.dest().join("shadow")).is_err());
}

#[test]
fn zip_absolute_symlink_target_is_skipped() {
    let fixture = Fixture::new();
    let archive = fixture.archive("link.zip");
    write_zip(&archive, &[Item::Symlink("shadow", "/etc/shadow")]);

    let options = ExtractOptions::default().allow_symlinks(true);
    let report = extract_archive(&archive, &fixture.dest(), &options);

    assert!(report.fatal.is_none());
    assert_eq!(
        report.warnings[0].reason,
        Rejection::SymlinkEscape {
            target: PathBuf::from("/etc/shadow")
        }
    );
    assert!(fs::symlink_metadata(fixture.dest().join("shadow")).is_err());
}

#[test]
fn symlinks_disallowed_by_default() {
    let fixture = Fixture::new();
    let archive = fixture.archive("link.zip");
    write_zip(
        &archive,
        &[
            Item::File("data.txt", b"data"),
            Item::Symlink("inside", "data.txt"),
        ],
    );

    let report = extract_archive(&archive, &fixture.dest(), &ExtractOptions::default());

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].reason, Rejection::SymlinksNotAllowed);
    assert!(fs::symlink_metadata(fixture.dest().join("inside")).is_err());
    assert!(fixture.dest().join("data.txt").is_file());
}

#[cfg(unix)]
#[test]
fn tar_gz_contained_symlink_is_created() {
    let fixture = Fixture::new();
    let archive = fixture.archive("lib.tar.gz");
    write_tar_gz(
        &archive,
        &[
            Item::Dir("lib/"),
            Item::File("lib/libfoo.so.1", b"elf"),
            Item::Symlink("lib/libfoo.so", "libfoo.so.1"),
        ],
    );

    let options = ExtractOptions::default().allow_symlinks(true);
    let report = extract_archive(&archive, &fixture.dest(), &options);

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_eq!(
        fs::read_link(fixture.dest().join("lib/libfoo.so")).unwrap(),
        PathBuf::from("libfoo.so.1")
    );
}

#[test]
fn tar_gz_hard_link_is_unsupported() {
    let fixture = Fixture::new();
    let archive = fixture.archive("hard.tar.gz");
    write_tar_gz(
        &archive,
        &[
            Item::File("data.txt", b"data"),
            Item::HardLink("copy.txt", "data.txt"),
        ],
    );

    let report = extract_archive(&archive, &fixture.dest(), &ExtractOptions::default());

    assert!(report.fatal.is_none());
    assert_eq!(
        report.warnings[0].reason,
        Rejection::UnsupportedType {
            kind: "hard link".into()
        }
    );
    assert!(!fixture.dest().join("copy.txt").exists());
}

#[test]
fn validate_then_extract_report_identical_warnings() {
    let items = [
        Item::Dir("a/"),
        Item::File("a/b.txt", b"0123456789"),
        Item::File("../escape.txt", b"evil!"),
        Item::Symlink("a/link", "b.txt"),
        Item::Symlink("a/out", "../../outside"),
        Item::File("a/../c.txt", b"c"),
    ];

    for (name, write) in [
        ("mixed.tar.gz", write_tar_gz as fn(&Path, &[Item<'_>])),
        ("mixed.zip", write_zip as fn(&Path, &[Item<'_>])),
    ] {
        let fixture = Fixture::new();
        let archive = fixture.archive(name);
        write(&archive, &items);

        let options = ExtractOptions::default().allow_symlinks(true);
        let dry = extract_archive(&archive, &fixture.dest(), &options.validate(true));
        assert!(dry.fatal.is_none(), "{:?}", dry.fatal);
        assert!(!fixture.dest().exists());

        let real = extract_archive(&archive, &fixture.dest(), &options);
        assert!(real.fatal.is_none(), "{:?}", real.fatal);
        assert_eq!(dry.warnings, real.warnings);
        assert_eq!(real.warnings.len(), 2);
        assert!(fixture.dest().join("c.txt").is_file());
    }
}

#[cfg(unix)]
#[test]
fn tar_gz_symlink_chain_stays_inside() {
    let fixture = Fixture::new();
    let archive = fixture.archive("chain.tar.gz");
    write_tar_gz(
        &archive,
        &[
            Item::Symlink("l1", "."),
            Item::Symlink("l1/l2", ".."),
            Item::File("l1/l2/pwned.txt", b"pwnd"),
        ],
    );

    let options = ExtractOptions::default()
        .allow_symlinks(true)
        .audit_symlinks(true);
    let dry = extract_archive(&archive, &fixture.dest(), &options.validate(true));
    let real = extract_archive(&archive, &fixture.dest(), &options);

    assert!(real.fatal.is_none(), "{:?}", real.fatal);
    assert_eq!(dry.warnings, real.warnings);
    assert_eq!(real.warnings.len(), 2);
    for warning in &real.warnings {
        assert_eq!(
            warning.reason,
            Rejection::ThroughSymlink {
                link: PathBuf::from("l1")
            }
        );
    }
    assert!(real.audit.is_empty());
    assert!(!fixture.dir.path().join("pwned.txt").exists());
    assert!(fs::symlink_metadata(fixture.dest().join("l2")).is_err());
}

#[test]
fn not_gzip_is_fatal_before_root_creation() {
    let fixture = Fixture::new();
    let archive = fixture.archive("fake.tar.gz");
    fs::write(&archive, b"this is plain text").unwrap();

    let report = extract_archive(&archive, &fixture.dest(), &ExtractOptions::default());

    assert!(matches!(report.fatal, Some(Error::Header { .. })));
    assert!(report.warnings.is_empty());
    assert!(!fixture.dest().exists());
}

#[test]
fn truncated_tar_gz_is_fatal() {
    let fixture = Fixture::new();
    let archive = fixture.archive("broken.tar.gz");
    write_tar_gz(&archive, SCENARIO);
    let bytes = fs::read(&archive).unwrap();
    fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

    let report = extract_archive(&archive, &fixture.dest(), &ExtractOptions::default());

    assert!(report.fatal.is_some());
}

#[test]
fn not_a_zip_is_fatal_before_root_creation() {
    let fixture = Fixture::new();
    let archive = fixture.archive("fake.zip");
    fs::write(&archive, b"this is plain text").unwrap();

    let report = extract_archive(&archive, &fixture.dest(), &ExtractOptions::default());

    assert!(matches!(report.fatal, Some(Error::Zip(_))));
    assert!(report.warnings.is_empty());
    assert!(!fixture.dest().exists());
}
