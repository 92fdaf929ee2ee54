//! End-to-end runs of the application engine against real zip fixtures.

use jzmod::{engine, engine::ApplyError, library::ModDescriptor};
use std::{
    collections::BTreeMap,
    fs,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn read_zip(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = File::open(path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        entries.insert(entry.name().to_string(), bytes);
    }
    entries
}

fn descriptor(id: &str, package_path: &Path) -> ModDescriptor {
    ModDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        version: "1.0".to_string(),
        author: "test".to_string(),
        description: String::new(),
        enabled: true,
        icon: None,
        package_path: package_path.to_path_buf(),
    }
}

fn mod_xml(name: &str, body: &str) -> String {
    format!(
        r#"<modification name="{name}" version="1.0" author="test">{body}</modification>"#
    )
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    base: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new(base_entries: &[(&str, &[u8])]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let base = root.join("resources0.jz");
        write_zip(&base, base_entries);
        let output = root.join("extensions").join("resources0.jz");
        Self {
            _dir: dir,
            root,
            base,
            output,
        }
    }

    fn add_mod(&self, id: &str, entries: &[(&str, &[u8])]) -> ModDescriptor {
        let path = self.root.join(format!("{id}.honmod"));
        write_zip(&path, entries);
        descriptor(id, &path)
    }
}

#[test]
fn patched_and_injected_files_land_in_output() {
    let fixture = Fixture::new(&[
        ("config.txt", b"speed=10\nmode=normal\n"),
        ("untouched.txt", b"stays in base only"),
    ]);
    let xml = mod_xml(
        "Speed",
        r#"<editfile name="config.txt"><find>speed=10</find><replace>speed=20</replace></editfile>"#,
    );
    let mod_a = fixture.add_mod(
        "speed",
        &[("mod.xml", xml.as_bytes()), ("extra/new.txt", b"added")],
    );

    let report = engine::apply_mods(&fixture.base, &fixture.output, &[mod_a]).unwrap();
    assert_eq!(report.applied, 1);
    assert!(report.mods[0].error.is_none());
    assert_eq!(report.mods[0].assets_injected, 1);

    let output = read_zip(&fixture.output);
    assert_eq!(output["config.txt"], b"speed=20\nmode=normal\n");
    assert_eq!(output["extra/new.txt"], b"added");
    // The derived archive is a snapshot of the working table, not of the
    // whole base archive.
    assert!(!output.contains_key("untouched.txt"));
}

#[test]
fn applying_twice_is_idempotent() {
    let fixture = Fixture::new(&[("data.txt", b"value=1\nvalue=1\n")]);
    let xml = mod_xml(
        "Twice",
        r#"<editfile name="data.txt"><find>value=1</find><replace>value=2</replace></editfile>"#,
    );
    let mods = [fixture.add_mod("twice", &[("mod.xml", xml.as_bytes())])];

    engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    let first = read_zip(&fixture.output);
    engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    let second = read_zip(&fixture.output);

    assert_eq!(first, second);
    assert_eq!(first["data.txt"], b"value=2\nvalue=1\n");
}

#[test]
fn empty_mod_list_removes_previous_output() {
    let fixture = Fixture::new(&[("a.txt", b"a")]);
    let xml = mod_xml(
        "A",
        r#"<editfile name="a.txt"><find>a</find><replace>b</replace></editfile>"#,
    );
    let mods = [fixture.add_mod("a", &[("mod.xml", xml.as_bytes())])];

    engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    assert!(fixture.output.exists());

    let report = engine::apply_mods(&fixture.base, &fixture.output, &[]).unwrap();
    assert_eq!(report.applied, 0);
    assert!(!fixture.output.exists());
}

#[test]
fn empty_mod_list_with_no_previous_output_succeeds() {
    let fixture = Fixture::new(&[("a.txt", b"a")]);
    let report = engine::apply_mods(&fixture.base, &fixture.output, &[]).unwrap();
    assert_eq!(report.applied, 0);
    assert!(!fixture.output.exists());
}

#[test]
fn later_mod_sees_earlier_mods_edits() {
    let fixture = Fixture::new(&[("shared.txt", b"alpha rest")]);
    let xml_a = mod_xml(
        "A",
        r#"<editfile name="shared.txt"><find>alpha</find><replace>beta</replace></editfile>"#,
    );
    let xml_b = mod_xml(
        "B",
        r#"<editfile name="shared.txt"><find>beta</find><replace>gamma</replace></editfile>"#,
    );
    let mods = [
        fixture.add_mod("a", &[("mod.xml", xml_a.as_bytes())]),
        fixture.add_mod("b", &[("mod.xml", xml_b.as_bytes())]),
    ];

    let report = engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    assert_eq!(report.mods[1].missed_directives(), 0);

    let output = read_zip(&fixture.output);
    assert_eq!(output["shared.txt"], b"gamma rest");
}

#[test]
fn missing_target_skips_block_but_not_the_run() {
    let fixture = Fixture::new(&[("real.txt", b"content")]);
    let xml = mod_xml(
        "Mixed",
        concat!(
            r#"<editfile name="ghost.txt"><find>x</find><replace>y</replace></editfile>"#,
            r#"<editfile name="real.txt"><find>content</find><replace>patched</replace></editfile>"#,
        ),
    );
    let mods = [fixture.add_mod("mixed", &[("mod.xml", xml.as_bytes())])];

    let report = engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    assert_eq!(report.mods[0].skipped_targets, vec!["ghost.txt"]);
    assert_eq!(report.mods[0].blocks.len(), 1);

    let output = read_zip(&fixture.output);
    assert_eq!(output["real.txt"], b"patched");
    assert!(!output.contains_key("ghost.txt"));
}

#[test]
fn malformed_manifest_does_not_stop_later_mods() {
    let fixture = Fixture::new(&[("a.txt", b"one")]);
    let bad = fixture.add_mod("bad", &[("mod.xml", b"<broken></nope>" as &[u8])]);
    let xml = mod_xml(
        "Good",
        r#"<editfile name="a.txt"><find>one</find><replace>two</replace></editfile>"#,
    );
    let good = fixture.add_mod("good", &[("mod.xml", xml.as_bytes())]);

    let report = engine::apply_mods(&fixture.base, &fixture.output, &[bad, good]).unwrap();
    assert!(report.mods[0].error.is_some());
    assert!(report.mods[1].error.is_none());

    let output = read_zip(&fixture.output);
    assert_eq!(output["a.txt"], b"two");
}

#[test]
fn reserved_package_members_are_not_injected() {
    let fixture = Fixture::new(&[("a.txt", b"a")]);
    let xml = mod_xml("Assets", "");
    let mods = [fixture.add_mod(
        "assets",
        &[
            ("mod.xml", xml.as_bytes()),
            ("Icon.png", b"png bytes"),
            ("changelog.txt", b"notes"),
            ("THUMBS.DB", b"junk"),
            ("asset.txt", b"real"),
        ],
    )];

    engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    let output = read_zip(&fixture.output);
    assert_eq!(output.keys().collect::<Vec<_>>(), vec!["asset.txt"]);
}

#[test]
fn non_utf8_target_is_patched_via_fallback_decoding() {
    let fixture = Fixture::new(&[("menu.txt", b"caf\xe9 open" as &[u8])]);
    let xml = mod_xml(
        "Latin",
        "<editfile name=\"menu.txt\"><find>caf\u{e9}</find><replace>tea</replace></editfile>",
    );
    let mods = [fixture.add_mod("latin", &[("mod.xml", xml.as_bytes())])];

    let report = engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    assert_eq!(report.mods[0].missed_directives(), 0);

    let output = read_zip(&fixture.output);
    assert_eq!(output["menu.txt"], b"tea open");
}

#[test]
fn crlf_base_file_accepts_lf_literals() {
    let fixture = Fixture::new(&[("win.txt", b"first\r\nsecond\r\n")]);
    let xml = mod_xml(
        "Crlf",
        "<editfile name=\"win.txt\"><find>first\nsecond</find><replace>one\ntwo</replace></editfile>",
    );
    let mods = [fixture.add_mod("crlf", &[("mod.xml", xml.as_bytes())])];

    engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap();
    let output = read_zip(&fixture.output);
    assert_eq!(output["win.txt"], b"one\r\ntwo\r\n");
}

#[test]
fn missing_base_archive_fails_without_creating_output() {
    let fixture = Fixture::new(&[("a.txt", b"a")]);
    fs::remove_file(&fixture.base).unwrap();
    let xml = mod_xml("A", "");
    let mods = [fixture.add_mod("a", &[("mod.xml", xml.as_bytes())])];

    let err = engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap_err();
    assert!(matches!(err, ApplyError::BaseMissing(_)));
    assert!(!fixture.output.exists());
}

#[test]
fn failed_commit_cleans_up_temporary_artifact() {
    let fixture = Fixture::new(&[("a.txt", b"a")]);
    // Occupy the output path with a directory so the commit step fails.
    fs::create_dir_all(&fixture.output).unwrap();
    let xml = mod_xml(
        "A",
        r#"<editfile name="a.txt"><find>a</find><replace>b</replace></editfile>"#,
    );
    let mods = [fixture.add_mod("a", &[("mod.xml", xml.as_bytes())])];

    let err = engine::apply_mods(&fixture.base, &fixture.output, &mods).unwrap_err();
    assert!(matches!(err, ApplyError::Commit { .. }));
    assert!(fixture.output.is_dir());

    let temp = fixture.output.with_file_name("resources0.jz.tmp");
    assert!(!temp.exists());
}
