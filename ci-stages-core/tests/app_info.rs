use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use ci_stages_core::app_info::read_app_info;
use ci_stages_core::config::Layout;
use ci_stages_core::error::MetadataError;

/// Creates `<root>/<name>` with a `.git` directory and, when given, an `app-info.yml`.
fn make_repo(root: &Path, name: &str, descriptor: Option<&str>) -> PathBuf {
    let repo = root.join(name);
    fs::create_dir_all(repo.join(".git")).expect("create .git");
    if let Some(content) = descriptor {
        fs::write(repo.join("app-info.yml"), content).expect("write descriptor");
    }
    repo
}

const ACME_DESCRIPTOR: &str = r#"
application:
  name: acme-api
  group: com.acme
deployment:
  build-output-path: target/acme-api.jar
"#;

#[test]
fn reads_well_formed_descriptor() {
    let tmp = tempdir().unwrap();
    let repo = make_repo(tmp.path(), "acme-api", Some(ACME_DESCRIPTOR));

    let app = read_app_info(&repo, &Layout::default()).expect("descriptor should load");

    assert_eq!(app.name, "acme-api");
    assert_eq!(app.group, "com.acme");
    assert_eq!(app.build_output_path, "target/acme-api.jar");
}

#[test]
fn name_is_returned_verbatim() {
    struct TestCase {
        name: &'static str,
    }
    let cases = [
        TestCase { name: "Acme-API" },
        TestCase { name: "acme_api.v2" },
        TestCase { name: "X" },
    ];

    for case in cases {
        let tmp = tempdir().unwrap();
        let descriptor = format!("application:\n  name: {}\n  group: g\n", case.name);
        let repo = make_repo(tmp.path(), "checkout", Some(&descriptor));

        let app = read_app_info(&repo, &Layout::default())
            .unwrap_or_else(|e| panic!("{} should load: {e}", case.name));
        assert_eq!(app.name, case.name);
    }
}

#[test]
fn deployment_section_is_optional() {
    let tmp = tempdir().unwrap();
    let repo = make_repo(
        tmp.path(),
        "repo",
        Some("application:\n  name: acme-api\n"),
    );

    let app = read_app_info(&repo, &Layout::default()).expect("descriptor should load");
    assert_eq!(app.group, "");
    assert_eq!(app.build_output_path, "");
}

#[test]
fn missing_path_fails_first() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");

    let err = read_app_info(&missing, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::RepoDirMissing(p) if p == missing));
}

#[test]
fn regular_file_is_not_a_repository_directory() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("app-info.yml");
    fs::write(&file, ACME_DESCRIPTOR).unwrap();

    let err = read_app_info(&file, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::RepoDirMissing(_)));
}

#[test]
fn directory_without_marker_fails_before_reading_descriptor() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("plain");
    fs::create_dir_all(&repo).unwrap();
    // Unparsable on purpose: a parse error here would mean the file was read.
    fs::write(repo.join("app-info.yml"), "application: [::::").unwrap();

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(
        matches!(err, MetadataError::NotARepository(_)),
        "expected NotARepository, got {err:?}"
    );
}

#[test]
fn marker_must_be_a_directory() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("worktree");
    fs::create_dir_all(&repo).unwrap();
    fs::write(repo.join(".git"), "gitdir: /elsewhere").unwrap();
    fs::write(repo.join("app-info.yml"), ACME_DESCRIPTOR).unwrap();

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::NotARepository(_)));
}

#[test]
fn missing_descriptor() {
    let tmp = tempdir().unwrap();
    let repo = make_repo(tmp.path(), "repo", None);

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::DescriptorMissing(_)));
}

#[test]
fn malformed_descriptor() {
    let tmp = tempdir().unwrap();
    let repo = make_repo(tmp.path(), "repo", Some("application: [::::"));

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::DescriptorParse { .. }));
    assert!(err.to_string().contains("parse"));
}

#[test]
fn descriptor_without_name_is_rejected() {
    let tmp = tempdir().unwrap();
    let repo = make_repo(tmp.path(), "repo", Some("application:\n  group: com.acme\n"));

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::DescriptorParse { .. }));
}

#[test]
fn unsafe_names_are_rejected_not_rewritten() {
    for name in ["\"\"", "\"acme api\"", "\"../escape\"", "\"-rf\""] {
        let tmp = tempdir().unwrap();
        let descriptor = format!("application:\n  name: {name}\n");
        let repo = make_repo(tmp.path(), "repo", Some(&descriptor));

        let err = read_app_info(&repo, &Layout::default()).unwrap_err();
        assert!(
            matches!(err, MetadataError::InvalidApplicationName(_)),
            "{name} should be rejected, got {err:?}"
        );
    }
}

#[test]
fn alternate_layout_is_honoured() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("hg-checkout");
    fs::create_dir_all(repo.join(".hg")).unwrap();
    fs::write(repo.join("service.yml"), ACME_DESCRIPTOR).unwrap();

    let layout = Layout {
        descriptor_file: "service.yml".to_string(),
        vcs_marker_dir: ".hg".to_string(),
        ..Layout::default()
    };

    let app = read_app_info(&repo, &layout).expect("alternate layout should load");
    assert_eq!(app.name, "acme-api");

    let err = read_app_info(&repo, &Layout::default()).unwrap_err();
    assert!(matches!(err, MetadataError::NotARepository(_)));
}
