use assert_cmd::Command;
use assert_cmd::cargo;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::prelude::*;
use std::path::Path;
use tar::Builder;
use tempfile::tempdir;

fn create_tar_gz_with_executable(files: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(*mode);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// A catalog with `app` 1.0.0 depending on `lib` 1.x, where `lib` ships as
/// `lib-<version>/...` and is flattened on install.
fn write_catalog(dir: &Path) {
    std::fs::write(
        dir.join("app-1.0.0.tar.gz"),
        create_tar_gz_with_executable(&[("bin/app", "#!/bin/sh\necho app\n", 0o755)]),
    )
    .unwrap();
    for version in ["1.0.0", "1.4.0", "2.0.0"] {
        std::fs::write(
            dir.join(format!("lib-{}.tar.gz", version)),
            create_tar_gz_with_executable(&[(
                &format!("lib-{}/share/lib.txt", version),
                version,
                0o644,
            )]),
        )
        .unwrap();
    }

    let lib_entry = |version: &str| {
        serde_json::json!({
            "metadata": {
                "id": "lib", "version": version,
                "installer_ref": "archive",
                "preprocessor_ref": "flatten",
                "configurator_ref": "none"
            },
            "artefact": format!("lib-{}.tar.gz", version)
        })
    };
    let catalog = serde_json::json!({
        "app": { "versions": { "1.0.0": {
            "metadata": {
                "id": "app", "version": "1.0.0",
                "dependencies": [{ "package_id": "lib", "version_range": ">=1.0.0 <2.0.0" }],
                "installer_ref": "archive",
                "configurator_ref": "bin-links"
            },
            "artefact": "app-1.0.0.tar.gz"
        }}},
        "lib": { "versions": {
            "1.0.0": lib_entry("1.0.0"),
            "1.4.0": lib_entry("1.4.0"),
            "2.0.0": lib_entry("2.0.0")
        }}
    });
    std::fs::write(dir.join("catalog.json"), catalog.to_string()).unwrap();
}

fn kiln(root: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("kiln"));
    cmd.arg("--root").arg(root).env_remove("KILN_ROOT");
    cmd
}

#[test]
fn test_end_to_end_install_list_remove() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_catalog(root);

    kiln(root)
        .arg("install")
        .arg("app")
        .assert()
        .success()
        .stdout(predicates::str::contains("Installed app@1.0.0 (with lib@1.4.0)"));

    assert!(root.join("packages/app/1.0.0/bin/app").is_file());
    assert!(root.join("packages/lib/1.4.0/share/lib.txt").is_file());
    assert!(!root.join("staging").join("lib-1.4.0").exists());
    #[cfg(unix)]
    assert_eq!(
        std::fs::read_link(root.join("bin/app")).unwrap(),
        Path::new("../packages/app/1.0.0/bin/app")
    );

    let db = std::fs::read_to_string(root.join("installed.json")).unwrap();
    assert!(db.contains("\"configured\""));

    kiln(root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("app 1.0.0 [configured]"))
        .stdout(predicates::str::contains("lib 1.4.0 [configured] (dependency)"));

    kiln(root)
        .args(["remove", "lib"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("still required by app@1.0.0"));

    kiln(root).args(["remove", "app"]).assert().success();
    assert!(!root.join("packages/app").exists());
    assert!(!root.join("bin/app").exists());

    kiln(root).args(["remove", "lib"]).assert().success();
    kiln(root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("No packages installed."));
}

#[test]
fn test_install_is_idempotent() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_catalog(root);

    kiln(root).args(["install", "lib@^1"]).assert().success();
    kiln(root)
        .args(["install", "lib@^1"])
        .assert()
        .success()
        .stdout(predicates::str::contains("lib@1.4.0 is already installed"));
}

#[test]
fn test_resolve_shows_plan_without_installing() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_catalog(root);

    kiln(root)
        .args(["resolve", "app"])
        .assert()
        .success()
        .stdout(predicates::str::contains("* app@1.0.0"))
        .stdout(predicates::str::contains("  lib@1.4.0"));
    assert!(!root.join("installed.json").exists());
    assert!(!root.join("packages").exists());
}

#[test]
fn test_catalog_option_and_unknown_package() {
    let root_dir = tempdir().unwrap();
    let catalog_dir = tempdir().unwrap();
    write_catalog(catalog_dir.path());

    kiln(root_dir.path())
        .arg("--catalog")
        .arg(catalog_dir.path().join("catalog.json"))
        .args(["install", "nope"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Package 'nope' not found in catalog"));
}

#[test]
fn test_unmet_reports_missing_dependencies() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_catalog(root);

    kiln(root).args(["install", "app"]).assert().success();
    kiln(root)
        .args(["remove", "lib", "--force"])
        .assert()
        .success();

    kiln(root)
        .arg("unmet")
        .assert()
        .success()
        .stdout(predicates::str::contains("app@1.0.0 needs lib (>=1.0.0 <2.0.0)"));
}
