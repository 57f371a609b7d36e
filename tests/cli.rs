use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn bin() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("saltseal"))
}

fn populate(root: &Path) {
    fs::create_dir_all(root.join("data").join("sub")).unwrap();
    fs::write(root.join("data").join("a.txt"), b"first file").unwrap();
    fs::write(root.join("data").join("b.txt"), b"second file").unwrap();
    fs::write(root.join("data").join("sub").join("c.txt"), b"third file").unwrap();
}

fn read(root: &Path, rel: &str) -> Vec<u8> {
    fs::read(root.join(rel)).unwrap()
}

#[test]
fn encrypt_then_decrypt_folder_roundtrip() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    // encrypt
    bin()
        .current_dir(dir.path())
        .arg("--encrypt")
        .arg("data")
        .write_stdin("correct horse\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 file(s) encrypted"));

    assert_eq!(fs::read(dir.path().join("salt.salt")).unwrap().len(), 16);
    assert_ne!(read(dir.path(), "data/a.txt"), b"first file");
    assert!(read(dir.path(), "data/sub/c.txt").starts_with(b"gAAAAA"));

    // decrypt
    bin()
        .current_dir(dir.path())
        .arg("--decrypt")
        .arg("data")
        .write_stdin("correct horse\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 file(s) decrypted"));

    assert_eq!(read(dir.path(), "data/a.txt"), b"first file");
    assert_eq!(read(dir.path(), "data/b.txt"), b"second file");
    assert_eq!(read(dir.path(), "data/sub/c.txt"), b"third file");
}

#[test]
fn wrong_password_fails_and_keeps_ciphertext() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-e", "data"])
        .write_stdin("correct horse\n")
        .assert()
        .success();

    let encrypted = read(dir.path(), "data/a.txt");

    bin()
        .current_dir(dir.path())
        .args(["-d", "data"])
        .write_stdin("wrong\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("3 file(s) failed"))
        .stdout(predicate::str::contains("invalid token, possibly wrong password"));

    assert_eq!(read(dir.path(), "data/a.txt"), encrypted);
}

#[test]
fn single_file_roundtrip() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("note.txt"), b"just one").unwrap();

    bin()
        .current_dir(dir.path())
        .args(["-e", "note.txt"])
        .write_stdin("pw\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file(s) encrypted"));

    bin()
        .current_dir(dir.path())
        .args(["-d", "note.txt"])
        .write_stdin("pw\n")
        .assert()
        .success();

    assert_eq!(read(dir.path(), "note.txt"), b"just one");
}

#[test]
fn both_modes_are_rejected() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["--encrypt", "--decrypt", "data"])
        .write_stdin("pw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));

    assert_eq!(read(dir.path(), "data/a.txt"), b"first file");
}

#[test]
fn no_mode_prints_reminder() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .arg("data")
        .assert()
        .success()
        .stdout(predicate::str::contains("--encrypt or --decrypt"));

    assert!(!dir.path().join("salt.salt").exists());
}

#[test]
fn salt_size_creates_fresh_salt() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-e", "-s", "32", "data"])
        .write_stdin("pw\n")
        .assert()
        .success();

    assert_eq!(fs::read(dir.path().join("salt.salt")).unwrap().len(), 32);
}

#[test]
fn salt_size_with_decrypt_is_rejected() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-d", "-s", "16", "data"])
        .write_stdin("pw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn salt_file_from_environment() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let salt = dir.path().join("keys").join("project.salt");

    bin()
        .current_dir(dir.path())
        .env("SALTSEAL_SALT_FILE", &salt)
        .args(["-e", "data"])
        .write_stdin("pw\n")
        .assert()
        .success();

    assert!(salt.exists());
    assert!(!dir.path().join("salt.salt").exists());
}

#[test]
fn salt_file_inside_target_is_not_encrypted() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-e", "."])
        .write_stdin("pw\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 file(s) encrypted"));

    assert_eq!(fs::read(dir.path().join("salt.salt")).unwrap().len(), 16);
}

#[test]
fn scan_redirects_to_chosen_folder() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("root").join("alpha")).unwrap();
    fs::create_dir_all(dir.path().join("root").join("beta")).unwrap();
    fs::write(dir.path().join("root/alpha/a.txt"), b"alpha").unwrap();
    fs::write(dir.path().join("root/beta/b.txt"), b"beta").unwrap();

    bin()
        .current_dir(dir.path())
        .args(["--scan", "-e", "root"])
        .write_stdin("2\npw\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available folders:"))
        .stdout(predicate::str::contains("1 file(s) encrypted"));

    assert_eq!(read(dir.path(), "root/alpha/a.txt"), b"alpha");
    assert_ne!(read(dir.path(), "root/beta/b.txt"), b"beta");
}

#[test]
fn scan_with_invalid_choice_exits_without_changes() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["--scan", "-e", "data"])
        .write_stdin("9\npw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid choice"));

    assert_eq!(read(dir.path(), "data/sub/c.txt"), b"third file");
    assert!(!dir.path().join("salt.salt").exists());
}

#[test]
fn json_report_lists_failures() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let output = bin()
        .current_dir(dir.path())
        .args(["--json", "-d", "data"])
        .write_stdin("pw\n")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["mode"], "decrypt");
    assert_eq!(report["succeeded"], 0);
    assert_eq!(report["failures"].as_array().unwrap().len(), 3);
    assert_eq!(report["failures"][0]["kind"], "malformed_token");
}

#[test]
fn parallel_jobs_roundtrip() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-e", "-j", "3", "data"])
        .write_stdin("pw\n")
        .assert()
        .success();

    bin()
        .current_dir(dir.path())
        .args(["-d", "-j", "3", "data"])
        .write_stdin("pw\n")
        .assert()
        .success();

    assert_eq!(read(dir.path(), "data/b.txt"), b"second file");
}

#[test]
fn empty_password_is_rejected() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-e", "data"])
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No password provided"));

    assert_eq!(read(dir.path(), "data/a.txt"), b"first file");
}

#[test]
fn missing_path_fails() {
    let dir = tempdir().unwrap();

    bin()
        .current_dir(dir.path())
        .args(["-e", "nothing-here"])
        .write_stdin("pw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn decrypt_without_salt_file_warns() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    bin()
        .current_dir(dir.path())
        .args(["-d", "data"])
        .write_stdin("pw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no salt file here"))
        .stderr(predicate::str::contains("--salt-file"));

    assert_eq!(read(dir.path(), "data/a.txt"), b"first file");
}

#[cfg(unix)]
#[test]
fn encrypt_through_symlinked_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("secret.txt"), b"top secret").unwrap();
    std::os::unix::fs::symlink("secret.txt", dir.path().join("link.txt")).unwrap();

    bin()
        .current_dir(dir.path())
        .args(["-e", "link.txt"])
        .write_stdin("pw\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file(s) encrypted"));

    assert!(read(dir.path(), "secret.txt").starts_with(b"gAAAAA"));
    assert!(
        fs::symlink_metadata(dir.path().join("link.txt"))
            .unwrap()
            .file_type()
            .is_symlink()
    );
}
