use std::fs;
use std::time::{Duration, SystemTime};

use courier_engine::{remove_artifact, OutputDir};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let dir = OutputDir::new(temp.path().join("nested").join("out"));
    assert!(!dir.path().exists());
    dir.ensure().unwrap();
    assert!(dir.path().is_dir());
}

#[test]
fn file_in_place_of_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let dir = OutputDir::new(file_path.clone());
    assert!(dir.ensure().is_err());
    assert!(dir.write("doc.html", "data").is_err());
    assert!(!file_path.with_file_name("doc.html").exists());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let dir = OutputDir::new(temp.path());

    let first = dir.write("doc.html", "hello").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = dir.write("doc.html", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1, "no temp files left behind");
}

#[test]
fn remove_artifact_ignores_missing_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.pdf");
    assert!(!remove_artifact(&path));
    fs::write(&path, "x").unwrap();
    assert!(remove_artifact(&path));
    assert!(!path.exists());
}

#[test]
fn purge_removes_files_but_not_directories() {
    let temp = TempDir::new().unwrap();
    let dir = OutputDir::new(temp.path());
    fs::write(temp.path().join("a.html"), "a").unwrap();
    fs::write(temp.path().join("b.pdf"), "b").unwrap();
    fs::create_dir(temp.path().join("keep")).unwrap();

    assert_eq!(dir.purge(false).unwrap(), 2);
    assert!(temp.path().join("keep").is_dir());
}

#[test]
fn purge_keep_recent_spares_fresh_files() {
    let temp = TempDir::new().unwrap();
    let dir = OutputDir::new(temp.path());
    let old = temp.path().join("old.mobi");
    let fresh = temp.path().join("fresh.mobi");
    fs::write(&old, "o").unwrap();
    fs::write(&fresh, "f").unwrap();
    let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
    fs::File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(two_hours_ago)
        .unwrap();

    assert_eq!(dir.purge(true).unwrap(), 1);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[test]
fn purge_of_missing_dir_is_zero() {
    let temp = TempDir::new().unwrap();
    assert_eq!(OutputDir::new(temp.path().join("absent")).purge(false).unwrap(), 0);
}
