#![allow(dead_code)]

use assert_cmd::Command;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use walkdir::WalkDir;

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that write and then exec a script. A concurrent fork in
/// another test thread can briefly hold the script open for writing, and
/// exec of a file open for writing fails with ETXTBSY.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Stand-in for the `vips` CLI. It logs every call, answers the `-l` probe,
/// and "processes" an image by copying input to output. Inputs whose path
/// contains `broken` fail, inputs containing `slow` hang without writing anything.
pub struct FakeVips {
    pub program: PathBuf,
    pub log: PathBuf,
}

impl FakeVips {
    pub fn install(dir: &Path) -> Self {
        Self::install_with_probe(dir, 0)
    }

    pub fn install_with_probe(dir: &Path, probe_exit: i32) -> Self {
        let bin_dir = dir.join("fake-bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let program = bin_dir.join("vips");
        let log = bin_dir.join("calls.log");

        let script = format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> '{log}'
case "$1" in
  -l) exit {probe_exit} ;;
esac
case "$2" in
  *broken*) echo "fake vips: cannot load $2" >&2; exit 3 ;;
  *slow*) exec sleep 5 ;;
esac
case "$1" in
  thumbnail|jpegsave|pngsave) cp "$2" "$3" ;;
  *) echo "fake vips: unknown operation $1" >&2; exit 1 ;;
esac
"#,
            log = log.display(),
            probe_exit = probe_exit
        );

        {
            let mut file = File::create(&program).unwrap();
            file.write_all(script.as_bytes()).unwrap();
            file.sync_all().unwrap();
        }
        make_executable(&program);

        Self { program, log }
    }

    /// Every logged call except the capability probe.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .filter(|line| *line != "-l")
            .map(str::to_string)
            .collect()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{} ", operation);
        self.calls()
            .into_iter()
            .filter(|line| line.starts_with(&prefix))
            .collect()
    }

    pub fn probed(&self) -> bool {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .any(|line| line == "-l")
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("thumbnail").unwrap();
        cmd.env("THUMBNAIL_VIPS", &self.program);
        cmd
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(contents).unwrap();
}

/// Two top-level and three nested images plus some noise.
pub fn create_picture_tree(root: &Path) {
    write_file(&root.join("one.jpg"), b"jpeg one");
    write_file(&root.join("two.PNG"), b"png two");
    write_file(&root.join("notes.txt"), b"not an image");
    write_file(&root.join("trip").join("three.jpeg"), b"jpeg three");
    write_file(&root.join("trip").join("four.png"), b"png four");
    write_file(&root.join("trip").join("deeper").join("five.jpg"), b"jpeg five");
    write_file(&root.join("trip").join("anim.gif"), b"gif");
}

/// Relative paths of every regular file under `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
