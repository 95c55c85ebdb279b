use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const FSH_BIN: &str = env!("CARGO_BIN_EXE_fsh");

struct ShellContext {
    dir: TempDir,
}

impl ShellContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create work dir");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Runs a script file through the shell.
    fn run_script(&self, script: &str) -> Output {
        let script_path = self.path("script.txt");
        fs::write(&script_path, script).expect("failed to write script");
        Command::new(FSH_BIN)
            .arg(&script_path)
            .output()
            .expect("failed to run fsh")
    }

    /// Pipes a script through the shell's standard input.
    fn run_stdin(&self, script: &str) -> Output {
        let mut child = Command::new(FSH_BIN)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("failed to run fsh");
        child
            .stdin
            .take()
            .expect("stdin must be piped")
            .write_all(script.as_bytes())
            .expect("failed to write to fsh");
        child.wait_with_output().expect("failed to wait for fsh")
    }
}

fn lines(output: &Output) -> Vec<String> {
    String::from_utf8(output.stdout.clone())
        .expect("output must be UTF-8")
        .lines()
        .map(str::to_string)
        .collect()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path must be UTF-8")
}

#[test]
fn test_session() {
    let ctx = ShellContext::new();
    let output = ctx.run_script(
        "in\n\
         cr foo\n\
         op foo\n\
         wr 1 x 65\n\
         sk 1 63\n\
         rd 1 10\n\
         cl 1\n\
         dr\n",
    );

    assert!(output.status.success());
    assert_eq!(
        lines(&output),
        vec![
            "disk initialized",
            "foo created",
            "foo opened 1",
            "65 bytes written",
            "position is 63",
            "xx",
            "1 closed",
            "foo",
        ]
    );
}

#[test]
fn test_stdin() {
    let ctx = ShellContext::new();
    let output = ctx.run_stdin("in\ncr a\n\ncr b\ndr\n");

    assert!(output.status.success());
    assert_eq!(
        lines(&output),
        vec!["disk initialized", "a created", "b created", "a b"]
    );
}

#[test]
fn test_not_initialized() {
    let ctx = ShellContext::new();
    let output = ctx.run_script("cr foo\n");

    assert_eq!(output.status.code(), Some(libc::ENODEV));
    assert_eq!(lines(&output), vec!["error: disk not initialized"]);
}

#[test]
fn test_errors_keep_going() {
    let ctx = ShellContext::new();
    let output = ctx.run_script(
        "in\n\
         cr toolong\n\
         bogus\n\
         cr foo\n\
         cr foo\n\
         dr\n",
    );

    assert_eq!(output.status.code(), Some(libc::EEXIST));
    let lines = lines(&output);
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("error: "));
    assert!(lines[2].starts_with("error: "));
    assert_eq!(lines[3], "foo created");
    assert_eq!(lines[4], "error: file already exists");
    assert_eq!(lines[5], "foo");
}

#[test]
fn test_save_and_restore() {
    let ctx = ShellContext::new();
    let image = ctx.path("disk.img");
    let image = path_arg(&image);

    let output = ctx.run_script(&format!(
        "in\n\
         cr foo\n\
         cr bar\n\
         op bar\n\
         wr 1 q 100\n\
         sv {image}\n"
    ));
    assert!(output.status.success());
    assert_eq!(lines(&output).last().map(String::as_str), Some("disk saved"));
    assert_eq!(fs::metadata(image).unwrap().len(), 64 * 64);

    let output = ctx.run_script(&format!(
        "in {image}\n\
         dr\n\
         op bar\n\
         sk 1 98\n\
         rd 1 5\n"
    ));
    assert!(output.status.success());
    assert_eq!(
        lines(&output),
        vec!["disk restored", "foo bar", "bar opened 1", "position is 98", "qq"]
    );
}

#[test]
fn test_restore_corrupt_image() {
    let ctx = ShellContext::new();
    let image = ctx.path("bad.img");
    File::create(&image)
        .and_then(|mut file| file.write_all(&[0u8; 10]))
        .expect("failed to write image");

    let output = ctx.run_script(&format!("in {}\n", path_arg(&image)));
    assert_eq!(output.status.code(), Some(libc::EIO));
    assert!(lines(&output)[0].starts_with("error: corrupt disk image"));
}

#[test]
fn test_directory_capacity() {
    let ctx = ShellContext::new();
    let mut script = String::from("in\n");
    for i in 0..25 {
        script.push_str(&format!("cr f{i}\n"));
    }
    let output = ctx.run_script(&script);

    assert_eq!(output.status.code(), Some(libc::ENOSPC));
    let lines = lines(&output);
    assert_eq!(lines[24], "f23 created");
    assert_eq!(lines[25], "error: directory full");
}

#[test]
fn test_missing_script() {
    let ctx = ShellContext::new();
    let status = Command::new(FSH_BIN)
        .arg(ctx.path("none.txt"))
        .stderr(Stdio::null())
        .status()
        .expect("failed to run fsh");
    assert_eq!(status.code(), Some(1));
}
