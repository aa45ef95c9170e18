use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_doctor")))
}

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// Copy fixtures into a fresh directory so they can be overwritten.
fn workspace(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        fs::copy(fixture_path(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

const WIDGET_INJECTED: &str = "#include <stdio.h>

/** Makes widgets.
 *
 * @param count how many widgets to make
 *
 * @return the number made
 */
int make_widgets(int count);

/** Hello world
 */
void intro(void);
";

// -- injection --

#[test]
fn doxygen_header_is_rewritten_in_place() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-w", "80", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"overwrites\": 1"));

    assert_eq!(fs::read_to_string(&widget).unwrap(), WIDGET_INJECTED);
}

#[test]
fn swift_file_uses_swift_markup() {
    let dir = workspace(&["Widget.swift"]);
    let widget = dir.path().join("Widget.swift");

    cmd()
        .args(["-w", "80", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&widget).unwrap(),
        "import Foundation

    /**
     - Parameter foo: the foo value

     - Returns: the result
     */
    func f(foo: Int) -> Int
"
    );
}

#[test]
fn second_run_changes_nothing() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");
    fs::write(&widget, WIDGET_INJECTED.replace("Hello world", "Plain text")).unwrap();
    let before = fs::read_to_string(&widget).unwrap();

    cmd()
        .args(["-w", "80", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"edited\": 0"));

    assert_eq!(fs::read_to_string(&widget).unwrap(), before);
}

#[test]
fn dry_run_leaves_file_untouched() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-i"])
        .arg(path_arg(&widget))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"edited\": 1"))
        .stdout(predicate::str::contains("\"overwrites\": 0"));

    let original = fs::read_to_string(fixture_path("widget.h")).unwrap();
    assert_eq!(fs::read_to_string(&widget).unwrap(), original);
}

#[test]
fn diffs_show_pending_changes() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-d", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("--- {}\n", widget.display())))
        .stdout(predicate::str::contains("-/** doc://./notes.md#intro */\n"))
        .stdout(predicate::str::contains("+/** Hello world\n"))
        .stdout(predicate::str::contains("+ * @return the number made\n"));

    let original = fs::read_to_string(fixture_path("widget.h")).unwrap();
    assert_eq!(fs::read_to_string(&widget).unwrap(), original);
}

#[test]
fn loaded_fragments_resolve_without_path() {
    let dir = workspace(&["details.h"]);
    let details = dir.path().join("details.h");

    cmd()
        .args(["-o", "-l"])
        .arg(fixture_path("notes.md"))
        .arg("-i")
        .arg(path_arg(&details))
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&details).unwrap(),
        "/** First paragraph.
 *
 * Second paragraph.
 */
void details(void);
"
    );
}

#[test]
fn markers_bracket_injected_text() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-k", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success();

    let output = fs::read_to_string(&widget).unwrap();
    assert!(output.contains("<doc source="));
    assert!(output.contains("uri=\"doc://./notes.md#intro\">Hello"));
    assert!(output.contains("world</doc>"));
}

#[test]
fn json_flag_prints_file_reports() {
    let dir = workspace(&["widget.h", "notes.md"]);

    cmd()
        .args(["-j", "-i"])
        .arg(path_arg(&dir.path().join("widget.h")))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"lineTypes\""))
        .stdout(predicate::str::contains("\"extension\": \"not checked\""))
        .stdout(predicate::str::contains("\"totalFiles\": 1"));
}

#[test]
fn directory_input_filters_extensions() {
    let dir = workspace(&["widget.h", "notes.md"]);
    fs::write(dir.path().join("readme.txt"), "/** not a header */\n").unwrap();

    cmd()
        .args(["-o", "-i"])
        .arg(path_arg(dir.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"txt\": 1"))
        .stdout(predicate::str::contains("\"h\": 1"));

    assert_eq!(
        fs::read_to_string(dir.path().join("readme.txt")).unwrap(),
        "/** not a header */\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("widget.h")).unwrap(),
        WIDGET_INJECTED
    );
}

// -- failures --

#[test]
fn repeated_fragment_is_fatal() {
    let dir = workspace(&["widget.h"]);

    cmd()
        .arg("-l")
        .arg(fixture_path("dup.md"))
        .arg("-i")
        .arg(path_arg(&dir.path().join("widget.h")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repeated fragment \"dup\""));
}

#[test]
fn unterminated_comment_fails_and_keeps_file() {
    let dir = workspace(&["unterminated.h"]);
    let path = dir.path().join("unterminated.h");

    cmd()
        .args(["-o", "-i"])
        .arg(path_arg(&path))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unterminated comment opened at line 1"));

    let original = fs::read_to_string(fixture_path("unterminated.h")).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn failure_does_not_stop_other_files() {
    let dir = workspace(&["unterminated.h", "widget.h", "notes.md"]);

    cmd()
        .args(["-o", "-i"])
        .arg(path_arg(&dir.path().join("unterminated.h")))
        .arg(path_arg(&dir.path().join("widget.h")))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"failed\": 1"))
        .stdout(predicate::str::contains("\"overwrites\": 1"));

    assert_eq!(
        fs::read_to_string(dir.path().join("widget.h")).unwrap(),
        WIDGET_INJECTED
    );
}

#[test]
fn missing_reference_names_uri() {
    let dir = workspace(&["widget.h"]);

    cmd()
        .arg("-i")
        .arg(path_arg(&dir.path().join("widget.h")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("comment at lines 10-10"))
        .stderr(predicate::str::contains("cannot resolve \"doc://./notes.md#intro\""));
}

// -- extraction --

#[test]
fn extraction_moves_comments_to_companion() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-e", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success();

    let source = fs::read_to_string(&widget).unwrap();
    assert!(source.contains("/**[doc://./widget.md#line-3-7]\n */\n"));
    assert!(source.contains("/** [doc://#line-10-10]*/\n"));

    let companion = fs::read_to_string(dir.path().join("widget.md")).unwrap();
    assert!(companion.starts_with("Automatic extraction by the Doctor.\n"));
    assert!(companion.contains("# line-3-7\n\nMakes widgets.\n"));
    assert!(companion.contains("# line-10-10\ndoc://./notes.md#intro \n"));
}

#[test]
fn extraction_then_injection_matches_direct_injection() {
    let dir = workspace(&["widget.h", "notes.md"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-e", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success();
    cmd()
        .args(["-w", "80", "-o", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&widget).unwrap(), WIDGET_INJECTED);
}

#[test]
fn extraction_dry_run_writes_nothing() {
    let dir = workspace(&["widget.h"]);
    let widget = dir.path().join("widget.h");

    cmd()
        .args(["-e", "-i"])
        .arg(path_arg(&widget))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"edited\": 1"));

    assert!(!dir.path().join("widget.md").exists());
    let original = fs::read_to_string(fixture_path("widget.h")).unwrap();
    assert_eq!(fs::read_to_string(&widget).unwrap(), original);
}

#[test]
fn extract_dir_mirrors_input_layout() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::copy(fixture_path("details.h"), src.join("sub").join("details.h")).unwrap();
    fs::copy(fixture_path("Widget.swift"), src.join("Widget.swift")).unwrap();
    let docs: PathBuf = dir.path().join("docs");

    cmd()
        .args(["-e", "-o", "-x"])
        .arg(path_arg(&docs))
        .arg("-i")
        .arg(path_arg(&src))
        .assert()
        .success();

    assert!(docs.join("sub").join("details.md").is_file());
    assert!(docs.join("Widget.md").is_file());
    let source = fs::read_to_string(src.join("sub").join("details.h")).unwrap();
    assert!(source.contains("[doc://../../docs/sub/details.md#line-1-3]"));
}
