use assert_cmd::Command;
use navtree::v1::{State, StateTree, Widget, query};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn navtree() -> Command {
    let mut cmd = Command::cargo_bin("navtree").unwrap();
    cmd.env_remove("NAVTREE_SHARED_DIR").env_remove("RUST_LOG");
    cmd
}

fn link(id: &str, href: &str) -> Widget {
    Widget::action(id).with_meta("href", href)
}

fn write(path: &Path, tree: &StateTree) {
    std::fs::write(path, tree.to_json().unwrap()).unwrap();
}

fn read(path: &Path) -> StateTree {
    StateTree::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn snapshot() -> StateTree {
    StateTree::new(
        State::home()
            .with_widget(link("a", "/a"))
            .with_widget(link("b", "/b")),
    )
    .with_product("shop")
}

fn explored() -> StateTree {
    let cart = State::new("1")
        .with_bookmark("Cart")
        .with_widget(link("pay", "/pay"));
    StateTree::new(
        State::home()
            .with_widget(link("a", "/a"))
            .with_widget(link("c", "/cart").with_next_state(cart)),
    )
}

#[test]
fn help_lists_subcommands() {
    navtree()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn validate_reports_counts() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("model.json");
    write(&input, &snapshot());

    navtree()
        .args(["validate", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Valid: 1 states, 2 widgets"));
}

#[test]
fn validate_rejects_malformed_document() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("model.json");
    std::fs::write(&input, r#"{"state": {"visible-widgets": []}}"#).unwrap();

    navtree()
        .args(["validate", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn diff_then_merge() {
    let temp = TempDir::new().unwrap();
    let before = temp.path().join("before.json");
    let after = temp.path().join("after.json");
    let annotated = temp.path().join("annotated.json");
    let merged = temp.path().join("merged.json");
    write(&before, &snapshot());
    write(&after, &explored());

    navtree()
        .arg("diff")
        .arg("--before")
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .arg("-o")
        .arg(&annotated)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 created, 1 deleted, 1 unchanged"));

    navtree()
        .arg("merge")
        .arg("--session")
        .arg(&annotated)
        .arg("--shared")
        .arg(&before)
        .arg("-o")
        .arg(&merged)
        .assert()
        .success();

    let tree = read(&merged);
    let ids: Vec<_> = tree.root.widgets.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(query::find_widget(&tree.root, "b").unwrap().is_tombstoned());
    assert!(query::find_widget(&tree.root, "pay").is_some());
    assert!(tree.root.diff().is_none());
    assert_eq!(tree.product.as_deref(), Some("shop"));

    navtree()
        .args(["query", "tombstoned", "-i"])
        .arg(&merged)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\":\"b\""));

    navtree()
        .args(["query", "owner", "--id", "pay", "-i"])
        .arg(&merged)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bookmark\":\"Cart\""));
}

#[test]
fn diff_reads_stdin() {
    navtree()
        .args(["diff", "--after", "-"])
        .write_stdin(explored().to_json().unwrap())
        .assert()
        .success()
        .stderr(predicate::str::contains("3 created"))
        .stdout(predicate::str::contains("multi-user-diff-widgets"));
}

#[test]
fn query_missing_widget_fails() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("model.json");
    write(&input, &snapshot());

    navtree()
        .args(["query", "widget", "--id", "nope", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No widget with id"));
}

#[test]
fn render_dot_to_stdout() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("model.json");
    write(&input, &explored());

    navtree()
        .args(["render", "dot", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph navtree {"))
        .stdout(predicate::str::contains("\"0\" -> \"1\""));
}

#[test]
fn begin_sync_and_list_products() {
    let temp = TempDir::new().unwrap();
    let shared_dir = temp.path().join("shared");
    let data_dir = temp.path().join("data");
    let snapshot = temp.path().join("snapshot.json");
    let captured = temp.path().join("captured.json");

    navtree()
        .args(["begin", "--product", "shop", "--shared-dir"])
        .arg(&shared_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("-o")
        .arg(&snapshot)
        .assert()
        .success();
    assert!(read(&snapshot).root.widgets.is_empty());

    write(&captured, &explored());
    navtree()
        .args(["sync", "--product", "shop", "--tester", "alex", "--shared-dir"])
        .arg(&shared_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--session")
        .arg(&captured)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created\":3"));

    let shared = read(&shared_dir.join("shop/shared-state.json"));
    assert_eq!(query::all_widgets(&shared.root).len(), 3);
    assert_eq!(shared.paths.len(), 1);
    assert_eq!(std::fs::read_dir(data_dir.join("shop")).unwrap().count(), 1);

    navtree()
        .arg("products")
        .arg("--shared-dir")
        .arg(&shared_dir)
        .assert()
        .success()
        .stdout("shop\n");
}
