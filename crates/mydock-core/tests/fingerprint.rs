use git2::{IndexAddOption, Repository, Signature};
use mydock_core::compute_fingerprint;
use mydock_runtime::GitSourceTree;
use mydock_schema::{load_commands_file, CommandSpec};
use std::fs;
use std::path::Path;

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("Mona Lisa", "mona@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

fn project(dir: &Path) -> CommandSpec {
    fs::write(dir.join("dev.Dockerfile"), "FROM alpine\nCOPY . /src\n").unwrap();
    fs::write(dir.join("web.dockerfile"), "FROM nginx\n").unwrap();
    fs::write(dir.join("main.rs"), "fn main() {}\n").unwrap();
    fs::write(
        dir.join("commands.yaml"),
        "dev:\n  dockerfile: dev.Dockerfile\n",
    )
    .unwrap();
    let loaded = load_commands_file(&dir.join("commands.yaml")).unwrap();
    loaded.get("dev").unwrap().clone()
}

#[test]
fn committed_tree_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let spec = project(dir.path());
    commit_all(&repo, "initial");

    let a = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    let b = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn working_tree_edits_change_the_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let spec = project(dir.path());
    commit_all(&repo, "initial");
    let clean = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();

    fs::write(dir.path().join("main.rs"), "fn main() { todo!() }\n").unwrap();
    let edited = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    assert_ne!(clean, edited);

    // Committing the same edit moves the identity to the new commit.
    commit_all(&repo, "edit");
    let committed = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    assert_ne!(committed, edited);
    assert_ne!(committed, clean);
}

#[test]
fn deleting_a_tracked_file_changes_the_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let spec = project(dir.path());
    commit_all(&repo, "initial");
    let clean = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();

    fs::remove_file(dir.path().join("main.rs")).unwrap();
    assert_ne!(
        compute_fingerprint(&spec, &GitSourceTree::new()).unwrap(),
        clean
    );
}

#[test]
fn other_dockerfiles_and_ignored_files_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let spec = project(dir.path());
    fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
    commit_all(&repo, "initial");
    let clean = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();

    fs::write(dir.path().join("web.dockerfile"), "FROM caddy\n").unwrap();
    fs::create_dir_all(dir.path().join("target")).unwrap();
    fs::write(dir.path().join("target").join("out.o"), "\x7fELF").unwrap();
    assert_eq!(
        compute_fingerprint(&spec, &GitSourceTree::new()).unwrap(),
        clean
    );
}

#[test]
fn comment_only_dockerfile_edits_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let spec = project(dir.path());
    // Outside any repository the fingerprint covers the Dockerfile alone.
    let before = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    fs::write(
        dir.path().join("dev.Dockerfile"),
        "FROM alpine\n# base image\n\n\nCOPY . /src\n# end\n",
    )
    .unwrap();
    let after = compute_fingerprint(&spec, &GitSourceTree::new()).unwrap();
    assert_eq!(before, after);
}
