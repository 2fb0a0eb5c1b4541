//! Content fingerprint of a command's build inputs.
//!
//! The digest covers the Dockerfile with blank and comment-only lines
//! collapsed, the appended fragment, both build scripts, the checked-out
//! commit and every changed or untracked file in the enclosing repository.
//! Other Dockerfiles in the tree are left out; they are build descriptors of
//! other commands.
//!
//! Version control trouble never fails fingerprinting. Outside a repository
//! the digest covers the declared inputs only; any other failure is logged
//! and the digest covers whatever was fed before it.

use crate::CoreError;
use mydock_runtime::{SourceTree, SourceTreeError};
use mydock_schema::{CommandSpec, Fingerprint};
use regex::bytes::Regex;
use std::io::Read;
use std::sync::LazyLock;
use tracing::{error, warn};

const CHUNK_SIZE: usize = 1024 * 1024;

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\r?\n)(?:[ \t]*(?:#[^\r\n]*)?(?:\r?\n|$))+").expect("valid blank-run regex")
});

/// Collapse runs of blank or comment-only lines and trim surrounding whitespace.
pub fn normalize_dockerfile(content: &[u8]) -> Vec<u8> {
    let collapsed = BLANK_RUN.replace_all(content, &b"$1"[..]);
    collapsed.trim_ascii().to_vec()
}

fn is_dockerfile(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".dockerfile")
}

fn feed_tree(
    hasher: &mut blake3::Hasher,
    spec: &CommandSpec,
    tree: &dyn SourceTree,
) -> Result<(), SourceTreeError> {
    let status = tree.status(spec.context_dir())?;
    match &status.commit {
        Some(commit) => {
            hasher.update(commit);
        }
        None => warn!(
            "could not find any commit for \"{}\"",
            spec.dockerfile.display()
        ),
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    // BTreeSet iteration is already sorted.
    for path in status.changed.iter().filter(|p| !is_dockerfile(p)) {
        hasher.update(b"<<<");
        hasher.update(path.as_bytes());
        match tree.open(&status.root, path)? {
            Some(mut reader) => {
                hasher.update(b"+>>>");
                loop {
                    let n = reader.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
            }
            None => {
                hasher.update(b"!>>>");
            }
        }
    }
    Ok(())
}

/// Compute the fingerprint of `spec`. Only an unreadable Dockerfile is an error.
pub fn compute_fingerprint(
    spec: &CommandSpec,
    tree: &dyn SourceTree,
) -> Result<Fingerprint, CoreError> {
    let dockerfile = std::fs::read(&spec.dockerfile)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&normalize_dockerfile(&dockerfile));
    hasher.update(spec.append.as_bytes());
    hasher.update(spec.prebuild.as_bytes());
    hasher.update(spec.postbuild.as_bytes());

    match feed_tree(&mut hasher, spec, tree) {
        Ok(()) => {}
        Err(SourceTreeError::NotARepository(_)) => warn!(
            "\"{}\" is not tracked by git; the up-to-date state may be inaccurate",
            spec.dockerfile.display()
        ),
        Err(e) => error!("unknown error when reading the repository state: {e}"),
    }
    Ok(Fingerprint::new(hasher.finalize().to_hex().to_string()))
}
