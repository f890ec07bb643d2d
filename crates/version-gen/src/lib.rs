//! A simple build-script library to monitor git repo changes and generate a version number based on repo status.

use std::path::Path;
use std::process::Command;

use git2::Repository;

/// Name of the build-time env var holding the annotated version number.
pub const VERSION_VAR: &str = "MUSTER_VERSION";

/// Set a build-time env var `MUSTER_VERSION` that contains the annotated version number.
///
/// If built from a clean repo on a tagged commit, the version number is simply `pkg_version`,
/// otherwise the version number will be suffixed with the short hash of the current commit and `-dirty`
/// if there are uncommitted changes. Builds from outside a git checkout (e.g. a source tarball) use
/// `pkg_version` unchanged.
///
/// `manifest_path` is the path to the project being built. This is required to recreate cargo's default
/// re-run behavior for build scripts.
pub fn gen_muster_version(manifest_path: impl AsRef<Path>, pkg_version: &str) -> anyhow::Result<()> {
    monitor_files(manifest_path)?;

    let version = match Repository::open_from_env() {
        Ok(repo) => {
            monitor_repo(&repo)?;
            annotate(pkg_version).unwrap_or_else(|_| pkg_version.to_owned())
        }
        Err(_) => pkg_version.to_owned(),
    };
    println!("cargo:rustc-env={VERSION_VAR}={version}");

    Ok(())
}

fn monitor_repo(repo: &Repository) -> anyhow::Result<()> {
    let path = repo.path();
    println!("cargo:rerun-if-changed={}", path.join("HEAD").display());
    if let Some(name) = repo.find_reference("HEAD")?.resolve()?.name() {
        println!("cargo:rerun-if-changed={}", path.join(name).display());
    }
    let tags_path = path.join("refs/tags");
    if tags_path.exists() {
        println!("cargo:rerun-if-changed={}", tags_path.display());
    }
    Ok(())
}

fn annotate(pkg_version: &str) -> anyhow::Result<String> {
    let dirty = !Command::new("git")
        .args(["status", "--porcelain"])
        .output()?
        .stdout
        .is_empty();
    let tag = String::from_utf8(
        Command::new("git")
            .args(["tag", "--points-at=HEAD"])
            .output()?
            .stdout,
    )?;

    if !tag.trim().is_empty() && !dirty {
        return Ok(pkg_version.to_owned());
    }

    let des = String::from_utf8(
        Command::new("git")
            .args(["describe", "--always", "--dirty=-dirty"])
            .output()?
            .stdout,
    )?;
    Ok(format!("{pkg_version}-{}", des.trim()))
}

// Adding the git repo files to "rerun-if-changed" disables the default behavior,
// so every file of the crate has to be listed by hand.
fn monitor_files(dir: impl AsRef<Path>) -> std::io::Result<()> {
    for ent in std::fs::read_dir(dir)? {
        let ent = ent?;
        if ent.file_type()?.is_dir() {
            monitor_files(ent.path())?;
        } else {
            println!("cargo:rerun-if-changed={}", ent.path().display());
        }
    }

    Ok(())
}
