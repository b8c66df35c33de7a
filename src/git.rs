use std::path::Path;
use std::process::Command;

/// Detect the remote fetch URL of the repository at `path`.
///
/// Tries the `origin` remote first, falls back to the first listed remote.
/// The URL is returned verbatim (SSH or HTTPS form); rule qualifiers match
/// by substring, so no normalization is needed.
pub fn remote_url(path: &Path) -> Option<String> {
    remote_url_of(path, "origin").or_else(|| {
        let first = first_remote_name(path)?;
        remote_url_of(path, &first)
    })
}

/// Run `git remote get-url <remote>` in the given directory.
fn remote_url_of(path: &Path, remote: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", remote])
        .current_dir(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if url.is_empty() { None } else { Some(url) }
}

/// Return the name of the first listed remote.
fn first_remote_name(path: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["remote"])
        .current_dir(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()?
        .trim()
        .to_owned();
    if name.is_empty() { None } else { Some(name) }
}

/// Current branch name, `None` outside a repository.
///
/// A detached HEAD reports the short commit hash instead of the literal
/// `HEAD`, so branch rules see something stable to (not) match.
pub fn current_branch(path: &Path) -> Option<String> {
    let name = git_line(path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if name == "HEAD" {
        git_line(path, &["rev-parse", "--short", "HEAD"])
    } else {
        Some(name)
    }
}

pub fn is_repository(path: &Path) -> bool {
    git_line(path, &["rev-parse", "--is-inside-work-tree"]).as_deref() == Some("true")
}

fn git_line(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let line = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if line.is_empty() { None } else { Some(line) }
}
