//! Idempotent remote file operations.
//!
//! Every primitive here converges: running it a second time with the same
//! arguments leaves the remote host exactly as the first run did.

use regex::bytes::RegexBuilder;
use serde::Serialize;

use crate::command_builder;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::ssh::CommandResult;
use crate::utils::shell;

/// Whether an operation had to touch the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    Changed,
    Unchanged,
}

/// Path of the backup taken before the first edit of `path`.
pub fn backup_path(path: &str) -> String {
    format!("{}.bak", path)
}

/// True if a file, directory or (possibly dangling) symlink is at `path`.
///
/// Never fails: a probe that cannot run is logged and reported as absent.
pub fn exists(session: &Session, path: &str) -> bool {
    let quoted = shell::quote_path(path);
    let probe = session.run_lenient(&format!("test -e {0} || test -L {0}", quoted));

    if probe.success {
        return true;
    }
    if let Some(reason) = probe_failure(&probe) {
        log_status!("files", "Existence check for {} failed: {}", path, reason);
    }
    false
}

/// Why an existence probe could not answer, if it never ran.
///
/// `test` exits 1 without output when the path is absent; any other exit
/// code or any stderr (e.g. `sudo -n` refusing) means the probe itself failed.
fn probe_failure(probe: &CommandResult) -> Option<String> {
    let stderr = probe.stderr.trim();
    if probe.exit_code == 1 && stderr.is_empty() {
        return None;
    }
    Some(format!("exit {}: {}", probe.exit_code, stderr))
}

/// Regex substitution over the whole file (multi-line mode).
///
/// The file is edited as raw bytes, so content outside the match is written
/// back exactly as read. The pre-edit content is kept at `<path>.bak`; an
/// existing backup is never replaced, so it always holds the content from
/// before the first edit.
/// Nothing is written when the substitution leaves the content as it was.
pub fn replace_text(
    session: &Session,
    path: &str,
    pattern: &str,
    replacement: &str,
) -> Result<EditOutcome> {
    let current = session.read_bytes(path)?;
    match replace_in_text(&current, pattern, replacement)? {
        Some(updated) => {
            backup_once(session, path)?;
            session.write_bytes(path, &updated)?;
            log_status!("files", "Edited {} (s/{}/{}/)", path, pattern, replacement);
            Ok(EditOutcome::Changed)
        }
        None => Ok(EditOutcome::Unchanged),
    }
}

/// Strip one leading `comment_char` from lines that read `<comment_char><marker>…`.
pub fn uncomment(
    session: &Session,
    path: &str,
    marker: &str,
    comment_char: char,
) -> Result<EditOutcome> {
    let current = session.read_bytes(path)?;
    match uncomment_text(&current, marker, comment_char) {
        Some(updated) => {
            backup_once(session, path)?;
            session.write_bytes(path, &updated)?;
            log_status!("files", "Uncommented '{}' in {}", marker, path);
            Ok(EditOutcome::Changed)
        }
        None => Ok(EditOutcome::Unchanged),
    }
}

/// `chown [-R] owner:owner path`.
pub fn set_ownership(session: &Session, path: &str, owner: &str, recursive: bool) -> Result<()> {
    let flag = if recursive { "-R " } else { "" };
    session.run(&format!(
        "chown {}{} {}",
        flag,
        shell::quote_arg(&format!("{}:{}", owner, owner)),
        shell::quote_path(path)
    ))?;
    Ok(())
}

/// `chmod mode path`.
pub fn set_mode(session: &Session, path: &str, mode: &str) -> Result<()> {
    session.run(&format!(
        "chmod {} {}",
        shell::quote_arg(mode),
        shell::quote_path(path)
    ))?;
    Ok(())
}

/// Make `link` a symlink to `target`, replacing whatever is there.
pub fn ensure_symlink(session: &Session, link: &str, target: &str) -> Result<EditOutcome> {
    let quoted_link = shell::quote_path(link);

    let current = session.run_lenient(&format!("readlink {}", quoted_link));
    if current.success && current.output() == target {
        return Ok(EditOutcome::Unchanged);
    }

    session.run(&format!(
        "rm -rf {link} && ln -s {target} {link}",
        link = quoted_link,
        target = shell::quote_path(target)
    ))?;
    log_status!("files", "Linked {} -> {}", link, target);
    Ok(EditOutcome::Changed)
}

/// Remove `path` if present.
pub fn ensure_absent(session: &Session, path: &str) -> Result<EditOutcome> {
    if !exists(session, path) {
        return Ok(EditOutcome::Unchanged);
    }
    session.run(&command_builder::remove_tree(path))?;
    Ok(EditOutcome::Changed)
}

fn backup_once(session: &Session, path: &str) -> Result<()> {
    let backup = backup_path(path);
    if exists(session, &backup) {
        return Ok(());
    }
    session.run(&format!(
        "cp -p {} {}",
        shell::quote_path(path),
        shell::quote_path(&backup)
    ))?;
    Ok(())
}

/// Apply the substitution to `content`; `None` when nothing would change.
pub fn replace_in_text(content: &[u8], pattern: &str, replacement: &str) -> Result<Option<Vec<u8>>> {
    let regex = RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|e| Error::validation_invalid_argument("pattern", e.to_string(), None, None))?;

    let updated = regex.replace_all(content, replacement.as_bytes());
    if updated.as_ref() == content {
        Ok(None)
    } else {
        Ok(Some(updated.into_owned()))
    }
}

/// Uncomment matching lines of `content`; `None` when no line matches.
pub fn uncomment_text(content: &[u8], marker: &str, comment_char: char) -> Option<Vec<u8>> {
    let mut comment = [0u8; 4];
    let comment = comment_char.encode_utf8(&mut comment).as_bytes();
    let mut changed = false;
    let mut out = Vec::with_capacity(content.len());

    for line in content.split_inclusive(|b| *b == b'\n') {
        let body = line.trim_ascii_start();
        let indent = &line[..line.len() - body.len()];

        match body.strip_prefix(comment) {
            Some(rest) if rest.starts_with(marker.as_bytes()) => {
                out.extend_from_slice(indent);
                out.extend_from_slice(rest);
                changed = true;
            }
            _ => out.extend_from_slice(line),
        }
    }

    changed.then_some(out)
}
