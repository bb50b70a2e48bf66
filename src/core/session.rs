//! Remote session: one target host, one user, an optional working directory.
//!
//! Every command goes through [`Session::run`] (failure is an error) or
//! [`Session::run_lenient`] (failure is data). Commands are issued as
//! `cd <dir> && <command>` when a directory context is active, and wrapped in
//! `sudo -n sh -c` when the session is elevated.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, RemoteCommandFailedDetails, RemoteTransferFailedDetails, Result};
use crate::ssh::{CommandResult, Transport};
use crate::utils::{base_path, io, shell};

pub struct Session {
    transport: Arc<dyn Transport>,
    elevated: bool,
    cwd: Option<String>,
    journal: Rc<RefCell<Vec<String>>>,
}

impl Session {
    /// Elevated session over `transport` with no directory context.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            elevated: true,
            cwd: None,
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    pub fn is_dry_run(&self) -> bool {
        self.transport.is_dry_run()
    }

    pub fn target(&self) -> String {
        self.transport.target()
    }

    pub fn current_dir(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// Absolute form of `path` under the current directory context.
    pub fn resolve(&self, path: &str) -> Result<String> {
        base_path::join_remote_path(self.cwd.as_deref(), path)
    }

    /// Run a command; a non-zero exit is returned as `remote.command_failed`.
    pub fn run(&self, command: &str) -> Result<CommandResult> {
        let (logical, result) = self.dispatch(command, self.elevated, None);
        if result.success {
            Ok(result)
        } else {
            Err(self.command_error(logical, result))
        }
    }

    /// Run a command and hand back the result whatever the exit code.
    pub fn run_lenient(&self, command: &str) -> CommandResult {
        let (logical, result) = self.dispatch(command, self.elevated, None);
        if !result.success {
            log_status!(
                "session",
                "Ignoring exit code {} from: {}",
                result.exit_code,
                logical
            );
        }
        result
    }

    /// Run a command and return its trimmed stdout.
    pub fn capture(&self, command: &str) -> Result<String> {
        Ok(self.run(command)?.output().to_string())
    }

    /// Execute `body` with `path` as the working directory.
    ///
    /// `body` receives a scoped child session; the caller's own context is
    /// never modified, so it is intact on every exit path. Relative paths
    /// nest under the current context.
    pub fn with_directory<T>(
        &self,
        path: &str,
        body: impl FnOnce(&Session) -> Result<T>,
    ) -> Result<T> {
        let scoped = Session {
            transport: Arc::clone(&self.transport),
            elevated: self.elevated,
            cwd: Some(self.resolve(path)?),
            journal: Rc::clone(&self.journal),
        };
        body(&scoped)
    }

    /// Copy a local file to `remote_path`, verifying the remote checksum.
    pub fn upload_file(&self, local_path: &Path, remote_path: &str, elevated: bool) -> Result<()> {
        let remote_path = self.resolve(remote_path)?;
        let transfer_error = |stderr: String| {
            Error::remote_transfer_failed(RemoteTransferFailedDetails {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.clone(),
                stderr,
                target: self.target(),
            })
        };

        let bytes = std::fs::read(local_path).map_err(|e| transfer_error(e.to_string()))?;
        let local_sha = io::sha256_hex(&bytes);

        let sink = if elevated {
            format!("tee {} > /dev/null", shell::quote_path(&remote_path))
        } else {
            format!("cat > {}", shell::quote_path(&remote_path))
        };
        let (_, result) = self.dispatch(&sink, elevated, Some(local_path));
        if !result.success {
            return Err(transfer_error(result.stderr));
        }

        if self.is_dry_run() {
            return Ok(());
        }

        let checksum = self.run_lenient(&format!("sha256sum {}", shell::quote_path(&remote_path)));
        if !checksum.success {
            log_status!(
                "session",
                "Could not verify checksum of {}: {}",
                remote_path,
                checksum.stderr.trim()
            );
            return Ok(());
        }

        let remote_sha = checksum.output().split_whitespace().next().unwrap_or_default();
        if remote_sha != local_sha {
            return Err(transfer_error(format!(
                "checksum mismatch: local {} remote {}",
                local_sha, remote_sha
            )));
        }

        log_status!("session", "Uploaded {} to {}", local_path.display(), remote_path);
        Ok(())
    }

    /// Exact bytes of a remote file, fetched base64-encoded.
    pub fn read_bytes(&self, remote_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve(remote_path)?;
        let command = format!("base64 < {}", shell::quote_path(&path));
        let result = self.run(&command)?;

        if self.is_dry_run() {
            return Ok(result.stdout.into_bytes());
        }

        let encoded: Vec<u8> = result
            .stdout
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD.decode(encoded).map_err(|e| {
            Error::internal_unexpected(format!("Undecodable content of {}: {}", path, e))
        })
    }

    pub fn write_text(&self, remote_path: &str, content: &str) -> Result<()> {
        self.write_bytes(remote_path, content.as_bytes())
    }

    /// Replace the content of a remote file.
    ///
    /// Content is staged next to the target and moved over it; an existing
    /// target's mode and ownership carry over to the new file.
    pub fn write_bytes(&self, remote_path: &str, content: &[u8]) -> Result<()> {
        let path = self.resolve(remote_path)?;
        let staging = format!("{}.tmp-{}", path, uuid::Uuid::new_v4().simple());
        let target = shell::quote_path(&path);
        let stage = shell::quote_path(&staging);

        let command = format!(
            "printf %s {encoded} | base64 -d > {stage} && \
             {{ [ ! -e {target} ] || {{ chmod --reference={target} {stage} && chown --reference={target} {stage}; }}; }} && \
             mv -f {stage} {target}",
            encoded = shell::quote_arg(&STANDARD.encode(content)),
            stage = stage,
            target = target,
        );

        if let Err(err) = self.run(&command) {
            self.run_lenient(&format!("rm -f {}", stage));
            return Err(err);
        }
        Ok(())
    }

    /// Drain the commands issued since the last call.
    pub fn take_journal(&self) -> Vec<String> {
        std::mem::take(&mut *self.journal.borrow_mut())
    }

    fn dispatch(
        &self,
        command: &str,
        elevated: bool,
        stdin: Option<&Path>,
    ) -> (String, CommandResult) {
        let logical = match &self.cwd {
            Some(dir) => format!("cd {} && {}", shell::quote_path(dir), command),
            None => command.to_string(),
        };

        let wire = if elevated {
            format!("sudo -n sh -c {}", shell::escape_command_for_shell(&logical))
        } else {
            logical.clone()
        };

        self.journal.borrow_mut().push(logical.clone());
        let result = self.transport.execute(&wire, stdin);
        (logical, result)
    }

    fn command_error(&self, command: String, result: CommandResult) -> Error {
        if result.is_transport_failure() {
            return Error::ssh_connect_failed(self.target(), command, result.stderr);
        }
        Error::remote_command_failed(RemoteCommandFailedDetails {
            command,
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            target: self.target(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::SshClient;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
        fail_with: Option<(i32, String)>,
    }

    impl Transport for Recorder {
        fn execute(&self, command: &str, _stdin: Option<&Path>) -> CommandResult {
            self.commands.lock().unwrap().push(command.to_string());
            match &self.fail_with {
                Some((code, stderr)) => CommandResult::failed(*code, stderr.clone()),
                None => CommandResult::ok("ok\n"),
            }
        }

        fn target(&self) -> String {
            "ubuntu@nexus.example.com".to_string()
        }
    }

    fn local_session() -> Session {
        Session::new(Arc::new(SshClient::local())).elevated(false)
    }

    #[test]
    fn elevated_commands_are_wrapped_in_sudo() {
        let recorder = Arc::new(Recorder::default());
        let session = Session::new(recorder.clone());

        session.run("service nexus stop").unwrap();

        let sent = recorder.commands.lock().unwrap();
        assert_eq!(sent[0], "sudo -n sh -c 'service nexus stop'");
    }

    #[test]
    fn run_failure_carries_command_and_stderr() {
        let recorder = Arc::new(Recorder {
            fail_with: Some((2, "tar: Error is not recoverable\n".to_string())),
            ..Default::default()
        });
        let session = Session::new(recorder).elevated(false);

        let err = session.run("tar xvzf a.tgz").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RemoteCommandFailed);
        assert_eq!(err.command(), Some("tar xvzf a.tgz"));
        assert_eq!(err.stderr(), Some("tar: Error is not recoverable\n"));
    }

    #[test]
    fn connection_failure_is_reported_as_ssh_error() {
        let recorder = Arc::new(Recorder {
            fail_with: Some((255, "ssh: connect to host nexus port 22: Connection refused".to_string())),
            ..Default::default()
        });
        let session = Session::new(recorder);

        let err = session.run("service nexus start").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::SshConnectFailed);
        assert_eq!(err.command(), Some("service nexus start"));
        assert_eq!(err.retryable, Some(true));
    }

    #[test]
    fn run_lenient_returns_failure_as_data() {
        let recorder = Arc::new(Recorder {
            fail_with: Some((1, "nexus: unrecognized service".to_string())),
            ..Default::default()
        });
        let session = Session::new(recorder);

        let result = session.run_lenient("service nexus stop");
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn with_directory_scopes_and_nests() {
        let recorder = Arc::new(Recorder::default());
        let session = Session::new(recorder.clone()).elevated(false);

        session
            .with_directory("/data/nexus", |s| {
                s.run("ls")?;
                s.with_directory("working", |inner| inner.run("ls | grep nexus"))
            })
            .unwrap();
        session.run("pwd").unwrap();

        let sent = recorder.commands.lock().unwrap();
        assert_eq!(sent[0], "cd '/data/nexus' && ls");
        assert_eq!(sent[1], "cd '/data/nexus/working' && ls | grep nexus");
        assert_eq!(sent[2], "pwd");
        assert_eq!(session.current_dir(), None);
    }

    #[test]
    fn with_directory_context_is_gone_after_failure() {
        let recorder = Arc::new(Recorder::default());
        let session = Session::new(recorder.clone()).elevated(false);

        let result: Result<()> = session.with_directory("/tmp", |_| {
            Err(Error::internal_unexpected("boom"))
        });
        assert!(result.is_err());

        session.run("ls").unwrap();
        assert_eq!(recorder.commands.lock().unwrap()[0], "ls");
    }

    #[test]
    fn journal_records_logical_commands() {
        let session = Session::new(Arc::new(Recorder::default()));
        session
            .with_directory("/data", |s| s.run("mkdir -p working"))
            .unwrap();
        assert_eq!(session.take_journal(), ["cd '/data' && mkdir -p working"]);
        assert!(session.take_journal().is_empty());
    }

    #[test]
    fn write_then_read_roundtrips_through_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus.properties");
        let session = local_session();
        let content = "application-port=8081\nnexus-webapp-context-path=/nexus\n# it's quoted\n";

        session.write_text(path.to_str().unwrap(), content).unwrap();
        assert_eq!(
            session.read_bytes(path.to_str().unwrap()).unwrap(),
            content.as_bytes()
        );
    }

    #[test]
    fn read_and_write_keep_non_utf8_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus");
        let content = b"# Auteur: Ren\xe9\nNEXUS_HOME=\"..\"\n";
        std::fs::write(&path, content).unwrap();
        let session = local_session();

        let fetched = session.read_bytes(path.to_str().unwrap()).unwrap();
        assert_eq!(fetched, content);

        session.write_bytes(path.to_str().unwrap(), &fetched).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }

    #[test]
    fn read_bytes_of_missing_file_is_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = local_session()
            .read_bytes(missing.to_str().unwrap())
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RemoteCommandFailed);
    }

    #[test]
    fn write_text_preserves_executable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        local_session()
            .write_text(path.to_str().unwrap(), "#!/bin/sh\nexit 0\n")
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "#!/bin/sh\nexit 0\n");
    }

    #[test]
    fn upload_file_copies_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("site");
        std::fs::write(&local, "server { listen 80; }\n").unwrap();
        let remote = dir.path().join("sites-available-nexus");

        local_session()
            .upload_file(&local, remote.to_str().unwrap(), false)
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&remote).unwrap(),
            "server { listen 80; }\n"
        );
    }

    #[test]
    fn upload_of_missing_local_file_is_transfer_error() {
        let err = local_session()
            .upload_file(Path::new("/nonexistent/site"), "/tmp/x", false)
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RemoteTransferFailed);
    }

    #[test]
    fn upload_into_missing_directory_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("site");
        std::fs::write(&local, "x").unwrap();

        let err = local_session()
            .upload_file(&local, "/nonexistent-dir/site", false)
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RemoteTransferFailed);
    }
}
