// ── Interactive scripts ──
//
// A script is data: the command to launch plus an ordered list of
// expect/respond steps. The runner walks the steps over any `ScriptIo`
// and stops at the first prompt that does not match literally. Answering
// a prompt we did not expect can lock an account, so there is no
// fallback path.

use std::future::Future;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};

use crate::error::Error;

/// Where OpenWrt's dropbear looks for authorized keys.
pub const DROPBEAR_AUTHORIZED_KEYS: &str = "/etc/dropbear/authorized_keys";

/// Exit status and captured stderr of a finished scripted process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitReport {
    pub exit_code: u32,
    pub stderr: String,
}

/// Byte-level access to a running remote process.
///
/// Implemented by the SSH session and by the in-memory mock.
pub trait ScriptIo {
    /// Read up to and including `delimiter`. Returns fewer bytes (possibly
    /// none) when stdout reaches end of stream first.
    fn read_until(&mut self, delimiter: u8) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;

    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Send EOF on the process's stdin.
    fn close_input(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Wait for the process to exit.
    fn finish(&mut self) -> impl Future<Output = Result<ExitReport, Error>> + Send;
}

/// One transition of a script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read one line; it must equal the text once the line ending is removed.
    ExpectLine(String),
    /// Read through `delimiter`; leading whitespace is skipped, the rest
    /// (delimiter included) must equal the text.
    ExpectPrompt { delimiter: u8, text: String },
    /// Write bytes verbatim.
    Send(Vec<u8>),
    /// Write a secret followed by a newline.
    SendSecretLine(SecretString),
}

/// A command plus the exact exchange expected with it.
#[derive(Debug, Clone)]
pub struct InteractiveScript {
    command: String,
    steps: Vec<Step>,
    tolerate_failure: bool,
}

impl InteractiveScript {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            steps: Vec::new(),
            tolerate_failure: false,
        }
    }

    #[must_use]
    pub fn expect_line(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::ExpectLine(text.into()));
        self
    }

    #[must_use]
    pub fn expect_prompt(mut self, delimiter: u8, text: impl Into<String>) -> Self {
        self.steps.push(Step::ExpectPrompt {
            delimiter,
            text: text.into(),
        });
        self
    }

    #[must_use]
    pub fn send(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Send(data.into()));
        self
    }

    #[must_use]
    pub fn send_secret_line(mut self, secret: SecretString) -> Self {
        self.steps.push(Step::SendSecretLine(secret));
        self
    }

    /// Treat a non-zero exit as success.
    #[must_use]
    pub fn tolerate_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step over `io`, then close stdin and check the exit code.
    pub async fn drive<I>(&self, io: &mut I) -> Result<(), Error>
    where
        I: ScriptIo + Send,
    {
        for (index, step) in self.steps.iter().enumerate() {
            trace!(command = %self.command, index, "script step");
            match step {
                Step::ExpectLine(expected) => {
                    let raw = io.read_until(b'\n').await?;
                    let line = String::from_utf8_lossy(&raw);
                    let received = line.trim_end_matches(['\r', '\n']);
                    if received != expected {
                        return Err(self.mismatch(expected, received));
                    }
                }
                Step::ExpectPrompt {
                    delimiter,
                    text: expected,
                } => {
                    let raw = io.read_until(*delimiter).await?;
                    let chunk = String::from_utf8_lossy(&raw);
                    let received = chunk.trim_start();
                    if received != expected {
                        return Err(self.mismatch(expected, received));
                    }
                }
                Step::Send(data) => io.write_all(data).await?,
                Step::SendSecretLine(secret) => {
                    let mut line = secret.expose_secret().as_bytes().to_vec();
                    line.push(b'\n');
                    io.write_all(&line).await?;
                }
            }
        }

        io.close_input().await?;
        let report = io.finish().await?;
        debug!(command = %self.command, exit_code = report.exit_code, "script finished");

        if report.exit_code != 0 && !self.tolerate_failure {
            return Err(Error::Execution {
                command: self.command.clone(),
                exit_code: report.exit_code,
                stderr: report.stderr,
            });
        }
        Ok(())
    }

    fn mismatch(&self, expected: &str, received: &str) -> Error {
        Error::ProtocolMismatch {
            command: self.command.clone(),
            expected: expected.to_owned(),
            received: received.to_owned(),
        }
    }
}

// ── Concrete scripts ─────────────────────────────────────────────────

/// Append the public key at `public_key` to the remote `authorized_keys`.
///
/// The key file is read here, so a missing key fails before any session
/// is touched.
pub async fn install_public_key(
    public_key: &Path,
    authorized_keys: &str,
) -> Result<InteractiveScript, Error> {
    let mut key = tokio::fs::read(public_key).await?;
    if key.last() != Some(&b'\n') {
        key.push(b'\n');
    }
    let command = format!("tee -a {} >/dev/null", shell_quote(authorized_keys));
    Ok(InteractiveScript::new(command).send(key))
}

/// Change `user`'s password through busybox `passwd`.
pub fn change_password(user: &str, new_password: &SecretString) -> InteractiveScript {
    InteractiveScript::new(format!("passwd {}", shell_quote(user)))
        .expect_line(format!("Changing password for {user}"))
        .expect_prompt(b':', "New password:")
        .send_secret_line(new_password.clone())
        .expect_prompt(b':', "Retype password:")
        .send_secret_line(new_password.clone())
}

/// Quote a value for a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:@=,+".contains(&b))
    {
        return value.to_owned();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::mock::ScriptedIo;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn change_password_follows_busybox_prompts() {
        let script = change_password("root", &secret("s3cret"));
        let mut io = ScriptedIo::new(
            "Changing password for root\nNew password: \nRetype password: \npasswd: password for root changed by root\n",
            0,
        );

        script.drive(&mut io).await.unwrap();

        assert_eq!(io.written(), b"s3cret\ns3cret\n");
        assert!(io.input_closed());
    }

    #[tokio::test]
    async fn change_password_rejects_unexpected_banner() {
        let script = change_password("root", &secret("s3cret"));
        let mut io = ScriptedIo::new("passwd: unknown user root\n", 1);

        let err = script.drive(&mut io).await.unwrap_err();

        assert!(err.is_protocol_mismatch(), "got {err:?}");
        assert!(io.written().is_empty(), "nothing may be typed after a mismatch");
    }

    #[tokio::test]
    async fn change_password_rejects_unexpected_prompt() {
        let script = change_password("root", &secret("s3cret"));
        let mut io = ScriptedIo::new("Changing password for root\nOld password:", 0);

        let err = script.drive(&mut io).await.unwrap_err();

        match err {
            Error::ProtocolMismatch {
                expected, received, ..
            } => {
                assert_eq!(expected, "New password:");
                assert_eq!(received, "Old password:");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_execution_error() {
        let script = InteractiveScript::new("false");
        let mut io = ScriptedIo::new("", 1).with_stderr("boom");

        let err = script.drive(&mut io).await.unwrap_err();

        match err {
            Error::Execution {
                command,
                exit_code,
                stderr,
            } => {
                assert_eq!(command, "false");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tolerated_failure_succeeds() {
        let script = InteractiveScript::new("false").tolerate_failure();
        let mut io = ScriptedIo::new("", 3);
        script.drive(&mut io).await.unwrap();
    }

    #[tokio::test]
    async fn install_public_key_writes_key_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "ssh-ed25519 AAAAC3Nza site@wnetctl").unwrap();

        let script = install_public_key(file.path(), DROPBEAR_AUTHORIZED_KEYS)
            .await
            .unwrap();
        assert_eq!(script.command(), "tee -a /etc/dropbear/authorized_keys >/dev/null");

        let mut io = ScriptedIo::new("", 0);
        script.drive(&mut io).await.unwrap();
        assert_eq!(io.written(), b"ssh-ed25519 AAAAC3Nza site@wnetctl\n");
    }

    #[tokio::test]
    async fn install_public_key_fails_without_key_file() {
        let result = install_public_key(Path::new("/nonexistent/key.pub"), DROPBEAR_AUTHORIZED_KEYS).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn shell_quote_passes_plain_words() {
        assert_eq!(shell_quote("root"), "root");
        assert_eq!(shell_quote("/etc/dropbear"), "/etc/dropbear");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
    }
}
