// ── In-memory connector for tests ──
//
// `MockConnector` records every session and command and plays a
// cooperative device by default: commands exit 0 and interactive scripts
// see exactly the prompts they expect. Failure rules match on host plus a
// command substring, so tests can break the k-th device of a fan-out.
// Hooks and gates use the same matching to act on, or hold, a command
// while it is in flight.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::auth::{AuthMethod, HostKeyPolicy, Target};
use crate::channel::{CommandOutput, Connector, RemoteChannel};
use crate::error::Error;
use crate::script::{ExitReport, InteractiveScript, ScriptIo, Step};

/// How an injected failure manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The session breaks mid-command.
    Transport,
    /// The command exceeds its time budget.
    Timeout,
    /// The command runs and exits with this code.
    Exit(u32),
}

/// One command seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub host: String,
    pub user: String,
    pub auth: &'static str,
    pub command: String,
    pub interactive: bool,
}

#[derive(Debug)]
struct FailureRule {
    host: String,
    needle: String,
    failure: Failure,
    skip: usize,
}

#[derive(Debug)]
struct TranscriptRule {
    host: String,
    needle: String,
    output: String,
}

type Hook = Arc<dyn Fn() + Send + Sync>;

struct HookRule {
    host: String,
    needle: String,
    hook: Hook,
}

impl fmt::Debug for HookRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRule")
            .field("host", &self.host)
            .field("needle", &self.needle)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct GateRule {
    host: String,
    needle: String,
    release: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockState {
    invocations: Vec<Invocation>,
    sessions: Vec<(String, &'static str)>,
    failures: Vec<FailureRule>,
    transcripts: Vec<TranscriptRule>,
    responses: Vec<(String, String, CommandOutput)>,
    unreachable: Vec<String>,
    refused: Vec<(String, &'static str)>,
    hooks: Vec<HookRule>,
    gates: Vec<GateRule>,
}

/// Scripted connector shared between a test and the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Fingerprint the mock presents for `host`.
    pub fn fingerprint_for(host: &str) -> String {
        format!("SHA256:mock-{host}")
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Fail every command on `host` containing `needle`.
    pub fn fail(&self, host: &str, needle: &str, failure: Failure) {
        self.fail_after(host, needle, failure, 0);
    }

    /// Let `skip` matching commands through, then fail the rest.
    pub fn fail_after(&self, host: &str, needle: &str, failure: Failure, skip: usize) {
        self.lock().failures.push(FailureRule {
            host: host.to_owned(),
            needle: needle.to_owned(),
            failure,
            skip,
        });
    }

    /// Answer commands on `host` containing `needle` with a fixed output.
    pub fn respond(&self, host: &str, needle: &str, output: CommandOutput) {
        self.lock()
            .responses
            .push((host.to_owned(), needle.to_owned(), output));
    }

    /// Replace the cooperative transcript of a matching interactive command.
    pub fn transcript(&self, host: &str, needle: &str, output: &str) {
        self.lock().transcripts.push(TranscriptRule {
            host: host.to_owned(),
            needle: needle.to_owned(),
            output: output.to_owned(),
        });
    }

    /// Refuse TCP connections to `host`.
    pub fn unreachable(&self, host: &str) {
        self.lock().unreachable.push(host.to_owned());
    }

    /// Reject authentication on `host` by `method` (`"password"` / `"publickey"`).
    pub fn refuse_auth(&self, host: &str, method: &'static str) {
        self.lock().refused.push((host.to_owned(), method));
    }

    /// Call `hook` each time a matching command is recorded, before the
    /// command completes.
    pub fn on_command(&self, host: &str, needle: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.lock().hooks.push(HookRule {
            host: host.to_owned(),
            needle: needle.to_owned(),
            hook: Arc::new(hook),
        });
    }

    /// Hold the next matching command after it is recorded until the
    /// returned handle is notified. Later matches pass straight through.
    pub fn gate(&self, host: &str, needle: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.lock().gates.push(GateRule {
            host: host.to_owned(),
            needle: needle.to_owned(),
            release: Arc::clone(&release),
        });
        release
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    /// Commands run on `host`, in order.
    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.lock()
            .invocations
            .iter()
            .filter(|inv| inv.host == host)
            .map(|inv| inv.command.clone())
            .collect()
    }

    /// Sessions opened, as `(host, auth method)`.
    pub fn sessions(&self) -> Vec<(String, &'static str)> {
        self.lock().sessions.clone()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.invocations.clear();
        state.sessions.clear();
    }

    fn record(&self, target: &Target, auth: &'static str, command: &str, interactive: bool) -> Option<Failure> {
        let mut state = self.lock();
        state.invocations.push(Invocation {
            host: target.host.clone(),
            user: target.username.clone(),
            auth,
            command: command.to_owned(),
            interactive,
        });
        let rule = state
            .failures
            .iter_mut()
            .find(|rule| rule.host == target.host && command.contains(&rule.needle))?;
        if rule.skip > 0 {
            rule.skip -= 1;
            return None;
        }
        Some(rule.failure.clone())
    }
}

impl MockConnector {
    /// Run hooks and wait on a gate for a command that was just recorded.
    async fn intercept(&self, target: &Target, command: &str) {
        let (hooks, gate) = {
            let mut state = self.lock();
            let hit = |host: &str, needle: &str| host == target.host && command.contains(needle);
            let hooks: Vec<Hook> = state
                .hooks
                .iter()
                .filter(|rule| hit(&rule.host, &rule.needle))
                .map(|rule| Arc::clone(&rule.hook))
                .collect();
            let gate = state
                .gates
                .iter()
                .position(|rule| hit(&rule.host, &rule.needle))
                .map(|pos| state.gates.remove(pos).release);
            (hooks, gate)
        };
        for hook in hooks {
            hook();
        }
        if let Some(release) = gate {
            release.notified().await;
        }
    }
}

impl Connector for MockConnector {
    type Channel = MockChannel;

    async fn open(&self, target: &Target, auth: &AuthMethod) -> Result<MockChannel, Error> {
        let address = format!("{}:{}", target.host, target.port);
        let fingerprint = Self::fingerprint_for(&target.host);
        let mut state = self.lock();

        if state.unreachable.contains(&target.host) {
            return Err(Error::Connect {
                address,
                reason: "connection refused".into(),
            });
        }
        if let HostKeyPolicy::Fingerprint(pinned) = &target.host_key {
            if *pinned != fingerprint {
                return Err(Error::HostKeyRejected {
                    address,
                    fingerprint,
                });
            }
        }
        if state
            .refused
            .iter()
            .any(|(host, method)| *host == target.host && *method == auth.label())
        {
            return Err(Error::Authentication {
                user: target.username.clone(),
                method: auth.label(),
            });
        }

        state.sessions.push((target.host.clone(), auth.label()));
        drop(state);

        Ok(MockChannel {
            connector: self.clone(),
            target: target.clone(),
            auth: auth.label(),
            address,
            fingerprint,
        })
    }
}

/// Session handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockChannel {
    connector: MockConnector,
    target: Target,
    auth: &'static str,
    address: String,
    fingerprint: String,
}

impl MockChannel {
    fn failure_error(&self, failure: &Failure) -> Option<Error> {
        match failure {
            Failure::Transport => Some(Error::Transport(format!("{}: connection reset", self.address))),
            Failure::Timeout => Some(Error::Timeout {
                address: self.address.clone(),
                timeout_secs: 0,
            }),
            Failure::Exit(_) => None,
        }
    }
}

impl RemoteChannel for MockChannel {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, Error> {
        let failure = self.connector.record(&self.target, self.auth, command, false);
        self.connector.intercept(&self.target, command).await;
        if let Some(failure) = failure {
            if let Some(err) = self.failure_error(&failure) {
                return Err(err);
            }
            if let Failure::Exit(code) = failure {
                return Ok(CommandOutput {
                    exit_code: code,
                    stdout: String::new(),
                    stderr: format!("mock failure: {command}"),
                });
            }
        }

        let state = self.connector.lock();
        let canned = state
            .responses
            .iter()
            .find(|(host, needle, _)| *host == self.target.host && command.contains(needle.as_str()))
            .map(|(_, _, output)| output.clone());
        Ok(canned.unwrap_or_default())
    }

    async fn run_interactive(&mut self, script: &InteractiveScript) -> Result<(), Error> {
        let command = script.command();
        let mut exit_code = 0;
        let failure = self.connector.record(&self.target, self.auth, command, true);
        self.connector.intercept(&self.target, command).await;
        if let Some(failure) = failure {
            if let Some(err) = self.failure_error(&failure) {
                return Err(err);
            }
            if let Failure::Exit(code) = failure {
                exit_code = code;
            }
        }

        let output = {
            let state = self.connector.lock();
            state
                .transcripts
                .iter()
                .find(|rule| rule.host == self.target.host && command.contains(rule.needle.as_str()))
                .map(|rule| rule.output.clone())
        }
        .unwrap_or_else(|| cooperative_transcript(script));

        let mut io = ScriptedIo::new(&output, exit_code);
        script.drive(&mut io).await
    }

    fn host_key_fingerprint(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }

    async fn close(self) {}
}

/// Output a device would print if it behaved exactly as the script expects.
fn cooperative_transcript(script: &InteractiveScript) -> String {
    let mut out = String::new();
    for step in script.steps() {
        match step {
            Step::ExpectLine(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Step::ExpectPrompt { text, .. } => {
                out.push_str(text);
                out.push_str(" \n");
            }
            Step::Send(_) | Step::SendSecretLine(_) => {}
        }
    }
    out
}

// ── ScriptedIo ───────────────────────────────────────────────────────

/// Fixed stdout transcript plus a recorded stdin.
#[derive(Debug, Default)]
pub struct ScriptedIo {
    output: VecDeque<u8>,
    written: Vec<u8>,
    input_closed: bool,
    exit_code: u32,
    stderr: String,
}

impl ScriptedIo {
    pub fn new(output: &str, exit_code: u32) -> Self {
        Self {
            output: output.bytes().collect(),
            exit_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_owned();
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn input_closed(&self) -> bool {
        self.input_closed
    }
}

impl ScriptIo for ScriptedIo {
    async fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>, Error> {
        let end = self
            .output
            .iter()
            .position(|&b| b == delimiter)
            .map_or(self.output.len(), |pos| pos + 1);
        Ok(self.output.drain(..end).collect())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.input_closed {
            return Err(Error::Transport("write after EOF".into()));
        }
        self.written.extend_from_slice(data);
        Ok(())
    }

    async fn close_input(&mut self) -> Result<(), Error> {
        self.input_closed = true;
        Ok(())
    }

    async fn finish(&mut self) -> Result<ExitReport, Error> {
        Ok(ExitReport {
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
        })
    }
}
