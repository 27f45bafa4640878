//! Non-interactive passphrase sources and the resolver chain.
//!
//! Sources are tried in a fixed priority order; the first one that yields a
//! non-empty value wins:
//!
//! 1. key file given at startup (`--keyfile`)
//! 2. literal `passphrase` parameter
//! 3. output of the `passphrase_cmd` shell command
//! 4. `KAPSUL_PASSPHRASE` environment variable
//!
//! "Nothing found" is `Ok(None)`; only a source that tried and broke
//! (a failing command, ambiguous output) is an error. No source ever blocks
//! on user input.

use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::context::Context;
use crate::errors::{KapsulError, Result};

/// Environment variable holding a fallback passphrase.
pub const PASSPHRASE_ENV: &str = "KAPSUL_PASSPHRASE";

/// Parameter key for a literal passphrase.
pub const PASSPHRASE_KEY: &str = "passphrase";

/// Parameter key for a passphrase command.
pub const PASSPHRASE_CMD_KEY: &str = "passphrase_cmd";

/// Extra inputs to the resolver, keyed by `PASSPHRASE_KEY` / `PASSPHRASE_CMD_KEY`.
pub type SourceParams = BTreeMap<String, String>;

/// Build resolver parameters from settings.
pub fn source_params(settings: &Settings) -> SourceParams {
    let mut params = SourceParams::new();
    if let Some(ref cmd) = settings.passphrase_cmd {
        params.insert(PASSPHRASE_CMD_KEY.to_string(), cmd.clone());
    }
    params
}

/// An unverified passphrase plus the name of the source it came from.
pub struct Candidate {
    secret: Zeroizing<Vec<u8>>,
    source: &'static str,
}

impl Candidate {
    pub fn new(source: &'static str, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            source,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.secret
    }

    pub fn source(&self) -> &'static str {
        self.source
    }
}

/// One link of the resolver chain.
pub trait PassphraseSource {
    fn name(&self) -> &'static str;

    /// `Ok(None)` passes control to the next source.
    fn try_resolve(&self, ctx: &Context, params: &SourceParams) -> Result<Option<Candidate>>;
}

/// Passphrase read from `--keyfile` at startup.
pub struct KeyFileSource;

impl PassphraseSource for KeyFileSource {
    fn name(&self) -> &'static str {
        "keyfile"
    }

    fn try_resolve(&self, ctx: &Context, _params: &SourceParams) -> Result<Option<Candidate>> {
        Ok(ctx
            .key_from_file()
            .filter(|k| !k.is_empty())
            .map(|k| Candidate::new(self.name(), k.as_bytes())))
    }
}

/// Literal passphrase passed in the parameters.
pub struct ParamSource;

impl PassphraseSource for ParamSource {
    fn name(&self) -> &'static str {
        "parameter"
    }

    fn try_resolve(&self, _ctx: &Context, params: &SourceParams) -> Result<Option<Candidate>> {
        Ok(params
            .get(PASSPHRASE_KEY)
            .filter(|p| !p.is_empty())
            .map(|p| Candidate::new(self.name(), p.as_bytes())))
    }
}

/// Passphrase printed by an external command.
pub struct CommandSource;

impl PassphraseSource for CommandSource {
    fn name(&self) -> &'static str {
        "command"
    }

    fn try_resolve(&self, ctx: &Context, params: &SourceParams) -> Result<Option<Candidate>> {
        let Some(cmd) = params.get(PASSPHRASE_CMD_KEY).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(ctx.settings.passphrase_cmd_timeout_secs);
        let passphrase = run_passphrase_cmd(cmd, timeout)?;
        Ok(Some(Candidate::new(self.name(), passphrase.as_bytes())))
    }
}

/// Passphrase from an environment variable.
pub struct EnvSource {
    var: &'static str,
}

impl EnvSource {
    pub fn new(var: &'static str) -> Self {
        Self { var }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(PASSPHRASE_ENV)
    }
}

impl PassphraseSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn try_resolve(&self, _ctx: &Context, _params: &SourceParams) -> Result<Option<Candidate>> {
        Ok(std::env::var(self.var)
            .ok()
            .filter(|p| !p.is_empty())
            .map(|p| Candidate::new(self.name(), p)))
    }
}

/// Ordered chain of passphrase sources.
pub struct Resolver {
    sources: Vec<Box<dyn PassphraseSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Box<dyn PassphraseSource>>) -> Self {
        Self { sources }
    }

    /// Try every source in order; stop at the first candidate or error.
    pub fn resolve(&self, ctx: &Context, params: &SourceParams) -> Result<Option<Candidate>> {
        for source in &self.sources {
            if let Some(candidate) = source.try_resolve(ctx, params)? {
                tracing::debug!(source = candidate.source(), "passphrase candidate found");
                return Ok(Some(candidate));
            }
        }
        tracing::debug!("no non-interactive passphrase source available");
        Ok(None)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(KeyFileSource),
            Box::new(ParamSource),
            Box::new(CommandSource),
            Box::new(EnvSource::default()),
        ])
    }
}

// ---------------------------------------------------------------------------
// Passphrase command
// ---------------------------------------------------------------------------

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", cmd]);
        c
    } else {
        let mut c = Command::new("/bin/sh");
        c.args(["-c", cmd]);
        c
    }
}

/// Run `cmd` through the shell and return its single line of output.
///
/// Stdout is drained on a separate thread so a child writing more than a
/// pipe buffer never blocks. One deadline covers both the shell exiting and
/// its stdout closing; a background process holding the pipe open counts
/// against it too. The shell is killed if it outlives `timeout`.
pub fn run_passphrase_cmd(cmd: &str, timeout: Duration) -> Result<Zeroizing<String>> {
    let deadline = Instant::now() + timeout;

    let mut child = shell_command(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| KapsulError::PassphraseCommandFailed(format!("cannot start: {e}")))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| KapsulError::PassphraseCommandFailed("stdout not captured".into()))?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Zeroizing::new(Vec::new());
        let result = stdout.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the deadline passed.
        let _ = tx.send(result);
    });

    let status = wait_until(&mut child, deadline, timeout)?;

    // The reader thread stays detached on expiry: a grandchild may still
    // hold the pipe open.
    let output = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(read) => {
            read.map_err(|e| KapsulError::PassphraseCommandFailed(format!("reading output: {e}")))?
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!("passphrase command left its output open past the timeout");
            return Err(KapsulError::PassphraseCommandTimeout(timeout.as_secs()));
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(KapsulError::PassphraseCommandFailed(
                "output reader panicked".into(),
            ))
        }
    };

    if !status.success() {
        return Err(KapsulError::PassphraseCommandFailed(status.to_string()));
    }

    single_line(&output)
}

fn wait_until(
    child: &mut std::process::Child,
    deadline: Instant,
    timeout: Duration,
) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(KapsulError::PassphraseCommandTimeout(timeout.as_secs()));
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Exactly one line, or the output is ambiguous.
fn single_line(output: &[u8]) -> Result<Zeroizing<String>> {
    let text = std::str::from_utf8(output).map_err(|_| {
        KapsulError::PassphraseCommandFailed("output is not valid UTF-8".into())
    })?;

    let mut lines = text.lines();
    let count = text.lines().count();
    match (lines.next(), count) {
        (Some(line), 1) if line.is_empty() => Err(KapsulError::PassphraseCommandFailed(
            "printed an empty passphrase".into(),
        )),
        (Some(line), 1) => Ok(Zeroizing::new(line.to_string())),
        _ => Err(KapsulError::AmbiguousPassphrase(count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> Context {
        Context::new(PathBuf::from("/"))
    }

    #[test]
    fn single_line_accepts_one_line_with_or_without_newline() {
        assert_eq!(single_line(b"mysecret\n").unwrap().as_str(), "mysecret");
        assert_eq!(single_line(b"mysecret").unwrap().as_str(), "mysecret");
        assert_eq!(single_line(b"mysecret\r\n").unwrap().as_str(), "mysecret");
    }

    #[test]
    fn single_line_rejects_zero_lines() {
        assert!(matches!(
            single_line(b""),
            Err(KapsulError::AmbiguousPassphrase(0))
        ));
    }

    #[test]
    fn single_line_rejects_many_lines() {
        assert!(matches!(
            single_line(b"a\nb\n"),
            Err(KapsulError::AmbiguousPassphrase(2))
        ));
        assert!(matches!(
            single_line(b"same\nsame\nsame"),
            Err(KapsulError::AmbiguousPassphrase(3))
        ));
    }

    #[test]
    fn single_line_rejects_blank_line() {
        assert!(matches!(
            single_line(b"\n"),
            Err(KapsulError::PassphraseCommandFailed(_))
        ));
    }

    #[test]
    fn keyfile_beats_parameter() {
        let mut ctx = ctx();
        ctx.set_key_from_file(Zeroizing::new("from-file".into()));
        let params = SourceParams::from([(PASSPHRASE_KEY.to_string(), "from-param".to_string())]);

        let candidate = Resolver::default().resolve(&ctx, &params).unwrap().unwrap();
        assert_eq!(candidate.as_bytes(), b"from-file");
        assert_eq!(candidate.source(), "keyfile");
    }

    #[test]
    fn parameter_beats_command() {
        let params = SourceParams::from([
            (PASSPHRASE_KEY.to_string(), "from-param".to_string()),
            (PASSPHRASE_CMD_KEY.to_string(), "exit 1".to_string()),
        ]);
        let candidate = Resolver::default().resolve(&ctx(), &params).unwrap().unwrap();
        assert_eq!(candidate.as_bytes(), b"from-param");
    }

    #[test]
    fn empty_parameter_falls_through() {
        let params = SourceParams::from([(PASSPHRASE_KEY.to_string(), String::new())]);
        assert!(ParamSource.try_resolve(&ctx(), &params).unwrap().is_none());
    }

    #[test]
    fn env_source_reads_its_variable() {
        let var = "KAPSUL_TEST_ENV_SOURCE_ONLY";
        std::env::set_var(var, "from-env");
        let candidate = EnvSource::new(var)
            .try_resolve(&ctx(), &SourceParams::new())
            .unwrap()
            .unwrap();
        std::env::remove_var(var);
        assert_eq!(candidate.as_bytes(), b"from-env");
    }

    #[test]
    fn nothing_configured_is_none_not_error() {
        let resolver = Resolver::new(vec![
            Box::new(KeyFileSource),
            Box::new(ParamSource),
            Box::new(CommandSource),
            Box::new(EnvSource::new("KAPSUL_TEST_UNSET_VARIABLE")),
        ]);
        assert!(resolver
            .resolve(&ctx(), &SourceParams::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn source_params_carry_settings_command() {
        let settings = Settings {
            passphrase_cmd: Some("pass show kapsul".into()),
            ..Settings::default()
        };
        let params = source_params(&settings);
        assert_eq!(
            params.get(PASSPHRASE_CMD_KEY).map(String::as_str),
            Some("pass show kapsul")
        );
        assert!(source_params(&Settings::default()).is_empty());
    }

    #[cfg(unix)]
    mod command {
        use super::super::*;

        const TIMEOUT: Duration = Duration::from_secs(10);

        #[test]
        fn one_line_is_the_passphrase() {
            let pass = run_passphrase_cmd("echo mysecret", TIMEOUT).unwrap();
            assert_eq!(pass.as_str(), "mysecret");
        }

        #[test]
        fn no_output_is_ambiguous() {
            assert!(matches!(
                run_passphrase_cmd("true", TIMEOUT),
                Err(KapsulError::AmbiguousPassphrase(0))
            ));
        }

        #[test]
        fn two_lines_are_ambiguous() {
            assert!(matches!(
                run_passphrase_cmd("printf 'a\\nb\\n'", TIMEOUT),
                Err(KapsulError::AmbiguousPassphrase(2))
            ));
        }

        #[test]
        fn non_zero_exit_is_an_error() {
            assert!(matches!(
                run_passphrase_cmd("echo secret; exit 3", TIMEOUT),
                Err(KapsulError::PassphraseCommandFailed(_))
            ));
        }

        #[test]
        fn large_output_is_drained() {
            // Well past a pipe buffer; must not deadlock.
            let result = run_passphrase_cmd("yes x | head -n 200000", TIMEOUT);
            assert!(matches!(
                result,
                Err(KapsulError::AmbiguousPassphrase(200_000))
            ));
        }

        #[test]
        fn hung_command_times_out() {
            let result = run_passphrase_cmd("exec sleep 30", Duration::from_millis(200));
            assert!(matches!(
                result,
                Err(KapsulError::PassphraseCommandTimeout(_))
            ));
        }

        #[test]
        fn background_child_holding_stdout_times_out() {
            let started = Instant::now();
            let result = run_passphrase_cmd("echo pw; (sleep 6 &)", Duration::from_millis(500));
            assert!(matches!(
                result,
                Err(KapsulError::PassphraseCommandTimeout(_))
            ));
            assert!(started.elapsed() < Duration::from_secs(3));
        }
    }
}
