//! Host side of the protocol: runs a plugin executable for one hook and
//! interprets its frames.

use crate::env::END_SENTINEL;
use crate::hooks::HookKind;
use crate::manifest::{ManifestError, PluginKind, PluginManifest};
use crate::output::Frame;
use crate::params::{BuildParams, InstallParams, Params, ResolverParams};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors from plugin host operations.
#[derive(Debug, Error)]
pub enum PluginHostError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("plugin {name} is disabled")]
    Disabled { name: String },
    #[error("plugin {name} has no usable executable")]
    NotExecutable { name: String },
    #[error("{kind} plugin {name} does not handle the {hook} hook")]
    UnsupportedHook {
        name: String,
        kind: PluginKind,
        hook: HookKind,
    },
    #[error("failed to spawn plugin process: {0}")]
    SpawnFailed(std::io::Error),
    #[error("plugin process has no stdin")]
    NoStdin,
    #[error("plugin process has no stdout")]
    NoStdout,
    #[error("failed to write to plugin: {0}")]
    WriteError(std::io::Error),
    #[error("failed to read from plugin: {0}")]
    ReadError(std::io::Error),
    #[error("failed to forward plugin output: {0}")]
    EchoError(std::io::Error),
    #[error("failed to wait for plugin: {0}")]
    WaitFailed(std::io::Error),
    /// A value the plugin could not read back unchanged.
    #[error("cannot send {hook} request: {what} {value:?} {reason}")]
    InvalidRequest {
        hook: HookKind,
        what: String,
        value: String,
        reason: &'static str,
    },
}

/// One hook invocation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookRequest {
    Load,
    Build(BuildParams),
    Install(InstallParams),
    Remove,
    Resolve(ResolverParams),
}

impl HookRequest {
    pub fn kind(&self) -> HookKind {
        match self {
            HookRequest::Load => HookKind::Load,
            HookRequest::Build(_) => HookKind::Build,
            HookRequest::Install(_) => HookKind::Install,
            HookRequest::Remove => HookKind::Remove,
            HookRequest::Resolve(_) => HookKind::Resolve,
        }
    }

    /// Every line sent to the plugin: the command token, then the parameter block.
    /// Hooks without parameters still get a closing `END`.
    ///
    /// Fails with [`PluginHostError::InvalidRequest`] for values that would
    /// shift the positional lines or be dropped from the environment block.
    /// Surrounding whitespace is not significant: the plugin trims every line.
    pub fn encode(&self) -> Result<Vec<String>, PluginHostError> {
        let hook = self.kind();
        let mut lines = vec![hook.as_str().to_string()];
        match self {
            HookRequest::Load | HookRequest::Remove => lines.push(END_SENTINEL.to_string()),
            HookRequest::Build(params) => lines.extend(checked_block(hook, params)?),
            HookRequest::Install(params) => lines.extend(checked_block(hook, params)?),
            HookRequest::Resolve(params) => lines.extend(checked_block(hook, params)?),
        }
        Ok(lines)
    }
}

fn checked_block<P: Params>(hook: HookKind, params: &P) -> Result<Vec<String>, PluginHostError> {
    let invalid = |what: &str, value: &str, reason| PluginHostError::InvalidRequest {
        hook,
        what: what.to_string(),
        value: value.to_string(),
        reason,
    };

    for (name, value) in P::FIELD_NAMES.iter().zip(params.fields()) {
        if has_line_break(value) {
            return Err(invalid(name, value, "contains a line break"));
        }
    }
    for (key, value) in params.env().iter() {
        for (what, text) in [("environment key", key), ("environment value", value)] {
            if has_line_break(text) {
                return Err(invalid(what, text, "contains a line break"));
            }
            if text.contains('=') {
                return Err(invalid(what, text, "contains '='"));
            }
            if text.contains('\0') {
                return Err(invalid(what, text, "contains a NUL byte"));
            }
        }
        if key.trim().is_empty() {
            return Err(invalid("environment key", key, "is empty"));
        }
    }
    Ok(params.encode())
}

fn has_line_break(text: &str) -> bool {
    text.contains(|c: char| c == '\n' || c == '\r')
}

/// Result of running one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    /// `None` when the plugin was killed by a signal.
    pub exit_code: Option<i32>,
    /// Values of `RETURN` frames, in order.
    pub returns: Vec<String>,
}

impl HookOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Collects return values and forwards echoes to the host's output.
struct Interpreter<'a> {
    verbose: bool,
    echo: &'a mut dyn Write,
    returns: Vec<String>,
}

impl<'a> Interpreter<'a> {
    fn new(verbose: bool, echo: &'a mut dyn Write) -> Self {
        Self {
            verbose,
            echo,
            returns: Vec::new(),
        }
    }

    fn interpret(&mut self, line: &str) -> std::io::Result<()> {
        match Frame::parse(line) {
            Frame::Return(value) => {
                self.returns.push(value.to_string());
                Ok(())
            }
            Frame::Echo(value) => writeln!(self.echo, "{value}"),
            Frame::Other(text) if self.verbose => writeln!(self.echo, "{text}"),
            Frame::Other(_) => Ok(()),
        }
    }
}

/// A plugin installed in its own directory.
#[derive(Debug, Clone)]
pub struct PluginHost {
    name: String,
    base_path: PathBuf,
    manifest: PluginManifest,
    verbose: bool,
}

impl PluginHost {
    /// Loads the plugin in `dir`; the plugin is named after the directory.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, PluginHostError> {
        let base_path = dir.into();
        let manifest = PluginManifest::load(&base_path)?;
        let name = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_path.display().to_string());
        Ok(Self::new(name, base_path, manifest))
    }

    pub fn new(name: impl Into<String>, base_path: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            manifest,
            verbose: false,
        }
    }

    /// Forward output lines that are not frames.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn executable_path(&self) -> Option<PathBuf> {
        self.manifest.executable_path(&self.base_path)
    }

    /// Whether the executable exists and may be run.
    pub fn is_valid(&self) -> bool {
        self.executable_path().is_some_and(|path| is_executable(&path))
    }

    /// Runs `request` in a fresh plugin process.
    ///
    /// Echo values (and, in verbose mode, any other output) are written to
    /// `echo` as they arrive. A non-zero plugin exit is reported in the
    /// outcome, not as an error.
    pub fn execute(
        &self,
        request: &HookRequest,
        echo: &mut dyn Write,
    ) -> Result<HookOutcome, PluginHostError> {
        let hook = request.kind();
        if !self.manifest.enabled {
            return Err(PluginHostError::Disabled {
                name: self.name.clone(),
            });
        }
        if !self.manifest.kind.supports(hook) {
            return Err(PluginHostError::UnsupportedHook {
                name: self.name.clone(),
                kind: self.manifest.kind,
                hook,
            });
        }
        let executable = self
            .executable_path()
            .filter(|path| is_executable(path))
            .ok_or_else(|| PluginHostError::NotExecutable {
                name: self.name.clone(),
            })?;

        let mut header = request.encode()?.join("\n");
        header.push('\n');

        tracing::debug!(plugin = %self.name, hook = %hook, "executing plugin hook");

        let mut child = Command::new(&executable)
            .current_dir(&self.base_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(PluginHostError::SpawnFailed)?;

        let mut stdin = child.stdin.take().ok_or(PluginHostError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(PluginHostError::NoStdout)?;

        match stdin.write_all(header.as_bytes()).and_then(|()| stdin.flush()) {
            Ok(()) => {}
            // The plugin may exit without reading every line it was sent.
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!(plugin = %self.name, "plugin closed stdin early");
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PluginHostError::WriteError(err));
            }
        }
        drop(stdin);

        let mut interpreter = Interpreter::new(self.verbose, echo);
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        loop {
            line.clear();
            let read = match reader.read_line(&mut line) {
                Ok(read) => read,
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PluginHostError::ReadError(err));
                }
            };
            if read == 0 {
                break;
            }
            if let Err(err) =
                interpreter.interpret(line.trim_end_matches(|c: char| c == '\r' || c == '\n'))
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PluginHostError::EchoError(err));
            }
        }

        let status = child.wait().map_err(PluginHostError::WaitFailed)?;
        let outcome = HookOutcome {
            exit_code: status.code(),
            returns: interpreter.returns,
        };
        tracing::info!(
            plugin = %self.name,
            hook = %hook,
            exit_code = ?outcome.exit_code,
            returns = outcome.returns.len(),
            "plugin hook finished"
        );
        Ok(outcome)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvBlock;
    use crate::params::PackageIdentity;
    use crate::reader::LineReader;
    use std::io::Cursor;

    /// Reads encoded lines back the way a plugin does.
    fn decode_request(lines: &[String]) -> HookRequest {
        let wire = format!("{}\n", lines.join("\n"));
        let mut reader = LineReader::new(Cursor::new(wire));
        let kind: HookKind = reader.read_line().unwrap().parse().unwrap();
        match kind {
            HookKind::Load => HookRequest::Load,
            HookKind::Remove => HookRequest::Remove,
            HookKind::Build => HookRequest::Build(BuildParams::decode(&mut reader).unwrap()),
            HookKind::Install => HookRequest::Install(InstallParams::decode(&mut reader).unwrap()),
            HookKind::Resolve => HookRequest::Resolve(ResolverParams::decode(&mut reader).unwrap()),
        }
    }

    fn invalid_what(request: &HookRequest) -> String {
        match request.encode() {
            Err(PluginHostError::InvalidRequest { what, .. }) => what,
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    fn build_request() -> HookRequest {
        HookRequest::Build(BuildParams {
            identity: PackageIdentity {
                package: "zlib".into(),
                version: "1.3".into(),
            },
            source_path: "/src".into(),
            build_path: "/build".into(),
            install_path: "/install".into(),
            build_opts: "--shared".into(),
            env: [("CC", "cc")].into_iter().collect::<EnvBlock>(),
        })
    }

    #[test]
    fn encodes_command_then_block() {
        assert_eq!(
            build_request().encode().unwrap(),
            vec!["build", "zlib", "1.3", "/src", "/build", "/install", "--shared", "CC=cc", "END"]
        );
        assert_eq!(HookRequest::Remove.encode().unwrap(), vec!["remove", "END"]);
        let resolve = HookRequest::Resolve(ResolverParams {
            path: "vendor".into(),
            location: "git:zlib".into(),
            env: EnvBlock::new(),
        });
        assert_eq!(
            resolve.encode().unwrap(),
            vec!["resolve", "vendor", "git:zlib", "END"]
        );
    }

    #[test]
    fn requests_decode_back_unchanged() {
        let requests = [
            HookRequest::Load,
            HookRequest::Remove,
            HookRequest::Build(BuildParams {
                identity: PackageIdentity {
                    package: "zlib".into(),
                    version: "1.3".into(),
                },
                source_path: "/src/zlib".into(),
                build_path: "/build/zlib".into(),
                install_path: "/opt/zlib".into(),
                build_opts: "-O2 -g".into(),
                env: [("CC", "clang"), ("CFLAGS", "-Wall -Wextra")]
                    .into_iter()
                    .collect(),
            }),
            HookRequest::Install(InstallParams {
                identity: PackageIdentity {
                    package: "zlib".into(),
                    version: String::new(),
                },
                repository: "https://example.org/zlib.git?ref=v1.3".into(),
                env: [("PREFIX", "/opt")].into_iter().collect(),
            }),
            HookRequest::Resolve(ResolverParams {
                path: "vendor/zlib".into(),
                location: "github:madler/zlib".into(),
                env: EnvBlock::new(),
            }),
        ];

        for request in requests {
            let lines = request.encode().unwrap();
            assert_eq!(decode_request(&lines), request);
        }
    }

    #[test]
    fn line_breaks_in_fields_are_rejected() {
        let install = HookRequest::Install(InstallParams {
            identity: PackageIdentity {
                package: "zlib\nevil".into(),
                version: "1.3".into(),
            },
            repository: "repo".into(),
            env: EnvBlock::new(),
        });
        assert_eq!(invalid_what(&install), "package");

        let HookRequest::Build(mut params) = build_request() else {
            unreachable!()
        };
        params.build_path = "/build\r".into();
        assert_eq!(invalid_what(&HookRequest::Build(params)), "build path");
    }

    #[test]
    fn env_assignments_must_survive_decoding() {
        let resolve = |key: &str, value: &str| {
            let mut env = EnvBlock::new();
            env.insert(key, value);
            HookRequest::Resolve(ResolverParams {
                path: "vendor".into(),
                location: "remote".into(),
                env,
            })
        };

        assert_eq!(invalid_what(&resolve("CFLAGS", "-DX=1")), "environment value");
        assert_eq!(invalid_what(&resolve("A=B", "1")), "environment key");
        assert_eq!(invalid_what(&resolve("PATH", "/bin\n/usr/bin")), "environment value");
        assert_eq!(invalid_what(&resolve("  ", "1")), "environment key");
    }

    #[test]
    #[cfg(unix)]
    fn invalid_request_is_rejected_before_spawning() {
        let manifest = PluginManifest {
            kind: PluginKind::Resolver,
            version: "1.0".into(),
            enabled: true,
            executable: Some("/bin/sh".into()),
        };
        let host = PluginHost::new("git", "/", manifest);
        let mut env = EnvBlock::new();
        env.insert("CFLAGS", "-DX=1");
        let request = HookRequest::Resolve(ResolverParams {
            path: "vendor".into(),
            location: "remote".into(),
            env,
        });
        let err = host.execute(&request, &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, PluginHostError::InvalidRequest { .. }));
    }

    #[test]
    fn interpreter_splits_returns_and_echoes() {
        let mut echoed = Vec::new();
        let mut interpreter = Interpreter::new(false, &mut echoed);
        for line in ["ECHO  configuring", "make[1]: entering", "RETURN  /install", "return  second"] {
            interpreter.interpret(line).unwrap();
        }
        let returns = interpreter.returns;
        assert_eq!(returns, vec!["/install", "second"]);
        assert_eq!(String::from_utf8(echoed).unwrap(), "configuring\n");
    }

    #[test]
    fn verbose_interpreter_forwards_other_lines() {
        let mut echoed = Vec::new();
        let mut interpreter = Interpreter::new(true, &mut echoed);
        interpreter.interpret("make[1]: entering").unwrap();
        interpreter.interpret("ECHO  done").unwrap();
        drop(interpreter);
        assert_eq!(String::from_utf8(echoed).unwrap(), "make[1]: entering\ndone\n");
    }

    #[test]
    fn disabled_plugin_refuses_hooks() {
        let manifest = PluginManifest {
            kind: PluginKind::Build,
            version: "1.0".into(),
            enabled: false,
            executable: Some("run.sh".into()),
        };
        let host = PluginHost::new("make", "/nonexistent", manifest);
        let err = host.execute(&HookRequest::Load, &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, PluginHostError::Disabled { .. }));
    }

    #[test]
    fn hook_must_match_plugin_kind() {
        let manifest = PluginManifest {
            kind: PluginKind::Resolver,
            version: "1.0".into(),
            enabled: true,
            executable: Some("run.sh".into()),
        };
        let host = PluginHost::new("git", "/nonexistent", manifest);
        let err = host.execute(&build_request(), &mut std::io::sink()).unwrap_err();
        assert!(matches!(
            err,
            PluginHostError::UnsupportedHook {
                hook: HookKind::Build,
                ..
            }
        ));
    }

    #[test]
    fn missing_executable_is_rejected() {
        let manifest = PluginManifest {
            kind: PluginKind::Build,
            version: "1.0".into(),
            enabled: true,
            executable: Some("run.sh".into()),
        };
        let host = PluginHost::new("make", "/nonexistent", manifest);
        assert!(!host.is_valid());
        let err = host.execute(&HookRequest::Load, &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, PluginHostError::NotExecutable { .. }));
    }

    #[cfg(unix)]
    fn install_script_plugin(kind: &str, script: &str) -> tempfile::TempDir {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let manifest = format!(r#"{{"type":"{kind}","version":"1.0.0","executable":"plugin.sh"}}"#);
        std::fs::write(dir.path().join(crate::manifest::MANIFEST_FILE), manifest).unwrap();
        let exe = dir.path().join("plugin.sh");
        std::fs::write(&exe, script).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    #[test]
    #[cfg(unix)]
    fn runs_build_hook_through_script() {
        let dir = install_script_plugin(
            "build",
            r#"#!/bin/sh
read cmd
read pkg; read ver; read src; read bld; read inst; read opts
while read line; do
    [ "$line" = "END" ] && break
    echo "ECHO  env $line"
done
echo "compiling in $(pwd)"
echo "RETURN  $cmd:$pkg-$ver:$opts"
"#,
        );

        let host = PluginHost::load(dir.path()).unwrap();
        assert!(host.is_valid());
        let mut echoed = Vec::new();
        let outcome = host.execute(&build_request(), &mut echoed).unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.returns, vec!["build:zlib-1.3:--shared"]);
        assert_eq!(String::from_utf8(echoed).unwrap(), "env CC=cc\n");
    }

    #[test]
    #[cfg(unix)]
    fn reports_plugin_exit_code() {
        let dir = install_script_plugin("internal", "#!/bin/sh\nread cmd\nexit 1\n");
        let manifest = PluginManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.kind, PluginKind::Internal);

        let host = PluginHost::load(dir.path()).unwrap();
        let outcome = host.execute(&HookRequest::Load, &mut std::io::sink()).unwrap();
        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.success());
        assert!(outcome.returns.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn echo_failure_stops_the_plugin() {
        struct ClosedOutput;
        impl Write for ClosedOutput {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dir = install_script_plugin(
            "internal",
            "#!/bin/sh\nread cmd\necho \"ECHO  started\"\nexec sleep 30\n",
        );
        let host = PluginHost::load(dir.path()).unwrap();

        let started = std::time::Instant::now();
        let err = host
            .execute(&HookRequest::Load, &mut ClosedOutput)
            .unwrap_err();
        assert!(matches!(err, PluginHostError::EchoError(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }
}
