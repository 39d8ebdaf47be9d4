use crate::error::{HookResult, ProtocolError};
use crate::hooks::{HookKind, Hooks};
use crate::session::Session;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

/// A plugin executable: hook handlers plus the one-command dispatch loop.
///
/// ```rust,ignore
/// use prep_plugin::Plugin;
///
/// fn main() -> std::process::ExitCode {
///     Plugin::new()
///         .on_build(|session| {
///             let params = session.read_build()?;
///             session.write_return(&params.install_path)?;
///             Ok(())
///         })
///         .run()
/// }
/// ```
#[derive(Debug, Default)]
pub struct Plugin {
    hooks: Hooks,
}

impl Plugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_load<F>(self, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.with_hook(HookKind::Load, hook)
    }

    pub fn on_build<F>(self, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.with_hook(HookKind::Build, hook)
    }

    pub fn on_install<F>(self, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.with_hook(HookKind::Install, hook)
    }

    pub fn on_remove<F>(self, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.with_hook(HookKind::Remove, hook)
    }

    pub fn on_resolve<F>(self, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.with_hook(HookKind::Resolve, hook)
    }

    pub fn with_hook<F>(mut self, kind: HookKind, hook: F) -> Self
    where
        F: FnMut(&mut Session<'_>) -> HookResult + 'static,
    {
        self.hooks.set(kind, Box::new(hook));
        self
    }

    /// Reads one command from `input` and runs the matching hook.
    ///
    /// Exactly one hook runs per call. A failed command read or an unknown
    /// token returns before any hook is invoked.
    pub fn execute<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        mut output: W,
    ) -> Result<HookKind, ProtocolError> {
        let mut session = Session::new(&mut input, &mut output);
        let command = session.read_line()?;
        let kind: HookKind = command.parse()?;

        tracing::debug!(hook = %kind, "dispatching command");
        let hook = self.hooks.slot(kind);
        hook(&mut session).map_err(|source| ProtocolError::Hook { hook: kind, source })?;
        Ok(kind)
    }

    /// Runs one command against stdin/stdout. Exit status is 0 when the hook
    /// succeeded and 1 for any error.
    pub fn run(mut self) -> ExitCode {
        let stdin = io::stdin();
        let stdout = io::stdout();
        match self.execute(stdin.lock(), stdout.lock()) {
            Ok(kind) => {
                tracing::debug!(hook = %kind, "command finished");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, "plugin command failed");
                ExitCode::FAILURE
            }
        }
    }
}
