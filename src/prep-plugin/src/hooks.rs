use crate::error::{HookResult, ProtocolError};
use crate::session::Session;
use std::fmt;
use std::str::FromStr;

/// Lifecycle hooks a plugin can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Load,
    Build,
    Install,
    Remove,
    Resolve,
}

impl HookKind {
    pub const ALL: [HookKind; 5] = [
        HookKind::Load,
        HookKind::Build,
        HookKind::Install,
        HookKind::Remove,
        HookKind::Resolve,
    ];

    /// Command token as the host sends it.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Load => "load",
            HookKind::Build => "build",
            HookKind::Install => "install",
            HookKind::Remove => "remove",
            HookKind::Resolve => "resolve",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = ProtocolError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.to_uppercase().as_str() {
            "LOAD" => Ok(HookKind::Load),
            "BUILD" => Ok(HookKind::Build),
            "INSTALL" => Ok(HookKind::Install),
            "REMOVE" => Ok(HookKind::Remove),
            "RESOLVE" => Ok(HookKind::Resolve),
            _ => Err(ProtocolError::UnknownHook(token.to_string())),
        }
    }
}

pub type HookFn = Box<dyn FnMut(&mut Session<'_>) -> HookResult>;

/// One handler per hook. Slots that are never set succeed without doing anything.
pub struct Hooks {
    load: HookFn,
    build: HookFn,
    install: HookFn,
    remove: HookFn,
    resolve: HookFn,
}

impl Hooks {
    pub fn set(&mut self, kind: HookKind, hook: HookFn) {
        *self.slot(kind) = hook;
    }

    pub(crate) fn slot(&mut self, kind: HookKind) -> &mut HookFn {
        match kind {
            HookKind::Load => &mut self.load,
            HookKind::Build => &mut self.build,
            HookKind::Install => &mut self.install,
            HookKind::Remove => &mut self.remove,
            HookKind::Resolve => &mut self.resolve,
        }
    }
}

fn noop() -> HookFn {
    Box::new(|_| Ok(()))
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            load: noop(),
            build: noop(),
            install: noop(),
            remove: noop(),
            resolve: noop(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
