//! Line-oriented stdio protocol between the prep package manager and its plugins.
//!
//! A plugin is a short-lived process that runs exactly one lifecycle hook:
//!
//! ```text
//! <COMMAND>            LOAD | BUILD | INSTALL | REMOVE | RESOLVE (any case)
//! <positional lines>   BUILD: package, version, source, build, install, options
//!                      INSTALL: package, version, repository
//!                      RESOLVE: path, location
//! <KEY=VALUE>*
//! END
//! ```
//!
//! and answers with `RETURN  <value>` / `ECHO  <value>` lines on stdout.
//! The exit status is 0 when the hook succeeded and 1 otherwise.
//!
//! The plugin side is [`Plugin`] plus the [`Session`] handed to each hook.
//! The host side is [`PluginHost`], which spawns a plugin described by its
//! [`PluginManifest`] and collects its frames.

pub mod env;
pub mod error;
pub mod hooks;
pub mod host;
pub mod manifest;
pub mod output;
pub mod params;
mod plugin;
pub mod reader;
mod session;

pub use env::{EnvBlock, END_SENTINEL};
pub use error::{DecodeError, HookError, HookResult, ProtocolError};
pub use hooks::{HookFn, HookKind, Hooks};
pub use host::{HookOutcome, HookRequest, PluginHost, PluginHostError};
pub use manifest::{ManifestError, PluginKind, PluginManifest, MANIFEST_FILE};
pub use output::{Frame, OutputWriter};
pub use params::{BuildParams, InstallParams, PackageIdentity, Params, ResolverParams};
pub use plugin::Plugin;
pub use reader::LineReader;
pub use session::Session;
