//! Reference plugin: echoes decoded parameters back to the host.
//!
//! `remove` is left unset and falls back to the no-op hook.

use prep_core::{init_logging, AppDirs, LoggingConfig};
use prep_plugin::{EnvBlock, HookResult, Plugin, Session};
use std::process::ExitCode;

fn main() -> ExitCode {
    let _logging = AppDirs::discover()
        .ok()
        .and_then(|dirs| init_logging(&LoggingConfig::default(), &dirs).ok());

    Plugin::new()
        .on_load(load)
        .on_build(build)
        .on_install(install)
        .on_resolve(resolve)
        .run()
}

fn load(session: &mut Session<'_>) -> HookResult {
    session.write_echo("echo plugin loaded")?;
    Ok(())
}

fn build(session: &mut Session<'_>) -> HookResult {
    let params = session.read_build()?;
    tracing::info!(package = %params.identity.package, "build requested");

    session.write_echo(&format!(
        "package {} {}",
        params.identity.package, params.identity.version
    ))?;
    session.write_echo(&format!("source {}", params.source_path))?;
    session.write_echo(&format!("build {}", params.build_path))?;
    session.write_echo(&format!("install {}", params.install_path))?;
    session.write_echo(&format!("options {}", params.build_opts))?;
    echo_environment(session, &params.env)?;
    session.write_return(&params.install_path)?;
    Ok(())
}

fn install(session: &mut Session<'_>) -> HookResult {
    let params = session.read_install()?;
    if params.repository.is_empty() {
        return Err(format!("no repository given for {}", params.identity.package).into());
    }

    session.write_echo(&format!(
        "package {} {}",
        params.identity.package, params.identity.version
    ))?;
    session.write_echo(&format!("repository {}", params.repository))?;
    echo_environment(session, &params.env)?;
    session.write_return(&params.repository)?;
    Ok(())
}

fn resolve(session: &mut Session<'_>) -> HookResult {
    let params = session.read_resolver()?;
    session.write_echo(&format!("location {}", params.location))?;
    echo_environment(session, &params.env)?;
    session.write_return(&params.path)?;
    Ok(())
}

/// Reports each assigned variable as the process environment now sees it.
fn echo_environment(session: &mut Session<'_>, env: &EnvBlock) -> HookResult {
    for (key, _) in env.iter() {
        let value = std::env::var(key).unwrap_or_default();
        session.write_echo(&format!("env {key}={value}"))?;
    }
    Ok(())
}
