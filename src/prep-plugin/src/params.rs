//! Fixed-shape parameter blocks that follow the BUILD, INSTALL and RESOLVE commands.
//!
//! Each block is a positional sequence of lines followed by an environment
//! block. The order is part of the host contract and must not change.

use crate::env::{EnvBlock, END_SENTINEL};
use crate::error::{DecodeError, ProtocolError};
use crate::reader::LineReader;
use std::io::BufRead;

/// Package a build or install hook operates on. Content is not validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIdentity {
    pub package: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildParams {
    pub identity: PackageIdentity,
    pub source_path: String,
    pub build_path: String,
    pub install_path: String,
    pub build_opts: String,
    pub env: EnvBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallParams {
    pub identity: PackageIdentity,
    pub repository: String,
    pub env: EnvBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverParams {
    pub path: String,
    pub location: String,
    pub env: EnvBlock,
}

/// A parameter block: positional fields in wire order, then an environment block.
pub trait Params: Default {
    /// Names of the positional fields, parallel to [`Params::fields`].
    const FIELD_NAMES: &'static [&'static str];

    /// Positional fields, in the order they appear on the wire.
    fn fields(&self) -> Vec<&str>;

    fn fields_mut(&mut self) -> Vec<&mut String>;

    fn env(&self) -> &EnvBlock;

    fn env_mut(&mut self) -> &mut EnvBlock;

    /// Reads the block. The first failed read stops decoding; the error
    /// carries whatever was filled in up to that point.
    fn decode<R: BufRead>(reader: &mut LineReader<R>) -> Result<Self, DecodeError<Self>> {
        let mut params = Self::default();
        match decode_into(&mut params, reader) {
            Ok(()) => Ok(params),
            Err(source) => Err(DecodeError {
                partial: params,
                source,
            }),
        }
    }

    /// Wire lines for the host side: fields, env assignments, then `END`.
    ///
    /// Values are written as-is; the host checks them first so they decode
    /// back unchanged.
    fn encode(&self) -> Vec<String> {
        self.fields()
            .into_iter()
            .map(str::to_string)
            .chain(self.env().lines())
            .chain(std::iter::once(END_SENTINEL.to_string()))
            .collect()
    }
}

fn decode_into<P: Params, R: BufRead>(
    params: &mut P,
    reader: &mut LineReader<R>,
) -> Result<(), ProtocolError> {
    for field in params.fields_mut() {
        *field = reader.read_line()?;
    }
    params.env_mut().read_from(reader)
}

impl Params for BuildParams {
    const FIELD_NAMES: &'static [&'static str] = &[
        "package",
        "version",
        "source path",
        "build path",
        "install path",
        "build options",
    ];

    fn fields(&self) -> Vec<&str> {
        vec![
            self.identity.package.as_str(),
            self.identity.version.as_str(),
            self.source_path.as_str(),
            self.build_path.as_str(),
            self.install_path.as_str(),
            self.build_opts.as_str(),
        ]
    }

    fn fields_mut(&mut self) -> Vec<&mut String> {
        vec![
            &mut self.identity.package,
            &mut self.identity.version,
            &mut self.source_path,
            &mut self.build_path,
            &mut self.install_path,
            &mut self.build_opts,
        ]
    }

    fn env(&self) -> &EnvBlock {
        &self.env
    }

    fn env_mut(&mut self) -> &mut EnvBlock {
        &mut self.env
    }
}

impl Params for InstallParams {
    const FIELD_NAMES: &'static [&'static str] = &["package", "version", "repository"];

    fn fields(&self) -> Vec<&str> {
        vec![
            self.identity.package.as_str(),
            self.identity.version.as_str(),
            self.repository.as_str(),
        ]
    }

    fn fields_mut(&mut self) -> Vec<&mut String> {
        vec![
            &mut self.identity.package,
            &mut self.identity.version,
            &mut self.repository,
        ]
    }

    fn env(&self) -> &EnvBlock {
        &self.env
    }

    fn env_mut(&mut self) -> &mut EnvBlock {
        &mut self.env
    }
}

impl Params for ResolverParams {
    const FIELD_NAMES: &'static [&'static str] = &["path", "location"];

    fn fields(&self) -> Vec<&str> {
        vec![self.path.as_str(), self.location.as_str()]
    }

    fn fields_mut(&mut self) -> Vec<&mut String> {
        vec![&mut self.path, &mut self.location]
    }

    fn env(&self) -> &EnvBlock {
        &self.env
    }

    fn env_mut(&mut self) -> &mut EnvBlock {
        &mut self.env
    }
}
