use crate::env::EnvBlock;
use crate::error::{DecodeError, ProtocolError};
use crate::output::OutputWriter;
use crate::params::{BuildParams, InstallParams, Params, ResolverParams};
use crate::reader::LineReader;
use std::io::{BufRead, Write};

/// The host connection handed to a hook: the rest of the input stream and
/// the frame writer.
pub struct Session<'io> {
    reader: LineReader<&'io mut dyn BufRead>,
    writer: OutputWriter<&'io mut dyn Write>,
}

impl<'io> Session<'io> {
    pub fn new(input: &'io mut dyn BufRead, output: &'io mut dyn Write) -> Self {
        Self {
            reader: LineReader::new(input),
            writer: OutputWriter::new(output),
        }
    }

    pub fn read_line(&mut self) -> Result<String, ProtocolError> {
        self.reader.read_line()
    }

    /// Direct access to the stream, for decoding without touching the
    /// process environment (`BuildParams::decode(session.reader())`).
    pub fn reader(&mut self) -> &mut LineReader<&'io mut dyn BufRead> {
        &mut self.reader
    }

    /// Reads an environment block and applies it to the process environment.
    pub fn read_env_vars(&mut self) -> Result<EnvBlock, ProtocolError> {
        let mut env = EnvBlock::new();
        let result = env.read_from(&mut self.reader);
        env.apply();
        result.map(|()| env)
    }

    pub fn read_build(&mut self) -> Result<BuildParams, DecodeError<BuildParams>> {
        self.read_params()
    }

    pub fn read_install(&mut self) -> Result<InstallParams, DecodeError<InstallParams>> {
        self.read_params()
    }

    pub fn read_resolver(&mut self) -> Result<ResolverParams, DecodeError<ResolverParams>> {
        self.read_params()
    }

    /// Decodes a block and applies its environment, including the
    /// assignments read before a failure.
    fn read_params<P: Params>(&mut self) -> Result<P, DecodeError<P>> {
        let result = P::decode(&mut self.reader);
        match &result {
            Ok(params) => params.env().apply(),
            Err(err) => err.partial.env().apply(),
        }
        result
    }

    pub fn write_return(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.writer.write_return(value)
    }

    pub fn write_echo(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.writer.write_echo(value)
    }
}
