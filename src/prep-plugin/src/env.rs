use crate::error::ProtocolError;
use crate::reader::LineReader;
use std::io::BufRead;

/// Terminator of an environment block, matched case-insensitively.
pub const END_SENTINEL: &str = "END";

/// Ordered `KEY=VALUE` assignments read from (or sent as) an environment block.
///
/// Reading a block never touches the process environment; [`EnvBlock::apply`]
/// is the only step that does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvBlock {
    vars: Vec<(String, String)>,
}

impl EnvBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes lines up to and including the `END` sentinel.
    ///
    /// Assignments read before a failure stay in `self`. A sentinel on an
    /// unterminated last line still counts as a failed read.
    pub fn read_from<R: BufRead>(&mut self, reader: &mut LineReader<R>) -> Result<(), ProtocolError> {
        loop {
            let line = reader.read_line()?;
            if line.eq_ignore_ascii_case(END_SENTINEL) {
                return Ok(());
            }
            if !self.assign(&line) {
                tracing::debug!(line = %line, "ignoring malformed environment line");
            }
        }
    }

    /// Records `line` if it is a single `KEY=VALUE` pair. Returns whether it was kept.
    ///
    /// Lines with no `=` or more than one are skipped, as are pairs the
    /// platform cannot store (empty key, NUL bytes).
    pub fn assign(&mut self, line: &str) -> bool {
        let mut parts = line.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || key.contains('\0') || value.contains('\0') {
            return false;
        }
        self.vars.push((key.to_string(), value.to_string()));
        true
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.push((key.into(), value.into()));
    }

    /// Last value assigned to `key`, matching what `apply` leaves in the environment.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Sets every assignment in the process environment, in order.
    ///
    /// Variables stay set for the rest of the process and are inherited by
    /// any child the hook spawns.
    pub fn apply(&self) {
        for (key, value) in &self.vars {
            tracing::trace!(key = %key, "setting environment variable");
            std::env::set_var(key, value);
        }
    }

    /// Wire lines for the host side, without the terminator.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.vars.iter().map(|(k, v)| format!("{k}={v}"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvBlock {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_block(input: &str) -> (EnvBlock, Result<(), ProtocolError>) {
        let mut reader = LineReader::new(Cursor::new(input.to_string()));
        let mut env = EnvBlock::new();
        let result = env.read_from(&mut reader);
        (env, result)
    }

    #[test]
    fn trims_keys_and_values() {
        let (env, result) = read_block("a=1\nb = 2\nEND\n");
        result.unwrap();
        assert_eq!(env.get("a"), Some("1"));
        assert_eq!(env.get("b"), Some("2"));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn skips_malformed_lines_without_failing() {
        let (env, result) = read_block("malformed\na=b=c\n=orphan\nok=yes\nEND\n");
        result.unwrap();
        assert_eq!(env.iter().collect::<Vec<_>>(), vec![("ok", "yes")]);
    }

    #[test]
    fn sentinel_is_case_insensitive() {
        for sentinel in ["END", "end", "End", "  eNd  "] {
            let input = format!("k=v\n{sentinel}\nNEXT\n");
            let mut reader = LineReader::new(Cursor::new(input));
            let mut env = EnvBlock::new();
            env.read_from(&mut reader).unwrap();
            assert_eq!(env.get("k"), Some("v"));
            assert_eq!(reader.read_line().unwrap(), "NEXT");
        }
    }

    #[test]
    fn eof_before_sentinel_keeps_earlier_assignments() {
        let (env, result) = read_block("a=1\nb=2\n");
        assert!(result.unwrap_err().is_eof());
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn unterminated_sentinel_is_still_eof() {
        let (_, result) = read_block("a=1\nEND");
        assert!(matches!(
            result,
            Err(ProtocolError::UnexpectedEof { ref partial }) if partial == "END"
        ));
    }

    #[test]
    fn later_assignment_wins() {
        let env: EnvBlock = [("k", "1"), ("k", "2")].into_iter().collect();
        assert_eq!(env.get("k"), Some("2"));
    }

    #[test]
    fn apply_sets_process_environment() {
        let env: EnvBlock = [("PREP_ENV_TEST_APPLY", "applied")].into_iter().collect();
        env.apply();
        assert_eq!(
            std::env::var("PREP_ENV_TEST_APPLY").as_deref(),
            Ok("applied")
        );
    }

    #[test]
    fn lines_render_assignments() {
        let env: EnvBlock = [("CC", "clang"), ("JOBS", "4")].into_iter().collect();
        assert_eq!(env.lines().collect::<Vec<_>>(), vec!["CC=clang", "JOBS=4"]);
    }
}
