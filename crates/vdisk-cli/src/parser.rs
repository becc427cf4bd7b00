//! Command-line grammar: whitespace-separated tokens, `-key=value` flags
//! with optional double quotes around the value, `#` comments, one command
//! per line.

use anyhow::{anyhow, bail, Result};

/// A tokenized command line before typed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub name: String,
    flags: Vec<(String, Option<String>)>,
}

/// Splits a line into a command name and its flags. Returns `None` for
/// blank lines and pure comments.
pub fn tokenize(line: &str) -> Result<Option<RawCommand>> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        bail!("unterminated quote");
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Ok(None);
    }

    let name = tokens[0].to_ascii_lowercase();
    let mut flags = Vec::new();
    for token in &tokens[1..] {
        let body = token
            .strip_prefix('-')
            .ok_or_else(|| anyhow!("expected a -flag, found '{token}'"))?;
        match body.split_once('=') {
            Some((key, value)) => {
                flags.push((key.to_ascii_lowercase(), Some(value.to_string())))
            }
            None => flags.push((body.to_ascii_lowercase(), None)),
        }
    }
    Ok(Some(RawCommand { name, flags }))
}

impl RawCommand {
    /// Removes and returns the value of `key`, if present.
    pub fn take(&mut self, key: &str) -> Result<Option<String>> {
        match self.flags.iter().position(|(k, _)| k == key) {
            Some(index) => {
                let (_, value) = self.flags.remove(index);
                value
                    .map(Some)
                    .ok_or_else(|| anyhow!("flag -{key} requires a value"))
            }
            None => Ok(None),
        }
    }

    pub fn require(&mut self, key: &str) -> Result<String> {
        self.take(key)?
            .ok_or_else(|| anyhow!("missing required flag -{key}"))
    }

    /// Removes a boolean flag (`-p`, `-r`), present with or without value.
    pub fn flag(&mut self, key: &str) -> bool {
        match self.flags.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.flags.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every `file<N>` flag, returning the paths ordered by the
    /// numeric suffix.
    pub fn take_numbered_files(&mut self) -> Result<Vec<String>> {
        let mut numbered: Vec<(u32, String)> = Vec::new();
        let mut remaining = Vec::new();
        for (key, value) in self.flags.drain(..) {
            if let Some(suffix) = key.strip_prefix("file") {
                let index: u32 = suffix
                    .parse()
                    .map_err(|_| anyhow!("bad file flag -{key}"))?;
                let value = value.ok_or_else(|| anyhow!("flag -{key} requires a value"))?;
                numbered.push((index, value));
            } else {
                remaining.push((key, value));
            }
        }
        self.flags = remaining;
        numbered.sort_by_key(|(index, _)| *index);
        Ok(numbered.into_iter().map(|(_, path)| path).collect())
    }

    /// Fails when flags the command does not know are left over.
    pub fn finish(self) -> Result<()> {
        if let Some((key, _)) = self.flags.first() {
            bail!("unknown flag -{key} for command '{}'", self.name);
        }
        Ok(())
    }

    pub fn parse_i64(&mut self, key: &str) -> Result<Option<i64>> {
        self.take(key)?
            .map(|v| v.parse::<i64>().map_err(|_| anyhow!("-{key} must be an integer, got '{v}'")))
            .transpose()
    }

    pub fn require_i64(&mut self, key: &str) -> Result<i64> {
        self.parse_i64(key)?
            .ok_or_else(|| anyhow!("missing required flag -{key}"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tokenizes_flags_and_comments() {
        let raw = tokenize("mkdisk -size=10 -unit=M -path=/tmp/d.img # trailing")
            .unwrap()
            .unwrap();
        assert_eq!(raw.name, "mkdisk");
        let mut raw = raw;
        assert_eq!(raw.require("size").unwrap(), "10");
        assert_eq!(raw.require("unit").unwrap(), "M");
        assert_eq!(raw.require("path").unwrap(), "/tmp/d.img");
        raw.finish().unwrap();
    }

    #[test]
    fn blank_and_comment_lines_are_none() {
        assert_eq!(tokenize("").unwrap(), None);
        assert_eq!(tokenize("   ").unwrap(), None);
        assert_eq!(tokenize("# full line comment").unwrap(), None);
    }

    #[test]
    fn quoted_values_keep_spaces_and_hashes() {
        let mut raw = tokenize(r#"mkfile -path="/my docs/a.txt" -cont="hello # world""#)
            .unwrap()
            .unwrap();
        assert_eq!(raw.require("path").unwrap(), "/my docs/a.txt");
        assert_eq!(raw.require("cont").unwrap(), "hello # world");
    }

    #[test]
    fn boolean_flags() {
        let mut raw = tokenize("mkdir -p -path=/a/b").unwrap().unwrap();
        assert!(raw.flag("p"));
        assert!(!raw.flag("p"));
        assert_eq!(raw.require("path").unwrap(), "/a/b");
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let mut raw = tokenize("rmdisk -path=/d.img -bogus=1").unwrap().unwrap();
        raw.require("path").unwrap();
        assert!(raw.finish().is_err());
    }

    #[test]
    fn numbered_files_sort_by_suffix() {
        let mut raw = tokenize("cat -file2=/b.txt -file10=/c.txt -file1=/a.txt")
            .unwrap()
            .unwrap();
        assert_eq!(
            raw.take_numbered_files().unwrap(),
            ["/a.txt", "/b.txt", "/c.txt"]
        );
    }

    #[test]
    fn missing_value_and_bad_numbers_fail() {
        let mut raw = tokenize("fdisk -size -path=/d.img").unwrap().unwrap();
        assert!(raw.take("size").is_err());
        let mut raw = tokenize("fdisk -size=abc").unwrap().unwrap();
        assert!(raw.require_i64("size").is_err());
    }

    #[test]
    fn case_insensitive_names_and_keys() {
        let mut raw = tokenize("MkDisk -SIZE=5 -Path=/d.img").unwrap().unwrap();
        assert_eq!(raw.name, "mkdisk");
        assert_eq!(raw.require("size").unwrap(), "5");
        assert_eq!(raw.require("path").unwrap(), "/d.img");
    }
}
