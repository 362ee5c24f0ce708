//! Where the interactive client gets its command lines from.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

#[async_trait]
pub trait CommandSource: Send {
    /// The next line, or `None` when input is exhausted.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads commands from standard input, printing a prompt before each one.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
    prompt: &'static str,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: "ftp> ",
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandSource for StdinSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(self.prompt.as_bytes()).await?;
        stdout.flush().await?;
        self.lines.next_line().await
    }
}

/// A fixed list of commands, e.g. from a script file.
#[derive(Debug, Default)]
pub struct ScriptSource {
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// One command per line; blank lines and `#` comments are skipped.
    pub fn parse(script: &str) -> Self {
        Self::new(
            script
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub async fn from_file(path: &Path) -> io::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }
}

#[async_trait]
impl CommandSource for ScriptSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_skips_comments_and_blanks() {
        let mut source = ScriptSource::parse("# login\nUSER alice\n\n  PASS secret  \nQUIT\n");
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, ["USER alice", "PASS secret", "QUIT"]);
    }
}
