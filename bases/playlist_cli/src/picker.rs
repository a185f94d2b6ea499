// bases/playlist_cli/src/picker.rs
use async_trait::async_trait;
use playlist_pipeline::DirectoryPicker;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks for the output directory on the terminal
pub struct PromptDirectoryPicker;

#[async_trait]
impl DirectoryPicker for PromptDirectoryPicker {
    async fn pick_directory(&self) -> Option<PathBuf> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"Where should the files go? (empty to cancel): ")
            .await
            .ok()?;
        stderr.flush().await.ok()?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .ok()?;

        expand_answer(&line)
    }
}

/// Trimmed answer with a leading `~` expanded; `None` when empty
fn expand_answer(line: &str) -> Option<PathBuf> {
    let answer = line.trim();
    if answer.is_empty() {
        return None;
    }

    match answer.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(answer)),
    }
}
