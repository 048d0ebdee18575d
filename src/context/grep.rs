use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use crate::context::ContextRetriever;
use crate::error::{AppError, Result};
use crate::model::Message;

const MAX_KEYWORDS: usize = 8;

/// Words that say nothing about where the relevant code lives.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "because", "been", "before", "being", "case", "code",
    "codebase", "comments", "could", "description", "does", "doesn", "error", "expected",
    "following", "from", "have", "help", "instead", "issue", "issues", "just", "like", "more",
    "need", "please", "reported", "should", "some", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "title", "user", "when", "where", "which", "while", "will",
    "with", "would", "your",
];

/// Local fallback retriever: greps the checkout for identifiers from the query.
pub struct GrepContextRetriever {
    root: PathBuf,
    max_results: usize,
}

impl GrepContextRetriever {
    pub fn new(root: &Path, max_results: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            max_results,
        }
    }
}

/// Pull identifier-like words out of free text, most specific first.
fn keywords(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words: Vec<String> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.len() >= 4)
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect();

    // Snake_case, camelCase and digits mark code identifiers; rank those first.
    let specificity = |w: &String| {
        let inner_upper = w.chars().skip(1).any(char::is_uppercase);
        let marked = w.contains('_') || inner_upper || w.chars().any(|c| c.is_ascii_digit());
        std::cmp::Reverse(marked)
    };
    words.sort_by_key(specificity);
    words.truncate(MAX_KEYWORDS);
    words
}

#[async_trait]
impl ContextRetriever for GrepContextRetriever {
    async fn retrieve(&self, query: &str, _prior: &[Message]) -> Result<String> {
        let words = keywords(query);
        if words.is_empty() {
            return Ok("No searchable identifiers found in the issue.".to_string());
        }

        let mut args = vec![
            "-rnF".to_string(),
            "--max-count=5".to_string(),
            // Exclude common non-code directories
            "--exclude-dir=.git".to_string(),
            "--exclude-dir=node_modules".to_string(),
            "--exclude-dir=target".to_string(),
            "--exclude-dir=.venv".to_string(),
            "--exclude-dir=vendor".to_string(),
        ];
        for word in &words {
            args.push("-e".to_string());
            args.push(word.clone());
        }
        args.push(".".to_string());

        let output = tokio::process::Command::new("grep")
            .args(&args)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        // grep exits 1 for "no match", 2 for real failures.
        if output.status.code() == Some(2) {
            return Err(AppError::Collaborator(format!(
                "grep failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let header = format!("Keyword search for: {}", words.join(", "));

        if stdout.trim().is_empty() {
            return Ok(format!("{header}\n\nNo matches found"));
        }

        let total_lines = stdout.lines().count();
        let result = stdout
            .lines()
            .take(self.max_results)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(keywords = ?words, matches = total_lines, "Grep context search");

        if total_lines > self.max_results {
            Ok(format!(
                "{header}\n\n{result}\n\n... ({} more matches truncated)",
                total_lines - self.max_results
            ))
        } else {
            Ok(format!("{header}\n\n{result}"))
        }
    }
}
