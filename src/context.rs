//! Context documents for learning tasks
//!
//! A context document is a markdown file picked by keyword match against the
//! task text. Rules are tried in order; the first rule with a matching
//! keyword whose file exists wins.

use crate::config::ContextRuleConfig;
use crate::todoist::Task;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One keyword → file mapping
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRule {
    pub file: String,
    pub keywords: Vec<String>,
}

impl ContextRule {
    pub fn new<I, S>(file: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file: file.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

impl From<&ContextRuleConfig> for ContextRule {
    fn from(config: &ContextRuleConfig) -> Self {
        ContextRule::new(config.file.clone(), config.keywords.iter().cloned())
    }
}

/// Built-in keyword table, in priority order
pub fn default_rules() -> Vec<ContextRule> {
    vec![
        ContextRule::new(
            "meal_planning.md",
            ["meal planning", "meal prep", "grocery", "cooking", "recipe"],
        ),
        ContextRule::new(
            "learning.md",
            ["learning", "study", "course", "tutorial", "education"],
        ),
    ]
}

/// A loaded context document
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDocument {
    pub path: PathBuf,
    pub content: String,
}

impl ContextDocument {
    /// `meal_planning.md` → `Meal Planning`
    pub fn title(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("context");

        stem.split(['_', '-'])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    /// Block injected into learning prompts
    pub fn format_for_prompt(&self) -> String {
        format!(
            "\n## {} Context\n\nThe following context information is available for this task:\n\n{}\n\n---\n\nUse the above context to inform your response and keep continuity with past work on similar tasks.\n",
            self.title(),
            self.content.trim()
        )
    }
}

/// Directory of context documents plus the rules that select them
#[derive(Debug, Clone)]
pub struct ContextLibrary {
    dir: PathBuf,
    rules: Vec<ContextRule>,
}

impl ContextLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_rules(dir, default_rules())
    }

    pub fn with_rules(dir: impl Into<PathBuf>, rules: Vec<ContextRule>) -> Self {
        Self {
            dir: dir.into(),
            rules,
        }
    }

    /// Configured rules replace the built-in table when present
    pub fn from_config(dir: impl Into<PathBuf>, configured: &[ContextRuleConfig]) -> Self {
        if configured.is_empty() {
            Self::new(dir)
        } else {
            Self::with_rules(dir, configured.iter().map(ContextRule::from).collect())
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn rules(&self) -> &[ContextRule] {
        &self.rules
    }

    /// Lowercased `content + " " + description`
    pub fn search_text(task: &Task) -> String {
        format!("{} {}", task.content, task.description).to_lowercase()
    }

    /// First matching rule whose file exists
    pub fn find(&self, task: &Task) -> Option<PathBuf> {
        let text = Self::search_text(task);
        self.rules
            .iter()
            .filter(|rule| rule.matches(&text))
            .map(|rule| self.dir.join(&rule.file))
            .find(|path| path.is_file())
    }

    /// Find and read the context document for a task
    pub async fn load_for_task(&self, task: &Task) -> Option<ContextDocument> {
        let path = self.find(task)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!(task_id = %task.id, path = %path.display(), "Loaded context document");
                Some(ContextDocument { path, content })
            }
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to read context document, continuing without it"
                );
                None
            }
        }
    }

    /// Markdown documents present in the directory, sorted by name
    pub fn available(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_markdown = path.extension().is_some_and(|ext| ext == "md");
            let is_readme = path.file_name().is_some_and(|name| name == "README.md");
            if path.is_file() && is_markdown && !is_readme {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library_with(files: &[&str]) -> (TempDir, ContextLibrary) {
        let dir = TempDir::new().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), format!("notes for {file}")).unwrap();
        }
        let library = ContextLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn test_keyword_match_on_content_and_description() {
        let (_dir, library) = library_with(&["learning.md"]);

        let task = Task::new("T2", "Learn LangGraph").with_description("study agent patterns");
        assert_eq!(
            library.find(&task).unwrap().file_name().unwrap(),
            "learning.md"
        );

        assert!(library.find(&Task::new("T1", "Buy milk")).is_none());
    }

    #[test]
    fn test_tie_break_prefers_first_rule_in_order() {
        let (_dir, library) = library_with(&["meal_planning.md", "learning.md"]);
        let task = Task::new("T5", "Study a cooking course");

        assert_eq!(
            library.find(&task).unwrap().file_name().unwrap(),
            "meal_planning.md"
        );
    }

    #[test]
    fn test_tie_break_skips_rules_without_files() {
        let (_dir, library) = library_with(&["learning.md"]);
        let task = Task::new("T5", "Study a cooking course");

        assert_eq!(
            library.find(&task).unwrap().file_name().unwrap(),
            "learning.md"
        );
    }

    #[test]
    fn test_configured_rules_replace_defaults() {
        let (dir, _) = library_with(&["fitness.md", "learning.md"]);
        let library = ContextLibrary::from_config(
            dir.path(),
            &[ContextRuleConfig {
                file: "fitness.md".to_string(),
                keywords: vec!["Workout".to_string()],
            }],
        );

        assert!(library.find(&Task::new("a", "Morning workout")).is_some());
        assert!(library.find(&Task::new("b", "Study Rust")).is_none());
    }

    #[test]
    fn test_title_and_prompt_format() {
        let doc = ContextDocument {
            path: PathBuf::from("contexts/meal_planning.md"),
            content: "Vegetarian on weekdays\n".to_string(),
        };
        assert_eq!(doc.title(), "Meal Planning");
        let block = doc.format_for_prompt();
        assert!(block.contains("## Meal Planning Context"));
        assert!(block.contains("Vegetarian on weekdays"));
    }

    #[test]
    fn test_available_lists_markdown_only() {
        let (dir, library) = library_with(&["learning.md", "README.md"]);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = library.available().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("learning.md"));

        let missing = ContextLibrary::new(dir.path().join("nope"));
        assert!(missing.available().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_for_task_reads_document() {
        let (_dir, library) = library_with(&["learning.md"]);
        let doc = library
            .load_for_task(&Task::new("T2", "Learning Rust"))
            .await
            .unwrap();
        assert_eq!(doc.content, "notes for learning.md");
    }
}
