use crate::traits::ChatMessage;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const NOTES_MAX_CHARS: usize = 20_000;
const FILE_LIST_MAX: usize = 200;

const ROLE: &str = "## Role

You are a medical data analysis assistant specializing in Doppler ultrasound studies. \
You answer questions about tabular files of Doppler study records (patients, study dates, \
study types, results and findings) using the tools provided.";

const INSTRUCTIONS: &str = "## Instructions

1. Explore the data structure first (read_structure) so you use exact column names.
2. Use query_rows to filter and count, column_values to list or deduplicate a column.
3. Base every answer on the tool results; never invent figures.
4. When you compute statistics or aggregations, explain the method briefly.
5. Say which data you analysed (e.g. \"Based on the 150 records in estudios.csv...\").
6. If a tool reports an error, correct the arguments and try again.
7. Answer in the language of the question.

Treat all data as confidential medical information. Focus on data analysis, not medical advice.";

/// Builds the system prompt that opens every conversation.
pub struct ContextBuilder {
    pub notes_file: Option<PathBuf>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self { notes_file: None }
    }

    /// Markdown file with notes about the dataset (column meanings, period
    /// covered, ...) appended to the prompt when present.
    pub fn with_notes_file(mut self, path: impl AsRef<Path>) -> Self {
        self.notes_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build_system_prompt(&self, files: &[String]) -> String {
        let mut parts = vec![ROLE.to_string(), self.get_files_context(files)];

        if let Some(notes) = self.load_notes() {
            parts.push(notes);
        }

        parts.push(INSTRUCTIONS.to_string());
        parts.push(self.get_runtime_context());

        parts.join("\n\n---\n\n")
    }

    pub fn build_system_message(&self, files: &[String]) -> ChatMessage {
        ChatMessage::system(self.build_system_prompt(files))
    }

    fn get_files_context(&self, files: &[String]) -> String {
        let mut context = String::from("## Available Files\n\n");
        if files.is_empty() {
            context.push_str("No data files are currently available.");
            return context;
        }

        for file in files.iter().take(FILE_LIST_MAX) {
            let _ = writeln!(context, "- {}", file);
        }
        if files.len() > FILE_LIST_MAX {
            let _ = writeln!(
                context,
                "- ... and {} more (use list_available_files)",
                files.len() - FILE_LIST_MAX
            );
        }
        context
    }

    fn get_runtime_context(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");
        format!("## Runtime Context\n\n### Current Time\n{}", timestamp)
    }

    fn load_notes(&self) -> Option<String> {
        let path = self.notes_file.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }

        let body = if trimmed.chars().count() > NOTES_MAX_CHARS {
            let truncated: String = trimmed.chars().take(NOTES_MAX_CHARS).collect();
            format!("{}\n\n[... truncated at {} chars]", truncated, NOTES_MAX_CHARS)
        } else {
            trimmed.to_string()
        };

        Some(format!("## Dataset Notes\n\n{}", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prompt_lists_available_files() {
        let prompt = ContextBuilder::new()
            .build_system_prompt(&["estudios_julio.csv".into(), "estudios_agosto.csv".into()]);
        assert!(prompt.contains("- estudios_julio.csv"));
        assert!(prompt.contains("- estudios_agosto.csv"));
        assert!(prompt.contains("Doppler"));
    }

    #[test]
    fn prompt_mentions_missing_data() {
        let prompt = ContextBuilder::new().build_system_prompt(&[]);
        assert!(prompt.contains("No data files are currently available."));
    }

    #[test]
    fn notes_file_is_included_when_present() {
        let tmp = TempDir::new().unwrap();
        let notes = tmp.path().join("NOTES.md");
        std::fs::write(&notes, "Datos de julio y agosto de 2025.").unwrap();

        let prompt = ContextBuilder::new()
            .with_notes_file(&notes)
            .build_system_prompt(&[]);
        assert!(prompt.contains("## Dataset Notes"));
        assert!(prompt.contains("julio y agosto"));

        let without = ContextBuilder::new()
            .with_notes_file(tmp.path().join("absent.md"))
            .build_system_prompt(&[]);
        assert!(!without.contains("## Dataset Notes"));
    }
}
