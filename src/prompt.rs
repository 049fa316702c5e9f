//! Prompt assembly for edit commentary.
//!
//! The tone of the commentary comes from two free-text settings,
//! `personality` and `conciseness`, configured in `[prompt]`. Everything else
//! is taken from the [`EditReport`]. Empty sections are left out so the
//! model is not asked about diffs that do not exist.

use crate::tracker::EditReport;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PERSONALITY: &str = "You are a sharp, friendly senior engineer pair-programming with the author. \
     Notice what they are trying to do, point out bugs or risky patterns early, and say so plainly when the change looks good.";

pub const DEFAULT_CONCISENESS: &str =
    "Answer in two or three sentences. No preamble, no restating the code, no bullet lists.";

/// Tone settings for the commentary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStyle {
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_conciseness")]
    pub conciseness: String,
}

fn default_personality() -> String {
    DEFAULT_PERSONALITY.to_string()
}

fn default_conciseness() -> String {
    DEFAULT_CONCISENESS.to_string()
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self {
            personality: default_personality(),
            conciseness: default_conciseness(),
        }
    }
}

/// Build the full prompt for one reported edit.
pub fn build_prompt(report: &EditReport, style: &PromptStyle) -> String {
    let mut prompt = String::new();

    prompt.push_str(style.personality.trim());
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "The author just saved `{}`. Comment on what they changed.\n",
        report.display_path
    ));
    prompt.push_str(style.conciseness.trim());
    prompt.push_str("\n\n");

    if !report.recent_changes.trim().is_empty() {
        prompt.push_str("## Recent changes (oldest first)\n\n");
        prompt.push_str(&fenced(&report.recent_changes, ""));
    }

    if !report.local_diff.trim().is_empty() {
        prompt.push_str("## Lines added since the last look\n\n");
        prompt.push_str(&fenced(&report.local_diff, "diff"));
    }

    if !report.git_diff.trim().is_empty() {
        prompt.push_str("## Diff against the last commit\n\n");
        prompt.push_str(&fenced(&report.git_diff, "diff"));
    }

    prompt.push_str(&format!("## Current contents of `{}`\n\n", report.display_path));
    prompt.push_str(&fenced(&report.content, language_hint(&report.display_path)));

    prompt
}

fn fenced(body: &str, lang: &str) -> String {
    let body = body.trim_end_matches('\n');
    format!("```{}\n{}\n```\n\n", lang, body)
}

/// Fence language from the file extension, empty when unknown.
fn language_hint(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") | Some("mjs") | Some("cjs") => "javascript",
        Some("ts") | Some("tsx") => "typescript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        Some("rb") => "ruby",
        Some("sh") => "bash",
        Some("toml") => "toml",
        Some("md") => "markdown",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> EditReport {
        EditReport {
            path: PathBuf::from("/work/src/lib.rs"),
            display_path: "src/lib.rs".to_string(),
            content: "fn a() {}\nfn b() {}\n".to_string(),
            recent_changes: "fn b() {}".to_string(),
            local_diff: "+ fn b() {}".to_string(),
            git_diff: String::new(),
        }
    }

    #[test]
    fn test_prompt_includes_style_and_sections() {
        let style = PromptStyle {
            personality: "Be a pirate.".to_string(),
            conciseness: "One line.".to_string(),
        };
        let prompt = build_prompt(&report(), &style);

        assert!(prompt.starts_with("Be a pirate."));
        assert!(prompt.contains("One line."));
        assert!(prompt.contains("`src/lib.rs`"));
        assert!(prompt.contains("## Recent changes (oldest first)\n\n```\nfn b() {}\n```"));
        assert!(prompt.contains("```diff\n+ fn b() {}\n```"));
        assert!(prompt.contains("```rust\nfn a() {}\nfn b() {}\n```"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut report = report();
        report.recent_changes.clear();
        let prompt = build_prompt(&report, &PromptStyle::default());

        assert!(!prompt.contains("Recent changes"));
        assert!(!prompt.contains("last commit"));
        assert!(prompt.contains("Lines added since the last look"));
    }

    #[test]
    fn test_git_diff_section_when_present() {
        let mut report = report();
        report.git_diff = "@@ -1 +1,2 @@\n fn a() {}\n+fn b() {}\n".to_string();
        let prompt = build_prompt(&report, &PromptStyle::default());
        assert!(prompt.contains("## Diff against the last commit"));
        assert!(prompt.contains("+fn b() {}\n```"));
    }

    #[test]
    fn test_language_hint() {
        assert_eq!(language_hint("src/main.rs"), "rust");
        assert_eq!(language_hint("web/app.tsx"), "typescript");
        assert_eq!(language_hint("Makefile"), "");
    }

    #[test]
    fn test_style_defaults_fill_missing_fields() {
        let style: PromptStyle = toml::from_str("personality = \"Grumpy.\"").unwrap();
        assert_eq!(style.personality, "Grumpy.");
        assert_eq!(style.conciseness, DEFAULT_CONCISENESS);
    }
}
