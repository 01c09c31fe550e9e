use anyhow::{Context, Result};
use interview_core::{QuestionList, parse_questions};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Loads the interview script. An empty script is an error.
pub fn load_questions(path: &Path) -> Result<QuestionList> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions file: {}", path.display()))?;
    let questions = parse_questions(&content)
        .with_context(|| format!("Failed to parse questions file: {}", path.display()))?;
    if questions.is_empty() {
        anyhow::bail!("Questions file {} contains no questions", path.display());
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_keys_by_file_stem() -> Result<()> {
        // Arrange: markdown prompts plus files that must be ignored.
        let dir = tempdir()?;
        let dir_path = dir.path();
        let mut persona = File::create(dir_path.join("persona.md"))?;
        writeln!(persona, "You are Sam, a hiring manager.")?;
        let mut advance = File::create(dir_path.join("advance.md"))?;
        writeln!(advance, "Lead into {{question}}")?;
        let mut ignored = File::create(dir_path.join("notes.txt"))?;
        writeln!(ignored, "not a prompt")?;
        std::fs::create_dir(dir_path.join("drafts"))?;

        // Act
        let prompts = load_prompts(dir_path)?;

        // Assert
        assert_eq!(prompts.len(), 2, "Should only load .md files");
        assert_eq!(prompts.get("persona").unwrap(), "You are Sam, a hiring manager.\n");
        assert_eq!(prompts.get("advance").unwrap(), "Lead into {question}\n");
        assert!(prompts.get("notes").is_none());
        Ok(())
    }

    #[test]
    fn test_load_prompts_missing_dir_fails() {
        let result = load_prompts(Path::new("/path/that/does/not/exist"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_questions_accepts_both_shapes() -> Result<()> {
        let dir = tempdir()?;
        let plain = dir.path().join("plain.json");
        fs::write(&plain, r#"["Tell me about yourself.", "Why this team?"]"#)?;
        let wrapped = dir.path().join("wrapped.json");
        fs::write(&wrapped, r#"{"questions": ["Describe a hard bug."]}"#)?;

        assert_eq!(load_questions(&plain)?.len(), 2);
        assert_eq!(&load_questions(&wrapped)?[0], "Describe a hard bug.");
        Ok(())
    }

    #[test]
    fn test_load_questions_rejects_empty_script() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]")?;

        assert!(load_questions(&path).is_err());
        Ok(())
    }
}
