use serde::Deserialize;
use std::sync::Arc;

/// The immutable list of interview questions, shared by every session.
pub type QuestionList = Arc<[String]>;

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Plain(Vec<String>),
    Wrapped { questions: Vec<String> },
}

/// Parses a question file: either a JSON array of strings or an object with a
/// `questions` array. Blank entries are skipped.
pub fn parse_questions(json: &str) -> Result<QuestionList, serde_json::Error> {
    let file: ScriptFile = serde_json::from_str(json)?;
    let questions = match file {
        ScriptFile::Plain(questions) => questions,
        ScriptFile::Wrapped { questions } => questions,
    };
    Ok(questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect())
}

/// A session's position in the question list.
///
/// The cursor points at the question the next reply should move into. It only
/// moves forward, one step per successfully generated reply.
#[derive(Debug, Clone)]
pub struct QuestionScript {
    questions: QuestionList,
    cursor: usize,
}

impl QuestionScript {
    pub fn new(questions: QuestionList) -> Self {
        Self {
            questions,
            cursor: 0,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.questions.get(self.cursor).map(String::as_str)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.questions.len()
    }

    pub fn remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.cursor)
    }

    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(questions: &[&str]) -> QuestionScript {
        QuestionScript::new(questions.iter().map(|q| q.to_string()).collect())
    }

    #[test]
    fn test_cursor_advances_one_step_and_saturates() {
        let mut script = script(&["Tell me about yourself.", "Why this role?"]);
        assert_eq!(script.current(), Some("Tell me about yourself."));

        script.advance();
        assert_eq!(script.cursor(), 1);
        assert_eq!(script.current(), Some("Why this role?"));
        assert_eq!(script.remaining(), 1);

        script.advance();
        script.advance();
        assert_eq!(script.cursor(), 2);
        assert!(script.is_exhausted());
        assert_eq!(script.current(), None);
    }

    #[test]
    fn test_parse_plain_array() {
        let questions = parse_questions(r#"["First?", "  ", "Second?"]"#).unwrap();
        assert_eq!(&*questions, &["First?".to_string(), "Second?".to_string()]);
    }

    #[test]
    fn test_parse_wrapped_object() {
        let questions = parse_questions(r#"{"questions": ["Only one?"]}"#).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_questions(r#"{"items": []}"#).is_err());
    }
}
