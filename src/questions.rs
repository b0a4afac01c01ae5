use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;

use crate::error::QuestionBankError;

static BANK_DIR: Dir = include_dir!("src/bank");

/// Parts that ship with a question table.
pub const AVAILABLE_PARTS: [u8; 4] = [1, 2, 3, 5];

/// A single prompt, identified by its position within its part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub part: u8,
    pub position: usize,
    pub text: String,
}

impl Question {
    /// 1-based number as shown to the user.
    pub fn number(&self) -> usize {
        self.position + 1
    }
}

#[derive(Deserialize, Debug)]
struct PartTable {
    part: u8,
    name: String,
    questions: Vec<String>,
}

/// The fixed, ordered prompt sequence for one test part.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pub part: u8,
    pub name: String,
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn for_part(part: u8) -> Result<Self, QuestionBankError> {
        let file = BANK_DIR
            .get_file(format!("part{part}.json"))
            .ok_or(QuestionBankError::UnknownPart(part))?;

        let contents = file
            .contents_utf8()
            .ok_or(QuestionBankError::UnknownPart(part))?;

        let table: PartTable =
            from_str(contents).map_err(|source| QuestionBankError::Malformed { part, source })?;

        Ok(Self::from_prompts(table.part, table.name, table.questions))
    }

    /// Build a bank from arbitrary prompts, mostly useful for tests.
    pub fn from_prompts<I, S>(part: u8, name: impl Into<String>, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let questions = prompts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Question {
                part,
                position,
                text: text.into(),
            })
            .collect();

        Self {
            part,
            name: name.into(),
            questions,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_available_part_loads() {
        for part in AVAILABLE_PARTS {
            let bank = QuestionBank::for_part(part).unwrap();
            assert_eq!(bank.part, part);
            assert!(!bank.is_empty());
            assert!(!bank.name.is_empty());
        }
    }

    #[test]
    fn test_composite_set_has_five_questions_in_order() {
        let bank = QuestionBank::for_part(5).unwrap();

        assert_eq!(bank.len(), 5);
        assert_eq!(
            bank.questions()[0].text,
            "Can you tell me about your hobbies?"
        );
        assert_eq!(
            bank.questions()[4].text,
            "How do you usually spend your weekends?"
        );
        for (idx, q) in bank.questions().iter().enumerate() {
            assert_eq!(q.position, idx);
            assert_eq!(q.number(), idx + 1);
            assert_eq!(q.part, 5);
        }
    }

    #[test]
    fn test_unknown_part_is_an_error() {
        let err = QuestionBank::for_part(4).unwrap_err();
        assert!(matches!(err, QuestionBankError::UnknownPart(4)));
    }

    #[test]
    fn test_from_prompts_assigns_positions() {
        let bank = QuestionBank::from_prompts(9, "custom", ["a?", "b?"]);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions()[1].position, 1);
        assert_eq!(bank.questions()[1].text, "b?");
    }
}
