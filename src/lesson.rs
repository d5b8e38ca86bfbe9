//! Generated lesson content: scripts, summaries, exam questions

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Language policy for a lesson
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TeachingMode {
    /// English first, then a short Arabic explanation ("sandwich method")
    #[default]
    Arabic,
    /// English only
    English,
}

impl fmt::Display for TeachingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arabic => f.write_str("arabic"),
            Self::English => f.write_str("english"),
        }
    }
}

impl FromStr for TeachingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arabic" | "ar" => Ok(Self::Arabic),
            "english" | "en" => Ok(Self::English),
            other => Err(Error::Config(format!("unknown teaching mode: {other}"))),
        }
    }
}

/// Kind of lesson step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    WarmUp,
    Vocabulary,
    Pronunciation,
    Phonics,
    Song,
    Activity,
    Revision,
    Exercise,
    #[serde(other)]
    Other,
}

/// One step of a generated lesson script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// What the student sees
    pub content: String,
    /// What the student should do
    pub instruction: String,
    /// What Miss Nour says aloud
    pub audio_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_question: Option<bool>,
    /// Only present on exercises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl TeachingStep {
    /// Whether this is a book exercise answered through the live microphone
    #[must_use]
    pub fn is_exercise(&self) -> bool {
        self.kind == StepKind::Exercise
    }
}

/// End-of-lesson summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    #[serde(default)]
    pub vocabulary_learned: Vec<String>,
    #[serde(default)]
    pub home_activity: String,
    #[serde(default)]
    pub encouragement: String,
}

/// Exam skill area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillType {
    Reading,
    Writing,
    Listening,
    Speaking,
    #[serde(other)]
    Other,
}

/// One exam question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub skill: SkillType,
    pub question: String,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl ExamQuestion {
    /// Grade an answer against the key
    ///
    /// Returns `None` when the question has no answer key.
    #[must_use]
    pub fn check(&self, answer: &str) -> Option<bool> {
        self.correct_answer
            .as_deref()
            .map(|key| normalize_answer(key) == normalize_answer(answer))
    }
}

/// Case-fold, trim, and drop trailing punctuation
fn normalize_answer(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a structured generation payload
///
/// Missing, empty, or malformed payloads yield `T::default()` instead of an
/// error.
#[must_use]
pub fn parse_structured<T>(payload: Option<&str>, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(text) = payload.map(str::trim).filter(|t| !t.is_empty()) else {
        tracing::warn!(what, "empty generation payload");
        return T::default();
    };

    serde_json::from_str(text).unwrap_or_else(|e| {
        tracing::warn!(what, error = %e, "unparseable generation payload");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_step_with_optional_fields() {
        let json = r#"[{"type":"exercise","content":"Q1","instruction":"Say it","audioText":"Read Q1","isQuestion":true,"correctAnswer":"yes"}]"#;
        let steps: Vec<TeachingStep> = parse_structured(Some(json), "script");

        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_exercise());
        assert_eq!(steps[0].correct_answer.as_deref(), Some("yes"));
    }

    #[test]
    fn unknown_step_kind_is_other() {
        let json = r#"[{"type":"book exercises","content":"c","instruction":"i","audioText":"a"}]"#;
        let steps: Vec<TeachingStep> = parse_structured(Some(json), "script");
        assert_eq!(steps[0].kind, StepKind::Other);
    }

    #[test]
    fn warm_up_is_kebab_case() {
        let json = r#"[{"type":"warm-up","content":"c","instruction":"i","audioText":"a"}]"#;
        let steps: Vec<TeachingStep> = parse_structured(Some(json), "script");
        assert_eq!(steps[0].kind, StepKind::WarmUp);
    }

    #[test]
    fn malformed_payload_is_empty() {
        let steps: Vec<TeachingStep> = parse_structured(Some("Sorry, I can't do that"), "script");
        assert!(steps.is_empty());

        let summary: LessonSummary = parse_structured(None, "summary");
        assert_eq!(summary, LessonSummary::default());

        let exam: Vec<ExamQuestion> = parse_structured(Some("   "), "exam");
        assert!(exam.is_empty());
    }

    #[test]
    fn summary_tolerates_missing_fields() {
        let summary: LessonSummary =
            parse_structured(Some(r#"{"encouragement":"Well done!"}"#), "summary");
        assert_eq!(summary.encouragement, "Well done!");
        assert!(summary.vocabulary_learned.is_empty());
    }

    #[test]
    fn answer_check_is_forgiving() {
        let q = ExamQuestion {
            skill: SkillType::Writing,
            question: "Where do you buy souvenirs?".to_string(),
            instruction: "Answer".to_string(),
            correct_answer: Some("At the market.".to_string()),
        };
        assert_eq!(q.check("  at the   MARKET "), Some(true));
        assert_eq!(q.check("at home"), Some(false));

        let open = ExamQuestion {
            correct_answer: None,
            ..q
        };
        assert_eq!(open.check("anything"), None);
    }

    #[test]
    fn teaching_mode_from_str() {
        assert_eq!("ARABIC".parse::<TeachingMode>().unwrap(), TeachingMode::Arabic);
        assert_eq!("en".parse::<TeachingMode>().unwrap(), TeachingMode::English);
        assert!("french".parse::<TeachingMode>().is_err());
    }
}
