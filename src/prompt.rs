//! Prompt builders for Miss Nour

use crate::curriculum::{Lesson, Unit};
use crate::lesson::TeachingMode;

/// Number of steps requested for a lesson script
pub const LESSON_STEPS: usize = 10;

/// Fixed system instruction for live practice sessions
pub const LIVE_SYSTEM_INSTRUCTION: &str = "\
You are Miss Nour, an interactive Egyptian English teacher.
Current Goal: Practice book exercises (تدريبات الكتاب).
Method:
1. Always speak English first.
2. Listen to the student reading the question from the screen.
3. Correct their pronunciation or grammar kindly.
4. If they answer incorrectly, explain why using English first, then a short Arabic explanation.
5. Be extremely encouraging and warm.";

/// Language-mixing rule for a teaching mode
#[must_use]
pub const fn language_policy(mode: TeachingMode) -> &'static str {
    match mode {
        TeachingMode::Arabic => {
            "In this mode, teach using 'Sandwich Method': English first, then Arabic. \
             Example: 'Today we learn about artifacts, يعني القطع الأثرية'."
        }
        TeachingMode::English => "Speak exclusively in English.",
    }
}

/// Prompt for a lesson script
#[must_use]
pub fn lesson_script(unit: &Unit, lesson: &Lesson, mode: TeachingMode) -> String {
    format!(
        "You are Miss Nour teaching Egyptian Primary 6.\n\
         Topic: Unit {unit_id} ({unit_title}), Lesson: {lesson_title}.\n\
         Grammar focus: {language}.\n\
         Vocabulary: {vocabulary}.\n\
         {policy}\n\
         Generate {LESSON_STEPS} steps in JSON.\n\
         Steps 1-6: Teaching & vocabulary.\n\
         Steps 7-10: MUST BE 'Book Exercises' (تدريبات الكتاب). These are questions for the \
         student to answer out loud to you.\n\
         For exercises, the student will read the question to you live.",
        unit_id = unit.id,
        unit_title = unit.title,
        lesson_title = lesson.title,
        language = unit.language,
        vocabulary = lesson.vocabulary.join(", "),
        policy = language_policy(mode),
    )
}

/// Prompt for an end-of-lesson summary
#[must_use]
pub fn lesson_summary(lesson: &Lesson) -> String {
    format!(
        "Generate a lesson summary for a Grade 6 student. Lesson: {}.\n\
         Vocabulary covered: {}.\n\
         Return JSON.",
        lesson.title,
        lesson.vocabulary.join(", ")
    )
}

/// Prompt for a unit skills exam
#[must_use]
pub fn unit_exam(unit: &Unit) -> String {
    format!(
        "Generate a skills exam for Grade 6 Egypt Unit: {}.\n\
         Cover Reading, Writing, Listening and Speaking. Grammar focus: {}.\n\
         Return JSON array.",
        unit.title, unit.language
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::find_unit;

    #[test]
    fn script_prompt_mentions_lesson_and_vocabulary() {
        let unit = find_unit(1).unwrap();
        let lesson = unit.lesson(1).unwrap();
        let prompt = lesson_script(unit, lesson, TeachingMode::English);

        assert!(prompt.contains("Unit 1 (Amazing places in Egypt)"));
        assert!(prompt.contains("buy souvenirs, make furniture"));
        assert!(prompt.contains("Generate 10 steps"));
        assert!(prompt.contains("Speak exclusively in English."));
    }

    #[test]
    fn arabic_mode_uses_sandwich_method() {
        let unit = find_unit(2).unwrap();
        let prompt = lesson_script(unit, unit.lesson(3).unwrap(), TeachingMode::Arabic);
        assert!(prompt.contains("Sandwich Method"));
    }

    #[test]
    fn exam_prompt_names_unit() {
        assert!(unit_exam(find_unit(6).unwrap()).contains("Water Savers"));
    }
}
