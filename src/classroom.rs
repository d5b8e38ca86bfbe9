//! Lesson and exam flow
//!
//! The classroom walks a student from the unit list into either a generated
//! lesson (ending in a summary) or a unit exam. Generation failures leave the
//! classroom in [`View::Failed`], from which the failed action can be retried
//! or abandoned with [`Classroom::back`].

use async_trait::async_trait;

use crate::curriculum::{self, Lesson, Unit};
use crate::lesson::{ExamQuestion, LessonSummary, TeachingMode, TeachingStep};
use crate::voice::AudioBuffer;
use crate::{Error, Result};

/// Generates lesson content and narration
#[async_trait]
pub trait TeacherService: Send + Sync {
    /// Generate a step-by-step lesson script
    ///
    /// # Errors
    ///
    /// Returns error if generation fails
    async fn generate_lesson_script(
        &self,
        unit: &Unit,
        lesson: &Lesson,
        mode: TeachingMode,
    ) -> Result<Vec<TeachingStep>>;

    /// Generate the end-of-lesson summary
    ///
    /// # Errors
    ///
    /// Returns error if generation fails
    async fn generate_summary(&self, lesson: &Lesson) -> Result<LessonSummary>;

    /// Generate a unit exam
    ///
    /// # Errors
    ///
    /// Returns error if generation fails
    async fn generate_exam(&self, unit: &Unit) -> Result<Vec<ExamQuestion>>;

    /// Speak `text`; `Ok(None)` when no audio could be produced
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn speak(&self, text: &str) -> Result<Option<AudioBuffer>>;
}

/// Generation step that failed and can be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedAction {
    LessonScript { lesson_id: u32 },
    Summary,
    Exam,
}

/// What the student is looking at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    BrowsingUnits,
    UnitSelected,
    Teaching { step: usize },
    Summary,
    Examining { index: usize },
    Failed { action: FailedAction, message: String },
}

/// Result of a finished exam
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExamReport {
    pub answered: usize,
    pub correct: usize,
    /// Questions that had an answer key
    pub graded: usize,
}

/// Outcome of submitting an exam answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamProgress {
    /// Moved on to the question at this index
    Next(usize),
    /// That was the last question
    Finished(ExamReport),
}

/// Lesson and exam state machine
pub struct Classroom<S> {
    service: S,
    mode: TeachingMode,
    view: View,
    unit: Option<&'static Unit>,
    lesson: Option<&'static Lesson>,
    script: Vec<TeachingStep>,
    summary: Option<LessonSummary>,
    exam: Vec<ExamQuestion>,
    report: ExamReport,
}

impl<S: TeacherService> Classroom<S> {
    #[must_use]
    pub fn new(service: S, mode: TeachingMode) -> Self {
        Self {
            service,
            mode,
            view: View::BrowsingUnits,
            unit: None,
            lesson: None,
            script: Vec::new(),
            summary: None,
            exam: Vec::new(),
            report: ExamReport::default(),
        }
    }

    #[must_use]
    pub const fn view(&self) -> &View {
        &self.view
    }

    #[must_use]
    pub const fn mode(&self) -> TeachingMode {
        self.mode
    }

    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// The selected unit, if any
    #[must_use]
    pub const fn unit(&self) -> Option<&'static Unit> {
        self.unit
    }

    /// The lesson being taught, if any
    #[must_use]
    pub const fn lesson(&self) -> Option<&'static Lesson> {
        self.lesson
    }

    /// The whole generated script
    #[must_use]
    pub fn script(&self) -> &[TeachingStep] {
        &self.script
    }

    /// The step on screen while teaching
    #[must_use]
    pub fn current_step(&self) -> Option<&TeachingStep> {
        match self.view {
            View::Teaching { step } => self.script.get(step),
            _ => None,
        }
    }

    #[must_use]
    pub const fn summary(&self) -> Option<&LessonSummary> {
        self.summary.as_ref()
    }

    /// The generated exam
    #[must_use]
    pub fn exam(&self) -> &[ExamQuestion] {
        &self.exam
    }

    /// The question on screen while examining
    #[must_use]
    pub fn current_question(&self) -> Option<&ExamQuestion> {
        match self.view {
            View::Examining { index } => self.exam.get(index),
            _ => None,
        }
    }

    /// Change the teaching mode
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` during a lesson or exam
    pub fn set_mode(&mut self, mode: TeachingMode) -> Result<()> {
        match self.view {
            View::BrowsingUnits | View::UnitSelected => {
                self.mode = mode;
                Ok(())
            }
            _ => Err(self.invalid("change teaching mode")),
        }
    }

    /// Open a unit from the unit list
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown unit and `Error::InvalidState`
    /// unless browsing units
    pub fn select_unit(&mut self, unit_id: u32) -> Result<()> {
        if self.view != View::BrowsingUnits {
            return Err(self.invalid("select a unit"));
        }
        let unit = curriculum::find_unit(unit_id)
            .ok_or_else(|| Error::NotFound(format!("unit {unit_id}")))?;

        tracing::debug!(unit = unit.id, title = unit.title, "unit selected");
        self.unit = Some(unit);
        self.view = View::UnitSelected;
        Ok(())
    }

    /// Generate a script for a lesson of the selected unit and start teaching
    ///
    /// Generation failures land in [`View::Failed`].
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown lesson and `Error::InvalidState`
    /// unless a unit is selected
    pub async fn start_lesson(&mut self, lesson_id: u32) -> Result<()> {
        let (View::UnitSelected, Some(unit)) = (&self.view, self.unit) else {
            return Err(self.invalid("start a lesson"));
        };
        let lesson = unit
            .lesson(lesson_id)
            .ok_or_else(|| Error::NotFound(format!("lesson {lesson_id} in unit {}", unit.id)))?;

        tracing::info!(unit = unit.id, lesson = lesson.id, mode = %self.mode, "generating lesson");
        self.lesson = Some(lesson);

        let action = FailedAction::LessonScript { lesson_id };
        match self
            .service
            .generate_lesson_script(unit, lesson, self.mode)
            .await
        {
            Ok(script) if script.is_empty() => self.fail(action, "nothing was generated"),
            Ok(script) => {
                tracing::debug!(steps = script.len(), "lesson script ready");
                self.script = script;
                self.view = View::Teaching { step: 0 };
            }
            Err(e) => self.fail(action, e),
        }
        Ok(())
    }

    /// Advance one step; past the last step the lesson summary is generated
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless teaching
    pub async fn next_step(&mut self) -> Result<()> {
        let View::Teaching { step } = self.view else {
            return Err(self.invalid("advance the lesson"));
        };

        if step + 1 < self.script.len() {
            self.view = View::Teaching { step: step + 1 };
            return Ok(());
        }

        let Some(lesson) = self.lesson else {
            return Err(self.invalid("summarize the lesson"));
        };
        match self.service.generate_summary(lesson).await {
            Ok(summary) => {
                self.summary = Some(summary);
                self.view = View::Summary;
            }
            Err(e) => self.fail(FailedAction::Summary, e),
        }
        Ok(())
    }

    /// Go back one step; stays put on the first step
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless teaching
    pub fn previous_step(&mut self) -> Result<()> {
        let View::Teaching { step } = self.view else {
            return Err(self.invalid("go back a step"));
        };
        self.view = View::Teaching {
            step: step.saturating_sub(1),
        };
        Ok(())
    }

    /// Narrate the current step
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless teaching, or the service error
    pub async fn narrate_current_step(&self) -> Result<Option<AudioBuffer>> {
        let step = self
            .current_step()
            .ok_or_else(|| self.invalid("narrate a step"))?;
        self.service.speak(&step.audio_text).await
    }

    /// Speak the current exam question
    ///
    /// Listening questions can only be answered after hearing them.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless examining, or the service error
    pub async fn narrate_current_question(&self) -> Result<Option<AudioBuffer>> {
        let question = self
            .current_question()
            .ok_or_else(|| self.invalid("narrate a question"))?;
        self.service.speak(&question.question).await
    }

    /// Generate an exam for the selected unit
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless a unit is selected
    pub async fn start_exam(&mut self) -> Result<()> {
        let (View::UnitSelected, Some(unit)) = (&self.view, self.unit) else {
            return Err(self.invalid("start an exam"));
        };

        tracing::info!(unit = unit.id, "generating exam");
        match self.service.generate_exam(unit).await {
            Ok(exam) if exam.is_empty() => self.fail(FailedAction::Exam, "nothing was generated"),
            Ok(exam) => {
                tracing::debug!(questions = exam.len(), "exam ready");
                self.exam = exam;
                self.report = ExamReport::default();
                self.view = View::Examining { index: 0 };
            }
            Err(e) => self.fail(FailedAction::Exam, e),
        }
        Ok(())
    }

    /// Answer the current question
    ///
    /// The last answer finishes the exam and returns to the unit.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless examining
    pub fn submit_answer(&mut self, answer: &str) -> Result<ExamProgress> {
        let View::Examining { index } = self.view else {
            return Err(self.invalid("answer a question"));
        };
        let question = self
            .exam
            .get(index)
            .ok_or_else(|| self.invalid("answer a question"))?;

        self.report.answered += 1;
        match question.check(answer) {
            Some(correct) => {
                self.report.graded += 1;
                if correct {
                    self.report.correct += 1;
                }
            }
            None => tracing::debug!(index, "ungraded answer"),
        }

        if index + 1 < self.exam.len() {
            self.view = View::Examining { index: index + 1 };
            return Ok(ExamProgress::Next(index + 1));
        }

        let report = std::mem::take(&mut self.report);
        self.exam.clear();
        self.view = View::UnitSelected;
        tracing::info!(
            answered = report.answered,
            correct = report.correct,
            graded = report.graded,
            "exam finished"
        );
        Ok(ExamProgress::Finished(report))
    }

    /// Return to the unit list, discarding everything generated
    pub fn back(&mut self) {
        self.view = View::BrowsingUnits;
        self.unit = None;
        self.lesson = None;
        self.script.clear();
        self.summary = None;
        self.exam.clear();
        self.report = ExamReport::default();
    }

    /// Re-run the action that failed
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless in the failed view
    pub async fn retry(&mut self) -> Result<()> {
        let View::Failed { action, .. } = &self.view else {
            return Err(self.invalid("retry"));
        };

        tracing::info!(?action, "retrying");
        match action.clone() {
            FailedAction::LessonScript { lesson_id } => {
                self.view = View::UnitSelected;
                self.start_lesson(lesson_id).await
            }
            FailedAction::Summary => {
                self.view = View::Teaching {
                    step: self.script.len().saturating_sub(1),
                };
                self.next_step().await
            }
            FailedAction::Exam => {
                self.view = View::UnitSelected;
                self.start_exam().await
            }
        }
    }

    fn fail(&mut self, action: FailedAction, reason: impl std::fmt::Display) {
        let message = reason.to_string();
        tracing::warn!(?action, error = %message, "generation failed");
        self.view = View::Failed { action, message };
    }

    fn invalid(&self, what: &str) -> Error {
        Error::InvalidState(format!("cannot {what} from {:?}", self.view))
    }
}
