//! Authored lesson definitions.
//!
//! These types mirror the lesson-definition table as it is authored. Every
//! field the compiler may have to tolerate being absent is optional here;
//! interpretation (and recovery from malformed entries) happens in
//! [`crate::compiler`].

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::model::ids::{LessonId, TaskId};

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: Option<LessonId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<LessonContent>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Lesson {
    /// Title with surrounding whitespace removed, `None` when missing or blank.
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        self.content
            .as_ref()
            .and_then(|c| c.slides.as_deref())
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn has_final_assessment(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| t.kind == TaskKind::FinalAssessment)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub slides: Option<Vec<Slide>>,
}

//
// ─── SLIDES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<SlideBody>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

/// Slide text authored either as one string or as a list of paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlideBody {
    Text(String),
    Lines(Vec<String>),
}

impl SlideBody {
    /// Joins paragraph lists with newlines.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            SlideBody::Text(text) => text.clone(),
            SlideBody::Lines(lines) => lines.join("\n"),
        }
    }
}

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Quiz,
    Flashcard,
    CaseStudy,
    Interpretation,
    Practice,
    Video,
    FinalAssessment,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TaskKind {
    /// Human readable label used in task introductions.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Quiz => "Quiz",
            TaskKind::Flashcard => "Flashcard",
            TaskKind::CaseStudy => "Case study",
            TaskKind::Interpretation => "Interpretation",
            TaskKind::Practice => "Practice",
            TaskKind::Video => "Video",
            TaskKind::FinalAssessment => "Final assessment",
            TaskKind::Unknown => "Activity",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: Option<TaskId>,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub xp: Option<u32>,
    #[serde(default)]
    pub gems: Option<u32>,
    #[serde(default)]
    pub content: Option<TaskContent>,
    #[serde(default)]
    pub images: Option<TaskImages>,
    #[serde(default)]
    pub audio: Option<TaskAudio>,
}

impl Task {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: Some(TaskId::new(id)),
            kind,
            xp: None,
            gems: None,
            content: None,
            images: None,
            audio: None,
        }
    }

    #[must_use]
    pub fn with_rewards(mut self, xp: u32, gems: u32) -> Self {
        self.xp = Some(xp);
        self.gems = Some(gems);
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: TaskContent) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: TaskAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn main_image(&self) -> Option<&str> {
        self.images.as_ref().and_then(|i| i.main_image.as_deref())
    }

    /// Narration that carries at least a transcript, if any.
    #[must_use]
    pub fn narration(&self) -> Option<&Narration> {
        self.audio.as_ref().and_then(|a| a.main_narration.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskImages {
    #[serde(default)]
    pub main_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAudio {
    #[serde(default)]
    pub main_narration: Option<Narration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narration {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub interactive_questions: Vec<AudioQuestion>,
}

impl Narration {
    /// True when the narration has a transcript and follow-up questions.
    #[must_use]
    pub fn has_follow_up(&self) -> bool {
        let has_transcript = self
            .transcript
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        has_transcript && !self.interactive_questions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub correct_answer: Option<RawAnswer>,
    #[serde(default)]
    pub feedback: Option<String>,
}

//
// ─── TASK CONTENT ──────────────────────────────────────────────────────────────
//

/// Type-specific task payload. Which fields matter depends on [`TaskKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContent {
    // quiz
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub correct_answer: Option<RawAnswer>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,

    // flashcard
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,

    // case study / interpretation
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
    #[serde(default)]
    pub instructions: Option<String>,

    // video
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_description: Option<String>,
    #[serde(default)]
    pub minimum_watch_time: Option<u32>,

    // final assessment
    #[serde(default)]
    pub questions: Option<Vec<AssessmentQuestion>>,
    #[serde(default)]
    pub passing_score: Option<u8>,
    #[serde(default)]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub preparatory_video: Option<PreparatoryVideo>,
}

impl TaskContent {
    #[must_use]
    pub fn quiz(
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_answer: RawAnswer,
    ) -> Self {
        Self {
            question: Some(question.into()),
            options: Some(options.into_iter().map(Into::into).collect()),
            correct_answer: Some(correct_answer),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn flashcard(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: Some(front.into()),
            back: Some(back.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn final_assessment(questions: Vec<AssessmentQuestion>, passing_score: u8) -> Self {
        Self {
            questions: Some(questions),
            passing_score: Some(passing_score),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub history: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparatoryVideo {
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub video_title: Option<String>,
    #[serde(default)]
    pub video_description: Option<String>,
    #[serde(default)]
    pub minimum_watch_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuestion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub correct_answer: Option<RawAnswer>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl AssessmentQuestion {
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_answer: RawAnswer,
    ) -> Self {
        Self {
            id: None,
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_answer: Some(correct_answer),
            explanation: None,
            hint: None,
            image_url: None,
        }
    }
}

/// `correctAnswer` as authored: a number, a numeric string, or a list.
///
/// Resolved into [`crate::model::AnswerKey`] once, at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    Index(i64),
    Text(String),
    Many(Vec<i64>),
}

/// Reads an answer of any other shape as absent, leaving the question to be
/// dropped as malformed at compile time.
fn lenient_answer<'de, D>(deserializer: D) -> Result<Option<RawAnswer>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Known(RawAnswer),
        Other(IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Known(raw) => Some(raw),
        Lenient::Other(_) => None,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_lesson() {
        let json = r#"{
            "id": "lesson-1",
            "title": "Heart basics",
            "content": {
                "introduction": "Welcome",
                "slides": [{ "id": "s1", "title": "One", "content": ["a", "b"] }]
            },
            "tasks": [{
                "id": "t1",
                "type": "quiz",
                "xp": 20,
                "content": { "question": "Q?", "options": ["a", "b"], "correctAnswer": 1 }
            }]
        }"#;

        let lesson: Lesson = serde_json::from_str(json).unwrap();
        assert_eq!(lesson.display_title(), Some("Heart basics"));
        assert_eq!(lesson.slides().len(), 1);
        assert_eq!(lesson.slides()[0].content.as_ref().unwrap().joined(), "a\nb");
        assert_eq!(lesson.tasks[0].kind, TaskKind::Quiz);
        assert_eq!(
            lesson.tasks[0].content.as_ref().unwrap().correct_answer,
            Some(RawAnswer::Index(1))
        );
    }

    #[test]
    fn unknown_task_type_is_tolerated() {
        let task: Task = serde_json::from_str(r#"{ "id": "x", "type": "drag-drop" }"#).unwrap();
        assert_eq!(task.kind, TaskKind::Unknown);
        assert!(task.content.is_none());
    }

    #[test]
    fn raw_answer_accepts_all_authored_shapes() {
        let single: RawAnswer = serde_json::from_str("2").unwrap();
        let text: RawAnswer = serde_json::from_str("\"3\"").unwrap();
        let many: RawAnswer = serde_json::from_str("[0, 2]").unwrap();
        assert_eq!(single, RawAnswer::Index(2));
        assert_eq!(text, RawAnswer::Text("3".into()));
        assert_eq!(many, RawAnswer::Many(vec![0, 2]));
    }

    #[test]
    fn incomplete_task_fields_deserialize_as_absent() {
        let task: Task = serde_json::from_str(
            r#"{
                "id": "gate",
                "content": {
                    "question": "Q?",
                    "options": ["a", "b"],
                    "correctAnswer": true,
                    "questions": [{ "options": ["a"], "correctAnswer": {"index": 0} }]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(task.kind, TaskKind::Unknown);
        let content = task.content.unwrap();
        assert_eq!(content.correct_answer, None);
        let question = &content.questions.unwrap()[0];
        assert!(question.question.is_empty());
        assert_eq!(question.correct_answer, None);
    }

    #[test]
    fn blank_title_is_missing() {
        let lesson = Lesson {
            title: Some("   ".into()),
            ..Lesson::default()
        };
        assert_eq!(lesson.display_title(), None);
    }

    #[test]
    fn narration_follow_up_requires_transcript_and_questions() {
        let mut narration = Narration {
            transcript: Some("Listen".into()),
            ..Narration::default()
        };
        assert!(!narration.has_follow_up());
        narration.interactive_questions.push(AudioQuestion {
            question: "Q".into(),
            options: vec!["a".into()],
            correct_answer: Some(RawAnswer::Index(0)),
            feedback: None,
        });
        assert!(narration.has_follow_up());
    }
}
