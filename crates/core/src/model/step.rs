use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

use crate::model::ids::{StepId, TaskId};
use crate::model::lesson::PatientInfo;

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Correct answer of a quiz step, resolved at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerKey {
    Single(usize),
    Multi(BTreeSet<usize>),
}

impl AnswerKey {
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, AnswerKey::Multi(_))
    }

    /// Largest option index referenced by this key.
    #[must_use]
    pub fn max_index(&self) -> Option<usize> {
        match self {
            AnswerKey::Single(i) => Some(*i),
            AnswerKey::Multi(set) => set.iter().next_back().copied(),
        }
    }
}

//
// ─── MEDIA ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub video_id: Option<String>,
    pub embed_url: Url,
    pub title: Option<String>,
    pub description: Option<String>,
    pub minimum_watch_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Media {
    Image(String),
    Audio(String),
    Video(VideoDescriptor),
}

//
// ─── PAYLOADS ──────────────────────────────────────────────────────────────────
//

/// Where a quiz step came from inside its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizOrigin {
    Task,
    Assessment,
    Narration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPayload {
    pub task_id: TaskId,
    pub options: Vec<String>,
    pub answer: AnswerKey,
    pub explanation: Option<String>,
    pub hint: Option<String>,
    /// XP announced when this question is answered correctly.
    pub reward_xp: u32,
    pub origin: QuizOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAssessmentPayload {
    pub task_id: TaskId,
    pub questions: Vec<QuizPayload>,
    /// Quiz steps where the questions are answered, in order.
    pub question_steps: Vec<StepId>,
    pub passing_score: u8,
    pub time_limit_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPayload {
    Introduction,
    Content,
    Audio {
        audio_url: Option<String>,
        duration_secs: Option<u32>,
    },
    Quiz(QuizPayload),
    Flashcard {
        front: String,
        back: String,
    },
    CaseStudy {
        patient: PatientInfo,
        instructions: Option<String>,
    },
    Practice {
        instructions: String,
    },
    Video(VideoDescriptor),
    FinalAssessment(FinalAssessmentPayload),
    Summary {
        refers_onward: bool,
    },
}

/// Payload discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Introduction,
    Content,
    Audio,
    Quiz,
    Flashcard,
    CaseStudy,
    Practice,
    Video,
    FinalAssessment,
    Summary,
}

impl StepKind {
    /// Steps that accept option selection and submission.
    #[must_use]
    pub fn is_interactive(self) -> bool {
        matches!(self, StepKind::Quiz)
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// One atomic screen of a compiled lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub title: String,
    pub body: String,
    pub media: Option<Media>,
    pub hint: Option<String>,
    pub payload: StepPayload,
}

impl Step {
    #[must_use]
    pub fn new(
        id: StepId,
        title: impl Into<String>,
        body: impl Into<String>,
        payload: StepPayload,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            media: None,
            hint: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: Option<Media>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }

    #[must_use]
    pub fn kind(&self) -> StepKind {
        match &self.payload {
            StepPayload::Introduction => StepKind::Introduction,
            StepPayload::Content => StepKind::Content,
            StepPayload::Audio { .. } => StepKind::Audio,
            StepPayload::Quiz(_) => StepKind::Quiz,
            StepPayload::Flashcard { .. } => StepKind::Flashcard,
            StepPayload::CaseStudy { .. } => StepKind::CaseStudy,
            StepPayload::Practice { .. } => StepKind::Practice,
            StepPayload::Video(_) => StepKind::Video,
            StepPayload::FinalAssessment(_) => StepKind::FinalAssessment,
            StepPayload::Summary { .. } => StepKind::Summary,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&QuizPayload> {
        match &self.payload {
            StepPayload::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    #[must_use]
    pub fn final_assessment(&self) -> Option<&FinalAssessmentPayload> {
        match &self.payload {
            StepPayload::FinalAssessment(fa) => Some(fa),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_payload() {
        let step = Step::new(StepId::new("s"), "t", "b", StepPayload::Summary { refers_onward: false });
        assert_eq!(step.kind(), StepKind::Summary);
        assert!(step.quiz().is_none());
        assert!(!step.kind().is_interactive());
    }

    #[test]
    fn multi_key_max_index() {
        let key = AnswerKey::Multi([0, 3, 2].into_iter().collect());
        assert!(key.is_multi());
        assert_eq!(key.max_index(), Some(3));
        assert_eq!(AnswerKey::Single(1).max_index(), Some(1));
    }
}
