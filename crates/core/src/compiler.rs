//! Step compiler: flattens an authored [`Lesson`] into an ordered list of [`Step`]s.
//!
//! Compilation is total. A missing lesson or title yields a single diagnostic
//! step; a malformed task loses only the steps that cannot be derived from it.
//!
//! Order of the output:
//!
//! 1. lesson introduction
//! 2. one content step per slide
//! 3. per task: introduction, narration audio (when it has follow-up
//!    questions), the main step, assessment questions plus the assessment
//!    gate, narration follow-up questions
//! 4. summary

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};
use url::Url;

use crate::model::{
    AnswerKey, AssessmentQuestion, AudioQuestion, FinalAssessmentPayload, Lesson, LessonSettings,
    Media, PatientInfo, PreparatoryVideo, QuizOrigin, QuizPayload, RawAnswer, Slide, Step, StepId,
    StepPayload, Task, TaskContent, TaskId, TaskKind, VideoDescriptor,
};

/// Id of the single step produced for an unusable lesson.
pub const DIAGNOSTIC_STEP_ID: &str = "lesson-unavailable";

const YOUTUBE_EMBED_BASE: &str = "https://www.youtube.com/embed/";
const DEFAULT_MINIMUM_WATCH_SECS: u32 = 60;

const TASK_INTRO_PHRASES: &[&str] = &[
    "Get ready for an interactive task!",
    "Time to put what you learned into practice.",
    "Here comes your next challenge.",
    "Let's see how much of this has stuck.",
];

//
// ─── COMPILER ──────────────────────────────────────────────────────────────────
//

/// Compiles lessons with the given settings.
///
/// Task-introduction phrasing is picked with a seeded RNG. Without an explicit
/// seed the lesson id (or title) seeds it, so the same lesson always compiles
/// to the same steps.
#[derive(Debug, Clone, Default)]
pub struct StepCompiler {
    settings: LessonSettings,
    phrasing_seed: Option<u64>,
}

impl StepCompiler {
    #[must_use]
    pub fn new(settings: LessonSettings) -> Self {
        Self {
            settings,
            phrasing_seed: None,
        }
    }

    #[must_use]
    pub fn with_phrasing_seed(mut self, seed: u64) -> Self {
        self.phrasing_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &LessonSettings {
        &self.settings
    }

    #[must_use]
    pub fn compile(&self, lesson: &Lesson) -> Vec<Step> {
        self.compile_optional(Some(lesson))
    }

    /// Compile a lesson that may not exist at all.
    #[must_use]
    pub fn compile_optional(&self, lesson: Option<&Lesson>) -> Vec<Step> {
        let Some(lesson) = lesson else {
            warn!("no lesson definition supplied; emitting diagnostic step");
            return vec![diagnostic_step("No lesson definition was supplied.")];
        };
        let Some(title) = lesson.display_title() else {
            warn!(lesson_id = ?lesson.id, "lesson has no title; emitting diagnostic step");
            return vec![diagnostic_step("This lesson is missing its title.")];
        };

        let seed = self
            .phrasing_seed
            .unwrap_or_else(|| phrasing_seed_for(lesson, title));
        let mut emitter = Emitter {
            settings: &self.settings,
            rng: StdRng::seed_from_u64(seed),
            steps: Vec::new(),
            used_ids: HashSet::new(),
        };

        let introduction = lesson
            .content
            .as_ref()
            .and_then(|c| c.introduction.clone())
            .unwrap_or_else(|| format!("Welcome to {title}"));
        emitter.push(Step::new(
            StepId::new("intro"),
            format!("Let's learn about {title}"),
            introduction,
            StepPayload::Introduction,
        ));

        for (index, slide) in lesson.slides().iter().enumerate() {
            emitter.push(slide_step(index, slide));
        }

        for (index, task) in lesson.tasks.iter().enumerate() {
            emitter.emit_task(index, task);
        }

        emitter.push(summary_step(lesson, title));

        debug!(
            lesson_id = ?lesson.id,
            steps = emitter.steps.len(),
            "compiled lesson"
        );
        emitter.steps
    }
}

/// Compile with default settings.
#[must_use]
pub fn compile(lesson: &Lesson) -> Vec<Step> {
    StepCompiler::default().compile(lesson)
}

//
// ─── EMITTER ───────────────────────────────────────────────────────────────────
//

struct Emitter<'a> {
    settings: &'a LessonSettings,
    rng: StdRng,
    steps: Vec<Step>,
    used_ids: HashSet<String>,
}

impl Emitter<'_> {
    /// Append a step, renaming its id if it collides with an earlier one.
    fn push(&mut self, mut step: Step) -> StepId {
        let base = step.id.as_str().to_owned();
        let mut candidate = base.clone();
        let mut suffix = 2_u32;
        while self.used_ids.contains(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.used_ids.insert(candidate.clone());
        step.id = StepId::new(candidate);
        let id = step.id.clone();
        self.steps.push(step);
        id
    }

    fn emit_task(&mut self, index: usize, task: &Task) {
        let task_id = task
            .id
            .clone()
            .unwrap_or_else(|| TaskId::new(format!("task-{}", index + 1)));
        let xp = task.xp.unwrap_or(self.settings.default_task_xp());
        let gems = task.gems.unwrap_or(self.settings.default_task_gems());
        let ctx = TaskContext {
            id: &task_id,
            task,
            xp,
        };

        // a. introduction
        let phrase = TASK_INTRO_PHRASES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(TASK_INTRO_PHRASES[0]);
        let intro = Step::new(
            StepId::new(format!("{task_id}-intro")),
            format!("Task {}: {}", index + 1, task.kind),
            format!(
                "{phrase} This {} task is worth {xp} XP and {gems} gems.",
                task.kind.label().to_lowercase()
            ),
            StepPayload::Introduction,
        )
        .with_media(task.main_image().map(|src| Media::Image(src.to_owned())));
        self.push(intro);

        // b. narration
        let narration = task.narration().filter(|n| n.has_follow_up());
        if let Some(narration) = narration {
            let transcript = narration.transcript.clone().unwrap_or_default();
            let step = Step::new(
                StepId::new(format!("{task_id}-listening")),
                format!("Audio lesson: {}", task.kind),
                transcript,
                StepPayload::Audio {
                    audio_url: narration.audio_url.clone(),
                    duration_secs: narration.duration,
                },
            )
            .with_media(narration.audio_url.clone().map(Media::Audio))
            .with_hint(Some("Listen carefully to the audio content.".to_owned()));
            self.push(step);
        }

        // c. + d. main step and assessment expansion
        match task.content.as_ref() {
            None => {
                warn!(task_id = %task_id, kind = %task.kind, "task has no content; skipping main step");
            }
            Some(content) if task.kind == TaskKind::FinalAssessment => {
                self.emit_final_assessment(&ctx, content);
            }
            Some(content) => match main_step(&ctx, content) {
                Some(step) => {
                    self.push(step);
                }
                None => {
                    warn!(task_id = %task_id, kind = %task.kind, "task content is malformed; skipping main step");
                }
            },
        }

        // e. narration follow-up questions
        if let Some(narration) = narration {
            for (q_index, question) in narration.interactive_questions.iter().enumerate() {
                match narration_quiz_step(&ctx, q_index, question) {
                    Some(step) => {
                        self.push(step);
                    }
                    None => {
                        warn!(task_id = %task_id, question = q_index + 1, "narration question is malformed; skipping");
                    }
                }
            }
        }
    }

    fn emit_final_assessment(&mut self, ctx: &TaskContext<'_>, content: &TaskContent) {
        let task_id = ctx.id;
        let questions = content.questions.as_deref().unwrap_or(&[]);
        let passing_score = content
            .passing_score
            .filter(|s| (1..=100).contains(s))
            .unwrap_or(self.settings.default_passing_score());

        let mut body = format!(
            "This final assessment has {} questions covering the whole lesson. You need {passing_score}% to pass.",
            questions.len()
        );
        if let Some(limit) = content.time_limit {
            body.push_str(&format!(" Time limit: {limit} minutes."));
        }
        let media = content
            .preparatory_video
            .as_ref()
            .and_then(preparatory_video)
            .map(Media::Video)
            .or_else(|| ctx.task.main_image().map(|src| Media::Image(src.to_owned())));
        let briefing = Step::new(
            StepId::new(format!("{task_id}-assessment-intro")),
            "Final assessment",
            body,
            StepPayload::Introduction,
        )
        .with_media(media)
        .with_hint(Some("Take your time and read each question carefully.".to_owned()));
        self.push(briefing);

        let total = questions.len();
        let mut payloads = Vec::with_capacity(total);
        let mut question_steps = Vec::with_capacity(total);
        for (q_index, question) in questions.iter().enumerate() {
            let Some(step) = assessment_quiz_step(ctx, q_index, total, question) else {
                warn!(task_id = %task_id, question = q_index + 1, "assessment question is malformed; skipping");
                continue;
            };
            if let Some(quiz) = step.quiz() {
                payloads.push(quiz.clone());
            }
            question_steps.push(self.push(step));
        }

        if question_steps.is_empty() {
            warn!(task_id = %task_id, "final assessment has no usable questions; no gate emitted");
            return;
        }

        let gate = Step::new(
            StepId::new(format!("{task_id}-assessment")),
            "Final assessment check",
            format!(
                "Submit your assessment to finish the lesson. Passing score: {passing_score}%."
            ),
            StepPayload::FinalAssessment(FinalAssessmentPayload {
                task_id: task_id.clone(),
                questions: payloads,
                question_steps,
                passing_score,
                time_limit_minutes: content.time_limit,
            }),
        );
        self.push(gate);
    }
}

struct TaskContext<'a> {
    id: &'a TaskId,
    task: &'a Task,
    xp: u32,
}

//
// ─── STEP BUILDERS ─────────────────────────────────────────────────────────────
//

fn diagnostic_step(reason: &str) -> Step {
    Step::new(
        StepId::new(DIAGNOSTIC_STEP_ID),
        "Lesson unavailable",
        format!("{reason} Please go back and choose another lesson."),
        StepPayload::Introduction,
    )
}

fn slide_step(index: usize, slide: &Slide) -> Step {
    let id = slide
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(|| format!("slide-{}", index + 1), str::to_owned);
    let title = slide
        .title
        .clone()
        .unwrap_or_else(|| format!("Slide {}", index + 1));
    let body = slide
        .content
        .as_ref()
        .map(|c| c.joined())
        .unwrap_or_default();

    let video = video_descriptor(
        slide.youtube_id.as_deref(),
        slide.video_url.as_deref(),
        Some(title.clone()),
        None,
        None,
    );
    let media = video
        .map(Media::Video)
        .or_else(|| slide.image_url.clone().map(Media::Image));

    Step::new(StepId::new(id), title, body, StepPayload::Content)
        .with_media(media)
        .with_hint(slide.hint.clone())
}

fn summary_step(lesson: &Lesson, title: &str) -> Step {
    let refers_onward = lesson.has_final_assessment();
    let body = if refers_onward {
        format!(
            "You finished {title} and its final assessment. Continue to the next lesson in your module."
        )
    } else {
        lesson
            .content
            .as_ref()
            .and_then(|c| c.summary.clone())
            .unwrap_or_else(|| "Congratulations! You have completed this lesson.".to_owned())
    };
    Step::new(
        StepId::new("summary"),
        "Lesson complete!",
        body,
        StepPayload::Summary { refers_onward },
    )
}

fn main_step(ctx: &TaskContext<'_>, content: &TaskContent) -> Option<Step> {
    let task_id = ctx.id;
    let main_image = ctx.task.main_image().map(ToOwned::to_owned);
    match ctx.task.kind {
        TaskKind::Quiz => {
            let question = non_blank(content.question.as_deref())?;
            let options = content.options.clone().unwrap_or_default();
            let answer = resolve_answer(content.correct_answer.as_ref(), options.len())?;
            let image = content.image_url.clone().or(main_image);
            Some(
                Step::new(
                    StepId::new(format!("{task_id}-quiz")),
                    "Quiz challenge",
                    question,
                    StepPayload::Quiz(QuizPayload {
                        task_id: task_id.clone(),
                        options,
                        answer,
                        explanation: content.explanation.clone(),
                        hint: content.hint.clone(),
                        reward_xp: ctx.xp,
                        origin: QuizOrigin::Task,
                    }),
                )
                .with_media(image.map(Media::Image))
                .with_hint(content.hint.clone()),
            )
        }
        TaskKind::Flashcard => {
            let front = non_blank(content.front.as_deref())?;
            let back = non_blank(content.back.as_deref())?;
            Some(
                Step::new(
                    StepId::new(format!("{task_id}-flashcard")),
                    front.clone(),
                    back.clone(),
                    StepPayload::Flashcard { front, back },
                )
                .with_media(main_image.map(Media::Image)),
            )
        }
        TaskKind::CaseStudy => {
            let instructions = non_blank(content.instructions.as_deref());
            let patient = content.patient_info.clone();
            if patient.is_none() && instructions.is_none() {
                return None;
            }
            let patient = patient.unwrap_or_default();
            let title = patient
                .title
                .clone()
                .unwrap_or_else(|| "Case study".to_owned());
            let body = case_study_body(&patient, instructions.as_deref());
            Some(
                Step::new(
                    StepId::new(format!("{task_id}-case-study")),
                    title,
                    body,
                    StepPayload::CaseStudy {
                        patient,
                        instructions,
                    },
                )
                .with_media(main_image.map(Media::Image)),
            )
        }
        TaskKind::Interpretation | TaskKind::Practice => {
            let instructions = non_blank(content.instructions.as_deref())?;
            Some(
                Step::new(
                    StepId::new(format!("{task_id}-practice")),
                    format!("{} practice", ctx.task.kind),
                    instructions.clone(),
                    StepPayload::Practice { instructions },
                )
                .with_media(main_image.map(Media::Image)),
            )
        }
        TaskKind::Video => {
            let title = content.video_title.clone().or_else(|| content.title.clone());
            let description = content
                .video_description
                .clone()
                .or_else(|| content.description.clone());
            let url = content.embed_url.as_deref().or(content.video_url.as_deref());
            let video = video_descriptor(
                content.video_id.as_deref(),
                url,
                title.clone(),
                description.clone(),
                content.minimum_watch_time,
            )?;
            let hint = format!(
                "Watch for at least {} seconds to continue.",
                video.minimum_watch_secs
            );
            Some(
                Step::new(
                    StepId::new(format!("{task_id}-video")),
                    title.unwrap_or_else(|| "Learning video".to_owned()),
                    description
                        .unwrap_or_else(|| "Watch this video to learn more.".to_owned()),
                    StepPayload::Video(video),
                )
                .with_hint(Some(hint)),
            )
        }
        TaskKind::FinalAssessment | TaskKind::Unknown => None,
    }
}

fn assessment_quiz_step(
    ctx: &TaskContext<'_>,
    q_index: usize,
    total: usize,
    question: &AssessmentQuestion,
) -> Option<Step> {
    let text = non_blank(Some(question.question.as_str()))?;
    let answer = resolve_answer(question.correct_answer.as_ref(), question.options.len())?;
    let image = question
        .image_url
        .clone()
        .or_else(|| ctx.task.main_image().map(ToOwned::to_owned));
    Some(
        Step::new(
            StepId::new(format!("{}-question-{}", ctx.id, q_index + 1)),
            format!("Assessment question {} of {total}", q_index + 1),
            text,
            StepPayload::Quiz(QuizPayload {
                task_id: ctx.id.clone(),
                options: question.options.clone(),
                answer,
                explanation: question.explanation.clone(),
                hint: question.hint.clone(),
                reward_xp: ctx.xp,
                origin: QuizOrigin::Assessment,
            }),
        )
        .with_media(image.map(Media::Image))
        .with_hint(question.hint.clone()),
    )
}

fn narration_quiz_step(
    ctx: &TaskContext<'_>,
    q_index: usize,
    question: &AudioQuestion,
) -> Option<Step> {
    let text = non_blank(Some(question.question.as_str()))?;
    let answer = resolve_answer(question.correct_answer.as_ref(), question.options.len())?;
    Some(Step::new(
        StepId::new(format!("{}-audio-question-{}", ctx.id, q_index + 1)),
        format!("Listening check {}", q_index + 1),
        text,
        StepPayload::Quiz(QuizPayload {
            task_id: ctx.id.clone(),
            options: question.options.clone(),
            answer,
            explanation: question.feedback.clone(),
            hint: None,
            reward_xp: ctx.xp,
            origin: QuizOrigin::Narration,
        }),
    ))
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

/// Resolve an authored answer into a typed key checked against `option_count`.
///
/// Non-numeric strings fall back to the first option.
fn resolve_answer(raw: Option<&RawAnswer>, option_count: usize) -> Option<AnswerKey> {
    if option_count == 0 {
        return None;
    }
    let key = match raw? {
        RawAnswer::Index(i) => AnswerKey::Single(usize::try_from(*i).ok()?),
        RawAnswer::Text(text) => AnswerKey::Single(text.trim().parse::<usize>().unwrap_or(0)),
        RawAnswer::Many(indices) => {
            let set = indices
                .iter()
                .map(|i| usize::try_from(*i).ok())
                .collect::<Option<BTreeSet<usize>>>()?;
            if set.is_empty() {
                return None;
            }
            AnswerKey::Multi(set)
        }
    };
    match key.max_index() {
        Some(max) if max < option_count => Some(key),
        _ => None,
    }
}

fn video_descriptor(
    video_id: Option<&str>,
    url: Option<&str>,
    title: Option<String>,
    description: Option<String>,
    minimum_watch_secs: Option<u32>,
) -> Option<VideoDescriptor> {
    let video_id = video_id.map(str::trim).filter(|id| !id.is_empty());
    let embed_url = match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(raw) => Url::parse(raw).ok()?,
        None => embed_url_for(video_id?)?,
    };
    Some(VideoDescriptor {
        video_id: video_id.map(ToOwned::to_owned),
        embed_url,
        title,
        description,
        minimum_watch_secs: minimum_watch_secs.unwrap_or(DEFAULT_MINIMUM_WATCH_SECS),
    })
}

/// `YOUTUBE_EMBED_BASE` plus the id as one path segment.
fn embed_url_for(video_id: &str) -> Option<Url> {
    let well_formed = video_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        warn!(video_id, "ignoring malformed video id");
        return None;
    }
    let mut url = Url::parse(YOUTUBE_EMBED_BASE).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(video_id);
    Some(url)
}

fn preparatory_video(video: &PreparatoryVideo) -> Option<VideoDescriptor> {
    video_descriptor(
        video.video_id.as_deref(),
        video.youtube_url.as_deref(),
        video.video_title.clone(),
        video.video_description.clone(),
        video.minimum_watch_time,
    )
}

fn case_study_body(patient: &PatientInfo, instructions: Option<&str>) -> String {
    let mut lines = Vec::new();
    match (patient.age, patient.gender.as_deref()) {
        (Some(age), Some(gender)) => lines.push(format!("Patient: {age}-year-old {gender}")),
        (Some(age), None) => lines.push(format!("Patient: {age} years old")),
        (None, Some(gender)) => lines.push(format!("Patient: {gender}")),
        (None, None) => {}
    }
    if let Some(symptoms) = patient.symptoms.as_deref() {
        lines.push(format!("Symptoms: {symptoms}"));
    }
    if let Some(history) = patient.history.as_deref() {
        lines.push(format!("History: {history}"));
    }
    if let Some(instructions) = instructions {
        lines.push(instructions.to_owned());
    }
    lines.join("\n")
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// FNV-1a over the lesson id, falling back to the title.
fn phrasing_seed_for(lesson: &Lesson, title: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let key = lesson.id.as_ref().map_or(title, |id| id.as_str());
    key.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
