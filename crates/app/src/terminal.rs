//! Line-oriented terminal host.

use std::fmt::Write as _;
use std::io::Write;

use lesson_core::model::{
    CompletionResult, FinalAssessmentPayload, Media, Step, StepId, StepPayload, TaskId,
};
use lesson_core::{AnswerRecord, Cue};
use services::LessonHost;
use thiserror::Error;
use tracing::warn;

pub const HELP: &str = "commands: <n> toggle option n, s submit, n next, p previous, \
pass <score> / fail <score> report assessment, q quit";

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Zero-based option index (typed one-based).
    Toggle(usize),
    Submit,
    Next,
    Previous,
    Report { passed: bool, score: u32 },
    Quit,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty input; type `h` for help")]
    Empty,
    #[error("options are numbered from 1")]
    ZeroOption,
    #[error("`{0}` needs a score, e.g. `{0} 85`")]
    MissingScore(&'static str),
    #[error("invalid score: {0}")]
    InvalidScore(String),
    #[error("unknown command: {0}")]
    Unknown(String),
}

impl Command {
    /// Parse one line of input.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for blank, malformed or unknown input.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(CommandError::Empty);
        };
        match head {
            "s" | "submit" => Ok(Self::Submit),
            "n" | "next" => Ok(Self::Next),
            "p" | "prev" | "previous" => Ok(Self::Previous),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            "h" | "help" | "?" => Ok(Self::Help),
            "pass" | "fail" => {
                let passed = head == "pass";
                let label = if passed { "pass" } else { "fail" };
                let raw = parts.next().ok_or(CommandError::MissingScore(label))?;
                let score = raw
                    .parse::<u32>()
                    .map_err(|_| CommandError::InvalidScore(raw.to_owned()))?;
                Ok(Self::Report { passed, score })
            }
            other => match other.parse::<usize>() {
                Ok(0) => Err(CommandError::ZeroOption),
                Ok(n) => Ok(Self::Toggle(n - 1)),
                Err(_) => Err(CommandError::Unknown(other.to_owned())),
            },
        }
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

/// Full text of a step as shown to the learner.
#[must_use]
pub fn render_step(index: usize, total: usize, step: &Step) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n[{}/{}] {}", index + 1, total, step.title);
    if !step.body.is_empty() {
        let _ = writeln!(out, "{}", step.body);
    }
    match &step.media {
        Some(Media::Image(src)) => {
            let _ = writeln!(out, "  (image: {src})");
        }
        Some(Media::Audio(src)) => {
            let _ = writeln!(out, "  (audio: {src})");
        }
        Some(Media::Video(video)) => {
            let _ = writeln!(out, "  (video: {})", video.embed_url);
        }
        None => {}
    }
    match &step.payload {
        StepPayload::Quiz(quiz) => {
            for (i, option) in quiz.options.iter().enumerate() {
                let _ = writeln!(out, "  {}. {option}", i + 1);
            }
            if quiz.answer.is_multi() {
                let _ = writeln!(out, "  (select every correct option)");
            }
        }
        StepPayload::Video(video) => {
            let _ = writeln!(
                out,
                "  watch {} for at least {}s",
                video.embed_url, video.minimum_watch_secs
            );
        }
        StepPayload::FinalAssessment(gate) => {
            let _ = writeln!(
                out,
                "  {} questions, {}% to pass",
                gate.questions.len(),
                gate.passing_score
            );
        }
        _ => {}
    }
    if let Some(hint) = &step.hint {
        let _ = writeln!(out, "  hint: {hint}");
    }
    out
}

/// One line per step for `--outline`.
#[must_use]
pub fn outline_line(index: usize, step: &Step) -> String {
    let kind = format!("{:?}", step.kind());
    format!(
        "{:>3}. {kind:<16} {:<36} {}",
        index + 1,
        step.id.as_str(),
        step.title
    )
}

//
// ─── HOST ──────────────────────────────────────────────────────────────────────
//

pub struct TerminalHost<W: Write> {
    out: W,
    total_steps: usize,
}

impl<W: Write> TerminalHost<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            total_steps: 0,
        }
    }

    pub fn say(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            warn!(error = %err, "failed to write to terminal");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LessonHost for TerminalHost<W> {
    fn on_session_started(&mut self, total_steps: usize) {
        self.total_steps = total_steps;
    }

    fn on_step_entered(&mut self, index: usize, step: &Step) {
        let text = render_step(index, self.total_steps, step);
        self.say(text.trim_end());
    }

    fn on_answer_evaluated(&mut self, _step_id: &StepId, correct: bool) {
        self.say(if correct { "Correct!" } else { "Not quite." });
    }

    fn on_heart_lost(&mut self, hearts_remaining: u32) {
        self.say(&format!("You lost a heart. {hearts_remaining} left."));
    }

    fn on_reward_earned(&mut self, task_id: &TaskId, xp: u32) {
        self.say(&format!("+{xp} XP ({task_id})"));
    }

    fn on_cue(&mut self, cue: Cue) {
        match cue {
            Cue::Perfect => self.say("Perfect answer!"),
            Cue::Streak => self.say("You're on a streak!"),
            Cue::Correct | Cue::HeartLost => {}
        }
    }

    fn on_final_assessment_ready(
        &mut self,
        _step_id: &StepId,
        gate: &FinalAssessmentPayload,
        answers: &[AnswerRecord],
    ) {
        let correct = answers.iter().filter(|a| a.correct).count();
        let total = gate.questions.len().max(1);
        let percent = correct * 100 / total;
        self.say(&format!(
            "You answered {correct} of {} assessment questions correctly ({percent}%). \
             Report with `pass {percent}` or `fail {percent}`.",
            gate.questions.len()
        ));
    }

    fn on_final_assessment_result(&mut self, passed: bool, score: u8) {
        if passed {
            self.say(&format!("Assessment passed with {score}%. Press n to continue."));
        } else {
            self.say(&format!("Assessment not passed ({score}%). Go back with p and try again."));
        }
    }

    fn on_complete(&mut self, result: &CompletionResult) {
        self.say(&format!(
            "\nLesson complete! Score {}% in {}s. Earned {} XP and {} gems across {} tasks.",
            result.score(),
            result.time_spent_seconds(),
            result.total_xp(),
            result.total_gems(),
            result.tasks_completed()
        ));
    }

    fn on_exit(&mut self) {
        self.say("Lesson closed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{AnswerKey, QuizOrigin, QuizPayload, Rewards};

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("2"), Ok(Command::Toggle(1)));
        assert_eq!(Command::parse(" s "), Ok(Command::Submit));
        assert_eq!(Command::parse("n"), Ok(Command::Next));
        assert_eq!(Command::parse("p"), Ok(Command::Previous));
        assert_eq!(
            Command::parse("pass 85"),
            Ok(Command::Report {
                passed: true,
                score: 85
            })
        );
        assert_eq!(
            Command::parse("fail 40"),
            Ok(Command::Report {
                passed: false,
                score: 40
            })
        );
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("0"), Err(CommandError::ZeroOption));
        assert_eq!(Command::parse("pass"), Err(CommandError::MissingScore("pass")));
        assert_eq!(
            Command::parse("fail x"),
            Err(CommandError::InvalidScore("x".into()))
        );
        assert_eq!(
            Command::parse("jump"),
            Err(CommandError::Unknown("jump".into()))
        );
    }

    #[test]
    fn renders_quiz_options_one_based() {
        let step = Step::new(
            StepId::new("q"),
            "Quiz challenge",
            "Which wave?",
            StepPayload::Quiz(QuizPayload {
                task_id: TaskId::new("t"),
                options: vec!["P".into(), "QRS".into()],
                answer: AnswerKey::Single(1),
                explanation: None,
                hint: None,
                reward_xp: 10,
                origin: QuizOrigin::Task,
            }),
        );
        let text = render_step(2, 5, &step);
        assert!(text.contains("[3/5] Quiz challenge"));
        assert!(text.contains("  1. P"));
        assert!(text.contains("  2. QRS"));
        assert!(outline_line(2, &step).contains("Quiz"));
    }

    #[test]
    fn host_numbers_steps_against_session_total() {
        let mut host = TerminalHost::new(Vec::new());
        let step = Step::new(
            StepId::new("intro"),
            "Welcome",
            "",
            StepPayload::Summary {
                refers_onward: false,
            },
        );
        host.on_session_started(7);
        host.on_step_entered(0, &step);
        let text = String::from_utf8(host.into_inner()).unwrap();
        assert!(text.contains("[1/7] Welcome"));
    }

    #[test]
    fn host_writes_completion() {
        let mut host = TerminalHost::new(Vec::new());
        let result = CompletionResult::new(90, 30, Rewards { xp: 20, gems: 5 }, 1).unwrap();
        host.on_heart_lost(4);
        host.on_complete(&result);
        let text = String::from_utf8(host.into_inner()).unwrap();
        assert!(text.contains("4 left"));
        assert!(text.contains("Score 90%"));
        assert!(text.contains("20 XP and 5 gems"));
    }
}
