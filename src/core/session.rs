/// The training session: one generated visitor, the step machine and
/// everything a run accumulates.
///
/// Every turn runs to completion (match, reveal, log, gate check, possible
/// transition) before the next is accepted. Nothing here returns an error
/// once the session is built; malformed input always resolves to a scripted
/// reply.

use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::disclosure::{reveal, IdCardView, RevealedFields};
use crate::core::lexicon::{Lexicon, Phrasebook};
use crate::core::matcher::{normalize, IntentMatcher};
use crate::core::responses::{ResponseTable, FALLBACK_REPLY};
use crate::core::scenario::ScenarioGenerator;
use crate::core::speech::{SpeechToText, TextToSpeech};
use crate::schema::difficulty::Difficulty;
use crate::schema::profile::VisitorProfile;
use crate::schema::step::{all_required, default_steps, Step};
use crate::schema::transcript::{now, Speaker, Transcript};

pub const DEFAULT_SEED: u64 = 42;
/// Upper bound for seeds drawn by [`TrainerSession::new_run`].
pub const MAX_RUN_SEED: u64 = 10_000_000;
/// Trimmed characters needed before the briefing counts as written.
pub const MIN_BRIEFING_CHARS: usize = 20;

pub const STRICT_FALLBACK: &str = "Could you be more specific, please?";
pub const NO_SPEECH_PROMPT: &str = "No speech detected. Try again.";
pub const BRIEFING_REMINDER: &str =
    "Note: first fill in the 5W supervisor briefing (short but complete).";
pub const STEP_COMPLETE: &str = "Step complete. Proceed to next step.";
pub const RUN_COMPLETE: &str = "All steps completed. Export is now available.";
pub const CONFIRMED_REPLY: &str = "Okay. What do you want to know?";
pub const DECLINED_REPLY: &str = "No problem. Please ask your security questions.";

const YES_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "correct", "that's right", "right", "affirmative", "sure",
];
const NO_WORDS: &[&str] = &["no", "nope", "negative", "not really"];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("procedure has no steps")]
    NoSteps,
    #[error("step '{0}' has no required intents")]
    EmptyStep(String),
}

/// How a visitor reply was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Canned reply for a newly satisfied intent.
    Intent,
    Smalltalk,
    /// Answer to a yes/no after the visitor echoed a question back.
    Confirmation,
    /// Nothing matched, or the run is already over.
    Fallback,
}

/// Where the step machine stands after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepProgress {
    InProgress,
    /// All intents done, but the supervisor briefing is still missing.
    AwaitingBriefing,
    Advanced { from: usize, to: usize },
    /// This turn completed the last step.
    Finished,
    AlreadyFinished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub reply: String,
    pub kind: ReplyKind,
    pub matched_intent: Option<String>,
    /// Number of profile fields that became visible this turn.
    pub revealed: usize,
    pub progress: StepProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank typed input: not logged, not answered.
    Ignored,
    /// Speech input produced no usable transcript.
    NoSpeech { prompt: &'static str },
    Answered(Turn),
}

impl TurnOutcome {
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            Self::Answered(turn) => Some(turn),
            _ => None,
        }
    }
}

/// Everything owned by one run. Replaced wholesale on reset.
#[derive(Debug, Clone)]
struct SessionState {
    run_id: String,
    seed: u64,
    today: NaiveDate,
    profile: VisitorProfile,
    step_index: usize,
    satisfied: FxHashMap<String, bool>,
    transcript: Transcript,
    revealed: RevealedFields,
    briefing: String,
    briefing_complete: bool,
    opened: FxHashSet<String>,
    pending_reflect: Option<String>,
    started_at: NaiveDateTime,
    finished_at: Option<NaiveDateTime>,
    export_ready: bool,
    last_spoken: Option<usize>,
}

impl SessionState {
    fn new(seed: u64, profile: VisitorProfile, today: NaiveDate, steps: &[Step]) -> Self {
        let mut state = Self {
            run_id: format!("run_{}", seed),
            seed,
            today,
            profile,
            step_index: 0,
            satisfied: all_required(steps).map(|i| (i.to_string(), false)).collect(),
            transcript: Transcript::new(),
            revealed: RevealedFields::default(),
            briefing: String::new(),
            briefing_complete: false,
            opened: FxHashSet::default(),
            pending_reflect: None,
            started_at: now(),
            finished_at: None,
            export_ready: false,
            last_spoken: None,
        };
        state.open(&steps[0]);
        state
    }

    /// Emit the step's opening lines the first time it becomes active.
    fn open(&mut self, step: &Step) {
        if !self.opened.insert(step.key.clone()) {
            return;
        }
        for line in &step.opening {
            self.transcript.push(Speaker::Visitor, line.as_str());
        }
    }
}

/// A role-play session for one learner. Built via `TrainerSession::builder()`.
pub struct TrainerSession {
    difficulty: Difficulty,
    matcher: IntentMatcher,
    class_name: String,
    student_name: String,
    steps: Vec<Step>,
    lexicon: Arc<Lexicon>,
    responses: ResponseTable,
    generator: ScenarioGenerator,
    speech_to_text: Option<Box<dyn SpeechToText>>,
    text_to_speech: Option<Box<dyn TextToSpeech>>,
    tts_enabled: bool,
    fixed_today: Option<NaiveDate>,
    state: SessionState,
}

/// Builder for constructing a `TrainerSession`.
pub struct TrainerSessionBuilder {
    seed: u64,
    difficulty: Difficulty,
    class_name: String,
    student_name: String,
    steps: Option<Vec<Step>>,
    lexicon: Option<Lexicon>,
    phrasebook_path: Option<PathBuf>,
    responses: Option<ResponseTable>,
    responses_path: Option<PathBuf>,
    scenario: Option<ScenarioGenerator>,
    scenario_path: Option<PathBuf>,
    today: Option<NaiveDate>,
    speech_to_text: Option<Box<dyn SpeechToText>>,
    text_to_speech: Option<Box<dyn TextToSpeech>>,
    tts_enabled: bool,
}

impl TrainerSession {
    pub fn builder() -> TrainerSessionBuilder {
        TrainerSessionBuilder {
            seed: DEFAULT_SEED,
            difficulty: Difficulty::default(),
            class_name: String::new(),
            student_name: String::new(),
            steps: None,
            lexicon: None,
            phrasebook_path: None,
            responses: None,
            responses_path: None,
            scenario: None,
            scenario_path: None,
            today: None,
            speech_to_text: None,
            text_to_speech: None,
            tts_enabled: false,
        }
    }

    /// Process one typed utterance.
    pub fn submit(&mut self, utterance: &str) -> TurnOutcome {
        let text = utterance.trim();
        if text.is_empty() {
            debug!("ignoring blank utterance");
            return TurnOutcome::Ignored;
        }
        TurnOutcome::Answered(self.process(text))
    }

    /// Process a speech-to-text result. An empty transcript asks the learner
    /// to try again instead of counting as a turn.
    pub fn submit_transcript(&mut self, transcript: &str) -> TurnOutcome {
        if transcript.trim().is_empty() {
            warn!("empty transcript, no speech detected");
            return TurnOutcome::NoSpeech {
                prompt: NO_SPEECH_PROMPT,
            };
        }
        self.submit(transcript)
    }

    /// Transcribe recorded audio and process it.
    pub fn submit_audio(&mut self, audio: &[u8]) -> TurnOutcome {
        let Some(stt) = self.speech_to_text.as_mut() else {
            warn!("no speech-to-text service configured");
            return TurnOutcome::NoSpeech {
                prompt: NO_SPEECH_PROMPT,
            };
        };
        match stt.transcribe(audio) {
            Ok(text) => self.submit_transcript(&text),
            Err(e) => {
                warn!(error = %e, "speech recognition failed");
                TurnOutcome::NoSpeech {
                    prompt: NO_SPEECH_PROMPT,
                }
            }
        }
    }

    fn process(&mut self, text: &str) -> Turn {
        self.state.transcript.push(Speaker::Learner, text);

        if self.state.finished_at.is_some() {
            debug!("utterance after the run finished");
            self.state.transcript.push(Speaker::Visitor, FALLBACK_REPLY);
            return Turn {
                reply: FALLBACK_REPLY.to_string(),
                kind: ReplyKind::Fallback,
                matched_intent: None,
                revealed: 0,
                progress: StepProgress::AlreadyFinished,
            };
        }

        if let Some(reply) = self.confirm_reflect(text) {
            return self.answer(reply.to_string(), ReplyKind::Confirmation);
        }

        // One snapshot for the whole turn, even if a new one is installed later.
        let lexicon = Arc::clone(&self.lexicon);

        if let Some(reply) = lexicon.smalltalk_reply(text) {
            debug!("small talk");
            return self.answer(reply.to_string(), ReplyKind::Smalltalk);
        }

        let step = &self.steps[self.state.step_index];
        let remaining = step
            .required
            .iter()
            .map(String::as_str)
            .filter(|intent| !self.is_satisfied(intent));
        let matched = self
            .matcher
            .first_match(text, remaining, &lexicon)
            .map(str::to_string);

        let (reply, kind, revealed) = match matched.as_deref() {
            Some(intent) => {
                self.state.satisfied.insert(intent.to_string(), true);
                let revealed = self.state.revealed.apply(reveal(intent, &self.state.profile));
                debug!(
                    intent,
                    step = %self.current_step().key,
                    threshold = self.matcher.threshold(),
                    revealed,
                    "intent satisfied"
                );
                let reply = self
                    .responses
                    .respond(intent, text, &self.state.profile, self.state.today);
                (reply, ReplyKind::Intent, revealed)
            }
            None => {
                debug!(
                    step = %self.current_step().key,
                    threshold = self.matcher.threshold(),
                    "no intent matched"
                );
                self.state.pending_reflect = Some(text.to_string());
                (self.fallback_reply(text, &lexicon), ReplyKind::Fallback, 0)
            }
        };

        self.state.transcript.push(Speaker::Visitor, reply.as_str());
        let progress = self.check_step();
        Turn {
            reply,
            kind,
            matched_intent: matched,
            revealed,
            progress,
        }
    }

    /// Log a reply for a turn that does not touch the checklist. The step
    /// check still runs, so a briefing written since the last turn counts.
    fn answer(&mut self, reply: String, kind: ReplyKind) -> Turn {
        self.state.transcript.push(Speaker::Visitor, reply.as_str());
        let progress = self.check_step();
        Turn {
            reply,
            kind,
            matched_intent: None,
            revealed: 0,
            progress,
        }
    }

    /// A pending echoed question is consumed by the next turn; a bare yes or
    /// no to it gets a scripted answer.
    fn confirm_reflect(&mut self, text: &str) -> Option<&'static str> {
        self.state.pending_reflect.take()?;
        let normalized = normalize(text);
        let answer = normalized.trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'));
        if YES_WORDS.contains(&answer) {
            Some(CONFIRMED_REPLY)
        } else if NO_WORDS.contains(&answer) {
            Some(DECLINED_REPLY)
        } else {
            None
        }
    }

    fn fallback_reply(&self, text: &str, lexicon: &Lexicon) -> String {
        if self.difficulty == Difficulty::Advanced {
            return STRICT_FALLBACK.to_string();
        }
        lexicon
            .reflect(text)
            .unwrap_or_else(|| self.current_step().failure_response.clone())
    }

    fn check_step(&mut self) -> StepProgress {
        let index = self.state.step_index;
        let step = &self.steps[index];
        if !step.required.iter().all(|intent| self.is_satisfied(intent)) {
            return StepProgress::InProgress;
        }

        if step.requires_briefing && !self.state.briefing_complete {
            info!(step = %step.key, "step complete but briefing missing");
            self.state.transcript.push(Speaker::System, BRIEFING_REMINDER);
            return StepProgress::AwaitingBriefing;
        }

        self.state.transcript.push(Speaker::System, STEP_COMPLETE);
        let next = index + 1;
        if next < self.steps.len() {
            info!(from = %self.steps[index].key, to = %self.steps[next].key, "step complete");
            self.state.step_index = next;
            self.state.open(&self.steps[next]);
            StepProgress::Advanced { from: index, to: next }
        } else {
            self.state.finished_at = Some(now());
            self.state.export_ready = true;
            self.state.transcript.push(Speaker::System, RUN_COMPLETE);
            info!(run_id = %self.state.run_id, "all steps complete");
            StepProgress::Finished
        }
    }

    /// Store the supervisor briefing. Completion is re-evaluated on the next
    /// submitted turn, not here.
    pub fn set_briefing(&mut self, text: &str) {
        self.state.briefing = text.to_string();
        self.state.briefing_complete = text.trim().chars().count() >= MIN_BRIEFING_CHARS;
        debug!(complete = self.state.briefing_complete, "briefing updated");
    }

    /// Start over with the visitor generated from `seed`.
    pub fn reset(&mut self, seed: u64) {
        let today = self.fixed_today.unwrap_or_else(|| now().date());
        let profile = self.generator.generate_on(seed, today);
        self.state = SessionState::new(seed, profile, today, &self.steps);
        info!(run_id = %self.state.run_id, twist = self.state.profile.twist.tag(), "new run");
    }

    /// Start over with a random seed. Returns the seed used.
    pub fn new_run(&mut self) -> u64 {
        let seed = rand::thread_rng().gen_range(1..=MAX_RUN_SEED);
        self.reset(seed);
        seed
    }

    /// Swap the lexicon snapshot used from the next turn on.
    pub fn install_lexicon(&mut self, lexicon: impl Into<Arc<Lexicon>>) {
        let lexicon = lexicon.into();
        info!(
            from = self.lexicon.version(),
            to = lexicon.version(),
            "installing lexicon snapshot"
        );
        self.lexicon = lexicon;
    }

    /// Speak the most recent visitor reply, at most once per reply.
    /// Returns whether the speaker was invoked.
    pub fn speak_latest(&mut self) -> bool {
        if !self.tts_enabled {
            return false;
        }
        let Some(tts) = self.text_to_speech.as_mut() else {
            return false;
        };
        let Some((index, text)) = self.state.transcript.last_visitor_line() else {
            return false;
        };
        if self.state.last_spoken == Some(index) {
            return false;
        }
        if let Err(e) = tts.speak(text) {
            warn!(error = %e, "text-to-speech failed");
        }
        self.state.last_spoken = Some(index);
        true
    }

    pub fn set_tts_enabled(&mut self, enabled: bool) {
        self.tts_enabled = enabled;
    }

    pub fn tts_enabled(&self) -> bool {
        self.tts_enabled
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.matcher = IntentMatcher::new(difficulty);
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }

    pub fn seed(&self) -> u64 {
        self.state.seed
    }

    /// Date the run treats as today, for ages on the ID card.
    pub fn today(&self) -> NaiveDate {
        self.state.today
    }

    pub fn profile(&self) -> &VisitorProfile {
        &self.state.profile
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_index(&self) -> usize {
        self.state.step_index
    }

    /// The active step; stays on the last step once the run is finished.
    pub fn current_step(&self) -> &Step {
        &self.steps[self.state.step_index]
    }

    pub fn is_satisfied(&self, intent: &str) -> bool {
        self.state.satisfied.get(intent).copied().unwrap_or(false)
    }

    /// Required intents of the active step not yet satisfied, in order.
    pub fn outstanding(&self) -> Vec<&str> {
        self.current_step()
            .required
            .iter()
            .map(String::as_str)
            .filter(|intent| !self.is_satisfied(intent))
            .collect()
    }

    /// (completed, total) over every required intent of the procedure.
    pub fn completed_counts(&self) -> (usize, usize) {
        all_required(&self.steps).fold((0, 0), |(done, total), intent| {
            (done + usize::from(self.is_satisfied(intent)), total + 1)
        })
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    pub fn revealed(&self) -> &RevealedFields {
        &self.state.revealed
    }

    pub fn id_card(&self) -> IdCardView {
        self.state.revealed.id_card(self.state.today)
    }

    pub fn briefing(&self) -> &str {
        &self.state.briefing
    }

    pub fn briefing_complete(&self) -> bool {
        self.state.briefing_complete
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.state.started_at
    }

    pub fn finished_at(&self) -> Option<NaiveDateTime> {
        self.state.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished_at.is_some()
    }

    pub fn export_ready(&self) -> bool {
        self.state.export_ready
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }
}

impl TrainerSessionBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn class_name(mut self, name: &str) -> Self {
        self.class_name = name.trim().to_string();
        self
    }

    pub fn student_name(mut self, name: &str) -> Self {
        self.student_name = name.trim().to_string();
        self
    }

    /// Replace the built-in five-step procedure.
    pub fn steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Provide a lexicon directly (wins over `phrasebook`).
    pub fn lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Phrasebook document to load; absent or malformed files fall back to
    /// the built-in phrases.
    pub fn phrasebook(mut self, path: impl Into<PathBuf>) -> Self {
        self.phrasebook_path = Some(path.into());
        self
    }

    /// Provide replies directly (wins over `responses_file`).
    pub fn responses(mut self, responses: ResponseTable) -> Self {
        self.responses = Some(responses);
        self
    }

    /// RON reply overrides layered on the built-in replies; an absent or
    /// invalid file leaves the built-in replies alone.
    pub fn responses_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.responses_path = Some(path.into());
        self
    }

    pub fn scenario(mut self, generator: ScenarioGenerator) -> Self {
        self.scenario = Some(generator);
        self
    }

    /// Scenario pools to generate from; an absent or invalid file falls
    /// back to the built-in pools.
    pub fn scenario_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scenario_path = Some(path.into());
        self
    }

    /// Pin the date used for generation and ages (tests, replays).
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn speech_to_text(mut self, stt: impl SpeechToText + 'static) -> Self {
        self.speech_to_text = Some(Box::new(stt));
        self
    }

    pub fn text_to_speech(mut self, tts: impl TextToSpeech + 'static) -> Self {
        self.text_to_speech = Some(Box::new(tts));
        self
    }

    pub fn tts_enabled(mut self, enabled: bool) -> Self {
        self.tts_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<TrainerSession, SessionError> {
        let steps = self.steps.unwrap_or_else(default_steps);
        if steps.is_empty() {
            return Err(SessionError::NoSteps);
        }
        if let Some(step) = steps.iter().find(|s| s.required.is_empty()) {
            return Err(SessionError::EmptyStep(step.key.clone()));
        }

        let lexicon = match (self.lexicon, &self.phrasebook_path) {
            (Some(lexicon), _) => lexicon,
            (None, Some(path)) => Lexicon::from_phrasebook(&Phrasebook::load_or_default(path)),
            (None, None) => Lexicon::builtin(),
        };

        let responses = match (self.responses, &self.responses_path) {
            (Some(responses), _) => responses,
            (None, Some(path)) => ResponseTable::load_or_builtin(path),
            (None, None) => ResponseTable::builtin(),
        };

        let generator = match (self.scenario, &self.scenario_path) {
            (Some(generator), _) => generator,
            (None, Some(path)) => ScenarioGenerator::load_or_default(path),
            (None, None) => ScenarioGenerator::default(),
        };

        let today = self.today.unwrap_or_else(|| now().date());
        let profile = generator.generate_on(self.seed, today);
        let state = SessionState::new(self.seed, profile, today, &steps);
        info!(
            run_id = %state.run_id,
            difficulty = %self.difficulty,
            twist = state.profile.twist.tag(),
            "session started"
        );

        Ok(TrainerSession {
            difficulty: self.difficulty,
            matcher: IntentMatcher::new(self.difficulty),
            class_name: self.class_name,
            student_name: self.student_name,
            steps,
            lexicon: Arc::new(lexicon),
            responses,
            generator,
            speech_to_text: self.speech_to_text,
            text_to_speech: self.text_to_speech,
            tts_enabled: self.tts_enabled,
            fixed_today: self.today,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::SmalltalkEntry;
    use crate::core::speech::testing::{RecordingTts, ScriptedStt};
    use crate::core::speech::SpeechError;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn session(difficulty: Difficulty) -> TrainerSession {
        TrainerSession::builder()
            .seed(7)
            .difficulty(difficulty)
            .today(today())
            .build()
            .unwrap()
    }

    fn reply(outcome: TurnOutcome) -> Turn {
        match outcome {
            TurnOutcome::Answered(turn) => turn,
            other => panic!("expected an answered turn, got {:?}", other),
        }
    }

    #[test]
    fn new_session_opens_first_step() {
        let s = session(Difficulty::Standard);
        let lines: Vec<&str> = s.transcript().entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(lines, vec!["Good morning.", "I need to enter the base."]);
        assert_eq!(s.run_id(), "run_7");
        assert_eq!(s.completed_counts(), (0, 24));
        assert!(s.revealed().is_empty());
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut s = session(Difficulty::Standard);
        let before = s.transcript().len();
        assert_eq!(s.submit("   \t "), TurnOutcome::Ignored);
        assert_eq!(s.transcript().len(), before);
    }

    #[test]
    fn matched_intent_reveals_and_answers() {
        let mut s = session(Difficulty::Standard);
        let turn = reply(s.submit("What is your name?"));
        assert_eq!(turn.kind, ReplyKind::Intent);
        assert_eq!(turn.matched_intent.as_deref(), Some("ask_identity"));
        assert_eq!(turn.revealed, 2);
        assert_eq!(turn.progress, StepProgress::InProgress);
        assert!(turn.reply.contains(&s.profile().name));
        assert_eq!(s.revealed().name.as_deref(), Some(s.profile().name.as_str()));
        assert!(s.revealed().purpose.is_none());
        assert_eq!(s.step_index(), 0);
    }

    #[test]
    fn repeated_intent_is_not_rematched() {
        let mut s = session(Difficulty::Standard);
        reply(s.submit("who are you"));
        let again = reply(s.submit("who are you"));
        assert_eq!(again.kind, ReplyKind::Fallback);
        assert_eq!(again.matched_intent, None);
        assert_eq!(s.completed_counts().0, 1);
    }

    #[test]
    fn unmatched_input_is_echoed_back() {
        let mut s = session(Difficulty::Standard);
        let turn = reply(s.submit("where did you park your car"));
        assert_eq!(turn.kind, ReplyKind::Fallback);
        assert_eq!(
            turn.reply,
            "Just to confirm: are you asking 'where did you park your car?'?"
        );
    }

    #[test]
    fn advanced_uses_fixed_prompt() {
        let mut s = session(Difficulty::Advanced);
        let turn = reply(s.submit("where did you park your car"));
        assert_eq!(turn.reply, STRICT_FALLBACK);
    }

    #[test]
    fn yes_and_no_after_echo() {
        let mut s = session(Difficulty::Standard);
        reply(s.submit("where did you park your car"));
        assert_eq!(reply(s.submit("Yes.")).reply, CONFIRMED_REPLY);
        // pending question consumed
        assert_eq!(reply(s.submit("yes")).kind, ReplyKind::Fallback);
        assert_eq!(reply(s.submit("nope")).reply, DECLINED_REPLY);
    }

    #[test]
    fn echo_then_real_question_is_processed() {
        let mut s = session(Difficulty::Standard);
        reply(s.submit("where did you park your car"));
        let turn = reply(s.submit("why are you here"));
        assert_eq!(turn.matched_intent.as_deref(), Some("ask_purpose"));
    }

    #[test]
    fn smalltalk_consumes_turn() {
        let pb = Phrasebook {
            smalltalk: vec![SmalltalkEntry {
                name: "greeting".to_string(),
                patterns: vec!["good morning".to_string()],
                response: "Morning! Busy day?".to_string(),
            }],
            ..Phrasebook::default()
        };
        let mut s = TrainerSession::builder()
            .lexicon(Lexicon::from_phrasebook(&pb))
            .today(today())
            .build()
            .unwrap();
        let turn = reply(s.submit("Good morning, who are you?"));
        assert_eq!(turn.kind, ReplyKind::Smalltalk);
        assert_eq!(turn.reply, "Morning! Busy day?");
        assert!(!s.is_satisfied("ask_identity"));
    }

    #[test]
    fn step_advances_and_opens_next() {
        let mut s = session(Difficulty::Standard);
        let questions = [
            "who are you",
            "why are you here",
            "do you have an appointment",
            "who is your host",
            "appointment time",
            "what is it regarding",
        ];
        let mut last = None;
        for q in questions {
            last = Some(reply(s.submit(q)));
        }
        assert_eq!(last.map(|t| t.progress), Some(StepProgress::Advanced { from: 0, to: 1 }));
        assert_eq!(s.current_step().key, "id_check");
        let entries = s.transcript().entries();
        let tail: Vec<&str> = entries[entries.len() - 2..].iter().map(|e| e.text.as_str()).collect();
        assert_eq!(tail, vec![STEP_COMPLETE, "Sure. Where do you want me to go?"]);
    }

    #[test]
    fn briefing_gate_holds_id_check() {
        let mut s = session(Difficulty::Standard);
        for q in [
            "who are you",
            "why are you here",
            "do you have an appointment",
            "who is your host",
            "appointment time",
            "what is it regarding",
            "can i see your id",
            "what is your date of birth",
        ] {
            reply(s.submit(q));
        }
        s.set_briefing("too short");
        let turn = reply(s.submit("i will contact my supervisor"));
        assert_eq!(turn.progress, StepProgress::AwaitingBriefing);
        assert_eq!(s.step_index(), 1);
        assert_eq!(s.transcript().entries().last().map(|e| e.text.as_str()), Some(BRIEFING_REMINDER));

        s.set_briefing("Visitor Sarah, delivery for Major Jansen at 10:30.");
        assert!(s.briefing_complete());
        let turn = reply(s.submit("i will contact my supervisor"));
        assert_eq!(turn.progress, StepProgress::Advanced { from: 1, to: 2 });
    }

    #[test]
    fn side_turns_report_the_step_state() {
        let pb = Phrasebook {
            smalltalk: vec![SmalltalkEntry {
                name: "weather".to_string(),
                patterns: vec!["nice weather".to_string()],
                response: "Lovely, isn't it?".to_string(),
            }],
            ..Phrasebook::default()
        };
        let mut s = TrainerSession::builder()
            .seed(7)
            .lexicon(Lexicon::from_phrasebook(&pb))
            .today(today())
            .build()
            .unwrap();
        for q in [
            "who are you",
            "why are you here",
            "do you have an appointment",
            "who is your host",
            "appointment time",
            "what is it regarding",
            "can i see your id",
            "what is your date of birth",
            "i will contact my supervisor",
        ] {
            reply(s.submit(q));
        }

        let turn = reply(s.submit("nice weather today"));
        assert_eq!(turn.kind, ReplyKind::Smalltalk);
        assert_eq!(turn.progress, StepProgress::AwaitingBriefing);

        reply(s.submit("where did you park your car"));
        let turn = reply(s.submit("yes"));
        assert_eq!(turn.kind, ReplyKind::Confirmation);
        assert_eq!(turn.progress, StepProgress::AwaitingBriefing);

        s.set_briefing("Visitor Sarah, delivery for Major Jansen at 10:30.");
        let turn = reply(s.submit("nice weather today"));
        assert_eq!(turn.kind, ReplyKind::Smalltalk);
        assert_eq!(turn.progress, StepProgress::Advanced { from: 1, to: 2 });
        assert_eq!(s.current_step().key, "threat_rules");

        let turn = reply(s.submit("nice weather today"));
        assert_eq!(turn.progress, StepProgress::InProgress);
    }

    #[test]
    fn briefing_length_counts_trimmed_chars() {
        let mut s = session(Difficulty::Standard);
        s.set_briefing(&format!("   {}   ", "x".repeat(MIN_BRIEFING_CHARS - 1)));
        assert!(!s.briefing_complete());
        s.set_briefing(&format!("   {}   ", "x".repeat(MIN_BRIEFING_CHARS)));
        assert!(s.briefing_complete());
    }

    #[test]
    fn reset_replaces_everything() {
        let mut s = session(Difficulty::Standard);
        reply(s.submit("who are you"));
        s.set_briefing("a briefing that is long enough");
        s.reset(99);
        assert_eq!(s.run_id(), "run_99");
        assert_eq!(s.completed_counts().0, 0);
        assert!(s.revealed().is_empty());
        assert_eq!(s.briefing(), "");
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.step_index(), 0);
    }

    #[test]
    fn same_seed_same_visitor() {
        let a = session(Difficulty::Basic);
        let b = session(Difficulty::Advanced);
        assert_eq!(a.profile(), b.profile());
    }

    #[test]
    fn new_run_seed_in_range() {
        let mut s = session(Difficulty::Standard);
        let seed = s.new_run();
        assert!((1..=MAX_RUN_SEED).contains(&seed));
        assert_eq!(s.run_id(), format!("run_{}", seed));
    }

    #[test]
    fn installed_lexicon_applies_next_turn() {
        let mut s = session(Difficulty::Advanced);
        assert_eq!(reply(s.submit("state your business")).kind, ReplyKind::Fallback);

        let mut additions = crate::core::lexicon::IntentAdditions::new();
        additions.insert("ask_purpose".to_string(), vec!["state your business".to_string()]);
        let next = s.lexicon().with_additions(&additions);
        s.install_lexicon(next);
        assert_eq!(s.lexicon().version(), 1);

        let turn = reply(s.submit("state your business"));
        assert_eq!(turn.matched_intent.as_deref(), Some("ask_purpose"));
    }

    #[test]
    fn audio_failures_prompt_retry() {
        let mut s = TrainerSession::builder()
            .today(today())
            .speech_to_text(ScriptedStt {
                transcripts: vec![
                    Ok("   ".to_string()),
                    Err(SpeechError::Unavailable("offline".to_string())),
                    Ok("who are you".to_string()),
                ],
            })
            .build()
            .unwrap();
        let before = s.transcript().len();
        assert!(matches!(s.submit_audio(b"a"), TurnOutcome::NoSpeech { .. }));
        assert!(matches!(s.submit_audio(b"b"), TurnOutcome::NoSpeech { .. }));
        assert_eq!(s.transcript().len(), before);
        let turn = reply(s.submit_audio(b"c"));
        assert_eq!(turn.matched_intent.as_deref(), Some("ask_identity"));
    }

    #[test]
    fn audio_without_recogniser_prompts_retry() {
        let mut s = session(Difficulty::Standard);
        assert_eq!(
            s.submit_audio(b"x"),
            TurnOutcome::NoSpeech {
                prompt: NO_SPEECH_PROMPT
            }
        );
    }

    #[test]
    fn tts_speaks_each_reply_once() {
        let tts = RecordingTts::default();
        let spoken = tts.spoken.clone();
        let mut s = TrainerSession::builder()
            .today(today())
            .text_to_speech(tts)
            .tts_enabled(true)
            .build()
            .unwrap();

        assert!(s.speak_latest());
        assert!(!s.speak_latest());
        reply(s.submit("who are you"));
        assert!(s.speak_latest());
        assert!(!s.speak_latest());

        let spoken = spoken.borrow();
        assert_eq!(spoken.len(), 2);
        assert_eq!(spoken[0], "I need to enter the base.");
        assert!(spoken[1].starts_with("My name is"));
    }

    #[test]
    fn tts_disabled_never_speaks() {
        let tts = RecordingTts::default();
        let spoken = tts.spoken.clone();
        let mut s = TrainerSession::builder()
            .today(today())
            .text_to_speech(tts)
            .build()
            .unwrap();
        assert!(!s.speak_latest());
        assert!(spoken.borrow().is_empty());
    }

    #[test]
    fn empty_procedures_are_rejected() {
        assert!(matches!(
            TrainerSession::builder().steps(Vec::new()).build(),
            Err(SessionError::NoSteps)
        ));
        let mut steps = default_steps();
        steps[2].required.clear();
        assert!(matches!(
            TrainerSession::builder().steps(steps).build(),
            Err(SessionError::EmptyStep(key)) if key == "threat_rules"
        ));
    }
}
