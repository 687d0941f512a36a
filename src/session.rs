//! Frame orchestrator: one capture → perception → classification →
//! advisory → game update → snapshot cycle per iteration.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::SessionError;
use crate::exercise::{signal, ExerciseClassifier, ExerciseMode, FormChecker, FormIssue, RepEvent, RepPhase};
use crate::game::{GameMachine, GameState, SessionStats, Transition};
use crate::mood::{MoodClassifier, MoodHistory, MoodState, MotionCue};
use crate::pose::face::FaceLandmarks;
use crate::pose::source::{CapturedFrame, FrameSource, KeypointSource};
use crate::pose::window::FrameWindow;
use crate::pose::PoseFrame;
use crate::safety::{Advisory, AdvisoryContext, AdvisoryLog, IntensitySummary, IntensityTracker, SafetyAdvisor};

/// Discrete player command, at most one per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectMode(ExerciseMode),
    Restart,
    Quit,
}

/// Keyboard or any other command input. Polled once per frame.
pub trait CommandSource {
    fn poll(&mut self) -> Option<Command>;
}

impl CommandSource for mpsc::Receiver<Command> {
    fn poll(&mut self) -> Option<Command> {
        self.try_recv().ok()
    }
}

/// Display of the per-frame snapshot. Failures are logged, never fatal.
pub trait RenderSink<F> {
    fn render(&mut self, frame: &CapturedFrame<F>, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Everything the UI needs for one frame
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timestamp: Duration,
    pub game: GameState,
    pub mood: MoodState,
    /// Most recent advisory (may be from an earlier frame)
    pub advisory: Option<Advisory>,
    /// Advisory issued on this frame
    pub issued: Option<Advisory>,
    pub pose: PoseFrame,
    pub face: Option<FaceLandmarks>,
    pub signal: Option<f32>,
    pub phase: RepPhase,
    pub event: Option<RepEvent>,
    pub transitions: Vec<Transition>,
    pub form_issues: Vec<FormIssue>,
    pub intensity: IntensitySummary,
    pub stats: SessionStats,
}

/// Result of one `Session::step`
pub enum Step<F> {
    Frame {
        frame: CapturedFrame<F>,
        snapshot: Box<Snapshot>,
    },
    /// A `Quit` command was applied; nothing was captured
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub duration: Duration,
    pub final_state: GameState,
    pub stats: SessionStats,
}

pub struct Session<S, K>
where
    S: FrameSource,
    K: KeypointSource<S::Frame>,
{
    source: S,
    detector: K,
    target_fps: u32,
    frame_budget: Duration,
    floor: f32,
    face_available: bool,
    window: FrameWindow,
    exercise: ExerciseClassifier,
    form: FormChecker,
    mood: MoodClassifier,
    mood_history: MoodHistory,
    intensity: IntensityTracker,
    advisor: SafetyAdvisor,
    advisories: AdvisoryLog,
    game: GameMachine,
    frames: u64,
    clock: Duration,
}

impl<S, K> Session<S, K>
where
    S: FrameSource,
    K: KeypointSource<S::Frame>,
{
    pub fn new(config: &Config, source: S, detector: K) -> Result<Self, SessionError> {
        config.validate()?;
        let capability = detector.face_capability().clone();
        let face_available = capability.is_available();
        let mode = ExerciseMode::default();
        let mood = MoodClassifier::new(config.mood.clone(), capability);
        let mood_history = mood.new_history();
        let floor = config.pose.confidence_floor;

        info!(
            face_available,
            target_fps = config.app.target_fps,
            max_hp = config.game.max_hp,
            "session created"
        );

        Ok(Self {
            source,
            detector,
            target_fps: config.app.target_fps,
            frame_budget: Duration::from_millis(config.app.frame_budget_ms),
            floor,
            face_available,
            window: FrameWindow::new(config.app.window_frames),
            exercise: ExerciseClassifier::new(&config.exercise, floor, mode),
            form: FormChecker::new(config.exercise.form.clone(), floor),
            mood,
            mood_history,
            intensity: IntensityTracker::new(Duration::from_millis(config.advisor.intensity_window_ms)),
            advisor: SafetyAdvisor::new(config.advisor.clone()),
            advisories: AdvisoryLog::default(),
            game: GameMachine::new(config.game.clone(), mode),
            frames: 0,
            clock: Duration::ZERO,
        })
    }

    pub fn game(&self) -> &GameState {
        self.game.state()
    }

    pub fn stats(&self) -> &SessionStats {
        self.game.stats()
    }

    pub fn mood(&self) -> MoodState {
        self.mood_history.state()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            frames: self.frames,
            duration: self.clock,
            final_state: *self.game.state(),
            stats: self.game.stats().clone(),
        }
    }

    /// Applies `command` at the iteration boundary, then processes one frame.
    ///
    /// Only capture errors are returned; perception failures become absent
    /// observations.
    pub fn step(&mut self, command: Option<Command>) -> Result<Step<S::Frame>, SessionError> {
        let mut transitions = Vec::new();
        if let Some(command) = command {
            match self.apply_command(command) {
                Some(transition) => transitions.push(transition),
                None => return Ok(Step::Stopped),
            }
        }

        let frame = self.source.capture()?;
        let now = frame.timestamp;
        self.clock = now;
        self.frames += 1;

        // 知覚
        let started = Instant::now();
        let pose = match self.detector.detect_pose(&frame) {
            Ok(pose) => pose,
            Err(e) => {
                warn!(error = %format!("{:#}", e), frame = self.frames, "pose inference failed");
                PoseFrame::absent(now)
            }
        };
        let face = if self.face_available {
            self.detector.detect_face(&frame, &pose).unwrap_or_else(|e| {
                warn!(error = %format!("{:#}", e), frame = self.frames, "face inference failed");
                None
            })
        } else {
            None
        };
        let perception = started.elapsed();
        if perception > self.frame_budget {
            warn!(
                perception_ms = perception.as_millis() as u64,
                budget_ms = self.frame_budget.as_millis() as u64,
                "frame over budget"
            );
        }
        self.window.push(pose);

        // 運動の分類
        let mode = self.game.state().active_mode;
        let event = self.exercise.classify(&self.window, mode);
        let form_issues = self
            .window
            .latest()
            .and_then(|latest| self.form.check(latest, mode))
            .unwrap_or_default();

        // 気分
        let motion = if self.face_available { None } else { self.motion_cue(mode) };
        let mood = self.mood.classify(face.as_ref(), motion.as_ref(), &mut self.mood_history);

        // 強度（ゲームが受け付ける反復のみ）
        if let Some(event) = event.as_ref().filter(|e| self.game.accepts(e)) {
            self.intensity.record(event);
        }
        let intensity = self.intensity.summary(now);

        // 助言
        let context = AdvisoryContext {
            form_issues: &form_issues,
            face_missing_frames: if self.face_available { self.mood_history.absent_frames() } else { 0 },
        };
        let issued = self
            .advisor
            .advise_with_context(&mood, &intensity, &context, &self.advisories, now);
        if let Some(advisory) = &issued {
            self.advisories.record(advisory.clone());
        }

        // ゲーム更新（反復イベント → 時間経過）
        if let Some(event) = &event {
            transitions.push(self.game.apply_rep(event));
        }
        transitions.extend(self.game.tick(now));

        debug!(frame = self.frames, mode = ?mode, mood = %mood.mood, "frame done");

        let snapshot = Snapshot {
            timestamp: now,
            game: *self.game.state(),
            mood,
            advisory: self.advisories.latest().cloned(),
            issued,
            pose: self.window.latest().cloned().unwrap_or_else(|| PoseFrame::absent(now)),
            face,
            signal: self.exercise.signal(),
            phase: self.exercise.phase(),
            event,
            transitions,
            form_issues,
            intensity,
            stats: self.game.stats().clone(),
        };
        Ok(Step::Frame {
            frame,
            snapshot: Box::new(snapshot),
        })
    }

    /// Runs until `Quit` or the end of the capture.
    ///
    /// Commands polled after a frame is rendered apply at the next
    /// iteration boundary.
    pub fn run<C, R>(&mut self, commands: &mut C, sink: &mut R) -> Result<SessionSummary, SessionError>
    where
        C: CommandSource,
        R: RenderSink<S::Frame>,
    {
        let period = (self.target_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(self.target_fps)));
        let mut pending = None;

        loop {
            let started = Instant::now();
            let step = match self.step(pending.take()) {
                Ok(step) => step,
                Err(SessionError::CaptureEnded) => {
                    info!(frames = self.frames, "capture ended");
                    break;
                }
                Err(e) => {
                    error!(error = %e, frames = self.frames, "session stopped");
                    return Err(e);
                }
            };
            let Step::Frame { frame, snapshot } = step else {
                break;
            };

            if let Err(e) = sink.render(&frame, &snapshot) {
                warn!(error = %format!("{:#}", e), "render failed");
            }

            pending = commands.poll();
            if pending == Some(Command::Quit) {
                info!(frames = self.frames, "quit requested");
                break;
            }

            if let Some(period) = period {
                let spent = started.elapsed();
                if spent < period {
                    std::thread::sleep(period - spent);
                }
            }
        }

        let summary = self.summary();
        info!(
            frames = summary.frames,
            seconds = summary.duration.as_secs_f32(),
            reps = summary.stats.total_reps(),
            wins = summary.stats.wins,
            "session finished"
        );
        Ok(summary)
    }

    /// `None` means stop
    fn apply_command(&mut self, command: Command) -> Option<Transition> {
        info!(command = ?command, "command");
        match command {
            Command::SelectMode(mode) => Some(self.game.select_mode(mode)),
            Command::Restart => {
                self.exercise.reset();
                self.form.reset();
                self.intensity.clear();
                Some(self.game.restart(self.clock))
            }
            Command::Quit => None,
        }
    }

    /// Smoothness of the active exercise signal over the frame window
    fn motion_cue(&self, mode: ExerciseMode) -> Option<MotionCue> {
        let series: Vec<f32> = self
            .window
            .iter()
            .filter_map(|frame| signal::extract(mode, frame, self.floor))
            .collect();
        MotionCue::from_series(&series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameStatus, HpMapping};
    use crate::mood::Mood;
    use crate::pose::synthetic::{Expression, Posture, RepTiming, ScriptedSource, Segment, SyntheticDetector, SyntheticImage};
    use crate::safety::AdvisoryCategory;
    use std::collections::VecDeque;

    const FPS: u32 = 24;

    fn config() -> Config {
        let mut config = Config::default();
        config.app.target_fps = 0;
        config.game.hp.arm_raise = HpMapping::Fixed { hp: 20 };
        config.game.opponent_attack_interval_ms = 0;
        config.advisor.break_reminder_interval_ms = 0;
        config
    }

    fn session(config: &Config, source: ScriptedSource) -> Session<ScriptedSource, SyntheticDetector> {
        Session::new(config, source, SyntheticDetector::with_face()).unwrap()
    }

    /// Steps until the scripted source runs dry, collecting snapshots
    fn drain(session: &mut Session<ScriptedSource, SyntheticDetector>) -> Vec<Snapshot> {
        let mut snapshots = Vec::new();
        while let Ok(Step::Frame { snapshot, .. }) = session.step(None) {
            snapshots.push(*snapshot);
        }
        snapshots
    }

    fn reps(mode: ExerciseMode, n: usize) -> Vec<Segment> {
        (0..n).flat_map(|_| Segment::rep(mode, 1.0, RepTiming::default())).collect()
    }

    struct Commands(VecDeque<Option<Command>>);

    impl CommandSource for Commands {
        fn poll(&mut self) -> Option<Command> {
            self.0.pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Vec<Snapshot>,
        fail: bool,
    }

    impl RenderSink<SyntheticImage> for RecordingSink {
        fn render(&mut self, _frame: &CapturedFrame<SyntheticImage>, snapshot: &Snapshot) -> anyhow::Result<()> {
            self.snapshots.push(snapshot.clone());
            if self.fail {
                anyhow::bail!("display unplugged");
            }
            Ok(())
        }
    }

    #[test]
    fn test_five_arm_raises_defeat_opponent() {
        let mut source = ScriptedSource::new(FPS);
        source.extend(reps(ExerciseMode::ArmRaise, 5));
        let mut s = session(&config(), source);

        let mut hp = vec![s.game().opponent_hp];
        let snapshots = drain(&mut s);
        hp.extend(snapshots.iter().filter(|snap| snap.event.is_some()).map(|snap| snap.game.opponent_hp));

        assert_eq!(hp, vec![100, 80, 60, 40, 20, 0]);
        assert_eq!(s.game().status, GameStatus::Won);
        assert_eq!(s.stats().reps[ExerciseMode::ArmRaise], 5);
        let won_at = snapshots.iter().position(|snap| snap.game.status == GameStatus::Won).unwrap();
        assert!(snapshots[won_at].event.is_some());
        assert!(snapshots[won_at].transitions.contains(&Transition::Won { damage: 20 }));
    }

    #[test]
    fn test_won_is_terminal_until_restart() {
        let mut source = ScriptedSource::new(FPS);
        source.extend(reps(ExerciseMode::ArmRaise, 6));
        let mut s = session(&config(), source);
        drain(&mut s);
        assert_eq!(s.game().opponent_hp, 0);
        assert_eq!(s.stats().reps[ExerciseMode::ArmRaise], 5);

        // 終了状態ではモード選択も無視
        s.source_mut().push(Segment::hold(Posture::STANDING, Duration::from_millis(100)));
        let Ok(Step::Frame { snapshot, .. }) = s.step(Some(Command::SelectMode(ExerciseMode::SideStretch))) else {
            panic!("expected a frame");
        };
        assert_eq!(snapshot.transitions[0], Transition::Ignored);
        assert_eq!(snapshot.game.active_mode, ExerciseMode::ArmRaise);

        s.source_mut().extend(reps(ExerciseMode::ArmRaise, 1));
        let Ok(Step::Frame { snapshot, .. }) = s.step(Some(Command::Restart)) else {
            panic!("expected a frame");
        };
        assert_eq!(snapshot.transitions[0], Transition::Restarted);
        assert_eq!(
            (snapshot.game.player_hp, snapshot.game.opponent_hp, snapshot.game.status),
            (100, 100, GameStatus::Playing)
        );
        drain(&mut s);
        assert_eq!(s.game().opponent_hp, 80);
    }

    #[test]
    fn test_intensity_counts_only_accepted_reps() {
        let mut source = ScriptedSource::new(FPS);
        source.extend(reps(ExerciseMode::ArmRaise, 7));
        let mut s = session(&config(), source);
        let snapshots = drain(&mut s);

        let events: Vec<&Snapshot> = snapshots.iter().filter(|snap| snap.event.is_some()).collect();
        assert_eq!(events.len(), 7);
        // 勝った反復は集計に入り、その後の反復は入らない
        let won = events.iter().find(|snap| snap.game.status == GameStatus::Won).unwrap();
        assert_eq!(won.intensity.count, 5);
        assert!(events[5..].iter().all(|snap| snap.transitions.contains(&Transition::Ignored)));
        assert_eq!(snapshots.last().unwrap().intensity.count, 5);
    }

    #[test]
    fn test_mode_switch_discards_partial_rep() {
        let mut source = ScriptedSource::new(FPS);
        let [rise, hold, fall, rest] = Segment::rep(ExerciseMode::ArmRaise, 1.0, RepTiming::default());
        source.extend([rise, hold]);
        let mut s = session(&config(), source);
        drain(&mut s);

        s.source_mut().extend([fall, rest]);
        let mut snapshots = Vec::new();
        if let Ok(Step::Frame { snapshot, .. }) = s.step(Some(Command::SelectMode(ExerciseMode::SideStretch))) {
            snapshots.push(*snapshot);
        }
        snapshots.extend(drain(&mut s));

        assert!(snapshots.iter().all(|snap| snap.event.is_none()));
        assert_eq!(s.game().opponent_hp, 100);
        assert_eq!(s.game().active_mode, ExerciseMode::SideStretch);
        assert_eq!(s.stats().total_reps(), 0);
    }

    #[test]
    fn test_heal_mode_restores_player() {
        let mut config = config();
        config.game.opponent_attack_interval_ms = 1_000;
        config.game.opponent_attack_damage = 10;
        let mut source = ScriptedSource::new(FPS);
        source.push(Segment::hold(Posture::STANDING, Duration::from_millis(3_500)));
        let mut s = session(&config, source);
        drain(&mut s);
        assert_eq!(s.game().player_hp, 70);

        s.source_mut().extend(reps(ExerciseMode::ChairSquat, 1));
        s.step(Some(Command::SelectMode(ExerciseMode::ChairSquat))).unwrap();
        drain(&mut s);
        assert_eq!(s.stats().reps[ExerciseMode::ChairSquat], 1);
        assert!(s.stats().healing > 0);
    }

    #[test]
    fn test_face_absence_decays_to_unknown() {
        let mut source = ScriptedSource::new(FPS).idle_in(Posture::STANDING);
        source.set_expression(Some(Expression::Smile));
        let mut s = session(&config(), source);
        for _ in 0..30 {
            s.step(None).unwrap();
        }
        assert_eq!(s.mood().mood, Mood::Enjoying);

        s.source_mut().set_expression(None);
        let mut prev = s.mood().confidence;
        for _ in 0..30 {
            let Step::Frame { snapshot, .. } = s.step(None).unwrap() else {
                panic!("expected a frame");
            };
            assert!(snapshot.mood.confidence <= prev);
            prev = snapshot.mood.confidence;
        }
        assert_eq!(s.mood().mood, Mood::Unknown);
        assert_eq!(s.mood().confidence, 0.0);
    }

    #[test]
    fn test_advisory_not_repeated_within_cooldown() {
        let mut source = ScriptedSource::new(FPS).idle_in(Posture::STANDING);
        source.set_expression(Some(Expression::Smile));
        let config = config();
        let cooldown = Duration::from_millis(config.advisor.cooldown_ms);
        let mut s = session(&config, source);

        let mut issued = Vec::new();
        for _ in 0..(FPS * 20) {
            if let Step::Frame { snapshot, .. } = s.step(None).unwrap() {
                issued.extend(snapshot.issued);
            }
        }
        let encouragement: Vec<&Advisory> = issued
            .iter()
            .filter(|adv| adv.category == AdvisoryCategory::Encouragement)
            .collect();
        assert!(encouragement.len() >= 2);
        for pair in encouragement.windows(2) {
            assert!(pair[1].issued_at - pair[0].issued_at >= cooldown);
        }
    }

    #[test]
    fn test_missing_face_model_uses_fallback() {
        let mut source = ScriptedSource::new(FPS);
        source.set_expression(Some(Expression::Smile));
        source.extend(reps(ExerciseMode::ArmRaise, 2));
        let mut s = Session::new(&config(), source, SyntheticDetector::without_face()).unwrap();
        let snapshots = drain(&mut s);
        assert!(snapshots.iter().all(|snap| snap.mood.mood != Mood::Enjoying));
        assert!(snapshots.iter().any(|snap| snap.mood.mood == Mood::Focused));
        assert!(snapshots.iter().all(|snap| snap.mood.confidence <= 0.5 + 1e-6));
        assert_eq!(s.stats().reps[ExerciseMode::ArmRaise], 2);
    }

    #[test]
    fn test_capture_failure_is_fatal() {
        let source = ScriptedSource::new(FPS).idle_in(Posture::STANDING).fail_at(10);
        let mut s = session(&config(), source);
        let mut commands = Commands(VecDeque::new());
        let mut sink = RecordingSink::default();
        let result = s.run(&mut commands, &mut sink);
        assert!(matches!(result, Err(SessionError::CaptureFailed(_))));
        assert_eq!(sink.snapshots.len(), 10);
    }

    #[test]
    fn test_quit_stops_after_current_frame() {
        let source = ScriptedSource::new(FPS).idle_in(Posture::STANDING);
        let mut s = session(&config(), source);
        let mut commands = Commands(VecDeque::from([None, None, Some(Command::Quit), None]));
        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let summary = s.run(&mut commands, &mut sink).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(sink.snapshots.len(), 3);
    }

    #[test]
    fn test_run_applies_commands_at_next_frame() {
        let source = ScriptedSource::new(FPS).idle_in(Posture::STANDING);
        let mut s = session(&config(), source);
        let (tx, mut rx) = mpsc::channel();
        tx.send(Command::SelectMode(ExerciseMode::ChairSquat)).unwrap();
        tx.send(Command::Quit).unwrap();
        let mut sink = RecordingSink::default();
        let summary = s.run(&mut rx, &mut sink).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(sink.snapshots[0].game.active_mode, ExerciseMode::ArmRaise);
        assert_eq!(sink.snapshots[1].game.active_mode, ExerciseMode::ChairSquat);
        assert_eq!(summary.final_state.active_mode, ExerciseMode::ChairSquat);
    }

    #[test]
    fn test_capture_end_finishes_cleanly() {
        let mut source = ScriptedSource::new(FPS);
        source.push(Segment::hold(Posture::STANDING, Duration::from_millis(480)));
        let mut s = session(&config(), source);
        let summary = s.run(&mut Commands(VecDeque::new()), &mut RecordingSink::default()).unwrap();
        assert_eq!(summary.frames, 12);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.game.max_hp = 0;
        let source = ScriptedSource::new(FPS);
        let result = Session::new(&config, source, SyntheticDetector::with_face());
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
