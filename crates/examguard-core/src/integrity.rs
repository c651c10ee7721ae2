//! Integrity monitoring.
//!
//! Two signal sources feed one [`SecurityState`]:
//!
//! - the focus watcher, fed with visibility-hidden and window-blur events,
//!   counts violations and escalates once the limit is reached;
//! - the simulated proctoring signal, which runs a pair of Bernoulli trials
//!   every [`SIGNAL_CHECK_PERIOD`] while a camera stream is held.
//!
//! The monitor never mutates the security state itself. It returns
//! [`IntegrityEvent`]s and the session applies them.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::Settings;

/// Focus-loss events tolerated before the attempt is terminated.
pub const MAX_VIOLATIONS: u32 = 3;

/// How long a raised warning flag stays up.
pub const WARNING_CLEAR_DELAY: Duration = Duration::from_secs(5);

/// Period of the simulated proctoring check.
pub const SIGNAL_CHECK_PERIOD: Duration = Duration::from_secs(15);

/// Chance per check that an eye warning is raised.
pub const EYE_WARNING_PROBABILITY: f64 = 0.10;

/// Chance per check that a face warning is raised.
pub const FACE_WARNING_PROBABILITY: f64 = 0.05;

/// The three presentation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningFlag {
    Eye,
    Face,
    TabSwitch,
}

impl fmt::Display for WarningFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningFlag::Eye => write!(f, "eye movement detected outside exam area"),
            WarningFlag::Face => write!(f, "face not clearly visible"),
            WarningFlag::TabSwitch => write!(f, "focus left the exam"),
        }
    }
}

/// Where a focus-loss observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSource {
    /// The document became hidden (tab switch, minimize).
    VisibilityHidden,
    /// The window lost focus.
    WindowBlur,
}

/// How to treat a tab switch that fires both a visibility and a blur event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusLossPolicy {
    /// Every observation is a violation.
    #[default]
    CountEach,
    /// An observation from the other source within `window` of the last
    /// counted one is the same physical switch and is dropped.
    Coalesce { window: Duration },
}

/// One-shot events the monitor hands to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityEvent {
    /// A counted focus loss. The session records a violation and raises the
    /// tab-switch flag.
    FocusLost(FocusSource),
    /// A simulated proctoring warning.
    WarningRaised(WarningFlag),
    /// The violation limit was reached. Raised at most once per attempt.
    ViolationLimitReached { violations: u32 },
}

/// A warning flag with a generation counter so that only the clear
/// scheduled by the latest raise can lower it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FlagState {
    raised: bool,
    generation: u64,
}

/// Warning flags and the violation counter of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityState {
    eye: FlagState,
    face: FlagState,
    tab_switch: FlagState,
    violation_count: u32,
    max_violations: u32,
}

impl SecurityState {
    pub fn new() -> Self {
        Self::with_limit(MAX_VIOLATIONS)
    }

    pub fn with_limit(max_violations: u32) -> Self {
        Self {
            eye: FlagState::default(),
            face: FlagState::default(),
            tab_switch: FlagState::default(),
            violation_count: 0,
            max_violations,
        }
    }

    /// Raise a flag and return the generation its clear must present.
    pub fn raise(&mut self, flag: WarningFlag) -> u64 {
        let state = self.flag_mut(flag);
        state.raised = true;
        state.generation += 1;
        state.generation
    }

    /// Lower a flag if `generation` is still the latest raise. A stale clear
    /// from an earlier warning leaves a newer one standing.
    pub fn clear(&mut self, flag: WarningFlag, generation: u64) -> bool {
        let state = self.flag_mut(flag);
        if state.raised && state.generation == generation {
            state.raised = false;
            true
        } else {
            false
        }
    }

    pub fn is_raised(&self, flag: WarningFlag) -> bool {
        match flag {
            WarningFlag::Eye => self.eye.raised,
            WarningFlag::Face => self.face.raised,
            WarningFlag::TabSwitch => self.tab_switch.raised,
        }
    }

    /// Count one violation and return the new total.
    pub fn record_violation(&mut self) -> u32 {
        self.violation_count += 1;
        self.violation_count
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    /// Flags currently up.
    pub fn active_flags(&self) -> Vec<WarningFlag> {
        [WarningFlag::Eye, WarningFlag::Face, WarningFlag::TabSwitch]
            .into_iter()
            .filter(|f| self.is_raised(*f))
            .collect()
    }

    fn flag_mut(&mut self, flag: WarningFlag) -> &mut FlagState {
        match flag {
            WarningFlag::Eye => &mut self.eye,
            WarningFlag::Face => &mut self.face,
            WarningFlag::TabSwitch => &mut self.tab_switch,
        }
    }
}

impl Default for SecurityState {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform samples in `[0, 1)` for the simulated proctoring signal.
pub trait SignalSource: Send {
    fn sample(&mut self) -> f64;
}

/// ChaCha-backed source; the same seed gives the same warnings.
pub struct SeededSignalSource {
    rng: ChaCha8Rng,
}

impl SeededSignalSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl SignalSource for SeededSignalSource {
    fn sample(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays fixed samples, then returns `1.0` (never a warning).
#[derive(Debug, Default)]
pub struct ScriptedSignalSource {
    samples: VecDeque<f64>,
}

impl ScriptedSignalSource {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// A source that never raises a warning.
    pub fn quiet() -> Self {
        Self::default()
    }
}

impl SignalSource for ScriptedSignalSource {
    fn sample(&mut self) -> f64 {
        self.samples.pop_front().unwrap_or(1.0)
    }
}

/// Focus watcher plus simulated proctoring signal for one attempt.
pub struct IntegrityMonitor {
    eye_tracking: bool,
    face_detection: bool,
    watch_focus: bool,
    policy: FocusLossPolicy,
    source: Box<dyn SignalSource>,
    last_counted: Option<(FocusSource, Duration)>,
    signals_active: bool,
    escalated: bool,
    stopped: bool,
}

impl IntegrityMonitor {
    pub fn new(settings: &Settings, policy: FocusLossPolicy, source: Box<dyn SignalSource>) -> Self {
        Self {
            eye_tracking: settings.eye_tracking,
            face_detection: settings.face_detection,
            watch_focus: settings.prevent_tab_switching,
            policy,
            source,
            last_counted: None,
            signals_active: false,
            escalated: false,
            stopped: false,
        }
    }

    /// Begin the periodic signal checks. Only meaningful when a camera stream
    /// is held and at least one camera feature is enabled.
    pub fn start_signals(&mut self) -> bool {
        if self.stopped || !(self.eye_tracking || self.face_detection) {
            return false;
        }
        self.signals_active = true;
        true
    }

    pub fn signals_active(&self) -> bool {
        self.signals_active
    }

    /// Stop both sources for good.
    pub fn stop(&mut self) {
        self.signals_active = false;
        self.stopped = true;
    }

    /// Feed one focus-loss observation taken at virtual time `now`.
    ///
    /// Returns `None` if focus is not watched, the monitor is stopped, or the
    /// policy folds the observation into the previous one.
    pub fn observe_focus_loss(&mut self, source: FocusSource, now: Duration) -> Option<IntegrityEvent> {
        if self.stopped || !self.watch_focus {
            return None;
        }

        if let FocusLossPolicy::Coalesce { window } = self.policy {
            if let Some((last_source, at)) = self.last_counted {
                if last_source != source && now.saturating_sub(at) <= window {
                    tracing::debug!(?source, "focus loss folded into previous {last_source:?}");
                    return None;
                }
            }
        }

        self.last_counted = Some((source, now));
        Some(IntegrityEvent::FocusLost(source))
    }

    /// Check the violation total against the limit. Fires once; later calls
    /// return `None` whatever the total.
    pub fn escalate(&mut self, violations: u32, max_violations: u32) -> Option<IntegrityEvent> {
        if self.escalated || violations < max_violations {
            return None;
        }
        self.escalated = true;
        Some(IntegrityEvent::ViolationLimitReached { violations })
    }

    pub fn has_escalated(&self) -> bool {
        self.escalated
    }

    /// One periodic check: an eye trial (if eye tracking) and a face trial
    /// (if face detection), each independent.
    pub fn run_signal_check(&mut self) -> Vec<IntegrityEvent> {
        let mut events = Vec::new();
        if !self.signals_active {
            return events;
        }
        if self.eye_tracking && self.source.sample() < EYE_WARNING_PROBABILITY {
            events.push(IntegrityEvent::WarningRaised(WarningFlag::Eye));
        }
        if self.face_detection && self.source.sample() < FACE_WARNING_PROBABILITY {
            events.push(IntegrityEvent::WarningRaised(WarningFlag::Face));
        }
        events
    }
}
