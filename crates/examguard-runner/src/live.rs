//! Real-time driver.
//!
//! Feeds wall-clock time into a controller once per tick and applies
//! student input as it arrives, until the attempt ends. The controller's
//! clock is brought up to the current instant before each focus loss, so
//! focus events carry their real spacing.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use examguard_core::controller::SessionController;
use examguard_core::integrity::FocusSource;
use examguard_core::model::Answer;
use examguard_core::result::SubmitReason;
use examguard_core::session::{SessionNotice, SessionPhase};

use crate::script::ReplayError;

/// Input from the student while the attempt runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptInput {
    Answer { question_id: String, answer: Answer },
    Navigate(usize),
    FocusLost(FocusSource),
    Submit,
}

pub struct LiveDriver {
    controller: SessionController,
    tick: Duration,
    notices: Option<mpsc::UnboundedSender<SessionNotice>>,
    /// The instant the controller's clock last caught up to.
    last: Instant,
}

impl LiveDriver {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            tick: Duration::from_secs(1),
            notices: None,
            last: Instant::now(),
        }
    }

    /// Forward every notice to `tx` as it happens.
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<SessionNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    /// Run until the attempt is submitted, expires or is terminated. Answer
    /// errors are logged and the attempt continues. When the input channel
    /// closes the countdown keeps running.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<AttemptInput>) -> Result<SessionController> {
        let phase = self.controller.session().phase();
        if phase != SessionPhase::InProgress {
            return Err(ReplayError::NotInProgress(phase).into());
        }

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        self.last = Instant::now();
        let mut inputs_open = true;

        while !self.controller.session().phase().is_terminal() {
            tokio::select! {
                biased;

                input = inputs.recv(), if inputs_open => match input {
                    Some(input) => self.apply(input).await,
                    None => {
                        tracing::debug!("input closed, waiting for the countdown");
                        inputs_open = false;
                    }
                },
                now = ticker.tick() => self.catch_up(now).await,
            }
        }

        Ok(self.controller)
    }

    async fn apply(&mut self, input: AttemptInput) {
        match input {
            AttemptInput::Answer {
                question_id,
                answer,
            } => {
                if let Err(e) = self.controller.select_answer(&question_id, answer) {
                    tracing::warn!("answer rejected: {e}");
                }
            }
            AttemptInput::Navigate(index) => self.controller.navigate(index),
            AttemptInput::FocusLost(source) => {
                self.catch_up(Instant::now()).await;
                let notices = self.controller.focus_lost(source).await;
                self.forward(notices);
            }
            AttemptInput::Submit => match self.controller.submit(SubmitReason::Manual).await {
                Ok(notices) => self.forward(notices),
                Err(e) => tracing::warn!("submit rejected: {e}"),
            },
        }
    }

    /// Advance the controller by the time since the last catch-up.
    async fn catch_up(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last);
        if elapsed.is_zero() {
            return;
        }
        self.last = now;
        let notices = self.controller.advance(elapsed).await;
        self.forward(notices);
    }

    fn forward(&self, notices: Vec<SessionNotice>) {
        if let Some(tx) = &self.notices {
            for notice in notices {
                // The listener may have gone away; the attempt carries on.
                let _ = tx.send(notice);
            }
        }
    }
}
