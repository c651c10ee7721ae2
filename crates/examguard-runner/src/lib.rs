//! examguard-runner: drivers that run a session in time.
//!
//! [`LiveDriver`] follows the wall clock and takes input over a channel.
//! [`replay_script`] replays a timed script on the session's virtual clock.

pub mod live;
pub mod script;

pub use live::{AttemptInput, LiveDriver};
pub use script::{
    replay_script, resolve_option, AttemptScript, ReplayError, ReplayReport, ScriptAction,
    ScriptEnd, ScriptStep,
};
