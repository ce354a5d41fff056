//! # Riskgate (Login Risk Assessment)
//!
//! `riskgate` evaluates every sign-in against the history of earlier sign-ins
//! for the same identity and decides whether to allow it, allow it with a
//! warning, or block it.
//!
//! ## Scoring
//!
//! An attempt starts at zero and gains a fixed weight for each signal that
//! fires: a device never seen for the identity (+40), a network address never
//! seen (+20), a local hour in `[0, 5)` (+15) and less than 60 seconds since the
//! previous attempt (+10). A residual jitter in `[0, 10)` is added and the total
//! is clamped to `0..=100`.
//!
//! ## Decisions
//!
//! - **Low** (`< 40`): allowed, session created.
//! - **Medium** (`40..70`): flagged, session created with a warning.
//! - **High** (`>= 70`): blocked, no session, score disclosed.
//!
//! Invalid credentials never reach scoring and are never recorded. Every attempt
//! with valid credentials, blocked ones included, is appended to the identity's
//! ledger so later scoring sees the full pattern.
//!
//! ## Recovery
//!
//! A user can sign in with a one-time code sent out of band. Recovered sign-ins
//! are recorded with score 0.

pub mod api;
pub mod cli;
pub mod risk;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
