//! Input schemas for survey results and user profiles
//!
//! Survey results carry one session's gaze stream, screen size and form answers.
//! User profiles carry demographics keyed by the same user identity.

mod records;
mod adapter;

pub use records::*;
pub use adapter::*;
