//! Typed commands for the maclink speech-command service.
//!
//! Grammars are named sets of rules written in a small pattern language;
//! lists are runtime-replaceable word sets that rules reference as `{name}`.
//! [`Command`] values serialize to the JSON requests the service expects, and
//! [`GrammarSpec::check`] catches definition mistakes before anything is sent.

pub mod command;
pub mod error;
pub mod grammar;
pub mod load;
pub mod pattern;
pub mod reply;

pub use command::Command;
pub use error::{GrammarError, Result};
pub use grammar::{GrammarSpec, GrammarSummary, RuleBody, BUILTIN_RULES};
pub use load::{LoadPlan, MAX_LOAD_FILE_BYTES};
pub use pattern::{parse_pattern, Pattern, PatternError, PatternErrorKind};
pub use reply::Reply;
