use crate::pattern::PatternError;

/// Errors raised while building or checking grammar commands.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    /// A rule pattern does not parse.
    #[error("rule \"{rule}\": {source}")]
    Pattern {
        rule: String,
        #[source]
        source: PatternError,
    },

    /// A rule is defined as an empty list of alternatives.
    #[error("rule \"{0}\" has no alternatives")]
    EmptyRule(String),

    /// A rule name appears in both the public and private groups.
    #[error("rule \"{0}\" is defined as both public and private")]
    DuplicateRule(String),

    /// A rule is referenced but neither defined nor a built-in import.
    #[error("rule referenced but not defined \"{rule}\" (in \"{referenced_by}\")")]
    UndefinedRule { rule: String, referenced_by: String },

    /// The grammar exports nothing.
    #[error("grammar \"{0}\" has no public rules")]
    NoPublicRules(String),

    /// The grammar name is empty.
    #[error("grammar name must not be empty")]
    EmptyName,

    /// List items were given for a list the grammar never references.
    #[error("list \"{list}\" is not referenced by grammar \"{grammar}\"")]
    UnknownList { grammar: String, list: String },

    /// A load file could not be read.
    #[error("failed to read load file: {0}")]
    LoadFailed(String),

    /// JSON encoding or decoding failed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GrammarError>;
