use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grammar::GrammarSpec;

/// A request to the speech-command service, tagged by its `cmd` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Define a new grammar.
    #[serde(rename = "g.load")]
    Load(GrammarSpec),

    /// Replace the items of one list in a loaded grammar.
    #[serde(rename = "g.list.set")]
    ListSet {
        name: String,
        list: String,
        items: Vec<String>,
    },

    /// Read back the items of one list.
    #[serde(rename = "g.list.get")]
    ListGet { name: String, list: String },

    /// Activate a loaded grammar, optionally changing its priority.
    #[serde(rename = "g.enable")]
    Enable {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<i32>,
    },

    #[serde(rename = "g.disable")]
    Disable { name: String },

    #[serde(rename = "g.unload")]
    Unload { name: String },

    /// Describe every loaded grammar.
    #[serde(rename = "g.show")]
    Show,
}

impl Command {
    pub fn list_set<I, S>(name: impl Into<String>, list: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::ListSet {
            name: name.into(),
            list: list.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// The `cmd` tag this command is sent with.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Load(_) => "g.load",
            Command::ListSet { .. } => "g.list.set",
            Command::ListGet { .. } => "g.list.get",
            Command::Enable { .. } => "g.enable",
            Command::Disable { .. } => "g.disable",
            Command::Unload { .. } => "g.unload",
            Command::Show => "g.show",
        }
    }

    /// JSON text of the command.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
