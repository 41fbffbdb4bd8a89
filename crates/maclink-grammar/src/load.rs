use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{GrammarError, Result};
use crate::grammar::{GrammarSpec, GrammarSummary};

/// Load files larger than this are refused.
pub const MAX_LOAD_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// A grammar definition together with initial contents for its lists.
///
/// On disk:
///
/// ```json
/// {
///   "grammar": { "name": "home", "public": { "cat": "feed [the] cat" } },
///   "lists": { "room": ["kitchen", "bedroom"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPlan {
    pub grammar: GrammarSpec,
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<String>>,
}

impl LoadPlan {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| GrammarError::LoadFailed(format!("{}: {err}", path.display())))?;
        if metadata.len() > MAX_LOAD_FILE_BYTES {
            return Err(GrammarError::LoadFailed(format!(
                "{}: file exceeds {MAX_LOAD_FILE_BYTES} bytes",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| GrammarError::LoadFailed(format!("{}: {err}", path.display())))?;
        Self::from_json(&text)
    }

    /// Check the grammar and make sure every list given is one it uses.
    pub fn check(&self) -> Result<GrammarSummary> {
        let summary = self.grammar.check()?;
        if let Some(list) = self.lists.keys().find(|list| !summary.lists.contains(*list)) {
            return Err(GrammarError::UnknownList {
                grammar: self.grammar.name.clone(),
                list: list.clone(),
            });
        }
        Ok(summary)
    }

    /// The commands to send, in order: `g.load`, then one `g.list.set` per list.
    pub fn commands(&self) -> Vec<Command> {
        std::iter::once(Command::Load(self.grammar.clone()))
            .chain(self.lists.iter().map(|(list, items)| Command::ListSet {
                name: self.grammar.name.clone(),
                list: list.clone(),
                items: items.clone(),
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"{
        "grammar": {
            "name": "test",
            "public": {
                "doors": "(open | lock | close) ([the] <door> door | all doors)",
                "cat": "feed [the] (cat | kitty)"
            },
            "private": { "door": "{door}", "room": "{room}" }
        },
        "lists": {
            "room": ["kitchen", "bedroom", "living room", "dining room"],
            "door": ["front", "side", "garage"]
        }
    }"#;

    #[test]
    fn commands_start_with_load_then_lists_in_order() {
        let plan = LoadPlan::from_json(HOME).unwrap();
        plan.check().unwrap();

        let kinds: Vec<&str> = plan.commands().iter().map(Command::kind).collect();
        assert_eq!(kinds, vec!["g.load", "g.list.set", "g.list.set"]);

        match &plan.commands()[1] {
            Command::ListSet { name, list, items } => {
                assert_eq!(name, "test");
                assert_eq!(list, "door");
                assert_eq!(items.len(), 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn lists_are_optional() {
        let plan =
            LoadPlan::from_json(r#"{"grammar":{"name":"g","public":{"cat":"feed the cat"}}}"#)
                .unwrap();
        assert!(plan.lists.is_empty());
        assert_eq!(plan.commands().len(), 1);
    }

    #[test]
    fn unreferenced_list_is_rejected() {
        let plan = LoadPlan::from_json(
            r#"{"grammar":{"name":"g","public":{"cat":"feed the cat"}},"lists":{"room":["kitchen"]}}"#,
        )
        .unwrap();
        assert!(matches!(
            plan.check(),
            Err(GrammarError::UnknownList { ref list, .. }) if list == "room"
        ));
    }

    #[test]
    fn missing_file_is_load_failure() {
        let err = LoadPlan::from_path(Path::new("/nonexistent/maclink/load.json")).unwrap_err();
        assert!(matches!(err, GrammarError::LoadFailed(_)));
    }
}
