use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{ChorusError, ChorusResult};

/// One subtask emitted by the decomposition LLM (spec §3 "Decomposition").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique id within the decomposition.
    #[serde(rename = "subtaskId")]
    pub subtask_id: String,
    /// Short name for the subtask.
    #[serde(rename = "subtaskName")]
    pub subtask_name: String,
    /// Ids of subtasks that must complete before this one is ready.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Opaque label hinting which subtasks may run concurrently.
    #[serde(rename = "parallelGroup")]
    pub parallel_group: String,
    /// Optional 1–5 complexity estimate.
    #[serde(rename = "estimatedComplexity", default)]
    pub complexity: Option<u8>,
    /// Optional longer description, falling back to `subtask_name`.
    #[serde(default)]
    pub description: Option<String>,
}

/// The DAG emitted by the decomposition LLM for one [`crate::task::Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    /// Id of the main task this decomposition belongs to.
    pub main_task_id: Uuid,
    /// The flattened subtask list.
    pub subtasks: Vec<Subtask>,
}

impl Decomposition {
    /// Validates the invariants of spec §3: acyclic, every dependency id
    /// exists, and subtask ids are unique. Returns a
    /// [`ChorusError::Decomposition`] describing the first violation found.
    pub fn validate(&self) -> ChorusResult<()> {
        if self.subtasks.is_empty() {
            return Err(ChorusError::Decomposition(
                "decomposition produced no subtasks".into(),
            ));
        }

        let mut seen = HashSet::new();
        for s in &self.subtasks {
            if !seen.insert(s.subtask_id.as_str()) {
                return Err(ChorusError::Decomposition(format!(
                    "duplicate subtask id {}",
                    s.subtask_id
                )));
            }
        }

        let ids: HashSet<&str> = self.subtasks.iter().map(|s| s.subtask_id.as_str()).collect();
        for s in &self.subtasks {
            for dep in &s.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(ChorusError::Decomposition(format!(
                        "subtask {} depends on unknown id {}",
                        s.subtask_id, dep
                    )));
                }
            }
        }

        if has_cycle(&self.subtasks) {
            return Err(ChorusError::Decomposition(
                "dependency graph contains a cycle".into(),
            ));
        }

        Ok(())
    }
}

/// Three-color DFS cycle detection over the subtask dependency graph.
fn has_cycle(subtasks: &[Subtask]) -> bool {
    use std::collections::HashMap;

    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let by_id: HashMap<&str, &Subtask> = subtasks.iter().map(|s| (s.subtask_id.as_str(), s)).collect();
    let mut color: HashMap<&str, Color> = subtasks.iter().map(|s| (s.subtask_id.as_str(), Color::White)).collect();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Subtask>,
        color: &mut HashMap<&'a str, Color>,
    ) -> bool {
        match color.get(id) {
            Some(Color::Gray) => return true,
            Some(Color::Black) => return false,
            _ => {}
        }
        color.insert(id, Color::Gray);
        if let Some(s) = by_id.get(id) {
            for dep in &s.dependencies {
                if visit(dep.as_str(), by_id, color) {
                    return true;
                }
            }
        }
        color.insert(id, Color::Black);
        false
    }

    for s in subtasks {
        if color.get(s.subtask_id.as_str()) == Some(&Color::White)
            && visit(s.subtask_id.as_str(), &by_id, &mut color)
        {
            return true;
        }
    }
    false
}
