//! Stage registry
//!
//! Ordered list of a job's stages, built from one `stage_summary` event.
//! The order is fixed once built; only statuses and percents change.

use serde::{Deserialize, Serialize};

use crate::domain::stage::{StageEntry, StageStatus};
use crate::dto::event::StageSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageRegistry {
    entries: Vec<StageEntry>,
}

impl StageRegistry {
    /// Builds a registry from a stage summary, every entry pending at 0%
    ///
    /// A repeated summary replaces the registry wholesale; stage sets are
    /// never merged.
    pub fn from_summary(stages: &[StageSpec]) -> Self {
        Self {
            entries: stages
                .iter()
                .map(|spec| StageEntry::pending(spec.name.clone(), spec.resolved_weight()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&StageEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Marks `name` running and every stage before it completed at 100%
    ///
    /// Stages after `name` keep their status. An unknown name leaves the
    /// registry untouched.
    pub fn mark_started(&mut self, name: &str) {
        let Some(position) = self.entries.iter().position(|entry| entry.name == name) else {
            return;
        };

        for entry in &mut self.entries[..position] {
            entry.status = StageStatus::Completed;
            entry.percent = 100;
        }

        let current = &mut self.entries[position];
        if current.status != StageStatus::Completed {
            current.status = StageStatus::Running;
        }
    }

    /// Records progress for `name`; a completed stage stays completed
    pub fn update(&mut self, name: &str, percent: u8) {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.name == name) else {
            return;
        };
        if entry.status == StageStatus::Completed {
            return;
        }
        entry.status = StageStatus::Running;
        entry.percent = percent;
    }

    /// Forces every stage to completed at 100%
    pub fn complete_all(&mut self) {
        for entry in &mut self.entries {
            entry.status = StageStatus::Completed;
            entry.percent = 100;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[(&str, f64)]) -> StageRegistry {
        let specs: Vec<StageSpec> = names
            .iter()
            .map(|(name, weight)| StageSpec::new(*name, *weight))
            .collect();
        StageRegistry::from_summary(&specs)
    }

    #[test]
    fn test_from_summary_preserves_order() {
        let stages = registry(&[("parse", 10.0), ("translate", 80.0), ("render", 10.0)]);
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["parse", "translate", "render"]);
        assert!(
            stages
                .iter()
                .all(|s| s.status == StageStatus::Pending && s.percent == 0)
        );
    }

    #[test]
    fn test_mark_started_completes_predecessors() {
        let mut stages = registry(&[("a", 30.0), ("b", 70.0)]);
        stages.mark_started("b");

        let a = stages.get("a").unwrap();
        assert_eq!(a.status, StageStatus::Completed);
        assert_eq!(a.percent, 100);
        assert_eq!(stages.get("b").unwrap().status, StageStatus::Running);
    }

    #[test]
    fn test_mark_started_leaves_later_stages() {
        let mut stages = registry(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        stages.mark_started("c");
        stages.mark_started("a");

        assert_eq!(stages.get("a").unwrap().status, StageStatus::Completed);
        assert_eq!(stages.get("b").unwrap().status, StageStatus::Completed);
        assert_eq!(stages.get("c").unwrap().status, StageStatus::Running);
    }

    #[test]
    fn test_mark_started_unknown_stage() {
        let mut stages = registry(&[("a", 1.0)]);
        let before = stages.clone();
        stages.mark_started("zzz");
        assert_eq!(stages, before);
    }

    #[test]
    fn test_update_does_not_revert_completed() {
        let mut stages = registry(&[("a", 1.0), ("b", 1.0)]);
        stages.mark_started("b");
        stages.update("a", 40);
        stages.update("b", 55);

        assert_eq!(stages.get("a").unwrap().status, StageStatus::Completed);
        assert_eq!(stages.get("a").unwrap().percent, 100);
        assert_eq!(stages.get("b").unwrap().percent, 55);
    }

    #[test]
    fn test_complete_all() {
        let mut stages = registry(&[("a", 1.0), ("b", 1.0)]);
        stages.update("a", 20);
        stages.complete_all();
        assert!(
            stages
                .iter()
                .all(|s| s.status == StageStatus::Completed && s.percent == 100)
        );
    }
}
