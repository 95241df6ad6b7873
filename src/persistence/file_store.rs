//! JSON file-backed [`SequenceStore`]. Saves atomically by writing to a
//! sibling temp file and renaming over the destination, so a crash mid-save
//! never leaves a truncated session file behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::ports::persistence::{SequenceSnapshot, SequenceStore, SNAPSHOT_VERSION};

pub struct FileSequenceStore;

impl Default for FileSequenceStore {
    fn default() -> Self {
        Self
    }
}

impl FileSequenceStore {
    pub fn new() -> Self {
        Self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

#[async_trait]
impl SequenceStore for FileSequenceStore {
    async fn save(&self, snapshot: &SequenceSnapshot, path: &str) -> anyhow::Result<()> {
        let path = Path::new(path);
        let temp = Self::temp_path(path);
        let serialized = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&temp, &serialized).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }

    async fn load(&self, path: &str) -> anyhow::Result<SequenceSnapshot> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: SequenceSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "unsupported sequence file version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        validate_snapshot(&snapshot)?;
        Ok(snapshot)
    }
}

/// Whole-graph validation: every dependency name must resolve to a target
/// in the same file, and the dependency graph must be acyclic. Runs before
/// any caller state is touched, per the "atomic load" invariant.
fn validate_snapshot(snapshot: &SequenceSnapshot) -> anyhow::Result<()> {
    use std::collections::{HashMap, HashSet};

    let names: HashSet<&str> = snapshot.targets.iter().map(|t| t.name.as_str()).collect();
    if names.len() != snapshot.targets.len() {
        anyhow::bail!("duplicate target name in sequence file");
    }
    for target in &snapshot.targets {
        for dep in &target.dependencies {
            if !names.contains(dep.as_str()) {
                anyhow::bail!("target {:?} depends on unknown target {:?}", target.name, dep);
            }
        }
    }

    let graph: HashMap<&str, &[String]> = snapshot
        .targets
        .iter()
        .map(|t| (t.name.as_str(), t.dependencies.as_slice()))
        .collect();

    let mut visiting: HashSet<&str> = HashSet::new();
    let mut done: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, &'a [String]>,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> anyhow::Result<()> {
        if done.contains(node) {
            return Ok(());
        }
        if !visiting.insert(node) {
            anyhow::bail!("dependency cycle involving target {:?}", node);
        }
        if let Some(deps) = graph.get(node) {
            for dep in deps.iter() {
                visit(dep.as_str(), graph, visiting, done)?;
            }
        }
        visiting.remove(node);
        done.insert(node);
        Ok(())
    }

    for name in graph.keys() {
        visit(name, &graph, &mut visiting, &mut done)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::persistence::GlobalPolicySnapshot;
    use crate::domain::models::sequence::GlobalPolicy;

    fn sample_snapshot() -> SequenceSnapshot {
        SequenceSnapshot {
            version: SNAPSHOT_VERSION,
            global_policy: GlobalPolicySnapshot::from(&GlobalPolicy::default()),
            targets: vec![],
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSequenceStore::new();
        let snapshot = sample_snapshot();
        store.save(&snapshot, path.to_str().unwrap()).await.unwrap();
        let loaded = store.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(loaded.version, snapshot.version);
    }

    #[tokio::test]
    async fn load_rejects_unknown_dependency() {
        use crate::ports::persistence::TargetSnapshot;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut snapshot = sample_snapshot();
        snapshot.targets.push(TargetSnapshot {
            name: "B".to_string(),
            enabled: true,
            priority: 5,
            coordinates: None,
            dependencies: vec!["A".to_string()],
            alternatives: vec![],
            tasks: vec![],
            min_altitude_degrees: None,
            timeout_secs: None,
        });
        let store = FileSequenceStore::new();
        store.save(&snapshot, path.to_str().unwrap()).await.unwrap();
        assert!(store.load(path.to_str().unwrap()).await.is_err());
    }
}
