//! Search command implementation.

use artindex_core::{ArtifactSearch, Predicate, RepositoryIndexManager};
use serde::Serialize;
use std::sync::Arc;

/// One search hit as printed by `--format json`.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    /// `groupId:artifactId:packaging[:classifier]:version`.
    pub coordinate: String,
    /// Group identifier.
    pub group_id: String,
    /// Artifact identifier.
    pub artifact_id: String,
    /// Version.
    pub version: String,
    /// Classifier, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    /// Packaging.
    pub packaging: String,
    /// Path relative to the repository root.
    pub path: String,
}

/// Runs the search command.
pub fn run(
    manager: &Arc<RepositoryIndexManager>,
    storage: &str,
    repository: &str,
    query: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let predicate: Predicate = query.parse()?;
    let search = ArtifactSearch::new(Arc::clone(manager));
    let entries = search.entries(storage, repository, &predicate)?;

    let hits: Vec<SearchHit> = entries
        .into_iter()
        .map(|entry| SearchHit {
            coordinate: entry.coordinate.to_string(),
            group_id: entry.coordinate.group_id,
            artifact_id: entry.coordinate.artifact_id,
            version: entry.coordinate.version,
            classifier: entry.coordinate.classifier,
            packaging: entry.coordinate.packaging,
            path: entry.relative_path,
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&hits)?),
        _ => {
            for hit in &hits {
                println!("{}  {}", hit.coordinate, hit.path);
            }
            println!();
            println!("{} match(es) for {predicate}", hits.len());
        }
    }

    Ok(())
}
