//! Metadata command implementation.

use artindex_core::RepositoryIndexManager;

/// Runs the metadata command.
pub fn run(
    manager: &RepositoryIndexManager,
    storage: &str,
    repository: &str,
    group: &str,
    artifact: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = manager
        .metadata(storage, repository, group, artifact)?
        .ok_or_else(|| format!("no metadata for {group}:{artifact} in {storage}:{repository}"))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
