//! Rebuild and rebuild-metadata command implementation.

use artindex_core::{CoreError, RebuildReport, RepositoryIndexManager};

/// What the command rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Index entries and metadata.
    Full,
    /// Metadata only.
    MetadataOnly,
}

/// Runs the rebuild command.
pub fn run(
    manager: &RepositoryIndexManager,
    storage: &str,
    repository: Option<&str>,
    path: Option<&str>,
    mode: Mode,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = match mode {
        Mode::Full => manager.rebuild(storage, repository, path),
        Mode::MetadataOnly => manager.rebuild_metadata(storage, repository, path),
    };

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(CoreError::Rebuild(err)) => {
            print_report(&err.report);
            println!();
            println!("Failed artifact groups: {}", err.failures.len());
            for failure in &err.failures {
                println!("  {}/{}", failure.repository, failure.artifact_path);
                for cause in &failure.errors {
                    println!("    {cause}");
                }
            }
            Err(format!("{} artifact group(s) failed", err.failures.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &RebuildReport) {
    println!("Rebuild Report");
    println!("==============");
    println!("Repositories:     {}", report.repositories);
    println!(
        "Artifact groups:  {}/{}",
        report.groups_completed, report.groups_total
    );
    println!("Entries indexed:  {}", report.entries_indexed);
    println!("Metadata written: {}", report.metadata_written);
}
