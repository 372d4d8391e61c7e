//! Benchmark utilities.

#![warn(missing_docs)]

use artindex_core::Coordinate;
use artindex_testkit::TestStorage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CLASSIFIERS: [&str; 3] = ["sources", "javadoc", "tests"];
const PACKAGING: [&str; 3] = ["jar", "pom", "war"];

/// Generates `count` coordinates spread over a few groups and artifacts.
pub fn random_coordinates(count: usize, seed: u64) -> Vec<Coordinate> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let version = format!(
                "{}.{}.{}",
                rng.gen_range(0..5),
                rng.gen_range(0..20),
                rng.gen_range(0..10)
            );
            let coordinate = Coordinate::new(
                format!("org.bench.g{}", rng.gen_range(0..10)),
                format!("lib{}", rng.gen_range(0..50)),
                version,
                PACKAGING[rng.gen_range(0..PACKAGING.len())],
            );
            if rng.gen_bool(0.3) {
                coordinate.with_classifier(CLASSIFIERS[rng.gen_range(0..CLASSIFIERS.len())])
            } else {
                coordinate
            }
        })
        .collect()
}

/// Writes `artifacts` x `versions` jar files into a repository. Returns the
/// number of files written.
pub fn populate(
    storage: &TestStorage,
    storage_id: &str,
    repository_id: &str,
    artifacts: usize,
    versions: usize,
) -> usize {
    for a in 0..artifacts {
        for v in 0..versions {
            storage.generate_artifact(
                storage_id,
                repository_id,
                &format!("org.bench.g{}:lib{a}:1.{v}", a % 4),
            );
        }
    }
    artifacts * versions
}
