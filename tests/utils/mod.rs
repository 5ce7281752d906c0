// Shared fixtures for integration tests
//
// Builds a small deployment on disk: three services in a chain (svc_1
// depends on svc_2, svc_2 on svc_3), labeled training incidents where a full
// disk on svc_1 drags the rest down, and a locator config tuned for the tiny
// corpus.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TOPOLOGY_JSON: &str = r#"{"svc_2": ["svc_1"], "svc_3": ["svc_2"]}"#;

/// Loose enough for a corpus of a few dozen lines; template 0 is "disk full"
pub const CONFIG_TOML: &str = r#"
high_frequency_threshold = 0.5
min_edge_support = 2
actionable_templates = [0]
"#;

pub struct Deployment {
    pub dir: TempDir,
    pub training: PathBuf,
    pub topology: PathBuf,
    pub config: PathBuf,
    pub cache: PathBuf,
}

impl Deployment {
    /// Unlabeled incident export next to the training data
    pub fn incident(&self, name: &str, rows: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        write_csv(&path, "triggername", rows);
        path
    }
}

pub fn write_csv(path: &Path, header: &str, rows: &[&str]) {
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn labeled_incident() -> Vec<&'static str> {
    let mut rows = vec![
        "svc_1 disk full,1",
        "svc_2 link down,0",
        "svc_3 oom killer,0",
    ];
    rows.extend(std::iter::repeat("svc_3 heartbeat ok,0").take(8));
    rows
}

/// Three training incidents with one root cause each, plus one with two labels
pub fn deployment() -> Deployment {
    let dir = TempDir::new().unwrap();
    let training = dir.path().join("train");
    fs::create_dir(&training).unwrap();

    for i in 0..3 {
        write_csv(
            &training.join(format!("{}.csv", i)),
            "triggername,is_root",
            &labeled_incident(),
        );
    }
    write_csv(
        &training.join("3.csv"),
        "triggername,is_root",
        &["svc_1 disk full,1", "svc_2 link down,1"],
    );

    let topology = dir.path().join("topology.json");
    fs::write(&topology, TOPOLOGY_JSON).unwrap();

    let config = dir.path().join("faultline.toml");
    fs::write(&config, CONFIG_TOML).unwrap();

    let cache = dir.path().join("cache");

    Deployment {
        dir,
        training,
        topology,
        config,
        cache,
    }
}
