#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_studio::data::{Record, record};
use tempfile::{TempDir, tempdir};

pub const ORDERS_CSV: &str = "\
id,customer,city,amount,paid,ordered_at
1,Alice,Paris,42.5,true,2024-01-05
2,Bob,Lyon,13.37,false,2024-02-10
3,Chloé,Paris,7,true,2024-03-15
4,Dan,Nice,100,true,2024-04-20
5,Eve,,55,false,
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Text-cell records shaped like a freshly loaded CSV.
pub fn text_records(headers: &[&str], rows: &[&[&str]]) -> Vec<Record> {
    rows.iter()
        .map(|row| record(headers.iter().copied().zip(row.iter().copied())))
        .collect()
}
