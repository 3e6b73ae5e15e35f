//! Sketch resolution
//!
//! Turns a user supplied path (a `.ino` file or a sketch directory, absolute
//! or relative) into the sketch directory, the absolute `.ino` path and the
//! baud rate the sketch opens its serial port with.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::{ArdiError, Result};

/// Sketch file extension
pub const SKETCH_EXTENSION: &str = "ino";

/// A resolved sketch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    /// Absolute sketch directory
    pub directory: PathBuf,
    /// Absolute path to the `.ino` file
    pub sketch: PathBuf,
    /// Baud rate found in the sketch, 0 if none
    pub baud: u32,
}

/// Resolve `path` to a sketch
///
/// - a `.ino` file resolves to itself and its parent directory
/// - a directory must contain exactly one `.ino` file
/// - anything else is `SketchMissing`
pub fn resolve(path: impl AsRef<Path>) -> Result<Sketch> {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).map_err(|e| ArdiError::io(path, e))?;

    let (directory, sketch) = if absolute.is_file() && is_sketch_file(&absolute) {
        let directory = absolute
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ArdiError::SketchMissing(absolute.clone()))?;
        (directory, absolute)
    } else if absolute.is_dir() {
        let sketch = find_sketch(&absolute)?;
        (absolute, sketch)
    } else {
        return Err(ArdiError::SketchMissing(absolute));
    };

    let baud = detect_baud(&sketch);
    debug!(sketch = %sketch.display(), baud, "Resolved sketch");

    Ok(Sketch {
        directory,
        sketch,
        baud,
    })
}

/// Find the single `.ino` file directly inside `directory`
fn find_sketch(directory: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(directory).map_err(|e| ArdiError::io(directory, e))?;

    let mut sketches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArdiError::io(directory, e))?;
        let path = entry.path();
        if path.is_file() && is_sketch_file(&path) {
            sketches.push(path);
        }
    }

    match sketches.len() {
        1 => Ok(sketches.remove(0)),
        0 => Err(ArdiError::SketchMissing(directory.to_path_buf())),
        count => Err(ArdiError::AmbiguousSketch {
            directory: directory.to_path_buf(),
            count,
        }),
    }
}

fn is_sketch_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SKETCH_EXTENSION)
}

/// Scan a sketch for the first `Serial.begin(N);` and return `N`
///
/// Unreadable files and unparsable numbers yield 0 so the build's own baud
/// or a command line override can decide.
pub fn detect_baud(sketch: &Path) -> u32 {
    let Ok(re) = Regex::new(r"Serial\.begin\((\d+)\);") else {
        return 0;
    };

    let file = match fs::File::open(sketch) {
        Ok(file) => file,
        Err(e) => {
            debug!(sketch = %sketch.display(), "Failed to read sketch: {e}");
            return 0;
        }
    };

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else {
            return 0;
        };
        if let Some(caps) = re.captures(&line) {
            return caps[1].parse().unwrap_or(0);
        }
    }

    0
}
