//! Master label files: one block of unit names per utterance.
//!
//! ```text
//! #!MLF!#
//! "trn/spk1/a/u001.lab"
//! sil
//! ah
//! sil
//! .
//! ```
//!
//! Label lines may also carry start and end times (`0 1200000 ah`); only the name is kept.

use std::path::{Path, PathBuf};

use crate::error::TrainingError;

const CONTEXT: &str = "label file";
const HEADER: &str = "#!MLF!#";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub label_path: String,
    pub units: Vec<String>,
}

impl LabelEntry {
    /// The feature file holding this entry's frames: the label path with a `.txt`
    /// extension, resolved against `data_root`.
    pub fn feature_path(&self, data_root: &Path) -> PathBuf {
        data_root.join(Path::new(&self.label_path).with_extension("txt"))
    }
}

pub fn read_labels(path: &Path) -> Result<Vec<LabelEntry>, TrainingError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| TrainingError::io("read label file", e))?;
    let entries = parse_labels(&text)?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "label file: loaded");
    Ok(entries)
}

pub fn parse_labels(text: &str) -> Result<Vec<LabelEntry>, TrainingError> {
    let mut entries = Vec::new();
    let mut current: Option<LabelEntry> = None;

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line == HEADER {
            continue;
        }
        let fail = |message: String| {
            TrainingError::parse(CONTEXT, format!("line {}: {message}", number + 1))
        };

        if line.starts_with('"') {
            if let Some(open) = &current {
                return Err(fail(format!("block `{}` is not terminated by `.`", open.label_path)));
            }
            let label_path = line.trim_matches('"');
            if label_path.is_empty() {
                return Err(fail("empty label path".to_string()));
            }
            current = Some(LabelEntry {
                label_path: label_path.to_string(),
                units: Vec::new(),
            });
            continue;
        }

        if line == "." {
            match current.take() {
                Some(entry) => entries.push(entry),
                None => return Err(fail("`.` outside of a block".to_string())),
            }
            continue;
        }

        let Some(entry) = current.as_mut() else {
            return Err(fail(format!("label `{line}` outside of a block")));
        };
        entry.units.push(unit_name(line).ok_or_else(|| fail(format!("malformed label `{line}`")))?);
    }

    if let Some(open) = current {
        return Err(TrainingError::parse(
            CONTEXT,
            format!("block `{}` is not terminated by `.`", open.label_path),
        ));
    }
    Ok(entries)
}

fn unit_name(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [name] => Some(name.to_string()),
        [start, end, name, ..] if start.parse::<u64>().is_ok() && end.parse::<u64>().is_ok() => {
            Some(name.to_string())
        }
        _ => None,
    }
}
