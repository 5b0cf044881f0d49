//! Label Decoder - class index → class name for the stage-1 classifier

use std::path::Path;

use serde::Deserialize;

use super::artifacts::{read_json, ArtifactError};
use super::inference::InferenceError;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelDecoder {
    classes: Vec<String>,
}

/// Accepted on-disk shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
    Wrapped { classes: Vec<String> },
    Bare(Vec<String>),
}

impl LabelDecoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let classes = match read_json::<LabelFile>(path)? {
            LabelFile::Wrapped { classes } | LabelFile::Bare(classes) => classes,
        };

        if classes.is_empty() {
            return Err(ArtifactError::invalid(path, "label decoder has no classes"));
        }

        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn decode(&self, index: i64) -> Result<&str, InferenceError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
            .ok_or(InferenceError::UnknownClass(index))
    }
}
