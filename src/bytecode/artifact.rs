use super::{NativeAssets, build_project};
use crate::error::BuildError;
use crate::flow::Project;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};

/// Version written into every artifact. Readers reject anything else.
pub const FORMAT_VERSION: u32 = 1;

/// A project packaged for distribution: the definition for the interpreted
/// runtime, the binary assets for a native backend, or both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompiledProject {
    pub version: u32,
    pub interpreter: Option<Project>,
    pub native: Option<NativeAssets>,
}

impl CompiledProject {
    pub fn new(interpreter: Option<Project>, native: Option<NativeAssets>) -> Self {
        Self {
            version: FORMAT_VERSION,
            interpreter,
            native,
        }
    }

    /// Packages both representations of a project.
    pub fn build(project: &Project) -> Result<Self, BuildError> {
        let native = build_project(project)?;
        Ok(Self::new(Some(project.clone()), Some(native)))
    }

    /// Packages only the interpreted representation; works for projects
    /// containing components without a binary form.
    pub fn interpreted(project: &Project) -> Result<Self, BuildError> {
        crate::flow::validate(project)?;
        Ok(Self::new(Some(project.clone()), None))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildError> {
        encode_to_vec(self, standard())
            .map_err(|e| BuildError::Generic(format!("Serialization failed: {}", e)))
    }

    /// Saves the artifact to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), BuildError> {
        let bytes = self.to_bytes()?;
        let mut file = fs::File::create(path).map_err(|e| {
            BuildError::Generic(format!("Could not create file '{}': {}", path, e))
        })?;
        file.write_all(&bytes).map_err(|e| {
            BuildError::Generic(format!("Could not write to file '{}': {}", path, e))
        })?;
        Ok(())
    }

    pub fn from_file(path: &str) -> Result<Self, BuildError> {
        let mut file = fs::File::open(path)
            .map_err(|e| BuildError::Generic(format!("Could not open file '{}': {}", path, e)))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            BuildError::Generic(format!("Could not read from file '{}': {}", path, e))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BuildError> {
        let artifact: Self = decode_from_slice(bytes, standard())
            .map(|(artifact, _)| artifact)
            .map_err(|e| BuildError::Generic(format!("Deserialization failed: {}", e)))?;
        if artifact.version != FORMAT_VERSION {
            return Err(BuildError::Generic(format!(
                "Unsupported artifact version {} (expected {})",
                artifact.version, FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }
}
