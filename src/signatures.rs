use crate::error::SignatureError;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SignatureFile {
    syscalls: Vec<SignatureEntry>,
}

#[derive(Debug, Deserialize)]
struct SignatureEntry {
    name: String,
    signature: Vec<String>,
    #[serde(default)]
    file: Option<String>,
}

/// A syscall's ordered parameter names and the kernel source file declaring it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<String>,
    pub file: Option<String>,
}

/// Immutable mapping from syscall name to its ordered argument names.
///
/// Loaded once and shared read-only between analyses.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: HashMap<String, Signature>,
}

impl SignatureTable {
    /// Load the Linux syscall data file: `{"syscalls": [{"name", "signature", "file"}]}`
    pub fn from_path(path: &Path) -> Result<Self, SignatureError> {
        let file = File::open(path).map_err(|source| SignatureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded {} syscall signatures from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SignatureError> {
        let parsed: SignatureFile = serde_json::from_reader(reader)?;
        let entries = parsed
            .syscalls
            .into_iter()
            .map(|entry| {
                (
                    entry.name,
                    Signature {
                        params: entry.signature,
                        file: entry.file,
                    },
                )
            })
            .collect();
        Ok(Self { entries })
    }

    /// Argument names for `syscall`, if the table knows it
    pub fn params(&self, syscall: &str) -> Option<&[String]> {
        self.entries.get(syscall).map(|sig| sig.params.as_slice())
    }

    pub fn get(&self, syscall: &str) -> Option<&Signature> {
        self.entries.get(syscall)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, P> FromIterator<(N, Vec<P>)> for SignatureTable
where
    N: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, Vec<P>)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(name, params)| {
                (
                    name.into(),
                    Signature {
                        params: params.into_iter().map(Into::into).collect(),
                        file: None,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}
