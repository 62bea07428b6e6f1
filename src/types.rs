use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single positional argument bound to its name from the signature table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedArgument {
    pub name: String,
    pub value: String,
}

/// Decoded arguments of a syscall.
///
/// Either every consumed token is bound to a signature name, or the whole
/// argument text is kept verbatim. The two are never mixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arguments {
    Named(Vec<NamedArgument>),
    Raw(String),
}

impl Arguments {
    pub fn is_raw(&self) -> bool {
        matches!(self, Arguments::Raw(_))
    }

    /// Named arguments, empty for the raw fallback
    pub fn named(&self) -> &[NamedArgument] {
        match self {
            Arguments::Named(args) => args,
            Arguments::Raw(_) => &[],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArgumentEntry {
    Named(NamedArgument),
    Raw(String),
}

// Both forms serialize as a list: named pairs, or a single raw string.
impl Serialize for Arguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arguments::Named(args) => args.serialize(serializer),
            Arguments::Raw(raw) => [raw].serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Arguments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<ArgumentEntry>::deserialize(deserializer)?;
        let single = entries.len() == 1;
        let mut named = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                ArgumentEntry::Named(arg) => named.push(arg),
                ArgumentEntry::Raw(raw) if single => return Ok(Arguments::Raw(raw)),
                ArgumentEntry::Raw(_) => {
                    return Err(serde::de::Error::custom(
                        "raw argument text mixed with named arguments",
                    ));
                }
            }
        }
        Ok(Arguments::Named(named))
    }
}

/// A fully decoded syscall event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallRecord {
    pub pid: String,
    pub time: String,
    pub syscall: String,
    pub arguments: Arguments,
    pub retval: String,
}

/// A normalized statement that a process exists and who spawned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFact {
    pub pid: u32,
    pub name: String,
    pub parent: Option<u32>,
}

/// One process in the assembled tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessNode {
    pub name: String,
    pub pid: u32,
    pub parent_id: Option<u32>,
    pub children: Vec<ProcessNode>,
}

impl ProcessNode {
    pub fn leaf(name: impl Into<String>, pid: u32, parent_id: Option<u32>) -> Self {
        Self {
            name: name.into(),
            pid,
            parent_id,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ProcessNode::count).sum::<usize>()
    }
}

/// Combined result of analysing one trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StraceBehavior {
    pub processes: Vec<SyscallRecord>,
    pub processtree: Vec<ProcessNode>,
}
