//! Process lifecycle facts extracted from a trace.
//!
//! The tree builder only needs an ordered list of [`ProcessFact`]s. Where they
//! come from is behind [`FactSource`], so tests (or a different tracer format)
//! can supply their own events.

use crate::types::ProcessFact;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// 1234 10:00:00.100000 <anything>; the timestamp is optional
static EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<pid>\d+)\s+(?:(?P<time>\d+:\d+:\d+\.\d+)\s+)?(?P<body>.*)$").unwrap()
});

// clone(child_stack=NULL, flags=CLONE_CHILD_CLEARTID|SIGCHLD, child_tidptr=0x7f9f93f88a10) = 337653
static SPAWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:clone3?|v?fork)\(.*\)\s+=\s(?P<child>\d+)").unwrap()
});

// <... clone resumed>, child_tidptr=0x7f9f93f88a10) = 337654
static SPAWN_RESUMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<\.\.\.\s(?:clone3?|v?fork)\sresumed>.*\)\s+=\s(?P<child>\d+)").unwrap()
});

// execve("/bin/ls", ["ls", "-l"], 0x7ffeec7c3190 /* 20 vars */) = 0
static EXEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^execve(?:at)?\((?P<args>.*)\)\s+=\s0\b").unwrap());

static EXEC_STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^execve(?:at)?\((?P<args>.*)<unfinished\s\.\.\.>$").unwrap()
});

static EXEC_RESUMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<\.\.\.\sexecve(?:at)?\sresumed>.*\)\s+=\s0\b").unwrap()
});

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?P<s>(?:[^"\\]|\\.)*)""#).unwrap());

// The argv array: a run of quoted strings, possibly truncated with `...`
static ARGV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[(?P<argv>(?:"(?:[^"\\]|\\.)*"(?:\.\.\.)?(?:,\s*)?)*)(?:\.\.\.)?\]"#).unwrap()
});

/// One raw trace line attributed to a pid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent<'a> {
    pub pid: u32,
    pub timestamp: Option<&'a str>,
    pub body: &'a str,
}

/// A trace event reduced to what matters for process ancestry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Spawn { parent: u32, child: u32 },
    ExecStarted { pid: u32, command: String },
    ExecResumed { pid: u32 },
    Exec { pid: u32, command: String },
    Seen { pid: u32 },
}

impl ProcessEvent {
    pub fn pid(&self) -> u32 {
        match self {
            ProcessEvent::Spawn { parent, .. } => *parent,
            ProcessEvent::ExecStarted { pid, .. }
            | ProcessEvent::ExecResumed { pid }
            | ProcessEvent::Exec { pid, .. }
            | ProcessEvent::Seen { pid } => *pid,
        }
    }
}

/// Capability producing process events from a trace
pub trait FactSource {
    fn events<'a>(&self, trace: &'a str) -> Box<dyn Iterator<Item = TraceEvent<'a>> + 'a>;

    fn simplify(&self, event: &TraceEvent<'_>) -> ProcessEvent;
}

/// Reads process events out of `strace -f -t` text
#[derive(Debug, Default, Clone, Copy)]
pub struct StraceFactSource;

impl FactSource for StraceFactSource {
    fn events<'a>(&self, trace: &'a str) -> Box<dyn Iterator<Item = TraceEvent<'a>> + 'a> {
        Box::new(trace.lines().filter_map(parse_event))
    }

    fn simplify(&self, event: &TraceEvent<'_>) -> ProcessEvent {
        let pid = event.pid;
        let body = event.body;

        if let Some(child) = SPAWN
            .captures(body)
            .or_else(|| SPAWN_RESUMED.captures(body))
            .and_then(|caps| caps["child"].parse::<u32>().ok())
            .filter(|child| *child != 0 && *child != pid)
        {
            return ProcessEvent::Spawn { parent: pid, child };
        }
        if let Some(caps) = EXEC.captures(body) {
            return ProcessEvent::Exec {
                pid,
                command: exec_command(&caps["args"]),
            };
        }
        if let Some(caps) = EXEC_STARTED.captures(body) {
            return ProcessEvent::ExecStarted {
                pid,
                command: exec_command(&caps["args"]),
            };
        }
        if EXEC_RESUMED.is_match(body) {
            return ProcessEvent::ExecResumed { pid };
        }
        ProcessEvent::Seen { pid }
    }
}

fn parse_event(line: &str) -> Option<TraceEvent<'_>> {
    let caps = EVENT.captures(line)?;
    Some(TraceEvent {
        pid: caps.name("pid")?.as_str().parse().ok()?,
        timestamp: caps.name("time").map(|m| m.as_str()),
        body: caps.name("body")?.as_str(),
    })
}

/// Command line of an exec: argv joined by spaces, or the executable's
/// basename when argv is empty or unreadable.
fn exec_command(args: &str) -> String {
    let argv: Vec<&str> = ARGV
        .captures(args)
        .and_then(|caps| caps.name("argv"))
        .map(|m| {
            QUOTED
                .captures_iter(m.as_str())
                .filter_map(|c| c.name("s").map(|s| s.as_str()))
                .collect()
        })
        .unwrap_or_default();
    if !argv.is_empty() {
        return argv.join(" ");
    }

    QUOTED
        .captures(args)
        .and_then(|caps| caps.name("s"))
        .map(|path| {
            let path = path.as_str();
            path.rsplit('/').next().unwrap_or(path).to_string()
        })
        .unwrap_or_default()
}

fn ensure(order: &mut Vec<u32>, processes: &mut HashMap<u32, ProcessFact>, pid: u32) {
    processes.entry(pid).or_insert_with(|| {
        order.push(pid);
        ProcessFact {
            pid,
            name: String::new(),
            parent: None,
        }
    });
}

/// Run a fact source over a trace and fold its events into process facts.
///
/// A process is recorded the first time its pid appears, so the result is in
/// order of first appearance. Spawned children inherit their parent's name
/// until they exec.
pub fn collect_facts<S: FactSource + ?Sized>(source: &S, trace: &str) -> Vec<ProcessFact> {
    let mut order: Vec<u32> = Vec::new();
    let mut processes: HashMap<u32, ProcessFact> = HashMap::new();
    let mut pending_exec: HashMap<u32, String> = HashMap::new();

    for event in source.events(trace) {
        let simplified = source.simplify(&event);
        ensure(&mut order, &mut processes, simplified.pid());

        match simplified {
            ProcessEvent::Spawn { parent, child } => {
                let inherited = processes
                    .get(&parent)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                ensure(&mut order, &mut processes, child);
                if let Some(fact) = processes.get_mut(&child) {
                    if fact.parent.is_none() {
                        fact.parent = Some(parent);
                    }
                    if fact.name.is_empty() {
                        fact.name = inherited;
                    }
                }
            }
            ProcessEvent::ExecStarted { pid, command } => {
                pending_exec.insert(pid, command);
            }
            ProcessEvent::ExecResumed { pid } => {
                if let (Some(command), Some(fact)) =
                    (pending_exec.remove(&pid), processes.get_mut(&pid))
                {
                    fact.name = command;
                }
            }
            ProcessEvent::Exec { pid, command } => {
                if let Some(fact) = processes.get_mut(&pid) {
                    fact.name = command;
                }
            }
            ProcessEvent::Seen { .. } => {}
        }
    }

    order
        .into_iter()
        .filter_map(|pid| processes.remove(&pid))
        .collect()
}
