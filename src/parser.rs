use once_cell::sync::Lazy;
use regex::Regex;

// 1234 10:00:00.100000 read(3, "hello", 5) = 5
static COMPLETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<pid>\d+)
        \s+
        (?P<time>\d+:\d+:\d+\.\d+)
        \s+
        (?P<syscall>\w+)
        \((?P<args>.*)\)       # greedy: args run to the last `) =`
        \s+=\s
        (?P<retval>.+)
        $",
    )
    .unwrap()
});

// 1234 10:00:00.100000 read(3, <unfinished ...>
static STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<pid>\d+)
        \s+
        (?P<time>\d+:\d+:\d+\.\d+)
        \s+
        (?P<partial>(?P<syscall>\w+)\(.*)
        <unfinished\s\.\.\.>
        $",
    )
    .unwrap()
});

// 1234 10:00:00.200000 <... read resumed>"hello", 5) = 5
static RESUMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<pid>\d+)
        \s+
        (?P<time>\d+:\d+:\d+\.\d+)
        \s+
        <\.\.\.\s(?P<syscall>\w+)\sresumed>
        (?P<rest>.*)
        $",
    )
    .unwrap()
});

/// A single-line syscall: `pid time syscall(args) = retval`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteLine<'a> {
    pub pid: &'a str,
    pub time: &'a str,
    pub syscall: &'a str,
    pub args: &'a str,
    pub retval: &'a str,
}

/// The first half of a blocked syscall: `pid time syscall(partial <unfinished ...>`
///
/// `partial` keeps the `syscall(` prefix and any trailing whitespace before the
/// marker, so appending the resumed remainder yields a complete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedLine<'a> {
    pub pid: &'a str,
    pub time: &'a str,
    pub syscall: &'a str,
    pub partial: &'a str,
}

/// The second half of a blocked syscall: `pid time <... syscall resumed>rest`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumedLine<'a> {
    pub pid: &'a str,
    pub time: &'a str,
    pub syscall: &'a str,
    pub rest: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLine<'a> {
    Complete(CompleteLine<'a>),
    Started(StartedLine<'a>),
    Resumed(ResumedLine<'a>),
}

/// Parse a complete line: pid time syscall(args) = retval
pub fn parse_complete(line: &str) -> Option<CompleteLine<'_>> {
    let caps = COMPLETE.captures(line)?;
    Some(CompleteLine {
        pid: caps.name("pid")?.as_str(),
        time: caps.name("time")?.as_str(),
        syscall: caps.name("syscall")?.as_str(),
        args: caps.name("args")?.as_str(),
        retval: caps.name("retval")?.as_str(),
    })
}

/// Parse an unfinished line: pid time syscall(args <unfinished ...>
pub fn parse_started(line: &str) -> Option<StartedLine<'_>> {
    if !line.contains("<unfinished ...>") {
        return None;
    }
    let caps = STARTED.captures(line)?;
    Some(StartedLine {
        pid: caps.name("pid")?.as_str(),
        time: caps.name("time")?.as_str(),
        syscall: caps.name("syscall")?.as_str(),
        partial: caps.name("partial")?.as_str(),
    })
}

/// Parse a resumed line: pid time <... syscall resumed>args) = ret
pub fn parse_resumed(line: &str) -> Option<ResumedLine<'_>> {
    if !line.contains(" resumed>") {
        return None;
    }
    let caps = RESUMED.captures(line)?;
    Some(ResumedLine {
        pid: caps.name("pid")?.as_str(),
        time: caps.name("time")?.as_str(),
        syscall: caps.name("syscall")?.as_str(),
        rest: caps.name("rest")?.as_str(),
    })
}

/// Parse any strace line by trying all formats
pub fn parse_line(line: &str) -> Option<TraceLine<'_>> {
    // Try unfinished and resumed first since they have specific markers
    parse_started(line)
        .map(TraceLine::Started)
        .or_else(|| parse_resumed(line).map(TraceLine::Resumed))
        .or_else(|| parse_complete(line).map(TraceLine::Complete))
}

/// Split raw argument text into positional tokens.
///
/// A comma only separates arguments outside `{...}`; whitespace following a
/// separator is dropped. Nothing else is trimmed.
pub fn split_arguments(args: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = args.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                tokens.push(&args[start..i]);
                start = i + 1;
                while let Some(&(j, ws)) = chars.peek() {
                    if !ws.is_whitespace() {
                        break;
                    }
                    start = j + ws.len_utf8();
                    chars.next();
                }
            }
            _ => {}
        }
    }
    tokens.push(&args[start..]);
    tokens
}
