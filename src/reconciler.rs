use crate::parser::{self, CompleteLine, ResumedLine, StartedLine};
use crate::signatures::SignatureTable;
use crate::types::{Arguments, NamedArgument, SyscallRecord};
use log::debug;
use std::collections::{HashMap, VecDeque};

/// Pair every started line with the first unconsumed resumed line of the same
/// pid and syscall, in scan order.
///
/// Each paired call is written to the returned buffer as a complete line
/// `pid time partial+rest`, using the resumed line's time. Lines left without
/// a partner are dropped.
pub fn log_concat(started: &[StartedLine<'_>], resumed: &[ResumedLine<'_>]) -> String {
    let mut pending: HashMap<(&str, &str), VecDeque<usize>> = HashMap::new();
    for (idx, tail) in resumed.iter().enumerate() {
        pending
            .entry((tail.pid, tail.syscall))
            .or_default()
            .push_back(idx);
    }

    let mut data = String::new();
    for head in started {
        let Some(idx) = pending
            .get_mut(&(head.pid, head.syscall))
            .and_then(VecDeque::pop_front)
        else {
            continue;
        };
        let tail = &resumed[idx];
        data.push_str(tail.pid);
        data.push(' ');
        data.push_str(tail.time);
        data.push(' ');
        data.push_str(head.partial);
        data.push_str(tail.rest);
        data.push('\n');
    }
    data
}

/// Decodes trace text into syscall records using a shared signature table
pub struct Reconciler<'a> {
    signatures: &'a SignatureTable,
}

impl<'a> Reconciler<'a> {
    pub fn new(signatures: &'a SignatureTable) -> Self {
        Self { signatures }
    }

    /// Reconcile split calls and decode every complete event.
    ///
    /// Records from lines complete in the trace come first, in line order,
    /// followed by the reconciled pairs in started-line order.
    pub fn reconcile_and_parse(&self, trace: &str) -> Vec<SyscallRecord> {
        let started: Vec<StartedLine> = trace.lines().filter_map(parser::parse_started).collect();
        let resumed: Vec<ResumedLine> = trace.lines().filter_map(parser::parse_resumed).collect();
        let reconciled = log_concat(&started, &resumed);

        let records: Vec<SyscallRecord> = trace
            .lines()
            .chain(reconciled.lines())
            .filter_map(parser::parse_complete)
            .map(|line| self.decode(&line))
            .collect();

        debug!(
            "Reconciled {} of {} unfinished calls ({} resumed lines), {} records",
            reconciled.lines().count(),
            started.len(),
            resumed.len(),
            records.len()
        );

        records
    }

    /// Bind a complete line's positional arguments to the syscall's signature
    pub fn decode(&self, line: &CompleteLine<'_>) -> SyscallRecord {
        let arguments = match self.signatures.params(line.syscall) {
            Some(names) => Arguments::Named(
                names
                    .iter()
                    .zip(parser::split_arguments(line.args))
                    .map(|(name, value)| NamedArgument {
                        name: name.clone(),
                        value: value.to_string(),
                    })
                    .collect(),
            ),
            None => Arguments::Raw(line.args.to_string()),
        };

        SyscallRecord {
            pid: line.pid.to_string(),
            time: line.time.to_string(),
            syscall: line.syscall.to_string(),
            arguments,
            retval: line.retval.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SignatureTable {
        [
            ("read", vec!["fd", "buf", "count"]),
            ("close", vec!["fd"]),
            ("wait4", vec!["pid", "stat_addr", "options", "ru"]),
            ("bind", vec!["fd", "umyaddr", "addrlen"]),
        ]
        .into_iter()
        .collect()
    }

    fn named(pairs: &[(&str, &str)]) -> Arguments {
        Arguments::Named(
            pairs
                .iter()
                .map(|(name, value)| NamedArgument {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        )
    }

    fn started(line: &str) -> StartedLine<'_> {
        parser::parse_started(line).expect("started line")
    }

    fn resumed(line: &str) -> ResumedLine<'_> {
        parser::parse_resumed(line).expect("resumed line")
    }

    #[test]
    fn test_decode_complete_line() {
        let table = table();
        let records = Reconciler::new(&table)
            .reconcile_and_parse("1234 10:00:00.100000 read(3, \"hello\", 5) = 5\n");

        assert_eq!(
            records,
            vec![SyscallRecord {
                pid: "1234".to_string(),
                time: "10:00:00.100000".to_string(),
                syscall: "read".to_string(),
                arguments: named(&[("fd", "3"), ("buf", "\"hello\""), ("count", "5")]),
                retval: "5".to_string(),
            }]
        );
    }

    #[test]
    fn test_split_pair_uses_resumed_time() {
        let table = table();
        let trace = "1234 10:00:00.100000 read(3, <unfinished ...>\n\
                     1234 10:00:00.200000 <... read resumed>\"hello\", 5) = 5\n";
        let records = Reconciler::new(&table).reconcile_and_parse(trace);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, "10:00:00.200000");
        assert_eq!(
            records[0].arguments,
            named(&[("fd", "3"), ("buf", "\"hello\""), ("count", "5")])
        );
        assert_eq!(records[0].retval, "5");
    }

    #[test]
    fn test_log_concat_is_verbatim_concatenation() {
        let heads = [started("77 01:02:03.000001 wait4(1387721 <unfinished ...>")];
        let tails = [resumed(
            "77 01:02:04.000002 <... wait4 resumed>, [{WIFEXITED(s) && WEXITSTATUS(s) == 0}], 0, NULL) = 1387721",
        )];
        assert_eq!(
            log_concat(&heads, &tails),
            "77 01:02:04.000002 wait4(1387721 , [{WIFEXITED(s) && WEXITSTATUS(s) == 0}], 0, NULL) = 1387721\n"
        );
    }

    #[test]
    fn test_log_concat_at_most_one_pairing() {
        let heads = [
            started("5 00:00:01.000000 read(3, <unfinished ...>"),
            started("5 00:00:02.000000 read(4, <unfinished ...>"),
        ];
        let tails = [resumed("5 00:00:03.000000 <... read resumed>\"x\", 1) = 1")];

        let data = log_concat(&heads, &tails);
        assert_eq!(data, "5 00:00:03.000000 read(3, \"x\", 1) = 1\n");
    }

    #[test]
    fn test_log_concat_matches_pid_and_syscall() {
        let heads = [
            started("5 00:00:01.000000 read(3, <unfinished ...>"),
            started("6 00:00:01.500000 close(9 <unfinished ...>"),
        ];
        let tails = [
            resumed("6 00:00:02.000000 <... read resumed>\"y\", 1) = 1"),
            resumed("6 00:00:02.500000 <... close resumed>) = 0"),
            resumed("5 00:00:03.000000 <... read resumed>\"x\", 1) = 1"),
        ];

        let data = log_concat(&heads, &tails);
        assert_eq!(
            data,
            "5 00:00:03.000000 read(3, \"x\", 1) = 1\n6 00:00:02.500000 close(9 ) = 0\n"
        );
    }

    #[test]
    fn test_every_started_line_is_considered() {
        // Consecutive heads that each find a partner must all pair.
        let heads = [
            started("1 00:00:01.000000 read(3, <unfinished ...>"),
            started("1 00:00:02.000000 read(4, <unfinished ...>"),
            started("1 00:00:03.000000 read(5, <unfinished ...>"),
        ];
        let tails = [
            resumed("1 00:00:04.000000 <... read resumed>\"a\", 1) = 1"),
            resumed("1 00:00:05.000000 <... read resumed>\"b\", 1) = 1"),
            resumed("1 00:00:06.000000 <... read resumed>\"c\", 1) = 1"),
        ];

        let data = log_concat(&heads, &tails);
        assert_eq!(data.lines().count(), 3);
        assert!(data.contains("00:00:04.000000 read(3, \"a\""));
        assert!(data.contains("00:00:05.000000 read(4, \"b\""));
        assert!(data.contains("00:00:06.000000 read(5, \"c\""));
    }

    #[test]
    fn test_unmatched_lines_are_dropped() {
        let table = table();
        let trace = "9 00:00:01.000000 read(3, <unfinished ...>\n\
                     9 00:00:02.000000 <... close resumed>) = 0\n";
        assert!(Reconciler::new(&table).reconcile_and_parse(trace).is_empty());
    }

    #[test]
    fn test_complete_records_precede_reconciled() {
        let table = table();
        let trace = "1 00:00:01.000000 read(3, <unfinished ...>\n\
                     2 00:00:01.500000 close(4) = 0\n\
                     1 00:00:02.000000 <... read resumed>\"x\", 1) = 1\n\
                     2 00:00:03.000000 close(5) = 0\n";
        let records = Reconciler::new(&table).reconcile_and_parse(trace);

        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.syscall.as_str(), r.time.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("close", "00:00:01.500000"),
                ("close", "00:00:03.000000"),
                ("read", "00:00:02.000000"),
            ]
        );
    }

    #[test]
    fn test_unknown_syscall_falls_back_to_raw() {
        let table = table();
        let records = Reconciler::new(&table)
            .reconcile_and_parse("1 00:00:01.000000 openat(AT_FDCWD, \"/etc/passwd\", O_RDONLY) = 3");

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].arguments,
            Arguments::Raw("AT_FDCWD, \"/etc/passwd\", O_RDONLY".to_string())
        );
    }

    #[test]
    fn test_argument_count_mismatch_truncates() {
        let table = table();
        let reconciler = Reconciler::new(&table);

        let extra = reconciler.reconcile_and_parse("1 00:00:01.000000 close(3, 4, 5) = 0");
        assert_eq!(extra[0].arguments, named(&[("fd", "3")]));

        let short = reconciler.reconcile_and_parse("1 00:00:01.000000 read(3) = -1 EBADF (Bad file descriptor)");
        assert_eq!(short[0].arguments, named(&[("fd", "3")]));
        assert_eq!(short[0].retval, "-1 EBADF (Bad file descriptor)");
    }

    #[test]
    fn test_struct_argument_stays_whole() {
        let table = table();
        let records = Reconciler::new(&table).reconcile_and_parse(
            "1 00:00:01.000000 bind(3, {sa_family=AF_INET, sin_port=htons(80)}, 16) = 0",
        );
        assert_eq!(
            records[0].arguments,
            named(&[
                ("fd", "3"),
                ("umyaddr", "{sa_family=AF_INET, sin_port=htons(80)}"),
                ("addrlen", "16"),
            ])
        );
    }

    #[test]
    fn test_empty_and_malformed_traces() {
        let table = table();
        let reconciler = Reconciler::new(&table);
        assert!(reconciler.reconcile_and_parse("").is_empty());
        assert!(
            reconciler
                .reconcile_and_parse("garbage\n1 00:00:01.000000 +++ exited with 0 +++\n")
                .is_empty()
        );
    }
}
