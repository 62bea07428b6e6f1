use crate::types::{Arguments, ProcessNode, StraceBehavior};
use anyhow::{Context, Result};
use duckdb::{Appender, Connection, params};
use std::sync::{Arc, Mutex};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// One appender per table, reused across every trace a worker handles
pub struct BehaviorAppender<'conn> {
    syscalls: Appender<'conn>,
    arguments: Appender<'conn>,
    processes: Appender<'conn>,
}

impl<'conn> BehaviorAppender<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        Ok(Self {
            syscalls: conn.appender("syscalls")?,
            arguments: conn.appender("syscall_arguments")?,
            processes: conn.appender("processes")?,
        })
    }

    /// Append every record, argument and process of one trace
    pub fn append(&mut self, trace_file: &str, behavior: &StraceBehavior) -> Result<()> {
        for (seq, record) in behavior.processes.iter().enumerate() {
            let seq = seq as i64;
            let raw_args = match &record.arguments {
                Arguments::Raw(raw) => Some(raw.as_str()),
                Arguments::Named(_) => None,
            };
            self.syscalls.append_row(params![
                trace_file,
                seq,
                &record.pid,
                &record.time,
                &record.syscall,
                raw_args,
                &record.retval,
            ])?;

            for (position, arg) in record.arguments.named().iter().enumerate() {
                self.arguments.append_row(params![
                    trace_file,
                    seq,
                    position as i64,
                    &arg.name,
                    &arg.value,
                ])?;
            }
        }

        for root in &behavior.processtree {
            let mut stack: Vec<(&ProcessNode, i64)> = vec![(root, 0)];
            while let Some((node, depth)) = stack.pop() {
                self.processes.append_row(params![
                    trace_file,
                    node.pid,
                    &node.name,
                    node.parent_id,
                    depth,
                    root.pid,
                ])?;
                stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.syscalls.flush()?;
        self.arguments.flush()?;
        self.processes.flush()?;
        Ok(())
    }
}

impl Database {
    /// Initialize a new database with schema
    pub fn init(path: &str) -> Result<Self> {
        let conn =
            Connection::open(path).context(format!("Failed to open database at {}", path))?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS syscalls (
                trace_file VARCHAR,
                seq BIGINT,
                pid VARCHAR,
                time VARCHAR,
                syscall VARCHAR,
                raw_args TEXT,
                retval VARCHAR
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS syscall_arguments (
                trace_file VARCHAR,
                seq BIGINT,
                position BIGINT,
                name VARCHAR,
                value TEXT
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS processes (
                trace_file VARCHAR,
                pid UINTEGER,
                name VARCHAR,
                parent_id UINTEGER,
                depth BIGINT,
                root_pid UINTEGER
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_syscall ON syscalls(syscall)",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_pid ON syscalls(pid)", [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trace_file ON syscalls(trace_file)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_process_parent ON processes(parent_id)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get a clone of the connection for concurrent access
    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Append one trace's analysis in a single batch
    pub fn append_behavior(&self, trace_file: &str, behavior: &StraceBehavior) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
        let mut appender = BehaviorAppender::new(&conn)?;
        appender.append(trace_file, behavior)?;
        appender.flush()?;
        Ok(())
    }

    pub fn count_syscalls(&self) -> Result<usize> {
        self.count("syscalls")
    }

    pub fn count_processes(&self) -> Result<usize> {
        self.count("processes")
    }

    fn count(&self, table: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
        let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM {}", table))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NamedArgument, SyscallRecord};

    fn sample() -> StraceBehavior {
        StraceBehavior {
            processes: vec![
                SyscallRecord {
                    pid: "100".to_string(),
                    time: "10:00:00.000000".to_string(),
                    syscall: "read".to_string(),
                    arguments: Arguments::Named(vec![
                        NamedArgument {
                            name: "fd".to_string(),
                            value: "3".to_string(),
                        },
                        NamedArgument {
                            name: "buf".to_string(),
                            value: "\"x\"".to_string(),
                        },
                    ]),
                    retval: "1".to_string(),
                },
                SyscallRecord {
                    pid: "100".to_string(),
                    time: "10:00:00.000001".to_string(),
                    syscall: "mystery".to_string(),
                    arguments: Arguments::Raw("1, 2".to_string()),
                    retval: "0".to_string(),
                },
            ],
            processtree: vec![ProcessNode {
                name: "sh".to_string(),
                pid: 100,
                parent_id: None,
                children: vec![ProcessNode {
                    name: "cat".to_string(),
                    pid: 101,
                    parent_id: Some(100),
                    children: vec![ProcessNode::leaf("cat", 102, Some(101))],
                }],
            }],
        }
    }

    #[test]
    fn test_database_init() {
        let db = Database::init(":memory:").expect("Failed to create database");
        assert_eq!(db.count_syscalls().expect("Failed to count"), 0);
        assert_eq!(db.count_processes().expect("Failed to count"), 0);
    }

    #[test]
    fn test_append_behavior() {
        let db = Database::init(":memory:").expect("Failed to create database");
        db.append_behavior("strace.log", &sample())
            .expect("Failed to append");

        assert_eq!(db.count_syscalls().unwrap(), 2);
        assert_eq!(db.count_processes().unwrap(), 3);

        let conn = db.conn.lock().unwrap();
        let args: i64 = conn
            .prepare("SELECT COUNT(*) FROM syscall_arguments WHERE seq = 0")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(args, 2);

        let raw: Option<String> = conn
            .prepare("SELECT raw_args FROM syscalls WHERE syscall = 'mystery'")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(raw.as_deref(), Some("1, 2"));

        let (depth, root): (i64, u32) = conn
            .prepare("SELECT depth, root_pid FROM processes WHERE pid = 102")
            .unwrap()
            .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!((depth, root), (2, 100));
    }

    #[test]
    fn test_concurrent_appends() {
        use std::thread;

        let db = Arc::new(Database::init(":memory:").expect("Failed to create database"));

        let handles: Vec<_> = (0..3)
            .map(|thread_id| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for i in 0..10 {
                        db.append_behavior(&format!("trace_{}_{}.log", thread_id, i), &sample())
                            .expect("Failed to append");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(db.count_syscalls().unwrap(), 60);
        assert_eq!(db.count_processes().unwrap(), 90);
    }
}
