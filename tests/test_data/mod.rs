//! Test data generation utilities
//!
//! Sample slow-query logs in every supported format, written to temporary
//! directories by the helpers below.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// stderr log with inline statements, a paired statement/duration and a
/// multi-line statement
pub const PLAIN_LOG: &str = "\
2024-08-15 10:30:15.123 UTC [12345] postgres@testdb psql: LOG:  duration: 1045.123 ms  statement: SELECT * FROM users WHERE active = true;
2024-08-15 10:30:16.789 UTC [12346] admin@analytics pgbench: ERROR:  relation \"missing_table\" does not exist
2024-08-15 10:30:18.345 UTC [12348] postgres@testdb psql: LOG:  statement: UPDATE products SET price = 10 WHERE id = 7
2024-08-15 10:30:18.567 UTC [12348] postgres@testdb psql: LOG:  duration: 2012.345 ms
2024-08-15 10:30:19.678 UTC [12349] postgres@testdb psql: LOG:  duration: 1156.789 ms  statement: SELECT u.name, p.title
    FROM users u
    JOIN posts p ON u.id = p.user_id
2024-08-15 10:30:20.123 UTC [12350] app_user@app_db web_app: LOG:  duration: 8.901 ms  statement: INSERT INTO users (name, email) VALUES ('John Doe', 'john@example.com');
2024-08-15 10:30:21.345 UTC [12351] cleanup_job@testdb cron: LOG:  duration: 3234.567 ms  statement: DELETE FROM sessions WHERE expires_at < NOW();
2024-08-15 10:30:22.345 UTC [12345] postgres@testdb psql: LOG:  duration: 1500.000 ms  statement: select * from users where active = false;
2024-08-15 10:30:29.456 UTC [12354] postgres@testdb psql: FATAL:  database \"nonexistent\" does not exist
";

/// csvlog with a quoted multi-line statement
pub const CSV_LOG: &str = "\
2024-08-15 10:30:15.123 UTC,\"postgres\",\"testdb\",12345,\"[local]\",66bdd8a7.3039,1,\"SELECT\",2024-08-15 10:30:00 UTC,3/0,0,LOG,00000,\"duration: 1500.000 ms  statement: SELECT * FROM users WHERE id = 1\",,,,,,,,,\"psql\",\"client backend\",,0
2024-08-15 10:30:16.456 UTC,\"postgres\",\"testdb\",12346,\"[local]\",66bdd8a7.303a,1,\"SELECT\",2024-08-15 10:30:00 UTC,3/0,0,LOG,00000,\"duration: 2500.000 ms  statement: SELECT *
FROM orders
WHERE note = \"\"rush\"\"\",,,,,,,,,\"psql\",\"client backend\",,0
2024-08-15 10:30:17.789 UTC,\"postgres\",\"testdb\",12347,\"[local]\",66bdd8a7.303b,1,\"idle\",2024-08-15 10:30:00 UTC,3/0,0,LOG,00000,\"connection authorized: user=postgres\",,,,,,,,,\"psql\",\"client backend\",,0
2024-08-15 10:30:18.012 UTC,\"postgres\",\"testdb\",12348,\"[local]\",66bdd8a7.303c,1,\"SELECT\",2024-08-15 10:30:00 UTC,3/0,0,LOG,00000,\"duration: 1200.000 ms  statement: SELECT * FROM users WHERE id = 42\",,,,,,,,,\"psql\",\"client backend\",,0
";

/// jsonlog records, one of them spread over several lines
pub const JSON_LOG: &str = r#"{"timestamp":"2024-08-15 10:30:15.123 UTC","pid":12345,"error_severity":"LOG","message":"duration: 1500.000 ms  statement: SELECT * FROM users WHERE id = 1"}
{"timestamp":"2024-08-15T10:30:16.456Z","pid":12346,"duration_ms":2500.5,"query":"UPDATE accounts SET balance = balance - 10 WHERE id = 3"}
{
  "timestamp": "2024-08-15 10:30:17.789 UTC",
  "pid": 12347,
  "message": "duration: 1200.000 ms  statement: SELECT * FROM users WHERE id = 99"
}
{"timestamp":"2024-08-15 10:30:18.000 UTC","pid":12348,"message":"connection authorized"}
"#;

/// A log with no slow-query entries at all
pub const NO_DURATION_LOG: &str = "\
2024-08-15 10:30:16.789 UTC [12346] admin@analytics pgbench: ERROR:  relation \"missing_table\" does not exist
2024-08-15 10:30:17.012 UTC [12347] postgres@testdb psql: WARNING:  there is no transaction in progress
2024-08-15 10:30:20.567 UTC [12350] postgres@testdb psql: LOG:  connection received: host=192.168.1.100 port=54321
";

/// Three occurrences of one query with durations 500, 1500 and 3000 ms
pub const THRESHOLD_LOG: &str = "\
2024-08-15 10:00:00 UTC [1] LOG:  duration: 500.000 ms  statement: SELECT * FROM t WHERE id = 1
2024-08-15 10:00:01 UTC [1] LOG:  duration: 1500.000 ms  statement: SELECT * FROM t WHERE id = 2
2024-08-15 10:00:02 UTC [1] LOG:  duration: 3000.000 ms  statement: SELECT * FROM t WHERE id = 3
";

/// Write `content` to `filename` inside `dir`
pub fn write_log(dir: &Path, filename: &str, content: &str) -> PathBuf {
    let path = dir.join(filename);
    fs::write(&path, content).expect("Failed to write test log file");
    path
}

/// Temporary directory holding one log file
pub fn temp_log(filename: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(dir.path(), filename, content);
    (dir, path)
}

/// `num_entries` slow statements spread over `distinct` query shapes
pub fn generate_large_log(num_entries: usize, distinct: usize) -> String {
    let mut content = String::new();
    for i in 0..num_entries {
        let shape = i % distinct.max(1);
        content.push_str(&format!(
            "2024-08-15 {:02}:{:02}:{:02}.000 UTC [{}] LOG:  duration: {}.000 ms  statement: SELECT * FROM table_{} WHERE id = {}\n",
            (i / 3600) % 24,
            (i / 60) % 60,
            i % 60,
            1000 + i % 50,
            1000 + (i % 7) * 100,
            shape,
            i
        ));
    }
    content
}
