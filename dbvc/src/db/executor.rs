//! SQL executor
//!
//! Runs a change script statement by statement inside one transaction. The
//! first failing statement rolls the transaction back and is reported
//! together with the driver's message.

use tracing::{debug, info, warn};

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;

/// Cooperative cancellation shared between the caller and a running apply
pub use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Split a script on `;` outside quotes and comments.
///
/// Comments are dropped and empty statements skipped; each statement comes
/// back trimmed and without its terminator. A backslash escapes the next
/// character inside string literals only where `dialect` treats it so.
pub fn split_statements(script: &str, dialect: Dialect) -> Vec<String> {
    let backslash_escapes = dialect.backslash_escapes();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = Scan::Code;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Scan::Code => match c {
                ';' => {
                    push_statement(&mut statements, &mut current);
                }
                '\'' | '"' | '`' => {
                    state = Scan::Quoted(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = Scan::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Scan::BlockComment;
                }
                _ => current.push(c),
            },
            Scan::Quoted(quote) => {
                current.push(c);
                if c == '\\' && quote != '`' && backslash_escapes {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == quote {
                    // A doubled quote reopens the literal on the next pass
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = Scan::Code;
                }
            }
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Driver message of a failed statement
fn driver_message(err: Error) -> String {
    match err {
        Error::Sqlx(sqlx::Error::Database(db)) => db.message().to_string(),
        Error::Sqlx(other) => other.to_string(),
        other => other.to_string(),
    }
}

/// SQL executor for running change scripts
pub struct SqlExecutor<'c> {
    connection: &'c mut DatabaseConnection,
}

impl<'c> SqlExecutor<'c> {
    /// Create a new SQL executor
    pub fn new(connection: &'c mut DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Split `script` and run it in one transaction, returning the number of
    /// statements applied
    pub async fn execute_script(&mut self, script: &str, cancel: &CancellationToken) -> Result<usize> {
        let statements = split_statements(script, self.connection.dialect());
        if statements.is_empty() {
            debug!("empty script, nothing to apply");
            return Ok(0);
        }

        self.execute_in_transaction(&statements, cancel).await?;
        info!(statements = statements.len(), "script applied");
        Ok(statements.len())
    }

    /// Execute statements in order in a single transaction
    pub async fn execute_in_transaction(
        &mut self,
        statements: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                statement: statements.first().cloned().unwrap_or_default(),
            });
        }

        self.connection
            .execute("BEGIN")
            .await
            .map_err(|e| Error::Apply {
                statement: "BEGIN".to_string(),
                message: driver_message(e),
            })?;

        for statement in statements {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.connection.execute(statement) => Some(result),
            };

            match outcome {
                Some(Ok(rows)) => debug!(rows, statement = %statement, "statement applied"),
                Some(Err(err)) => {
                    let message = driver_message(err);
                    warn!(statement = %statement, error = %message, "statement failed, rolling back");
                    self.rollback().await;
                    return Err(Error::Apply {
                        statement: statement.clone(),
                        message,
                    });
                }
                None => {
                    warn!(statement = %statement, "apply cancelled, rolling back");
                    self.rollback().await;
                    return Err(Error::Cancelled {
                        statement: statement.clone(),
                    });
                }
            }
        }

        self.connection
            .execute("COMMIT")
            .await
            .map_err(|e| Error::Apply {
                statement: "COMMIT".to_string(),
                message: driver_message(e),
            })?;
        Ok(())
    }

    async fn rollback(&mut self) {
        if let Err(err) = self.connection.execute("ROLLBACK").await {
            warn!(error = %err, "rollback failed");
        }
    }
}

/// Apply `script` over `conn` in a single transaction
pub async fn apply_script(
    conn: &mut DatabaseConnection,
    script: &str,
    cancel: &CancellationToken,
) -> Result<usize> {
    SqlExecutor::new(conn).execute_script(script, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn splits_on_terminators() {
        let script = "CREATE TABLE a (id INTEGER);\nDROP TABLE b;\n";
        assert_eq!(
            split_statements(script, Dialect::Sqlite),
            vec!["CREATE TABLE a (id INTEGER)", "DROP TABLE b"]
        );
    }

    #[test]
    fn ignores_semicolons_in_literals_and_comments() {
        let script = "-- setup; not a statement\nINSERT INTO t (v) VALUES ('a;b');\n/* x; y */UPDATE t SET v = 'it''s;';\nSELECT `odd;name` FROM t";
        assert_eq!(
            split_statements(script, Dialect::MySql),
            vec![
                "INSERT INTO t (v) VALUES ('a;b')",
                "UPDATE t SET v = 'it''s;'",
                "SELECT `odd;name` FROM t",
            ]
        );
    }

    #[test]
    fn mysql_backslash_escapes_stay_inside_literals() {
        assert_eq!(
            split_statements(r"INSERT INTO t VALUES ('a\';b');", Dialect::MySql),
            vec![r"INSERT INTO t VALUES ('a\';b')"]
        );
    }

    #[rstest]
    #[case(Dialect::MySql, r"'C:\\'")]
    #[case(Dialect::Sqlite, r"'C:\'")]
    fn trailing_backslash_does_not_swallow_later_statements(
        #[case] dialect: Dialect,
        #[case] literal: &str,
    ) {
        let script = format!(
            "INSERT INTO Paths VALUES ( 1, {} );\nINSERT INTO Paths VALUES ( 2, 'ok' );\nDELETE FROM Paths;\n",
            literal
        );
        let statements = split_statements(&script, dialect);
        assert_eq!(statements.len(), 3, "{:?}", statements);
        assert_eq!(statements[0], format!("INSERT INTO Paths VALUES ( 1, {} )", literal));
    }

    #[test]
    fn blank_script_has_no_statements() {
        assert!(split_statements("  \n-- nothing\n;;", Dialect::Sqlite).is_empty());
    }

    #[tokio::test]
    async fn applies_and_commits() {
        let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
        let applied = apply_script(
            &mut conn,
            "CREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (1);\n",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(applied, 2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(conn.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn cancelled_token_applies_nothing() {
        let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = apply_script(&mut conn, "CREATE TABLE t (id INTEGER);", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));

        let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(conn.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn cancelling_mid_script_rolls_back() {
        let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
        let script = "CREATE TABLE kept (id INTEGER);\n\
                      INSERT INTO kept VALUES (1);\n\
                      WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 20000000) SELECT x FROM c;\n\
                      CREATE TABLE later (id INTEGER);\n";
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = apply_script(&mut conn, script, &token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }), "{:?}", err);

        let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(conn.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(tables, 0);
    }
}
