use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sql_session::prelude::*;

type StatementLog = Arc<Mutex<Vec<(String, Vec<RowValues>)>>>;

/// Two columns; the backend can only describe the first.
struct HalfDescribed {
    rows: Vec<Vec<RowValues>>,
}

impl Cursor for HalfDescribed {
    fn column_count(&self) -> usize {
        2
    }

    fn column_meta(&self, index: usize) -> Option<ColumnInfo> {
        (index == 0).then(|| ColumnInfo::new("id", "int4").with_size(4))
    }

    fn fetch_row(&mut self) -> Option<Vec<RowValues>> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rows.remove(0))
        }
    }
}

#[derive(Default)]
struct ScriptedDriver {
    log: StatementLog,
    connected: bool,
    refuse_connect: bool,
    report_code: Option<i32>,
}

impl ScriptedDriver {
    fn record(&mut self, sql: &str, params: &[RowValues]) {
        if let Ok(mut log) = self.log.lock() {
            log.push((sql.to_string(), params.to_vec()));
        }
    }

    fn respond(kind: StatementKind) -> Execution {
        match kind {
            StatementKind::Mutating => Execution::Affected(2),
            StatementKind::RowProducing => Execution::Cursor(Box::new(HalfDescribed {
                rows: vec![
                    vec![RowValues::Int(1), RowValues::Text("one".into())],
                    vec![RowValues::Int(2), RowValues::Null],
                ],
            })),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    async fn connect(&mut self, _params: &ConnectParams) -> Result<(), SqlSessionError> {
        if self.refuse_connect {
            return Err(SqlSessionError::ExecutionError("socket closed".into()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SqlSessionError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "\\'")
    }

    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError> {
        self.record(sql, &[]);
        Ok(Self::respond(kind))
    }

    async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[RowValues],
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError> {
        self.record(sql, params);
        Ok(Self::respond(kind))
    }

    fn last_insert_id(&self) -> Option<i64> {
        Some(42)
    }

    fn last_error_info(&self) -> Option<DriverErrorInfo> {
        self.report_code
            .map(|code| DriverErrorInfo::new(code, "reported by backend"))
    }
}

fn server_config() -> Result<SessionConfig, SqlSessionError> {
    SessionConfig::builder(DriverKind::Sqlite, "host=db.internal dbname=app")
        .user("app")
        .password("secret")
        .build()
}

fn session(driver: ScriptedDriver) -> Result<QueryEngine, SqlSessionError> {
    QueryEngine::new(Box::new(driver), &server_config()?)
}

#[tokio::test]
async fn placeholders_follow_the_driver_style() -> Result<(), Box<dyn std::error::Error>> {
    let log = StatementLog::default();
    let mut session = session(ScriptedDriver {
        log: Arc::clone(&log),
        ..ScriptedDriver::default()
    })?;

    let clause = session.where_clause(&[Condition::eq("a", 1), Condition::like("b", "x%")])?;
    session
        .query(&format!("SELECT * FROM t {clause}"))
        .await?;
    assert_eq!(session.last_query(), Some("SELECT * FROM t WHERE a = $1 AND b LIKE $2"));

    session
        .insert("t", &assignments([("a", RowValues::Int(7)), ("b", "NULL".into())]))
        .await?;
    assert_eq!(session.insert_id(), Some(42));
    assert_eq!(session.affected_rows(), 2);

    session
        .update("t", &assignments([("a", 8)]), &[Condition::eq("a", 7)])
        .await?;
    assert_eq!(session.insert_id(), None);

    let seen = log.lock().map(|log| log.clone()).unwrap_or_default();
    assert_eq!(
        seen,
        vec![
            (
                "SELECT * FROM t WHERE a = $1 AND b LIKE $2".to_string(),
                vec![RowValues::Int(1), RowValues::Text("x%".into())]
            ),
            ("INSERT INTO t (a, b) VALUES ($1, NULL)".to_string(), vec![RowValues::Int(7)]),
            (
                "UPDATE t SET a = $1 WHERE a = $2".to_string(),
                vec![RowValues::Int(8), RowValues::Int(7)]
            ),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn inline_literals_use_the_driver_escaper() -> Result<(), Box<dyn std::error::Error>> {
    let log = StatementLog::default();
    let mut session = session(ScriptedDriver {
        log: Arc::clone(&log),
        ..ScriptedDriver::default()
    })?;
    session.prepare_off();

    let clause = session.where_clause(&[Condition::eq("name", "O'Brien")])?;
    assert_eq!(clause.text(), r"WHERE name = 'O\'Brien'");
    assert_eq!(session.escape("it's"), r"it\'s");
    assert_eq!(session.sysdate(), "NOW()");

    session.query(&format!("DELETE FROM t {clause}")).await?;
    let seen = log.lock().map(|log| log.clone()).unwrap_or_default();
    assert_eq!(seen[0].1, Vec::<RowValues>::new());
    Ok(())
}

#[tokio::test]
async fn undescribed_columns_read_as_undefined() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session(ScriptedDriver::default())?;

    let result = session.query("SELECT id, label FROM t").await?;
    assert_eq!(result.count(), 2);
    assert_eq!(
        session.col_info(),
        &[ColumnInfo::new("id", "int4").with_size(4), ColumnInfo::undefined()]
    );
    assert_eq!(
        session.get_col_info(ColumnAttr::Size, None),
        vec![Some("4".to_string()), None]
    );
    assert_eq!(
        session.get_col(None, 1).await?,
        vec![Some(RowValues::Text("one".into())), None]
    );
    Ok(())
}

#[tokio::test]
async fn out_of_range_reports_are_notices() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session(ScriptedDriver {
        report_code: Some(25),
        ..ScriptedDriver::default()
    })?;

    let result = session.query("SELECT id, label FROM t").await?;
    assert_eq!(result.count(), 2);
    assert_eq!(session.notices().len(), 1);
    assert_eq!(
        session.notices()[0].query.as_deref(),
        Some("SELECT id, label FROM t")
    );
    assert_eq!(session.captured_errors().count(), 0);
    Ok(())
}

#[tokio::test]
async fn other_reports_fail_the_call() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session(ScriptedDriver {
        report_code: Some(1062),
        ..ScriptedDriver::default()
    })?;
    session.hide_errors();

    let err = session
        .query("UPDATE t SET a = 1")
        .await
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::Driver(ref info) if info.code == 1062));
    assert_eq!(session.last_error(), Some("Driver error: 1062, reported by backend"));
    assert!(session.query_result().is_none());
    Ok(())
}

#[tokio::test]
async fn connect_failures_are_recorded_once() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session(ScriptedDriver {
        refuse_connect: true,
        ..ScriptedDriver::default()
    })?;
    session.hide_errors();

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SqlSessionError::ConnectionError(ref msg) if msg.contains("socket closed")));
    assert_eq!(session.captured_errors().count(), 1);

    let err = session.query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, SqlSessionError::ConnectionError(_)));
    assert_eq!(session.captured_errors().count(), 2);
    assert!(!session.is_connected());
    Ok(())
}

#[tokio::test]
async fn sessions_register_under_their_driver_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SessionRegistry::new();
    registry.register(session(ScriptedDriver::default())?);

    let found = registry
        .get_mut("scripted")
        .ok_or("scripted session missing")?;
    found.query("SELECT 1").await?;
    assert_eq!(found.count(true, false), 1);
    assert!(registry.get("sqlite").is_none());
    Ok(())
}

#[test]
fn server_configs_need_credentials() {
    let err = SessionConfig::builder(DriverKind::Sqlite, "host=db.internal")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::ConfigError(_)));
}
