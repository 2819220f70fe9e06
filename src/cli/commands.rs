//! CLI command implementations
//!
//! `session` loads a fixture into an in-memory catalog and runs one handle
//! manager over it. Each stdin line is one command; each gets exactly one
//! response line. Administrative commands (flush, alter, exclusive lock
//! requests, row deletion) act on the shared catalog the way another
//! session would. `corrupt_row` marks a row unreadable.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::HandlerConfig;
use crate::engine::memory::{MemoryCatalog, MemoryLocks, MemoryOpener, MemoryTable, TableFixture};
use crate::engine::KeyComparator;
use crate::handler::{HandleManager, HandleName, HandlerError, ReadOp, ReadRequest, RowFilter, TableRef};
use crate::observability::{log_event, HandlerEvent, Logger};

use super::args::Command;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{read_requests, write_error, write_partial_error, write_response};

type Session = HandleManager<MemoryOpener, MemoryLocks>;

/// Read operation names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpName {
    First,
    Next,
    Prev,
    Last,
    SamePrefix,
    Seek,
}

/// Table pattern in a `remove` command; a missing schema matches any
#[derive(Debug, Clone, Deserialize)]
pub struct TablePattern {
    #[serde(default)]
    pub schema: String,
    pub table: String,
}

/// One line of session input
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SessionCommand {
    Open {
        schema: String,
        table: String,
        #[serde(default)]
        alias: Option<String>,
    },
    Read {
        alias: String,
        #[serde(default)]
        index: Option<String>,
        op: OpName,
        #[serde(default)]
        key: Vec<Value>,
        #[serde(default)]
        comparator: Option<KeyComparator>,
        #[serde(default)]
        filter: Option<RowFilter>,
        #[serde(default)]
        limit: Option<u64>,
        #[serde(default)]
        offset: u64,
    },
    Close {
        alias: String,
    },
    /// Global table flush followed by this session's invalidation scan
    Flush,
    Remove {
        tables: Vec<TablePattern>,
    },
    Alter {
        schema: String,
        table: String,
    },
    /// Another session waits for an exclusive lock; this session runs its
    /// invalidation scan
    RequestExclusive {
        schema: String,
        table: String,
    },
    WithdrawExclusive {
        schema: String,
        table: String,
    },
    DeleteRow {
        schema: String,
        table: String,
        position: usize,
    },
    CorruptRow {
        schema: String,
        table: String,
        position: usize,
    },
    LockTables,
    UnlockTables,
    Stats,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Session { fixture, config } => {
            let config = load_config(config.as_deref())?;
            let catalog = load_fixture(&fixture)?;
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            run_session(catalog, config, stdin.lock(), &mut stdout)
        }
        Command::Check { fixture, config } => check(&fixture, config.as_deref()),
    }
}

/// Validate fixture and configuration and report what was loaded
pub fn check(fixture: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let catalog = load_fixture(fixture)?;
    let tables: Vec<String> = catalog
        .descriptors()
        .iter()
        .map(|d| format!("{}.{}", d.schema, d.table))
        .collect();
    write_response(
        &mut io::stdout(),
        json!({"tables": tables, "config": config}),
    )
}

fn load_config(path: Option<&Path>) -> CliResult<HandlerConfig> {
    let config = match path {
        Some(path) => HandlerConfig::load(path)?,
        None => HandlerConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);
    if let Some(path) = path {
        log_event(
            HandlerEvent::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );
    }
    Ok(config)
}

/// Load a JSON array of table fixtures into a fresh catalog
pub fn load_fixture(path: &Path) -> CliResult<MemoryCatalog> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::fixture_error(format!("Failed to read fixture {}: {}", path.display(), e))
    })?;
    let fixtures: Vec<TableFixture> = serde_json::from_str(&content)
        .map_err(|e| CliError::fixture_error(format!("Invalid fixture JSON: {}", e)))?;

    let catalog = MemoryCatalog::new();
    for fixture in fixtures {
        validate_fixture(&fixture)?;
        catalog.create_table(MemoryTable::from(fixture));
    }
    Ok(catalog)
}

fn validate_fixture(fixture: &TableFixture) -> CliResult<()> {
    if fixture.columns.is_empty() {
        return Err(CliError::fixture_error(format!(
            "table '{}.{}' has no columns",
            fixture.schema, fixture.table
        )));
    }
    for index in &fixture.indexes {
        if index.columns.is_empty() {
            return Err(CliError::fixture_error(format!(
                "index '{}' on '{}' has no columns",
                index.name, fixture.table
            )));
        }
        if let Some(col) = index.columns.iter().find(|c| !fixture.columns.contains(c)) {
            return Err(CliError::fixture_error(format!(
                "index '{}' on '{}' uses unknown column '{}'",
                index.name, fixture.table, col
            )));
        }
    }
    Ok(())
}

/// Run one session until the input ends. Command failures are reported
/// inline; only I/O failures end the session early.
pub fn run_session<R: BufRead, W: Write>(
    catalog: MemoryCatalog,
    config: HandlerConfig,
    input: R,
    output: &mut W,
) -> CliResult<()> {
    let mut session: Session = HandleManager::new(
        MemoryOpener::new(catalog.clone()),
        MemoryLocks::new(catalog.clone()),
        config,
    );

    for request in read_requests(input) {
        let command = match request.and_then(|value| {
            serde_json::from_value::<SessionCommand>(value)
                .map_err(|e| CliError::bad_command(e.to_string()))
        }) {
            Ok(command) => command,
            Err(err) if *err.code() == CliErrorCode::IoError => return Err(err),
            Err(err) => {
                write_error(output, err.code_str(), err.message())?;
                continue;
            }
        };
        execute(&mut session, &catalog, command, output)?;
    }

    session.session_cleanup();
    Ok(())
}

fn execute<W: Write>(
    session: &mut Session,
    catalog: &MemoryCatalog,
    command: SessionCommand,
    output: &mut W,
) -> CliResult<()> {
    let result: Result<Value, HandlerError> = match command {
        SessionCommand::Open {
            schema,
            table,
            alias,
        } => {
            let mut name = HandleName::new(schema, table);
            if let Some(alias) = alias {
                name = name.with_alias(alias);
            }
            let alias = name.alias().to_string();
            session.open(name, false).map(|_| json!({"alias": alias}))
        }
        SessionCommand::Read {
            alias,
            index,
            op,
            key,
            comparator,
            filter,
            limit,
            offset,
        } => {
            let op = match read_op(op, key, comparator) {
                Ok(op) => op,
                Err(err) => return write_error(output, err.code_str(), err.message()),
            };
            let mut request = ReadRequest::new(alias, op).offset(offset);
            if let Some(index) = index {
                request = request.index(index);
            }
            if let Some(limit) = limit {
                request = request.limit(limit);
            }
            if let Some(filter) = filter {
                request = request.filter(filter);
            }
            return read(session, request, output);
        }
        SessionCommand::Close { alias } => session.close(&alias).map(|_| json!({"closed": alias})),
        SessionCommand::Flush => {
            catalog.flush_tables();
            Ok(json!({"invalidated": session.flush_invalidate()}))
        }
        SessionCommand::Remove { tables } => {
            let refs: Vec<TableRef> = tables
                .into_iter()
                .map(|t| TableRef::new(t.schema, t.table))
                .collect();
            Ok(json!({"removed": session.remove_tables(&refs)}))
        }
        SessionCommand::Alter { schema, table } => {
            Ok(json!({"altered": catalog.alter_table(&schema, &table)}))
        }
        SessionCommand::RequestExclusive { schema, table } => {
            catalog.request_exclusive(&schema, &table);
            Ok(json!({"invalidated": session.flush_invalidate()}))
        }
        SessionCommand::WithdrawExclusive { schema, table } => {
            catalog.withdraw_exclusive(&schema, &table);
            Ok(json!({}))
        }
        SessionCommand::DeleteRow {
            schema,
            table,
            position,
        } => Ok(json!({"deleted": catalog.delete_row(&schema, &table, position)})),
        SessionCommand::CorruptRow {
            schema,
            table,
            position,
        } => Ok(json!({"corrupted": catalog.corrupt_row(&schema, &table, position)})),
        SessionCommand::LockTables => {
            session.locks_mut().set_locked_tables(true);
            Ok(json!({"locked_tables": true}))
        }
        SessionCommand::UnlockTables => {
            session.locks_mut().set_locked_tables(false);
            Ok(json!({"locked_tables": false}))
        }
        SessionCommand::Stats => Ok(json!({
            "session": session.session_id().to_string(),
            "aliases": session.aliases(),
            "metrics": session.metrics().snapshot(),
        })),
    };

    match result {
        Ok(data) => write_response(output, data),
        Err(err) => write_error(output, err.code().code(), err.message()),
    }
}

fn read_op(
    op: OpName,
    key: Vec<Value>,
    comparator: Option<KeyComparator>,
) -> CliResult<ReadOp> {
    Ok(match op {
        OpName::First => ReadOp::First,
        OpName::Next => ReadOp::Next,
        OpName::Prev => ReadOp::Prev,
        OpName::Last => ReadOp::Last,
        OpName::SamePrefix => ReadOp::SamePrefix,
        OpName::Seek => match comparator {
            Some(comparator) => ReadOp::seek(key, comparator),
            None => return Err(CliError::bad_command("'seek' needs a comparator")),
        },
    })
}

fn read<W: Write>(session: &mut Session, request: ReadRequest, output: &mut W) -> CliResult<()> {
    let batch = match session.read(request) {
        Ok(batch) => batch,
        Err(err) => return write_error(output, err.code().code(), err.message()),
    };
    let alias = batch.alias().to_string();
    let columns = batch.columns();
    let (rows, err) = batch.drain();
    let rows: Vec<Value> = rows.iter().map(|r| r.to_json()).collect();

    match err {
        None => write_response(
            output,
            json!({"alias": alias, "columns": columns, "rows": rows}),
        ),
        Some(err) => write_partial_error(output, err.code().code(), err.message(), rows),
    }
}
