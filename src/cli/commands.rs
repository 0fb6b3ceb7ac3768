//! Command handlers for CLI
//!
//! This module implements all `/` commands of the admin shell.

use crate::config::DbConfig;
use crate::database::connection::Database;
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::{Result, StoreError};
use crate::store::Store;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table as Grid};
use std::fmt;
use std::sync::Arc;

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Open the backend and check it answers
    Connect,
    /// Create every table
    Init,
    /// Load whole tables into the cache; empty means all tables
    Chunk { tables: Vec<Table> },
    /// Cache-only lookup
    Get { table: Table, key: String },
    /// Backend lookup, caching the result
    Fetch { table: Table, key: String },
    /// Cache, then backend
    Getch { table: Table, key: String },
    /// Cache sizes per table
    Stats,
    /// Table schemas
    Tables,
    /// Show help message
    Help,
    /// Exit the application
    Quit,
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(&cmd) = parts.first() else {
            return Err(StoreError::UnknownCommand(String::new()));
        };
        let args = &parts[1..];

        let command_type = match cmd {
            "/connect" => CommandType::Connect,
            "/init" => CommandType::Init,
            "/chunk" => CommandType::Chunk {
                tables: args
                    .iter()
                    .map(|name| name.parse::<Table>())
                    .collect::<Result<Vec<_>>>()?,
            },
            "/get" | "/fetch" | "/getch" => {
                let [table, key] = args else {
                    return Err(StoreError::InvalidCommandSyntax {
                        command: cmd.to_string(),
                        expected: format!("{} <table> <key>", cmd),
                    });
                };
                let table = table.parse::<Table>()?;
                let key = key.to_string();
                match cmd {
                    "/get" => CommandType::Get { table, key },
                    "/fetch" => CommandType::Fetch { table, key },
                    _ => CommandType::Getch { table, key },
                }
            }
            "/stats" => CommandType::Stats,
            "/tables" => CommandType::Tables,
            "/help" => CommandType::Help,
            "/quit" | "/exit" => CommandType::Quit,
            _ => return Err(StoreError::UnknownCommand(cmd.to_string())),
        };
        Ok(Command { command_type })
    }
}

/// What the shell operates on
#[derive(Clone)]
pub struct Session {
    store: Store,
    database: Option<Arc<Database>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("postgres", &self.database.is_some())
            .finish()
    }
}

impl Session {
    /// Session over PostgreSQL
    pub fn postgres(config: DbConfig) -> Self {
        let database = Arc::new(Database::new(config));
        Self {
            store: Store::new(database.clone()),
            database: Some(database),
        }
    }

    /// Session over an arbitrary store; `/init` is unavailable
    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            database: None,
        }
    }

    /// The store
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn database(&self) -> Result<&Database> {
        self.database
            .as_deref()
            .ok_or_else(|| StoreError::Config("no PostgreSQL backend configured".to_string()))
    }
}

/// Handle a command and return the result message
pub async fn handle_command(command: &Command, session: &Session) -> Result<String> {
    let store = session.store();
    match &command.command_type {
        CommandType::Connect => {
            store.connect().await?;
            match &session.database {
                Some(database) => {
                    database.test_connection().await?;
                    Ok(format!(
                        "✓ Connected to {}",
                        database.config().connection_url()
                    ))
                }
                None => Ok("✓ Connected".to_string()),
            }
        }
        CommandType::Init => {
            session.database()?.create_tables().await?;
            Ok(format!("✓ Created {} tables", Table::ALL.len()))
        }
        CommandType::Chunk { tables } => {
            let tables: &[Table] = if tables.is_empty() { &Table::ALL } else { tables };
            let rows = store.chunk(tables).await?;
            Ok(format!("✓ Cached {} rows from {} tables", rows, tables.len()))
        }
        CommandType::Get { table, key } => {
            Ok(render_row(*table, key, store.get_dynamic(*table, key)?))
        }
        CommandType::Fetch { table, key } => Ok(render_row(
            *table,
            key,
            store.fetch_dynamic(*table, key, true).await?,
        )),
        CommandType::Getch { table, key } => Ok(render_row(
            *table,
            key,
            store.getch_dynamic(*table, key).await?,
        )),
        CommandType::Stats => {
            let mut grid = grid(vec!["table", "cached"]);
            for table in Table::ALL {
                grid.add_row(vec![table.name().to_string(), store.cache_len(table).to_string()]);
            }
            Ok(grid.to_string())
        }
        CommandType::Tables => {
            let mut grid = grid(vec!["table", "primary key", "columns"]);
            for table in Table::ALL {
                grid.add_row(vec![
                    table.name().to_string(),
                    table.primary_key().to_string(),
                    table.column_names().join(", "),
                ]);
            }
            Ok(grid.to_string())
        }
        CommandType::Help => Ok(HELP.to_string()),
        CommandType::Quit => Ok("Goodbye!".to_string()),
    }
}

const HELP: &str = r#"
Guild-Store Commands

Connection:
  /connect                 Open the pool and check the server answers
  /init                    Create any missing tables

Cache:
  /chunk [tables...]       Load whole tables into the cache (default: all)
  /get <table> <key>       Look up a cached row (no database access)
  /fetch <table> <key>     Query a row and cache it
  /getch <table> <key>     Cached row, or query it
  /stats                   Cached rows per table

Schema:
  /tables                  List tables and their columns

Session:
  /help                    Show this help message
  /quit, /exit             Exit

Examples:
  /chunk blacklist guild_blacklist
  /getch users 80351110224678912
  /fetch badges early_supporter
"#;

fn grid(header: Vec<&str>) -> Grid {
    let mut grid = Grid::new();
    grid.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    grid
}

/// Render one row as a column/value table
pub fn render_row(table: Table, key: &str, row: Option<Row>) -> String {
    let Some(row) = row else {
        return format!("No {} row for key {}", table, key);
    };
    let mut grid = grid(vec!["column", "value"]);
    for (column, value) in row.iter() {
        grid.add_row(vec![column.to_string(), value.to_string()]);
    }
    grid.to_string()
}

/// Format an error for display
pub fn format_error(error: &StoreError) -> String {
    format!("Error: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryBackend;
    use crate::database::value::FieldValue;

    #[test]
    fn test_parse_lookup_commands() {
        let cmd = Command::parse("/getch users 42").unwrap();
        assert_eq!(
            cmd.command_type,
            CommandType::Getch {
                table: Table::Users,
                key: "42".to_string()
            }
        );
        let cmd = Command::parse("/get GuildBlacklist 7").unwrap();
        assert_eq!(
            cmd.command_type,
            CommandType::Get {
                table: Table::GuildBlacklist,
                key: "7".to_string()
            }
        );
    }

    #[test]
    fn test_parse_chunk_tables() {
        let cmd = Command::parse("/chunk blacklist badges").unwrap();
        assert_eq!(
            cmd.command_type,
            CommandType::Chunk {
                tables: vec![Table::Blacklist, Table::Badges]
            }
        );
        assert!(matches!(
            Command::parse("/chunk nope"),
            Err(StoreError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Command::parse("/fetch users"),
            Err(StoreError::InvalidCommandSyntax { .. })
        ));
        assert!(matches!(
            Command::parse("/index"),
            Err(StoreError::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_then_get_through_shell() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            Table::Users,
            Row::new()
                .with("user_id", 42_i64)
                .with("bio", FieldValue::Null)
                .with("reputation", 3_i64)
                .with("created_at", chrono::Utc::now()),
        )
        .unwrap();
        let session = Session::with_store(Store::new(backend));

        let get = Command::parse("/get users 42").unwrap();
        let out = handle_command(&get, &session).await.unwrap();
        assert!(out.starts_with("No users row"));

        let fetch = Command::parse("/fetch users 42").unwrap();
        let out = handle_command(&fetch, &session).await.unwrap();
        assert!(out.contains("reputation"));

        let out = handle_command(&get, &session).await.unwrap();
        assert!(out.contains("reputation"));
        assert_eq!(session.store().cache_len(Table::Users), 1);
    }

    #[tokio::test]
    async fn test_init_needs_postgres() {
        let session = Session::with_store(Store::new(Arc::new(MemoryBackend::new())));
        let init = Command::parse("/init").unwrap();
        assert!(handle_command(&init, &session).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_key_is_reported() {
        let session = Session::with_store(Store::new(Arc::new(MemoryBackend::new())));
        let cmd = Command::parse("/getch users abc").unwrap();
        assert!(matches!(
            handle_command(&cmd, &session).await,
            Err(StoreError::InvalidKey { .. })
        ));
    }
}
