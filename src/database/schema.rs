//! Table registry and schema validation
//!
//! Every logical table is a [`Table`] variant bound to its physical name,
//! primary key, column schema and alias map. Write payloads are checked
//! against the schema here, before any statement is built.

use crate::database::value::FieldValue;
use crate::error::{Result, StoreError, ValidationError};
use std::fmt;
use std::str::FromStr;

/// Scalar column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// BOOLEAN
    Boolean,
    /// BIGINT
    BigInt,
    /// TEXT
    Text,
    /// TIMESTAMPTZ
    Timestamp,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::BigInt => "BIGINT",
            ScalarType::Text => "TEXT",
            ScalarType::Timestamp => "TIMESTAMPTZ",
        };
        write!(f, "{}", name)
    }
}

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// Single value
    Scalar(ScalarType),
    /// One-dimensional array with the given element type
    Array(ScalarType),
}

impl SqlType {
    /// Element type for arrays, the type itself for scalars
    pub fn element(&self) -> ScalarType {
        match self {
            SqlType::Scalar(t) | SqlType::Array(t) => *t,
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, SqlType::Array(_))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Scalar(t) => write!(f, "{}", t),
            SqlType::Array(t) => write!(f, "{}[]", t),
        }
    }
}

/// Column default, shared by DDL generation and the memory backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// No default; inserts must supply the column
    Required,
    /// NULL
    Null,
    /// FALSE
    False,
    /// 0
    Zero,
    /// '{}'
    EmptyArray,
    /// now()
    Now,
    /// A text literal
    Text(&'static str),
}

impl ColumnDefault {
    /// Materialize the default as a value
    pub fn value(&self) -> Option<FieldValue> {
        match self {
            ColumnDefault::Required => None,
            ColumnDefault::Null => Some(FieldValue::Null),
            ColumnDefault::False => Some(FieldValue::Bool(false)),
            ColumnDefault::Zero => Some(FieldValue::BigInt(0)),
            ColumnDefault::EmptyArray => Some(FieldValue::Array(Vec::new())),
            ColumnDefault::Now => Some(FieldValue::Timestamp(chrono::Utc::now())),
            ColumnDefault::Text(s) => Some(FieldValue::Text((*s).to_string())),
        }
    }

    fn sql(&self) -> Option<String> {
        match self {
            ColumnDefault::Required | ColumnDefault::Null => None,
            ColumnDefault::False => Some("FALSE".to_string()),
            ColumnDefault::Zero => Some("0".to_string()),
            ColumnDefault::EmptyArray => Some("'{}'".to_string()),
            ColumnDefault::Now => Some("now()".to_string()),
            ColumnDefault::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        }
    }
}

/// Declaration of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Physical column name
    pub name: &'static str,
    /// Declared type
    pub ty: SqlType,
    /// Whether NULL is accepted
    pub optional: bool,
    /// Default used when an insert omits the column
    pub default: ColumnDefault,
}

impl ColumnDef {
    const fn required(name: &'static str, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            default: ColumnDefault::Required,
        }
    }

    const fn with_default(name: &'static str, ty: SqlType, default: ColumnDefault) -> Self {
        Self {
            name,
            ty,
            optional: false,
            default,
        }
    }

    const fn nullable(name: &'static str, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            optional: true,
            default: ColumnDefault::Null,
        }
    }

    /// Check a value against this column's declared type
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (value, self.ty) {
            (FieldValue::Null, _) => self.optional,
            (FieldValue::Array(items), SqlType::Array(elem)) => {
                items.iter().all(|item| item.scalar_type() == Some(elem))
            }
            (FieldValue::Array(_), SqlType::Scalar(_)) => false,
            (scalar, SqlType::Scalar(t)) => scalar.scalar_type() == Some(t),
            (_, SqlType::Array(_)) => false,
        }
    }

    /// Expected type(s), as shown in validation errors
    pub fn expected(&self) -> String {
        if self.optional {
            format!("{} or NULL", self.ty)
        } else {
            self.ty.to_string()
        }
    }

    /// Column clause for CREATE TABLE
    fn ddl(&self, primary_key: bool) -> String {
        let mut clause = format!("{} {}", self.name, self.ty);
        if primary_key {
            clause.push_str(" PRIMARY KEY");
        } else if !self.optional {
            clause.push_str(" NOT NULL");
        }
        if let Some(default) = self.default.sql() {
            clause.push_str(" DEFAULT ");
            clause.push_str(&default);
        }
        clause
    }
}

const BIGINT: SqlType = SqlType::Scalar(ScalarType::BigInt);
const TEXT: SqlType = SqlType::Scalar(ScalarType::Text);
const BOOLEAN: SqlType = SqlType::Scalar(ScalarType::Boolean);
const TIMESTAMP: SqlType = SqlType::Scalar(ScalarType::Timestamp);
const BIGINT_ARRAY: SqlType = SqlType::Array(ScalarType::BigInt);
const TEXT_ARRAY: SqlType = SqlType::Array(ScalarType::Text);

const USERS: &[ColumnDef] = &[
    ColumnDef::required("user_id", BIGINT),
    ColumnDef::nullable("bio", TEXT),
    ColumnDef::with_default("reputation", BIGINT, ColumnDefault::Zero),
    ColumnDef::with_default("created_at", TIMESTAMP, ColumnDefault::Now),
];

const GUILDS: &[ColumnDef] = &[
    ColumnDef::required("guild_id", BIGINT),
    ColumnDef::with_default("prefix", TEXT, ColumnDefault::Text("!")),
    ColumnDef::nullable("log_channel_id", BIGINT),
    ColumnDef::nullable("welcome_channel_id", BIGINT),
    ColumnDef::with_default("autorole_ids", BIGINT_ARRAY, ColumnDefault::EmptyArray),
];

const BLACKLIST: &[ColumnDef] = &[
    ColumnDef::required("user_id", BIGINT),
    ColumnDef::with_default("blacklisted", BOOLEAN, ColumnDefault::False),
    ColumnDef::nullable("blacklisted_until", TIMESTAMP),
    ColumnDef::nullable("reason", TEXT),
];

const GUILD_BLACKLIST: &[ColumnDef] = &[
    ColumnDef::required("guild_id", BIGINT),
    ColumnDef::with_default("blacklisted", BOOLEAN, ColumnDefault::False),
    ColumnDef::nullable("reason", TEXT),
];

const ECONOMY: &[ColumnDef] = &[
    ColumnDef::required("user_id", BIGINT),
    ColumnDef::with_default("wallet", BIGINT, ColumnDefault::Zero),
    ColumnDef::with_default("bank", BIGINT, ColumnDefault::Zero),
    ColumnDef::nullable("last_daily", TIMESTAMP),
];

const COMMANDS: &[ColumnDef] = &[
    ColumnDef::required("guild_id", BIGINT),
    ColumnDef::with_default("disabled", TEXT_ARRAY, ColumnDefault::EmptyArray),
];

const BADGES: &[ColumnDef] = &[
    ColumnDef::required("name", TEXT),
    ColumnDef::nullable("description", TEXT),
    ColumnDef::with_default("users", BIGINT_ARRAY, ColumnDefault::EmptyArray),
];

const STATUSES: &[ColumnDef] = &[
    ColumnDef::required("user_id", BIGINT),
    ColumnDef::with_default("status", TEXT, ColumnDefault::Text("online")),
    ColumnDef::nullable("message", TEXT),
    ColumnDef::with_default("updated_at", TIMESTAMP, ColumnDefault::Now),
];

/// Logical tables known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// User profiles
    Users,
    /// Per-guild settings
    Guilds,
    /// Blacklisted users
    Blacklist,
    /// Blacklisted guilds
    GuildBlacklist,
    /// Economy balances
    Economy,
    /// Per-guild disabled commands
    Commands,
    /// Badges and their holders
    Badges,
    /// User statuses
    Statuses,
}

impl Table {
    /// Every table, in chunking order
    pub const ALL: [Table; 8] = [
        Table::Users,
        Table::Guilds,
        Table::Blacklist,
        Table::GuildBlacklist,
        Table::Economy,
        Table::Commands,
        Table::Badges,
        Table::Statuses,
    ];

    /// Physical table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Guilds => "guilds",
            Table::Blacklist => "blacklist",
            Table::GuildBlacklist => "guild_blacklist",
            Table::Economy => "economy",
            Table::Commands => "commands",
            Table::Badges => "badges",
            Table::Statuses => "statuses",
        }
    }

    /// Primary key column
    pub fn primary_key(&self) -> &'static str {
        match self {
            Table::Users | Table::Blacklist | Table::Economy | Table::Statuses => "user_id",
            Table::Guilds | Table::GuildBlacklist | Table::Commands => "guild_id",
            Table::Badges => "name",
        }
    }

    /// Declared columns
    pub fn schema(&self) -> &'static [ColumnDef] {
        match self {
            Table::Users => USERS,
            Table::Guilds => GUILDS,
            Table::Blacklist => BLACKLIST,
            Table::GuildBlacklist => GUILD_BLACKLIST,
            Table::Economy => ECONOMY,
            Table::Commands => COMMANDS,
            Table::Badges => BADGES,
            Table::Statuses => STATUSES,
        }
    }

    /// Friendly name → physical column
    pub fn aliases(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Table::Users => &[("id", "user_id"), ("rep", "reputation")],
            Table::Guilds => &[
                ("id", "guild_id"),
                ("autoroles", "autorole_ids"),
                ("role_ids", "autorole_ids"),
            ],
            Table::Blacklist => &[
                ("id", "user_id"),
                ("is_blacklisted", "blacklisted"),
                ("until", "blacklisted_until"),
            ],
            Table::GuildBlacklist => &[("id", "guild_id"), ("is_blacklisted", "blacklisted")],
            Table::Economy => &[("id", "user_id"), ("balance", "wallet")],
            Table::Commands => &[("id", "guild_id"), ("disabled_commands", "disabled")],
            Table::Badges => &[("holders", "users")],
            Table::Statuses => &[("id", "user_id")],
        }
    }

    /// Look up a column declaration
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.schema().iter().find(|c| c.name == name)
    }

    /// Resolve a field name through the alias map to a physical column
    pub fn resolve(&self, field: &str) -> Option<&'static str> {
        if let Some((_, column)) = self.aliases().iter().find(|(alias, _)| *alias == field) {
            return Some(column);
        }
        self.column(field).map(|c| c.name)
    }

    /// Physical column names in declaration order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.schema().iter().map(|c| c.name).collect()
    }

    /// Error for a column this table does not declare
    pub fn unknown_column(&self, column: &str) -> ValidationError {
        ValidationError::UnknownColumn {
            table: self.name().to_string(),
            column: column.to_string(),
            valid: self.column_names().iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Validate one (column, value) pair
    pub fn validate_field(&self, column: &str, value: &FieldValue) -> Result<&'static ColumnDef> {
        let def = self
            .column(column)
            .ok_or_else(|| self.unknown_column(column))?;

        if !def.accepts(value) {
            return Err(ValidationError::TypeMismatch {
                table: self.name().to_string(),
                column: column.to_string(),
                expected: def.expected(),
                found: value.type_name(),
            }
            .into());
        }

        Ok(def)
    }

    /// Validate a whole write payload; the first violation wins
    pub fn validate<'a, I>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a FieldValue)>,
    {
        for (column, value) in fields {
            self.validate_field(column, value)?;
        }
        Ok(())
    }

    /// CREATE TABLE IF NOT EXISTS statement rendered from the schema
    pub fn create_sql(&self) -> String {
        let pk = self.primary_key();
        let columns: Vec<String> = self
            .schema()
            .iter()
            .map(|c| format!("    {}", c.ddl(c.name == pk)))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name(),
            columns.join(",\n")
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "users" | "user" => Ok(Table::Users),
            "guilds" | "guild" => Ok(Table::Guilds),
            "blacklist" | "blacklists" => Ok(Table::Blacklist),
            "guildblacklist" | "guildblacklists" => Ok(Table::GuildBlacklist),
            "economy" | "economies" | "balance" | "balances" => Ok(Table::Economy),
            "commands" | "command" => Ok(Table::Commands),
            "badges" | "badge" => Ok(Table::Badges),
            "statuses" | "status" => Ok(Table::Statuses),
            _ => Err(StoreError::UnknownTable(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_declares_its_primary_key() {
        for table in Table::ALL {
            let pk = table.column(table.primary_key());
            assert!(pk.is_some(), "{} has no pk column", table);
            assert!(!pk.unwrap().optional);
        }
    }

    #[test]
    fn test_aliases_point_at_real_columns() {
        for table in Table::ALL {
            for (alias, column) in table.aliases() {
                assert!(table.column(column).is_some(), "{}.{} -> {}", table, alias, column);
            }
        }
    }

    #[test]
    fn test_resolve_alias_then_column() {
        assert_eq!(Table::Blacklist.resolve("is_blacklisted"), Some("blacklisted"));
        assert_eq!(Table::Blacklist.resolve("reason"), Some("reason"));
        assert_eq!(Table::Blacklist.resolve("nope"), None);
    }

    #[test]
    fn test_table_from_str() {
        assert_eq!("users".parse::<Table>().unwrap(), Table::Users);
        assert_eq!("GuildBlacklist".parse::<Table>().unwrap(), Table::GuildBlacklist);
        assert_eq!("guild_blacklist".parse::<Table>().unwrap(), Table::GuildBlacklist);
        assert_eq!("Badge".parse::<Table>().unwrap(), Table::Badges);
        assert!(matches!(
            "nonsense".parse::<Table>(),
            Err(StoreError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_validate_unknown_column() {
        let err = Table::Blacklist
            .validate_field("unknown_field", &FieldValue::BigInt(1))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown_field"));
        assert!(msg.contains("user_id"));
        assert!(msg.contains("blacklisted_until"));
    }

    #[test]
    fn test_validate_types() {
        let t = Table::Blacklist;
        assert!(t.validate_field("blacklisted", &FieldValue::Bool(true)).is_ok());
        assert!(t.validate_field("reason", &FieldValue::Null).is_ok());
        assert!(t.validate_field("blacklisted", &FieldValue::Null).is_err());

        let err = t
            .validate_field("blacklisted", &FieldValue::from("yes"))
            .unwrap_err();
        assert!(err.to_string().contains("BOOLEAN"));
        assert!(err.to_string().contains("TEXT"));
    }

    #[test]
    fn test_validate_array_elements() {
        let t = Table::Guilds;
        assert!(t
            .validate_field("autorole_ids", &FieldValue::from(vec![1_i64, 2]))
            .is_ok());
        assert!(t
            .validate_field("autorole_ids", &FieldValue::Array(Vec::new()))
            .is_ok());
        assert!(t
            .validate_field(
                "autorole_ids",
                &FieldValue::Array(vec![FieldValue::BigInt(1), FieldValue::from("2")])
            )
            .is_err());
        assert!(t.validate_field("autorole_ids", &FieldValue::BigInt(1)).is_err());
        assert!(t
            .validate_field("prefix", &FieldValue::from(vec!["!"]))
            .is_err());
    }

    #[test]
    fn test_create_sql() {
        let sql = Table::Guilds.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS guilds"));
        assert!(sql.contains("guild_id BIGINT PRIMARY KEY"));
        assert!(sql.contains("autorole_ids BIGINT[] NOT NULL DEFAULT '{}'"));
        assert!(sql.contains("prefix TEXT NOT NULL DEFAULT '!'"));
        assert!(sql.contains("log_channel_id BIGINT,") || sql.contains("log_channel_id BIGINT\n"));
    }
}
