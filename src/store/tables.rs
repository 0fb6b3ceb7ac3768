//! Per-table entry points
//!
//! Named wrappers over the generic [`Store`] operations, plus the helpers
//! that only make sense for one table: blacklisting, command toggles,
//! autoroles and badge holders.
//!
//! Writes that used to be "check, then insert" are single upserts here, so
//! two callers blacklisting the same user cannot race into a duplicate key.

use crate::database::schema::Table;
use crate::database::statement::{ArrayOp, Assignment, OnConflict, Predicate, Statement};
use crate::error::{Result, ValidationError};
use crate::models::{Badge, Blacklist, CommandToggles, Economy, Guild, GuildBlacklist, Status, User};
use crate::store::{Fields, Record, Store};
use chrono::{Duration, Utc};
use tracing::{debug, info};

impl Store {
    // ========================================================================
    // USERS
    // ========================================================================

    /// Insert a user profile
    pub async fn add_user(&self, user_id: i64, fields: Fields, cache: bool) -> Result<Record<User>> {
        self.add::<User>(user_id, fields, cache).await
    }

    /// Query a user profile
    pub async fn fetch_user(&self, user_id: i64, cache: bool) -> Result<Option<Record<User>>> {
        self.fetch::<User>(user_id, cache).await
    }

    /// Query every user profile
    pub async fn fetch_users(&self, cache: bool) -> Result<Vec<Record<User>>> {
        self.fetch_all::<User>(cache).await
    }

    /// Cached user profile
    pub fn get_user(&self, user_id: i64) -> Option<Record<User>> {
        self.get::<User>(&user_id)
    }

    /// Delete a user profile
    pub async fn remove_user(&self, user_id: i64) -> Result<Option<Record<User>>> {
        self.remove::<User>(user_id).await
    }

    // ========================================================================
    // GUILDS
    // ========================================================================

    /// Insert guild settings
    pub async fn add_guild(&self, guild_id: i64, fields: Fields, cache: bool) -> Result<Record<Guild>> {
        self.add::<Guild>(guild_id, fields, cache).await
    }

    /// Query guild settings
    pub async fn fetch_guild(&self, guild_id: i64, cache: bool) -> Result<Option<Record<Guild>>> {
        self.fetch::<Guild>(guild_id, cache).await
    }

    /// Query every guild
    pub async fn fetch_guilds(&self, cache: bool) -> Result<Vec<Record<Guild>>> {
        self.fetch_all::<Guild>(cache).await
    }

    /// Cached guild settings
    pub fn get_guild(&self, guild_id: i64) -> Option<Record<Guild>> {
        self.get::<Guild>(&guild_id)
    }

    /// Delete guild settings
    pub async fn remove_guild(&self, guild_id: i64) -> Result<Option<Record<Guild>>> {
        self.remove::<Guild>(guild_id).await
    }

    // ========================================================================
    // BLACKLISTS
    // ========================================================================

    /// Blacklist a user indefinitely, clearing any expiry
    pub async fn add_blacklist(&self, user_id: i64, reason: Option<&str>) -> Result<Record<Blacklist>> {
        let fields = Fields::new()
            .set("blacklisted", true)
            .set("blacklisted_until", None::<chrono::DateTime<Utc>>)
            .set("reason", reason);
        info!(user_id, "Blacklisting user");
        self.upsert::<Blacklist>(user_id, fields, true).await
    }

    /// Blacklist a user for a number of days
    pub async fn add_temp_blacklist(
        &self,
        user_id: i64,
        days: i64,
        reason: Option<&str>,
    ) -> Result<Record<Blacklist>> {
        let until = Duration::try_days(days)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| ValidationError::TypeMismatch {
                table: Table::Blacklist.to_string(),
                column: "blacklisted_until".to_string(),
                expected: "a representable timestamp".to_string(),
                found: format!("now + {} days", days),
            })?;
        let fields = Fields::new()
            .set("blacklisted", true)
            .set("blacklisted_until", until)
            .set("reason", reason);
        info!(user_id, days, "Temporarily blacklisting user");
        self.upsert::<Blacklist>(user_id, fields, true).await
    }

    /// Query a user's blacklist entry
    pub async fn fetch_blacklist(&self, user_id: i64, cache: bool) -> Result<Option<Record<Blacklist>>> {
        self.fetch::<Blacklist>(user_id, cache).await
    }

    /// Query every user blacklist entry
    pub async fn fetch_blacklists(&self, cache: bool) -> Result<Vec<Record<Blacklist>>> {
        self.fetch_all::<Blacklist>(cache).await
    }

    /// Cached blacklist entry
    pub fn get_blacklist(&self, user_id: i64) -> Option<Record<Blacklist>> {
        self.get::<Blacklist>(&user_id)
    }

    /// Delete a user's blacklist entry
    pub async fn remove_blacklist(&self, user_id: i64) -> Result<Option<Record<Blacklist>>> {
        self.remove::<Blacklist>(user_id).await
    }

    /// Whether a user is currently blacklisted.
    ///
    /// Uses `getch`, so a backend failure reads as "not blacklisted".
    pub async fn is_blacklisted(&self, user_id: i64) -> bool {
        self.getch::<Blacklist>(user_id, true)
            .await
            .map_or(false, |entry| entry.is_active(Utc::now()))
    }

    /// Blacklist a guild
    pub async fn add_guild_blacklist(
        &self,
        guild_id: i64,
        reason: Option<&str>,
    ) -> Result<Record<GuildBlacklist>> {
        let fields = Fields::new().set("blacklisted", true).set("reason", reason);
        info!(guild_id, "Blacklisting guild");
        self.upsert::<GuildBlacklist>(guild_id, fields, true).await
    }

    /// Query a guild's blacklist entry
    pub async fn fetch_guild_blacklist(
        &self,
        guild_id: i64,
        cache: bool,
    ) -> Result<Option<Record<GuildBlacklist>>> {
        self.fetch::<GuildBlacklist>(guild_id, cache).await
    }

    /// Cached guild blacklist entry
    pub fn get_guild_blacklist(&self, guild_id: i64) -> Option<Record<GuildBlacklist>> {
        self.get::<GuildBlacklist>(&guild_id)
    }

    /// Delete a guild's blacklist entry
    pub async fn remove_guild_blacklist(&self, guild_id: i64) -> Result<Option<Record<GuildBlacklist>>> {
        self.remove::<GuildBlacklist>(guild_id).await
    }

    /// Whether a guild is blacklisted
    pub async fn is_guild_blacklisted(&self, guild_id: i64) -> bool {
        self.getch::<GuildBlacklist>(guild_id, true)
            .await
            .map_or(false, |entry| entry.blacklisted)
    }

    // ========================================================================
    // ECONOMY
    // ========================================================================

    /// Open an account, or return the existing one unchanged
    pub async fn add_economy(&self, user_id: i64, cache: bool) -> Result<Record<Economy>> {
        self.upsert::<Economy>(user_id, Fields::new(), cache).await
    }

    /// Query an account
    pub async fn fetch_economy(&self, user_id: i64, cache: bool) -> Result<Option<Record<Economy>>> {
        self.fetch::<Economy>(user_id, cache).await
    }

    /// Cached account
    pub fn get_economy(&self, user_id: i64) -> Option<Record<Economy>> {
        self.get::<Economy>(&user_id)
    }

    /// Delete an account
    pub async fn remove_economy(&self, user_id: i64) -> Result<Option<Record<Economy>>> {
        self.remove::<Economy>(user_id).await
    }

    // ========================================================================
    // COMMAND TOGGLES
    // ========================================================================

    /// Disable a command in a guild
    pub async fn disable_command(&self, guild_id: i64, name: &str) -> Result<Record<CommandToggles>> {
        self.toggle_command(guild_id, name, ArrayOp::Append).await
    }

    /// Re-enable a command in a guild
    pub async fn enable_command(&self, guild_id: i64, name: &str) -> Result<Record<CommandToggles>> {
        self.toggle_command(guild_id, name, ArrayOp::Remove).await
    }

    async fn toggle_command(
        &self,
        guild_id: i64,
        name: &str,
        op: ArrayOp,
    ) -> Result<Record<CommandToggles>> {
        let table = Table::Commands;
        let name = name.trim().to_lowercase();
        debug!(guild_id, command = %name, ?op, "Toggling command");

        // Make sure the guild has a row; a no-op when it already does
        let ensure = Statement::Insert {
            table,
            values: vec![(table.primary_key().to_string(), guild_id.into())],
            on_conflict: OnConflict::Ignore,
        };
        self.backend().execute(&ensure).await?;

        self.update::<CommandToggles>(
            vec![Assignment::Mutate("disabled".to_string(), op, name.into())],
            Predicate::eq(table.primary_key(), guild_id),
            Some(&guild_id),
        )
        .await
    }

    /// Query a guild's command toggles
    pub async fn fetch_commands(&self, guild_id: i64, cache: bool) -> Result<Option<Record<CommandToggles>>> {
        self.fetch::<CommandToggles>(guild_id, cache).await
    }

    /// Cached command toggles
    pub fn get_commands(&self, guild_id: i64) -> Option<Record<CommandToggles>> {
        self.get::<CommandToggles>(&guild_id)
    }

    /// Whether a command is disabled in a guild, via `getch`
    pub async fn is_command_disabled(&self, guild_id: i64, name: &str) -> bool {
        self.getch::<CommandToggles>(guild_id, true)
            .await
            .map_or(false, |toggles| toggles.is_disabled(name))
    }

    // ========================================================================
    // BADGES
    // ========================================================================

    /// Create a badge with no holders
    pub async fn add_badge(&self, name: &str, description: Option<&str>) -> Result<Record<Badge>> {
        let fields = Fields::new().set("description", description);
        self.add::<Badge>(name.to_string(), fields, true).await
    }

    /// Query a badge
    pub async fn fetch_badge(&self, name: &str, cache: bool) -> Result<Option<Record<Badge>>> {
        self.fetch::<Badge>(name.to_string(), cache).await
    }

    /// Query every badge
    pub async fn fetch_badges(&self, cache: bool) -> Result<Vec<Record<Badge>>> {
        self.fetch_all::<Badge>(cache).await
    }

    /// Cached badge
    pub fn get_badge(&self, name: &str) -> Option<Record<Badge>> {
        self.get::<Badge>(&name.to_string())
    }

    /// Delete a badge
    pub async fn remove_badge(&self, name: &str) -> Result<Option<Record<Badge>>> {
        self.remove::<Badge>(name.to_string()).await
    }

    /// Cached badges held by a user
    pub fn badges_of(&self, user_id: i64) -> Vec<Badge> {
        self.caches()
            .of::<Badge>()
            .values()
            .into_iter()
            .filter(|badge| badge.has(user_id))
            .collect()
    }

    // ========================================================================
    // STATUSES
    // ========================================================================

    /// Set a user's status, stamping `updated_at`
    pub async fn set_status(
        &self,
        user_id: i64,
        status: &str,
        message: Option<&str>,
    ) -> Result<Record<Status>> {
        let fields = Fields::new()
            .set("status", status)
            .set("message", message)
            .set("updated_at", Utc::now());
        self.upsert::<Status>(user_id, fields, true).await
    }

    /// Query a user's status
    pub async fn fetch_status(&self, user_id: i64, cache: bool) -> Result<Option<Record<Status>>> {
        self.fetch::<Status>(user_id, cache).await
    }

    /// Cached status
    pub fn get_status(&self, user_id: i64) -> Option<Record<Status>> {
        self.get::<Status>(&user_id)
    }
}

impl Record<Guild> {
    /// Add a role to the autorole list
    pub async fn add_autorole(&mut self, role_id: i64) -> Result<()> {
        self.mutate_array("autorole_ids", ArrayOp::Append, role_id).await
    }

    /// Remove a role from the autorole list
    pub async fn remove_autorole(&mut self, role_id: i64) -> Result<()> {
        self.mutate_array("autorole_ids", ArrayOp::Remove, role_id).await
    }
}

impl Record<Badge> {
    /// Award this badge to a user
    pub async fn add(&mut self, user_id: i64) -> Result<()> {
        self.mutate_array("users", ArrayOp::Append, user_id).await
    }

    /// Take this badge away from a user
    pub async fn remove(&mut self, user_id: i64) -> Result<()> {
        self.mutate_array("users", ArrayOp::Remove, user_id).await
    }
}

impl Record<CommandToggles> {
    /// Disable a command for this guild
    pub async fn disable(&mut self, name: &str) -> Result<()> {
        let name = name.trim().to_lowercase();
        self.mutate_array("disabled", ArrayOp::Append, name).await
    }

    /// Re-enable a command for this guild
    pub async fn enable(&mut self, name: &str) -> Result<()> {
        let name = name.trim().to_lowercase();
        self.mutate_array("disabled", ArrayOp::Remove, name).await
    }
}
