use crate::config::ConfigService;
use crate::error::{PersistraError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Target database kind, as named in external configuration.
///
/// `Default` defers the choice to the engine (e.g. inferred from the
/// data-source URL).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Database {
    #[strum(serialize = "default")]
    #[default]
    Default,
    #[strum(serialize = "postgresql")]
    PostgreSql,
    #[strum(serialize = "mysql")]
    MySql,
    #[strum(serialize = "sqlite")]
    Sqlite,
}

/// Immutable ORM configuration snapshot.
///
/// Bound once at startup from a [`ConfigService`] (or deserialized from a
/// configuration document) and read-only thereafter. Optional fields stay
/// absent when unset; nothing is defaulted on their behalf here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OrmProperties {
    /// Log every statement the engine issues.
    pub show_sql: bool,
    /// Target database kind.
    pub database: Database,
    /// Engine-native dialect name. Absent means "use the engine default".
    pub database_platform: Option<String>,
    /// Synchronize the schema with the mapped entity set at startup.
    pub generate_ddl: bool,
    /// Keep a unit of work open for the full duration of each web request.
    pub open_in_view: Option<bool>,
    /// Historical spelling of `open-in-view`, honored for configurations
    /// written against the old key.
    #[serde(rename = "open_in_view")]
    pub legacy_open_in_view: Option<bool>,
}

impl OrmProperties {
    pub const SHOW_SQL: &'static str = "orm.show-sql";
    pub const DATABASE: &'static str = "orm.database";
    pub const DATABASE_PLATFORM: &'static str = "orm.database-platform";
    pub const GENERATE_DDL: &'static str = "orm.generate-ddl";
    pub const OPEN_IN_VIEW: &'static str = "orm.open-in-view";
    pub const OPEN_IN_VIEW_LEGACY: &'static str = "orm.open_in_view";

    /// Binds a properties snapshot from a configuration source.
    ///
    /// # Errors
    /// Fails fast on the first unparsable value, naming the offending key.
    pub fn bind(config: &ConfigService) -> Result<Self> {
        Ok(Self {
            show_sql: parse_bool(config, Self::SHOW_SQL)?.unwrap_or(false),
            database: parse_database(config, Self::DATABASE)?.unwrap_or_default(),
            database_platform: config.get(Self::DATABASE_PLATFORM),
            generate_ddl: parse_bool(config, Self::GENERATE_DDL)?.unwrap_or(false),
            open_in_view: parse_bool(config, Self::OPEN_IN_VIEW)?,
            legacy_open_in_view: parse_bool(config, Self::OPEN_IN_VIEW_LEGACY)?,
        })
    }

    /// Resolves the open-in-view policy: the explicit key wins, then the
    /// legacy alias, then `true`.
    pub fn open_in_view_or_default(&self) -> bool {
        self.open_in_view
            .or(self.legacy_open_in_view)
            .unwrap_or(true)
    }
}

fn parse_bool(config: &ConfigService, key: &str) -> Result<Option<bool>> {
    config
        .get(key)
        .map(|raw| {
            raw.parse::<bool>()
                .map_err(|_| PersistraError::InvalidProperty {
                    key: key.to_string(),
                    value: raw,
                    message: "expected 'true' or 'false'".to_string(),
                })
        })
        .transpose()
}

fn parse_database(config: &ConfigService, key: &str) -> Result<Option<Database>> {
    config
        .get(key)
        .map(|raw| {
            Database::from_str(&raw).map_err(|_| PersistraError::InvalidProperty {
                key: key.to_string(),
                value: raw,
                message: "unknown database kind".to_string(),
            })
        })
        .transpose()
}
