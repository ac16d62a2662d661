use super::error::ConnectionError;
use std::fmt;

/// Database engines reachable through the sqlx `Any` driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Sqlite,
    Postgres,
    MySql,
}

impl EngineKind {
    pub fn parse(engine: &str) -> Result<Self, ConnectionError> {
        match engine.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            _ => Err(ConnectionError::UnsupportedEngine(engine.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    fn schemes(&self) -> &'static [&'static str] {
        match self {
            Self::Sqlite => &["sqlite:"],
            Self::Postgres => &["postgres://", "postgresql://"],
            Self::MySql => &["mysql://", "mariadb://"],
        }
    }

    /// Turn a configured DSN into a driver URL. DSNs that already carry the
    /// engine's scheme pass through; bare SQLite paths are created on first connect.
    pub fn connection_url(&self, dsn: &str) -> String {
        if self.schemes().iter().any(|scheme| dsn.starts_with(scheme)) {
            return dsn.to_string();
        }

        match self {
            Self::Sqlite if dsn == ":memory:" => "sqlite::memory:".to_string(),
            Self::Sqlite if dsn.contains('?') => format!("sqlite://{dsn}"),
            Self::Sqlite => format!("sqlite://{dsn}?mode=rwc"),
            Self::Postgres => format!("postgres://{dsn}"),
            Self::MySql => format!("mysql://{dsn}"),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(EngineKind::parse("sqlite3").unwrap(), EngineKind::Sqlite);
        assert_eq!(EngineKind::parse("PostgreSQL").unwrap(), EngineKind::Postgres);
        assert_eq!(EngineKind::parse("mysql").unwrap(), EngineKind::MySql);
        assert!(matches!(
            EngineKind::parse("oracle"),
            Err(ConnectionError::UnsupportedEngine(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_sqlite_urls() {
        let sqlite = EngineKind::Sqlite;
        assert_eq!(sqlite.connection_url(":memory:"), "sqlite::memory:");
        assert_eq!(sqlite.connection_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(sqlite.connection_url("/tmp/app.db"), "sqlite:///tmp/app.db?mode=rwc");
        assert_eq!(sqlite.connection_url("/tmp/app.db?mode=ro"), "sqlite:///tmp/app.db?mode=ro");
    }

    #[test]
    fn test_network_urls() {
        assert_eq!(
            EngineKind::Postgres.connection_url("postgresql://u@db/app"),
            "postgresql://u@db/app"
        );
        assert_eq!(EngineKind::Postgres.connection_url("u@db/app"), "postgres://u@db/app");
        assert_eq!(EngineKind::MySql.connection_url("root@localhost/app"), "mysql://root@localhost/app");
    }
}
