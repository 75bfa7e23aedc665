//! Database Test Utilities
//!
//! Testcontainer management and connection pooling for integration
//! tests that need a real PostgreSQL, including the append-only
//! triggers that an in-memory double can only imitate.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "visit_billing_test";

/// Configuration for the test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container with migrations applied
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container and applies all migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or the
    /// migrations fail to apply.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_exposed_port(5432.tcp())
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host,
            port,
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data while preserving the schema
    ///
    /// TRUNCATE does not fire the row-level append-only triggers, so
    /// this is the one sanctioned way to reset state between tests.
    pub async fn clear_data(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let tables = [
            "audit_log",
            "visit_events",
            "verification_markers",
            "payment_intents",
            "wallet_transactions",
            "wallets",
            "insurance_claims",
            "payments",
            "charges",
            "visits",
        ];

        for table in tables {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}

/// Global test database shared across integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates the shared test database instance
///
/// Reusing one container keeps the suite fast; tests that mutate
/// global state should use [`create_isolated_test_database`] instead.
///
/// # Panics
///
/// Panics if the database fails to initialize.
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database(
) -> Result<TestDatabase, Box<dyn std::error::Error + Send + Sync>> {
    TestDatabase::new().await
}
