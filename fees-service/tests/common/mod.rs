//! Common test utilities for fees-service integration tests.

use chrono::NaiveDate;
use fees_service::config::{DatabaseConfig, FeesConfig};
use fees_service::models::{
    CreateBatch, CreateInvoice, CreateInvoiceItem, CreateStaff, CreateStudent, StaffRole,
};
use fees_service::services::Database;
use fees_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use tempfile::TempDir;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing and the metrics registry for tests (only once).
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,fees_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
        fees_service::services::init_metrics();
    });
}

/// A spawned application backed by its own temp-file SQLite database.
/// The temp directory lives as long as the TestApp.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: Database,
    pub client: reqwest::Client,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_test_env();

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("fees_test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let config = FeesConfig {
            common: CommonConfig {
                port: 0, // Random port
                environment: "test".to_string(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 5,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to answer
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            client,
            _temp_dir: temp_dir,
        }
    }

    /// Seed a student directly through the storage layer.
    pub async fn seed_student(&self, name: &str, course: &str, admitted: NaiveDate) -> Uuid {
        self.db
            .create_student(&CreateStudent {
                student_name: name.to_string(),
                course_name: course.to_string(),
                date_of_admission: admitted,
            })
            .await
            .expect("Failed to seed student")
            .student_id
    }

    /// Seed a staff member directly through the storage layer.
    pub async fn seed_staff(&self, name: &str, role: StaffRole) -> Uuid {
        self.db
            .create_staff(&CreateStaff {
                staff_name: name.to_string(),
                role,
            })
            .await
            .expect("Failed to seed staff")
            .staff_id
    }

    /// Seed an invoice with the given (description, amount) items.
    pub async fn seed_invoice(&self, student_id: Uuid, items: &[(&str, i64)]) -> Uuid {
        self.db
            .create_invoice(&CreateInvoice {
                student_id,
                items: items
                    .iter()
                    .map(|(description, amount)| CreateInvoiceItem {
                        description: description.to_string(),
                        amount: *amount,
                    })
                    .collect(),
            })
            .await
            .expect("Failed to seed invoice")
            .invoice_id
    }

    /// Seed a batch for attendance rollup tests.
    pub async fn seed_batch(&self, name: &str, active: bool) -> Uuid {
        self.db
            .create_batch(&CreateBatch {
                batch_name: name.to_string(),
                active,
            })
            .await
            .expect("Failed to seed batch")
            .batch_id
    }
}

/// Date literal helper for fixtures.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("invalid test date")
}
