#![allow(dead_code)]

use std::path::{Path, PathBuf};

use label_printer::{
    db::{self, DbConfig, DbPool},
    services::{LabelDataService, LabelDataSettings},
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement, Value};
use tempfile::TempDir;

pub const LINE_NAME: &str = "Line 1";
pub const MODEL_ID: i64 = 7;
pub const MODEL_NAME: &str = "PX-200";
pub const KNOWN_SN: &str = "AB123";

/// A label database and one production line database, both SQLite files in a
/// temporary directory, seeded with a single model and its templates.
pub struct LabelFixture {
    pub dir: TempDir,
    pub label_db_url: String,
    pub line_db_path: PathBuf,
}

impl LabelFixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let label_db_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("labels.db").display()
        );
        let line_db_path = dir.path().join("line1.db");

        let fixture = Self {
            dir,
            label_db_url,
            line_db_path,
        };
        fixture.seed_line_db().await;
        fixture.seed_label_db().await;
        fixture
    }

    /// A migrated label database with no rows and no line database
    pub async fn empty() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let label_db_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("empty.db").display()
        );
        let line_db_path = dir.path().join("missing.db");

        let fixture = Self {
            dir,
            label_db_url,
            line_db_path,
        };
        let pool = fixture.label_pool().await;
        db::run_migrations(&pool)
            .await
            .expect("failed to migrate label database");
        db::close_pool(pool).await.expect("failed to close label database");
        fixture
    }

    pub fn template_dir(&self) -> String {
        format!("{}/", self.dir.path().display())
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    pub fn settings(&self) -> LabelDataSettings {
        LabelDataSettings {
            line_db_url_template: "sqlite://{database}?mode=rwc".to_string(),
            line_pool: DbConfig {
                max_connections: 1,
                ..DbConfig::default()
            },
            ..LabelDataSettings::default()
        }
    }

    pub async fn service(&self) -> LabelDataService {
        let pool = self.label_pool().await;
        LabelDataService::new(pool, self.settings())
    }

    pub async fn label_pool(&self) -> DbPool {
        db::establish_connection(&self.label_db_url)
            .await
            .expect("failed to open label database")
    }

    async fn seed_line_db(&self) {
        let url = format!("sqlite://{}?mode=rwc", self.line_db_path.display());
        let pool = db::establish_connection(&url)
            .await
            .expect("failed to open line database");

        pool.execute_unprepared(
            "CREATE TABLE Units (
                SerialNumber TEXT PRIMARY KEY,
                ModelName TEXT,
                Voltage REAL,
                Notes TEXT
            )",
        )
        .await
        .expect("failed to create units table");

        let units: [(&str, Option<&str>, f64, Option<&str>); 3] = [
            (KNOWN_SN, Some(MODEL_NAME), 230.7, None),
            ("ZZ999", Some("Unregistered"), 12.0, Some("prototype")),
            ("NM001", None, 5.0, None),
        ];
        for (sn, model, voltage, notes) in units {
            insert(
                &pool,
                "INSERT INTO Units (SerialNumber, ModelName, Voltage, Notes) VALUES (?, ?, ?, ?)",
                vec![
                    sn.into(),
                    model.map(str::to_string).into(),
                    voltage.into(),
                    notes.map(str::to_string).into(),
                ],
            )
            .await;
        }

        db::close_pool(pool).await.expect("failed to close line database");
    }

    async fn seed_label_db(&self) {
        let pool = self.label_pool().await;
        db::run_migrations(&pool)
            .await
            .expect("failed to migrate label database");

        insert(
            &pool,
            "INSERT INTO ProductionLine (ProductionLineName, FactorySNValueToken, ModelLookupQuery, ServerName, DBName, User, Password)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            vec![
                LINE_NAME.into(),
                "{SN}".into(),
                "SELECT ModelName FROM Units WHERE SerialNumber = '{SN}'".into(),
                "local".into(),
                self.line_db_path.to_string_lossy().into_owned().into(),
                "reader".into(),
                "secret".into(),
            ],
        )
        .await;

        insert(
            &pool,
            "INSERT INTO Model (ModelID, ModelName) VALUES (?, ?)",
            vec![MODEL_ID.into(), MODEL_NAME.into()],
        )
        .await;

        insert(
            &pool,
            "INSERT INTO ModelLabel (ModelID, LabelName, TemplateName, TemplatePath, DisplayFieldQuery, LabelFieldQuery)
             VALUES (?, ?, ?, ?, ?, ?)",
            vec![
                MODEL_ID.into(),
                "Primary".into(),
                "rating.btw".into(),
                self.template_dir().into(),
                "SELECT ModelName AS Model, Voltage, Notes FROM Units WHERE SerialNumber = '#SN#'".into(),
                "SELECT SerialNumber AS Serial, u.ModelName, Voltage FROM Units u WHERE SerialNumber = '#SN#'".into(),
            ],
        )
        .await;

        insert(
            &pool,
            "INSERT INTO ModelLabel (ModelID, LabelName, TemplateName, TemplatePath, DisplayFieldQuery, LabelFieldQuery)
             VALUES (?, ?, ?, ?, ?, ?)",
            vec![
                MODEL_ID.into(),
                "Carton".into(),
                "carton.btw".into(),
                self.template_dir().into(),
                Option::<String>::None.into(),
                Option::<String>::None.into(),
            ],
        )
        .await;

        db::close_pool(pool).await.expect("failed to close label database");
    }

    /// Creates the template document and its CSV data source
    pub fn create_template_files(&self, template_name: &str) {
        let template = self.path(template_name);
        std::fs::write(&template, b"btw").expect("failed to write template");
        std::fs::write(template.with_extension("csv"), b"").expect("failed to write csv");
    }
}

async fn insert(pool: &DbPool, sql: &str, values: Vec<Value>) {
    pool.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        values,
    ))
    .await
    .expect("failed to seed row");
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("failed to read file")
}
