use crate::config::{
    AppConfig, DEFAULT_LINE_DB_URL_TEMPLATE, DEFAULT_PRIMARY_LABEL_NAME, DEFAULT_SERIAL_TOKEN,
};
use crate::db::{
    self, build_statement, fetch_all_rows, fetch_first_row, raw_statement, DbConfig, DbPool,
    LineConnectionCache,
};
use crate::errors::ServiceError;
use crate::models::{
    FieldData, FieldSet, FieldValue, LabelTemplate, ModelId, ProductionLine, SerialNumber,
};
use crate::queries::{bind_serial, select_column_names, zip_row, FieldQueryKind, LabelTables};
use metrics::counter;
use sea_orm::FromQueryResult;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Settings the label data service needs beyond its database pool
#[derive(Debug, Clone)]
pub struct LabelDataSettings {
    pub schema: Option<String>,
    pub line_db_url_template: String,
    pub serial_token: String,
    pub primary_label_name: String,
    /// Pool tuning for production line databases
    pub line_pool: DbConfig,
}

impl Default for LabelDataSettings {
    fn default() -> Self {
        Self {
            schema: None,
            line_db_url_template: DEFAULT_LINE_DB_URL_TEMPLATE.to_string(),
            serial_token: DEFAULT_SERIAL_TOKEN.to_string(),
            primary_label_name: DEFAULT_PRIMARY_LABEL_NAME.to_string(),
            line_pool: DbConfig::default(),
        }
    }
}

impl From<&AppConfig> for LabelDataSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            schema: cfg.label_schema.clone(),
            line_db_url_template: cfg.line_db_url_template.clone(),
            serial_token: cfg.serial_token.clone(),
            primary_label_name: cfg.primary_label_name.clone(),
            line_pool: DbConfig {
                url: String::new(),
                max_connections: cfg.db_max_connections.clamp(1, 2),
                min_connections: 1,
                ..DbConfig::from(cfg)
            },
        }
    }
}

/// Resolves serial numbers to label templates and field values.
///
/// Fixed lookups go to the label database. Serial number data lives in the
/// production line's own database, which is connected on demand by
/// [`LabelDataService::model_id`] and reused until another line is asked for.
pub struct LabelDataService {
    db_pool: DbPool,
    tables: LabelTables,
    settings: LabelDataSettings,
    line_db: Mutex<LineConnectionCache>,
}

impl LabelDataService {
    pub fn new(db_pool: DbPool, settings: LabelDataSettings) -> Self {
        let line_db = LineConnectionCache::new(
            settings.line_db_url_template.clone(),
            settings.line_pool.clone(),
        );
        Self {
            db_pool,
            tables: LabelTables::new(settings.schema.clone()),
            settings,
            line_db: Mutex::new(line_db),
        }
    }

    /// Connects to the label database named in the configuration
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let db_pool = db::establish_connection_from_app_config(cfg).await?;
        Ok(Self::new(db_pool, LabelDataSettings::from(cfg)))
    }

    pub fn settings(&self) -> &LabelDataSettings {
        &self.settings
    }

    /// Names of every configured production line
    #[instrument(skip(self))]
    pub async fn production_lines(&self) -> Result<Vec<String>, ServiceError> {
        let statement = build_statement(&self.db_pool, &self.tables.production_line_names());
        let rows = fetch_all_rows(&self.db_pool, statement).await?;

        rows.iter()
            .map(|row| row.try_get_by_index::<String>(0).map_err(ServiceError::db_error))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn production_line(&self, name: &str) -> Result<ProductionLine, ServiceError> {
        let statement = build_statement(&self.db_pool, &self.tables.production_line(name));
        let row = fetch_first_row(&self.db_pool, statement)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Production line {} not found", name)))?;

        Ok(ProductionLine::from_query_result(&row, "")?)
    }

    /// Resolves the model of a serial number built on `line`.
    ///
    /// The line's lookup query runs against the line database and yields a
    /// model name, which is then looked up in the `Model` table.
    #[instrument(skip(self), fields(sn = %sn))]
    pub async fn model_id(&self, sn: &SerialNumber, line: &str) -> Result<ModelId, ServiceError> {
        let line = self.production_line(line).await?;
        let lookup = bind_serial(&line.model_lookup_query, &line.sn_token, sn)?;

        let model_name = {
            let mut line_db = self.line_db.lock().await;
            let pool = line_db.connect_to(&line.credentials).await?;
            let row = fetch_first_row(pool, raw_statement(pool, lookup))
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Serial number {} not found on line {}",
                        sn, line.name
                    ))
                })?;

            match FieldValue::from_row(&row, 0)? {
                FieldValue::Null => {
                    return Err(ServiceError::NotFound(format!(
                        "Serial number {} has no model on line {}",
                        sn, line.name
                    )))
                }
                value => value.to_string(),
            }
        };
        debug!(model_name = %model_name, "Resolved model name");

        let statement = build_statement(&self.db_pool, &self.tables.model_id_by_name(&model_name));
        let row = fetch_first_row(&self.db_pool, statement)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Model {} not found", model_name)))?;

        let model_id = ModelId::try_from(FieldValue::from_row(&row, 0)?)?;
        info!(model_id = %model_id, line = %line.name, "Resolved model for serial number");
        counter!("label_data.model_lookups", 1);

        Ok(model_id)
    }

    /// Values shown to the operator for a serial number
    #[instrument(skip(self), fields(sn = %sn, model_id = %model_id))]
    pub async fn display_data(
        &self,
        sn: &SerialNumber,
        model_id: &ModelId,
    ) -> Result<FieldSet, ServiceError> {
        self.field_set(sn, model_id, FieldQueryKind::Display).await
    }

    /// Values printed on the label for a serial number
    #[instrument(skip(self), fields(sn = %sn, model_id = %model_id))]
    pub async fn label_data(
        &self,
        sn: &SerialNumber,
        model_id: &ModelId,
    ) -> Result<FieldSet, ServiceError> {
        self.field_set(sn, model_id, FieldQueryKind::Label).await
    }

    /// Model id, display values and label values of a serial number
    #[instrument(skip(self), fields(sn = %sn))]
    pub async fn field_data(&self, sn: &SerialNumber, line: &str) -> Result<FieldData, ServiceError> {
        let model_id = self.model_id(sn, line).await?;
        let display = self.display_data(sn, &model_id).await?;
        let label = self.label_data(sn, &model_id).await?;

        Ok(FieldData {
            model_id,
            display,
            label,
        })
    }

    async fn field_set(
        &self,
        sn: &SerialNumber,
        model_id: &ModelId,
        kind: FieldQueryKind,
    ) -> Result<FieldSet, ServiceError> {
        let line_db = self.line_db.lock().await;
        let line_pool = line_db.current().ok_or_else(|| {
            ServiceError::InvalidOperation(
                "No production line database is connected; resolve the model first".to_string(),
            )
        })?;

        let statement = build_statement(&self.db_pool, &self.tables.field_query(model_id, kind));
        let row = fetch_first_row(&self.db_pool, statement)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Model {} has no {} query", model_id, kind))
            })?;
        let stored: String = row.try_get_by_index(0).map_err(ServiceError::db_error)?;

        let names = select_column_names(&stored)?;
        let bound = bind_serial(&stored, &self.settings.serial_token, sn)?;

        let row = fetch_first_row(line_pool, raw_statement(line_pool, bound))
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No {} data for serial number {} (model {})",
                    kind, sn, model_id
                ))
            })?;

        let fields = zip_row(&names, &row)?;
        counter!("label_data.field_queries", 1, "kind" => kind.to_string());
        Ok(fields)
    }

    /// The template registered under `label_name` for a model
    #[instrument(skip(self))]
    pub async fn template(
        &self,
        model_id: &ModelId,
        label_name: &str,
    ) -> Result<LabelTemplate, ServiceError> {
        let statement = build_statement(&self.db_pool, &self.tables.template(model_id, label_name));
        let row = fetch_first_row(&self.db_pool, statement)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Model {} has no {} label template",
                    model_id, label_name
                ))
            })?;

        Ok(LabelTemplate::from_query_result(&row, "")?)
    }

    pub async fn primary_template(&self, model_id: &ModelId) -> Result<LabelTemplate, ServiceError> {
        self.template(model_id, &self.settings.primary_label_name)
            .await
    }

    /// Every template attached to a model
    #[instrument(skip(self))]
    pub async fn templates(&self, model_id: &ModelId) -> Result<Vec<LabelTemplate>, ServiceError> {
        let statement = build_statement(&self.db_pool, &self.tables.templates(model_id));
        let rows = fetch_all_rows(&self.db_pool, statement).await?;

        let templates = rows
            .iter()
            .map(|row| LabelTemplate::from_query_result(row, ""))
            .collect::<Result<Vec<_>, _>>()?;
        if templates.is_empty() {
            warn!(model_id = %model_id, "Model has no label templates");
        }
        Ok(templates)
    }

    /// Closes the line and label database connections.
    ///
    /// Both pools are closed even if the first fails; the first error wins.
    pub async fn close(self) -> Result<(), ServiceError> {
        let line = self.line_db.into_inner().close().await;
        if let Err(e) = &line {
            warn!(error = %e, "Failed to close line database connection");
        }
        let label = db::close_pool(self.db_pool).await;
        line.and(label)
    }
}
