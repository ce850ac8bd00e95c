use sea_orm::sea_query::{Alias, Expr, IntoTableRef, Order, Query, SelectStatement, TableRef};

use super::FieldQueryKind;
use crate::models::ModelId;

/// Builders for the fixed queries against the label database tables.
///
/// Table names are qualified with the configured schema when there is one;
/// values are always bound as parameters.
#[derive(Debug, Clone, Default)]
pub struct LabelTables {
    schema: Option<String>,
}

impl LabelTables {
    pub fn new(schema: Option<String>) -> Self {
        Self {
            schema: schema.filter(|s| !s.trim().is_empty()),
        }
    }

    fn table(&self, name: &str) -> TableRef {
        match &self.schema {
            Some(schema) => (Alias::new(schema.as_str()), Alias::new(name)).into_table_ref(),
            None => Alias::new(name).into_table_ref(),
        }
    }

    pub fn production_line_names(&self) -> SelectStatement {
        Query::select()
            .distinct()
            .column(Alias::new("ProductionLineName"))
            .from(self.table("ProductionLine"))
            .order_by(Alias::new("ProductionLineName"), Order::Asc)
            .to_owned()
    }

    pub fn production_line(&self, name: &str) -> SelectStatement {
        Query::select()
            .columns([
                Alias::new("ProductionLineID"),
                Alias::new("ProductionLineName"),
                Alias::new("FactorySNValueToken"),
                Alias::new("ModelLookupQuery"),
                Alias::new("ServerName"),
                Alias::new("DBName"),
                Alias::new("User"),
                Alias::new("Password"),
            ])
            .from(self.table("ProductionLine"))
            .and_where(Expr::col(Alias::new("ProductionLineName")).eq(name))
            .order_by(Alias::new("ProductionLineID"), Order::Asc)
            .limit(1)
            .to_owned()
    }

    pub fn model_id_by_name(&self, model_name: &str) -> SelectStatement {
        Query::select()
            .column(Alias::new("ModelID"))
            .from(self.table("Model"))
            .and_where(Expr::col(Alias::new("ModelName")).eq(model_name))
            .order_by(Alias::new("ModelID"), Order::Asc)
            .limit(1)
            .to_owned()
    }

    /// The stored display or label query of a model
    pub fn field_query(&self, model_id: &ModelId, kind: FieldQueryKind) -> SelectStatement {
        Query::select()
            .column(Alias::new(kind.column()))
            .from(self.table("ModelLabel"))
            .and_where(Expr::col(Alias::new("ModelID")).eq(sea_orm::Value::from(model_id)))
            .and_where(Expr::col(Alias::new(kind.column())).is_not_null())
            .order_by(Alias::new("ModelLabelID"), Order::Asc)
            .limit(1)
            .to_owned()
    }

    pub fn templates(&self, model_id: &ModelId) -> SelectStatement {
        self.template_select(model_id)
            .order_by(Alias::new("ModelLabelID"), Order::Asc)
            .to_owned()
    }

    pub fn template(&self, model_id: &ModelId, label_name: &str) -> SelectStatement {
        self.template_select(model_id)
            .and_where(Expr::col(Alias::new("LabelName")).eq(label_name))
            .order_by(Alias::new("ModelLabelID"), Order::Asc)
            .limit(1)
            .to_owned()
    }

    fn template_select(&self, model_id: &ModelId) -> SelectStatement {
        Query::select()
            .columns([
                Alias::new("LabelName"),
                Alias::new("TemplateName"),
                Alias::new("TemplatePath"),
            ])
            .from(self.table("ModelLabel"))
            .and_where(Expr::col(Alias::new("ModelID")).eq(sea_orm::Value::from(model_id)))
            .to_owned()
    }
}
