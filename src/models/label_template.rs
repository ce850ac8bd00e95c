use std::path::{Path, PathBuf};

use sea_orm::{DbErr, FromQueryResult, QueryResult};
use serde::Serialize;

/// A BarTender template attached to a model through `ModelLabel`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelTemplate {
    pub label_name: String,
    /// File name of the `.btw` document
    pub name: String,
    /// Directory holding the document and its CSV data source
    pub path: String,
}

impl LabelTemplate {
    pub fn new(
        label_name: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            label_name: label_name.into(),
            name: name.into(),
            path: path.into(),
        }
    }

    /// Full path of the template document.
    ///
    /// Stored directories usually carry their trailing separator (often a
    /// Windows one), in which case the name is appended verbatim.
    pub fn template_file(&self) -> PathBuf {
        if self.path.is_empty() {
            PathBuf::from(&self.name)
        } else if self.path.ends_with(['/', '\\']) {
            PathBuf::from(format!("{}{}", self.path, self.name))
        } else {
            Path::new(&self.path).join(&self.name)
        }
    }

    /// The CSV file the template reads its field values from
    pub fn csv_sidecar(&self) -> PathBuf {
        self.template_file().with_extension("csv")
    }
}

impl FromQueryResult for LabelTemplate {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        Ok(Self {
            label_name: res.try_get(pre, "LabelName")?,
            name: res.try_get(pre, "TemplateName")?,
            path: res.try_get(pre, "TemplatePath")?,
        })
    }
}
