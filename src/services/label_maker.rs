use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{FieldSet, LabelTemplate};
use crate::services::printer::{LabelPrinter, PrintReceipt};

const CSV_DELIMITER: char = ',';
const CSV_LINE_END: &str = "\r\n";

/// Result of writing a template's data source and printing it
#[derive(Debug, Clone, Serialize)]
pub struct PrintOutcome {
    pub csv_path: PathBuf,
    pub receipt: PrintReceipt,
}

/// Prints one label: fills the template's CSV data source, then prints the template.
pub struct LabelMaker {
    fields: FieldSet,
    template: LabelTemplate,
    printer: Arc<dyn LabelPrinter>,
}

impl LabelMaker {
    pub fn new(fields: FieldSet, template: LabelTemplate, printer: Arc<dyn LabelPrinter>) -> Self {
        Self {
            fields,
            template,
            printer,
        }
    }

    pub fn template(&self) -> &LabelTemplate {
        &self.template
    }

    /// The CSV file the template reads its fields from
    pub fn csv_path(&self) -> PathBuf {
        self.template.csv_sidecar()
    }

    /// Header row of field names followed by one row of values
    pub fn render_csv(&self) -> String {
        let delimiter = CSV_DELIMITER.to_string();

        let header = self
            .fields
            .names()
            .map(|name| escape_field(name, CSV_DELIMITER))
            .collect::<Vec<_>>()
            .join(&delimiter);
        let row = self
            .fields
            .values()
            .map(|value| escape_field(&value.label_text(), CSV_DELIMITER))
            .collect::<Vec<_>>()
            .join(&delimiter);

        format!("{header}{CSV_LINE_END}{row}{CSV_LINE_END}")
    }

    /// Overwrites the template's CSV data source with the current fields.
    ///
    /// The file must already exist, since the template's data source points at it.
    #[instrument(skip(self), fields(template = %self.template.name))]
    pub async fn update_csv(&self) -> Result<PathBuf, ServiceError> {
        if self.fields.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No label fields to write".to_string(),
            ));
        }

        let path = self.csv_path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(ServiceError::TemplateError(format!(
                    "CSV data source {} is not a file",
                    path.display()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::TemplateError(format!(
                    "CSV data source {} does not exist; create it next to the template",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        }

        tokio::fs::write(&path, self.render_csv()).await?;
        info!(path = %path.display(), fields = self.fields.len(), "Updated label data source");

        Ok(path)
    }

    /// Sends the template to the printer
    #[instrument(skip(self), fields(template = %self.template.name, printer = self.printer.name()))]
    pub async fn print_template(&self) -> Result<PrintReceipt, ServiceError> {
        let template_file = self.template.template_file();
        if !tokio::fs::try_exists(&template_file).await? {
            return Err(ServiceError::TemplateError(format!(
                "Label template {} does not exist",
                template_file.display()
            )));
        }

        self.printer.print(&template_file).await
    }

    pub async fn run(&self) -> Result<PrintOutcome, ServiceError> {
        let csv_path = self.update_csv().await?;
        let receipt = self.print_template().await?;
        Ok(PrintOutcome { csv_path, receipt })
    }
}

fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') || value.contains('\r') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}
