use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::GeneratorConfig;
use crate::document::substitute;
use crate::error::{Result, ToolError};
use crate::io::docx::DocxTemplate;
use crate::io::excel_read::{self, open_template, read_mapping};
use crate::mapping::resolve_entries;
use crate::model::{Artifact, OutputBundle};
use crate::populate::populate_workbook;
use crate::table::{RecipientGroup, SourceTable};
use crate::tokens::build_token_map;

/// Inputs of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Workbook holding the sales dataset.
    pub sales_data: PathBuf,
    /// Directory of workbook templates.
    pub workbook_templates: PathBuf,
    /// Directory of document templates.
    pub document_templates: PathBuf,
    pub config: GeneratorConfig,
}

/// Progress of a recipient through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientState {
    Start,
    TemplatesResolved,
    WorkbookBuilt,
    DocumentBuilt,
    Aggregated,
}

/// Why a recipient stopped before producing every artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    WorkbookTemplateMissing(String),
    MappingSheetMissing(String),
    DocumentTemplateMissing(String),
    /// A template could not be read or written.
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::WorkbookTemplateMissing(name) => {
                write!(f, "workbook template '{name}' not found")
            }
            SkipReason::MappingSheetMissing(name) => {
                write!(f, "workbook template '{name}' has no mapping sheet")
            }
            SkipReason::DocumentTemplateMissing(name) => {
                write!(f, "document template '{name}' not found")
            }
            SkipReason::Failed(message) => write!(f, "{message}"),
        }
    }
}

/// Terminal state of one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    Aggregated,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientReport {
    pub recipient: String,
    /// Last state reached before the outcome was decided.
    pub reached: RecipientState,
    pub outcome: RecipientOutcome,
    /// Names of the artifacts stored in the bundle for this recipient.
    pub artifacts: Vec<String>,
}

/// Everything a run produced: the artifacts plus what went wrong on the way.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub bundle: OutputBundle,
    pub warnings: Vec<String>,
    pub recipients: Vec<RecipientReport>,
}

impl RunReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn store(&mut self, artifact: Artifact, recipient: &mut Vec<String>) {
        let requested = artifact.name.clone();
        let stored = self.bundle.push(artifact);
        if stored != requested {
            self.warn(format!(
                "Output name '{requested}' was already used; stored as '{stored}'."
            ));
        }
        recipient.push(stored);
    }
}

/// Runs the whole pipeline: reads the dataset, then builds the artifacts of
/// every recipient. Only structural problems with the dataset are errors;
/// recipient problems become warnings in the report.
#[instrument(
    level = "info",
    skip_all,
    fields(sales_data = %request.sales_data.display())
)]
pub fn generate(request: &GenerateRequest) -> Result<RunReport> {
    let table = excel_read::read_source_table(&request.sales_data, &request.config)?;
    info!(
        header_row = table.header_row,
        row_count = table.rows.len(),
        "read dataset"
    );
    Ok(generate_from_table(
        &table,
        &request.workbook_templates,
        &request.document_templates,
        &request.config,
    ))
}

/// Builds the artifacts of every recipient in `table`, one at a time in order
/// of first appearance.
pub fn generate_from_table(
    table: &SourceTable,
    workbook_templates: &Path,
    document_templates: &Path,
    config: &GeneratorConfig,
) -> RunReport {
    let mut report = RunReport::default();
    let groups = table.group_by_recipient();
    info!(recipient_count = groups.len(), "generating documents");

    for group in &groups {
        let mut recipient = RecipientReport {
            recipient: group.recipient.to_string(),
            reached: RecipientState::Start,
            outcome: RecipientOutcome::Aggregated,
            artifacts: Vec::new(),
        };
        let result = process_recipient(
            group,
            workbook_templates,
            document_templates,
            config,
            &mut report,
            &mut recipient,
        );
        recipient.outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                report.warn(format!("Skipping {}: {error}", group.recipient));
                RecipientOutcome::Skipped(SkipReason::Failed(error.to_string()))
            }
        };
        debug!(
            recipient = group.recipient,
            reached = ?recipient.reached,
            outcome = ?recipient.outcome,
            "recipient finished"
        );
        report.recipients.push(recipient);
    }

    info!(
        artifact_count = report.bundle.len(),
        warning_count = report.warnings.len(),
        "generation finished"
    );
    report
}

fn process_recipient(
    group: &RecipientGroup<'_>,
    workbook_templates: &Path,
    document_templates: &Path,
    config: &GeneratorConfig,
    report: &mut RunReport,
    recipient: &mut RecipientReport,
) -> Result<RecipientOutcome> {
    let name = group.recipient;
    let row = group.authoritative();

    let Some(workbook_path) = resolve_template(workbook_templates, &row.workbook_template) else {
        report.warn(format!(
            "Workbook template '{}' not found in '{}' for {name}.",
            row.workbook_template,
            workbook_templates.display()
        ));
        return Ok(RecipientOutcome::Skipped(SkipReason::WorkbookTemplateMissing(
            row.workbook_template.clone(),
        )));
    };
    let workbook_template = fs::read(&workbook_path)?;
    recipient.reached = RecipientState::TemplatesResolved;

    let mut workbook = open_template(&workbook_template)?;
    let mapping = match read_mapping(&mut workbook, &row.workbook_template, config) {
        Ok(mapping) => mapping,
        Err(error @ ToolError::MissingMappingSheet { .. }) => {
            report.warn(format!("{error} (recipient {name})."));
            return Ok(RecipientOutcome::Skipped(SkipReason::MappingSheetMissing(
                row.workbook_template.clone(),
            )));
        }
        Err(error) => return Err(error),
    };

    let resolution = resolve_entries(&mapping, row);
    for (entry, error) in &resolution.invalid {
        report.warn(format!(
            "Skipping mapping row {} of '{}' for {name}: {error}.",
            entry.row + 1,
            row.workbook_template
        ));
    }
    debug!(
        recipient = name,
        mapping_count = mapping.len(),
        resolved_count = resolution.entries.len(),
        "resolved mapping"
    );

    let populated = populate_workbook(&workbook_template, &resolution.entries, config)?;
    recipient.reached = RecipientState::WorkbookBuilt;
    report.store(
        Artifact::new(config.workbook_artifact_name(name), populated),
        &mut recipient.artifacts,
    );

    let Some(document_path) = resolve_template(document_templates, &row.document_template) else {
        report.warn(format!(
            "Word doc template '{}' not found in '{}' for {name}.",
            row.document_template,
            document_templates.display()
        ));
        return Ok(RecipientOutcome::Skipped(SkipReason::DocumentTemplateMissing(
            row.document_template.clone(),
        )));
    };

    let template = DocxTemplate::from_bytes(&fs::read(&document_path)?)?;
    let tokens = build_token_map(name, row, &resolution.entries, config);
    let document = template.render(&substitute(template.model(), &tokens))?;
    recipient.reached = RecipientState::DocumentBuilt;
    report.store(
        Artifact::new(
            config.document_artifact_name(&row.document_template, name),
            document,
        ),
        &mut recipient.artifacts,
    );
    recipient.reached = RecipientState::Aggregated;
    Ok(RecipientOutcome::Aggregated)
}

/// Returns the template path when `name` refers to an existing file.
fn resolve_template(directory: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let path = directory.join(name);
    path.is_file().then_some(path)
}
