//! Rendering of typed results: normalized work-item summaries, aligned text
//! tables, single-line JSON, and the error envelope for scripting callers.

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::types::{WorkItem, WorkItemType};
use crate::error::Error;

/// A work item flattened to its well-known fields for listing and detail
/// views. The raw field map rides along for JSON consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    pub tags: Option<String>,
    pub url: Option<String>,
    pub fields: Map<String, Value>,
}

pub fn summarize(item: &WorkItem) -> Summary {
    let fields = &item.fields;
    Summary {
        id: item.id,
        kind: field_string(fields, "System.WorkItemType"),
        state: field_string(fields, "System.State"),
        title: field_string(fields, "System.Title"),
        assigned_to: identity_string(fields.get("System.AssignedTo")),
        area_path: field_string(fields, "System.AreaPath"),
        iteration_path: field_string(fields, "System.IterationPath"),
        tags: field_string(fields, "System.Tags"),
        url: (!item.url.is_empty()).then(|| item.url.clone()),
        fields: fields.clone(),
    }
}

/// Assignee fields arrive either as a plain string or as an identity object;
/// collapse the object to `DisplayName<uniqueName>`.
fn identity_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(plain) if !plain.is_empty() => Some(plain.clone()),
        Value::Object(identity) => {
            let display = identity
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or("");
            let unique = identity
                .get("uniqueName")
                .and_then(Value::as_str)
                .unwrap_or("");
            match (display.is_empty(), unique.is_empty()) {
                (false, false) => Some(format!("{display}<{unique}>")),
                (false, true) => Some(display.to_string()),
                (true, false) => Some(unique.to_string()),
                (true, true) => None,
            }
        }
        _ => None,
    }
}

fn field_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

pub fn print_json<W: Write>(out: &mut W, value: &impl Serialize) -> anyhow::Result<()> {
    let data = serde_json::to_string(value)?;
    writeln!(out, "{data}")?;
    Ok(())
}

pub fn print_table<W: Write>(out: &mut W, items: &[Summary]) {
    let headers = ["ID", "TYPE", "STATE", "TITLE", "ASSIGNED"];
    let rows: Vec<[String; 5]> = items
        .iter()
        .map(|item| {
            [
                item.id.to_string(),
                item.kind.clone().unwrap_or_default(),
                item.state.clone().unwrap_or_default(),
                item.title.clone().unwrap_or_default(),
                item.assigned_to.clone().unwrap_or_default(),
            ]
        })
        .collect();
    write_columns(out, &headers, &rows);
}

pub fn print_type_table<W: Write>(out: &mut W, types: &[WorkItemType]) {
    let headers = ["NAME", "REFERENCE", "DISABLED"];
    let rows: Vec<[String; 3]> = types
        .iter()
        .map(|item| {
            [
                item.name.clone(),
                item.reference_name.clone(),
                if item.is_disabled { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    write_columns(out, &headers, &rows);
}

fn write_columns<W: Write, const N: usize>(out: &mut W, headers: &[&str; N], rows: &[[String; N]]) {
    let mut widths: [usize; N] = [0; N];
    for (i, header) in headers.iter().enumerate() {
        widths[i] = header.chars().count();
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    write_row(out, &header_row, &widths);
    for row in rows {
        write_row(out, row.as_slice(), &widths);
    }
}

fn write_row<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i + 1 == cells.len() {
            line.push_str(cell);
        } else {
            let pad = widths[i].saturating_sub(cell.chars().count());
            line.push_str(cell);
            line.extend(std::iter::repeat(' ').take(pad + 2));
        }
    }
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Plain-text detail block for a single work item.
pub fn print_work_item<W: Write>(out: &mut W, summary: &Summary) {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let _ = writeln!(out, "ID: {}", summary.id);
    let _ = writeln!(out, "Type: {}", field(&summary.kind));
    let _ = writeln!(out, "State: {}", field(&summary.state));
    let _ = writeln!(out, "Title: {}", field(&summary.title));
    let _ = writeln!(out, "AssignedTo: {}", field(&summary.assigned_to));
    let _ = writeln!(out, "AreaPath: {}", field(&summary.area_path));
    let _ = writeln!(out, "IterationPath: {}", field(&summary.iteration_path));
    let _ = writeln!(out, "Tags: {}", field(&summary.tags));
    let _ = writeln!(out, "URL: {}", field(&summary.url));
}

/// Detail view with description, latest comment, and resolved children.
pub fn print_work_item_details<W: Write>(
    out: &mut W,
    summary: &Summary,
    fields: &Map<String, Value>,
    children: &[Summary],
) {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let _ = writeln!(out, "ID: {}", summary.id);
    let _ = writeln!(out, "Title: {}", field(&summary.title));
    let _ = writeln!(out, "Type: {}", field(&summary.kind));
    let _ = writeln!(out, "State: {}", field(&summary.state));
    let _ = writeln!(out, "AssignedTo: {}", field(&summary.assigned_to));
    let _ = writeln!(out, "Tags: {}", field(&summary.tags));
    let _ = writeln!(out);
    if let Some(Value::String(description)) = fields.get("System.Description") {
        if !description.is_empty() {
            let _ = writeln!(out, "Description:");
            let _ = writeln!(out, "{description}");
            let _ = writeln!(out);
        }
    }
    if let Some(Value::String(history)) = fields.get("System.History") {
        if !history.is_empty() {
            let _ = writeln!(out, "Comment (latest):");
            let _ = writeln!(out, "{history}");
            let _ = writeln!(out);
        }
    }
    if children.is_empty() {
        let _ = writeln!(out, "Children: none");
        return;
    }
    let _ = writeln!(out, "Children:");
    print_table(out, children);
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

/// Errors go to the caller as `{"error": {code, message, details}}` in JSON
/// mode and as a bare message otherwise. Unclassified errors fall back to
/// `internal_error`.
pub fn write_error<W: Write>(out: &mut W, err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let detail = match err.downcast_ref::<Error>() {
            Some(core) => ErrorDetail {
                code: core.code().to_string(),
                message: core.to_string(),
                details: core.details(),
            },
            None => ErrorDetail {
                code: "internal_error".to_string(),
                message: format!("{err:#}"),
                details: None,
            },
        };
        if let Ok(data) = serde_json::to_string(&ErrorEnvelope { error: detail }) {
            let _ = writeln!(out, "{data}");
        }
        return;
    }
    let _ = writeln!(out, "{err:#}");
}
