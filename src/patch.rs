//! JSON-Patch assembly for work-item create and update calls. The server
//! applies operations in list order, so ordering here is part of the
//! contract.

use serde::Serialize;
use serde_json::{json, Value};

use crate::api::client::Client;
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::identity;

pub const ASSIGNED_TO_FIELD: &str = "System.AssignedTo";
pub const DEFAULT_PARENT_RELATION: &str = "System.LinkTypes.Hierarchy-Reverse";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    pub fn add_field(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: "add".into(),
            path: format!("/fields/{field}"),
            value: value.into(),
        }
    }

    pub fn add_relation(value: Value) -> Self {
        Self {
            op: "add".into(),
            path: "/relations/-".into(),
            value,
        }
    }
}

/// Split a `Field=Value` assignment, trimming both sides.
pub fn parse_assignment(input: &str) -> Result<(String, String), Error> {
    let Some((field, value)) = input.split_once('=') else {
        return Err(Error::invalid_args_with(
            "invalid --set format, expected Field=Value",
            input,
        ));
    };
    let field = field.trim();
    let value = value.trim();
    if field.is_empty() {
        return Err(Error::invalid_args_with("field name is required", input));
    }
    Ok((field.to_string(), value.to_string()))
}

/// Patch for an update: one add per assignment, then the history comment
/// last when present.
pub fn update_patch(sets: &[String], comment: &str) -> Result<Vec<PatchOperation>, Error> {
    let mut patch = Vec::with_capacity(sets.len() + 1);
    for set in sets {
        let (field, value) = parse_assignment(set)?;
        patch.push(PatchOperation::add_field(&field, value));
    }
    if !comment.is_empty() {
        patch.push(PatchOperation::add_field("System.History", comment));
    }
    Ok(patch)
}

/// Inputs for a create patch, before assignee resolution.
pub struct CreateSpec<'a> {
    pub title: &'a str,
    pub assigned_to: &'a str,
    pub sets: &'a [String],
    pub parent_id: i64,
    pub parent_relation: &'a str,
}

/// Build the create patch, consulting the identity cascade only when neither
/// the explicit flag nor a generic assignment supplies an assignee.
pub async fn create_patch(
    client: &Client,
    spec: &CreateSpec<'_>,
    cancel: &CancelToken,
) -> Result<Vec<PatchOperation>, Error> {
    let (explicit, remaining) = split_assignee(spec.sets, spec.assigned_to)?;
    let assigned_to = match explicit {
        Some(value) => Value::String(value),
        None => identity::resolve_assignee(client, cancel).await?,
    };
    let parent = (spec.parent_id > 0).then(|| {
        let relation = if spec.parent_relation.is_empty() {
            DEFAULT_PARENT_RELATION
        } else {
            spec.parent_relation
        };
        ParentLink {
            relation: relation.to_string(),
            url: client.work_item_url(spec.parent_id),
        }
    });
    assemble_create_patch(spec.title, assigned_to, &remaining, parent)
}

pub struct ParentLink {
    pub relation: String,
    pub url: String,
}

/// Fixed operation order: title, assignee, optional parent relation, then
/// the remaining assignments as given.
pub fn assemble_create_patch(
    title: &str,
    assigned_to: Value,
    sets: &[String],
    parent: Option<ParentLink>,
) -> Result<Vec<PatchOperation>, Error> {
    if matches!(&assigned_to, Value::String(value) if value.is_empty())
        || assigned_to.is_null()
    {
        return Err(Error::AssignedToRequired { details: None });
    }
    let mut patch = vec![
        PatchOperation::add_field("System.Title", title),
        PatchOperation {
            op: "add".into(),
            path: format!("/fields/{ASSIGNED_TO_FIELD}"),
            value: assigned_to,
        },
    ];
    if let Some(parent) = parent {
        patch.push(PatchOperation::add_relation(json!({
            "rel": parent.relation,
            "url": parent.url,
        })));
    }
    patch.extend(update_patch(sets, "")?);
    Ok(patch)
}

/// Pull the assignee out of the generic assignments. An explicit assignee
/// wins; a `System.AssignedTo` assignment (any case) is consumed either way
/// so the create patch never carries two operations for the field.
fn split_assignee(sets: &[String], explicit: &str) -> Result<(Option<String>, Vec<String>), Error> {
    let mut assigned = (!explicit.is_empty()).then(|| explicit.to_string());
    let mut remaining = Vec::with_capacity(sets.len());
    for set in sets {
        let (field, value) = parse_assignment(set)?;
        if field.eq_ignore_ascii_case(ASSIGNED_TO_FIELD) {
            if assigned.is_none() && !value.is_empty() {
                assigned = Some(value);
            }
            continue;
        }
        remaining.push(set.clone());
    }
    Ok((assigned, remaining))
}
