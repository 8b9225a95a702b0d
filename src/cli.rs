//! Command dispatch and flag handling. Everything here orchestrates the
//! typed client; rendering goes through [`crate::output`] and the process
//! exit code is the only thing callers see.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use anyhow::Result;
use serde_json::{json, Value};

use crate::api::batch;
use crate::api::client::{Client, ClientOptions};
use crate::api::transport::LogSink;
use crate::api::types::{WiqlResponse, WorkItem, WorkItemRelation};
use crate::cancel::CancelToken;
use crate::config::{self, Config};
use crate::error::Error;
use crate::identity;
use crate::output;
use crate::patch::{self, CreateSpec};
use crate::wiql;

const GLOBAL_VALUE_FLAGS: &[&str] = &["base-url", "project", "pat"];
const GLOBAL_BOOL_FLAGS: &[&str] = &["json", "verbose", "insecure"];

const LIST_FIELDS: [&str; 7] = [
    "System.WorkItemType",
    "System.State",
    "System.Title",
    "System.AssignedTo",
    "System.AreaPath",
    "System.IterationPath",
    "System.Tags",
];

const SHOW_FIELDS: [&str; 7] = [
    "System.Title",
    "System.Description",
    "System.AssignedTo",
    "System.Tags",
    "System.WorkItemType",
    "System.State",
    "System.History",
];

pub async fn run(args: &[String], cancel: &CancelToken) -> i32 {
    let Some((command, rest)) = args.split_first() else {
        print_usage(&mut io::stderr().lock());
        return 1;
    };
    match command.as_str() {
        "help" | "-h" | "--help" => {
            print_usage(&mut io::stdout().lock());
            0
        }
        "wiql" => run_wiql(rest, cancel).await,
        "search" => run_search(rest, cancel).await,
        "my" => run_my(rest, cancel).await,
        "view" => run_view(rest, cancel).await,
        "show" => run_show(rest, cancel).await,
        "update" => run_update(rest, cancel).await,
        "create" => run_create(rest, cancel).await,
        "types" => run_types(rest, cancel).await,
        "whoami" => run_whoami(rest, cancel).await,
        "config" => run_config(rest),
        other => fail(
            Error::invalid_args(format!("unknown command: {other}")).into(),
            true,
        ),
    }
}

fn fail(err: anyhow::Error, json_mode: bool) -> i32 {
    output::write_error(&mut io::stderr().lock(), &err, json_mode);
    1
}

// ---- argument parsing ----

#[derive(Debug, Default)]
struct Parsed {
    values: HashMap<String, Vec<String>>,
    bools: HashMap<String, bool>,
    positionals: Vec<String>,
}

impl Parsed {
    fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    fn values_of(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }
}

/// Walk argv once. `--flag value` and `--flag=value` are equivalent; boolean
/// flags accept an optional `=true`/`=false`; anything without a leading
/// `--` is positional.
fn parse_args(args: &[String], value_flags: &[&str], bool_flags: &[&str]) -> Result<Parsed, Error> {
    let mut parsed = Parsed::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(stripped) = arg.strip_prefix("--") else {
            parsed.positionals.push(arg.clone());
            continue;
        };
        let (name, inline) = match stripped.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (stripped, None),
        };
        if bool_flags.contains(&name) || GLOBAL_BOOL_FLAGS.contains(&name) {
            let enabled = match inline.as_deref() {
                None | Some("true") => true,
                Some("false") => false,
                Some(other) => {
                    return Err(Error::invalid_args_with(
                        format!("--{name} expects true or false"),
                        other,
                    ))
                }
            };
            parsed.bools.insert(name.to_string(), enabled);
        } else if value_flags.contains(&name) || GLOBAL_VALUE_FLAGS.contains(&name) {
            let value = match inline {
                Some(value) => value,
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| Error::invalid_args(format!("missing value for --{name}")))?,
            };
            parsed
                .values
                .entry(name.to_string())
                .or_default()
                .push(value);
        } else {
            return Err(Error::invalid_args(format!("unknown flag --{name}")));
        }
    }
    Ok(parsed)
}

// ---- shared command context ----

struct CommandContext {
    config: Config,
    verbose: bool,
    insecure: bool,
}

fn build_context(parsed: &Parsed) -> Result<CommandContext> {
    let mut config = config::load(None)?.merged(config::from_env());
    if let Some(value) = parsed.value("base-url") {
        config.base_url = value.to_string();
    }
    if let Some(value) = parsed.value("project") {
        config.project = value.to_string();
    }
    if let Some(value) = parsed.value("pat") {
        config.pat = value.to_string();
    }
    if let Some(normalized) = config::normalized_base_url(&config.base_url, &config.project) {
        config.base_url = normalized;
    }
    Ok(CommandContext {
        verbose: parsed.flag("verbose").unwrap_or(false),
        insecure: parsed.flag("insecure").unwrap_or(false),
        config,
    })
}

fn build_client(ctx: &CommandContext) -> Result<Client, Error> {
    Client::new(ClientOptions {
        base_url: ctx.config.base_url.clone(),
        project: ctx.config.project.clone(),
        pat: ctx.config.pat.clone(),
        insecure: ctx.insecure,
        log: ctx.verbose.then(LogSink::stderr),
    })
}

fn require_project(ctx: &CommandContext) -> Result<(), Error> {
    if ctx.config.project.is_empty() {
        return Err(Error::ConfigMissing("project is required".into()));
    }
    Ok(())
}

fn list_fields() -> Vec<String> {
    LIST_FIELDS.iter().map(|field| field.to_string()).collect()
}

// ---- query commands ----

async fn run_wiql(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &["top"], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match wiql_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn wiql_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let query = parsed.positionals.first().cloned().unwrap_or_default();
    if query.is_empty() {
        return Err(Error::invalid_args("WIQL query is required").into());
    }
    let top = parse_top(parsed)?;
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    list_query_results(&client, &query, top, json_mode, cancel).await
}

async fn run_search(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &["top", "query"], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match search_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn search_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let query = parsed
        .value("query")
        .map(str::to_string)
        .filter(|value| !value.is_empty())
        .or_else(|| parsed.positionals.first().cloned())
        .unwrap_or_default();
    if query.is_empty() {
        return Err(Error::invalid_args("search query is required").into());
    }
    let top = parse_top(parsed)?;
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let wiql_text = wiql::search_query(&query);
    list_query_results(&client, &wiql_text, top, json_mode, cancel).await
}

async fn run_my(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(
        args,
        &["top", "type", "exclude-state"],
        &["all-types", "all-states"],
    ) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    // listing command: human-readable by default
    let json_mode = parsed.flag("json").unwrap_or(false);
    match my_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn my_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let type_filter = parsed.value("type").unwrap_or("");
    let all_types = if type_filter.trim().is_empty() {
        parsed.flag("all-types").unwrap_or(true)
    } else {
        false
    };
    let exclude_state = parsed.value("exclude-state").unwrap_or("");
    let all_states = parsed.flag("all-states").unwrap_or(false);
    let top = parse_top(parsed)?;
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let states: Vec<String> = if ctx.config.default_states.is_empty() {
        wiql::DEFAULT_MY_STATES
            .iter()
            .map(|state| state.to_string())
            .collect()
    } else {
        ctx.config.default_states.clone()
    };
    let query = wiql::my_items_query(type_filter, all_types, exclude_state, all_states, &states);
    list_query_results(&client, &query, top, json_mode, cancel).await
}

async fn list_query_results(
    client: &Client,
    query: &str,
    top: u32,
    json_mode: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let response = client.wiql(query, top, cancel).await?;
    let ids = collect_ids(&response);
    let items = batch::fetch_work_items(client, &ids, &list_fields(), cancel).await?;
    render_list(&items, json_mode)
}

// ---- single-item commands ----

async fn run_view(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &["fields", "expand"], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match view_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn view_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let id = parse_id(parsed)?;
    let fields = split_csv(parsed.value("fields").unwrap_or(""));
    let expand = map_expand(parsed.value("expand").unwrap_or("none"))?;
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let item = client.get_work_item(id, &fields, expand, cancel).await?;
    render_work_item(&item, json_mode)
}

async fn run_show(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &["children-rel", "max-children"], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(false);
    match show_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn show_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let id = parse_id(parsed)?;
    let children_rel = parsed
        .value("children-rel")
        .unwrap_or("System.LinkTypes.Hierarchy-Forward");
    let max_children: usize = match parsed.value("max-children") {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_args_with("--max-children must be a number", value))?,
        None => 20,
    };
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;

    let fields: Vec<String> = SHOW_FIELDS.iter().map(|field| field.to_string()).collect();
    let mut item = client.get_work_item(id, &fields, "None", cancel).await?;
    // relations need their own expand; a failure here only loses the
    // children section
    if let Ok(with_relations) = client.get_work_item(id, &[], "Relations", cancel).await {
        item.relations = with_relations.relations;
    }
    let summary = output::summarize(&item);
    let mut child_ids = relation_ids(&item.relations, children_rel);
    if max_children > 0 && child_ids.len() > max_children {
        child_ids.truncate(max_children);
    }
    let children: Vec<output::Summary> = if child_ids.is_empty() {
        Vec::new()
    } else {
        batch::fetch_work_items(&client, &child_ids, &list_fields(), cancel)
            .await?
            .iter()
            .map(output::summarize)
            .collect()
    };

    let mut out = io::stdout().lock();
    if json_mode {
        output::print_json(
            &mut out,
            &json!({ "workItem": summary, "children": children, "raw": item }),
        )?;
    } else {
        output::print_work_item_details(&mut out, &summary, &item.fields, &children);
    }
    Ok(())
}

// ---- write commands ----

async fn run_update(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &["set", "add-comment"], &["yes"]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match update_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

/// Bulk-update safety gate: touching more than five fields needs explicit
/// confirmation.
fn check_update_inputs(sets: &[String], comment: &str, confirmed: bool) -> Result<(), Error> {
    if sets.is_empty() && comment.is_empty() {
        return Err(Error::invalid_args(
            "at least one --set or --add-comment is required",
        ));
    }
    if sets.len() > 5 && !confirmed {
        return Err(Error::ConfirmationRequired(
            "more than 5 fields updated; use --yes to proceed".into(),
        ));
    }
    Ok(())
}

async fn update_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let id = parse_id(parsed)?;
    let sets = parsed.values_of("set");
    let comment = parsed.value("add-comment").unwrap_or("");
    check_update_inputs(sets, comment, parsed.flag("yes").unwrap_or(false))?;
    let patch_ops = patch::update_patch(sets, comment)?;
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let item = client.update_work_item(id, &patch_ops, cancel).await?;
    render_work_item(&item, json_mode)
}

async fn run_create(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(
        args,
        &["type", "title", "assigned-to", "parent", "parent-rel", "set"],
        &[],
    ) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match create_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn create_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let work_item_type = parsed.value("type").unwrap_or("");
    let title = parsed.value("title").unwrap_or("");
    if work_item_type.is_empty() || title.is_empty() {
        return Err(Error::invalid_args("--type and --title are required").into());
    }
    let parent_id: i64 = match parsed.value("parent") {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_args_with("--parent must be a number", value))?,
        None => 0,
    };
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let spec = CreateSpec {
        title,
        assigned_to: parsed.value("assigned-to").unwrap_or(""),
        sets: parsed.values_of("set"),
        parent_id,
        parent_relation: parsed
            .value("parent-rel")
            .unwrap_or(patch::DEFAULT_PARENT_RELATION),
    };
    let patch_ops = patch::create_patch(&client, &spec, cancel).await?;
    let item = client
        .create_work_item(work_item_type, &patch_ops, cancel)
        .await?;
    render_work_item(&item, json_mode)
}

// ---- metadata commands ----

async fn run_types(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &[], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match types_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn types_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let ctx = build_context(parsed)?;
    require_project(&ctx)?;
    let client = build_client(&ctx)?;
    let types = client.list_work_item_types(cancel).await?;
    let mut out = io::stdout().lock();
    if json_mode {
        let payload: Vec<Value> = types
            .iter()
            .map(|item| {
                json!({
                    "name": item.name,
                    "referenceName": item.reference_name,
                    "isDisabled": item.is_disabled,
                })
            })
            .collect();
        output::print_json(&mut out, &payload)?;
    } else {
        output::print_type_table(&mut out, &types);
    }
    Ok(())
}

async fn run_whoami(args: &[String], cancel: &CancelToken) -> i32 {
    let parsed = match parse_args(args, &[], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match whoami_command(&parsed, json_mode, cancel).await {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

async fn whoami_command(parsed: &Parsed, json_mode: bool, cancel: &CancelToken) -> Result<()> {
    let ctx = build_context(parsed)?;
    let client = build_client(&ctx)?;
    let report = identity::whoami(&client, cancel).await?;
    let mut out = io::stdout().lock();
    if report.source == "profile" {
        let profile = report.profile.unwrap_or_default();
        if json_mode {
            output::print_json(
                &mut out,
                &json!({
                    "displayName": profile.display_name,
                    "email": profile.email_address,
                    "id": profile.id,
                    "assignedTo": report.assigned_to,
                    "source": "profile",
                }),
            )?;
        } else {
            writeln!(out, "DisplayName: {}", profile.display_name)?;
            writeln!(out, "Email: {}", profile.email_address)?;
            writeln!(out, "ID: {}", profile.id)?;
            writeln!(out, "AssignedTo: {}", assigned_to_text(&report.assigned_to))?;
            writeln!(out, "Source: profile")?;
        }
        return Ok(());
    }
    let header = report.header.unwrap_or_default();
    if json_mode {
        output::print_json(
            &mut out,
            &json!({
                "id": header.id,
                "uniqueName": header.unique_name,
                "assignedTo": report.assigned_to,
                "source": "headers",
            }),
        )?;
    } else {
        writeln!(out, "ID: {}", header.id)?;
        writeln!(out, "UniqueName: {}", header.unique_name)?;
        writeln!(out, "AssignedTo: {}", assigned_to_text(&report.assigned_to))?;
        writeln!(out, "Source: headers")?;
    }
    Ok(())
}

fn assigned_to_text(value: &Value) -> String {
    match value {
        Value::String(plain) => plain.clone(),
        other => other.to_string(),
    }
}

// ---- config commands ----

fn run_config(args: &[String]) -> i32 {
    match args.split_first() {
        None => run_config_view(&[]),
        Some((sub, rest)) => match sub.as_str() {
            "view" => run_config_view(rest),
            "set" => run_config_set(rest),
            other => fail(
                Error::invalid_args(format!("unknown config subcommand: {other}")).into(),
                true,
            ),
        },
    }
}

fn run_config_view(args: &[String]) -> i32 {
    let parsed = match parse_args(args, &[], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match config_view_command(json_mode) {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

fn config_view_command(json_mode: bool) -> Result<()> {
    let cfg = config::load(None)?;
    let redacted = cfg.redacted();
    let mut out = io::stdout().lock();
    if json_mode {
        output::print_json(&mut out, &redacted)?;
    } else {
        writeln!(out, "BaseURL: {}", redacted.base_url)?;
        writeln!(out, "Project: {}", redacted.project)?;
        writeln!(out, "PAT: {}", redacted.pat)?;
    }
    Ok(())
}

fn run_config_set(args: &[String]) -> i32 {
    let parsed = match parse_args(args, &[], &[]) {
        Ok(parsed) => parsed,
        Err(err) => return fail(err.into(), true),
    };
    let json_mode = parsed.flag("json").unwrap_or(true);
    match config_set_command(&parsed, json_mode) {
        Ok(()) => 0,
        Err(err) => fail(err, json_mode),
    }
}

fn config_set_command(parsed: &Parsed, json_mode: bool) -> Result<()> {
    if !parsed.has("base-url") && !parsed.has("project") && !parsed.has("pat") {
        return Err(Error::invalid_args(
            "at least one of --base-url, --project, or --pat is required",
        )
        .into());
    }
    let mut cfg = config::load(None)?;
    if let Some(value) = parsed.value("base-url") {
        cfg.base_url = value.to_string();
    }
    if let Some(value) = parsed.value("project") {
        cfg.project = value.to_string();
    }
    if let Some(value) = parsed.value("pat") {
        cfg.pat = value.to_string();
    }
    config::save(None, &cfg)?;
    let mut out = io::stdout().lock();
    if json_mode {
        output::print_json(&mut out, &cfg.redacted())?;
    } else {
        writeln!(out, "Config updated")?;
    }
    Ok(())
}

// ---- shared helpers ----

fn parse_id(parsed: &Parsed) -> Result<i64, Error> {
    let raw = parsed
        .positionals
        .first()
        .map(String::as_str)
        .unwrap_or("");
    if raw.is_empty() {
        return Err(Error::invalid_args("work item id is required"));
    }
    raw.parse()
        .map_err(|_| Error::invalid_args("work item id must be a number"))
}

fn parse_top(parsed: &Parsed) -> Result<u32, Error> {
    match parsed.value("top") {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_args_with("--top must be a number", value)),
        None => Ok(0),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

fn map_expand(value: &str) -> Result<&'static str, Error> {
    match value.to_ascii_lowercase().as_str() {
        "" | "none" => Ok("None"),
        "relations" => Ok("Relations"),
        "all" => Ok("All"),
        other => Err(Error::invalid_args_with(
            "expand must be none, relations, or all",
            other,
        )),
    }
}

/// Ids referenced by a query result, first occurrence wins. Link queries
/// contribute both endpoints.
fn collect_ids(response: &WiqlResponse) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for reference in &response.work_items {
        if seen.insert(reference.id) {
            ids.push(reference.id);
        }
    }
    for link in &response.work_item_links {
        for reference in link.source.iter().chain(link.target.iter()) {
            if reference.id != 0 && seen.insert(reference.id) {
                ids.push(reference.id);
            }
        }
    }
    ids
}

fn relation_ids(relations: &[WorkItemRelation], rel_filter: &str) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for relation in relations {
        if !rel_filter.is_empty() && relation.rel != rel_filter {
            continue;
        }
        let id = id_from_url(&relation.url);
        if id > 0 && seen.insert(id) {
            ids.push(id);
        }
    }
    ids
}

fn id_from_url(url: &str) -> i64 {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|last| last.parse().ok())
        .unwrap_or(0)
}

fn render_list(items: &[WorkItem], json_mode: bool) -> Result<()> {
    let summaries: Vec<output::Summary> = items.iter().map(output::summarize).collect();
    let mut out = io::stdout().lock();
    if json_mode {
        output::print_json(&mut out, &summaries)?;
    } else {
        output::print_table(&mut out, &summaries);
    }
    Ok(())
}

fn render_work_item(item: &WorkItem, json_mode: bool) -> Result<()> {
    let summary = output::summarize(item);
    let mut out = io::stdout().lock();
    if json_mode {
        output::print_json(&mut out, &json!({ "workItem": summary, "raw": item }))?;
    } else {
        output::print_work_item(&mut out, &summary);
    }
    Ok(())
}

fn print_usage<W: Write>(out: &mut W) {
    let lines = [
        "tfs - CLI for TFS/Azure DevOps Server work items",
        "",
        "Usage:",
        "  tfs wiql \"<WIQL>\" [--top N] [--json]                              Run a WIQL query and list matching items.",
        "  tfs search --query \"<text>\" [--top N] [--json]                    Search by Title/Description.",
        "  tfs my [--top N] [--type <Type>] [--exclude-state <State>] [--all-states] [--json]",
        "                                                                     List my items in the current project.",
        "  tfs view <id> [--fields f1,f2,...] [--expand relations|all|none] [--json]",
        "                                                                     Show a work item by ID.",
        "  tfs show <id> [--children-rel <rel>] [--max-children N] [--json]   Show details and child items.",
        "  tfs update <id> --set \"Field=Value\" ... [--add-comment <text>] [--yes] [--json]",
        "                                                                     Update fields and add a comment.",
        "  tfs create --type <Type> --title <Title> [--set \"Field=Value\"...] [--assigned-to <Owner>] [--parent <id>] [--json]",
        "                                                                     Create a work item.",
        "  tfs types [--json]                                                 List work item types for the project.",
        "  tfs whoami [--json]                                                Show the identity resolved from the PAT.",
        "  tfs config view [--json]                                           Show config (PAT redacted).",
        "  tfs config set [--base-url <url>] [--project <name>] [--pat <token>] [--json]",
        "                                                                     Save config values.",
        "",
        "Run `tfs types` to list the work item type names for your project.",
        "",
        "Global flags:",
        "  --base-url    Base URL (overrides config/env)",
        "  --project     Project (overrides config/env)",
        "  --pat         PAT token (overrides config/env)",
        "  --json        Output JSON (set --json=false for text)",
        "  --verbose     Verbose HTTP logging (auth header suppressed)",
        "  --insecure    Skip TLS verification",
    ];
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
}
