//! Resolution of "who am I" / "who gets this item" without a dedicated
//! identity endpoint. Three sources are tried in order (token profile,
//! response-header identity, directory lookup), each one only when the
//! previous came up empty.

use serde_json::{Map, Value};

use crate::api::client::Client;
use crate::api::types::{HeaderIdentity, Identity, Profile};
use crate::cancel::CancelToken;
use crate::error::Error;

/// Outcome of the cascade for the read-only `whoami` path. Partial results
/// are fine here: a header identity without directory enrichment is still a
/// valid answer.
#[derive(Debug)]
pub struct WhoamiReport {
    pub source: &'static str,
    pub profile: Option<Profile>,
    pub header: Option<HeaderIdentity>,
    pub directory: Option<Identity>,
    pub assigned_to: Value,
}

/// `"DisplayName<email>"` when both are present, else whichever one is.
pub fn profile_display(profile: &Profile) -> Option<String> {
    let name = profile.display_name.as_str();
    let email = profile.email_address.as_str();
    match (name.is_empty(), email.is_empty()) {
        (false, false) => Some(format!("{name}<{email}>")),
        (true, false) => Some(email.to_string()),
        (false, true) => Some(name.to_string()),
        (true, true) => None,
    }
}

/// Unique-name priority: `Domain\Account` when both properties are present,
/// then `Mail`, `Account`, `UniqueName`, then the caller's fallback.
pub fn identity_unique_name(identity: &Identity, fallback: &str) -> String {
    let domain = identity.property("Domain").unwrap_or("");
    let account = identity.property("Account").unwrap_or("");
    if !domain.is_empty() && !account.is_empty() {
        return format!("{domain}\\{account}");
    }
    for key in ["Mail", "Account", "UniqueName"] {
        if let Some(value) = identity.property(key) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    fallback.to_string()
}

/// Structured assignee reference for a directory identity. `descriptor`
/// prefers the subject descriptor over the legacy one.
pub fn identity_ref_value(identity: &Identity, fallback_unique: &str) -> Value {
    let mut reference = Map::new();
    reference.insert("id".into(), Value::String(identity.id.clone()));
    if !identity.provider_display_name.is_empty() {
        reference.insert(
            "displayName".into(),
            Value::String(identity.provider_display_name.clone()),
        );
    }
    if !identity.subject_descriptor.is_empty() {
        reference.insert(
            "descriptor".into(),
            Value::String(identity.subject_descriptor.clone()),
        );
    } else if !identity.descriptor.is_empty() {
        reference.insert(
            "descriptor".into(),
            Value::String(identity.descriptor.clone()),
        );
    }
    let unique = identity_unique_name(identity, fallback_unique);
    if !unique.is_empty() {
        reference.insert("uniqueName".into(), Value::String(unique));
    }
    Value::Object(reference)
}

/// Assignee reference when only the header identity is available.
pub fn header_ref_value(header: &HeaderIdentity) -> Value {
    if !header.id.is_empty() {
        let mut reference = Map::new();
        reference.insert("id".into(), Value::String(header.id.clone()));
        reference.insert(
            "uniqueName".into(),
            Value::String(header.unique_name.clone()),
        );
        return Value::Object(reference);
    }
    Value::String(header.unique_name.clone())
}

/// Resolve an assignee value for the create path. Exhausting every source is
/// fatal here, unlike the read path.
pub async fn resolve_assignee(client: &Client, cancel: &CancelToken) -> Result<Value, Error> {
    let mut last_failure = None;

    match client.profile_me(cancel).await {
        Ok(profile) => {
            if let Some(display) = profile_display(&profile) {
                return Ok(Value::String(display));
            }
        }
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(err) => last_failure = Some(err.to_string()),
    }

    match client.whoami_from_headers(cancel).await {
        Ok(header) => {
            if !header.id.is_empty() {
                return match client.resolve_identity_by_id(&header.id, cancel).await {
                    Ok(identity) => Ok(identity_ref_value(&identity, &header.unique_name)),
                    Err(Error::Cancelled) => Err(Error::Cancelled),
                    Err(_) => Ok(header_ref_value(&header)),
                };
            }
            if !header.unique_name.is_empty() {
                return Ok(Value::String(header.unique_name));
            }
        }
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(err) => last_failure = Some(err.to_string()),
    }

    Err(Error::AssignedToRequired {
        details: last_failure,
    })
}

/// Resolve the acting user for display. Profile wins outright; otherwise the
/// header identity is reported, enriched with a directory record when the
/// lookup succeeds.
pub async fn whoami(client: &Client, cancel: &CancelToken) -> Result<WhoamiReport, Error> {
    match client.profile_me(cancel).await {
        Ok(profile) => {
            let assigned = profile_display(&profile).unwrap_or_default();
            Ok(WhoamiReport {
                source: "profile",
                profile: Some(profile),
                header: None,
                directory: None,
                assigned_to: Value::String(assigned),
            })
        }
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(_) => {
            let header = client.whoami_from_headers(cancel).await?;
            let directory = if header.id.is_empty() {
                None
            } else {
                match client.resolve_identity_by_id(&header.id, cancel).await {
                    Ok(identity) => Some(identity),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(_) => None,
                }
            };
            let assigned_to = match &directory {
                Some(identity) => identity_ref_value(identity, &header.unique_name),
                None => header_ref_value(&header),
            };
            Ok(WhoamiReport {
                source: "headers",
                profile: None,
                header: Some(header),
                directory,
                assigned_to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::testutil::MockTransport;
    use crate::api::transport::Transport;

    fn identity_with(properties: &str) -> Identity {
        serde_json::from_str(&format!(
            r#"{{
                "id": "u1",
                "descriptor": "legacy",
                "subjectDescriptor": "subject",
                "providerDisplayName": "Dev One",
                "properties": {properties}
            }}"#
        ))
        .expect("identity json")
    }

    fn mock_client(transport: &Arc<MockTransport>) -> Client {
        Client::with_transport(
            "https://tfs.example.com",
            "P",
            transport.clone() as Arc<dyn Transport>,
        )
    }

    fn http_error(status: u16) -> Error {
        Error::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn domain_and_account_beat_mail() {
        let identity = identity_with(
            r#"{"Domain": {"$value": "D"}, "Account": {"$value": "A"}, "Mail": {"$value": "m@x.com"}}"#,
        );
        assert_eq!(identity_unique_name(&identity, "fb"), "D\\A");
    }

    #[test]
    fn unique_name_falls_through_mail_account_uniquename() {
        let mail_only = identity_with(r#"{"Mail": {"$value": "m@x.com"}}"#);
        assert_eq!(identity_unique_name(&mail_only, "fb"), "m@x.com");

        let account_only = identity_with(r#"{"Account": "acct"}"#);
        assert_eq!(identity_unique_name(&account_only, "fb"), "acct");

        let unique_only = identity_with(r#"{"UniqueName": {"$value": "un"}}"#);
        assert_eq!(identity_unique_name(&unique_only, "fb"), "un");

        let none = identity_with(r#"{}"#);
        assert_eq!(identity_unique_name(&none, "fb"), "fb");
    }

    #[test]
    fn ref_value_prefers_the_subject_descriptor() {
        let identity = identity_with(r#"{"Mail": {"$value": "m@x.com"}}"#);
        let value = identity_ref_value(&identity, "fb");
        assert_eq!(value["id"], "u1");
        assert_eq!(value["displayName"], "Dev One");
        assert_eq!(value["descriptor"], "subject");
        assert_eq!(value["uniqueName"], "m@x.com");
    }

    #[test]
    fn profile_display_variants() {
        let both = Profile {
            display_name: "Dev".into(),
            email_address: "d@x.com".into(),
            id: "p".into(),
        };
        assert_eq!(profile_display(&both).as_deref(), Some("Dev<d@x.com>"));

        let email_only = Profile {
            email_address: "d@x.com".into(),
            ..Profile::default()
        };
        assert_eq!(profile_display(&email_only).as_deref(), Some("d@x.com"));

        let name_only = Profile {
            display_name: "Dev".into(),
            ..Profile::default()
        };
        assert_eq!(profile_display(&name_only).as_deref(), Some("Dev"));

        assert_eq!(profile_display(&Profile::default()), None);
    }

    #[tokio::test]
    async fn assignee_comes_from_the_profile_when_it_answers() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(r#"{"displayName":"Dev","emailAddress":"d@x.com","id":"p"}"#);
        let client = mock_client(&transport);

        let value = resolve_assignee(&client, &CancelToken::new())
            .await
            .expect("resolved");
        assert_eq!(value, Value::String("Dev<d@x.com>".into()));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn profile_failure_falls_through_to_headers_and_directory() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(http_error(404));
        transport.push_json_with_header(r#"{"count":0,"value":[]}"#, "x-vss-userdata", "u1:d@x");
        transport.push_json(
            r#"{"count":1,"value":[{
                "id":"u1",
                "subjectDescriptor":"subject",
                "providerDisplayName":"Dev One",
                "properties":{"Mail":{"$value":"m@x.com"}}
            }]}"#,
        );
        let client = mock_client(&transport);

        let value = resolve_assignee(&client, &CancelToken::new())
            .await
            .expect("resolved");
        assert_eq!(value["id"], "u1");
        assert_eq!(value["uniqueName"], "m@x.com");
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn directory_failure_still_yields_the_header_reference() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(http_error(404));
        transport.push_json_with_header(r#"{"count":0,"value":[]}"#, "x-vss-userdata", "u1:d@x");
        transport.push_error(http_error(500));
        let client = mock_client(&transport);

        let value = resolve_assignee(&client, &CancelToken::new())
            .await
            .expect("resolved");
        assert_eq!(value["id"], "u1");
        assert_eq!(value["uniqueName"], "d@x");
    }

    #[tokio::test]
    async fn exhausting_every_source_is_fatal_for_the_create_path() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(http_error(404));
        transport.push_error(http_error(401));
        let client = mock_client(&transport);

        let err = resolve_assignee(&client, &CancelToken::new())
            .await
            .expect_err("must exhaust");
        assert_eq!(err.code(), "assigned_to_required");
    }

    #[tokio::test]
    async fn whoami_accepts_a_header_identity_without_enrichment() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(http_error(404));
        transport.push_json_with_header(r#"{"count":0,"value":[]}"#, "x-vss-userdata", "u1:d@x");
        transport.push_error(http_error(404));
        let client = mock_client(&transport);

        let report = whoami(&client, &CancelToken::new()).await.expect("report");
        assert_eq!(report.source, "headers");
        assert!(report.directory.is_none());
        assert_eq!(report.header.as_ref().map(|h| h.id.as_str()), Some("u1"));
        assert_eq!(report.assigned_to["uniqueName"], "d@x");
    }

    #[tokio::test]
    async fn whoami_surfaces_a_missing_header_as_unavailable() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(http_error(404));
        transport.push_json(r#"{"count":0,"value":[]}"#);
        let client = mock_client(&transport);

        let err = whoami(&client, &CancelToken::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "whoami_unavailable");
    }
}
