//! CloudTrail record normalizer.
//!
//! Turns audit records into Account, Identity, Session, Event, Resource and
//! EventResource rows. One `Normalizer` covers one import run: the dedup sets
//! and accumulated tables live exactly as long as the instance.

use crate::core::config::{Config, TypeStyle};
use crate::core::rows::{
    AccountRow, EventResourceRow, EventRow, IdentityRow, Normalized, ResourceRow, SessionRow,
    Tables,
};
use crate::core::synth::{account_profile, resource_id};
use crate::sources::cloudtrail::model::{flag, is_blank, text, text_field, AuditRecord};
use crate::sources::cloudtrail::rules::{ResourceClassifier, ResourceType};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Keys tried in order for a resource's natural name.
const NATURAL_NAME_KEYS: [&str; 3] = ["name", "bucketName", "instanceId"];

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub seed: Option<u64>,
    pub style: TypeStyle,
    pub classifier: ResourceClassifier,
}

impl NormalizeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            seed: config.seed,
            style: config.normalize.resource_type_style,
            classifier: ResourceClassifier::with_custom_rules(&config.normalize.rules),
        }
    }
}

pub struct Normalizer {
    rng: StdRng,
    style: TypeStyle,
    classifier: ResourceClassifier,
    seen_accounts: HashSet<String>,
    seen_identities: HashSet<String>,
    seen_sessions: HashSet<String>,
    seen_resources: HashSet<String>,
    tables: Tables,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            style: options.style,
            classifier: options.classifier,
            seen_accounts: HashSet::new(),
            seen_identities: HashSet::new(),
            seen_sessions: HashSet::new(),
            seen_resources: HashSet::new(),
            tables: Tables::default(),
        }
    }

    /// Normalizes one record and appends its rows to the accumulated tables.
    pub fn ingest(&mut self, record: &AuditRecord) {
        let rows = self.normalize(record);
        self.tables.absorb(rows);
    }

    pub fn ingest_all<'a>(&mut self, records: impl IntoIterator<Item = &'a AuditRecord>) {
        for record in records {
            self.ingest(record);
        }
    }

    /// Rows accumulated so far.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Ends the run and hands over the accumulated tables.
    pub fn finish(self) -> Tables {
        self.tables
    }

    /// Produces the rows for one record, marking its keys as seen.
    ///
    /// The rows are returned rather than stored; [`Normalizer::ingest`] is the
    /// accumulating variant.
    pub fn normalize(&mut self, record: &AuditRecord) -> Normalized {
        let identity = record.user_identity.as_ref();
        let account_id = text(identity.and_then(|identity| identity.account_id.as_ref()));
        let identity_id = text(identity.and_then(|identity| identity.arn.as_ref()));

        let account = if !account_id.is_empty() && self.seen_accounts.insert(account_id.clone()) {
            let profile = account_profile(&mut self.rng);
            Some(AccountRow {
                account_id: account_id.clone(),
                account_alias: profile.alias,
                email: profile.email,
                phone: profile.phone,
            })
        } else {
            None
        };

        let identity_row = match identity {
            Some(user) if !identity_id.is_empty()
                && self.seen_identities.insert(identity_id.clone()) =>
            {
                Some(IdentityRow {
                    identity_id: identity_id.clone(),
                    identity_type: text(user.identity_type.as_ref()),
                    principal_id: text(user.principal_id.as_ref()),
                    arn: identity_id.clone(),
                    user_name: text(user.user_name.as_ref()),
                    account_id: account_id.clone(),
                })
            }
            _ => None,
        };

        let context = identity.and_then(|identity| identity.session_context.as_ref());
        let attributes = context.and_then(|context| context.attributes.as_ref());
        let creation_date = text(attributes.and_then(|attributes| attributes.creation_date.as_ref()));
        let mut session = None;
        let session_id = if creation_date.is_empty() {
            String::new()
        } else {
            let session_id = format!("{identity_id}_{creation_date}");
            if self.seen_sessions.insert(session_id.clone()) {
                let additional_info = json!({
                    "sessionIssuer": context
                        .and_then(|context| context.session_issuer.clone())
                        .unwrap_or_else(empty_object),
                    "webIdFederationData": context
                        .and_then(|context| context.web_id_federation_data.clone())
                        .unwrap_or_else(empty_object),
                });
                session = Some(SessionRow {
                    session_id: session_id.clone(),
                    creation_date: creation_date.clone(),
                    mfa_authenticated: flag(
                        attributes.and_then(|attributes| attributes.mfa_authenticated.as_ref()),
                    ),
                    additional_info: json_text(&additional_info),
                    identity_id: identity_id.clone(),
                });
            }
            session_id
        };

        let event_id = text(record.event_id.as_ref());
        let event = EventRow {
            event_id: event_id.clone(),
            event_time: text(record.event_time.as_ref()),
            event_source: text(record.event_source.as_ref()),
            event_name: text(record.event_name.as_ref()),
            source_ip: text(record.source_ip_address.as_ref()),
            user_agent: text(record.user_agent.as_ref()),
            request_params: params_text(record.request_parameters.as_ref()),
            response_params: params_text(record.response_elements.as_ref()),
            identity_id,
            session_id,
            account_id,
        };

        let mut resources = Vec::new();
        let mut event_resources = Vec::new();

        for item in record.instance_items() {
            let name = text_field(Some(item), "instanceId");
            if name.is_empty() || !self.seen_resources.insert(name.clone()) {
                continue;
            }
            let id = resource_id(&mut self.rng);
            resources.push(ResourceRow {
                resource_id: id.clone(),
                resource_name: name,
                resource_type: ResourceType::Ec2Instance.render(self.style),
                additional_metadata: json_text(item),
            });
            event_resources.push(EventResourceRow {
                event_id: event_id.clone(),
                resource_id: id,
                pre_state: text_field(item.get("previousState"), "name"),
                post_state: text_field(item.get("currentState"), "name"),
            });
        }

        // Runs independently of the instancesSet branch above, so one record
        // can yield two resources.
        let params = record.request_map();
        if let Some(resource_type) = self.classifier.classify(params) {
            let resource_type = resource_type.render(self.style);
            let name = natural_name(params);
            tracing::debug!(event_id = %event_id, %resource_type, %name, "classified request");
            if !name.is_empty() && self.seen_resources.insert(name.clone()) {
                let id = resource_id(&mut self.rng);
                resources.push(ResourceRow {
                    resource_id: id.clone(),
                    resource_name: name,
                    resource_type,
                    additional_metadata: json_text(&empty_object()),
                });
                event_resources.push(EventResourceRow {
                    event_id: event_id.clone(),
                    resource_id: id,
                    pre_state: String::new(),
                    post_state: String::new(),
                });
            }
        }

        Normalized {
            account,
            identity: identity_row,
            session,
            event,
            resources,
            event_resources,
        }
    }
}

/// First non-empty of `name`, `bucketName`, `instanceId`.
pub fn natural_name(params: Option<&Map<String, Value>>) -> String {
    let Some(params) = params else {
        return String::new();
    };
    NATURAL_NAME_KEYS
        .iter()
        .map(|key| text(params.get(*key)))
        .find(|name| !name.is_empty())
        .unwrap_or_default()
}

/// JSON text of request/response members; blank values become `{}`.
fn params_text(value: Option<&Value>) -> String {
    match value {
        Some(value) if !is_blank(value) => json_text(value),
        _ => "{}".to_string(),
    }
}

fn json_text(value: &Value) -> String {
    // serde_json::Value always has a JSON representation.
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
