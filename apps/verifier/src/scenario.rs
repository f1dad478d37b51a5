//! The entity CRUD scenario.
//!
//! Calls are issued strictly in sequence and the first failure ends the run:
//! create → update → get (must equal the update response) → list (must be
//! non-empty) → delete, optionally followed by a list that must no longer
//! contain the entity.

use crate::error::{Result, VerifyError};
use chrono::{DateTime, Utc};
use entity_client::{Entity, EntityClient, EntityFields, EntityId, EnumField, FilePart, Operation};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Instant;

/// Transport mode selected by the invoking harness. Only REST runs the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ApiMode {
    Rest,
    Other(String),
}

impl ApiMode {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("rest") {
            Self::Rest
        } else {
            Self::Other(value.to_string())
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Self::Rest)
    }
}

impl FromStr for ApiMode {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => f.write_str("rest"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

impl From<ApiMode> for String {
    fn from(mode: ApiMode) -> Self {
        mode.to_string()
    }
}

/// Field values sent on create.
pub fn first_fields() -> EntityFields {
    EntityFields {
        string_field: "TestScript1".to_string(),
        int_field: 1,
        enum_field: EnumField::A,
        string_array_field: vec!["test1".to_string(), "test2".to_string()],
        bool_field: true,
    }
}

/// Field values sent on update; disjoint from [`first_fields`].
pub fn second_fields() -> EntityFields {
    EntityFields {
        string_field: "TestScript2".to_string(),
        int_field: 2,
        enum_field: EnumField::B,
        string_array_field: vec!["test2".to_string()],
        bool_field: false,
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub api: ApiMode,
    /// Language selector passed by the harness. Reported, never interpreted.
    pub lang: String,
    pub first: EntityFields,
    pub second: EntityFields,
    /// After delete, list again and require the id to be gone.
    pub verify_deleted: bool,
    /// Download the attachment named by the update response and compare it
    /// with the uploaded bytes.
    pub verify_file: bool,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            api: ApiMode::Rest,
            lang: "ts".to_string(),
            first: first_fields(),
            second: second_fields(),
            verify_deleted: true,
            verify_file: false,
        }
    }
}

/// One successful HTTP call of the scenario.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: String,
    pub method: String,
    pub path: String,
    /// Response status. A step only records on success, so this is the
    /// operation's expected status.
    pub status: u16,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub started_at: DateTime<Utc>,
    pub lang: String,
    pub entity_id: EntityId,
    pub created: Entity,
    pub updated: Entity,
    pub steps: Vec<StepRecord>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Skipped { api: ApiMode },
    Completed(ScenarioReport),
}

impl ScenarioOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn report(&self) -> Option<&ScenarioReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

#[derive(Default)]
struct Steps {
    records: Vec<StepRecord>,
}

impl Steps {
    async fn run<T, F>(&mut self, name: &str, op: Operation, path: String, call: F) -> Result<T>
    where
        F: Future<Output = entity_client::Result<T>>,
    {
        let started = Instant::now();
        match call.await {
            Ok(value) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(step = name, path = %path, elapsed_ms, "Scenario step passed");
                self.records.push(StepRecord {
                    name: name.to_string(),
                    method: op.method().to_string(),
                    path,
                    status: op.expected_status().as_u16(),
                    elapsed_ms,
                });
                Ok(value)
            }
            Err(err) => {
                tracing::error!(step = name, path = %path, error = %err, "Scenario step failed");
                Err(err.into())
            }
        }
    }
}

/// Run the scenario against `client`.
///
/// Returns [`ScenarioOutcome::Skipped`] without any HTTP traffic unless
/// `options.api` is REST.
pub async fn run_entity_scenario(
    client: &EntityClient,
    options: &ScenarioOptions,
) -> Result<ScenarioOutcome> {
    if !options.api.is_rest() {
        tracing::info!(api = %options.api, "API mode is not REST, skipping entity scenario");
        return Ok(ScenarioOutcome::Skipped {
            api: options.api.clone(),
        });
    }

    let started_at = Utc::now();
    let started = Instant::now();
    tracing::info!(
        base_url = %client.base_url(),
        lang = %options.lang,
        "Starting entity scenario"
    );

    let mut steps = Steps::default();
    let create_file = FilePart::create_placeholder();
    let update_file = FilePart::update_placeholder();

    let created = steps
        .run(
            "create",
            Operation::Create,
            "/entities/".to_string(),
            client.create_entity(&options.first, &create_file),
        )
        .await?;
    let id = created.id().ok_or(VerifyError::MissingId)?;
    let entity_path = format!("/entities/{id}");

    let updated = steps
        .run(
            "update",
            Operation::Update,
            entity_path.clone(),
            client.update_entity(&id, &options.second, &update_file),
        )
        .await?;

    let retrieved = steps
        .run(
            "get",
            Operation::Get,
            entity_path.clone(),
            client.get_entity(&id),
        )
        .await?;
    if retrieved != updated {
        return Err(VerifyError::RecordMismatch {
            id,
            updated: Box::new(updated),
            retrieved: Box::new(retrieved),
        });
    }

    if options.verify_file {
        match updated.file_name() {
            Some(file_name) => {
                let content = steps
                    .run(
                        "get file",
                        Operation::GetFile,
                        format!("/entities/files/{file_name}"),
                        client.get_file(file_name),
                    )
                    .await?;
                if content != update_file.content {
                    return Err(VerifyError::FileMismatch {
                        file_name: file_name.to_string(),
                        expected_len: update_file.content.len(),
                        actual_len: content.len(),
                    });
                }
            }
            None => {
                tracing::warn!(id = %id, "Update response carries no fileName, skipping file check")
            }
        }
    }

    let listed = steps
        .run(
            "list",
            Operation::List,
            "/entities".to_string(),
            client.list_entities(),
        )
        .await?;
    if listed.is_empty() {
        return Err(VerifyError::EmptyCollection);
    }

    steps
        .run(
            "delete",
            Operation::Delete,
            entity_path,
            client.delete_entity(&id),
        )
        .await?;

    if options.verify_deleted {
        let remaining = steps
            .run(
                "list after delete",
                Operation::List,
                "/entities".to_string(),
                client.list_entities(),
            )
            .await?;
        if remaining.iter().any(|entity| same_id(entity, &id)) {
            return Err(VerifyError::StillListed { id });
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(id = %id, steps = steps.records.len(), elapsed_ms, "Entity scenario passed");

    Ok(ScenarioOutcome::Completed(ScenarioReport {
        started_at,
        lang: options.lang.clone(),
        entity_id: id,
        created,
        updated,
        steps: steps.records,
        elapsed_ms,
    }))
}

// Backends may render the same id as a number in one response and a string in another.
fn same_id(entity: &Entity, id: &EntityId) -> bool {
    entity
        .id()
        .is_some_and(|other| other.to_string() == id.to_string())
}
