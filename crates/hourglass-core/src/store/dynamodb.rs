//! DynamoDB state store
//!
//! The singleton item is keyed by `pk` and carries:
//! - `state`: the full `GameState` as JSON
//! - `version`: numeric copy of `GameState::version`, the CAS condition
//! - `updated_at`: RFC 3339 timestamp of the last write
//!
//! Every write is a single conditional `PutItem`, including reset: the
//! record is overwritten in place and never passes through a deleted state.

use super::{check_successor, Consistency, StateStore, GAME_STATE_ID};
use crate::error::StoreError;
use crate::types::GameState;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

/// Default table name
pub const DEFAULT_TABLE_NAME: &str = "escape-room-001";

/// How a reset writes the new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetWrite {
    /// No record yet
    Create,
    /// Overwrite the record while it is still at `previous`
    Replace { previous: u64 },
}

/// Decide the reset write and number `fresh` after the record it replaces
fn plan_reset(previous: Option<u64>, fresh: &mut GameState) -> ResetWrite {
    match previous {
        Some(previous) => {
            fresh.version = previous + 1;
            ResetWrite::Replace { previous }
        }
        None => ResetWrite::Create,
    }
}

/// DynamoDB-backed store
#[derive(Debug, Clone)]
pub struct DynamoStateStore {
    client: Client,
    table_name: String,
}

impl DynamoStateStore {
    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build a client from the ambient AWS configuration
    ///
    /// `DYNAMODB_ENDPOINT` overrides the endpoint (local DynamoDB).
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(endpoint) = std::env::var("DYNAMODB_ENDPOINT") {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let store = Self::new(Client::new(&config), table_name);
        tracing::info!(table_name = %store.table_name, "DynamoDB state store enabled");
        store
    }

    /// Table this store writes to
    #[inline]
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key() -> AttributeValue {
        AttributeValue::S(GAME_STATE_ID.to_string())
    }

    fn encode(state: &GameState) -> Result<HashMap<String, AttributeValue>, StoreError> {
        let mut item = HashMap::new();
        item.insert("pk".to_string(), Self::key());
        item.insert(
            "state".to_string(),
            AttributeValue::S(serde_json::to_string(state)?),
        );
        item.insert(
            "version".to_string(),
            AttributeValue::N(state.version.to_string()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(state.updated_at.to_rfc3339()),
        );
        Ok(item)
    }

    fn decode(item: &HashMap<String, AttributeValue>) -> Result<GameState, StoreError> {
        let body = item
            .get("state")
            .and_then(|value| value.as_s().ok())
            .ok_or_else(|| StoreError::Backend("item has no state attribute".to_string()))?;
        Ok(serde_json::from_str(body)?)
    }

    fn stored_version(item: &HashMap<String, AttributeValue>) -> Option<u64> {
        item.get("version")
            .and_then(|value| value.as_n().ok())
            .and_then(|n| n.parse().ok())
    }

    async fn put_new(&self, state: &GameState) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::encode(state)?))
            .condition_expression("attribute_not_exists(pk)")
            .send()
            .await
            .map_err(|error| {
                let error = error.into_service_error();
                if error.is_conditional_check_failed_exception() {
                    StoreError::AlreadyExists
                } else {
                    StoreError::Backend(error.to_string())
                }
            })?;
        Ok(())
    }

    async fn put_replacing(
        &self,
        expected_version: u64,
        state: &GameState,
    ) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::encode(state)?))
            .condition_expression("attribute_exists(pk) AND #v = :expected")
            .expression_attribute_names("#v", "version")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version.to_string()),
            )
            .send()
            .await
            .map_err(|error| {
                let error = error.into_service_error();
                if error.is_conditional_check_failed_exception() {
                    StoreError::VersionConflict {
                        expected: expected_version,
                        actual: None,
                    }
                } else {
                    StoreError::Backend(error.to_string())
                }
            })?;
        Ok(())
    }

    async fn load_item(
        &self,
        consistency: Consistency,
    ) -> Result<Option<HashMap<String, AttributeValue>>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", Self::key())
            .consistent_read(consistency == Consistency::Strong)
            .send()
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))?;
        Ok(output.item)
    }
}

#[async_trait]
impl StateStore for DynamoStateStore {
    async fn load(&self, consistency: Consistency) -> Result<GameState, StoreError> {
        match self.load_item(consistency).await? {
            Some(item) => Self::decode(&item),
            None => Err(StoreError::NotFound),
        }
    }

    async fn create_if_absent(&self, state: GameState) -> Result<GameState, StoreError> {
        self.put_new(&state).await?;
        Ok(state)
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: GameState,
    ) -> Result<GameState, StoreError> {
        check_successor(expected_version, &next)?;
        self.put_replacing(expected_version, &next).await?;
        Ok(next)
    }

    async fn recreate(&self, mut fresh: GameState) -> Result<GameState, StoreError> {
        let previous = match self.load_item(Consistency::Strong).await? {
            Some(item) => Some(Self::stored_version(&item).ok_or_else(|| {
                StoreError::Backend("item has no numeric version attribute".to_string())
            })?),
            None => None,
        };

        match plan_reset(previous, &mut fresh) {
            ResetWrite::Replace { previous } => {
                self.put_replacing(previous, &fresh).await?;
                tracing::info!(previous_version = previous, "replaced game state");
            }
            ResetWrite::Create => {
                tracing::info!("game state not found, creating");
                self.put_new(&fresh).await.map_err(|error| match error {
                    // Someone else created the record after our read.
                    StoreError::AlreadyExists => StoreError::VersionConflict {
                        expected: fresh.version,
                        actual: None,
                    },
                    other => other,
                })?;
            }
        }
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        "dynamodb"
    }
}
