//   Copyright 2018 Chorus One, Inc.
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.

//! A [`Store`] implementation backed by DynamoDB.
//!
//! Lock items are composed of the attributes described in the record schema: a partition
//! key, `owner`, `guid`, and (Fail-Open only) `fencingToken`, `leaseDurationMs`,
//! `lockAcquiredTimeUnixMs`. The `expiresAt` attribute, when present, is a TTL hint for
//! DynamoDB's own background reaper and is never read back by this crate.
//!
//! [`Condition`] values are lowered into DynamoDB condition expressions here; every other
//! component in this crate is written purely against the [`Store`] trait and knows
//! nothing about DynamoDB's attribute-value or expression syntax.

use std::collections::HashMap;

use rusoto_core::RusotoError;
use rusoto_dynamodb::{
    AttributeValue as RusotoAttributeValue, DeleteItemError, DeleteItemInput, DynamoDb,
    DynamoDbClient, GetItemInput, PutItemError, PutItemInput,
};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::AttributeNames;
use crate::store::{AttributeValue, Condition, Item, Store};

#[cfg(test)]
mod tests;

/// A `Store` backed by a single DynamoDB table.
pub struct DynamoDbStore {
    client: DynamoDbClient,
    table_name: String,
    names: AttributeNames,
}

impl DynamoDbStore {
    /// Construct a new adapter for `table_name`, using `names` for attribute naming.
    pub fn new(client: DynamoDbClient, table_name: impl Into<String>, names: AttributeNames) -> Self {
        DynamoDbStore {
            client,
            table_name: table_name.into(),
            names,
        }
    }

    fn key_map(&self, key: &str) -> HashMap<String, RusotoAttributeValue> {
        hashmap! {
            self.names.partition_key.clone() => RusotoAttributeValue {
                s: Some(key.to_string()),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn put(&self, item: Item, condition: Condition) -> Result<(), StoreError> {
        let key = item
            .get(&self.names.partition_key)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| StoreError::Backend("item is missing its partition key attribute".to_string()))?
            .to_string();

        let (condition_expression, expression_attribute_names, expression_attribute_values) =
            render_condition(&condition, &self.names);

        let input = PutItemInput {
            table_name: self.table_name.clone(),
            item: to_rusoto_item(item),
            condition_expression: Some(condition_expression),
            expression_attribute_names: Some(expression_attribute_names),
            expression_attribute_values: Some(expression_attribute_values),
            ..Default::default()
        };

        match self.client.put_item(input).await {
            Ok(_) => {
                info!("lock item '{}' written in table '{}'", key, self.table_name);
                Ok(())
            }
            Err(RusotoError::Service(PutItemError::ConditionalCheckFailed(_))) => {
                warn!("lock item '{}' condition check failed", key);
                Err(StoreError::ConditionFailed)
            }
            Err(err) => {
                error!("put_item failed for '{}': {}", key, err);
                Err(StoreError::Backend(err.to_string()))
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let input = GetItemInput {
            table_name: self.table_name.clone(),
            key: self.key_map(key),
            consistent_read: Some(true),
            ..Default::default()
        };

        match self.client.get_item(input).await {
            Ok(output) => Ok(output.item.map(from_rusoto_item)),
            Err(err) => {
                error!("get_item failed for '{}': {}", key, err);
                Err(StoreError::Backend(err.to_string()))
            }
        }
    }

    async fn delete(&self, key: &str, condition: Condition) -> Result<(), StoreError> {
        let (condition_expression, expression_attribute_names, expression_attribute_values) =
            render_condition(&condition, &self.names);

        let input = DeleteItemInput {
            table_name: self.table_name.clone(),
            key: self.key_map(key),
            condition_expression: Some(condition_expression),
            expression_attribute_names: Some(expression_attribute_names),
            expression_attribute_values: Some(expression_attribute_values),
            ..Default::default()
        };

        match self.client.delete_item(input).await {
            Ok(_) => {
                info!("lock item '{}' deleted from table '{}'", key, self.table_name);
                Ok(())
            }
            Err(RusotoError::Service(DeleteItemError::ConditionalCheckFailed(_))) => {
                warn!("lock item '{}' delete condition check failed", key);
                Err(StoreError::ConditionFailed)
            }
            Err(err) => {
                error!("delete_item failed for '{}': {}", key, err);
                Err(StoreError::Backend(err.to_string()))
            }
        }
    }
}

/// Lower a [`Condition`] into a DynamoDB condition expression plus its placeholder maps.
///
/// DynamoDB rejects a request whose `ExpressionAttributeNames` contains a key the
/// expression never references, so the names map is built alongside the expression rather
/// than up front: only `#pk`/`#guid`/`#token` actually used by the rendered branches appear.
fn render_condition(
    condition: &Condition,
    names: &AttributeNames,
) -> (
    String,
    HashMap<String, String>,
    HashMap<String, RusotoAttributeValue>,
) {
    let mut attribute_names = HashMap::new();
    let mut attribute_values = HashMap::new();
    let expression = render_condition_expr(condition, names, &mut attribute_names, &mut attribute_values);

    (expression, attribute_names, attribute_values)
}

fn render_condition_expr(
    condition: &Condition,
    names: &AttributeNames,
    attribute_names: &mut HashMap<String, String>,
    values: &mut HashMap<String, RusotoAttributeValue>,
) -> String {
    match condition {
        Condition::NotExists => {
            attribute_names.insert("#pk".to_string(), names.partition_key.clone());
            "attribute_not_exists(#pk)".to_string()
        }
        Condition::GuidEquals(guid) => {
            attribute_names.insert("#pk".to_string(), names.partition_key.clone());
            attribute_names.insert("#guid".to_string(), names.guid.clone());
            let placeholder = format!(":guid{}", values.len());
            values.insert(
                placeholder.clone(),
                RusotoAttributeValue {
                    s: Some(guid.clone()),
                    ..Default::default()
                },
            );
            format!("attribute_exists(#pk) AND #guid = {placeholder}")
        }
        Condition::GuidAndTokenEquals(guid, token) => {
            attribute_names.insert("#pk".to_string(), names.partition_key.clone());
            attribute_names.insert("#guid".to_string(), names.guid.clone());
            attribute_names.insert("#token".to_string(), names.fencing_token.clone());
            let guid_placeholder = format!(":guid{}", values.len());
            values.insert(
                guid_placeholder.clone(),
                RusotoAttributeValue {
                    s: Some(guid.clone()),
                    ..Default::default()
                },
            );
            let token_placeholder = format!(":token{}", values.len());
            values.insert(
                token_placeholder.clone(),
                RusotoAttributeValue {
                    n: Some(token.to_string()),
                    ..Default::default()
                },
            );
            format!(
                "attribute_exists(#pk) AND #guid = {guid_placeholder} AND #token = {token_placeholder}"
            )
        }
        Condition::Or(a, b) => {
            let left = render_condition_expr(a, names, attribute_names, values);
            let right = render_condition_expr(b, names, attribute_names, values);
            format!("({left}) OR ({right})")
        }
    }
}

fn to_rusoto_item(item: Item) -> HashMap<String, RusotoAttributeValue> {
    item.into_iter()
        .map(|(k, v)| (k, to_rusoto_value(v)))
        .collect()
}

fn to_rusoto_value(value: AttributeValue) -> RusotoAttributeValue {
    match value {
        AttributeValue::S(s) => RusotoAttributeValue {
            s: Some(s),
            ..Default::default()
        },
        AttributeValue::N(n) => RusotoAttributeValue {
            n: Some(n),
            ..Default::default()
        },
    }
}

fn from_rusoto_item(item: HashMap<String, RusotoAttributeValue>) -> Item {
    item.into_iter()
        .filter_map(|(k, v)| from_rusoto_value(v).map(|value| (k, value)))
        .collect()
}

fn from_rusoto_value(value: RusotoAttributeValue) -> Option<AttributeValue> {
    if let Some(s) = value.s {
        Some(AttributeValue::S(s))
    } else {
        value.n.map(AttributeValue::N)
    }
}
