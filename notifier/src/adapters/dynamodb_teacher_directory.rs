use crate::domain::recipient_resolver::{Recipient, RecipientResolver};
use crate::domain::records::{RawRow, Record, Teacher};
use anyhow::Context;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

/// Teachers stored in a DynamoDB table keyed by `section`.
///
/// Items carry the same attributes as the teacher CSV columns
/// (`section`, `teacher_name`, `emailid`) and go through the same validation.
#[derive(Debug, Clone)]
pub struct DynamoDbTeacherDirectory {
    client: Client,
    table_name: String,
}

impl DynamoDbTeacherDirectory {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    pub async fn from_env(table_name: String, endpoint: Option<&str>) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self::new(Client::new(&sdk_config), table_name)
    }
}

fn flatten(item: &HashMap<String, AttributeValue>) -> RawRow {
    item.iter()
        .filter_map(|(k, v)| match v {
            AttributeValue::S(s) => Some((k.clone(), s.clone())),
            AttributeValue::N(n) => Some((k.clone(), n.clone())),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl RecipientResolver for DynamoDbTeacherDirectory {
    #[tracing::instrument(name = "Looking up teacher in DynamoDB", skip(self))]
    async fn resolve(&self, section: &str) -> Result<Option<Recipient>, anyhow::Error> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("section", AttributeValue::S(section.to_lowercase()))
            .send()
            .await
            .with_context(|| format!("Failed to read teacher for section {}", section))?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let teacher = Teacher::validate(&flatten(&item), 0)
            .map_err(|e| anyhow::anyhow!("Stored teacher is invalid: {}", e.violations.join(", ")))?;

        Ok(Some(Recipient {
            name: teacher.name,
            email: teacher.email,
        }))
    }
}
