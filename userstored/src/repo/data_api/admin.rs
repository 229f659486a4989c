//! Keyspace administration.
//!
//! HCD creates keyspaces through the Data API itself, Astra DB only accepts
//! keyspace changes through its DevOps API.

use std::time::Duration;

use log::{debug, info, trace};
use serde_json::{Value, json};

use super::DataApiClient;
use crate::{params, repo::Error};

const ASTRA_DEVOPS_API: &str = "https://api.astra.datastax.com/v2";

const ACTIVE_STATUS: &str = "ACTIVE";

/// Statuses a database does not recover from on its own
const FAILED_STATUSES: &[&str] = &["ERROR", "TERMINATING", "TERMINATED"];

/// Creates `keyspace` with a single-replica simple strategy.
pub async fn create_keyspace(client: &DataApiClient, keyspace: &str) -> Result<(), Error> {
    client
        .command(
            &[],
            json!({
                "createKeyspace": {
                    "name": keyspace,
                    "options": {
                        "replication": {
                            "class": "SimpleStrategy",
                            "replication_factor": 1
                        }
                    }
                }
            }),
        )
        .await?;

    info!("keyspace `{}` created", keyspace);
    Ok(())
}

pub async fn list_keyspaces(client: &DataApiClient) -> Result<Vec<String>, Error> {
    let body = client.command(&[], json!({ "findKeyspaces": {} })).await?;
    string_list(&body, "keyspaces")
}

pub async fn list_collections(
    client: &DataApiClient,
    keyspace: &str,
) -> Result<Vec<String>, Error> {
    let body = client
        .command(&[keyspace], json!({ "findCollections": {} }))
        .await?;
    string_list(&body, "collections")
}

/// Reads the list of names stored under `status.<field>`.
fn string_list(body: &Value, field: &str) -> Result<Vec<String>, Error> {
    let names = body
        .get("status")
        .and_then(|status| status.get(field))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::UnexpectedResponse(format!("missing `status.{field}`")))?;

    Ok(names
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect())
}

/// Client for the Astra DevOps API scoped to a single database.
pub struct AstraAdmin {
    http: reqwest::Client,
    api_base: String,
    db_id: String,
    token: String,
    poll_attempts: usize,
    poll_interval: Duration,
}

impl AstraAdmin {
    pub fn new(db_id: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: ASTRA_DEVOPS_API.to_owned(),
            db_id: db_id.to_owned(),
            token: token.to_owned(),
            poll_attempts: params::ASTRA_ACTIVE_POLL_ATTEMPTS,
            poll_interval: params::ASTRA_ACTIVE_POLL_INTERVAL,
        }
    }

    /// Points the client to another DevOps API root and polling schedule.
    #[cfg(test)]
    pub(super) fn with_api(mut self, api_base: &str, attempts: usize, interval: Duration) -> Self {
        self.api_base = api_base.to_owned();
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    fn database_url(&self) -> String {
        format!("{}/databases/{}", self.api_base, self.db_id)
    }

    /// Requests the creation of `keyspace`, a `409 Conflict` answer is
    /// reported as [`Error::AlreadyExists`].
    ///
    /// Keyspaces are created asynchronously, see [`Self::wait_until_active`].
    pub async fn create_keyspace(&self, keyspace: &str) -> Result<(), Error> {
        let url = format!("{}/keyspaces/{}", self.database_url(), keyspace);
        debug!("requesting keyspace `{}` on astra database {}", keyspace, self.db_id);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(Error::AlreadyExists(keyspace.to_owned()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::UnexpectedResponse(format!(
                "keyspace creation answered {status}: {text}"
            )));
        }

        info!("keyspace `{}` requested", keyspace);
        Ok(())
    }

    /// Polls the database until it reports `ACTIVE`.
    ///
    /// The database goes through maintenance after a keyspace creation and
    /// refuses Data API commands meanwhile.
    pub async fn wait_until_active(&self) -> Result<(), Error> {
        let mut status = String::new();
        let mut attempts = 0;

        while attempts < self.poll_attempts {
            if attempts > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            attempts += 1;

            status = self.database_status().await?;
            if status == ACTIVE_STATUS {
                debug!("astra database {} active", self.db_id);
                return Ok(());
            }
            if FAILED_STATUSES.contains(&status.as_str()) {
                break;
            }

            trace!(
                "astra database {} is `{}` ({}/{})",
                self.db_id, status, attempts, self.poll_attempts
            );
        }

        Err(Error::NotActive {
            db_id: self.db_id.clone(),
            status,
            attempts,
        })
    }

    async fn database_status(&self) -> Result<String, Error> {
        let body: Value = self
            .http
            .get(self.database_url())
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get("status")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::UnexpectedResponse("missing database `status`".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_from_status() {
        let body = json!({ "status": { "collections": ["users", "orders", 3] } });
        assert_eq!(string_list(&body, "collections").unwrap(), vec!["users", "orders"]);

        assert!(matches!(
            string_list(&json!({ "status": {} }), "keyspaces"),
            Err(Error::UnexpectedResponse(_))
        ));
    }
}
