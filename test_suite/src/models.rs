#![cfg(test)]

use chrono::{NaiveDate, NaiveDateTime};
use django_queryset::{ForeignKey, Model, ObjectType, ServerClient};
use log::debug;
use serde::{Deserialize, Serialize};
use wiremock::MockServer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[django(endpoint = "thing")]
pub struct Thing {
    #[django(pk)]
    pub id: i64,
    pub name: Option<String>,
    pub number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
pub struct ThingChild {
    pub id: i64,
    pub name: String,
    pub parent_id: i64,
    #[serde(default, skip_serializing)]
    #[django(foreign_key = "parent_id")]
    pub parent: ForeignKey<Thing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[django(endpoint = "question")]
pub struct Question {
    #[django(pk)]
    pub id: i64,
    pub text: String,
    #[django(field_type = "EmailField")]
    pub author_email: String,
    pub published: Option<NaiveDateTime>,
    pub closes: NaiveDate,
    pub tags: Vec<String>,
    pub extra: serde_json::Value,
    #[django(read_only)]
    pub score: f64,
    pub poll_id: Option<i64>,
    #[serde(default, skip_serializing)]
    #[django(foreign_key = "poll_id")]
    pub poll: ForeignKey<Thing>,
    #[serde(skip)]
    #[django(exclude)]
    pub scratch: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ObjectType)]
#[django(endpoint = "point-pair")]
pub struct PointPair {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Clone, Serialize, ObjectType)]
pub struct UserSettings {
    pub theme: String,
}

pub fn thing(id: i64, name: &str, number: i64) -> Thing {
    Thing {
        id,
        name: Some(name.to_string()),
        number: Some(number),
    }
}

pub async fn server_and_client() -> (MockServer, ServerClient) {
    let server = MockServer::start().await;
    debug!("Mock server listening at {}", server.uri());
    let client = ServerClient::new(&server.uri()).expect("client for mock server");
    (server, client)
}
