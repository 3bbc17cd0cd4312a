//! Records served by the API. These mirror the rows of the backing store one to one.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub is_male: bool,
    pub year_of_birth: i32,
    pub user_id: Uuid,
    pub member_type_id: MemberTypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberTypeId {
    Basic,
    Business,
}

impl fmt::Display for MemberTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberTypeId::Basic => f.write_str("BASIC"),
            MemberTypeId::Business => f.write_str("BUSINESS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberType {
    pub id: MemberTypeId,
    pub discount: f64,
    pub posts_limit_per_month: i32,
}

/// `subscriber_id` follows the posts of `author_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscriber_id: Uuid,
    pub author_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_type_ids_use_wire_names() {
        let json = serde_json::to_string(&MemberTypeId::Business).unwrap();
        assert_eq!(json, r#""BUSINESS""#);
        assert_eq!(MemberTypeId::Basic.to_string(), "BASIC");
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = Profile {
            id: Uuid::nil(),
            is_male: true,
            year_of_birth: 1990,
            user_id: Uuid::nil(),
            member_type_id: MemberTypeId::Basic,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["yearOfBirth"], 1990);
        assert_eq!(value["memberTypeId"], "BASIC");
    }
}
