//! Wire types for the vote/subscription service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog identifier of a grant.
///
/// Serialized as a JSON number when numeric, as a string otherwise. A string
/// holding a canonical decimal number is the same grant as that number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawGrantId")]
pub enum GrantId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGrantId {
    Number(u64),
    Text(String),
}

impl From<RawGrantId> for GrantId {
    fn from(raw: RawGrantId) -> Self {
        match raw {
            RawGrantId::Number(n) => Self::Number(n),
            RawGrantId::Text(s) => Self::from(s),
        }
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for GrantId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for GrantId {
    fn from(id: &str) -> Self {
        match canonical_number(id) {
            Some(n) => Self::Number(n),
            None => Self::Text(id.to_string()),
        }
    }
}

impl From<String> for GrantId {
    fn from(id: String) -> Self {
        match canonical_number(&id) {
            Some(n) => Self::Number(n),
            None => Self::Text(id),
        }
    }
}

/// `"42"` is a number, `"042"` and `"+42"` stay text.
fn canonical_number(id: &str) -> Option<u64> {
    id.parse::<u64>().ok().filter(|n| n.to_string() == id)
}

/// A recorded vote direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Positive,
    Negative,
}

impl VoteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for VoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from GET /vote/{grant}/{researcher}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub action: VoteAction,
}

/// Body of POST /vote.
#[derive(Debug, Clone, Serialize)]
pub struct VoteRequest<'a> {
    pub grant_id: &'a GrantId,
    pub researcher_id: &'a str,
    pub action: VoteAction,
}

/// Response from GET /subscriptions/{researcher}.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub subscribed: bool,

    /// Masked address the subscription was made with.
    #[serde(default)]
    pub email_hint: Option<String>,
}

/// Body of POST /subscriptions.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest<'a> {
    pub researcher_name: &'a str,
    pub email: &'a str,
}

/// Body of POST /researcher-requests: ask for a researcher to be added to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearcherRequest {
    pub openalex_id: String,
    pub display_name: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub works_count: u64,
    #[serde(default)]
    pub requester_email: Option<String>,
}

/// Response from POST /researcher-requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearcherRequestResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Interpreted outcome of a researcher request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Submitted,
    /// The researcher was already requested; carries the service's message.
    Existing(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_id_serialization() {
        assert_eq!(serde_json::to_string(&GrantId::from(42u64)).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&GrantId::from("ERC-2024-7")).unwrap(),
            "\"ERC-2024-7\""
        );
        let parsed: GrantId = serde_json::from_str("17").unwrap();
        assert_eq!(parsed, GrantId::Number(17));
        assert_eq!(GrantId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_numeric_string_is_same_grant() {
        assert_eq!(GrantId::from("42"), GrantId::from(42u64));
        assert_eq!(GrantId::from(String::from("42")), GrantId::Number(42));
        assert_eq!(GrantId::from("042"), GrantId::Text("042".into()));
        assert_eq!(GrantId::from("+42"), GrantId::Text("+42".into()));
        assert_eq!(GrantId::from(""), GrantId::Text(String::new()));

        let parsed: GrantId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(parsed, GrantId::Number(42));
        let parsed: GrantId = serde_json::from_str("\"ERC-1\"").unwrap();
        assert_eq!(parsed, GrantId::Text("ERC-1".into()));
    }

    #[test]
    fn test_vote_request_body() {
        let grant = GrantId::from(42u64);
        let body = VoteRequest {
            grant_id: &grant,
            researcher_id: "A. Researcher",
            action: VoteAction::Positive,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "grant_id": 42,
                "researcher_id": "A. Researcher",
                "action": "positive"
            })
        );
    }

    #[test]
    fn test_subscription_status_without_hint() {
        let status: SubscriptionStatus = serde_json::from_str(r#"{"subscribed": false}"#).unwrap();
        assert_eq!(status, SubscriptionStatus::default());
    }
}
