use once_cell::sync::Lazy;
use regex::Regex;

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

static SERVICE_ACCOUNT_USERNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^system:serviceaccount:([-a-z0-9]+):(.+)$").expect("regex must compile")
});

/// The identity an admission request was made by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requester {
    ServiceAccount { namespace: String, name: String },
    User(String),
}

// === impl Requester ===

impl Requester {
    /// Classifies an authenticated username. Service account usernames have the
    /// form `system:serviceaccount:<namespace>:<name>`; anything else is a user.
    pub fn from_username(username: &str) -> Self {
        match SERVICE_ACCOUNT_USERNAME.captures(username) {
            Some(caps) => Self::ServiceAccount {
                namespace: caps[1].to_string(),
                name: caps[2].to_string(),
            },
            None => Self::User(username.to_string()),
        }
    }
}

/// Formats the username the API server assigns to a service account.
pub fn service_account_username(namespace: &str, name: &str) -> String {
    format!("{SERVICE_ACCOUNT_PREFIX}{namespace}:{name}")
}
