use base64::{Engine, engine::general_purpose::STANDARD};

/// Token accepted by HCD for username/password authentication.
pub fn username_password(username: &str, password: &str) -> String {
    format!(
        "Cassandra:{}:{}",
        STANDARD.encode(username),
        STANDARD.encode(password)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_credentials() {
        assert_eq!(
            username_password("cassandra", "cassandra"),
            "Cassandra:Y2Fzc2FuZHJh:Y2Fzc2FuZHJh"
        );
    }
}
