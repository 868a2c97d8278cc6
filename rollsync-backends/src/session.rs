use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollsync::SessionProvider;

/// Credential handed over by the host application.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl StaticSession {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some() && self.expires_at.map_or(true, |exp| now < exp)
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn has_valid_session(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_blank_token_is_no_session() {
        assert!(!StaticSession::new(Some("  ".into())).is_valid_at(Utc::now()));
        assert!(!StaticSession::default().is_valid_at(Utc::now()));
    }

    #[test]
    fn test_expired_token_is_no_session() {
        let now = Utc::now();
        let session = StaticSession::new(Some("jwt".into())).expiring_at(now - Duration::minutes(1));
        assert!(!session.is_valid_at(now));
        assert!(StaticSession::new(Some("jwt".into())).is_valid_at(now));
    }
}
