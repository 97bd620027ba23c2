use secrecy::SecretString;
use time::OffsetDateTime;

/// Tokens are refreshed this long before they actually expire.
pub const EXPIRY_BUFFER: time::Duration = time::Duration::minutes(5);

/// A token as held by the credential cache. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token_type: String,
    pub value: SecretString,
    pub issued_at: OffsetDateTime,
    /// `None` means the token never expires.
    pub expires_at: Option<OffsetDateTime>,
    pub scopes: Vec<String>,
}

impl CachedToken {
    /// Valid while `now < expires_at - 5 min`; always valid without an expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_none_or(|expires_at| now < expires_at - EXPIRY_BUFFER)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn token(expires_in: Option<time::Duration>, now: OffsetDateTime) -> CachedToken {
        CachedToken {
            token_type: "Bearer".to_owned(),
            value: SecretString::from("t".to_owned()),
            issued_at: now,
            expires_at: expires_in.map(|d| now + d),
            scopes: vec!["read".to_owned()],
        }
    }

    #[test]
    fn expiring_within_buffer_is_invalid() {
        let now = OffsetDateTime::now_utc();
        assert!(!token(Some(time::Duration::minutes(4)), now).is_valid_at(now));
    }

    #[test]
    fn expiring_beyond_buffer_is_valid() {
        let now = OffsetDateTime::now_utc();
        assert!(token(Some(time::Duration::minutes(10)), now).is_valid_at(now));
    }

    #[test]
    fn exactly_at_buffer_edge_is_invalid() {
        let now = OffsetDateTime::now_utc();
        assert!(!token(Some(EXPIRY_BUFFER), now).is_valid_at(now));
    }

    #[test]
    fn no_expiry_is_always_valid() {
        let now = OffsetDateTime::now_utc();
        let t = token(None, now);
        assert!(t.is_valid_at(now + time::Duration::days(3650)));
        assert!(t.is_valid());
    }

    #[test]
    fn debug_redacts_value() {
        let now = OffsetDateTime::now_utc();
        let mut t = token(None, now);
        t.value = SecretString::from("super-secret-token".to_owned());
        assert!(!format!("{t:?}").contains("super-secret-token"));
        assert_eq!(t.value.expose_secret(), "super-secret-token");
    }
}
