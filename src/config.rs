use std::fmt;

use zeroize::Zeroizing;

/// Signing settings for bearer tokens.
#[derive(Clone)]
pub struct JwtSettings {
    /// Symmetric HMAC-SHA-256 key.
    pub secret_key: Zeroizing<Vec<u8>>,
    pub issuer: String,
    pub audience: String,
    /// Token lifetime in seconds. Always > 0.
    pub expiry_seconds: u64,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish()
    }
}

/// Identity created at startup when it does not exist yet.
#[derive(Clone)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtSettings,
    /// When false, `/api/auth/register` sits behind the bearer guard.
    pub open_registration: bool,
    /// Browser origin of the front end, allowed by CORS.
    pub cors_origin: String,
    pub seed_user: Option<SeedUser>,
}

pub const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the config from an arbitrary key lookup. `load` feeds it the process environment.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup("POS_JWT_SECRET").unwrap_or_default();
    if secret.is_empty() {
        anyhow::bail!("POS_JWT_SECRET is not set. A signing key is required to issue tokens.");
    }
    if secret.len() < MIN_RECOMMENDED_SECRET_LEN {
        tracing::warn!(
            "POS_JWT_SECRET is shorter than {} bytes; use a longer random key in production",
            MIN_RECOMMENDED_SECRET_LEN
        );
    }

    let expiry_seconds = match lookup("POS_JWT_EXPIRY_SECS") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("POS_JWT_EXPIRY_SECS must be a positive integer, got '{}'", raw))?,
        None => 3600,
    };
    if expiry_seconds == 0 {
        anyhow::bail!("POS_JWT_EXPIRY_SECS must be greater than zero");
    }

    let seed_user = match (
        lookup("POS_ADMIN_USERNAME"),
        lookup("POS_ADMIN_EMAIL"),
        lookup("POS_ADMIN_PASSWORD"),
    ) {
        (Some(username), Some(email), Some(password)) => Some(SeedUser {
            username,
            email,
            password,
        }),
        (None, None, None) => None,
        _ => anyhow::bail!(
            "POS_ADMIN_USERNAME, POS_ADMIN_EMAIL and POS_ADMIN_PASSWORD must be set together"
        ),
    };

    Ok(Config {
        port: lookup("POS_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000),
        database_url: lookup("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/pointofsale".into()),
        jwt: JwtSettings {
            secret_key: Zeroizing::new(secret.into_bytes()),
            issuer: lookup("POS_JWT_ISSUER").unwrap_or_else(|| "PointOfSale.WebAPI".into()),
            audience: lookup("POS_JWT_AUDIENCE").unwrap_or_else(|| "PointOfSale.View".into()),
            expiry_seconds,
        },
        open_registration: lookup("POS_OPEN_REGISTRATION")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
        cors_origin: lookup("POS_CORS_ORIGIN")
            .unwrap_or_else(|| "http://localhost:4200".into()),
        seed_user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("POS_JWT_SECRET"));
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup_from(&[("POS_JWT_SECRET", "a-very-long-secret-key-for-tests-000")])).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.jwt.expiry_seconds, 3600);
        assert_eq!(cfg.jwt.issuer, "PointOfSale.WebAPI");
        assert!(!cfg.open_registration);
        assert!(cfg.seed_user.is_none());
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let err = from_lookup(lookup_from(&[
            ("POS_JWT_SECRET", "secret"),
            ("POS_JWT_EXPIRY_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_partial_seed_user_rejected() {
        let result = from_lookup(lookup_from(&[
            ("POS_JWT_SECRET", "secret"),
            ("POS_ADMIN_USERNAME", "admin"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = from_lookup(lookup_from(&[
            ("POS_JWT_SECRET", "super-secret-signing-key"),
            ("POS_ADMIN_USERNAME", "admin"),
            ("POS_ADMIN_EMAIL", "admin@example.com"),
            ("POS_ADMIN_PASSWORD", "Hunter2!"),
            ("POS_OPEN_REGISTRATION", "true"),
        ]))
        .unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("super-secret-signing-key"));
        assert!(!printed.contains("Hunter2!"));
        assert!(cfg.open_registration);
    }
}
