//! Bearer token issuance and validation (HS256).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::JwtSettings;
use crate::models::auth::Claims;
use crate::models::identity::Identity;

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl TokenIssuer {
    /// Fails when the settings cannot sign anything; callers treat this as fatal at startup.
    pub fn new(settings: &JwtSettings) -> anyhow::Result<Self> {
        if settings.secret_key.is_empty() {
            anyhow::bail!("token signing key is empty");
        }
        if settings.expiry_seconds == 0 {
            anyhow::bail!("token expiry must be greater than zero seconds");
        }
        let expiry_seconds = i64::try_from(settings.expiry_seconds)
            .map_err(|_| anyhow::anyhow!("token expiry of {}s is out of range", settings.expiry_seconds))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(&settings.secret_key),
            decoding: DecodingKey::from_secret(&settings.secret_key),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            expiry: Duration::seconds(expiry_seconds),
        })
    }

    pub fn issue(&self, identity: &Identity) -> jsonwebtoken::errors::Result<String> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> jsonwebtoken::errors::Result<String> {
        let claims = Claims {
            sub: identity.username.clone(),
            name: identity.username.clone(),
            email: identity.email.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verify signature, expiry, issuer and audience.
    pub fn validate(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
