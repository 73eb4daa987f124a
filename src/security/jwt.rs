use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::config::{AuthConfig, MIN_JWT_SECRET_LEN};
use crate::core::shared::enums::Role;

const LEEWAY_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub role: Role,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        role: Role,
        issuer: &str,
        audience: &str,
        expiry: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role,
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user ID in claims: {e}"))
    }
}

/// Issues and verifies the HS256 bearer tokens handed out at login.
pub struct JwtManager {
    issuer: String,
    audience: String,
    expiry: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        if config.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} characters"
            ));
        }
        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            expiry: Duration::hours(config.token_expiry_hours),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        })
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String> {
        let claims = Claims::new(
            user_id,
            role,
            &self.issuer,
            &self.audience,
            Utc::now() + self.expiry,
        );
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode token: {e}"))
    }

    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = LEEWAY_SECONDS;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.expiry.num_seconds()
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
