//! JWT signing and verification using HS512 (HMAC-SHA-512).
//!
//! Claim names follow the wire format already consumed by existing clients:
//! `nameid`, `unique_name`, `role` and `Permission`. Multi-valued claims are
//! written as arrays; a lone string is accepted when reading.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::application::error::{Result, ToInternal};
use crate::application::ports::outbound::{
    TokenSigner, TokenValidation, TokenVerifier, VerifiedClaims,
};
use crate::domain::claims::ClaimSet;
use crate::domain::key::SigningKey;

/// The only algorithm accepted or produced.
pub const ALGORITHM: Algorithm = Algorithm::HS512;

/// HS512 token codec.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    /// Create a new [`JwtSigner`].
    pub fn new(key: SigningKey) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the injected clock, see `validate`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    fn verify(&self, token: &str) -> Option<VerifiedClaims> {
        let data = match decode::<JwtClaims>(
            token,
            &self.decoding_key,
            &self.validation,
        ) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(error = %err, "token rejected");
                return None;
            },
        };

        if data.header.alg != ALGORITHM {
            tracing::debug!(alg = ?data.header.alg, "token algorithm rejected");
            return None;
        }

        let claims = data.claims;
        Some(VerifiedClaims {
            subject: claims.subject,
            name: claims.name,
            roles: claims.roles,
            permissions: claims.permissions,
            issued_at: DateTime::from_timestamp(claims.iat, 0)?,
            expires_at: DateTime::from_timestamp(claims.exp, 0)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    #[serde(rename = "nameid", default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(
        rename = "unique_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    name: Option<String>,
    #[serde(rename = "role", default, deserialize_with = "one_or_many")]
    roles: Vec<String>,
    #[serde(rename = "Permission", default, deserialize_with = "one_or_many")]
    permissions: Vec<String>,
    #[serde(default)]
    nbf: i64,
    exp: i64,
    iat: i64,
}

fn one_or_many<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl TokenSigner for JwtSigner {
    fn sign(
        &self,
        claims: &ClaimSet,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let header = Header::new(ALGORITHM);
        let claims = JwtClaims {
            subject: Some(claims.subject().to_string()),
            name: Some(claims.name().to_owned()),
            roles: claims
                .roles()
                .iter()
                .map(|role| role.as_str().to_owned())
                .collect(),
            permissions: claims
                .permissions()
                .iter()
                .map(|permission| permission.as_str().to_owned())
                .collect(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };

        encode(&header, &claims, &self.encoding_key).catch()
    }
}

impl TokenVerifier for JwtSigner {
    fn validate_ignoring_expiry(&self, token: &str) -> TokenValidation {
        match self.verify(token) {
            Some(claims) => TokenValidation::Valid(claims),
            None => TokenValidation::Invalid,
        }
    }

    fn validate(&self, token: &str, now: DateTime<Utc>) -> TokenValidation {
        match self.verify(token) {
            Some(claims) if now < claims.expires_at => {
                TokenValidation::Valid(claims)
            },
            Some(_) => {
                tracing::debug!("token expired");
                TokenValidation::Invalid
            },
            None => TokenValidation::Invalid,
        }
    }
}
