use crate::config::AuthConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fs;

/// Claims carried by identity provider ID tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Caller identity established from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

/// Verifies bearer ID tokens issued by the external identity provider.
#[derive(Clone)]
pub struct IdTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdTokenVerifier {
    /// Build a verifier from an RS256 public key file or, failing that, an
    /// HS256 shared secret.
    pub fn from_config(config: &AuthConfig) -> Result<Self, anyhow::Error> {
        let (decoding_key, algorithm) = match (&config.public_key_path, &config.jwt_secret) {
            (Some(path), _) => {
                let public_key_pem = fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read public key from {}: {}", path, e)
                })?;
                let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;
                tracing::info!("ID token verifier initialized with RS256 public key");
                (key, Algorithm::RS256)
            }
            (None, Some(secret)) => {
                tracing::info!("ID token verifier initialized with HS256 secret");
                (
                    DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                    Algorithm::HS256,
                )
            }
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "No identity verification key configured: set AUTH_JWT_PUBLIC_KEY_PATH or AUTH_JWT_SECRET"
                ));
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Validate signature, expiry and the configured issuer/audience.
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, jsonwebtoken::errors::Error> {
        let token_data = decode::<IdTokenClaims>(token, &self.decoding_key, &self.validation)?;

        Ok(VerifiedIdentity {
            uid: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}
