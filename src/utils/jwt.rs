use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::utils::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, stringified
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies bearer tokens. The expiry is configured as a
/// human-friendly duration string ("24h", "30m", "7d").
pub struct JwtUtil {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: Duration,
}

impl JwtUtil {
    pub fn new(secret: &str, expires_in: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in: parse_expiry(expires_in),
        }
    }

    pub fn generate_token(&self, user_id: i64, username: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expires_in).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::internal_error(format!("Failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))
    }
}

fn parse_expiry(input: &str) -> Duration {
    let s = input.trim().to_lowercase();
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    let (num_str, unit) = s.split_at(digits);
    let n: i64 = num_str.parse().unwrap_or(24);
    match unit {
        "m" | "min" | "mins" => Duration::minutes(n),
        "d" | "day" | "days" => Duration::days(n),
        "" | "h" | "hr" | "hour" | "hours" => Duration::hours(n),
        _ => Duration::hours(24),
    }
}
