use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by admin API tokens (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// An authenticated operator of the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub authenticated_at: Option<DateTime<Utc>>,
}
