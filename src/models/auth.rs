// src/models/auth.rs
use serde::{Deserialize, Serialize};

/// JWT claims carried by every authenticated request. Tokens are issued by
/// an external identity service; this backend only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user id)
    pub exp: usize,  // Expiration time
    pub iat: usize,  // Issued at
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}
