//! Shared-secret request gate.

use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::request::{LoginRequest, LoginResponse};

pub const DEFAULT_AUTH_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized,
    Unauthorized,
}

impl AuthDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthDecision::Authorized)
    }
}

/// Compares supplied credentials against the configured secret.
#[derive(Clone)]
pub struct AuthGuard {
    secret: Arc<str>,
    header: String,
}

impl fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGuard")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl AuthGuard {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(EngineError::Config("auth secret must not be empty".to_string()));
        }
        Ok(Self {
            secret: Arc::from(secret),
            header: DEFAULT_AUTH_HEADER.to_string(),
        })
    }

    /// Name of the request header carrying the credential.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into();
        if !header.trim().is_empty() {
            self.header = header.trim().to_ascii_lowercase();
        }
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header
    }

    pub fn check(&self, supplied: Option<&str>) -> AuthDecision {
        match supplied {
            Some(candidate)
                if !candidate.is_empty()
                    && constant_time_eq(candidate.as_bytes(), self.secret.as_bytes()) =>
            {
                AuthDecision::Authorized
            }
            _ => {
                tracing::debug!(header = %self.header, "credential rejected");
                AuthDecision::Unauthorized
            }
        }
    }

    pub fn require(&self, supplied: Option<&str>) -> Result<()> {
        match self.check(supplied) {
            AuthDecision::Authorized => Ok(()),
            AuthDecision::Unauthorized => Err(EngineError::Unauthorized),
        }
    }

    pub fn login(&self, request: &LoginRequest) -> LoginResponse {
        LoginResponse {
            authorized: self.check(request.password.as_deref()).is_authorized(),
        }
    }
}

/// Work is proportional to the candidate's length only, so neither the
/// secret's bytes nor its length show up in timing.
fn constant_time_eq(candidate: &[u8], secret: &[u8]) -> bool {
    let length_diff = candidate.len() ^ secret.len();
    let byte_diff = candidate.iter().enumerate().fold(0u8, |acc, (i, x)| {
        acc | (x ^ secret.get(i).copied().unwrap_or(0))
    });
    length_diff == 0 && byte_diff == 0
}
