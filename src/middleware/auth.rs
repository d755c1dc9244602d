use crate::core::AppError;
use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, MySqlPool};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

/// Role carried by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
    Customer,
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "staff" => Ok(UserRole::Staff),
            "customer" => Ok(UserRole::Customer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Caller identity resolved from the session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::unauthorized("Not signed in")),
        )
    }
}

/// Stored session, keyed by the SHA-256 of the cookie value
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub user_id: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

/// Session lookup seam; sessions are issued elsewhere
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Unexpired session for the token hash, if any
    async fn find_active(&self, token_hash: &str) -> crate::core::Result<Option<SessionRecord>>;
}

pub struct MySqlSessionRepository {
    pool: MySqlPool,
}

impl MySqlSessionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for MySqlSessionRepository {
    async fn find_active(&self, token_hash: &str) -> crate::core::Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT user_id, role, expires_at
            FROM sessions
            WHERE token_hash = ? AND expires_at > ?
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

/// Hex SHA-256 of a session token, the form stored in `sessions.token_hash`
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Session cookie authentication middleware
pub struct SessionAuth {
    sessions: Arc<dyn SessionRepository>,
    cookie_name: Rc<str>,
}

impl SessionAuth {
    pub fn new(sessions: Arc<dyn SessionRepository>, cookie_name: impl Into<String>) -> Self {
        Self {
            sessions,
            cookie_name: Rc::from(cookie_name.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthMiddleware {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
            cookie_name: self.cookie_name.clone(),
        }))
    }
}

pub struct SessionAuthMiddleware<S> {
    service: Rc<S>,
    sessions: Arc<dyn SessionRepository>,
    cookie_name: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let sessions = self.sessions.clone();
        let cookie_name = self.cookie_name.clone();

        Box::pin(async move {
            let token = req.cookie(&cookie_name).map(|c| c.value().to_string());

            match authenticate(sessions.as_ref(), token.as_deref()).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    svc.call(req).await.map(|res| res.map_into_right_body())
                }
                Err(e) => {
                    if !matches!(e, AppError::Unauthorized(_)) {
                        tracing::error!(error = %e, "Session lookup failed");
                    }
                    let http_response = e.error_response();
                    Ok(req.into_response(http_response).map_into_left_body())
                }
            }
        })
    }
}

async fn authenticate(
    sessions: &dyn SessionRepository,
    token: Option<&str>,
) -> crate::core::Result<AuthenticatedUser> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing session cookie"))?;

    let record = sessions
        .find_active(&hash_session_token(token))
        .await?
        .filter(|record| record.expires_at > Utc::now())
        .ok_or_else(|| AppError::unauthorized("Session is invalid or expired"))?;

    let role = UserRole::from_str(&record.role)
        .map_err(|e| AppError::unauthorized(format!("Session rejected: {}", e)))?;

    Ok(AuthenticatedUser {
        user_id: record.user_id,
        role,
    })
}
