use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::utils::error::AppError;

/// Identity headers injected by the reverse proxy after it has verified
/// the session. The core never sees credentials.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    EventManager,
    Staff,
    Attendee,
}

impl Role {
    /// Unknown role strings fall back to attendee.
    fn parse(raw: &str) -> Role {
        match raw.trim() {
            "admin" => Role::Admin,
            "event_manager" => Role::EventManager,
            "staff" => Role::Staff,
            _ => Role::Attendee,
        }
    }

    /// Gate duty: scanning tickets and access codes, reading attendance.
    pub fn can_operate_gate(&self) -> bool {
        matches!(self, Role::Admin | Role::EventManager | Role::Staff)
    }

    /// Event administration and money movement.
    pub fn can_manage_events(&self) -> bool {
        matches!(self, Role::Admin | Role::EventManager)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require_gate_operator(&self) -> Result<(), AppError> {
        if self.role.can_operate_gate() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff role required".to_string()))
        }
    }

    pub fn require_event_manager(&self) -> Result<(), AppError> {
        if self.role.can_manage_events() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Event manager role required".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::AuthError("User not authenticated".to_string()))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Role::parse)
            .unwrap_or(Role::Attendee);

        Ok(AuthUser { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let mut parts = parts_with(&[]);
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn blank_user_id_is_rejected() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "  ")]);
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn role_defaults_to_attendee() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "user_1")]);
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, "user_1");
        assert_eq!(user.role, Role::Attendee);
    }

    #[tokio::test]
    async fn unknown_role_falls_back_to_attendee() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "user_1"), (USER_ROLE_HEADER, "root")]);
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.role, Role::Attendee);
    }

    #[tokio::test]
    async fn staff_can_operate_gate_but_not_manage() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "staff_1"), (USER_ROLE_HEADER, "staff")]);
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.require_gate_operator().is_ok());
        assert!(matches!(
            user.require_event_manager(),
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn admin_has_both_capabilities() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "admin_1"), (USER_ROLE_HEADER, "admin")]);
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.require_gate_operator().is_ok());
        assert!(user.require_event_manager().is_ok());
    }

    #[tokio::test]
    async fn attendee_cannot_operate_gate() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "u1"), (USER_ROLE_HEADER, "attendee")]);
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(matches!(
            user.require_gate_operator(),
            Err(AppError::Forbidden(_))
        ));
    }
}
