//! Role-based access control extractors and assembly scoping.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::user::UserRole;
use crate::AppState;

/// Extractor that requires the District_Admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::DistrictAdmin {
            return Err(AppError::Forbidden(
                "District admin access required".to_string(),
            ));
        }
        Ok(RequireAdmin(user))
    }
}

/// Extractor for users who may write reports and tithe sheets
/// (District_Admin or Assembly_Secretary).
#[derive(Debug, Clone)]
pub struct RequireSubmitter(pub CurrentUser);

impl FromRequestParts<AppState> for RequireSubmitter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        match user.role {
            UserRole::DistrictAdmin | UserRole::AssemblySecretary => Ok(RequireSubmitter(user)),
            UserRole::Viewer => Err(AppError::Forbidden(
                "Secretary or admin access required".to_string(),
            )),
        }
    }
}

/// Secretaries may only write data for their own assembly.
pub fn ensure_assembly_access(user: &CurrentUser, assembly: &str) -> Result<(), AppError> {
    match user.role {
        UserRole::DistrictAdmin => Ok(()),
        UserRole::AssemblySecretary => {
            let own = user.assembly.as_deref().map(str::trim);
            if own.is_some_and(|own| own.eq_ignore_ascii_case(assembly.trim())) {
                Ok(())
            } else {
                Err(AppError::Forbidden(format!(
                    "You may only submit data for your own assembly, not '{}'",
                    assembly.trim()
                )))
            }
        }
        UserRole::Viewer => Err(AppError::Forbidden("Viewers cannot submit data".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: UserRole, assembly: Option<&str>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "u".to_string(),
            role,
            assembly: assembly.map(String::from),
        }
    }

    #[test]
    fn admin_may_write_anywhere() {
        assert!(ensure_assembly_access(&user(UserRole::DistrictAdmin, None), "Bethel").is_ok());
    }

    #[test]
    fn secretary_limited_to_own_assembly() {
        let secretary = user(UserRole::AssemblySecretary, Some("Bethel Assembly"));
        assert!(ensure_assembly_access(&secretary, " bethel assembly ").is_ok());
        let err = ensure_assembly_access(&secretary, "Zion Assembly").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn secretary_without_assembly_is_refused() {
        let secretary = user(UserRole::AssemblySecretary, None);
        assert!(ensure_assembly_access(&secretary, "Bethel").is_err());
    }

    #[test]
    fn viewer_is_refused() {
        assert!(ensure_assembly_access(&user(UserRole::Viewer, Some("Bethel")), "Bethel").is_err());
    }
}
