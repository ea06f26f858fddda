use crate::features::auth::model::AuthenticatedUser;
use crate::shared::constants::{ROLE_ADMIN, ROLE_VENUE_MANAGER};

use axum::{extract::Request, middleware::Next, Router};

pub fn manager_user(account_id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        account_id: account_id.to_string(),
        sub: format!("sub-{}", account_id),
        roles: vec![ROLE_VENUE_MANAGER.to_string()],
    }
}

pub fn admin_user() -> AuthenticatedUser {
    AuthenticatedUser {
        account_id: "admin-account".to_string(),
        sub: "admin-sub".to_string(),
        roles: vec![ROLE_ADMIN.to_string()],
    }
}

/// Stand-in for the JWT middleware: every request is made as `user`
pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}

