use crate::{
    client::{api::AuthApi, routes::Route},
    models::{AuthStatus, LoginRequest, Role},
};

/// AuthContext
///
/// What the client knows about the current session. Built by `load`, updated by
/// `login`/`logout`, and read by the guard. Never cached beyond one navigation
/// session; a reload calls `load` again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    /// The SSN of the logged-in user.
    pub id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(ssn: impl Into<String>, role: Role) -> Self {
        Self {
            is_authenticated: true,
            role: Some(role),
            id: Some(ssn.into()),
        }
    }

    /// A status claiming authentication without a role is treated as anonymous:
    /// the guard could not place such a user anyway.
    pub fn from_status(status: AuthStatus) -> Self {
        match (status.is_authenticated, status.role) {
            (true, Some(role)) => Self {
                is_authenticated: true,
                role: Some(role),
                id: status.ssn,
            },
            _ => Self::anonymous(),
        }
    }

    /// load
    ///
    /// One `check_auth` call. Any failure yields the unauthenticated state.
    pub async fn load(api: &dyn AuthApi) -> Self {
        match api.check_auth().await {
            Ok(status) => Self::from_status(status),
            Err(e) => {
                tracing::warn!("Error checking auth status: {}", e);
                Self::anonymous()
            }
        }
    }

    /// login
    ///
    /// Returns the dashboard to navigate to, or the message to show on the login page.
    /// The context is left untouched on failure.
    pub async fn login(&mut self, api: &dyn AuthApi, ssn: &str) -> Result<Route, String> {
        let request = LoginRequest {
            ssn: ssn.to_string(),
        };
        let ssn = request.validate().map_err(|e| e.0)?;

        match api.login(&ssn).await {
            Ok(response) => {
                *self = Self::authenticated(response.ssn, response.role);
                Ok(Route::dashboard_for(response.role))
            }
            Err(e) => {
                tracing::warn!("Login error: {}", e);
                Err(e.user_message("Login failed"))
            }
        }
    }

    /// logout
    ///
    /// Clears the context whatever the server says and sends the user to `/login`.
    pub async fn logout(&mut self, api: &dyn AuthApi) -> Route {
        if let Err(e) = api.logout().await {
            tracing::warn!("Logout error: {}", e);
        }
        *self = Self::anonymous();
        Route::Login
    }
}
