use crate::client::{context::AuthContext, routes::Route};

/// Access
///
/// Outcome of guarding a route: show it, or go somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Render,
    Redirect(Route),
}

/// guard
///
/// Public routes always render. Otherwise unauthenticated users go to `/login` and
/// users whose role is not on the route's allow-list go to `/`.
pub fn guard(ctx: &AuthContext, route: Route) -> Access {
    let Some(allowed) = route.allowed_roles() else {
        return Access::Render;
    };

    if !ctx.is_authenticated {
        return Access::Redirect(Route::Login);
    }

    match ctx.role {
        Some(role) if allowed.contains(&role) => Access::Render,
        _ => Access::Redirect(Route::Home),
    }
}

/// Redirect chains are at most two hops (login page -> dashboard); anything longer
/// would be a table bug.
const MAX_REDIRECTS: usize = 4;

/// Navigator
///
/// Tracks the displayed route. Every navigation goes through `guard`, and the login
/// page forwards an authenticated user to their dashboard.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Route,
    history: Vec<Route>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: Route::Home,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    /// Routes displayed before the current one, oldest first.
    pub fn history(&self) -> &[Route] {
        &self.history
    }

    /// navigate
    ///
    /// Resolves `path`, applies the guard and returns the route that ends up displayed.
    pub fn navigate(&mut self, ctx: &AuthContext, path: &str) -> Route {
        self.go(ctx, Route::from_path(path))
    }

    pub fn go(&mut self, ctx: &AuthContext, requested: Route) -> Route {
        let resolved = resolve(ctx, requested);
        if resolved != requested {
            tracing::debug!(%requested, %resolved, "navigation redirected");
        }

        self.history.push(self.current);
        self.current = resolved;
        resolved
    }
}

fn resolve(ctx: &AuthContext, mut route: Route) -> Route {
    for _ in 0..MAX_REDIRECTS {
        if route == Route::Login && ctx.is_authenticated {
            if let Some(role) = ctx.role {
                route = Route::dashboard_for(role);
                continue;
            }
        }

        match guard(ctx, route) {
            Access::Render => return route,
            Access::Redirect(next) => route = next,
        }
    }
    route
}
