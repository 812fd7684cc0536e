//! Route table and access guards for the front-end.

use std::fmt;

use super::session::{AuthStatus, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Courses,
    CourseAdd,
    CourseEdit(String),
}

impl Route {
    /// Resolve a path. `/` and unknown paths lead to the login page.
    pub fn resolve(path: &str) -> Route {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["courses"] => Route::Courses,
            ["courses", "add"] | ["courses", "create"] => Route::CourseAdd,
            ["courses", "edit", id] => Route::CourseEdit((*id).to_string()),
            _ => Route::Login,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Courses => "/courses".to_string(),
            Route::CourseAdd => "/courses/add".to_string(),
            Route::CourseEdit(id) => format!("/courses/edit/{}", id),
        }
    }

    /// Whether the route needs a signed-in user
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Courses | Route::CourseAdd | Route::CourseEdit(_)
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Session restoration hasn't finished; show a loading state
    Loading,
    Allow,
    Redirect(Route),
}

pub struct RouteGuard;

impl RouteGuard {
    /// Pages that need a signed-in user.
    pub fn protected(state: &SessionState) -> Access {
        match state.status() {
            AuthStatus::Initializing => Access::Loading,
            AuthStatus::Unauthenticated => Access::Redirect(Route::Login),
            AuthStatus::Authenticated => Access::Allow,
        }
    }

    /// Pages for signed-out users only (the login page).
    pub fn public(state: &SessionState) -> Access {
        match state.status() {
            AuthStatus::Initializing => Access::Loading,
            AuthStatus::Authenticated => Access::Redirect(Route::Courses),
            AuthStatus::Unauthenticated => Access::Allow,
        }
    }

    /// Evaluate the guard that applies to `route`.
    pub fn check(route: &Route, state: &SessionState) -> Access {
        if route.is_protected() {
            Self::protected(state)
        } else {
            Self::public(state)
        }
    }
}
