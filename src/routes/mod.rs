//! Mounted route groups.
//!
//! The pipeline does not implement resource handlers; it mounts routers the
//! embedding application registers through [`RouteSet`]. Each group lives
//! under a literal prefix below `/api/v1`.

use axum::Router;

use crate::http::error::ApiError;

/// Common prefix for every mounted resource group.
pub const API_PREFIX: &str = "/api/v1";

/// The five resource routers the service mounts.
///
/// Handlers are external collaborators; the default set answers every
/// resource request with a 404 until real routers are registered.
pub struct RouteSet {
    pub bootcamps: Router,
    pub courses: Router,
    pub auth: Router,
    pub users: Router,
    pub reviews: Router,
}

impl RouteSet {
    pub fn new(
        bootcamps: Router,
        courses: Router,
        auth: Router,
        users: Router,
        reviews: Router,
    ) -> Self {
        Self {
            bootcamps,
            courses,
            auth,
            users,
            reviews,
        }
    }

    /// Mount every group under its prefix.
    pub(crate) fn mount(self, app: Router) -> Router {
        app.nest(&format!("{API_PREFIX}/bootcamps"), self.bootcamps)
            .nest(&format!("{API_PREFIX}/courses"), self.courses)
            .nest(&format!("{API_PREFIX}/auth"), self.auth)
            .nest(&format!("{API_PREFIX}/users"), self.users)
            .nest(&format!("{API_PREFIX}/reviews"), self.reviews)
    }
}

impl Default for RouteSet {
    fn default() -> Self {
        Self::new(
            unregistered(),
            unregistered(),
            unregistered(),
            unregistered(),
            unregistered(),
        )
    }
}

fn unregistered() -> Router {
    Router::new().fallback(|| async { ApiError::NotFound })
}
