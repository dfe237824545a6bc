//! Cross-deployment route dispatch
//!
//! Each role's experience is hosted as a logically separate application;
//! the table mapping roles to canonical roots is configuration, never
//! computed. The sign-in portal is central, with the caller's location
//! carried losslessly in the `redirect` query parameter.

use url::Url;

use skillspring_common::{Config, Deployment, Error};
use skillspring_directory::Role;

/// Query parameter carrying the post-sign-in return location.
pub const RETURN_PARAM: &str = "redirect";

/// Canonical destinations for every role plus the central sign-in portal.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public_landing: Url,
    login: Url,
    student_root: Url,
    instructor_root: Url,
    admin_root: Url,
}

impl RouteTable {
    pub fn new(
        public_landing: &str,
        login: &str,
        student_root: &str,
        instructor_root: &str,
        admin_root: &str,
    ) -> Result<Self, Error> {
        let parse = |name: &str, value: &str| {
            Url::parse(value)
                .map_err(|e| Error::Configuration(format!("invalid {name} URL '{value}': {e}")))
        };
        Ok(Self {
            public_landing: parse("public landing", public_landing)?,
            login: parse("login", login)?,
            student_root: parse("student root", student_root)?,
            instructor_root: parse("instructor root", instructor_root)?,
            admin_root: parse("admin root", admin_root)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(
            &config.public_landing_url,
            &config.login_url,
            &config.student_root,
            &config.instructor_root,
            &config.admin_root,
        )
    }

    /// Canonical landing location for a role; an absent or unknown role
    /// goes to the public landing page.
    pub fn destination_for(&self, role: Option<Role>) -> Url {
        match role {
            Some(Role::Student) => self.student_root.clone(),
            Some(Role::Instructor) => self.instructor_root.clone(),
            Some(Role::Admin) => self.admin_root.clone(),
            None => self.public_landing.clone(),
        }
    }

    /// The deployment's own externally-visible root.
    pub fn self_root(&self, deployment: Deployment) -> Url {
        match deployment {
            Deployment::Shell => self.public_landing.clone(),
            Deployment::Student => self.student_root.clone(),
            Deployment::Instructor => self.instructor_root.clone(),
            Deployment::Admin => self.admin_root.clone(),
        }
    }

    /// Central sign-in location with the return target embedded.
    pub fn login_redirect(&self, return_to: &str) -> Url {
        let mut url = self.login.clone();
        url.query_pairs_mut().append_pair(RETURN_PARAM, return_to);
        url
    }

    /// Recover the return target from a sign-in URL. The round trip is
    /// lossless: whatever went into `login_redirect` comes back out.
    pub fn return_path(url: &Url) -> Option<String> {
        url.query_pairs()
            .find(|(key, _)| key == RETURN_PARAM)
            .map(|(_, value)| value.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(
            "https://shop.skillspring.app/",
            "https://shop.skillspring.app/login",
            "https://learn.skillspring.app/",
            "https://teach.skillspring.app/",
            "https://admin.skillspring.app/",
        )
        .unwrap()
    }

    #[test]
    fn test_destination_table() {
        let table = table();
        assert_eq!(
            table.destination_for(Some(Role::Student)).as_str(),
            "https://learn.skillspring.app/"
        );
        assert_eq!(
            table.destination_for(Some(Role::Instructor)).as_str(),
            "https://teach.skillspring.app/"
        );
        assert_eq!(
            table.destination_for(Some(Role::Admin)).as_str(),
            "https://admin.skillspring.app/"
        );
        // Unknown role → public landing, never an error page.
        assert_eq!(
            table.destination_for(None).as_str(),
            "https://shop.skillspring.app/"
        );
    }

    #[test]
    fn test_login_redirect_round_trip() {
        let table = table();
        let return_to = "https://learn.skillspring.app/course/42?tab=reviews&q=a b";

        let login = table.login_redirect(return_to);
        assert!(login.as_str().starts_with("https://shop.skillspring.app/login?"));

        let recovered = RouteTable::return_path(&login).expect("return path");
        assert_eq!(recovered, return_to);
    }

    #[test]
    fn test_return_path_absent() {
        let url = Url::parse("https://shop.skillspring.app/login").unwrap();
        assert_eq!(RouteTable::return_path(&url), None);
    }

    #[test]
    fn test_rejects_malformed_configuration() {
        let result = RouteTable::new("not a url", "x", "y", "z", "w");
        assert!(result.is_err());
    }

    #[test]
    fn test_self_root_per_deployment() {
        let table = table();
        assert_eq!(
            table.self_root(Deployment::Instructor).as_str(),
            "https://teach.skillspring.app/"
        );
        assert_eq!(
            table.self_root(Deployment::Shell).as_str(),
            "https://shop.skillspring.app/"
        );
    }
}
