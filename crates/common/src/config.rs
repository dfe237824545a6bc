//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config. Every deployment of the
//! shared auth protocol (shell, student, instructor, admin) runs the
//! same code with a different `Config`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Which front end this process is serving.
///
/// Each deployment hosts one role's experience; `Shell` is the public
/// marketplace and also hosts the central sign-in portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Shell,
    Student,
    Instructor,
    Admin,
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Shell => write!(f, "shell"),
            Deployment::Student => write!(f, "student"),
            Deployment::Instructor => write!(f, "instructor"),
            Deployment::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Deployment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shell" => Ok(Deployment::Shell),
            "student" => Ok(Deployment::Student),
            "instructor" => Ok(Deployment::Instructor),
            "admin" => Ok(Deployment::Admin),
            other => Err(anyhow::anyhow!(
                "Unknown deployment '{other}'. Supported: shell, student, instructor, admin"
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which front end this process serves
    pub deployment: Deployment,

    /// Hosted backend configuration
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,

    /// Cross-app redirect targets (absolute URLs, configuration not computed)
    pub public_landing_url: String,
    pub login_url: String,
    pub student_root: String,
    pub instructor_root: String,
    pub admin_root: String,

    /// Local persistent role cache location
    pub role_cache_path: String,

    /// Authoritative role query timeout (seconds)
    pub resolve_timeout_secs: u64,
    /// Hard ceiling on the overall loading state (seconds)
    pub bootstrap_ceiling_secs: u64,

    /// Runtime configuration
    pub log_level: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            deployment: env::var("SKILLSPRING_DEPLOYMENT")
                .map_err(|_| anyhow::anyhow!("SKILLSPRING_DEPLOYMENT is required"))?
                .parse()?,

            supabase_url: env::var("SUPABASE_URL")
                .map_err(|_| anyhow::anyhow!("SUPABASE_URL is required"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map_err(|_| anyhow::anyhow!("SUPABASE_ANON_KEY is required"))?,
            jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("SUPABASE_JWT_SECRET is required"))?,

            public_landing_url: env::var("SHELL_URL")
                .map_err(|_| anyhow::anyhow!("SHELL_URL is required"))?,
            login_url: env::var("LOGIN_URL")
                .map_err(|_| anyhow::anyhow!("LOGIN_URL is required"))?,
            student_root: env::var("STUDENT_URL")
                .map_err(|_| anyhow::anyhow!("STUDENT_URL is required"))?,
            instructor_root: env::var("INSTRUCTOR_URL")
                .map_err(|_| anyhow::anyhow!("INSTRUCTOR_URL is required"))?,
            admin_root: env::var("ADMIN_URL")
                .map_err(|_| anyhow::anyhow!("ADMIN_URL is required"))?,

            role_cache_path: env::var("ROLE_CACHE_PATH")
                .unwrap_or_else(|_| "skillspring-role-cache.db".to_string()),

            resolve_timeout_secs: env::var("ROLE_RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
            bootstrap_ceiling_secs: env::var("BOOTSTRAP_CEILING_SECS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("deployment", &self.deployment)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("public_landing_url", &self.public_landing_url)
            .field("login_url", &self.login_url)
            .field("student_root", &self.student_root)
            .field("instructor_root", &self.instructor_root)
            .field("admin_root", &self.admin_root)
            .field("role_cache_path", &self.role_cache_path)
            .field("resolve_timeout_secs", &self.resolve_timeout_secs)
            .field("bootstrap_ceiling_secs", &self.bootstrap_ceiling_secs)
            .field("log_level", &self.log_level)
            .field("port", &self.port)
            .finish()
    }
}
