use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub session: SessionSettings,
    pub sso: SsoSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Access-token (JWT) settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Refresh-token and cookie-transport settings
#[derive(serde::Deserialize, Clone)]
pub struct SessionSettings {
    /// Server-held secret mixed into refresh-token secret hashes
    pub refresh_pepper: String,
    /// When true, tokens also travel as HTTP-only cookies and mutating
    /// requests must carry a CSRF token
    pub use_cookies: bool,
    /// Sets the Secure flag on session cookies
    pub secure_cookies: bool,
}

/// Email-to-role mapping for SSO-provisioned users
#[derive(serde::Deserialize, Clone, Default)]
pub struct SsoSettings {
    #[serde(default)]
    pub admin_emails: Vec<String>,
    #[serde(default)]
    pub supervisor_emails: Vec<String>,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;

    // Refuse to boot with a missing or placeholder signing secret
    if settings.jwt.secret.is_empty() || settings.jwt.secret == "change_this_secret" {
        return Err(ConfigError::Message(
            "jwt.secret must be set to a strong value".to_string(),
        ));
    }
    if settings.session.refresh_pepper.is_empty() {
        return Err(ConfigError::Message(
            "session.refresh_pepper must be set".to_string(),
        ));
    }

    Ok(settings)
}
