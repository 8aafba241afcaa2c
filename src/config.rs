use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Transactional email (Resend) settings. A missing key is not fatal:
/// sends fail per request instead.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub from: String,
}

/// Text-generation endpoint settings used by analysis and suggestions.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub ai: AiConfig,
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET is required"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "whisperbox".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "whisperbox-users".into()),
            ttl_minutes: parsed_env("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parsed_env("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let mail = MailConfig {
            api_key: optional_env("RESEND_API_KEY"),
            from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Whisperbox <onboarding@resend.dev>".into()),
        };
        let ai = AiConfig {
            api_key: optional_env("GEMINI_API_KEY"),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            timeout_secs: parsed_env("AI_TIMEOUT_SECS", 30),
        };
        Ok(Self {
            database_url,
            jwt,
            mail,
            ai,
        })
    }
}
