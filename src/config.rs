use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub price_id_pro: Option<String>,
    pub webhook_secret: Option<String>,
    pub app_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
    pub stripe: StripeConfig,
    pub free_daily_limit: i32,
    pub game_question_count: i32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "torahtrivia".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "torahtrivia-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let llm = LlmConfig {
            api_key: std::env::var("OPENAI_API_KEY")?,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
        };
        let stripe = StripeConfig {
            secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            price_id_pro: std::env::var("STRIPE_PRICE_ID_PRO").ok(),
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3002".into()),
        };
        let free_daily_limit = std::env::var("FREE_DAILY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(20);
        let game_question_count = std::env::var("GAME_QUESTION_COUNT")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(10);
        Ok(Self {
            database_url,
            jwt,
            llm,
            stripe,
            free_daily_limit,
            game_question_count,
        })
    }
}
