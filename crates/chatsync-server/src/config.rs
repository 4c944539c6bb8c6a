use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chatsync_core::{ModelSettings, SessionLimits};
use clap::Parser;

/// Chat assistant server with shared user data pushed to every open tab.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatsync", version)]
pub struct Cli {
    /// Address to listen on. All interfaces by default.
    #[arg(long, env = "CHATSYNC_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Overrides the port of `--listen`.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// SQLite database holding the directive and user data.
    /// Defaults to a file in the user data directory.
    #[arg(long, env = "CHATSYNC_DB")]
    pub db_path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart.
    #[arg(long, conflicts_with = "db_path")]
    pub ephemeral: bool,

    /// Directory of static front-end files.
    #[arg(long, env = "CHATSYNC_PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    #[arg(long, env = "CHATSYNC_MODEL", default_value = "gpt-4o")]
    pub model: String,

    #[arg(long, env = "CHATSYNC_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    /// Maximum output tokens per reply.
    #[arg(long, env = "CHATSYNC_MAX_TOKENS", default_value_t = 500)]
    pub max_tokens: u32,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = chatsync_llm_openai::DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub openai_api_key: String,

    /// Drop sessions idle for this many seconds (0 keeps them forever).
    #[arg(long, env = "CHATSYNC_SESSION_IDLE_SECS", default_value_t = 21600)]
    pub session_idle_secs: u64,

    /// Most sessions kept at once (0 for no limit).
    #[arg(long, env = "CHATSYNC_MAX_SESSIONS", default_value_t = 1000)]
    pub max_sessions: usize,

    /// Events queued per event-stream client before it is dropped.
    #[arg(long, env = "CHATSYNC_SUBSCRIBER_BUFFER", default_value_t = chatsync_core::bus::DEFAULT_SUBSCRIBER_BUFFER)]
    pub subscriber_buffer: usize,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        let mut addr = self.listen;
        if let Some(port) = self.port {
            addr.set_port(port);
        }
        addr
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            idle_ttl: (self.session_idle_secs > 0)
                .then(|| Duration::from_secs(self.session_idle_secs)),
            max_sessions: (self.max_sessions > 0).then_some(self.max_sessions),
        }
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }

    pub fn openai_config(&self) -> chatsync_llm_openai::OpenAIConfig {
        chatsync_llm_openai::OpenAIConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
        }
    }
}
