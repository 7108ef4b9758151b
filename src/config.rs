use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "postboard")]
#[command(about = "Postboard social blogging server", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the web server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },

    /// Create a new group posts can be filed under
    CreateGroup {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Display name
        #[arg(short, long)]
        title: String,

        /// URL identifier, at most 20 characters
        #[arg(short, long)]
        slug: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete a group; refused while posts still reference it
    DeleteGroup {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        #[arg(short, long)]
        slug: String,
    },

    /// Create a new user
    CreateUser {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Delete a user together with their posts, comments and follows
    DeleteUser {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        #[arg(short, long)]
        username: String,
    },
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://postboard.db?mode=rwc";

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:3001")]
    pub bind_address: String,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,

    /// Directory uploaded images are written to
    #[arg(long, env = "MEDIA_ROOT", default_value = "media")]
    pub media_root: PathBuf,

    /// Lifetime of cached feed pages in seconds; 0 disables the cache
    #[arg(long, env = "PAGE_CACHE_TTL", default_value = "20")]
    pub page_cache_ttl: u64,

    #[arg(long, env = "POSTS_PER_PAGE", default_value = "10")]
    pub posts_per_page: i64,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}
