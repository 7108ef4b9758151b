use clap::Parser;
use postboard::{
    config::{Command, Config},
    db_helpers, hash_password_argon2, init_db, run_app,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_level: &str, log_json: bool) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    match &config.command {
        Command::Serve(serve_config) => {
            init_tracing(&serve_config.log_level, serve_config.log_json)
        }
        _ => init_tracing("info", false),
    }

    match config.command {
        Command::Serve(serve_config) => {
            run_app(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            init_db(&database_url).await?;
            println!("Database migrations completed successfully");
        }
        Command::CreateGroup {
            database_url,
            title,
            slug,
            description,
        } => {
            let pool = init_db(&database_url).await?;
            let group = db_helpers::insert_group(&pool, &title, &slug, &description).await?;
            println!("Group created: {} (/group/{}/, id {})", group.title, group.slug, group.id);
        }
        Command::DeleteGroup { database_url, slug } => {
            let pool = init_db(&database_url).await?;
            db_helpers::delete_group_by_slug(&pool, &slug).await?;
            println!("Group '{}' deleted", slug);
        }
        Command::CreateUser {
            database_url,
            username,
            password,
        } => {
            let username = username.trim();
            db_helpers::validate_username(username)
                .map_err(|message| anyhow::anyhow!("Invalid username '{}': {}", username, message))?;
            let pool = init_db(&database_url).await?;
            let hash = hash_password_argon2(password).await?;
            let user = db_helpers::insert_user(&pool, username, &hash).await?;
            println!("User created: {} (id {})", user.username, user.id);
        }
        Command::DeleteUser {
            database_url,
            username,
        } => {
            let pool = init_db(&database_url).await?;
            db_helpers::delete_user_by_username(&pool, &username).await?;
            println!("User '{}' deleted with their posts, comments and follows", username);
        }
    }

    Ok(())
}
