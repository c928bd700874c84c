//! Estate CLI - operator tasks against the listings database
//!
//! Usage:
//!   estate init-schema
//!   estate create-admin --email <email> --password <password> ...
//!   estate promote <email>

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use estate_api::auth::{hash_password, validate_password_strength, PasswordConfig};
use estate_core::{DatabaseConfig, Role, User, UserStore};
use estate_store::SurrealStore;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "estate")]
#[command(about = "Estate listings operator CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and indexes
    InitSchema,
    /// Create a verified administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Site")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    /// Give an existing account the admin role
    Promote {
        /// Account email
        email: String,
    },
}

async fn create_admin(
    store: &SurrealStore,
    email: &str,
    password: &str,
    first_name: String,
    last_name: String,
    phone: String,
) -> anyhow::Result<User> {
    if let Err(problems) = validate_password_strength(password) {
        bail!("Password too weak: {}", problems.join(", "));
    }
    let email = email.trim().to_lowercase();
    if store.find_user_by_email(&email).await?.is_some() {
        bail!("An account with email {email} already exists");
    }

    let hash = hash_password(password, &PasswordConfig::default())
        .context("Failed to hash password")?;
    let mut user = User::new(
        Uuid::new_v4().simple().to_string(),
        first_name,
        last_name,
        &email,
        phone,
        hash,
    );
    user.role = Role::Admin;
    user.email_verified = true;

    Ok(store.insert_user(user).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    let store = SurrealStore::new(&config)
        .await
        .context("Failed to connect to SurrealDB")?;

    match cli.command {
        Commands::InitSchema => {
            store.init_schema().await?;
            println!("Schema ready in {}/{}", config.namespace, config.database);
        }
        Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
            phone,
        } => {
            let user =
                create_admin(&store, &email, &password, first_name, last_name, phone).await?;
            tracing::info!(user_id = %user.id, "Administrator created");
            println!("Created admin {} ({})", user.email, user.id);
        }
        Commands::Promote { email } => {
            let user = store
                .find_user_by_email(&email.trim().to_lowercase())
                .await?
                .with_context(|| format!("No account with email {email}"))?;
            if user.role == Role::Admin {
                println!("{} is already an admin", user.email);
            } else {
                store.set_role(&user.id, Role::Admin).await?;
                println!("Promoted {} to admin", user.email);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_admin() {
        let cli = Cli::try_parse_from([
            "estate",
            "create-admin",
            "--email",
            "ops@example.com",
            "--password",
            "Str0ng!Pass",
        ])
        .unwrap();

        match cli.command {
            Commands::CreateAdmin {
                email, first_name, ..
            } => {
                assert_eq!(email, "ops@example.com");
                assert_eq!(first_name, "Site");
            }
            _ => panic!("expected create-admin"),
        }
    }

    #[test]
    fn test_promote_requires_email() {
        assert!(Cli::try_parse_from(["estate", "promote"]).is_err());
    }
}
