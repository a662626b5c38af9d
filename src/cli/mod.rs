pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "eshop-api")]
#[command(about = "E-commerce REST backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Address to bind, overrides API_HOST")]
        host: Option<String>,
        #[arg(long, help = "Port to bind, overrides API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,

    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
    },
}

pub async fn run(cli: Cli, config: AppConfig, supervisor: &Supervisor) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => commands::serve::handle(config, host, port, supervisor).await,
        Commands::Migrate => commands::migrate::handle(config).await,
        Commands::CreateAdmin {
            name,
            email,
            password,
            phone,
        } => commands::create_admin::handle(config, name, email, password, phone).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["eshop-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_create_admin() {
        let cli = Cli::try_parse_from([
            "eshop-api",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@example.com",
            "--password",
            "secret",
            "--phone",
            "555-0100",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateAdmin { email, phone, .. }) => {
                assert_eq!(email, "root@example.com");
                assert_eq!(phone, "555-0100");
            }
            _ => panic!("expected create-admin"),
        }
    }

    #[test]
    fn create_admin_requires_phone() {
        let result = Cli::try_parse_from([
            "eshop-api",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@example.com",
            "--password",
            "secret",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_accepts_port_override() {
        let cli = Cli::try_parse_from(["eshop-api", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(8080), .. })));
    }
}
