use clap::{Parser, Subcommand};

/// Point of Sale: REST backend for client management
#[derive(Parser)]
#[command(name = "pos-api", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to POS_PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Manage identities
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an identity, applying the password policy
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "POS_NEW_USER_PASSWORD")]
        password: String,
    },
    /// List identities
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::try_parse_from(["pos-api", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(8080) })));
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["pos-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_user_create_args() {
        let cli = Cli::try_parse_from([
            "pos-api", "user", "create", "--username", "cashier", "--email",
            "cashier@example.com", "--password", "Cashier1!",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::User {
                command: UserCommands::Create { username, .. },
            }) => assert_eq!(username, "cashier"),
            _ => panic!("expected user create"),
        }
    }
}
