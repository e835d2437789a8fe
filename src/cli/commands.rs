use clap::{Parser, Subcommand};

/// `relaydesk` - route conversation messages to a simulator or a signed partner webhook.
#[derive(Parser, Debug)]
#[command(name = "relaydesk")]
#[command(version = "0.1.0")]
#[command(about = "Simulator and webhook relay for customer conversations.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway (run, run/stream, webhook test)
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage apps
    App {
        #[command(subcommand)]
        app_command: AppCommands,
    },

    /// Manage conversation threads
    Thread {
        #[command(subcommand)]
        thread_command: ThreadCommands,
    },

    /// Print the signature headers a webhook request with this body would carry
    Sign {
        /// Webhook secret
        #[arg(long)]
        secret: String,

        /// Exact request body to sign
        body: String,

        /// Unix timestamp to sign with (default: now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Send the sample payload for an app to a webhook URL and report the result
    Probe {
        /// App whose id, name and secret are used
        app_id: String,

        /// Webhook URL to test
        url: String,

        /// Sample customer message
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppCommands {
    /// Create an app and print it as JSON
    Create {
        /// Display name
        name: String,

        /// Partner webhook URL
        #[arg(long)]
        webhook_url: Option<String>,

        /// Secret used to sign webhook requests
        #[arg(long)]
        webhook_secret: Option<String>,

        /// Integration mode (simulator, webhook)
        #[arg(long, default_value = "simulator")]
        mode: String,

        /// Simulator scenario (generic, ecommerce_support)
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Show an app as JSON
    Show { app_id: String },
}

#[derive(Subcommand, Debug)]
pub enum ThreadCommands {
    /// Create a conversation thread for an app
    Create {
        app_id: String,

        /// External customer identifier
        #[arg(long)]
        customer_id: Option<String>,
    },
}
