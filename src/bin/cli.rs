//! SimpleDB CLI Client
//!
//! Command-line interface for interacting with SimpleDB.

use clap::{Parser, Subcommand};
use simpledb::{Client, Value};

/// SimpleDB CLI
#[derive(Parser, Debug)]
#[command(name = "simpledb-cli")]
#[command(about = "CLI for the SimpleDB key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:31337")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Remove every key
    Flush,

    /// Get several values at once
    Mget {
        /// The keys to get
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set several key-value pairs at once
    Mset {
        /// Alternating keys and values
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Could not connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let request: Vec<Value> = match args.command {
        Commands::Get { key } => vec!["GET".into(), key.into()],
        Commands::Set { key, value } => vec!["SET".into(), key.into(), value.into()],
        Commands::Del { key } => vec!["DEL".into(), key.into()],
        Commands::Flush => vec!["FLUSH".into()],
        Commands::Mget { keys } => std::iter::once("MGET".to_string())
            .chain(keys)
            .map(Value::from)
            .collect(),
        Commands::Mset { pairs } => std::iter::once("MSET".to_string())
            .chain(pairs)
            .map(Value::from)
            .collect(),
    };

    match client.execute(request) {
        Ok(reply) => println!("{}", reply),
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    }
}
