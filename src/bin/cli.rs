use std::process::exit;

use clap::Parser;
use log::{error, LevelFilter};

use filedict::args::{Commands, FileDictArgs};
use filedict::{Dict, FileDictError, Result};

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    if let Err(e) = run() {
        error!("{}", e);
        exit(1);
    }
}

fn run() -> Result<()> {
    let cli = FileDictArgs::parse();
    let mut db = Dict::open(&cli.file)?;

    match cli.command {
        Commands::Set { key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value));
            db.set(&key, value)?;
        }
        Commands::Get { key } => match db.get(&key) {
            Ok(value) => println!("{value}"),
            Err(FileDictError::KeyNotFound) => println!("Key not found"),
            Err(e) => return Err(e),
        },
        Commands::Rm { key } => db.delete(&key)?,
        Commands::Keys => {
            let mut keys: Vec<&str> = db.keys().collect();
            keys.sort_unstable();
            for key in keys {
                println!("{key}");
            }
        }
        Commands::Len => println!("{}", db.len()),
        Commands::Vacuum => db.vacuum()?,
    }

    db.close()
}
