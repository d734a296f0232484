//! Generate an admin password hash and optionally store it.
//!
//! ```text
//! hash-password 'CorrectHorse'
//! echo -n 'CorrectHorse' | hash-password --db admin.db
//! ```

use std::io::Read;
use std::path::PathBuf;

use admin_auth::{DEFAULT_ITERATIONS, HashParams, MIN_ITERATIONS, hash_password_with, verify_password};
use admin_gate::store::{update_statement, write_password_hash};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "hash-password", about = "Hash an admin password with PBKDF2-HMAC-SHA256")]
struct Args {
    /// Password to hash. Read from stdin when omitted.
    password: Option<String>,

    /// PBKDF2 round count.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_ITERATIONS,
        value_parser = clap::value_parser!(u32).range(i64::from(MIN_ITERATIONS)..)
    )]
    iterations: u32,

    /// SQLite file to write the hash into (`admin_password`, id = 1).
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let password = match args.password {
        Some(p) => p,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Failed to read password from stdin: {e}");
                std::process::exit(1);
            }
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        eprintln!("Password must not be empty");
        std::process::exit(1);
    }

    let hash = hash_password_with(&password, &HashParams::with_iterations(args.iterations));
    if !verify_password(&password, &hash) {
        eprintln!("Generated hash failed verification");
        std::process::exit(1);
    }

    println!("{hash}");

    match args.db {
        Some(db) => {
            if let Err(e) = write_password_hash(&db, &hash) {
                eprintln!("Failed to store hash in {}: {e}", db.display());
                std::process::exit(1);
            }
            eprintln!("Stored admin password hash in {}", db.display());
        }
        None => {
            eprintln!();
            eprintln!("To store it manually:");
            eprintln!("  {}", update_statement(&hash));
        }
    }
}
