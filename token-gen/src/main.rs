use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header};

/// Mint an HS256 session token for local testing of the wallets API.
///
/// The key is read from `--key` or the `TOKEN_KEY` environment variable
/// (hex, same format the server reads).
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Subject id placed in `sub` (the user id)
    #[arg(long)]
    sub: String,

    /// Lifetime in seconds; negative values mint an already-expired token
    #[arg(long, default_value_t = 3600, allow_hyphen_values = true)]
    ttl: i64,

    /// Hex-encoded HS256 key. Default: $TOKEN_KEY
    #[arg(long, env = "TOKEN_KEY", hide_env_values = true)]
    key: String,

    /// Override iat (unix seconds). Default: now.
    #[arg(long)]
    iat: Option<i64>,

    /// Print only the token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn now_unix() -> Result<i64, std::time::SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let key = hex::decode(args.key.trim())?;
    if key.is_empty() {
        return Err("TOKEN_KEY is empty".into());
    }

    let iat = match args.iat {
        Some(iat) => iat,
        None => now_unix()?,
    };
    let exp = iat + args.ttl;

    let claims = serde_json::json!({
        "sub": args.sub,
        "iat": iat,
        "exp": exp,
    });

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&key),
    )?;

    if args.quiet {
        println!("{}", token);
        return Ok(());
    }

    println!("token: {}", token);
    println!("sub: {}", args.sub);
    println!("iat: {}", iat);
    println!("exp: {}", exp);
    println!("Authorization: Bearer {}", token);

    Ok(())
}
