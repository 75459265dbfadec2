//! Chat-Lock administration binary.
//!
//! Drives the access gate against a redb database and seals/opens attachment
//! files. The HTTP surface is embedded by the host web framework through
//! [`ChatLockApi`](chatlock_server::ChatLockApi); this binary covers
//! operations and debugging.
//!
//! # Usage
//!
//! ```bash
//! export CHATLOCK_GRANT_SECRET=$(openssl rand -hex 32)
//! export CHATLOCK_MEDIA_KEY=$(openssl rand -hex 32)
//!
//! chatlock-server --db chatlock.redb set-pin --owner alice --pin 4242
//! chatlock-server --db chatlock.redb lock --owner alice --peer bob --pin 4242
//! chatlock-server --db chatlock.redb verify --owner alice --peer bob --pin 4242
//! chatlock-server seal photo.jpg photo.bin --message-id m1 --mime image/jpeg > meta.json
//! chatlock-server open photo.bin photo.out.jpg --metadata meta.json
//! ```

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chatlock_core::{Access, AccessGate, Argon2PinHasher, Environment, UserId};
use chatlock_crypto::{
    IV_SIZE, MediaContext, MediaMetadata, SALT_SIZE, decrypt, derive_media_key, seal_media,
    split_combined,
};
use chatlock_server::{RedbStorage, ServerConfig, ServerError, SystemEnv, media::IMAGE_FIELD};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type Gate = AccessGate<SystemEnv, RedbStorage, Argon2PinHasher>;

/// Chat-Lock administration tool
#[derive(Parser, Debug)]
#[command(name = "chatlock-server")]
#[command(about = "Per-conversation chat lock and encrypted media tooling")]
#[command(version)]
struct Args {
    /// Path to the redb database
    #[arg(long, default_value = "chatlock.redb")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Hex-encoded grant signing secret (at least 32 bytes)
    #[arg(long, env = "CHATLOCK_GRANT_SECRET", hide_env_values = true)]
    grant_secret: Option<String>,

    /// Hex-encoded 32-byte media master key
    #[arg(long, env = "CHATLOCK_MEDIA_KEY", hide_env_values = true)]
    media_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set (or overwrite) an owner's PIN, registering the owner if needed
    SetPin {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        pin: String,
    },
    /// Show the lock state of a conversation
    Status {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        peer: String,
    },
    /// List locked conversations
    List {
        #[arg(long)]
        owner: String,
    },
    /// Lock a conversation
    Lock {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        peer: String,
        #[arg(long)]
        pin: String,
    },
    /// Unlock a conversation permanently
    Unlock {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        peer: String,
        #[arg(long)]
        pin: String,
    },
    /// Verify the PIN and print a grant token
    Verify {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        peer: String,
        #[arg(long)]
        pin: String,
    },
    /// Check whether a conversation may be read with an optional token
    Check {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        peer: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Encrypt a file, write ciphertext || tag and print its metadata
    Seal {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        message_id: String,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Decrypt a ciphertext || tag file using its metadata JSON
    Open {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        metadata: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    if let Err(err) = run(args) {
        tracing::error!(error = %err, "Command failed");
        return Err(err.into());
    }
    Ok(())
}

fn run(args: Args) -> Result<(), ServerError> {
    let mut out = io::stdout().lock();

    match args.command {
        Command::Open { input, output, metadata } => {
            let metadata: MediaMetadata = serde_json::from_slice(&fs::read(metadata)?)
                .map_err(|e| ServerError::Config(format!("metadata: {e}")))?;
            let plaintext = open_file(&metadata, &fs::read(input)?)?;
            fs::write(&output, &plaintext)?;
            tracing::info!(output = %output.display(), bytes = plaintext.len(), "Attachment opened");
            Ok(())
        },
        Command::Seal { input, output, message_id, mime } => {
            let config = load_config(args.grant_secret.as_deref(), args.media_key.as_deref())?;
            let metadata = seal_file(&config, &message_id, &mime, &fs::read(input)?, &output)?;
            let json = serde_json::to_string_pretty(&metadata)
                .map_err(|e| ServerError::Io(e.to_string()))?;
            writeln!(out, "{json}")?;
            Ok(())
        },
        command => {
            let config = load_config(args.grant_secret.as_deref(), args.media_key.as_deref())?;
            let storage = RedbStorage::open(&args.db)?;
            let gate = Gate::new(
                SystemEnv::new(),
                storage,
                Argon2PinHasher::default(),
                config.grant_secret.clone(),
                config.gate,
            );
            run_gate(&gate, command, &mut out)
        },
    }
}

fn run_gate(gate: &Gate, command: Command, out: &mut impl Write) -> Result<(), ServerError> {
    match command {
        Command::SetPin { owner, pin } => {
            let owner = UserId::new(owner)?;
            gate.register_owner(&owner)?;
            gate.set_pin(&owner, &pin)?;
            writeln!(out, "PIN set for {owner}")?;
        },
        Command::Status { owner, peer } => {
            let status = gate.status(&UserId::new(owner)?, &UserId::new(peer)?)?;
            writeln!(
                out,
                "locked: {}, cooldown remaining: {}ms",
                status.locked,
                status.cooldown_remaining.as_millis()
            )?;
        },
        Command::List { owner } => {
            for peer in gate.list_locked(&UserId::new(owner)?)? {
                writeln!(out, "{peer}")?;
            }
        },
        Command::Lock { owner, peer, pin } => {
            gate.lock(&UserId::new(owner)?, &UserId::new(peer)?, &pin)?;
            writeln!(out, "locked")?;
        },
        Command::Unlock { owner, peer, pin } => {
            gate.unlock(&UserId::new(owner)?, &UserId::new(peer)?, &pin)?;
            writeln!(out, "unlocked")?;
        },
        Command::Verify { owner, peer, pin } => {
            let issued = gate.verify_pin(&UserId::new(owner)?, &UserId::new(peer)?, &pin)?;
            writeln!(out, "{}", issued.token)?;
        },
        Command::Check { owner, peer, token } => {
            let access =
                gate.check_access(&UserId::new(owner)?, &UserId::new(peer)?, token.as_deref())?;
            match access {
                Access::Allowed => writeln!(out, "allowed")?,
                Access::Denied(reason) => writeln!(out, "denied: {reason:?}")?,
            }
        },
        Command::Seal { .. } | Command::Open { .. } => {
            return Err(ServerError::Config("not a gate command".to_string()));
        },
    }
    Ok(())
}

fn load_config(
    grant_secret: Option<&str>,
    media_key: Option<&str>,
) -> Result<ServerConfig, ServerError> {
    let grant_secret = grant_secret
        .ok_or_else(|| ServerError::Config("CHATLOCK_GRANT_SECRET is not set".to_string()))?;
    let media_key =
        media_key.ok_or_else(|| ServerError::Config("CHATLOCK_MEDIA_KEY is not set".to_string()))?;
    ServerConfig::from_hex(grant_secret, media_key)
}

fn seal_file(
    config: &ServerConfig,
    message_id: &str,
    mime: &str,
    plaintext: &[u8],
    output: &Path,
) -> Result<MediaMetadata, ServerError> {
    let env = SystemEnv::new();
    let mut salt = [0u8; SALT_SIZE];
    let mut iv = [0u8; IV_SIZE];
    env.random_bytes(&mut salt);
    env.random_bytes(&mut iv);

    let context = MediaContext::new(message_id, IMAGE_FIELD);
    let object = seal_media(&config.media_master_key, &context, plaintext, mime, salt, iv);
    fs::write(output, object.combined())?;

    let key = derive_media_key(&config.media_master_key, &context, &object.salt);
    tracing::info!(message_id, bytes = plaintext.len(), "Attachment sealed");

    Ok(MediaMetadata::new(&key, &object, output.display().to_string()))
}

fn open_file(metadata: &MediaMetadata, blob: &[u8]) -> Result<Vec<u8>, ServerError> {
    metadata.ensure_complete()?;
    let key = metadata.decode_key()?;
    let iv = metadata.decode_iv()?;
    let (ciphertext, tag) = split_combined(blob)?;
    Ok(decrypt(ciphertext, key.bytes(), &iv, &tag)?)
}
