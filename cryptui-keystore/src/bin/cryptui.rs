//! cryptui: multi-recipient file encryption from the command line
//!
//! Usage:
//!   cryptui keygen  --name <NAME> [--comment <TEXT>]
//!   cryptui import  --in <KEYFILE>
//!   cryptui export  --key <NAME|FP-PREFIX> [--out <FILE>]
//!   cryptui list
//!   cryptui select  --key <NAME|FP-PREFIX>
//!   cryptui seal    --in <FILE> --to <Q>[,<Q>...] [--signer <Q>] [--out <FILE>]
//!   cryptui open    --in <FILE> [--out <FILE>]
//!   cryptui inspect <FILE>

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use cryptui_envelope::{
    decrypt_file, encode, opened_path, sealed_path, AsymmetricKey, Container, DecryptOutcome,
    Verification,
};
use cryptui_keystore::{resolve, resolve_key_pair, Config, KeyDirectory, KeyStore, LogFormat};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cfg.log_format);

    let result = match args[1].as_str() {
        "keygen" => cmd_keygen(&cfg, &args[2..]).await,
        "import" => cmd_import(&cfg, &args[2..]).await,
        "export" => cmd_export(&cfg, &args[2..]).await,
        "list" => cmd_list(&cfg).await,
        "select" => cmd_select(&cfg, &args[2..]).await,
        "seal" => cmd_seal(&cfg, &args[2..]).await,
        "open" => cmd_open(&cfg, &args[2..]).await,
        "inspect" => cmd_inspect(&cfg, &args[2..]).await,
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("cryptui {} (cryptui-envelope {})", env!("CARGO_PKG_VERSION"), cryptui_envelope::VERSION);
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cryptui=info,cryptui_keystore=info,cryptui_envelope=warn".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Json => builder.json().with_target(true).init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn print_usage() {
    eprintln!(
        r#"cryptui: signed multi-recipient file encryption (RSA-4096 + AES-128-GCM)

USAGE:
    cryptui <COMMAND> [OPTIONS]

COMMANDS:
    keygen      Generate a new key pair in the key directory
    import      Add a key file (public or private) to the key directory
    export      Write the public half of a key for sharing
    list        List known keys
    select      Set the default signer in the config file
    seal        Encrypt and sign a file for one or more recipients
    open        Decrypt a file and check its signature
    inspect     Show recipients and sender (no decryption)

Keys are selected by name or by a prefix of their base64 fingerprint.

EXAMPLES:
    cryptui keygen --name alice --comment "work laptop"
    cryptui export --key alice --out alice.pub.key
    cryptui import --in bob.pub.key
    cryptui seal --in report.pdf --to bob,alice --signer alice
    CRYPTUI_CONFIG=cryptui.json cryptui select --key alice
    cryptui open --in report.pdf.asc
    cryptui inspect report.pdf.asc

ENVIRONMENT:
    CRYPTUI_CONFIG       JSON config file
    CRYPTUI_KEY_DIR      Key directory (default: ./key)
    CRYPTUI_LOG_FORMAT   pretty | json
    RUST_LOG             Log filter

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn parse_flags(args: &[String], known: &[&str]) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    let mut flags = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let name = args[i].as_str();
        if !known.contains(&name) {
            return Err(format!("unknown option: {}", name).into());
        }
        i += 1;
        let value = args.get(i).ok_or_else(|| format!("missing value for {}", name))?;
        flags.push((name.to_string(), value.clone()));
        i += 1;
    }
    Ok(flags)
}

fn get_flag(flags: &[(String, String)], name: &str) -> Option<String> {
    flags.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn require_flag(flags: &[(String, String)], name: &str) -> Result<String, Box<dyn std::error::Error>> {
    get_flag(flags, name).ok_or_else(|| format!("missing {}", name).into())
}

async fn load_keys(cfg: &Config) -> Result<(KeyDirectory, KeyStore), Box<dyn std::error::Error>> {
    let dir = KeyDirectory::open(&cfg.key_dir).await?;
    let store = KeyStore::new();
    let report = dir.load_into(&store).await?;
    for (path, reason) in &report.skipped {
        eprintln!("warning: skipped {}: {}", path.display(), reason);
    }
    Ok((dir, store))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_keygen(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--name", "--comment"])?;
    let name = require_flag(&flags, "--name")?;
    let comment = get_flag(&flags, "--comment").unwrap_or_default();

    let (dir, store) = load_keys(cfg).await?;
    eprintln!("Generating RSA-4096 key pair (this can take a few seconds)...");
    let kp = dir.generate(&store, &name, &comment).await?;

    eprintln!("Generated key pair:");
    eprintln!("  Name:         {}", kp.name());
    eprintln!("  Fingerprint:  {}", kp.fingerprint());
    eprintln!("  File:         {} (mode 600)", dir.key_path(kp.fingerprint()).display());
    Ok(())
}

async fn cmd_import(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--in"])?;
    let input = PathBuf::from(require_flag(&flags, "--in")?);

    let bytes = zeroize::Zeroizing::new(tokio::fs::read(&input).await?);
    let (dir, store) = load_keys(cfg).await?;
    let key = dir.import(&store, &bytes).await?;

    let kind = if key.is_key_pair() { "key pair" } else { "public key" };
    eprintln!("Imported {}: {}", kind, key.label());
    eprintln!("  Fingerprint:  {}", key.fingerprint());
    Ok(())
}

async fn cmd_export(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--key", "--out"])?;
    let query = require_flag(&flags, "--key")?;

    let (dir, store) = load_keys(cfg).await?;
    let bytes = dir.export_public(&store, &query)?;

    match get_flag(&flags, "--out") {
        Some(out) => {
            tokio::fs::write(&out, &bytes).await?;
            eprintln!("Exported public key to {}", out);
        }
        None => io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

async fn cmd_list(cfg: &Config) -> CliResult {
    let (_dir, store) = load_keys(cfg).await?;
    let keys = store.public_keys();
    if keys.is_empty() {
        eprintln!("No keys in {}", cfg.key_dir.display());
        return Ok(());
    }
    for key in keys {
        let marker = if key.is_key_pair() { "pair" } else { "pub " };
        println!("{}  {}  {}", marker, key.fingerprint().short(), key.label());
    }
    Ok(())
}

async fn cmd_select(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--key"])?;
    let query = require_flag(&flags, "--key")?;
    let path = Config::file_path().ok_or("set CRYPTUI_CONFIG to the config file to update")?;

    let (_dir, store) = load_keys(cfg).await?;
    // Start from the file alone so env overrides are not persisted.
    let mut file_cfg = Config::from_file(&path)?;
    let kp = file_cfg.select_key(&store, &query)?;
    file_cfg.save(&path)?;

    eprintln!("Default signer: {}", kp.name());
    eprintln!("  Fingerprint:  {}", kp.fingerprint());
    eprintln!("  Config:       {}", path.display());
    Ok(())
}

async fn cmd_seal(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--in", "--out", "--to", "--signer"])?;
    let input = PathBuf::from(require_flag(&flags, "--in")?);
    let to = require_flag(&flags, "--to")?;
    let output = get_flag(&flags, "--out").map(PathBuf::from).unwrap_or_else(|| sealed_path(&input));
    let signer_query = get_flag(&flags, "--signer")
        .or_else(|| cfg.selected_key.clone())
        .ok_or("missing --signer (or selected_key in config)")?;

    let (_dir, store) = load_keys(cfg).await?;
    let signer = resolve_key_pair(&store, &signer_query)?;
    let recipients = to
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| resolve(&store, q))
        .collect::<Result<Vec<AsymmetricKey>, _>>()?;

    let plaintext = zeroize::Zeroizing::new(tokio::fs::read(&input).await?);
    let sealed = encode(&signer, &recipients, &plaintext)?;
    tokio::fs::write(&output, &sealed).await?;

    eprintln!("Sealed {} bytes -> {} bytes", plaintext.len(), sealed.len());
    eprintln!("  Signed by:  {}", signer.name());
    for r in &recipients {
        eprintln!("  For:        {}", r.label());
    }
    eprintln!("  Output:     {}", output.display());
    Ok(())
}

async fn cmd_open(cfg: &Config, args: &[String]) -> CliResult {
    let flags = parse_flags(args, &["--in", "--out"])?;
    let input = get_flag(&flags, "--in").map(PathBuf::from);

    let sealed = match &input {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let (_dir, store) = load_keys(cfg).await?;
    let report = decrypt_file(&sealed, &store)?;

    let (plaintext, sender, verification) = match report.outcome {
        DecryptOutcome::NoMatchingKey => return Err("no key in the key directory can open this file".into()),
        DecryptOutcome::Decrypted { plaintext, sender, verification } => (plaintext, sender, verification),
    };
    let plaintext = zeroize::Zeroizing::new(plaintext);

    let output = get_flag(&flags, "--out")
        .map(PathBuf::from)
        .or_else(|| input.as_deref().map(opened_path));
    match output {
        Some(path) => {
            tokio::fs::write(&path, &plaintext[..]).await?;
            eprintln!("Decrypted {} bytes -> {}", plaintext.len(), path.display());
        }
        None => io::stdout().write_all(&plaintext)?,
    }

    match verification {
        Verification::Verified => {
            let label = store.lookup_for_verify(&sender).map(|k| k.label()).unwrap_or_default();
            eprintln!("Good signature from {}", label);
            Ok(())
        }
        Verification::UnknownSender => {
            eprintln!("warning: signed by unknown key {}; signature not checked", sender.short());
            Ok(())
        }
        Verification::SignatureMismatch => Err("BAD SIGNATURE: contents or recipient list were altered".into()),
    }
}

async fn cmd_inspect(cfg: &Config, args: &[String]) -> CliResult {
    let input = args.first().ok_or("missing file path")?;
    let sealed = tokio::fs::read(input).await?;
    let container = Container::parse(&sealed)?;

    let (_dir, store) = load_keys(cfg).await?;
    let summary = container.summary(&store);

    println!("CryptUI Container");
    println!("=================");
    println!("{}", summary);
    println!();
    println!("Total Size:      {} bytes", sealed.len());
    println!("Payload Size:    {} bytes", container.payload().ciphertext().len());
    println!("Can Decrypt:     {}", if summary.decryptable { "yes" } else { "no" });
    Ok(())
}
