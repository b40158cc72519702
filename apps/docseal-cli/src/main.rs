//! DocSeal command line
//!
//! - `seal`: sign, stamp and place signatures on a PDF, storing the artifacts
//! - `lookup`: resolve a document id to its metadata and stored documents
//! - `keygen`: create the signing key if it does not exist yet

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docseal_core::{lookup, FsStore, SealConfig, SealRequest, SealService};
use shared_crypto::PemKeyProvider;
use shared_types::{FontStyle, Signatory, SignatoryRole};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "docseal")]
#[command(version, about = "Seal PDF documents with a verifiable signature stamp")]
struct Cli {
    /// TOML configuration file; DOCSEAL_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seal a PDF
    Seal(SealArgs),

    /// Look up a sealed document by id
    Lookup {
        /// Document id, as found in the verification link
        id: String,

        /// Write the sealed document here
        #[arg(long)]
        sealed: Option<PathBuf>,

        /// Write the original upload here
        #[arg(long)]
        original: Option<PathBuf>,
    },

    /// Generate the signing key if it is missing
    Keygen {
        /// Modulus size; defaults to signing.key_bits
        #[arg(long)]
        bits: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct SealArgs {
    /// PDF to seal
    input: PathBuf,

    /// Where to write the sealed PDF
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    contratante: Option<String>,

    #[arg(long)]
    contratada: Option<String>,

    /// PNG or JPEG drawn instead of the contratante name
    #[arg(long)]
    contratante_image: Option<PathBuf>,

    /// PNG or JPEG drawn instead of the contratada name
    #[arg(long)]
    contratada_image: Option<PathBuf>,

    /// Name font: padrao, manuscrita, serif or cursiva_simples
    #[arg(long, default_value = "padrao")]
    font: String,

    #[arg(long)]
    email_contratante: Option<String>,

    #[arg(long)]
    email_contratada: Option<String>,
}

impl SealArgs {
    /// One signatory per role that was given a name or an image
    fn signatories(&self) -> Result<Vec<Signatory>> {
        let roles = [
            (
                SignatoryRole::Contratante,
                &self.contratante,
                &self.contratante_image,
                &self.email_contratante,
            ),
            (
                SignatoryRole::Contratada,
                &self.contratada,
                &self.contratada_image,
                &self.email_contratada,
            ),
        ];

        let mut signatories = Vec::new();
        for (role, name, image, email) in roles {
            if name.is_none() && image.is_none() {
                continue;
            }
            let image = match image {
                Some(path) => Some(read(path)?),
                None => None,
            };
            signatories.push(Signatory {
                name: name.clone().unwrap_or_default(),
                role,
                email: email.clone(),
                image,
            });
        }
        Ok(signatories)
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docseal=info".parse()?)
                .add_directive("shared_crypto=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SealConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Seal(args) => seal(&config, args).await,
        Command::Lookup {
            id,
            sealed,
            original,
        } => lookup_document(&config, &id, sealed.as_deref(), original.as_deref()),
        Command::Keygen { bits } => keygen(&config, bits.unwrap_or(config.signing.key_bits)),
    }
}

async fn seal(config: &SealConfig, args: SealArgs) -> Result<()> {
    let service = SealService::from_config(config)?;

    let source_identifier = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());
    let mut request = SealRequest::new(read(&args.input)?, source_identifier)
        .with_font(FontStyle::parse(&args.font));
    for signatory in args.signatories()? {
        request = request.with_signatory(signatory);
    }

    let (sealed, persistence) = service.seal(request).await?;
    write(&args.output, &sealed.sealed_bytes)?;
    info!(
        "Sealed document written to {} ({:?})",
        args.output.display(),
        sealed.placement
    );
    for stage in &sealed.degraded {
        tracing::warn!("Degraded: {}", stage);
    }

    if !persistence.wait().await {
        tracing::warn!(
            "Artifacts were not stored under {}; lookup will not find this document",
            config.storage.root.display()
        );
    }

    println!("{}", sealed.document_id);
    println!("{}", sealed.verification_url);
    Ok(())
}

fn lookup_document(
    config: &SealConfig,
    id: &str,
    sealed_path: Option<&Path>,
    original_path: Option<&Path>,
) -> Result<()> {
    let store = FsStore::open(&config.storage.root)?;
    let Some(found) = lookup(&store, id)? else {
        anyhow::bail!("No sealed document with id {}", id);
    };

    println!("{}", serde_json::to_string_pretty(&found.metadata)?);

    for (path, bytes, what) in [
        (sealed_path, &found.sealed, "sealed"),
        (original_path, &found.original, "original"),
    ] {
        let Some(path) = path else { continue };
        match bytes {
            Some(bytes) => {
                write(path, bytes)?;
                info!("Wrote {} document to {}", what, path.display());
            }
            None => tracing::warn!("No {} document stored for {}", what, found.document_id),
        }
    }
    Ok(())
}

fn keygen(config: &SealConfig, bits: usize) -> Result<()> {
    anyhow::ensure!(bits >= 1024, "Key size must be at least 1024 bits");
    let provider = PemKeyProvider::new(&config.signing.private_key_path);
    if provider.ensure(bits)? {
        info!("Wrote {}-bit signing key to {}", bits, provider.path().display());
    } else {
        info!("Signing key already present at {}", provider.path().display());
    }
    Ok(())
}
