use anyhow::Context;
use clap::{Parser, Subcommand};
use cloudfiles::{
    CloudFilesClient, Config,
    domain::object_name::{decode_utf7, encode_uri_component, encode_utf7},
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Cloud Files container client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a local file (with CORS headers) and remove it afterwards
    UploadFile { remote: String, local: PathBuf },
    /// Upload a string as the object body
    UploadString {
        remote: String,
        content: String,
        #[arg(long, help = "Attach CORS headers to the object")]
        cors: bool,
    },
    /// Print an object's body
    Get { name: String },
    /// Delete an object
    Delete { name: String },
    /// Print the CDN URL of an object
    CdnUrl {
        name: String,
        #[arg(long, help = "Print the plain HTTP URL instead of HTTPS")]
        http: bool,
    },
    /// Show how an object name is sent to the service, without connecting
    EncodeName {
        name: String,
        #[arg(long, help = "Decode a UTF-7 name instead")]
        decode: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,cloudfiles=debug"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::EncodeName { name, decode } => {
            if decode {
                println!("{}", decode_utf7(&name)?);
            } else {
                println!("path: {}", encode_utf7(&name));
                println!("cdn:  {}", encode_uri_component(&name));
            }
        }
        Command::UploadFile { remote, local } => {
            let response = connect()
                .await?
                .try_upload_from_local_file(&remote, &local)
                .await
                .with_context(|| format!("uploading {}", local.display()))?;
            tracing::info!(status = %response.status, remote = %remote, "uploaded");
        }
        Command::UploadString {
            remote,
            content,
            cors,
        } => {
            let response = connect()
                .await?
                .try_upload_from_string(&remote, &content, cors)
                .await
                .with_context(|| format!("uploading {}", remote))?;
            tracing::info!(status = %response.status, remote = %remote, "uploaded");
        }
        Command::Get { name } => {
            let body = connect()
                .await?
                .try_get_object_as_string(&name)
                .await
                .with_context(|| format!("fetching {}", name))?;
            print!("{}", body);
        }
        Command::Delete { name } => {
            let response = connect()
                .await?
                .try_delete_object(&name)
                .await
                .with_context(|| format!("deleting {}", name))?;
            tracing::info!(status = %response.status, name = %name, "deleted");
        }
        Command::CdnUrl { name, http } => {
            let client = connect().await?;
            let url = if http {
                client.http_url_for_object(&name).await
            } else {
                client.https_url_for_object(&name).await
            };
            match url {
                Some(url) => println!("{}", url),
                None => anyhow::bail!("container {} is not CDN-enabled", client.container()),
            }
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<CloudFilesClient> {
    let config = Config::from_env()?;
    CloudFilesClient::from_config(&config)
        .await?
        .into_result()
        .with_context(|| format!("authentication for container {} failed", config.container))
}
