use std::io;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, middleware, web};
use clap::Parser;
use stevedore::registry::{self, Storage, UploadLimits};

#[derive(Parser)]
struct Args {
    /// Storage root directory
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum blob size in bytes
    #[arg(long, default_value_t = 1 << 30)]
    max_blob_size: usize,

    /// Maximum manifest size in bytes
    #[arg(long, default_value_t = 4 << 20)]
    max_manifest_size: usize,

    /// Client request timeout in seconds
    #[arg(long, default_value = "600")]
    request_timeout: u64,

    /// Client disconnect timeout in seconds
    #[arg(long, default_value = "60")]
    disconnect_timeout: u64,

    /// Keep alive timeout in seconds
    #[arg(long, default_value = "120")]
    keep_alive: u64,

    /// Number of worker threads
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Server hostname
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,
}

impl Args {
    fn upload_limits(&self) -> Result<UploadLimits, &'static str> {
        if self.max_blob_size == 0 {
            return Err("max-blob-size cannot be zero");
        }

        if self.max_manifest_size == 0 {
            return Err("max-manifest-size cannot be zero");
        }

        if self.max_manifest_size > self.max_blob_size {
            return Err("max-manifest-size cannot be larger than max-blob-size");
        }

        Ok(UploadLimits {
            max_blob_size: self.max_blob_size,
            max_manifest_size: self.max_manifest_size,
        })
    }
}

/// Info-level logging by default; any non-empty DEBUG environment variable
/// switches to debug level and adds source file:line to every line.
fn init_logging() {
    let mut builder = env_logger::Builder::from_default_env();

    let debug = std::env::var("DEBUG").is_ok_and(|v| !v.is_empty());
    if debug {
        builder
            .filter_level(log::LevelFilter::Debug)
            .format_file(true)
            .format_line_number(true);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    builder.init();
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_logging();

    let args: &Args = Box::leak(Box::new(Args::parse()));

    std::fs::create_dir_all(&args.data_dir)?;
    log::info!("storage root: {}", args.data_dir.display());

    HttpServer::new(|| {
        let limits = args.upload_limits().expect("invalid upload limits");

        App::new()
            .wrap(Logger::new(r#"%a "%r" %s %b %T"#))
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("Docker-Distribution-API-Version", "registry/2.0"))
                    .add(("Cache-Control", "no-cache")),
            )
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::PayloadConfig::new(limits.max_blob_size))
            .app_data(web::Data::new(Storage::new(&args.data_dir)))
            .app_data(web::Data::new(limits))
            .configure(registry::configure_routes)
    })
    .client_request_timeout(Duration::from_secs(args.request_timeout))
    .client_disconnect_timeout(Duration::from_secs(args.disconnect_timeout))
    .keep_alive(Duration::from_secs(args.keep_alive))
    .server_hostname(&args.hostname)
    .workers(args.workers)
    .bind(&args.bind)?
    .run()
    .await
}
