//! docenclave - tiered document tools with usage statistics.

mod cli;
mod inputs;

use clap::Parser;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, MergeArgs};
use docenclave::error::{DocEnclaveError, Result};
use docenclave::identity::LocalIdentityProvider;
use docenclave::merge::FileDescriptor;
use docenclave::output::{
    OutputFormatter, display_catalog, display_dashboard, display_merge_result, display_profile,
};
use docenclave::utils::format_file_size;
use docenclave::{AppServices, Backend};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err.user_message());
        process::exit(err.exit_code());
    }
}

/// Log to stderr. `RUST_LOG` overrides the level picked from the flags.
fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "docenclave=debug"
    } else if cli.quiet {
        "error"
    } else {
        "docenclave=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic.
async fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config()?;
    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);

    let mut provider = LocalIdentityProvider::new();
    if let Some(account) = cli.account() {
        provider = provider.with_account(account);
    }

    let app = AppServices::start(config, Backend::offline(&cli.storage_dir, provider)).await?;
    let result = dispatch(&app, &formatter, &cli).await;
    app.shutdown().await?;
    result
}

async fn dispatch(app: &AppServices, formatter: &OutputFormatter, cli: &Cli) -> Result<()> {
    if cli.email.is_some() {
        let identity = app.auth().sign_in_interactive().await?;
        formatter.debug(&format!("signed in as {}", identity.label()));
    }

    match &cli.command {
        Command::Merge(args) => merge(app, formatter, args).await,
        Command::Stats { json } => {
            let dashboard = app.dashboard();
            if *json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                display_dashboard(formatter, &dashboard);
            }
            Ok(())
        }
        Command::Tools => {
            display_catalog(formatter, app.auth().tier());
            Ok(())
        }
        Command::Limits => {
            let who = app
                .auth()
                .current_identity()
                .map(|identity| identity.label().to_string())
                .unwrap_or_else(|| "Guest".to_string());
            formatter.info(&format!("{who} ({} tier)", app.auth().tier()));
            display_profile(formatter, app.auth().tier());
            Ok(())
        }
    }
}

async fn merge(app: &AppServices, formatter: &OutputFormatter, args: &MergeArgs) -> Result<()> {
    args.validate()?;
    let exists = tokio::fs::try_exists(&args.output)
        .await
        .map_err(|err| DocEnclaveError::file_access(&args.output, err))?;
    if !args.force && exists {
        return Err(DocEnclaveError::OutputExists {
            path: args.output.clone(),
        });
    }

    let paths = inputs::expand_inputs(&args.inputs)?;
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(FileDescriptor::from_path(path).await?);
    }

    let mut tool = app.merge_tool();
    tool.handle_files(files)?;

    formatter.info("Merging documents...");
    for (index, file) in tool.files().iter().enumerate() {
        formatter.list_item(index + 1, &format!("{} ({})", file.name, format_file_size(file.size)));
    }

    let merged = tool.merge_pdfs().await?;
    write_output(&args.output, &merged.bytes).await?;
    display_merge_result(formatter, &merged, &args.output.display().to_string());
    Ok(())
}

/// Write the merged document to `path`.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| DocEnclaveError::failed_to_write(path, err))
}
