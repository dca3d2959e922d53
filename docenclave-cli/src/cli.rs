//! CLI argument parsing for docenclave.
//!
//! This module defines the command-line interface with `clap`. It is also
//! compiled by the build script to render the man page, so it only depends
//! on `clap`, `std` and the library.

use clap::{Args, Parser, Subcommand};
use docenclave::config::Config;
use docenclave::error::{DocEnclaveError, Result};
use docenclave::identity::Identity;
use docenclave::merge::MERGED_FILE_NAME;
use std::path::PathBuf;

/// Default directory for on-device state.
pub const DEFAULT_STORAGE_DIR: &str = ".docenclave";

/// Tiered document tools with usage statistics.
///
/// Merges PDF files within the limits of your tier and keeps global usage
/// counters. Without a reachable remote store the counters are kept on this
/// device.
#[derive(Parser, Debug)]
#[command(name = "docenclave")]
#[command(version)]
#[command(about = "Tiered document tools with usage statistics", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Verbose output - show details and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory holding cached statistics
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "DOCENCLAVE_STORAGE_DIR",
        default_value = DEFAULT_STORAGE_DIR
    )]
    pub storage_dir: PathBuf,

    /// Email address recognized as the administrator
    #[arg(long, global = true, value_name = "EMAIL", env = "DOCENCLAVE_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Sign in with this email address
    ///
    /// Without it every command runs as an anonymous visitor.
    #[arg(long, global = true, value_name = "EMAIL", env = "DOCENCLAVE_EMAIL")]
    pub email: Option<String>,

    /// Display name of the signed-in account
    #[arg(long, global = true, value_name = "NAME", requires = "email")]
    pub name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Combine PDF files into one document
    ///
    /// Examples:
    ///   docenclave --email me@example.com merge a.pdf b.pdf -o out.pdf
    ///   docenclave --email me@example.com merge 'chapter*.pdf'
    Merge(MergeArgs),

    /// Show global usage statistics
    Stats {
        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tool catalog and what your tier can use
    Tools,

    /// Show the limits of your tier
    Limits,
}

/// Arguments of the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input PDF files or glob patterns, in merge order
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<String>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE", default_value = MERGED_FILE_NAME)]
    pub output: PathBuf,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    pub force: bool,
}

impl Cli {
    /// Build the library configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocEnclaveError::InvalidConfig`] if the sign-in email or the
    /// resulting configuration is invalid.
    pub fn to_config(&self) -> Result<Config> {
        if let Some(email) = &self.email
            && !looks_like_email(email)
        {
            return Err(DocEnclaveError::invalid_config(format!(
                "'{email}' is not an email address"
            )));
        }

        let config = match &self.admin_email {
            Some(email) => Config::default().with_admin_email(email),
            None => Config::default(),
        };
        config
            .validate()
            .map_err(|err| DocEnclaveError::invalid_config(err.to_string()))?;
        Ok(config)
    }

    /// Account to sign in with, if an email was given.
    pub fn account(&self) -> Option<Identity> {
        let email = self.email.as_deref()?.trim();
        let identity = Identity::authenticated(format!("local:{}", email.to_lowercase()), email);
        Some(match &self.name {
            Some(name) => identity.with_display_name(name),
            None => identity,
        })
    }
}

impl MergeArgs {
    /// Validate the merge arguments.
    pub fn validate(&self) -> Result<()> {
        let is_pdf = self
            .output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(DocEnclaveError::invalid_config(format!(
                "output must be a .pdf file: {}",
                self.output.display()
            )));
        }
        Ok(())
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.trim().split_once('@') {
        Some((user, domain)) => !user.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
