mod commands;
mod context;

use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitebuilder")]
#[command(version, about = "Build, preview and publish component-based websites", long_about = None)]
struct Cli {
    /// Config file (default: ~/.sitebuilder/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Create a site from a template
    Init {
        /// Site domain, e.g. example.com
        site: String,

        /// Template id (see `sitebuilder catalog templates`)
        #[arg(short, long, default_value = "default")]
        template: String,

        /// Color scheme id (defaults to the template's scheme)
        #[arg(short, long)]
        scheme: Option<String>,

        /// Display name of the site
        #[arg(short, long)]
        name: String,
    },

    /// Manage the pages of a site
    Pages {
        /// Site domain
        site: String,

        #[command(subcommand)]
        command: PagesCommand,
    },

    /// Apply a JSON page update (title, slug, meta_description, slots)
    Save {
        /// Site domain
        site: String,

        /// Page id
        page: String,

        /// JSON file with the update
        file: PathBuf,
    },

    /// Apply a JSON settings update (template, colors, navigation, ...)
    Settings {
        /// Site domain
        site: String,

        /// JSON file with the update
        file: PathBuf,
    },

    /// Render a page to HTML without publishing it
    Render {
        /// Site domain
        site: String,

        /// Page id
        page: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Publish one page, or every page of the site
    Publish {
        /// Site domain
        site: String,

        /// Page id (omit to publish the whole site)
        page: Option<String>,
    },

    /// Upload an image to the site's assets
    Upload {
        /// Site domain
        site: String,

        /// Image file
        file: PathBuf,
    },

    /// List uploaded assets, newest first
    Assets {
        /// Site domain
        site: String,
    },

    /// Show the component, template and color scheme catalogs
    Catalog {
        #[arg(value_enum, default_value = "all")]
        section: CatalogSection,
    },

    /// Preview a site locally with live reload
    Preview {
        /// Site domain
        site: String,

        /// Port to serve on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Run the JSON editing API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to serve on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
enum PagesCommand {
    /// List pages in site order
    List,

    /// Print a page document as JSON
    Show {
        /// Page id
        page: String,
    },

    /// Add a page
    New {
        /// Page title
        title: String,

        /// Page id and slug (derived from the title when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Meta description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Start empty instead of with the template's components
        #[arg(long)]
        blank: bool,
    },

    /// Duplicate a page
    Copy {
        /// Page to copy
        source: String,

        /// Title of the copy
        title: String,

        /// Page id and slug of the copy
        #[arg(long)]
        id: Option<String>,
    },

    /// Delete a page and its published file
    Delete {
        /// Page id
        page: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Report validation issues and orphaned slots of a page
    Check {
        /// Page id
        page: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogSection {
    All,
    Components,
    Templates,
    Schemes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "sitebuilder", &mut io::stdout());
        return Ok(());
    }

    let ctx = context::load(cli.config).await?;

    match cli.command {
        Command::Init {
            site,
            template,
            scheme,
            name,
        } => commands::site::init(&ctx, &site, template, scheme, name).await,
        Command::Pages { site, command } => match command {
            PagesCommand::List => commands::pages::list(&ctx, &site).await,
            PagesCommand::Show { page } => commands::pages::show(&ctx, &site, &page).await,
            PagesCommand::New {
                title,
                id,
                description,
                blank,
            } => commands::pages::create(&ctx, &site, title, id, description, blank).await,
            PagesCommand::Copy { source, title, id } => {
                commands::pages::copy(&ctx, &site, &source, title, id).await
            }
            PagesCommand::Delete { page, force } => {
                commands::pages::delete(&ctx, &site, &page, force).await
            }
            PagesCommand::Check { page } => commands::pages::check(&ctx, &site, &page).await,
        },
        Command::Save { site, page, file } => commands::pages::save(&ctx, &site, &page, file).await,
        Command::Settings { site, file } => commands::site::settings(&ctx, &site, file).await,
        Command::Render { site, page, output } => {
            commands::publish::render(&ctx, &site, &page, output).await
        }
        Command::Publish { site, page } => commands::publish::publish(&ctx, &site, page).await,
        Command::Upload { site, file } => commands::assets::upload(&ctx, &site, file).await,
        Command::Assets { site } => commands::assets::list(&ctx, &site).await,
        Command::Catalog { section } => commands::catalog::show(&ctx, section),
        Command::Preview { site, port } => commands::preview::run(ctx, site, port).await,
        Command::Serve { host, port } => commands::serve::run(ctx, &host, port).await,
        Command::Completions { .. } => Ok(()),
    }
}
