use std::process::ExitCode;

use async_trait::async_trait;
use clap::{ArgAction, Parser, ValueEnum};
use reqwest::Url;
use tracing::{error, warn, Level};
use tracing_subscriber::EnvFilter;

use vault_assume_role::browser::open_browser;
use vault_assume_role::config::{self, Config};
use vault_assume_role::http::HttpClient;
use vault_assume_role::login::{
    EnvLogin, LoginCredentials, PromptLoginReader, ReadLoginCredentials, StaticLoginReader,
};
use vault_assume_role::run::{Command, Outcome, VaultAssumeRole, USAGE_EXIT_CODE};
use vault_assume_role::select::skim::SkimSelector;
use vault_assume_role::select::{SelectItem, StaticSelector};
use vault_assume_role::store::IniCredentialsStore;
use vault_assume_role::token_cache::{FileTokenCache, NoTokenCache, TokenCache};
use vault_assume_role_schema::token::AuthToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CommandName {
    /// Write temporary credentials to the AWS shared credentials file
    Keys,
    /// Open the AWS console with temporary credentials
    Console,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(value_enum)]
    command: CommandName,

    /// Base URL of the Vault server
    vault_url: String,

    /// Prefix of the AWS secrets-engine mounts
    mount_prefix: Option<String>,

    /// Issuer shown on the AWS sign-in page (console only)
    issuer: Option<String>,

    /// AWS region of the console (console only)
    region: Option<String>,

    /// Account to use instead of prompting
    account: Option<String>,

    /// Role to use instead of prompting
    role: Option<String>,

    /// Take the login from VAULT_USERNAME and VAULT_PASSWORD without prompting
    #[arg(long)]
    no_pass_prompt: bool,

    /// Print the console URL instead of opening a browser
    #[arg(long)]
    url_only: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(USAGE_EXIT_CODE);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(USAGE_EXIT_CODE)
        }
    }
}

/// `--help` and `--version` also surface as clap errors but are not failures.
fn usage_exit_code(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        USAGE_EXIT_CODE
    } else {
        0
    }
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over the verbosity flag
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

enum Selector {
    Skim(SkimSelector),
    Static(StaticSelector),
}

impl SelectItem for Selector {
    fn select_item(&self, prompt: &str, items: &[String]) -> anyhow::Result<Option<String>> {
        use Selector::*;
        match self {
            Skim(s) => s.select_item(prompt, items),
            Static(s) => s.select_item(prompt, items),
        }
    }

    fn preselected(&self) -> Option<&str> {
        use Selector::*;
        match self {
            Skim(s) => s.preselected(),
            Static(s) => s.preselected(),
        }
    }
}

fn selector_from(name: Option<&String>) -> Selector {
    if let Some(name) = name {
        Selector::Static(StaticSelector::from(name.as_str()))
    } else {
        Selector::Skim(SkimSelector)
    }
}

enum LoginReader {
    Prompt(PromptLoginReader),
    Static(StaticLoginReader),
}

#[async_trait]
impl ReadLoginCredentials for LoginReader {
    async fn read_login_credentials(&self) -> anyhow::Result<LoginCredentials> {
        use LoginReader::*;
        match self {
            Prompt(r) => r.read_login_credentials().await,
            Static(r) => r.read_login_credentials().await,
        }
    }
}

fn login_reader_from(args: &Args, env: EnvLogin) -> LoginReader {
    match (args.no_pass_prompt, env.complete()) {
        (true, Some(credentials)) => LoginReader::Static(StaticLoginReader::from(credentials)),
        (true, None) => {
            warn!("--no-pass-prompt needs VAULT_USERNAME and VAULT_PASSWORD, prompting instead");
            LoginReader::Prompt(PromptLoginReader::from(env))
        }
        (false, _) => LoginReader::Prompt(PromptLoginReader::from(env)),
    }
}

enum Cache {
    File(FileTokenCache),
    Disabled(NoTokenCache),
}

#[async_trait]
impl TokenCache for Cache {
    async fn load(&self) -> Option<AuthToken> {
        use Cache::*;
        match self {
            File(c) => c.load().await,
            Disabled(c) => c.load().await,
        }
    }

    async fn save(&self, token: &AuthToken) -> anyhow::Result<()> {
        use Cache::*;
        match self {
            File(c) => c.save(token).await,
            Disabled(c) => c.save(token).await,
        }
    }
}

fn cache() -> Cache {
    if let Some(path) = config::token_cache_path() {
        Cache::File(FileTokenCache::new(path))
    } else {
        warn!("no home directory found, the vault token will not be cached");
        Cache::Disabled(NoTokenCache)
    }
}

fn command_from(args: &Args) -> anyhow::Result<Command> {
    match args.command {
        CommandName::Keys => Ok(Command::Keys),
        CommandName::Console => match (args.issuer.as_ref(), args.region.as_ref()) {
            (Some(issuer), Some(region)) => Ok(Command::Console {
                issuer: issuer.to_string(),
                region: region.to_string(),
            }),
            _ => Err(anyhow::anyhow!("console requires an issuer and a region")),
        },
    }
}

fn config_from(args: &Args) -> anyhow::Result<Config> {
    let vault_url = args.vault_url.parse::<Url>()?;
    let mut config = Config::new(vault_url)?;
    if let Some(mount_prefix) = args.mount_prefix.as_ref() {
        config = config.with_mount_prefix(mount_prefix);
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let command = command_from(&args)?;
    let config = config_from(&args)?;

    let credentials_path = config::aws_credentials_path()
        .ok_or_else(|| anyhow::anyhow!("cannot locate the AWS shared credentials file"))?;

    let client = HttpClient::new(config.timeout)?;
    let pipeline = VaultAssumeRole::new(
        config,
        client,
        login_reader_from(&args, EnvLogin::from_env()),
        cache(),
        selector_from(args.account.as_ref()),
        selector_from(args.role.as_ref()),
        IniCredentialsStore::new(credentials_path),
    );

    let outcome = match pipeline.run(&command).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            error!("{}", failure);
            return Ok(ExitCode::from(failure.exit_code()));
        }
    };

    if let Outcome::Console(url) = outcome {
        if args.url_only {
            println!("{}", url);
        } else if let Err(e) = open_browser(url.as_str()) {
            warn!("could not open a browser: {:#}", e);
            println!("{}", url);
        }
    }

    Ok(ExitCode::SUCCESS)
}
