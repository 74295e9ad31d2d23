use super::load_config;
use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use sitectl_core::command::{self, Action};
use sitectl_core::config::{Config, Secrets};
use sitectl_core::deploy::ThemeDeployer;
use sitectl_core::dispatch::{Dispatcher, Outcome};
use sitectl_core::history::{self, CommandSource, HistoryEntry};
use sitectl_core::intent::IntentClient;
use sitectl_core::theme::ThemeWorkspace;
use sitectl_core::transport::SshConnector;
use sitectl_core::wp::WpClient;
use std::path::{Path, PathBuf};

#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    /// Interpret the command with the configured language model
    #[arg(long)]
    pub ai: bool,

    /// Show the parsed action without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Reject AI interpretations below this confidence (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    pub min_confidence: f64,
}

/// Executes commands against one site, keeping the SSH session between
/// commands.
pub struct Runner {
    root: PathBuf,
    config: Config,
    secrets: Secrets,
    options: RunOptions,
    wp: WpClient,
    deployer: ThemeDeployer<SshConnector>,
    intents: Option<IntentClient>,
}

impl Runner {
    pub fn new(root: &Path, options: RunOptions) -> anyhow::Result<Self> {
        let config = load_config(root)?;
        let secrets = Secrets::from_env();
        let wp = WpClient::from_config(&config, &secrets).context("failed to build REST client")?;
        let deployer = ThemeDeployer::new(
            config.theme_dir(root),
            config.sftp.remote_path.clone(),
            SshConnector::new(config.sftp.clone(), secrets.clone()),
        );
        let intents = if options.ai {
            Some(IntentClient::from_config(&config.ai, &secrets)?)
        } else {
            None
        };
        Ok(Self {
            root: root.to_path_buf(),
            config,
            secrets,
            options,
            wp,
            deployer,
            intents,
        })
    }

    fn source(&self) -> CommandSource {
        if self.intents.is_some() {
            CommandSource::Ai
        } else {
            CommandSource::Text
        }
    }

    fn resolve(&self, text: &str) -> anyhow::Result<Action> {
        let Some(client) = &self.intents else {
            return Ok(command::parse(text)?);
        };
        let intent = client.interpret(text)?;
        tracing::info!(
            action = %intent.action,
            confidence = intent.confidence,
            "{}",
            intent.explanation
        );
        intent.ensure_confidence(self.options.min_confidence)?;
        Ok(intent.into_action()?)
    }

    fn dispatch(&mut self, text: &str, action: &Action) -> anyhow::Result<Outcome> {
        let mut dispatcher = Dispatcher::new(
            &self.wp,
            ThemeWorkspace::new(self.config.theme_dir(&self.root)),
            &mut self.deployer,
            self.config.theme.deploy_files.clone(),
        )
        .with_webhook_secret(self.secrets.webhook_secret.clone());
        Ok(dispatcher.execute_for(text, action)?)
    }

    fn record(&self, entry: &HistoryEntry) {
        if let Err(e) = history::append(&self.root, entry) {
            tracing::warn!("could not record history: {e}");
        }
    }

    /// Parse (or interpret) and execute one command, recording the result.
    pub fn handle(&mut self, text: &str, json: bool) -> anyhow::Result<()> {
        let source = self.source();
        let action = match self.resolve(text) {
            Ok(a) => a,
            Err(e) => {
                let error = self.secrets.redact(&format!("{e:#}"));
                if !self.options.dry_run {
                    self.record(&HistoryEntry::failed(text, source, None, &error));
                }
                return Err(anyhow::anyhow!(error));
            }
        };

        if self.options.dry_run {
            if json {
                print_json(&action)?;
            } else {
                println!("Would execute: {}", action.name());
                println!("{}", serde_json::to_string_pretty(&action)?);
            }
            return Ok(());
        }

        match self.dispatch(text, &action) {
            Ok(outcome) => {
                self.record(&HistoryEntry::succeeded(
                    text,
                    source,
                    action.name(),
                    &outcome.message,
                ));
                if json {
                    print_json(&outcome)?;
                } else {
                    println!("{}", outcome.message);
                }
                Ok(())
            }
            Err(e) => {
                let error = self.secrets.redact(&format!("{e:#}"));
                self.record(&HistoryEntry::failed(text, source, Some(action.name()), &error));
                Err(anyhow::anyhow!("{} failed: {error}", action.name()))
            }
        }
    }
}

pub fn run(root: &Path, text: &str, options: &RunOptions, json: bool) -> anyhow::Result<()> {
    let mut runner = Runner::new(root, options.clone())?;
    runner.handle(text.trim(), json)
}
