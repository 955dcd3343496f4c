//! CLI route: single route table and run context. Dispatches to the client and presentation.

use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_toml, format_query_listing_json, format_query_listing_text, format_query_names,
    format_validation, QueryListing,
};
use crate::client::hooks::describe_response;
use crate::client::{Client, Hooks};
use crate::config::{ConfigLoader, ObjsyncConfig};
use crate::error::ClientError;
use crate::object::BusinessObject;
use crate::payload::Response;
use crate::query::Query;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hooks for an interactive terminal: retry prompts become a selection menu.
pub struct TerminalHooks;

#[async_trait]
impl Hooks for TerminalHooks {
    fn on_response(&self, method: &str, response: &Response) {
        debug!("{}", describe_response(method, response));
    }

    async fn on_retry_action(
        &self,
        title: Option<&str>,
        message: Option<&str>,
        options: &[String],
        _object: Option<&Arc<BusinessObject>>,
    ) -> i64 {
        let prompt = match (title, message) {
            (Some(title), Some(message)) => format!("{}\n{}", title, message),
            (Some(text), None) | (None, Some(text)) => text.to_string(),
            (None, None) => "Choose an option".to_string(),
        };
        let items = options.to_vec();

        let choice = tokio::task::spawn_blocking(move || {
            dialoguer::Select::new()
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        match choice {
            Ok(Ok(Some(index))) => i64::try_from(index).unwrap_or(-1),
            Ok(Ok(None)) => -1,
            Ok(Err(e)) => {
                warn!(error = %e, "Retry prompt failed");
                -1
            }
            Err(e) => {
                warn!(error = %e, "Retry prompt task failed");
                -1
            }
        }
    }
}

/// Runtime context for CLI execution: the loaded configuration and where it came from.
pub struct RunContext {
    config: ObjsyncConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ClientError> {
        let config = ConfigLoader::load_with(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &ObjsyncConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ClientError> {
        match command {
            Commands::Connect {
                uri,
                user,
                password,
                query,
                rows,
                format,
            } => {
                self.handle_connect(
                    uri.as_deref(),
                    user.as_deref(),
                    password.as_deref(),
                    query.as_deref(),
                    *rows,
                    format,
                )
                .await
            }
            Commands::Config { command } => self.handle_config(command),
        }
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, ClientError> {
        match command {
            ConfigCommands::Show => {
                let mut out = String::new();
                if let Some(path) = &self.config_path {
                    out.push_str(&format!("# loaded from {}\n", path.display()));
                }
                out.push_str(&format_config_toml(&self.config));
                Ok(out)
            }
            ConfigCommands::Validate => {
                let errors = self.config.service.validate().err().unwrap_or_default();
                Ok(format_validation(&errors))
            }
        }
    }

    async fn handle_connect(
        &self,
        uri: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
        query: Option<&str>,
        rows: usize,
        format: &str,
    ) -> Result<String, ClientError> {
        let mut service = self.config.service.clone();
        if let Some(uri) = uri {
            service.uri = uri.to_string();
        }
        service.validate().map_err(|errors| ClientError::Config(errors.join("\n")))?;

        let client = Client::connect(service)?.with_hooks(Arc::new(TerminalHooks));
        client.get_client_data().await;

        let application = match user {
            Some(user) => client.sign_in_using_credentials(user, password).await?,
            None => client.sign_in_using_default_credentials().await?,
        };
        info!(user = ?client.user(), "Signed in");

        let query = match query {
            Some(name) => match application.query(name) {
                Some(query) => Arc::clone(query),
                None => client.get_query(name, None).await?,
            },
            None => application.queries().first().cloned().ok_or_else(|| {
                ClientError::InvalidArgument("the application exposes no queries".to_string())
            })?,
        };

        let listing = run_listing(&client, &query, rows).await?;
        let mut out = String::new();
        if format == "json" {
            out.push_str(&format_query_listing_json(&listing));
        } else {
            let names: Vec<(String, Option<String>)> = application
                .queries()
                .iter()
                .map(|q| (q.name().to_string(), q.label()))
                .collect();
            if !names.is_empty() {
                out.push_str(&format_query_names(&names));
                out.push('\n');
            }
            out.push_str(&format_query_listing_text(&listing));
        }

        client.sign_out().await;
        Ok(out)
    }
}

async fn run_listing(client: &Client, query: &Query, rows: usize) -> Result<QueryListing, ClientError> {
    if !query.ensure_searched(client).await {
        let message = query
            .notification()
            .map(|n| n.message)
            .unwrap_or_else(|| format!("query {} could not be searched", query.name()));
        return Err(ClientError::Protocol(message));
    }
    query.ensure_range(client, 0, rows).await;
    Ok(QueryListing::from_query(query, rows))
}
