//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_check_result, format_event_line, format_state_json, format_states,
};
use crate::config::{ConfigLoader, ShellConfig};
use crate::content::memory::{MemoryContent, PageContent};
use crate::controller::ShellController;
use crate::error::{ApiError, StorageError};
use crate::ipc::{dispatch, ViewCommand};
use crate::relay::{ShellEvent, Subscription};
use crate::security::{Classification, DecisionId, InterstitialResponse, SecurityPolicy};
use crate::store::{MemoryStateStore, SledStateStore, StateStore};
use crate::types::{FlowId, ViewKey};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace, loaded configuration and
/// the lazily opened state store.
pub struct RunContext {
    config: ShellConfig,
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    store: Mutex<Option<Arc<SledStateStore>>>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            config,
            workspace_root,
            config_path,
            store: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::States { format, flow } => self.handle_states(format, flow.as_deref()),
            Commands::Show { flow, page } => self.handle_show(flow, page),
            Commands::Check { url } => Ok(format_check_result(
                url,
                &SecurityPolicy::from_config(&self.config.security),
            )),
            Commands::Run {
                script,
                pages,
                interactive,
                persist,
            } => self.handle_run(script, pages.as_deref(), *interactive, *persist),
            Commands::Config => self.handle_config(),
        }
    }

    /// Sled allows one open handle per path, so the store is opened once
    /// and shared by every command of this context.
    fn open_store(&self) -> Result<Arc<SledStateStore>, ApiError> {
        let mut slot = self.store.lock();
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }
        let path = self.config.storage.resolve_state_path(&self.workspace_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }
        debug!(path = %path.display(), "Opening state store");
        let store = Arc::new(SledStateStore::new(&path)?);
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    fn handle_states(&self, format: &str, flow: Option<&str>) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let mut states = store.list_all()?;
        if let Some(flow) = flow {
            let flow = FlowId::new(flow);
            states.retain(|s| s.key.flow_id == flow);
        }
        format_states(&states, format)
    }

    fn handle_show(&self, flow: &str, page: &str) -> Result<String, ApiError> {
        let key = ViewKey::new(flow, page);
        let state = self
            .open_store()?
            .get(&key)?
            .ok_or(StorageError::StateNotFound(key))?;
        format_state_json(&state)
    }

    fn handle_config(&self) -> Result<String, ApiError> {
        let mut out = String::new();
        if let Some(path) = &self.config_path {
            out.push_str(&format!("# loaded from {}\n", path.display()));
        }
        let rendered = toml::to_string_pretty(&self.config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e)))?;
        out.push_str(&rendered);
        Ok(out)
    }

    fn handle_run(
        &self,
        script: &Path,
        pages: Option<&Path>,
        interactive: bool,
        persist: bool,
    ) -> Result<String, ApiError> {
        let script_text = std::fs::read_to_string(script)?;

        let content = Arc::new(MemoryContent::new());
        if let Some(pages) = pages {
            for (url, page) in load_pages(pages)? {
                content.set_page(url, page);
            }
        }
        let store: Arc<dyn StateStore> = if persist {
            self.open_store()?
        } else {
            Arc::new(MemoryStateStore::new())
        };
        let controller = ShellController::builder()
            .with_config(&self.config)
            .content(content.clone())
            .injector(content.clone())
            .opener(content.clone())
            .store(store)
            .build();

        let runtime = tokio::runtime::Runtime::new()?;
        let color = !interactive && std::io::stdout().is_terminal();
        let mut output = runtime.block_on(run_script(&controller, &script_text, interactive, color))?;

        for url in content.opened_externally() {
            output.push(format!("opened externally: {}", url));
        }
        controller.flush()?;
        info!(script = %script.display(), lines = output.len(), "Script finished");
        Ok(output.join("\n"))
    }
}

fn load_pages(path: &Path) -> Result<BTreeMap<String, PageContent>, ApiError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        ApiError::ConfigError(format!("Invalid pages file {}: {}", path.display(), e))
    })
}

/// Dispatch every command line of `script`, collecting relay output.
///
/// A failing command is reported and the script carries on.
async fn run_script(
    controller: &ShellController,
    script: &str,
    interactive: bool,
    color: bool,
) -> Result<Vec<String>, ApiError> {
    let mut events = controller.subscribe();
    let mut output = Vec::new();

    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let result = match ViewCommand::from_json(line) {
            Ok(command) => dispatch(controller, command).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(line = index + 1, error = %e, "Script command failed");
            output.push(format!("line {}: {}", index + 1, e));
        }
        drain_events(controller, &mut events, &mut output, interactive, color).await?;
    }
    Ok(output)
}

async fn drain_events(
    controller: &ShellController,
    events: &mut Subscription,
    output: &mut Vec<String>,
    interactive: bool,
    color: bool,
) -> Result<(), ApiError> {
    while let Some(envelope) = events.try_recv() {
        output.push(format_event_line(&envelope, color));
        if !interactive {
            continue;
        }
        if let ShellEvent::Interstitial {
            decision_id,
            flow_id,
            page_id,
            kind,
            url,
            original_url,
            ..
        } = envelope.event
        {
            let response = prompt_decision(decision_id, kind, &url, original_url)?;
            let key = ViewKey::new(flow_id, page_id);
            if let Err(e) = controller.resolve_decision(&key, decision_id, &response).await {
                output.push(format!("decision {}: {}", decision_id, e));
            }
        }
    }
    Ok(())
}

fn prompt_decision(
    decision_id: DecisionId,
    kind: Classification,
    url: &str,
    original_url: Option<String>,
) -> Result<InterstitialResponse, ApiError> {
    use dialoguer::Select;

    let (prompt, proceed_label, proceed) = match kind {
        Classification::HttpsDowngrade => (
            format!("Secure connection to {} failed (decision #{})", url, decision_id),
            "Proceed insecurely",
            InterstitialResponse::AllowInsecure {
                url: original_url.unwrap_or_else(|| url.to_string()),
            },
        ),
        Classification::BlockedAuthDomain => (
            format!("{} does not allow sign-in here (decision #{})", url, decision_id),
            "Open in default browser",
            InterstitialResponse::OpenExternal {
                url: url.to_string(),
            },
        ),
    };

    let selection = Select::new()
        .with_prompt(prompt)
        .items(&["Go back", proceed_label])
        .default(0)
        .interact()
        .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;

    Ok(match selection {
        1 => proceed,
        _ => InterstitialResponse::GoBack,
    })
}
