//! # Memory Chat - Interactive assistant with session and profile memory
//!
//! A terminal chat driving [`AssistantOrchestrator`] in-process. Every turn
//! is answered with the recent session and the user's long-term profile as
//! context, then written back so the next turn remembers it.
//!
//! ## Usage
//!
//! ```bash
//! # Offline: in-process memory, the echo model shows the augmented prompt
//! cargo run -p recall-core --example memory_chat -- --user-id alice
//!
//! # OpenAI-compatible model
//! OPENAI_API_KEY=sk-... cargo run -p recall-core --example memory_chat -- --user-id alice
//!
//! # REST memory service, capture left to its hooks
//! RECALL_MEMORY_ENDPOINT=http://localhost:8700 \
//!   cargo run -p recall-core --example memory_chat -- --user-id alice --hooks
//! ```
//!
//! Flags: `--user-id <id>`, `--session-id <id>`, `--hooks`, `--no-long-term`,
//! `--top-k <n>`, `--verbose`.
//!
//! ## Commands
//!
//! - `/help` - Show available commands
//! - `/id` - Show the current session id
//! - `/new` - Start a new session
//! - `/quit` or `/exit` - Exit the chat
//!
//! The last session id of each user is kept in `.recall_sessions/{user}.txt`
//! and resumed on the next start unless `--session-id` is given.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use recall_core::{
    AssistantOrchestrator, CaptureMode, DEFAULT_TOP_K, EchoModel, InMemoryBackend,
    InMemoryBackendConfig, InvocationRequest, MemoryBackend, MemoryFacade, ModelClient,
    OpenAiClient, OpenAiConfig, OrchestratorConfig, RestBackendConfig, RestMemoryBackend,
};

const SESSION_DIR: &str = ".recall_sessions";

/// Chat configuration
struct ChatConfig {
    user_id: String,
    session_id: Option<String>,
    use_hooks: bool,
    use_long_term: bool,
    top_k: i64,
    verbose: bool,
    memory_endpoint: Option<String>,
    openai_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            user_id: value_of("--user-id")
                .or_else(|| std::env::var("USER").ok())
                .unwrap_or_else(|| "demo".to_string()),
            session_id: value_of("--session-id"),
            use_hooks: args.iter().any(|a| a == "--hooks"),
            use_long_term: !args.iter().any(|a| a == "--no-long-term"),
            top_k: value_of("--top-k")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOP_K as i64),
            verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
            memory_endpoint: std::env::var("RECALL_MEMORY_ENDPOINT").ok(),
            openai_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }
}

fn session_file(user_id: &str) -> PathBuf {
    PathBuf::from(SESSION_DIR).join(format!("{user_id}.txt"))
}

fn load_session(user_id: &str) -> Option<String> {
    std::fs::read_to_string(session_file(user_id))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn save_session(user_id: &str, session_id: &str) -> io::Result<()> {
    std::fs::create_dir_all(SESSION_DIR)?;
    std::fs::write(session_file(user_id), session_id)
}

fn forget_session(user_id: &str) {
    let _ = std::fs::remove_file(session_file(user_id));
}

fn print_banner() {
    println!("\n\x1b[1;36m╔══════════════════════════════════════════════════╗\x1b[0m");
    println!(
        "\x1b[1;36m║\x1b[0m   \x1b[1;33m◈ RECALL\x1b[0m - Assistant with session memory       \x1b[1;36m║\x1b[0m"
    );
    println!("\x1b[1;36m╚══════════════════════════════════════════════════╝\x1b[0m\n");
}

fn print_help() {
    println!("\n\x1b[1;33mAvailable Commands:\x1b[0m");
    println!("  \x1b[1;32m/help\x1b[0m  - Show this help message");
    println!("  \x1b[1;32m/id\x1b[0m    - Show the current session id");
    println!("  \x1b[1;32m/new\x1b[0m   - Start a new session");
    println!("  \x1b[1;32m/quit\x1b[0m  - Exit the chat");
    println!();
}

fn print_status(msg: &str, is_ok: bool) {
    let icon = if is_ok {
        "\x1b[1;32m✓\x1b[0m"
    } else {
        "\x1b[1;31m✗\x1b[0m"
    };
    println!("  {} {}", icon, msg);
}

async fn connect_memory(config: &ChatConfig) -> recall_core::Result<Arc<MemoryFacade>> {
    let backend: Arc<dyn MemoryBackend> = match &config.memory_endpoint {
        Some(endpoint) => Arc::new(RestMemoryBackend::new(RestBackendConfig {
            endpoint: endpoint.clone(),
            capture_mode: if config.use_hooks {
                CaptureMode::Auto
            } else {
                CaptureMode::Explicit
            },
            ..Default::default()
        })?),
        None => Arc::new(InMemoryBackend::new(InMemoryBackendConfig::default())),
    };
    Ok(Arc::new(MemoryFacade::connect(backend).await?))
}

fn build_model(config: &ChatConfig) -> recall_core::Result<Arc<dyn ModelClient>> {
    Ok(match &config.openai_key {
        Some(key) => Arc::new(OpenAiClient::new(OpenAiConfig {
            api_key: Some(key.clone()),
            ..Default::default()
        })?),
        None => Arc::new(EchoModel),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ChatConfig::default();

    if config.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("recall_core=debug")
            .init();
    }

    print_banner();
    println!("\x1b[1;34mInitializing...\x1b[0m");

    let facade = match connect_memory(&config).await {
        Ok(facade) => {
            print_status(&format!("Memory resource {}", facade.memory_id()), true);
            facade
        },
        Err(e) => {
            print_status(&format!("Memory unavailable: {}", e), false);
            return Err(e.into());
        },
    };
    let model = build_model(&config)?;
    print_status(&format!("Model: {}", model.model_name()), true);
    if config.openai_key.is_none() {
        println!("  \x1b[33m→ OPENAI_API_KEY not set; answers echo the augmented prompt.\x1b[0m");
    }

    let orchestrator = AssistantOrchestrator::new(
        facade.clone(),
        model,
        OrchestratorConfig::default(),
    );

    let mut session_id = config
        .session_id
        .clone()
        .or_else(|| load_session(&config.user_id));
    print_status(&format!("User: {}", config.user_id), true);
    match &session_id {
        Some(id) => print_status(&format!("Resuming session {}", id), true),
        None => print_status("A new session starts with the first message", true),
    }

    print_help();

    loop {
        print!("\x1b[1;32mYou>\x1b[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match input {
                "/help" | "/h" => print_help(),
                "/id" => match &session_id {
                    Some(id) => println!("\x1b[1;34mSession:\x1b[0m {}\n", id),
                    None => println!("\x1b[2m(no session yet)\x1b[0m\n"),
                },
                "/new" => {
                    session_id = None;
                    forget_session(&config.user_id);
                    println!("\x1b[1;33mNew session. Profile memory is kept.\x1b[0m\n");
                },
                "/quit" | "/exit" | "/q" => {
                    println!("\n\x1b[1;33mGoodbye!\x1b[0m\n");
                    break;
                },
                other => println!("\x1b[31mUnknown command: {}\x1b[0m\n", other),
            }
            continue;
        }

        let mut request = InvocationRequest::new(config.user_id.as_str(), input)
            .with_hooks(config.use_hooks)
            .with_long_term(config.use_long_term, config.top_k);
        if let Some(id) = &session_id {
            request = request.with_session(id.as_str());
        }

        match orchestrator.invoke(request).await {
            Ok(result) => {
                println!("\x1b[1;34mAssistant>\x1b[0m {}\n", result.result_text);
                if config.verbose {
                    println!(
                        "\x1b[2m  {} session / {} long-term records, warnings: {:?}\x1b[0m\n",
                        result.debug.session_count,
                        result.debug.long_term_count,
                        result.debug.warnings
                    );
                } else {
                    for (key, warning) in &result.debug.warnings {
                        println!("\x1b[33m  {}: {}\x1b[0m", key, warning);
                    }
                }
                if session_id.as_deref() != Some(result.session_id.as_str()) {
                    if let Err(e) = save_session(&config.user_id, &result.session_id) {
                        print_status(&format!("Could not save session id: {}", e), false);
                    }
                    session_id = Some(result.session_id);
                }
            },
            Err(e) if e.is_client_error() => {
                println!("\x1b[31mRejected: {}\x1b[0m\n", e);
            },
            Err(e) => {
                println!("\x1b[31mError: {}\x1b[0m\n", e);
            },
        }
    }

    facade.close().await?;
    Ok(())
}
