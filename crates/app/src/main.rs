mod chat;
mod config;
mod media;

use std::sync::Arc;

use salus_llm::GeminiClient;
use salus_storage::HistoryStore;

use crate::chat::controller::ChatController;
use crate::config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Fail fast on configuration: without a credential there is nothing
    // useful to start, so exit before touching storage or the network.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("salus: {error}");
            std::process::exit(1);
        }
    };

    let factory = match GeminiClient::new(config.gemini.clone()) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            eprintln!("salus: {error}");
            std::process::exit(1);
        }
    };

    let store = HistoryStore::new(config.history_path.clone());
    let mut controller = ChatController::initialize(factory, store, config.lang);
    controller.start_session();

    if let Err(error) = chat::repl::run(controller).await {
        eprintln!("salus: {error}");
        std::process::exit(1);
    }
}
