mod config;
mod error;
mod gateway;
mod invoker;
mod ollama;
mod orchestrator;
mod pipeline;
mod reasoning;
mod renderer;
mod schema;
mod signals;
mod tools;

use anyhow::Result;
use config::{Config, LoggingConfig};
use pipeline::{user_message, TutorPipeline};
use schema::StudentProfile;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config_path =
        std::env::var("TUTOR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::from_file(&config_path)?;

    init_logging(&config.logging);
    log::info!("Configuration loaded from {}", config_path);

    let pipeline = Arc::new(TutorPipeline::from_config(&config));
    log::info!("Reasoning provider: {}", pipeline.reasoner_name());

    if std::env::args().nth(1).as_deref() == Some("demo") {
        run_demo(&pipeline).await;
        return Ok(());
    }

    gateway::serve(&config.server, pipeline).await?;

    log::info!("Gateway stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
}

/// Runs three sample requests and prints the replies.
async fn run_demo(pipeline: &TutorPipeline) {
    let profile = StudentProfile {
        user_id: "demo-student".to_string(),
        name: "Maya".to_string(),
        grade_level: "Grade 8".to_string(),
        mastery_level_summary: "Level 4: Building foundational knowledge".to_string(),
        emotional_state_summary: "Curious but a little anxious about exams".to_string(),
        learning_style_summary: Some("Visual learner".to_string()),
    };

    let queries = [
        "Can you make me some outline-style notes on the causes of World War II, with analogies",
        "Make 5 flashcards on the human heart",
        "I'm struggling to understand photosynthesis, can you explain it?",
    ];

    for query in queries {
        println!("==> {}\n", query);
        match pipeline.handle(query, &profile, &[]).await {
            Ok(reply) => println!("{}\n", reply),
            Err(e) => println!("[{}] {}\n", e.kind(), user_message(&e)),
        }
    }
}
