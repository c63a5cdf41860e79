use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::engine::Mode;

#[derive(Args)]
pub struct AskArgs {
    /// The question to ask
    pub question: String,

    /// Mode to use: quick, live, deep, or context
    #[arg(long, default_value = "quick")]
    pub mode: Mode,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: AskArgs) -> Result<()> {
    let config = Config::load()?;
    let (mut engine, _runtime) = super::build_engine(&config, args.model).await?;

    engine.set_mode(args.mode);
    let response = engine.chat(&args.question).await;

    match args.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "question": args.question,
                "response": response,
                "mode": args.mode.as_str(),
                "model": engine.model(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", response);
        }
    }

    Ok(())
}
