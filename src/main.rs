use poise::serenity_prelude as serenity;
use quotecord::commands::{fun, quotes};
use quotecord::quotes::QuoteIndex;
use quotecord::{config::Config, Data};
use songbird::serenity::SerenityInit;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                quotes::quote(),
                quotes::q(),
                quotes::rquote(),
                quotes::projectquote(),
                quotes::modules(),
                quotes::mlist(),
                quotes::qupload(),
                fun::roll(),
                fun::flip(),
                fun::choose(),
                fun::roulette(),
            ],
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                // A failed build (duplicate quote name, unreadable directory)
                // aborts startup; no partial index is served.
                let index = QuoteIndex::index_dir(&config.quotes_dir).await?;
                info!(
                    "Indexed {} quote(s) across {} module(s) from {}",
                    index.quote_count(),
                    index.get_modules().len(),
                    config.quotes_dir
                );

                Ok(Data {
                    config,
                    http_client: reqwest::Client::new(),
                    quotes: tokio::sync::RwLock::new(index),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
