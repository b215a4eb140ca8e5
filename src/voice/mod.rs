use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use songbird::input::File;
use std::path::PathBuf;
use tracing::debug;

/// Resolves the voice channel the command author is currently in, from the
/// cached guild voice states.
pub fn author_voice_channel(
    ctx: &Context<'_>,
) -> Option<(serenity::GuildId, serenity::ChannelId)> {
    let guild = ctx.guild()?;
    let channel_id = guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|vs| vs.channel_id)?;
    Some((guild.id, channel_id))
}

/// Joins the given voice channel and plays a sound file from disk.
pub async fn play_file(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
    path: PathBuf,
) -> Result<(), Error> {
    let manager = songbird::get(ctx)
        .await
        .ok_or("Songbird Voice client not initialized")?
        .clone();

    let handler_lock = manager.join(guild_id, channel_id).await?;
    let mut handler = handler_lock.lock().await;
    debug!("Playing {} in channel {}", path.display(), channel_id);
    handler.play_input(File::new(path).into());

    Ok(())
}
