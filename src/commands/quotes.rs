use crate::config::QUOTE_LIST_PAGE_SIZE;
use crate::quotes::QuoteIndex;
use crate::voice;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use std::path::Path;

fn quote_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("quote")
        .to_string()
}

async fn play_quote(ctx: Context<'_>, name: Option<String>) -> Result<(), Error> {
    let picked = {
        let index = ctx.data().quotes.read().await;
        match name.as_deref() {
            Some(name) => index.get_quote(name),
            None => index.get_random_quote(None),
        }
    };

    let Some(path) = picked else {
        match name {
            Some(name) => ctx.say(format!("❌ Quote {} not found", name)).await?,
            None => ctx.say("📭 No quotes are loaded").await?,
        };
        return Ok(());
    };

    let Some((guild_id, channel_id)) = voice::author_voice_channel(&ctx) else {
        ctx.say("❌ You must be in a voice channel to play quotes").await?;
        return Ok(());
    };

    ctx.say(format!("▶️ Playing {}", quote_label(&path))).await?;
    voice::play_file(ctx.serenity_context(), guild_id, channel_id, path).await
}

/// Play the quote with the given name, or a random quote
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn quote(
    ctx: Context<'_>,
    #[description = "Name of the quote to play"] name: Option<String>,
) -> Result<(), Error> {
    play_quote(ctx, name).await
}

/// Shorthand for /quote
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn q(
    ctx: Context<'_>,
    #[description = "Name of the quote to play"] name: Option<String>,
) -> Result<(), Error> {
    play_quote(ctx, name).await
}

/// Play a random quote, optionally from a single module
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn rquote(
    ctx: Context<'_>,
    #[description = "Name of the module to quote from"] module: Option<String>,
) -> Result<(), Error> {
    let picked = {
        let index = ctx.data().quotes.read().await;
        index.get_random_quote(module.as_deref())
    };

    let Some(path) = picked else {
        match module {
            Some(module) => ctx.say(format!("❌ No module {} found", module)).await?,
            None => ctx.say("📭 No quotes are loaded").await?,
        };
        return Ok(());
    };

    let Some((guild_id, channel_id)) = voice::author_voice_channel(&ctx) else {
        ctx.say("❌ You must be in a voice channel to play quotes").await?;
        return Ok(());
    };

    match &module {
        Some(module) => {
            ctx.say(format!(
                "▶️ Playing random quote {} from {}",
                quote_label(&path),
                module
            ))
            .await?
        }
        None => {
            ctx.say(format!("▶️ Playing random quote {}", quote_label(&path)))
                .await?
        }
    };
    voice::play_file(ctx.serenity_context(), guild_id, channel_id, path).await
}

/// Play a quote in the voice channel of the named member
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn projectquote(
    ctx: Context<'_>,
    #[description = "Name of the quote to play"] quote: String,
    #[description = "Display name of the member whose channel to play in"] nickname: String,
) -> Result<(), Error> {
    let target = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        let guild_id = guild.id;
        guild.voice_states.values().find_map(|vs| {
            let member = guild.members.get(&vs.user_id)?;
            if member.display_name() == nickname {
                vs.channel_id.map(|channel_id| (guild_id, channel_id))
            } else {
                None
            }
        })
    };

    let Some((guild_id, channel_id)) = target else {
        ctx.say(format!("❌ Target {} not found", nickname)).await?;
        return Ok(());
    };

    let path = {
        let index = ctx.data().quotes.read().await;
        index.get_quote(&quote)
    };
    let Some(path) = path else {
        ctx.say(format!("❌ Quote {} not found", quote)).await?;
        return Ok(());
    };

    ctx.say(format!("📣 Projecting {} to {}", quote, nickname)).await?;
    voice::play_file(ctx.serenity_context(), guild_id, channel_id, path).await
}

/// List the quote modules currently loaded
#[poise::command(slash_command)]
pub async fn modules(ctx: Context<'_>) -> Result<(), Error> {
    let loaded = {
        let index = ctx.data().quotes.read().await;
        index.get_modules().join(", ")
    };

    if loaded.is_empty() {
        ctx.say("📭 No modules are loaded").await?;
    } else {
        ctx.say(format!("Loaded modules:\n{}", loaded)).await?;
    }
    Ok(())
}

/// Pages are clamped the way the old prefix bot did it: a page past the end
/// snaps back to the last full page.
fn page_bounds(len: usize, page: usize) -> (usize, usize) {
    let mut page = page;
    if len < page * QUOTE_LIST_PAGE_SIZE {
        page = (len / QUOTE_LIST_PAGE_SIZE).saturating_sub(1);
    }
    let start = (page * QUOTE_LIST_PAGE_SIZE).min(len);
    let end = (start + QUOTE_LIST_PAGE_SIZE).min(len);
    (start, end)
}

/// List all quotes in the given module
#[poise::command(slash_command)]
pub async fn mlist(
    ctx: Context<'_>,
    #[description = "The module to search through"] module: String,
    #[description = "Page of the listing to show"] page: Option<u32>,
) -> Result<(), Error> {
    let names = {
        let index = ctx.data().quotes.read().await;
        index.get_module_quotes(&module).map(|names| {
            let mut names = names.to_vec();
            names.sort();
            names
        })
    };

    let Some(names) = names else {
        ctx.say(format!("❌ Invalid module {}", module)).await?;
        return Ok(());
    };

    let (start, end) = page_bounds(names.len(), page.unwrap_or(0) as usize);
    ctx.say(format!(
        "Quotes in {} ({}-{}/{}):\n{}",
        module,
        start,
        end,
        names.len(),
        names[start..end].join(", ")
    ))
    .await?;
    Ok(())
}

/// Upload the attached sound file as a new quote in the selected module
#[poise::command(slash_command)]
pub async fn qupload(
    ctx: Context<'_>,
    #[description = "The module the quote will be added to"] module: String,
    #[description = "The sound file to upload"] attachment: serenity::Attachment,
) -> Result<(), Error> {
    let data = ctx.data();

    if !QuoteIndex::is_valid_quote_file(&attachment.filename) {
        ctx.say(format!(
            "❌ Files can only be {} and have names containing a-z and 0-9",
            QuoteIndex::allowed_extensions().join(", ")
        ))
        .await?;
        return Ok(());
    }
    if u64::from(attachment.size) > data.config.max_quote_file_bytes {
        ctx.say(format!(
            "❌ {} is too large! Only files up to {} bytes are allowed",
            attachment.filename, data.config.max_quote_file_bytes
        ))
        .await?;
        return Ok(());
    }

    let name = quote_label(Path::new(&attachment.filename));
    {
        let index = data.quotes.read().await;
        if index.get_module_quotes(&module).is_none() {
            ctx.say(format!("❌ There is no module {}", module)).await?;
            return Ok(());
        }
        if index.get_quote(&name).is_some() {
            ctx.say(format!("❌ Quote {} already exists!", name)).await?;
            return Ok(());
        }
    }

    ctx.defer().await?;
    let bytes = data
        .http_client
        .get(&attachment.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    data.quotes
        .write()
        .await
        .add_quote_to_module(&module, &attachment.filename, &bytes)
        .await?;
    ctx.say(format!("✅ Added {} to {}", name, module)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{page_bounds, quote_label};
    use std::path::Path;

    #[test]
    fn labels_quotes_by_file_stem() {
        assert_eq!(quote_label(Path::new("/data/memes/foo.mp3")), "foo");
        assert_eq!(quote_label(Path::new("bar.ogg")), "bar");
    }

    #[test]
    fn first_page_starts_at_zero() {
        assert_eq!(page_bounds(45, 0), (0, 20));
        assert_eq!(page_bounds(5, 0), (0, 5));
        assert_eq!(page_bounds(0, 0), (0, 0));
    }

    #[test]
    fn last_partial_page_is_short() {
        assert_eq!(page_bounds(45, 2), (40, 45));
    }

    #[test]
    fn out_of_range_page_snaps_to_last_full_page() {
        assert_eq!(page_bounds(45, 7), (20, 40));
        assert_eq!(page_bounds(10, 5), (0, 10));
    }
}
