use crate::{Context, Error};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

fn roll_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)-(\d+)").expect("valid roll range pattern"))
}

/// The first argument may carry a combined range like "1-12"; otherwise the
/// two arguments are separate bounds. Bounds are sorted, defaults are 0-100.
fn roll_bounds(min: Option<&str>, max: Option<&str>) -> (i64, i64) {
    let (a, b) = match min.and_then(|v| roll_range_pattern().captures(v)) {
        Some(caps) => (
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(100),
        ),
        None => (
            min.and_then(|v| v.parse().ok()).unwrap_or(0),
            max.and_then(|v| v.parse().ok()).unwrap_or(100),
        ),
    };
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Roll a dice between the two given numbers, or 0 and 100
#[poise::command(slash_command)]
pub async fn roll(
    ctx: Context<'_>,
    #[description = "Minimum roll value, or a range like 1-12"] min: Option<String>,
    #[description = "Maximum roll value"] max: Option<String>,
) -> Result<(), Error> {
    let (lo, hi) = roll_bounds(min.as_deref(), max.as_deref());
    let rolled = rand::rng().random_range(lo..=hi);
    ctx.say(format!(
        "🎲 {} rolled {} ({} - {})",
        ctx.author().display_name(),
        rolled,
        lo,
        hi
    ))
    .await?;
    Ok(())
}

/// Flip a coin
#[poise::command(slash_command)]
pub async fn flip(ctx: Context<'_>) -> Result<(), Error> {
    let side = if rand::rng().random::<bool>() {
        "Heads"
    } else {
        "Tails"
    };
    ctx.say(format!(
        "🪙 {} flipped a coin and got {}!",
        ctx.author().display_name(),
        side
    ))
    .await?;
    Ok(())
}

/// Choose a random option from the given list
#[poise::command(slash_command)]
pub async fn choose(
    ctx: Context<'_>,
    #[description = "Space-separated options to choose from"] options: String,
) -> Result<(), Error> {
    let options: Vec<&str> = options.split_whitespace().collect();
    if options.is_empty() {
        ctx.say("❌ Give me at least one option to choose from").await?;
        return Ok(());
    }
    let pick = options[rand::rng().random_range(0..options.len())];
    ctx.say(format!(
        "{} was chosen for {}!",
        pick,
        ctx.author().display_name()
    ))
    .await?;
    Ok(())
}

/// Select a random user in the current voice channel
#[poise::command(slash_command, guild_only)]
pub async fn roulette(ctx: Context<'_>) -> Result<(), Error> {
    let candidates: Vec<String> = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        let channel_id = guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|vs| vs.channel_id)
            .ok_or("You must be in a voice channel to use this command")?;
        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel_id))
            .filter_map(|vs| guild.members.get(&vs.user_id))
            .filter(|member| !member.user.bot)
            .map(|member| member.display_name().to_string())
            .collect()
    };

    if candidates.is_empty() {
        ctx.say("📭 Nobody in the channel to pick from").await?;
        return Ok(());
    }
    let pick = &candidates[rand::rng().random_range(0..candidates.len())];
    ctx.say(format!("🎯 {} was chosen!", pick)).await?;
    Ok(())
}
