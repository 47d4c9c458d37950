//! System instruction built from the caller's user context
//!
//! The instruction is server-authored: it opens every fresh transcript and is
//! never echoed back to the user.

use serde::{Deserialize, Deserializer, Serialize};

/// Role and scope of the assistant
const ROLE_PREAMBLE: &str = "You are an assistant for the 98th Academy Awards Oscar Ballot app. You help users manage their ballot picks, check scores, look up nominees, and navigate the app.";

/// Behavioral rules appended after the context block
const RULES: &str = r"Rules:
- Be brief and direct.
- When asked to make a pick, confirm the category and nominee before saving.
- If ballots are locked, explain that picks can no longer be changed.
- Do not reveal other users' specific picks before the ceremony has started.
- Do not use emoji.
- Do not adopt a persona or character.
- When listing nominees, format them clearly with category name and nominee details.
- Do not use markdown formatting. No bold (**), italics (*), headers (#), or bullet lists (- or *). Write in plain conversational sentences. Use line breaks to separate ideas if needed, but keep it natural.";

/// Read-only facts about the caller, supplied at the start of each turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserContext {
    pub display_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub picks_count: u32,
    /// Zero means "use the catalog's count"
    #[serde(deserialize_with = "null_as_default")]
    pub total_categories: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub score: u32,
    pub current_path: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_locked: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub ceremony_started: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub winners_count: u32,
}

/// Browser clients send `null` for unknown counts and flags
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Build the system instruction for a fresh turn
pub fn build_system_prompt(ctx: &UserContext, catalog_total: usize) -> String {
    let display_name = ctx
        .display_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown");
    let current_path = ctx
        .current_path
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("/");
    let total = if ctx.total_categories == 0 {
        catalog_total
    } else {
        ctx.total_categories as usize
    };

    format!(
        "{ROLE_PREAMBLE}\n\n\
         Current user: {display_name}\n\
         Ballot progress: {picks}/{total} categories picked\n\
         Score: {score}/{winners} announced winners correct\n\
         Current page: {current_path}\n\
         Ballots locked: {locked}\n\
         Ceremony started: {started}\n\
         \n\
         {RULES}",
        picks = ctx.picks_count,
        score = ctx.score,
        winners = ctx.winners_count,
        locked = yes_no(ctx.is_locked),
        started = yes_no(ctx.ceremony_started),
    )
}
