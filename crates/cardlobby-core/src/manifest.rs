//! The player manifest passed to the core on its command line.
//!
//! ```text
//! µ<name0>µ<id0>µ<card;card;...>µ<name1>µ<id1>µ<card;card;...>µ
//! ```
//!
//! The manifest is base64-encoded before it becomes an argument. Player
//! names cannot contain `µ` (the registry refuses them); card names come
//! straight from clients and are filtered with [`sanitize_card_name`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cardlobby_protocol::NAME_SEPARATOR;
use cardlobby_room::MatchPlan;

/// Keeps only `#`, `|` and ASCII letters and digits. The result is used as
/// a file name by the core, so nothing else may pass.
pub fn sanitize_card_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '|'))
        .collect()
}

/// Builds the plain-text manifest for `plan`, seat order preserved.
pub fn build_manifest(plan: &MatchPlan) -> String {
    let mut manifest = String::from(NAME_SEPARATOR);
    for player in &plan.players {
        let cards: Vec<String> = player
            .decklist
            .iter()
            .map(|card| sanitize_card_name(card))
            .collect();
        manifest.push_str(&player.name);
        manifest.push(NAME_SEPARATOR);
        manifest.push_str(player.id.as_str());
        manifest.push(NAME_SEPARATOR);
        manifest.push_str(&cards.join(";"));
        manifest.push(NAME_SEPARATOR);
    }
    manifest
}

/// The manifest as it appears in `--players=`.
pub fn encode_manifest(plan: &MatchPlan) -> String {
    STANDARD.encode(build_manifest(plan).as_bytes())
}
