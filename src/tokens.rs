//! Construction of the per-recipient placeholder map.

use crate::config::GeneratorConfig;
use crate::mapping::ResolvedEntry;
use crate::model::{SourceRow, TokenMap};

/// Builds the tokens for one recipient: the name and territory placeholders
/// plus one placeholder per resolved question or answer entry.
pub fn build_token_map(
    recipient: &str,
    row: &SourceRow,
    resolved: &[ResolvedEntry<'_>],
    config: &GeneratorConfig,
) -> TokenMap {
    let mut tokens = TokenMap::new();
    tokens.insert_tag(&config.name_tag, recipient);
    tokens.insert_tag(&config.territory_tag, row.territory.display_text());

    for resolved in resolved {
        if resolved.entry.is_document_field(&config.document_tag_prefixes) {
            tokens.insert_tag(&resolved.entry.tag, config.currency.format_value(resolved.value));
        }
    }
    tokens
}
