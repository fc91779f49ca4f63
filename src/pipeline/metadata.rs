//! Parser for the `{title, album, artist}` line entered before tagging.

const FIELD_NAMES: [&str; 3] = ["title", "album", "artist"];

/// Descriptive tags written into the output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub title: String,
    pub album: String,
    pub artist: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TagParseError {
    #[error("expected 3 comma-separated fields (title, album, artist), got {0}")]
    FieldCount(usize),

    #[error("the {0} field is empty")]
    EmptyField(&'static str),

    #[error("the entry has an opening or closing brace without its pair")]
    UnbalancedBrace,
}

/// Parse `{title, album, artist}`. The enclosing braces are optional but must come as a
/// pair; each field is trimmed and must be non-empty.
pub fn parse_metadata(input: &str) -> Result<MetadataRecord, TagParseError> {
    let trimmed = input.trim();
    let inner = match (trimmed.strip_prefix('{'), trimmed.ends_with('}')) {
        (Some(rest), true) => rest.strip_suffix('}').unwrap_or(rest),
        (None, false) => trimmed,
        _ => return Err(TagParseError::UnbalancedBrace),
    };

    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(TagParseError::FieldCount(fields.len()));
    }

    if let Some(index) = fields.iter().position(|field| field.is_empty()) {
        return Err(TagParseError::EmptyField(FIELD_NAMES[index]));
    }

    Ok(MetadataRecord {
        title: fields[0].to_string(),
        album: fields[1].to_string(),
        artist: fields[2].to_string(),
    })
}
