use unicode_segmentation::UnicodeSegmentation;

const MAX_CHAR_LENGTH: usize = 256;

/// Free text typed by the user to filter listings, e.g. "python backend".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords(String);

impl Keywords {
    pub fn parse(keywords: String) -> Result<Keywords, String> {
        let keywords = keywords.trim().to_string();
        let is_empty = keywords.is_empty();
        let is_too_long = keywords.graphemes(true).count() > MAX_CHAR_LENGTH;
        let is_a_command = keywords.starts_with('/');

        if is_empty || is_too_long || is_a_command {
            return Err(format!("{} are not valid keywords", keywords));
        }

        Ok(Self(keywords))
    }
}

impl AsRef<str> for Keywords {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
