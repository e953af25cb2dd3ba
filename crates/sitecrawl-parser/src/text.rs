use unicode_general_category::{get_general_category, GeneralCategory};

/// Upper bound on the number of words kept from a page body.
pub const MAX_BODY_WORDS: usize = 1000;

/// Splits a text run into words.
///
/// Every character that is neither a letter, a digit nor a punctuation mark acts as a
/// separator, so symbols and whitespace of any kind never end up inside a word.
pub fn words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if is_word_char(c) { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Letters, digits and punctuation, everything else separates words.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_punctuation(c)
}

/// Unicode punctuation, any of the general categories `Pc`, `Pd`, `Ps`, `Pe`, `Pi`, `Pf`, `Po`.
///
/// ASCII symbols such as `$`, `+`, `<`, `|` or `~` are category S and do not count.
fn is_punctuation(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
    )
}
