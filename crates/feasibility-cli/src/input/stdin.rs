use std::io::{self, Read};

/// Piped stdin contents, or None when stdin is a terminal or blank.
pub fn read_piped() -> io::Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}
