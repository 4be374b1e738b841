/// Returns a slice of the lines of `text`.
///
/// A positive `nlines` keeps the first `nlines` lines, a negative one keeps the last
/// `|nlines|` lines, and zero keeps the whole text. Lines are joined with `\n` and the
/// result carries no trailing newline.
pub fn excerpt(text: &str, nlines: isize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let count = nlines.unsigned_abs().min(lines.len());
    let selected = match nlines {
        0 => &lines[..],
        n if n > 0 => &lines[..count],
        _ => &lines[lines.len() - count..],
    };
    selected.join("\n")
}

/// Prefixes every line of `text` with `prefix`.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joins words as an English enumeration: `a`, `a and b`, `a, b and c`.
pub fn to_sentence<S: AsRef<str>>(words: &[S]) -> String {
    match words {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        [init @ .., last] => {
            let head = init
                .iter()
                .map(|w| w.as_ref())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} and {}", head, last.as_ref())
        }
    }
}

pub fn pluralize(word: &str, count: u64) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
