use super::TranscriptSegment;

const PHRASE_TERMINATORS: [char; 6] = ['.', '!', '?', ',', ';', ':'];

fn is_terminator(c: char) -> bool {
    PHRASE_TERMINATORS.contains(&c)
}

/// Split a script into display phrases.
///
/// A phrase ends after a run of terminators (`.`, `!`, `?`, `,`, `;`, `:`),
/// which stays attached to it. Whitespace runs collapse to a single space and
/// empty phrases are dropped.
///
/// Numbers are kept whole on purpose: a terminator with a digit on both
/// sides (`3.5`, `10:30`, `1,000`) is part of the number and does not end a
/// phrase, unlike plain punctuation splitting.
pub fn split_phrases(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut phrases = Vec::new();
    let mut current = String::new();

    for (idx, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(c);

        if !is_terminator(c) {
            continue;
        }

        let prev = idx.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(idx + 1).copied();

        let inside_number = prev.is_some_and(|p| p.is_ascii_digit())
            && next.is_some_and(|n| n.is_ascii_digit());
        let run_continues = next.is_some_and(is_terminator);

        if !inside_number && !run_continues {
            flush(&mut current, &mut phrases);
        }
    }
    flush(&mut current, &mut phrases);

    phrases
}

fn flush(current: &mut String, phrases: &mut Vec<String>) {
    let phrase = current.trim();
    if !phrase.is_empty() {
        phrases.push(phrase.to_string());
    }
    current.clear();
}

/// Give each phrase an equal share of `total_duration`, in order.
///
/// The last phrase always ends exactly at `total_duration`.
pub fn even_split(phrases: &[String], total_duration: f64) -> Vec<TranscriptSegment> {
    if phrases.is_empty() {
        return Vec::new();
    }

    let share = total_duration / phrases.len() as f64;
    let last = phrases.len() - 1;

    phrases
        .iter()
        .enumerate()
        .map(|(idx, phrase)| {
            let start = share * idx as f64;
            let end = if idx == last {
                total_duration
            } else {
                share * (idx + 1) as f64
            };
            TranscriptSegment::new(phrase.clone(), start, end)
        })
        .collect()
}
