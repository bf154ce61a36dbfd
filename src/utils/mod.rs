//! Small shared helpers
//!
//! Jittered sleeps for polite polling, style-tag extraction for clips that
//! report no tags of their own, lyrics normalization, and log redaction for
//! anything that may carry credential material.

use std::time::Duration;

use rand::Rng;

/// Word lists scanned by [`extract_style_tags`], checked in order.
const GENRE_WORDS: &[&str] = &[
    "pop",
    "rock",
    "indie",
    "folk",
    "country",
    "jazz",
    "blues",
    "r&b",
    "hip-hop",
    "rap",
    "electronic",
    "edm",
    "house",
    "techno",
    "classical",
    "orchestral",
    "acoustic",
    "metal",
    "punk",
    "soul",
    "funk",
    "reggae",
    "latin",
    "disco",
];

const MOOD_WORDS: &[&str] = &[
    "upbeat",
    "mellow",
    "energetic",
    "chill",
    "intense",
    "soft",
    "powerful",
    "gentle",
    "aggressive",
    "calm",
    "dreamy",
    "dark",
    "bright",
    "warm",
    "cold",
];

const FORM_WORDS: &[&str] = &["ballad", "anthem", "banger", "groove", "vibe"];

/// Sleep for a random number of seconds in `[min, max]`.
///
/// Used between poll iterations so automated traffic does not tick on a
/// fixed interval.
pub async fn sleep_secs_between(min: f64, max: f64) {
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Extract recognizable genre/mood/form keywords from free-form style text.
///
/// Matching is case-insensitive on word boundaries; results come back
/// lowercased, deduplicated, in vocabulary-scan order, and capped at `cap`
/// entries joined with `", "`. Running the output back through the function
/// returns it unchanged.
pub fn extract_style_tags(text: &str, cap: usize) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '&' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    let mut tags: Vec<&str> = Vec::new();
    for vocabulary in [GENRE_WORDS, MOOD_WORDS, FORM_WORDS] {
        for &keyword in vocabulary {
            if tags.len() >= cap {
                break;
            }
            if !tags.contains(&keyword) && words.iter().any(|w| *w == keyword) {
                tags.push(keyword);
            }
        }
    }
    tags.join(", ")
}

/// Normalize lyrics text: drop blank lines and rejoin with single newlines.
pub fn parse_lyrics(prompt: &str) -> String {
    prompt
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Redact token-like runs (20+ chars of `[A-Za-z0-9_-]`) down to an 8-char
/// prefix so cookies and JWTs never land in logs whole.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.len() >= 20 {
            out.push_str(&run[..8]);
            out.push_str("...");
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);
    out
}
