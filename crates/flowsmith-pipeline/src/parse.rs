//! Parsing of provider responses.

use std::sync::LazyLock;

use regex::Regex;

/// Score used when a confidence response carries no usable number.
pub const DEFAULT_CONFIDENCE: u8 = 5;

const MAX_CONFIDENCE: u8 = 10;

const INVALID_MARKER: &str = "CODE:INVALID";

static CONFIDENCE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\|\|\s*(\d+)\s*\|\|").expect("confidence pattern is valid"));

static CODE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"```[A-Za-z0-9_+.-]*[ \t]*\r?\n([\s\S]*?)```").expect("code block pattern is valid")
});

/// Fence opened but never closed, as in a truncated response.
static OPEN_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"```[A-Za-z0-9_+.-]*[ \t]*\r?\n([\s\S]*)$").expect("open fence pattern is valid")
});

/// Extract a `||N||` score in `0..=10`, falling back to [`DEFAULT_CONFIDENCE`].
pub fn parse_confidence(response: &str) -> u8 {
  CONFIDENCE_RE
    .captures(response)
    .and_then(|c| c[1].parse::<u8>().ok())
    .filter(|score| *score <= MAX_CONFIDENCE)
    .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Validator classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Valid,
  Invalid { critique: String },
}

impl Verdict {
  /// Anything without the invalid marker counts as valid.
  pub fn from_response(response: &str) -> Self {
    if response.to_ascii_uppercase().contains(INVALID_MARKER) {
      Verdict::Invalid {
        critique: response.trim().to_string(),
      }
    } else {
      Verdict::Valid
    }
  }

  pub fn is_valid(&self) -> bool {
    matches!(self, Verdict::Valid)
  }
}

/// Unwrap the first fenced code block, or return the trimmed text.
///
/// An unclosed fence loses only its opening line.
pub fn extract_code(response: &str) -> String {
  match CODE_BLOCK_RE.captures(response) {
    Some(c) => c[1].trim_end().to_string(),
    None => match OPEN_FENCE_RE.captures(response) {
      Some(c) => c[1].trim_end().to_string(),
      None => response.trim().to_string(),
    },
  }
}

/// Plain-text summary of at most `max` sentences.
///
/// Code fences and backticks are removed and whitespace is collapsed.
pub fn limit_sentences(text: &str, max: usize) -> String {
  let plain = CODE_BLOCK_RE.replace_all(text, "");
  let plain = plain.replace('`', "");
  let words: Vec<&str> = plain.split_whitespace().collect();

  let mut out = Vec::new();
  let mut sentences = 0;
  for word in words {
    out.push(word);
    if word.ends_with(['.', '!', '?']) {
      sentences += 1;
      if sentences == max {
        break;
      }
    }
  }
  out.join(" ")
}
