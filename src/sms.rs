// CrashGuard - SMS Segmentation
//
// Text mode with the GSM character set only when every byte written is the
// character's GSM 03.38 code as well, UCS-2 otherwise. Parts go out as
// independent messages without a concatenation header, so each gets the
// full single-message capacity.

const GSM7_PART: usize = 160;
const UCS2_PART: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7,
    Ucs2,
}

/// Characters whose GSM 03.38 default-alphabet code equals their ASCII code.
/// `@ $ _` and the bracket/tilde range sit at different codes (or need ESC,
/// which aborts a text-mode send), so they go out as UCS-2.
fn is_ascii_gsm(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | ' ' | '!' | '"' | '#' | '%'..='?' | '\n' | '\r')
}

impl Encoding {
    pub fn for_text(text: &str) -> Self {
        if text.chars().all(is_ascii_gsm) {
            Self::Gsm7
        } else {
            Self::Ucs2
        }
    }

    fn part_limit(self) -> usize {
        match self {
            Self::Gsm7 => GSM7_PART,
            Self::Ucs2 => UCS2_PART,
        }
    }

    /// Septets (GSM) or UTF-16 code units (UCS-2) that `c` occupies.
    fn cost(self, c: char) -> usize {
        match self {
            Self::Gsm7 => 1,
            Self::Ucs2 => c.len_utf16(),
        }
    }
}

/// Split `text` into the parts a carrier will accept. Never splits a
/// character, so surrogate pairs stay whole.
pub fn split(text: &str) -> Vec<String> {
    let encoding = Encoding::for_text(text);
    let limit = encoding.part_limit();

    let total: usize = text.chars().map(|c| encoding.cost(c)).sum();
    if total <= limit {
        return vec![text.to_string()];
    }

    let mut parts = Vec::with_capacity(total / limit + 1);
    let mut current = String::new();
    let mut used = 0;
    for c in text.chars() {
        let cost = encoding.cost(c);
        if used + cost > limit {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Hex-encoded UTF-16BE, as expected by modems in `AT+CSCS="UCS2"` mode.
pub fn ucs2_hex(text: &str) -> String {
    text.encode_utf16().map(|unit| format!("{unit:04X}")).collect()
}
