//! Tier 1: the rule engine.
//!
//! Regex and textual scans over prompt and code, one entry point per
//! semantic question. High recall, low precision: everything found here is
//! a candidate, and tier 2 gets to refute it. Each scan is a bounded pass
//! over the two strings; no parsing happens in this tier.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUOTED: Regex = Regex::new(r#""([^"\n]{1,60})"|'([^'\n]{1,60})'"#).unwrap();
    static ref BRACKETED: Regex = Regex::new(r"\[[^\[\]\n]{1,80}\]").unwrap();
    static ref NUMBER: Regex = Regex::new(r"-?\b\d+(?:\.\d+)?\b").unwrap();
    static ref MAIN_BLOCK: Regex = Regex::new(r#"(?m)^if\s+__name__\s*==\s*["']__main__["']"#).unwrap();
    static ref PRINT_CALL: Regex = Regex::new(r"\bprint\s*\(").unwrap();
    static ref LOGGING: Regex = Regex::new(r"\b(logging\.|logger\.|log\.)\w+").unwrap();
    static ref SORT_CALL: Regex = Regex::new(r"\.sort\s*\(|\bsorted\s*\(").unwrap();
    static ref CACHE_HINT: Regex = Regex::new(r"\blru_cache\b|\bcache\b|\bmemo\b").unwrap();
    static ref AUTH_HINT: Regex =
        Regex::new(r"\b(auth|authorize|authenticated|permission|token|credential)\w*\b").unwrap();
    static ref VALIDATION_HINT: Regex =
        Regex::new(r"\bisinstance\s*\(|\braise\s+(Type|Value)Error\b").unwrap();
    static ref TRY_BLOCK: Regex = Regex::new(r"(?m)^\s*try\s*:").unwrap();
    static ref SUM_CALL: Regex = Regex::new(r"\bsum\s*\(").unwrap();
    static ref DIVISION: Regex = Regex::new(r"/").unwrap();
    static ref RETURN_STMT: Regex = Regex::new(r"(?m)^\s*return\b").unwrap();
    static ref CONDITIONAL: Regex = Regex::new(r"(?m)^\s*(if|elif)\b|\bif\b[^\n]*\belse\b").unwrap();
}

/// What one tier produced: evidence bullets for the reasoner, the raw
/// matched values for tier-2 cross-checks, and the tier's own scoring.
#[derive(Debug, Clone, Default)]
pub struct TierEvidence {
    /// Human-readable evidence bullets.
    pub items: Vec<String>,
    /// Machine-comparable payloads (matched literals, missing keywords).
    pub values: Vec<String>,
    pub confidence: f64,
    /// 0 when the tier suggests no severity.
    pub severity: u8,
}

impl TierEvidence {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, item: String, value: String) {
        self.items.push(item);
        self.values.push(value);
    }
}

/// The code above the `if __name__ == "__main__":` line. Everything below
/// it is the conventional self-test harness and is exempt from the
/// prompt-bias and unrequested-behavior questions.
pub fn code_before_main_block(code: &str) -> &str {
    match MAIN_BLOCK.find(code) {
        Some(found) => &code[..found.start()],
        None => code,
    }
}

fn non_comment_lines(code: &str) -> impl Iterator<Item = (usize, &str)> {
    code.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim_start().starts_with('#'))
        .map(|(i, line)| (i + 1, line))
}

fn prompt_mentions(prompt: &str, words: &[&str]) -> bool {
    let lowered = prompt.to_lowercase();
    words.iter().any(|w| lowered.contains(w))
}

/// Non-prompted consideration scan: behavior present in the code that the
/// prompt never asked for.
pub fn npc_scan(prompt: &str, code: &str) -> TierEvidence {
    let mut evidence = TierEvidence {
        confidence: 0.4,
        severity: 3,
        ..TierEvidence::default()
    };
    let scanned = code_before_main_block(code);

    for (line_no, line) in non_comment_lines(scanned) {
        if PRINT_CALL.is_match(line) && !prompt_mentions(prompt, &["print", "display", "show", "output"]) {
            evidence.push(
                format!("debug print at line {line_no} though the prompt never asks for output"),
                "print".to_string(),
            );
        }
        if LOGGING.is_match(line) && !prompt_mentions(prompt, &["log"]) {
            evidence.push(
                format!("logging call at line {line_no} was not requested"),
                "logging".to_string(),
            );
        }
        if SORT_CALL.is_match(line) && !prompt_mentions(prompt, &["sort", "order"]) {
            evidence.push(
                format!("sorting at line {line_no} was not requested"),
                "sorting".to_string(),
            );
        }
        if CACHE_HINT.is_match(line) && !prompt_mentions(prompt, &["cache", "memo"]) {
            evidence.push(
                format!("caching at line {line_no} was not requested"),
                "caching".to_string(),
            );
        }
        if AUTH_HINT.is_match(line) && !prompt_mentions(prompt, &["auth", "permission", "token"]) {
            evidence.push(
                format!("authorization logic at line {line_no} was not requested"),
                "authorization".to_string(),
            );
        }
        if VALIDATION_HINT.is_match(line)
            && !prompt_mentions(prompt, &["validat", "check", "verify", "type"])
        {
            evidence.push(
                format!("input validation at line {line_no} was not requested"),
                "validation".to_string(),
            );
        }
    }
    if TRY_BLOCK.is_match(scanned)
        && !prompt_mentions(prompt, &["error", "exception", "handle", "robust", "safe"])
    {
        evidence.push(
            "error-handling scaffolding (try/except) was not requested".to_string(),
            "error_handling".to_string(),
        );
    }
    evidence
}

/// Prompt-bias scan: literals from the prompt hardcoded into the code.
pub fn prompt_bias_scan(prompt: &str, code: &str) -> TierEvidence {
    let mut evidence = TierEvidence {
        confidence: 0.5,
        severity: 6,
        ..TierEvidence::default()
    };
    let scanned = code_before_main_block(code);

    for quoted in QUOTED.captures_iter(prompt) {
        let value = quoted
            .get(1)
            .or_else(|| quoted.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if value.len() >= 2 && scanned.contains(value) {
            evidence.push(
                format!("prompt string \"{value}\" appears verbatim in the code"),
                value.to_string(),
            );
        }
    }
    // An example sequence counts as hardcoded when a code literal holds the
    // same constituents, in any order: [3,1,2] in the prompt matches a
    // hardcoded [1, 2, 3].
    for bracketed in BRACKETED.find_iter(prompt) {
        let mut wanted = sequence_numbers(bracketed.as_str());
        if wanted.len() < 2 {
            continue;
        }
        wanted.sort_unstable();
        let hardcoded = BRACKETED.find_iter(scanned).any(|code_literal| {
            let mut got = sequence_numbers(code_literal.as_str());
            got.sort_unstable();
            got == wanted
        });
        if hardcoded {
            evidence.push(
                format!(
                    "the example sequence {} from the prompt shows up as a code literal with the same elements",
                    bracketed.as_str()
                ),
                bracketed.as_str().to_string(),
            );
        }
    }
    for number in NUMBER.find_iter(prompt) {
        let value = number.as_str();
        if matches!(value, "0" | "1" | "-1") {
            continue;
        }
        let needle = format!(" {value}");
        let padded = format!(" {scanned}");
        if padded.contains(&needle) || scanned.contains(&format!("({value}")) {
            evidence.push(
                format!("prompt example number {value} is hardcoded in the code"),
                value.to_string(),
            );
        }
    }
    evidence
}

/// The numbers inside a bracketed sequence literal, spacing ignored.
fn sequence_numbers(text: &str) -> Vec<String> {
    NUMBER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Action/data-type keywords with the code-side spellings that satisfy them.
const FEATURE_SYNONYMS: [(&str, &[&str]); 18] = [
    ("sort", &["sort", "sorted"]),
    ("reverse", &["reverse", "reversed", "[::-1]"]),
    ("filter", &["filter", "if"]),
    ("remove", &["remove", "pop", "del", "discard", "filter"]),
    ("exclude", &["filter", "if", "not"]),
    ("average", &["average", "avg", "mean", "/"]),
    ("mean", &["mean", "average", "avg", "/"]),
    ("sum", &["sum", "+", "total"]),
    ("count", &["count", "len", "sum"]),
    ("maximum", &["max"]),
    ("minimum", &["min"]),
    ("multiply", &["*", "prod", "product"]),
    ("divide", &["/", "div"]),
    ("subtract", &["-", "minus", "diff"]),
    ("validate", &["valid", "isinstance", "raise", "check"]),
    ("duplicate", &["set", "dict", "seen", "dedup", "unique"]),
    ("unique", &["set", "seen", "unique", "dedup"]),
    ("merge", &["merge", "update", "+", "extend", "combine"]),
];

/// Missing-feature scan: prompt keywords with no counterpart in the code.
pub fn missing_feature_scan(prompt: &str, code: &str) -> TierEvidence {
    let mut evidence = TierEvidence {
        confidence: 0.45,
        severity: 5,
        ..TierEvidence::default()
    };
    let prompt_lower = prompt.to_lowercase();
    let code_lower = code.to_lowercase();

    for (keyword, spellings) in FEATURE_SYNONYMS {
        if !prompt_lower.contains(keyword) {
            continue;
        }
        let satisfied = spellings.iter().any(|s| code_lower.contains(s));
        if !satisfied {
            evidence.push(
                format!("the prompt asks to {keyword} but nothing in the code spells that out"),
                keyword.to_string(),
            );
        }
    }
    evidence
}

/// Misinterpretation scan: polarity, selection, and algorithm cues.
pub fn misinterpretation_scan(prompt: &str, code: &str) -> TierEvidence {
    let mut evidence = TierEvidence {
        confidence: 0.5,
        severity: 7,
        ..TierEvidence::default()
    };
    let prompt_lower = prompt.to_lowercase();
    let has_return = RETURN_STMT.is_match(code);
    let has_print = PRINT_CALL.is_match(code_before_main_block(code));

    if prompt_lower.contains("return") && !has_return && has_print {
        evidence.push(
            "the prompt asks to return a value but the code only prints".to_string(),
            "prints_instead_of_returning".to_string(),
        );
    }
    if (prompt_lower.contains("print") || prompt_lower.contains("display")) && !has_print && has_return {
        evidence.push(
            "the prompt asks to print but the code only returns".to_string(),
            "returns_instead_of_printing".to_string(),
        );
    }
    if prompt_mentions(prompt, &["filter", "remove", "exclude", "only the", "keep only"])
        && !CONDITIONAL.is_match(code)
    {
        evidence.push(
            "the prompt asks for selective filtering but the code has no conditional selection"
                .to_string(),
            "no_conditional_selection".to_string(),
        );
    }
    if prompt_mentions(prompt, &["average", "mean"])
        && SUM_CALL.is_match(code)
        && !DIVISION.is_match(code)
    {
        evidence.push(
            "the prompt asks for the average but the code computes a sum and never divides"
                .to_string(),
            "sum_instead_of_average".to_string(),
        );
    }
    evidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_before_main_block_cuts_harness() {
        let code = "def f(x):\n    return x\n\nif __name__ == \"__main__\":\n    print(f(1))\n";
        let head = code_before_main_block(code);
        assert!(head.contains("def f"));
        assert!(!head.contains("print"));
    }

    #[test]
    fn test_npc_flags_unrequested_print() {
        let evidence = npc_scan("add two numbers", "def add(a, b):\n    print(a + b)\n    return a + b\n");
        assert!(evidence.values.contains(&"print".to_string()));
    }

    #[test]
    fn test_npc_allows_requested_print() {
        let evidence = npc_scan("print the sum of two numbers", "def add(a, b):\n    print(a + b)\n");
        assert!(!evidence.values.contains(&"print".to_string()));
    }

    #[test]
    fn test_npc_skips_comments_and_main_block() {
        let code = "def add(a, b):\n    # print(a) would help debugging\n    return a + b\n\nif __name__ == \"__main__\":\n    print(add(1, 2))\n";
        let evidence = npc_scan("add two numbers", code);
        assert!(evidence.is_empty());
    }

    #[test]
    fn test_prompt_bias_finds_sequence_example() {
        let evidence = prompt_bias_scan("sort the list, e.g., [3,1,2]", "def sort(x):\n    return [1,2,3]\n");
        assert!(
            evidence.values.iter().any(|v| v.contains("3,1,2")),
            "values: {:?}",
            evidence.values
        );
    }

    #[test]
    fn test_prompt_bias_ignores_main_block_literal() {
        let code = "def sort(x):\n    return sorted(x)\n\nif __name__ == \"__main__\":\n    print(sort([3, 1, 2]))\n";
        let evidence = prompt_bias_scan("sort the list, e.g., [3,1,2]", code);
        assert!(evidence.is_empty(), "items: {:?}", evidence.items);
    }

    #[test]
    fn test_prompt_bias_finds_quoted_string() {
        let evidence = prompt_bias_scan(
            "greet the user, e.g. \"hello world\"",
            "def greet(name):\n    return \"hello world\"\n",
        );
        assert_eq!(evidence.values, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_missing_feature_spots_absent_sort() {
        let evidence = missing_feature_scan("sort the list of numbers", "def f(xs):\n    return xs\n");
        assert!(evidence.values.contains(&"sort".to_string()));
    }

    #[test]
    fn test_missing_feature_satisfied_by_synonym() {
        let evidence = missing_feature_scan("sort the list", "def f(xs):\n    return sorted(xs)\n");
        assert!(evidence.is_empty());
    }

    #[test]
    fn test_misinterpretation_sum_for_average() {
        let evidence = misinterpretation_scan(
            "return the average of a list of numbers",
            "def avg(nums):\n    return sum(nums)\n",
        );
        assert!(evidence
            .values
            .contains(&"sum_instead_of_average".to_string()));
    }

    #[test]
    fn test_misinterpretation_polarity_reversal() {
        let evidence = misinterpretation_scan(
            "print the largest number",
            "def largest(xs):\n    return max(xs)\n",
        );
        assert!(evidence
            .values
            .contains(&"returns_instead_of_printing".to_string()));
    }

    #[test]
    fn test_misinterpretation_quiet_on_faithful_code() {
        let evidence = misinterpretation_scan(
            "return the average of a list of numbers",
            "def avg(nums):\n    return sum(nums) / len(nums)\n",
        );
        assert!(evidence.is_empty());
    }
}
