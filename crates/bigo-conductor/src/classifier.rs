//! Heuristic task classifier.
//!
//! Scores the lower-cased task text against weighted regular expressions per
//! tier, picks the best tier, then clamps it using rough scope estimates
//! (changed lines, touched files) read from fixed lexical cues.

use std::sync::Arc;

use bigo_core::{ClassificationResult, RoutingPolicy, Tier};
use regex::Regex;

/// A named, weighted pattern contributing to one tier's score.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
    pub weight: f64,
}

impl Pattern {
    pub fn new(name: impl Into<String>, pattern: &str, weight: f64) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            weight,
        })
    }
}

/// A scope bucket: when `regex` matches, the estimate is `value`.
#[derive(Debug, Clone)]
pub struct ScopeCue {
    pub regex: Regex,
    pub value: u32,
}

impl ScopeCue {
    pub fn new(pattern: &str, value: u32) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            value,
        })
    }
}

/// The full rule set: tier patterns plus scope buckets.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    /// Pattern lists in ascending tier severity.
    pub tiers: Vec<(Tier, Vec<Pattern>)>,
    /// Line-count buckets, narrowest first; first match wins.
    pub line_cues: Vec<ScopeCue>,
    pub default_lines: u32,
    /// File-count buckets, narrowest first; first match wins.
    pub file_cues: Vec<ScopeCue>,
    pub default_files: u32,
}

type PatternSpec = (&'static str, &'static str, f64);

const TRIVIAL: &[PatternSpec] = &[
    ("typo", r"(?i)\b(typo|spelling|spelt|misspell)", 0.9),
    ("format", r"(?i)\b(format|indent|whitespace|spacing)\b", 0.8),
    ("comment", r"(?i)\b(add|update|fix)\s+(a\s+)?comment", 0.8),
    ("rename_local", r"(?i)\brename\s+(the\s+)?(variable|param|local)", 0.7),
    ("simple_string", r"(?i)\b(change|update)\s+(the\s+)?(string|text|message|label)", 0.6),
    ("import", r"(?i)\b(add|remove|fix)\s+(an?\s+)?import", 0.7),
];

const SIMPLE: &[PatternSpec] = &[
    ("add_function", r"(?i)\badd\s+(a\s+)?(simple\s+)?(function|method|helper)", 0.7),
    ("fix_bug_obvious", r"(?i)\bfix\s+(the\s+)?(bug|issue|error|crash)\s+(in|where|when)", 0.6),
    ("update_config", r"(?i)\b(update|change|modify)\s+(the\s+)?config", 0.7),
    ("add_field", r"(?i)\badd\s+(a\s+)?(new\s+)?(field|property|attribute)", 0.6),
    ("simple_validation", r"(?i)\badd\s+(simple\s+)?validation", 0.6),
    ("update_constant", r"(?i)\b(update|change)\s+(the\s+)?(constant|value|default)", 0.7),
];

const STANDARD: &[PatternSpec] = &[
    ("new_feature", r"(?i)\b(implement|create|build|add)\s+(a\s+)?(new\s+)?feature", 0.7),
    ("refactor", r"(?i)\brefactor\b", 0.6),
    ("add_tests", r"(?i)\b(add|write|create)\s+(unit\s+)?tests?", 0.6),
    ("api_endpoint", r"(?i)\b(add|create|implement)\s+(an?\s+)?(api\s+)?endpoint", 0.7),
    ("component", r"(?i)\b(create|build|add)\s+(a\s+)?(new\s+)?component", 0.6),
    ("integration", r"(?i)\bintegrat(e|ion)\b", 0.5),
];

const COMPLEX: &[PatternSpec] = &[
    ("architecture", r"(?i)\b(architect|redesign|restructure)", 0.8),
    ("migration", r"(?i)\b(migrat|data\s+migration)", 0.8),
    ("cross_cutting", r"(?i)\b(across|throughout|all)\s+(the\s+)?((entire|whole)\s+)?(codebase|project|system)", 0.7),
    ("api_breaking", r"(?i)\bbreaking\s+change", 0.8),
    ("multiple_services", r"(?i)\bmultiple\s+(service|system|component)s", 0.7),
    ("database_schema", r"(?i)\b(database|db)\s+schema", 0.7),
];

const CRITICAL: &[PatternSpec] = &[
    (
        "security",
        r"(?i)\b(security|vulnerab|exploit|injection|xss|csrf|auth(entication|orization)?)\b",
        0.9,
    ),
    ("payments", r"(?i)\b(payment|billing|transaction|money|financial)", 0.9),
    ("encryption", r"(?i)\b(encrypt|decrypt|crypto|hash|secret|credential)", 0.8),
    ("core_algorithm", r"(?i)\bcore\s+(algorithm|logic|system)", 0.8),
    ("production_data", r"(?i)\bproduction\s+(data|database|system)", 0.9),
    ("user_data", r"(?i)\b(user|customer|personal)\s+data", 0.8),
];

// Narrowest bucket first; the first cue found in the text wins. Cues match
// as word prefixes, so "files" and "completely" count.
const LINE_CUES: &[(&str, u32)] = &[
    (r"\b(single|one)\s+line", 1),
    (r"\bfew\s+lines", 5),
    (r"\b(small|minor)", 20),
    (r"\b(large|major|significant)", 200),
    (r"\b(entire|complete|full)", 500),
];

const FILE_CUES: &[(&str, u32)] = &[
    (r"\b(single|one|this)\s+file", 1),
    (r"\b(multiple|several)\s+file", 5),
    (r"\b(across|throughout)", 10),
    (r"\b(codebase|project-wide)", 20),
];

impl ClassifierRules {
    /// The built-in rule set.
    pub fn builtin() -> Self {
        let compile = |specs: &[PatternSpec]| -> Vec<Pattern> {
            specs
                .iter()
                .map(|(name, pattern, weight)| {
                    Pattern::new(*name, pattern, *weight)
                        .expect("built-in classifier pattern must compile")
                })
                .collect()
        };
        let cues = |specs: &[(&str, u32)]| -> Vec<ScopeCue> {
            specs
                .iter()
                .map(|(pattern, value)| {
                    ScopeCue::new(pattern, *value).expect("built-in scope cue must compile")
                })
                .collect()
        };

        Self {
            tiers: vec![
                (Tier::Trivial, compile(TRIVIAL)),
                (Tier::Simple, compile(SIMPLE)),
                (Tier::Standard, compile(STANDARD)),
                (Tier::Complex, compile(COMPLEX)),
                (Tier::Critical, compile(CRITICAL)),
            ],
            line_cues: cues(LINE_CUES),
            default_lines: 50,
            file_cues: cues(FILE_CUES),
            default_files: 2,
        }
    }

    fn estimate(cues: &[ScopeCue], default: u32, text: &str) -> u32 {
        cues.iter()
            .find(|cue| cue.regex.is_match(text))
            .map(|cue| cue.value)
            .unwrap_or(default)
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Pure text classifier. Never fails: no signal means the standard tier.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: ClassifierRules,
    policy: Arc<RoutingPolicy>,
}

impl Classifier {
    /// Classifier with the built-in rules.
    pub fn new(policy: Arc<RoutingPolicy>) -> Self {
        Self::with_rules(policy, ClassifierRules::builtin())
    }

    pub fn with_rules(policy: Arc<RoutingPolicy>, rules: ClassifierRules) -> Self {
        Self { rules, policy }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn classify(&self, title: &str, description: &str) -> ClassificationResult {
        let text = format!("{title} {description}").to_lowercase();

        // Ascending severity; a later tier must score strictly higher to win,
        // so ties go to the lower tier.
        let mut tier = Tier::Standard;
        let mut best_score = 0.0_f64;
        let mut patterns = Vec::new();
        for (candidate, rules) in &self.rules.tiers {
            let matched: Vec<&Pattern> = rules.iter().filter(|p| p.regex.is_match(&text)).collect();
            let score: f64 = matched.iter().map(|p| p.weight).sum();
            if score > best_score {
                best_score = score;
                tier = *candidate;
                patterns = matched.iter().map(|p| p.name.clone()).collect();
            }
        }

        let confidence = if best_score > 0.0 {
            (0.5 + 0.15 * best_score).min(0.95)
        } else {
            0.5
        };

        let estimated_lines =
            ClassifierRules::estimate(&self.rules.line_cues, self.rules.default_lines, &text);
        let estimated_files =
            ClassifierRules::estimate(&self.rules.file_cues, self.rules.default_files, &text);
        let tier = adjust_for_scope(tier, estimated_lines, estimated_files);

        let mut result = ClassificationResult {
            tier,
            confidence,
            recommended_backend: self.policy.primary(tier),
            reasoning: String::new(),
            patterns,
            estimated_lines,
            estimated_files,
        };
        result.reasoning = reasoning(&result);
        result
    }

    /// Apply a caller-forced tier to an existing classification.
    pub fn force_tier(&self, mut result: ClassificationResult, tier: Tier) -> ClassificationResult {
        result.tier = tier;
        result.recommended_backend = self.policy.primary(tier);
        result.reasoning = format!("{} (tier forced)", reasoning(&result));
        result
    }
}

/// Clamp the tier into the range the scope estimate allows.
fn adjust_for_scope(tier: Tier, lines: u32, files: u32) -> Tier {
    if (lines > 500 || files > 10) && tier < Tier::Complex {
        return Tier::Complex;
    }
    if (lines > 200 || files > 5) && tier < Tier::Standard {
        return Tier::Standard;
    }
    if lines < 10 && files == 1 && tier > Tier::Simple {
        return Tier::Simple;
    }
    tier
}

fn reasoning(result: &ClassificationResult) -> String {
    let mut parts = vec![format!("Tier: {}", result.tier)];
    if !result.patterns.is_empty() {
        parts.push(format!("Matched patterns: {}", result.patterns.join(", ")));
    }
    parts.push(format!(
        "Estimated scope: ~{} lines across {} file(s)",
        result.estimated_lines, result.estimated_files
    ));
    parts.join(". ")
}
