//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Ordered failure classification. The first rule whose predicate matches wins.

use faultline_common::FailureCategory;
use faultline_history::HealingStrategy;
use once_cell::sync::Lazy;
use regex::Regex;

/// One entry of the classification table.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub category: FailureCategory,
    pub strategy: HealingStrategy,
    pub predicate: fn(&str) -> bool,
}

impl std::fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("strategy", &self.strategy)
            .finish()
    }
}

static DEPENDENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(ModuleNotFoundError|ImportError|No module named|cannot import name|dependency error|unresolved import|Cannot find module|could not resolve dependenc)",
    )
    .expect("invalid dependency pattern")
});

static CONFIGURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(FileNotFoundError|No such file or directory|configuration error|parse error|ParseError|JSONDecodeError|yaml\.(scanner|parser)|invalid (toml|yaml|json)|missing (required )?(field|key|config))",
    )
    .expect("invalid configuration pattern")
});

static HEALTH_CHECK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(connection refused|connection reset|ConnectionError|timed out|timeout|health check error|/health\S*\s.*\b[3-5]\d\d\b|\b[3-5]\d\d\b.*/health|unhealthy)",
    )
    .expect("invalid health check pattern")
});

static INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(injection error|InjectionError|fault injection|scenario '?[\w.-]+'? failed|stress-ng|netem|tc qdisc)",
    )
    .expect("invalid injection pattern")
});

pub fn is_dependency_failure(output: &str) -> bool {
    DEPENDENCY.is_match(output)
}

pub fn is_configuration_failure(output: &str) -> bool {
    CONFIGURATION.is_match(output)
}

pub fn is_health_check_failure(output: &str) -> bool {
    HEALTH_CHECK.is_match(output)
}

pub fn is_injection_failure(output: &str) -> bool {
    INJECTION.is_match(output)
}

fn matches_anything(_: &str) -> bool {
    true
}

const FALLBACK: ClassificationRule = ClassificationRule {
    name: "fallback",
    category: FailureCategory::Generic,
    strategy: HealingStrategy::Backoff,
    predicate: matches_anything,
};

/// Evaluated top to bottom.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "module-resolution",
        category: FailureCategory::Dependency,
        strategy: HealingStrategy::InstallDependencies,
        predicate: is_dependency_failure,
    },
    ClassificationRule {
        name: "missing-or-malformed-file",
        category: FailureCategory::Configuration,
        strategy: HealingStrategy::ManualIntervention,
        predicate: is_configuration_failure,
    },
    ClassificationRule {
        name: "health-endpoint",
        category: FailureCategory::HealthCheck,
        strategy: HealingStrategy::HealthBackoff,
        predicate: is_health_check_failure,
    },
    ClassificationRule {
        name: "scenario-exception",
        category: FailureCategory::Injection,
        strategy: HealingStrategy::StabilizationWait,
        predicate: is_injection_failure,
    },
    FALLBACK,
];

/// First matching rule for `output`.
pub fn matching_rule(output: &str) -> &'static ClassificationRule {
    RULES
        .iter()
        .find(|rule| (rule.predicate)(output))
        .unwrap_or(&FALLBACK)
}

pub fn classify(output: &str) -> FailureCategory {
    matching_rule(output).category
}

pub fn strategy_for(category: FailureCategory) -> HealingStrategy {
    RULES
        .iter()
        .find(|rule| rule.category == category)
        .map(|rule| rule.strategy)
        .unwrap_or(HealingStrategy::Backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_recognise_their_category() {
        assert!(is_dependency_failure(
            "ModuleNotFoundError: No module named 'yaml'"
        ));
        assert!(is_configuration_failure(
            "FileNotFoundError: [Errno 2] No such file or directory: 'chaos.toml'"
        ));
        assert!(is_health_check_failure(
            "GET http://localhost:8080/health returned 503"
        ));
        assert!(is_health_check_failure("curl: (7) Failed to connect: Connection refused"));
        assert!(is_injection_failure("scenario 'cpu-heavy' failed: stress-ng exited 1"));
        assert!(!is_dependency_failure("all good"));
    }

    #[test]
    fn first_matching_rule_wins() {
        // Mentions both a missing module and a timeout.
        let mixed = "ImportError: cannot import name 'x'; request timed out";
        assert_eq!(classify(mixed), FailureCategory::Dependency);
        assert_eq!(
            classify("configuration error: invalid toml; connection refused"),
            FailureCategory::Configuration
        );
        assert_eq!(classify("segmentation fault"), FailureCategory::Generic);
        assert_eq!(matching_rule("segmentation fault").name, "fallback");
    }

    #[test]
    fn every_category_has_a_strategy() {
        for category in FailureCategory::ALL {
            let rule = RULES.iter().find(|r| r.category == category).unwrap();
            assert_eq!(strategy_for(category), rule.strategy);
        }
        assert_eq!(
            strategy_for(FailureCategory::Configuration),
            HealingStrategy::ManualIntervention
        );
    }
}
