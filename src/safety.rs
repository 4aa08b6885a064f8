use crate::config::SafetyConfig;
use crate::error::ConfigError;
use crate::types::{ActionStep, Plan, RiskLevel, SafetyAnalysis};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

/// Compiled form of [`SafetyConfig`]. Built once, shared read-only.
#[derive(Debug, Clone)]
pub struct SafetyRules {
    dangerous: Vec<Regex>,
    elevation_indicators: Vec<String>,
    protected_paths: Vec<String>,
    trust_declared_risk: bool,
}

impl SafetyRules {
    pub fn from_config(config: &SafetyConfig) -> Result<Self, ConfigError> {
        let dangerous = config
            .dangerous_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dangerous,
            elevation_indicators: lowered(&config.elevation_indicators),
            protected_paths: lowered(&config.protected_paths),
            trust_declared_risk: config.trust_declared_risk,
        })
    }

    pub fn is_dangerous(&self, command: &str) -> bool {
        self.dangerous.iter().any(|re| re.is_match(command))
    }

    fn requires_elevation(&self, lowered: &str) -> bool {
        self.elevation_indicators
            .iter()
            .any(|indicator| lowered.contains(indicator.as_str()))
    }

    fn touches_protected_path(&self, lowered: &str) -> bool {
        self.protected_paths
            .iter()
            .any(|path| lowered.contains(path.as_str()))
    }
}

fn lowered(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// Inspects a plan for dangerous commands, privilege escalation and protected
/// paths. Pure: the same plan always yields the same analysis.
pub fn analyze(plan: &Plan, rules: &SafetyRules) -> SafetyAnalysis {
    let mut flagged_step_ids = BTreeSet::new();
    let mut safety_flags = Vec::new();
    let mut requires_elevated_privileges = false;
    let mut pattern_matched = false;

    for step in &plan.steps {
        let lowered = step.command.to_lowercase();

        if rules.is_dangerous(&step.command) {
            pattern_matched = true;
            safety_flags.push(format!("Dangerous pattern detected in step {}", step.id));
        }

        if rules.requires_elevation(&lowered) {
            requires_elevated_privileges = true;
            safety_flags.push(format!(
                "Step {} requires administrative privileges",
                step.id
            ));
        }

        if rules.touches_protected_path(&lowered) {
            safety_flags.push(format!("Step {} accesses system directory", step.id));
        }

        if step.risk_level.is_flagged() {
            flagged_step_ids.insert(step.id);
        }
    }

    let overall_risk = if rules.trust_declared_risk {
        plan.overall_risk
    } else {
        recomputed_risk(plan, pattern_matched)
    };

    SafetyAnalysis {
        overall_risk,
        flagged_step_ids,
        safety_flags,
        requires_elevated_privileges,
    }
}

fn recomputed_risk(plan: &Plan, pattern_matched: bool) -> RiskLevel {
    let step_max = plan
        .steps
        .iter()
        .map(|s: &ActionStep| s.risk_level)
        .max()
        .unwrap_or(RiskLevel::Low);
    let floor = if pattern_matched {
        RiskLevel::Dangerous
    } else {
        RiskLevel::Low
    };
    plan.overall_risk.max(step_max).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: u32, command: &str, risk: RiskLevel) -> ActionStep {
        ActionStep {
            id,
            tool_name: "shell".to_string(),
            command: command.to_string(),
            risk_level: risk,
            explanation: String::new(),
        }
    }

    fn plan(overall: RiskLevel, steps: Vec<ActionStep>) -> Plan {
        Plan {
            reasoning: "test".to_string(),
            steps,
            overall_risk: overall,
            confirmation_prompt: "Proceed?".to_string(),
        }
    }

    fn rules() -> SafetyRules {
        SafetyRules::from_config(&SafetyConfig::default()).unwrap()
    }

    #[test]
    fn dangerous_pattern_is_case_insensitive() {
        let p = plan(
            RiskLevel::Low,
            vec![step(1, "RM -RF /var/tmp", RiskLevel::Low)],
        );
        let analysis = analyze(&p, &rules());
        assert_eq!(analysis.safety_flags, vec!["Dangerous pattern detected in step 1"]);
    }

    #[test]
    fn multiple_patterns_on_one_step_flag_once() {
        let p = plan(
            RiskLevel::Low,
            vec![step(1, "rm -rf / && dd if=/dev/zero of=x", RiskLevel::Low)],
        );
        let analysis = analyze(&p, &rules());
        let dangerous = analysis
            .safety_flags
            .iter()
            .filter(|f| f.starts_with("Dangerous pattern"))
            .count();
        assert_eq!(dangerous, 1);
    }

    #[test]
    fn checks_are_independent() {
        let p = plan(
            RiskLevel::High,
            vec![step(3, "sudo rm -rf /etc/foo", RiskLevel::Dangerous)],
        );
        let analysis = analyze(&p, &rules());
        assert_eq!(
            analysis.safety_flags,
            vec![
                "Dangerous pattern detected in step 3",
                "Step 3 requires administrative privileges",
                "Step 3 accesses system directory",
            ]
        );
        assert!(analysis.requires_elevated_privileges);
        assert!(analysis.flagged_step_ids.contains(&3));
    }

    #[test]
    fn flags_only_high_and_dangerous_steps() {
        let p = plan(
            RiskLevel::High,
            vec![
                step(1, "ls", RiskLevel::Low),
                step(2, "mv a b", RiskLevel::Medium),
                step(3, "rm a", RiskLevel::High),
                step(4, "rm b", RiskLevel::Dangerous),
            ],
        );
        let analysis = analyze(&p, &rules());
        assert_eq!(analysis.flagged_step_ids.into_iter().collect::<Vec<_>>(), vec![3, 4]);
        assert!(!analysis.requires_elevated_privileges);
    }

    #[test]
    fn declared_risk_is_carried_verbatim_by_default() {
        let p = plan(
            RiskLevel::Low,
            vec![step(1, "rm -rf /", RiskLevel::Dangerous)],
        );
        assert_eq!(analyze(&p, &rules()).overall_risk, RiskLevel::Low);
    }

    #[test]
    fn untrusted_mode_recomputes_overall_risk() {
        let config = SafetyConfig {
            trust_declared_risk: false,
            ..SafetyConfig::default()
        };
        let rules = SafetyRules::from_config(&config).unwrap();

        let from_steps = plan(RiskLevel::Low, vec![step(1, "mv a b", RiskLevel::High)]);
        assert_eq!(analyze(&from_steps, &rules).overall_risk, RiskLevel::High);

        let from_pattern = plan(RiskLevel::Low, vec![step(1, "dd if=/dev/zero", RiskLevel::Low)]);
        assert_eq!(analyze(&from_pattern, &rules).overall_risk, RiskLevel::Dangerous);
    }

    #[test]
    fn analysis_is_idempotent() {
        let p = plan(
            RiskLevel::High,
            vec![
                step(2, "sudo apt install x", RiskLevel::High),
                step(1, "cat /etc/hosts", RiskLevel::Low),
            ],
        );
        let rules = rules();
        let first = serde_json::to_string(&analyze(&p, &rules)).unwrap();
        let second = serde_json::to_string(&analyze(&p, &rules)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = SafetyConfig {
            dangerous_patterns: vec!["(unclosed".to_string()],
            ..SafetyConfig::default()
        };
        assert!(matches!(
            SafetyRules::from_config(&config),
            Err(ConfigError::Pattern { .. })
        ));
    }
}
