//! Connectivity transitions driven by property verdicts.

use tracing::{debug, warn};

use super::property::CheckSpec;
use crate::domain::node::{OfflineCause, DEFAULT_CAUSE_TEXT};
use crate::domain::registry::ConnectivityRegistry;
use crate::domain::verdict::{EvaluationResult, Verdict};

/// What a single poll concluded about a node. Not stored between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoOpinion,
    ConfirmedHealthy,
    ConfirmedUnhealthy,
}

/// Cause text recorded when `spec`'s check takes a node offline.
pub fn cause_text(spec: &CheckSpec) -> String {
    if spec.column_name.is_empty() {
        DEFAULT_CAUSE_TEXT.to_string()
    } else {
        format!("{} out of range", spec.column_name)
    }
}

/// Apply the connectivity policy for `result` to `node`.
///
/// Indeterminate results leave the node exactly as found. Registry refusals
/// are logged and swallowed; they never fail the poll.
pub async fn apply(
    registry: &dyn ConnectivityRegistry,
    node: &str,
    result: &EvaluationResult,
    spec: &CheckSpec,
    trigger: &str,
) -> Outcome {
    match result.verdict {
        Verdict::Indeterminate => {
            debug!(node = %node, trigger, "indeterminate, leaving connectivity alone");
            Outcome::NoOpinion
        }
        Verdict::Healthy => {
            match registry.mark_online(node).await {
                Ok(changed) => debug!(node = %node, trigger, changed, "healthy"),
                Err(e) => warn!(node = %node, trigger, error = %e, "could not mark node online"),
            }
            Outcome::ConfirmedHealthy
        }
        Verdict::Unhealthy => {
            let cause = OfflineCause::new(cause_text(spec), trigger);
            match registry.mark_offline(node, cause).await {
                Ok(changed) => debug!(node = %node, trigger, changed, "unhealthy"),
                Err(e) => warn!(node = %node, trigger, error = %e, "could not mark node offline"),
            }
            Outcome::ConfirmedUnhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::tests::{offline_node, registry_with};
    use crate::domain::registry::NodeRegistry;

    fn result(verdict: Verdict) -> EvaluationResult {
        EvaluationResult {
            verdict,
            value: Some("93".into()),
            detail: None,
        }
    }

    fn spec(column_name: &str) -> CheckSpec {
        CheckSpec {
            column_name: column_name.to_string(),
            ..CheckSpec::default()
        }
    }

    #[test]
    fn cause_text_uses_column_name_or_fallback() {
        assert_eq!(cause_text(&spec("Disk")), "Disk out of range");
        assert_eq!(cause_text(&spec("")), "Node property check failed");
    }

    #[tokio::test]
    async fn indeterminate_is_a_no_op() {
        let registry = NodeRegistry::new();
        registry.register(offline_node("down", "")).await;
        let up = registry_with(&["up"]).await;

        let before = registry.get("down").await.unwrap().state;
        let outcome = apply(&registry, "down", &result(Verdict::Indeterminate), &spec("Disk"), "t").await;
        assert_eq!(outcome, Outcome::NoOpinion);
        assert_eq!(registry.get("down").await.unwrap().state, before);

        apply(&up, "up", &result(Verdict::Indeterminate), &spec("Disk"), "t").await;
        assert!(up.get("up").await.unwrap().is_online());
    }

    #[tokio::test]
    async fn healthy_twice_stays_online() {
        let registry = registry_with(&["a"]).await;
        registry
            .mark_offline("a", OfflineCause::new("stale", "t"))
            .await
            .unwrap();

        for _ in 0..2 {
            let outcome = apply(&registry, "a", &result(Verdict::Healthy), &spec("Disk"), "t").await;
            assert_eq!(outcome, Outcome::ConfirmedHealthy);
            let node = registry.get("a").await.unwrap();
            assert!(node.is_online());
            assert!(node.offline_cause().is_none());
        }
    }

    #[tokio::test]
    async fn unhealthy_twice_replaces_cause() {
        let registry = registry_with(&["a"]).await;

        apply(&registry, "a", &result(Verdict::Unhealthy), &spec("Disk"), "disk").await;
        let first = registry.get("a").await.unwrap();
        assert_eq!(first.offline_cause().unwrap().cause_text, "Disk out of range");

        apply(&registry, "a", &result(Verdict::Unhealthy), &spec("Memory"), "memory").await;
        let second = registry.get("a").await.unwrap();
        assert!(!second.is_online());
        let cause = second.offline_cause().unwrap();
        assert_eq!(cause.cause_text, "Memory out of range");
        assert_eq!(cause.trigger, "memory");
    }

    #[tokio::test]
    async fn refusals_are_swallowed() {
        let registry = registry_with(&["a"]).await;
        registry.set_enabled("a", false).await.unwrap();

        let outcome = apply(&registry, "a", &result(Verdict::Healthy), &spec("Disk"), "t").await;
        assert_eq!(outcome, Outcome::ConfirmedHealthy);
        assert!(!registry.get("a").await.unwrap().is_online());

        let outcome = apply(&registry, "ghost", &result(Verdict::Unhealthy), &spec(""), "t").await;
        assert_eq!(outcome, Outcome::ConfirmedUnhealthy);
    }
}
