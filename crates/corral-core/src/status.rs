//! Status synthesis
//!
//! Pure functions collapsing a cluster's conditions and phase, and its
//! machines' conditions and phases, into uniform [`GenericStatus`] views.

use corral_common::crd::{
    find_condition, machine_phase, Cluster, ClusterPhase, Condition, ConditionStatus, Machine,
};

use crate::models::{GenericStatus, NodeCondition, NodeStatus, StatusIndicator};

/// CAPI condition types consulted by the synthesizer
pub mod condition_type {
    /// Overall readiness of the cluster
    pub const READY: &str = "Ready";
    /// Control plane readiness
    pub const CONTROL_PLANE_READY: &str = "ControlPlaneReady";
    /// Infrastructure readiness
    pub const INFRASTRUCTURE_READY: &str = "InfrastructureReady";
    /// Result of the machine health check
    pub const MACHINE_HEALTH_CHECK_SUCCEEDED: &str = "MachineHealthCheckSucceeded";
    /// Machine's node health as seen by CAPI
    pub const MACHINE_NODE_HEALTHY: &str = "MachineNodeHealthy";
    /// Node health reported on the Machine
    pub const NODE_HEALTHY: &str = "NodeHealthy";
}

/// Reasons the control plane provider reports before the server is up
const WAITING_FOR_SERVER_REASONS: &[&str] = &["WaitingForRKE2Server", "WaitingForKThreesServer"];

const WAITING_FOR_SERVER_MESSAGE: &str =
    "waiting for control plane provider to indicate the control plane has been initialized";

const WAITING_FOR_NODE_REF: &str = "WaitingForNodeRef";
const WAITING_FOR_NODE_REF_MESSAGE: &str = "waiting for node to be provisioned";

/// Messages a readiness view reports for each condition status
#[derive(Clone, Copy, Debug)]
pub struct ReadinessMessages {
    /// Status `True`
    pub ready: &'static str,
    /// Status `False`
    pub not_ready: &'static str,
    /// Any other status
    pub unknown: &'static str,
}

/// Messages of the `Ready` view
pub const PROVIDER_STATUS_MESSAGES: ReadinessMessages = ReadinessMessages {
    ready: "ready",
    not_ready: "not ready",
    unknown: "unknown",
};

/// Messages of the `ControlPlaneReady` view
pub const CONTROL_PLANE_MESSAGES: ReadinessMessages = ReadinessMessages {
    ready: "control plane ready",
    not_ready: "control plane not ready",
    unknown: "control plane readiness unknown",
};

/// Messages of the `InfrastructureReady` view
pub const INFRASTRUCTURE_MESSAGES: ReadinessMessages = ReadinessMessages {
    ready: "infrastructure ready",
    not_ready: "infrastructure not ready",
    unknown: "infrastructure readiness unknown",
};

fn unix(seconds: i64) -> u64 {
    u64::try_from(seconds).unwrap_or(0)
}

fn first_transition(conditions: &[Condition]) -> u64 {
    conditions.first().map(|c| unix(c.transition_unix())).unwrap_or(0)
}

/// Readiness view of one condition type
pub fn component_ready(
    cluster: &Cluster,
    condition_type: &str,
    msgs: &ReadinessMessages,
) -> GenericStatus {
    let Some(condition) = find_condition(cluster.conditions(), condition_type) else {
        return GenericStatus::new(StatusIndicator::Unspecified, "condition not found", 0);
    };
    let timestamp = unix(condition.transition_unix());

    match condition.status {
        ConditionStatus::True => GenericStatus::new(StatusIndicator::Idle, msgs.ready, timestamp),
        ConditionStatus::False => {
            let reason = condition.reason_or_empty();
            let message = if WAITING_FOR_SERVER_REASONS.contains(&reason) {
                format!("{};{}", msgs.not_ready, WAITING_FOR_SERVER_MESSAGE)
            } else {
                format!("{};{}", msgs.not_ready, reason)
            };
            GenericStatus::new(StatusIndicator::InProgress, message, timestamp)
        }
        ConditionStatus::Unknown => {
            GenericStatus::new(StatusIndicator::Error, msgs.unknown, timestamp)
        }
    }
}

/// View of the `Ready` condition
pub fn provider_status(cluster: &Cluster) -> GenericStatus {
    component_ready(cluster, condition_type::READY, &PROVIDER_STATUS_MESSAGES)
}

/// View of the `ControlPlaneReady` condition
pub fn control_plane_ready(cluster: &Cluster) -> GenericStatus {
    component_ready(
        cluster,
        condition_type::CONTROL_PLANE_READY,
        &CONTROL_PLANE_MESSAGES,
    )
}

/// View of the `InfrastructureReady` condition
pub fn infrastructure_ready(cluster: &Cluster) -> GenericStatus {
    component_ready(
        cluster,
        condition_type::INFRASTRUCTURE_READY,
        &INFRASTRUCTURE_MESSAGES,
    )
}

/// A `False` condition of a failed cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionFailure {
    /// Condition reason
    pub reason: String,
    /// Condition message
    pub message: String,
}

/// Lifecycle view plus the failures behind a `Failed` phase
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lifecycle {
    /// None when the phase string is not a known CAPI phase
    pub status: Option<GenericStatus>,
    /// Reasons and messages of every `False` condition of a failed cluster
    pub failures: Vec<ConditionFailure>,
}

/// Lifecycle phase of a cluster
pub fn lifecycle_phase(cluster: &Cluster) -> Lifecycle {
    let conditions = cluster.conditions();
    if conditions.is_empty() {
        return Lifecycle {
            status: Some(GenericStatus::new(
                StatusIndicator::Unspecified,
                "Condition not found",
                0,
            )),
            failures: Vec::new(),
        };
    }
    let timestamp = first_transition(conditions);

    let Some(phase) = ClusterPhase::parse(cluster.phase_str()) else {
        return Lifecycle::default();
    };

    let mut failures = Vec::new();
    let status = match phase {
        ClusterPhase::Pending | ClusterPhase::Provisioning | ClusterPhase::Deleting => {
            GenericStatus::new(
                StatusIndicator::InProgress,
                phase.to_string().to_lowercase(),
                timestamp,
            )
        }
        ClusterPhase::Provisioned => {
            if provider_status(cluster).indicator != StatusIndicator::Idle {
                GenericStatus::new(StatusIndicator::InProgress, "provisioned", timestamp)
            } else {
                GenericStatus::new(StatusIndicator::Idle, "active", timestamp)
            }
        }
        ClusterPhase::Failed => {
            failures = conditions
                .iter()
                .filter(|c| c.status == ConditionStatus::False)
                .map(|c| ConditionFailure {
                    reason: c.reason_or_empty().to_string(),
                    message: c.message_or_empty().to_string(),
                })
                .collect();
            GenericStatus::new(StatusIndicator::Error, "failed", timestamp)
        }
        ClusterPhase::Unknown => {
            GenericStatus::new(StatusIndicator::Unspecified, "unknown", timestamp)
        }
    };

    Lifecycle {
        status: Some(status),
        failures,
    }
}

/// Aggregated health of a cluster's machines
pub fn node_health(cluster: &Cluster, machines: &[Machine]) -> GenericStatus {
    let total = machines.len();
    let mut running = 0usize;
    let mut all_healthy = true;
    let mut in_progress = false;
    let mut details: Vec<String> = Vec::new();

    for machine in machines {
        let name = machine.metadata.name.as_deref().unwrap_or_default();
        let mut machine_in_progress = false;

        for condition in machine.conditions() {
            let is_health_check = condition.type_ == condition_type::MACHINE_HEALTH_CHECK_SUCCEEDED
                || condition.type_ == condition_type::MACHINE_NODE_HEALTHY;
            if is_health_check && condition.status == ConditionStatus::False {
                all_healthy = false;
                machine_in_progress = true;
                let reason = match condition.reason_or_empty() {
                    WAITING_FOR_NODE_REF => WAITING_FOR_NODE_REF_MESSAGE,
                    other => other,
                };
                details.push(format!("{}: {}", name, reason));
            }
        }

        match machine.phase_str() {
            machine_phase::RUNNING => {
                running += 1;
                machine_in_progress = false;
            }
            machine_phase::PROVISIONING => {
                machine_in_progress = true;
                details.push(format!("{}: Provisioning", name));
            }
            other => details.push(format!("MachinePhase {}", other)),
        }

        in_progress |= machine_in_progress;
    }

    let timestamp = first_transition(cluster.conditions());
    let details = details.join(";");

    if in_progress {
        GenericStatus::new(
            StatusIndicator::InProgress,
            format!("node(s) health unknown ({}/{});{}", running, total, details),
            timestamp,
        )
    } else if all_healthy && running == total {
        GenericStatus::new(StatusIndicator::Idle, "nodes are healthy", timestamp)
    } else {
        GenericStatus::new(
            StatusIndicator::Error,
            format!("nodes are unhealthy ({}/{});{}", running, total, details),
            timestamp,
        )
    }
}

/// Health of one node, from its Machine
pub fn node_status(machine: &Machine) -> NodeStatus {
    match machine.phase_str() {
        machine_phase::DELETING => {
            return NodeStatus {
                condition: NodeCondition::Removing,
                reason: None,
            }
        }
        machine_phase::PENDING | machine_phase::PROVISIONING => {
            return NodeStatus {
                condition: NodeCondition::Provisioning,
                reason: None,
            }
        }
        _ => {}
    }

    match find_condition(machine.conditions(), condition_type::NODE_HEALTHY) {
        Some(c) if c.status == ConditionStatus::True => NodeStatus {
            condition: NodeCondition::Ready,
            reason: None,
        },
        Some(c) if c.status == ConditionStatus::False => NodeStatus {
            condition: NodeCondition::NotReady,
            reason: c.reason.clone().filter(|r| !r.is_empty()),
        },
        _ => NodeStatus::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use corral_common::crd::{ClusterSpec, ClusterStatus, MachineSpec, MachineStatus};

    fn condition(type_: &str, status: ConditionStatus, reason: &str, at: i64) -> Condition {
        Condition {
            type_: type_.into(),
            status,
            reason: Some(reason.into()),
            message: Some(format!("{} message", type_)),
            last_transition_time: Utc.timestamp_opt(at, 0).single(),
            ..Default::default()
        }
    }

    fn cluster(phase: &str, conditions: Vec<Condition>) -> Cluster {
        let mut c = Cluster::new("edge-1", ClusterSpec::default());
        c.status = Some(ClusterStatus {
            phase: Some(phase.into()),
            conditions,
            ..Default::default()
        });
        c
    }

    fn machine(name: &str, phase: &str, conditions: Vec<Condition>) -> Machine {
        let mut m = Machine::new(name, MachineSpec::default());
        m.status = Some(MachineStatus {
            phase: Some(phase.into()),
            conditions,
            ..Default::default()
        });
        m
    }

    #[test]
    fn test_empty_conditions_are_unspecified() {
        let c = cluster("Provisioned", vec![]);
        for status in [
            provider_status(&c),
            control_plane_ready(&c),
            infrastructure_ready(&c),
            lifecycle_phase(&c).status.unwrap(),
        ] {
            assert_eq!(status.indicator, StatusIndicator::Unspecified);
            assert_eq!(status.timestamp, 0);
        }
        assert_eq!(provider_status(&c).message, "condition not found");
        assert_eq!(lifecycle_phase(&c).status.unwrap().message, "Condition not found");
    }

    #[test]
    fn test_missing_condition_type() {
        let c = cluster(
            "Provisioned",
            vec![condition("Ready", ConditionStatus::True, "", 10)],
        );
        let status = control_plane_ready(&c);
        assert_eq!(status.indicator, StatusIndicator::Unspecified);
        assert_eq!(status.message, "condition not found");
    }

    #[test]
    fn test_component_ready_true() {
        let c = cluster(
            "Provisioned",
            vec![condition("InfrastructureReady", ConditionStatus::True, "", 1700000000)],
        );
        assert_eq!(
            infrastructure_ready(&c),
            GenericStatus::new(StatusIndicator::Idle, "infrastructure ready", 1700000000)
        );
    }

    #[test]
    fn test_component_ready_false_appends_reason() {
        let c = cluster(
            "Provisioning",
            vec![condition(
                "ControlPlaneReady",
                ConditionStatus::False,
                "ScalingUp",
                5,
            )],
        );
        let status = control_plane_ready(&c);
        assert_eq!(status.indicator, StatusIndicator::InProgress);
        assert_eq!(status.message, "control plane not ready;ScalingUp");
        assert_eq!(status.timestamp, 5);
    }

    #[test]
    fn test_component_ready_false_without_reason() {
        let c = cluster(
            "Provisioning",
            vec![condition("Ready", ConditionStatus::False, "", 5)],
        );
        let status = provider_status(&c);
        assert_eq!(status.indicator, StatusIndicator::InProgress);
        assert_eq!(status.message, "not ready;");
    }

    #[test]
    fn test_component_ready_waiting_for_server() {
        for reason in ["WaitingForRKE2Server", "WaitingForKThreesServer"] {
            let c = cluster(
                "Provisioning",
                vec![condition("Ready", ConditionStatus::False, reason, 5)],
            );
            assert_eq!(
                provider_status(&c).message,
                "not ready;waiting for control plane provider to indicate the control plane has been initialized"
            );
        }
    }

    #[test]
    fn test_component_ready_unknown_is_error() {
        let c = cluster(
            "Provisioning",
            vec![condition("Ready", ConditionStatus::Unknown, "", 5)],
        );
        let status = provider_status(&c);
        assert_eq!(status.indicator, StatusIndicator::Error);
        assert_eq!(status.message, "unknown");
    }

    #[test]
    fn test_lifecycle_in_progress_phases() {
        for (phase, message) in [
            ("Pending", "pending"),
            ("Provisioning", "provisioning"),
            ("Deleting", "deleting"),
        ] {
            let c = cluster(phase, vec![condition("Ready", ConditionStatus::False, "", 7)]);
            let status = lifecycle_phase(&c).status.unwrap();
            assert_eq!(status.indicator, StatusIndicator::InProgress);
            assert_eq!(status.message, message);
            assert_eq!(status.timestamp, 7);
        }
    }

    #[test]
    fn test_lifecycle_provisioned_and_ready_is_active() {
        let c = cluster(
            "Provisioned",
            vec![condition("Ready", ConditionStatus::True, "", 9)],
        );
        assert_eq!(
            lifecycle_phase(&c).status.unwrap(),
            GenericStatus::new(StatusIndicator::Idle, "active", 9)
        );
    }

    #[test]
    fn test_lifecycle_provisioned_not_ready() {
        let c = cluster(
            "Provisioned",
            vec![condition("Ready", ConditionStatus::False, "Waiting", 9)],
        );
        let status = lifecycle_phase(&c).status.unwrap();
        assert_eq!(status.indicator, StatusIndicator::InProgress);
        assert_eq!(status.message, "provisioned");
    }

    #[test]
    fn test_lifecycle_failed_collects_false_conditions() {
        let c = cluster(
            "Failed",
            vec![
                condition("Ready", ConditionStatus::False, "InfraFailed", 3),
                condition("ControlPlaneReady", ConditionStatus::True, "", 4),
                condition("InfrastructureReady", ConditionStatus::False, "NoHost", 5),
            ],
        );
        let lifecycle = lifecycle_phase(&c);
        assert_eq!(
            lifecycle.status.unwrap(),
            GenericStatus::new(StatusIndicator::Error, "failed", 3)
        );
        let reasons: Vec<_> = lifecycle.failures.iter().map(|f| f.reason.as_str()).collect();
        assert_eq!(reasons, vec!["InfraFailed", "NoHost"]);
        assert_eq!(lifecycle.failures[1].message, "InfrastructureReady message");
    }

    #[test]
    fn test_lifecycle_unknown_and_unmappable() {
        let unknown = cluster("Unknown", vec![condition("Ready", ConditionStatus::True, "", 1)]);
        let status = lifecycle_phase(&unknown).status.unwrap();
        assert_eq!(status.indicator, StatusIndicator::Unspecified);
        assert_eq!(status.message, "unknown");

        let weird = cluster("Exploding", vec![condition("Ready", ConditionStatus::True, "", 1)]);
        assert_eq!(lifecycle_phase(&weird).status, None);
    }

    #[test]
    fn test_node_health_all_running() {
        let c = cluster("Provisioned", vec![condition("Ready", ConditionStatus::True, "", 11)]);
        let machines = vec![machine(
            "m1",
            "Running",
            vec![condition("MachineNodeHealthy", ConditionStatus::True, "", 1)],
        )];
        assert_eq!(
            node_health(&c, &machines),
            GenericStatus::new(StatusIndicator::Idle, "nodes are healthy", 11)
        );
    }

    #[test]
    fn test_node_health_provisioning_is_in_progress() {
        let c = cluster("Provisioning", vec![]);
        let machines = vec![machine(
            "m1",
            "Provisioning",
            vec![condition(
                "MachineNodeHealthy",
                ConditionStatus::False,
                "WaitingForNodeRef",
                1,
            )],
        )];
        let status = node_health(&c, &machines);
        assert_eq!(status.indicator, StatusIndicator::InProgress);
        assert_eq!(
            status.message,
            "node(s) health unknown (0/1);m1: waiting for node to be provisioned;m1: Provisioning"
        );
        assert_eq!(status.timestamp, 0);
    }

    #[test]
    fn test_node_health_running_but_unhealthy_is_error() {
        let c = cluster("Provisioned", vec![condition("Ready", ConditionStatus::True, "", 2)]);
        let machines = vec![machine(
            "m1",
            "Running",
            vec![condition(
                "MachineHealthCheckSucceeded",
                ConditionStatus::False,
                "UnhealthyNode",
                1,
            )],
        )];
        let status = node_health(&c, &machines);
        assert_eq!(status.indicator, StatusIndicator::Error);
        assert_eq!(status.message, "nodes are unhealthy (1/1);m1: UnhealthyNode");
    }

    #[test]
    fn test_node_health_failed_phase_is_error() {
        let c = cluster("Provisioned", vec![condition("Ready", ConditionStatus::True, "", 2)]);
        let machines = vec![
            machine("m1", "Running", vec![]),
            machine("m2", "Failed", vec![]),
        ];
        let status = node_health(&c, &machines);
        assert_eq!(status.indicator, StatusIndicator::Error);
        assert_eq!(status.message, "nodes are unhealthy (1/2);MachinePhase Failed");
    }

    #[test]
    fn test_node_status_mapping() {
        assert_eq!(
            node_status(&machine("m", "Deleting", vec![])).condition,
            NodeCondition::Removing
        );
        assert_eq!(
            node_status(&machine("m", "Pending", vec![])).condition,
            NodeCondition::Provisioning
        );
        assert_eq!(
            node_status(&machine(
                "m",
                "Running",
                vec![condition("NodeHealthy", ConditionStatus::True, "", 1)]
            ))
            .condition,
            NodeCondition::Ready
        );

        let not_ready = node_status(&machine(
            "m",
            "Running",
            vec![condition("NodeHealthy", ConditionStatus::False, "KubeletDown", 1)],
        ));
        assert_eq!(not_ready.condition, NodeCondition::NotReady);
        assert_eq!(not_ready.reason.as_deref(), Some("KubeletDown"));

        assert_eq!(
            node_status(&machine("m", "Running", vec![])).condition,
            NodeCondition::Unknown
        );
    }
}
