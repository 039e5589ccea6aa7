//! Built-in framework control sets
//!
//! A production deployment loads controls from a managed repository; the
//! static repository here seeds each framework with a representative set so
//! the engine is usable out of the box and deterministic in tests.

use async_trait::async_trait;
use shared_types::{Control, Framework, Severity};

use crate::stores::{ControlsRepository, StoreError};

/// Controls repository backed by the built-in sets
pub struct StaticControlsRepository;

#[async_trait]
impl ControlsRepository for StaticControlsRepository {
    async fn list_controls(&self, framework: Framework) -> Result<Vec<Control>, StoreError> {
        Ok(builtin_controls(framework))
    }
}

fn control(
    framework: Framework,
    id: &str,
    category: &str,
    severity: Severity,
    requirement: &str,
    keywords: &[&str],
) -> Control {
    Control {
        control_id: id.to_string(),
        framework,
        category: category.to_string(),
        requirement: requirement.to_string(),
        severity,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

/// The built-in control list for a framework
pub fn builtin_controls(framework: Framework) -> Vec<Control> {
    match framework {
        Framework::Gdpr => gdpr_controls(),
        Framework::Soc2 => soc2_controls(),
        Framework::Hipaa => hipaa_controls(),
    }
}

fn gdpr_controls() -> Vec<Control> {
    let f = Framework::Gdpr;
    vec![
        control(
            f,
            "GDPR-5.1",
            "Storage limitation",
            Severity::High,
            "Personal data must be kept no longer than necessary for the purposes for which it is processed; a retention period or deletion criteria must be defined.",
            &["retention", "indefinitely", "storage", "deletion"],
        ),
        control(
            f,
            "GDPR-6.1",
            "Lawful basis",
            Severity::High,
            "Processing requires a documented lawful basis such as consent, contract, legal obligation, or legitimate interest.",
            &["lawful basis", "consent", "legitimate interest"],
        ),
        control(
            f,
            "GDPR-7.3",
            "Consent withdrawal",
            Severity::Medium,
            "Data subjects must be able to withdraw consent as easily as they gave it.",
            &["consent", "withdraw", "opt-out"],
        ),
        control(
            f,
            "GDPR-13.1",
            "Transparency",
            Severity::Medium,
            "Data subjects must be informed of the identity of the controller, purposes of processing, and their rights at collection time.",
            &["privacy notice", "inform", "transparency"],
        ),
        control(
            f,
            "GDPR-17.1",
            "Right to erasure",
            Severity::High,
            "Data subjects have the right to obtain erasure of personal data without undue delay.",
            &["erasure", "deletion", "right to be forgotten"],
        ),
        control(
            f,
            "GDPR-28.1",
            "Processor contracts",
            Severity::Medium,
            "Processing by a third party must be governed by a contract binding the processor to the controller's instructions.",
            &["processor", "subprocessor", "vendor", "contract"],
        ),
        control(
            f,
            "GDPR-32.1",
            "Security of processing",
            Severity::High,
            "Appropriate technical and organizational measures must be implemented, including encryption or pseudonymization where appropriate.",
            &["encryption", "pseudonymization", "security measures"],
        ),
        control(
            f,
            "GDPR-33.1",
            "Breach notification",
            Severity::High,
            "Personal data breaches must be notified to the supervisory authority within 72 hours where feasible.",
            &["breach", "notification", "72 hours"],
        ),
        control(
            f,
            "GDPR-44",
            "International transfers",
            Severity::Medium,
            "Transfers of personal data outside the EEA require an adequacy decision or appropriate safeguards.",
            &["transfer", "cross-border", "adequacy"],
        ),
    ]
}

fn soc2_controls() -> Vec<Control> {
    let f = Framework::Soc2;
    vec![
        control(
            f,
            "SOC2-CC6.1",
            "Logical access",
            Severity::High,
            "Logical access to systems and data is restricted through access control software and rule sets.",
            &["access control", "least privilege", "authorization"],
        ),
        control(
            f,
            "SOC2-CC6.2",
            "User provisioning",
            Severity::Medium,
            "User access is provisioned on authorization and revoked promptly on termination or role change.",
            &["provisioning", "termination", "revoke"],
        ),
        control(
            f,
            "SOC2-CC6.6",
            "Authentication",
            Severity::High,
            "Users are authenticated before access; multi-factor authentication protects privileged and remote access.",
            &["authentication", "multi-factor", "password"],
        ),
        control(
            f,
            "SOC2-CC6.7",
            "Data in transit and at rest",
            Severity::High,
            "Data is protected during transmission and storage using encryption appropriate to its classification.",
            &["encryption", "tls", "at rest"],
        ),
        control(
            f,
            "SOC2-CC7.2",
            "Monitoring",
            Severity::Medium,
            "System components are monitored for anomalies and security events; alerts are investigated.",
            &["monitoring", "logging", "alert", "audit log"],
        ),
        control(
            f,
            "SOC2-CC7.3",
            "Incident response",
            Severity::High,
            "Security incidents are evaluated, contained, remediated, and communicated per a defined incident response process.",
            &["incident", "response", "remediation"],
        ),
        control(
            f,
            "SOC2-CC8.1",
            "Change management",
            Severity::Medium,
            "Infrastructure and software changes are authorized, tested, and approved before deployment.",
            &["change management", "approval", "deployment"],
        ),
        control(
            f,
            "SOC2-A1.2",
            "Availability",
            Severity::Low,
            "Recovery infrastructure, backups, and recovery testing support availability commitments.",
            &["backup", "recovery", "availability"],
        ),
        control(
            f,
            "SOC2-CC9.2",
            "Vendor management",
            Severity::Medium,
            "Risks from vendors and business partners are assessed and managed through contractual commitments.",
            &["vendor", "third party", "due diligence"],
        ),
    ]
}

fn hipaa_controls() -> Vec<Control> {
    let f = Framework::Hipaa;
    vec![
        control(
            f,
            "HIPAA-164.308",
            "Administrative safeguards",
            Severity::High,
            "A covered entity must implement administrative safeguards including a security management process and workforce training.",
            &["safeguard", "training", "risk analysis"],
        ),
        control(
            f,
            "HIPAA-164.310",
            "Physical safeguards",
            Severity::Medium,
            "Facility access controls and workstation security must limit physical access to systems holding PHI.",
            &["facility", "workstation", "physical access"],
        ),
        control(
            f,
            "HIPAA-164.312a",
            "Access control",
            Severity::High,
            "Technical policies must allow access to electronic PHI only to authorized persons or programs.",
            &["access control", "unique user", "phi"],
        ),
        control(
            f,
            "HIPAA-164.312e",
            "Transmission security",
            Severity::High,
            "Electronic PHI transmitted over networks must be guarded against unauthorized access, including encryption where appropriate.",
            &["transmission", "encryption", "network"],
        ),
        control(
            f,
            "HIPAA-164.314",
            "Business associates",
            Severity::Medium,
            "Contracts with business associates must require appropriate safeguarding of PHI.",
            &["business associate", "contract", "agreement"],
        ),
        control(
            f,
            "HIPAA-164.502b",
            "Minimum necessary",
            Severity::Medium,
            "Uses and disclosures of PHI must be limited to the minimum necessary to accomplish the purpose.",
            &["minimum necessary", "disclosure", "limit"],
        ),
        control(
            f,
            "HIPAA-164.524",
            "Patient access",
            Severity::Medium,
            "Individuals have a right of access to inspect and obtain a copy of their PHI.",
            &["patient", "access", "copy", "medical record"],
        ),
        control(
            f,
            "HIPAA-164.530",
            "Retention of documentation",
            Severity::Low,
            "Policies, procedures, and required communications must be retained for six years.",
            &["retention", "documentation", "six years"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_framework_has_controls() {
        for framework in Framework::all() {
            let controls = builtin_controls(framework);
            assert!(!controls.is_empty());
            assert!(controls.iter().all(|c| c.framework == framework));
        }
    }

    #[test]
    fn test_control_ids_are_unique_per_framework() {
        for framework in Framework::all() {
            let controls = builtin_controls(framework);
            let mut ids: Vec<&str> = controls.iter().map(|c| c.control_id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), controls.len());
        }
    }

    #[test]
    fn test_each_framework_carries_high_severity_controls() {
        for framework in Framework::all() {
            let controls = builtin_controls(framework);
            assert!(controls.iter().any(|c| c.severity == Severity::High));
        }
    }

    #[tokio::test]
    async fn test_static_repository_lists_controls() {
        let repo = StaticControlsRepository;
        let controls = repo.list_controls(Framework::Gdpr).await.unwrap();
        assert!(controls.iter().any(|c| c.control_id == "GDPR-5.1"));
    }
}
