//! Keyword sets driving block relevance filtering

/// Regulatory, security, and organizational-process vocabulary. A block
/// containing any of these survives filtering.
pub const COMPLIANCE_KEYWORDS: &[&str] = &[
    // Privacy / data protection
    "personal data",
    "personal information",
    "personally identifiable",
    "data protection",
    "data subject",
    "data controller",
    "data processor",
    "privacy",
    "consent",
    "lawful basis",
    "legitimate interest",
    "retention",
    "erasure",
    "deletion",
    "right to access",
    "right to rectification",
    "portability",
    "profiling",
    "anonymization",
    "anonymisation",
    "pseudonymization",
    "pseudonymisation",
    "cross-border",
    "data transfer",
    "subprocessor",
    "sub-processor",
    "data protection officer",
    "supervisory authority",
    "records of processing",
    // Security
    "encryption",
    "encrypted",
    "access control",
    "authentication",
    "authorization",
    "multi-factor",
    "password",
    "least privilege",
    "firewall",
    "vulnerability",
    "penetration test",
    "patch",
    "intrusion",
    "malware",
    "backup",
    "disaster recovery",
    "business continuity",
    "availability",
    "integrity",
    "confidentiality",
    "incident response",
    "breach",
    "notification",
    "audit log",
    "audit trail",
    "logging",
    "monitoring",
    "risk assessment",
    "risk management",
    "change management",
    "segregation of duties",
    // Health data
    "protected health information",
    "phi",
    "patient",
    "medical record",
    "minimum necessary",
    "business associate",
    "covered entity",
    "safeguard",
    "disclosure",
    // Organizational process
    "policy",
    "procedure",
    "training",
    "awareness",
    "vendor",
    "third party",
    "third-party",
    "contract",
    "compliance",
    "regulatory",
    "governance",
    "security officer",
];

/// Action verbs that mark obligation-carrying paragraphs
pub const ACTION_VERBS: &[&str] = &[
    "ensure",
    "maintain",
    "implement",
    "establish",
    "enforce",
    "require",
    "restrict",
    "protect",
    "encrypt",
    "retain",
    "review",
    "monitor",
    "document",
    "notify",
    "train",
    "audit",
    "assess",
    "authorize",
    "limit",
    "prohibit",
];

/// Keywords typical of page footers
pub const FOOTER_KEYWORDS: &[&str] = &[
    "page ",
    "copyright",
    "\u{00A9}",
    "confidential",
    "proprietary",
    "all rights reserved",
];

/// Section titles that mark structural boilerplate when they stand alone
pub const SECTION_TITLE_KEYWORDS: &[&str] = &[
    "table of contents",
    "contents",
    "appendix",
    "index",
    "glossary",
    "revision history",
    "document control",
];

/// True if `text_lower` contains at least one keyword from the set.
/// The caller is expected to pass lowercased text.
pub fn contains_any(text_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text_lower.contains(k))
}
