// ABOUTME: Non-fatal problems noticed while deploying or inspecting.
// ABOUTME: Teardown leftovers and label drift are reported, never turned into failures.

use std::fmt;

/// What a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Tunnel process may be orphaned.
    TunnelTeardown,
    /// Ephemeral registry container may remain.
    RegistryCleanup,
    /// Service was updated outside this tool since the last deployment.
    MetadataMismatch,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningKind::TunnelTeardown => "tunnel teardown",
            WarningKind::RegistryCleanup => "registry cleanup",
            WarningKind::MetadataMismatch => "metadata mismatch",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn tunnel_teardown(message: impl Into<String>) -> Self {
        Self::new(WarningKind::TunnelTeardown, message)
    }

    pub fn registry_cleanup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RegistryCleanup, message)
    }

    pub fn metadata_mismatch(message: impl Into<String>) -> Self {
        Self::new(WarningKind::MetadataMismatch, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Warnings of one run, in the order they were raised. Each is logged when recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = %warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_warnings_in_order() {
        let mut diag = Diagnostics::default();
        assert!(!diag.has_warnings());

        diag.warn(Warning::tunnel_teardown("kill failed"));
        diag.warn(Warning::registry_cleanup("container busy"));

        assert!(diag.has_warnings());
        let kinds: Vec<_> = diag.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::TunnelTeardown, WarningKind::RegistryCleanup]
        );
        assert_eq!(diag.into_warnings().len(), 2);
    }

    #[test]
    fn display_names_the_kind() {
        let warning = Warning::metadata_mismatch("api runs nginx:1.25");
        assert_eq!(warning.to_string(), "metadata mismatch: api runs nginx:1.25");
    }
}
