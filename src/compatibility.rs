//! Schema compatibility checking
//!
//! Validates that a proposed message schema is backward compatible with the
//! previously provisioned one: a consumer built against the previous schema
//! must still be able to read messages produced under the proposed schema.
//!
//! The diff walks both documents in lockstep. At every object node:
//!
//! 1. an open content model (`additionalProperties` absent or not `false`)
//!    must not become closed;
//! 2. removing a property is tolerated only while the proposed model is open;
//! 3. adding a property to a previously open model is rejected, and a closed
//!    model may only gain optional properties;
//! 4. properties present on both sides must keep their kind, objects are
//!    compared recursively and array item schemas positionally.

use std::ops::ControlFlow;

use serde::Serialize;
use thiserror::Error;

use crate::document::{SchemaDocument, SchemaKind};

/// Path rendered for the schema root
pub const ROOT_PATH: &str = "$";

/// Why a proposed schema breaks consumers of the previous one
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IncompatibilityReason {
    #[error("open content model at '{path}' cannot be closed")]
    OpenToClosedTransition { path: String },

    #[error("property '{path}' was removed from a closed content model")]
    PropertyRemovedFromClosedModel { path: String },

    #[error("property '{path}' was added to an open content model")]
    PropertyAddedToOpenModel { path: String },

    #[error("required property '{path}' was added")]
    NewRequiredPropertyAdded { path: String },

    #[error("property '{path}' changed type from {previous} to {proposed}")]
    TypeChanged {
        path: String,
        previous: SchemaKind,
        proposed: SchemaKind,
    },
}

impl IncompatibilityReason {
    /// Key path of the offending property
    pub fn path(&self) -> &str {
        match self {
            IncompatibilityReason::OpenToClosedTransition { path }
            | IncompatibilityReason::PropertyRemovedFromClosedModel { path }
            | IncompatibilityReason::PropertyAddedToOpenModel { path }
            | IncompatibilityReason::NewRequiredPropertyAdded { path }
            | IncompatibilityReason::TypeChanged { path, .. } => path,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IncompatibilityReason::OpenToClosedTransition { .. } => "OpenToClosedTransition",
            IncompatibilityReason::PropertyRemovedFromClosedModel { .. } => {
                "PropertyRemovedFromClosedModel"
            }
            IncompatibilityReason::PropertyAddedToOpenModel { .. } => "PropertyAddedToOpenModel",
            IncompatibilityReason::NewRequiredPropertyAdded { .. } => "NewRequiredPropertyAdded",
            IncompatibilityReason::TypeChanged { .. } => "TypeChanged",
        }
    }
}

/// Every violation found between two schema versions
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompatibilityReport {
    /// Violations in traversal order
    pub violations: Vec<IncompatibilityReason>,
}

impl CompatibilityReport {
    pub fn is_compatible(&self) -> bool {
        self.violations.is_empty()
    }

    /// The violation `check` would have reported
    pub fn first(&self) -> Option<&IncompatibilityReason> {
        self.violations.first()
    }
}

/// Collects violations, optionally stopping at the first one
struct Findings {
    fail_fast: bool,
    violations: Vec<IncompatibilityReason>,
}

impl Findings {
    fn record(&mut self, reason: IncompatibilityReason) -> ControlFlow<()> {
        self.violations.push(reason);
        if self.fail_fast {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Compatibility checker for message schema versions
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityChecker;

impl CompatibilityChecker {
    /// Create a new compatibility checker
    pub fn new() -> Self {
        Self
    }

    /// Check that `proposed` can replace `previous`, returning the first violation
    pub fn check(
        &self,
        previous: &SchemaDocument,
        proposed: &SchemaDocument,
    ) -> Result<(), IncompatibilityReason> {
        let mut findings = Findings {
            fail_fast: true,
            violations: Vec::new(),
        };
        let _ = self.compare_object(previous, proposed, "", &mut findings);
        match findings.violations.into_iter().next() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Collect every violation between `previous` and `proposed`
    pub fn report(&self, previous: &SchemaDocument, proposed: &SchemaDocument) -> CompatibilityReport {
        let mut findings = Findings {
            fail_fast: false,
            violations: Vec::new(),
        };
        let _ = self.compare_object(previous, proposed, "", &mut findings);
        CompatibilityReport {
            violations: findings.violations,
        }
    }

    fn compare_object(
        &self,
        previous: &SchemaDocument,
        proposed: &SchemaDocument,
        path: &str,
        findings: &mut Findings,
    ) -> ControlFlow<()> {
        let previous_open = previous.additional_properties();
        let proposed_open = proposed.additional_properties();

        if previous_open && !proposed_open {
            findings.record(IncompatibilityReason::OpenToClosedTransition {
                path: display_path(path),
            })?;
        }

        let previous_required = previous.required();
        let proposed_required = proposed.required();

        for key in property_union(previous, proposed) {
            let child = child_path(path, key);
            match (previous.property(key), proposed.property(key)) {
                (Some(_), None) => {
                    if !proposed_open {
                        findings.record(IncompatibilityReason::PropertyRemovedFromClosedModel {
                            path: child,
                        })?;
                    }
                }
                (None, Some(_)) => {
                    if previous_open {
                        findings.record(IncompatibilityReason::PropertyAddedToOpenModel {
                            path: child,
                        })?;
                    } else if proposed_required.contains(key) {
                        findings.record(IncompatibilityReason::NewRequiredPropertyAdded {
                            path: child,
                        })?;
                    }
                }
                (Some(previous_property), Some(proposed_property)) => {
                    if !previous_required.contains(key) && proposed_required.contains(key) {
                        findings.record(IncompatibilityReason::NewRequiredPropertyAdded {
                            path: child.clone(),
                        })?;
                    }
                    self.compare_node(previous_property, proposed_property, &child, findings)?;
                }
                (None, None) => {}
            }
        }

        ControlFlow::Continue(())
    }

    fn compare_node(
        &self,
        previous: &SchemaDocument,
        proposed: &SchemaDocument,
        path: &str,
        findings: &mut Findings,
    ) -> ControlFlow<()> {
        let previous_kind = previous.kind();
        let proposed_kind = proposed.kind();

        if previous_kind != proposed_kind {
            return findings.record(IncompatibilityReason::TypeChanged {
                path: path.to_string(),
                previous: previous_kind,
                proposed: proposed_kind,
            });
        }

        match previous_kind {
            SchemaKind::Object => self.compare_object(previous, proposed, path, findings),
            SchemaKind::Array => {
                // Positional: slots beyond the shorter list are not compared.
                for (index, (previous_item, proposed_item)) in
                    previous.items().into_iter().zip(proposed.items()).enumerate()
                {
                    let item_path = format!("{}[{}]", path, index);
                    self.compare_node(previous_item, proposed_item, &item_path, findings)?;
                }
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Property names of `previous` in order, followed by names only `proposed` declares
fn property_union<'a>(previous: &'a SchemaDocument, proposed: &'a SchemaDocument) -> Vec<&'a str> {
    let mut keys: Vec<&str> = previous.properties().iter().map(|(k, _)| k.as_str()).collect();
    for (key, _) in proposed.properties() {
        if previous.property(key).is_none() {
            keys.push(key);
        }
    }
    keys
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        ROOT_PATH.to_string()
    } else {
        path.to_string()
    }
}
