//! Accessibility role tables.
//!
//! These tables decide which elements the capture layers descend into,
//! which ones are worth reading text from, and which ones must never be
//! read at all.

/// Roles that group other elements and may hide a text control below them.
pub const CONTAINER_ROLES: &[&str] = &[
    "AXGroup",
    "AXScrollArea",
    "AXTable",
    "AXOutline",
    "AXWebArea",
    "AXList",
    "AXSplitGroup",
    "AXLayoutArea",
    "AXCell",
    "AXRow",
    "AXDocument",
    "AXBrowser",
    "AXTabGroup",
    "AXWindow",
];

/// Roles of editable text controls.
pub const TEXT_ROLES: &[&str] = &[
    "AXTextField",
    "AXTextArea",
    "AXComboBox",
    "AXSearchField",
];

/// Roles that mark the root of rendered web content.
pub const WEB_ROOT_ROLES: &[&str] = &["AXWebArea"];

/// Roles and subroles of masked input.
pub const SECURE_ROLES: &[&str] = &["AXSecureTextField", "AXPasswordField"];

/// Whether children of this role should be searched for a text control.
#[must_use]
pub fn is_container_role(role: &str) -> bool {
    CONTAINER_ROLES.contains(&role)
}

/// Whether this role is an editable text control.
#[must_use]
pub fn is_text_role(role: &str) -> bool {
    TEXT_ROLES.contains(&role)
}

/// Whether this role is the root of web content.
#[must_use]
pub fn is_web_root_role(role: &str) -> bool {
    WEB_ROOT_ROLES.contains(&role)
}

/// Whether an element with this role and subrole holds masked input.
#[must_use]
pub fn is_secure(role: Option<&str>, subrole: Option<&str>) -> bool {
    role.is_some_and(|r| SECURE_ROLES.contains(&r))
        || subrole.is_some_and(|s| SECURE_ROLES.contains(&s))
}
