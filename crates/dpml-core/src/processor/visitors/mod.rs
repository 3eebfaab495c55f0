/*
 * processor/visitors/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Built-in pipeline visitors.
 */

//! Built-in visitors, listed in execution order:
//!
//! | Visitor | Priority |
//! |---------|----------|
//! | [`InheritanceVisitor`] | 100 |
//! | [`IdValidationVisitor`] | 90 |
//! | [`AttributeValidationVisitor`] | 80 |
//! | [`DomainTagVisitor`] | 50 |

mod attribute_validation;
mod domain;
mod id_validation;
mod inheritance;

pub use attribute_validation::{ATTRIBUTE_VALIDATION_PRIORITY, AttributeValidationVisitor};
pub use domain::{DOMAIN_TAG_PRIORITY, DomainTagVisitor};
pub use id_validation::{ID_VALIDATION_PRIORITY, IdValidationVisitor};
pub use inheritance::{ChildrenPolicy, INHERITANCE_PRIORITY, InheritanceVisitor, merge_elements};
