// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request bodies and query strings of the car registry endpoints. Body
//! fields are passed to the contract as opaque strings: JSON strings are
//! taken verbatim, numbers and booleans in their textual form.
//!
//! ## Model Categories
//!
//! - **Queries**: colour / owner filters for evaluate endpoints
//! - **Commands**: bodies of the submit endpoints

use std::fmt;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Contract Arguments
// =============================================================================

/// A JSON scalar forwarded to the contract as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContractArg {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl fmt::Display for ContractArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractArg::Text(text) => f.write_str(text),
            ContractArg::Number(number) => write!(f, "{number}"),
            ContractArg::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<ContractArg> for String {
    fn from(arg: ContractArg) -> Self {
        match arg {
            ContractArg::Text(text) => text,
            other => other.to_string(),
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ColorQuery {
    /// Colour to match exactly.
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ColorOwnerQuery {
    pub color: String,
    /// Owner (person) id.
    pub owner: String,
}

// =============================================================================
// Commands
// =============================================================================

/// Records a failure on a car.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFailureRequest {
    /// Car id.
    #[schema(value_type = String)]
    pub id: ContractArg,
    #[serde(rename = "failureID")]
    #[schema(value_type = String)]
    pub failure_id: ContractArg,
    #[schema(value_type = String)]
    pub desc: ContractArg,
    /// Repair cost.
    #[schema(value_type = f64)]
    pub price: ContractArg,
}

impl CreateFailureRequest {
    pub fn into_args(self) -> Vec<String> {
        vec![
            self.id.into(),
            self.failure_id.into(),
            self.desc.into(),
            self.price.into(),
        ]
    }
}

/// Sells a car to another person.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnershipRequest {
    #[schema(value_type = String)]
    pub id: ContractArg,
    /// Buy the car even with unrepaired failures, at a reduced price.
    #[schema(value_type = bool)]
    pub accept_failures: ContractArg,
    #[schema(value_type = String)]
    pub new_owner: ContractArg,
}

impl TransferOwnershipRequest {
    pub fn into_args(self) -> Vec<String> {
        vec![
            self.id.into(),
            self.accept_failures.into(),
            self.new_owner.into(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RepairFailureRequest {
    #[schema(value_type = String)]
    pub id: ContractArg,
    /// Failure id.
    #[schema(value_type = String)]
    pub failure: ContractArg,
}

impl RepairFailureRequest {
    pub fn into_args(self) -> Vec<String> {
        vec![self.id.into(), self.failure.into()]
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeColorRequest {
    #[schema(value_type = String)]
    pub id: ContractArg,
    #[schema(value_type = String)]
    pub color: ContractArg,
}

impl ChangeColorRequest {
    pub fn into_args(self) -> Vec<String> {
        vec![self.id.into(), self.color.into()]
    }
}
