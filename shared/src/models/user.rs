//! Actors, roles and the capabilities they grant

use serde::{Deserialize, Serialize};

use super::{OperationKind, ParseEnumError};

/// The user performing an operation, as resolved by the authentication layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// User role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StockOperator,
    Purchaser,
    Cashier,
    Finance,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::StockOperator,
        Role::Purchaser,
        Role::Cashier,
        Role::Finance,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::StockOperator => "stock_operator",
            Role::Purchaser => "purchaser",
            Role::Cashier => "cashier",
            Role::Finance => "finance",
            Role::Viewer => "viewer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations guarded by a capability check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    StockIn,
    StockOut,
    StockAdjust,
    ViewLedger,
    CreateOrder,
    TransitionOrder,
    ViewOrders,
    ViewSnapshots,
    ViewAlerts,
    RegisterProduct,
    UpdateProduct,
    DisableProduct,
    ViewProducts,
}

impl Capability {
    /// Capability needed to apply a stock operation of `kind`
    pub fn for_operation(kind: OperationKind) -> Self {
        match kind {
            OperationKind::In => Capability::StockIn,
            OperationKind::Out => Capability::StockOut,
            OperationKind::Adjust => Capability::StockAdjust,
        }
    }

    /// Roles allowed to exercise this capability
    pub fn required_roles(&self) -> &'static [Role] {
        use Role::*;

        match self {
            Capability::StockIn | Capability::StockAdjust => &[Admin, StockOperator],
            Capability::StockOut => &[Admin, StockOperator, Cashier],
            Capability::ViewLedger => &[Admin, StockOperator, Finance, Viewer],
            Capability::CreateOrder => &[Admin, Purchaser, Cashier],
            Capability::TransitionOrder => &[Admin, StockOperator],
            Capability::ViewAlerts => &[Admin, StockOperator, Purchaser, Finance, Viewer],
            Capability::RegisterProduct => &[Admin, StockOperator, Purchaser],
            Capability::UpdateProduct => &[Admin, StockOperator],
            Capability::DisableProduct => &[Admin],
            Capability::ViewOrders | Capability::ViewSnapshots | Capability::ViewProducts => {
                &Role::ALL
            }
        }
    }
}
