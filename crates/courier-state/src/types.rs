//! Validated records for drivers, orders, and assignments.
//!
//! Fields are private: every record is built through a checked constructor
//! (or checked deserialization) and mutated only through methods that keep
//! its invariants, most importantly `active_orders <= max_workload`.

use std::fmt;

use courier_core::{DispatchStrategy, DriverId, GeoPoint, OrderId, Priority};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Driver ────────────────────────────────────────────────────────

/// A delivery driver as seen by dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DriverRecord")]
pub struct Driver {
    id: DriverId,
    name: Option<String>,
    location: GeoPoint,
    available: bool,
    active_orders: u32,
    max_workload: u32,
    rating: f64,
}

/// Unchecked wire shape of a [`Driver`].
#[derive(Debug, Clone, Deserialize)]
pub struct DriverRecord {
    pub id: DriverId,
    #[serde(default)]
    pub name: Option<String>,
    pub location: GeoPoint,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub active_orders: u32,
    pub max_workload: u32,
    #[serde(default)]
    pub rating: f64,
}

fn default_available() -> bool {
    true
}

impl TryFrom<DriverRecord> for Driver {
    type Error = ValidationError;

    fn try_from(r: DriverRecord) -> Result<Self, Self::Error> {
        let mut driver = Driver::new(r.id, r.location, r.max_workload, r.rating)?;
        driver.name = r.name;
        driver.available = r.available;
        driver.set_active_orders(r.active_orders)?;
        Ok(driver)
    }
}

impl Driver {
    /// Create an available driver with no active orders.
    pub fn new(
        id: impl Into<DriverId>,
        location: GeoPoint,
        max_workload: u32,
        rating: f64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId("driver"));
        }
        if max_workload == 0 {
            return Err(ValidationError::ZeroMaxWorkload);
        }
        if !rating.is_finite() || !(0.0..=5.0).contains(&rating) {
            return Err(ValidationError::Rating(rating));
        }
        Ok(Self {
            id,
            name: None,
            location,
            available: true,
            active_orders: 0,
            max_workload,
            rating,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Set the initial workload, e.g. when importing existing state.
    pub fn with_active_orders(mut self, active: u32) -> Result<Self, ValidationError> {
        self.set_active_orders(active)?;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn active_orders(&self) -> u32 {
        self.active_orders
    }

    pub fn max_workload(&self) -> u32 {
        self.max_workload
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    /// Slots left before the driver reaches `max_workload`.
    pub fn free_slots(&self) -> u32 {
        self.max_workload.saturating_sub(self.active_orders)
    }

    /// Available and below capacity.
    pub fn is_eligible(&self) -> bool {
        self.available && self.active_orders < self.max_workload
    }

    pub fn set_location(&mut self, location: GeoPoint) {
        self.location = location;
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Take one more order. Fails without mutating if already at capacity.
    pub fn take_order(&mut self) -> Result<(), ValidationError> {
        if self.active_orders >= self.max_workload {
            return Err(ValidationError::WorkloadExceeded {
                driver_id: self.id.clone(),
                active: self.active_orders,
                max: self.max_workload,
            });
        }
        self.active_orders += 1;
        Ok(())
    }

    /// Drop one order from the workload. Saturates at zero.
    pub fn finish_order(&mut self) {
        self.active_orders = self.active_orders.saturating_sub(1);
    }

    fn set_active_orders(&mut self, active: u32) -> Result<(), ValidationError> {
        if active > self.max_workload {
            return Err(ValidationError::WorkloadExceeded {
                driver_id: self.id.clone(),
                active,
                max: self.max_workload,
            });
        }
        self.active_orders = active;
        Ok(())
    }
}

// ── Order ─────────────────────────────────────────────────────────

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, InTransit)
                | (Assigned, Cancelled)
                | (InTransit, Delivered)
                | (InTransit, Cancelled)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A customer order awaiting or undergoing delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    id: OrderId,
    pickup: GeoPoint,
    delivery: GeoPoint,
    priority: Priority,
    status: OrderStatus,
    assigned_driver: Option<DriverId>,
    /// Unix timestamp (seconds) when the order was placed.
    created_at: u64,
}

/// Unchecked wire shape of an [`Order`].
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub pickup: GeoPoint,
    pub delivery: GeoPoint,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_status")]
    pub status: OrderStatus,
    #[serde(default)]
    pub assigned_driver: Option<DriverId>,
    #[serde(default)]
    pub created_at: u64,
}

fn default_status() -> OrderStatus {
    OrderStatus::Pending
}

impl TryFrom<OrderRecord> for Order {
    type Error = ValidationError;

    fn try_from(r: OrderRecord) -> Result<Self, Self::Error> {
        let mut order = Order::new(r.id, r.pickup, r.delivery, r.priority, r.created_at)?;
        match (r.status, &r.assigned_driver) {
            (OrderStatus::Pending, Some(_)) => return Err(ValidationError::UnexpectedDriver),
            (OrderStatus::Assigned | OrderStatus::InTransit | OrderStatus::Delivered, None) => {
                return Err(ValidationError::MissingDriver(r.status));
            }
            _ => {}
        }
        order.status = r.status;
        order.assigned_driver = r.assigned_driver;
        Ok(order)
    }
}

impl Order {
    /// Create a new `Pending` order with no driver.
    pub fn new(
        id: impl Into<OrderId>,
        pickup: GeoPoint,
        delivery: GeoPoint,
        priority: Priority,
        created_at: u64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId("order"));
        }
        Ok(Self {
            id,
            pickup,
            delivery,
            priority,
            status: OrderStatus::Pending,
            assigned_driver: None,
            created_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pickup(&self) -> GeoPoint {
        self.pickup
    }

    pub fn delivery(&self) -> GeoPoint {
        self.delivery
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn assigned_driver(&self) -> Option<&str> {
        self.assigned_driver.as_deref()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Bind the order to `driver_id` and move it to `Assigned`.
    pub fn assign(&mut self, driver_id: impl Into<DriverId>) -> Result<(), ValidationError> {
        self.check_transition(OrderStatus::Assigned)?;
        self.assigned_driver = Some(driver_id.into());
        self.status = OrderStatus::Assigned;
        Ok(())
    }

    /// Move to any status other than `Assigned` (use [`Order::assign`]).
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), ValidationError> {
        if next == OrderStatus::Assigned {
            return Err(ValidationError::Transition {
                from: self.status,
                to: next,
            });
        }
        self.check_transition(next)?;
        self.status = next;
        Ok(())
    }

    fn check_transition(&self, next: OrderStatus) -> Result<(), ValidationError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ValidationError::Transition {
                from: self.status,
                to: next,
            })
        }
    }
}

// ── Assignment ────────────────────────────────────────────────────

/// A committed dispatch decision binding one order to one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub order_id: OrderId,
    pub driver_id: DriverId,
    /// Strategy that produced the decision; `None` for a manual override.
    /// Determines how `score` reads.
    pub strategy: Option<DispatchStrategy>,
    /// Combined cost for weighted scoring (lower wins), quality score for
    /// SLA greedy selection (higher wins), `0.0` for round robin and manual
    /// assignments.
    pub score: f64,
    /// Driver to pickup distance.
    pub distance_km: f64,
    /// Driver to pickup to delivery travel time.
    pub estimated_minutes: f64,
    /// Unix timestamp (seconds) of the commit.
    pub created_at: u64,
}

/// An assignment whose order reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedAssignment {
    pub assignment: Assignment,
    pub outcome: OrderStatus,
    pub closed_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> GeoPoint {
        GeoPoint::new(12.97, 77.59).unwrap()
    }

    #[test]
    fn driver_rejects_bad_fields() {
        assert_eq!(
            Driver::new("", loc(), 3, 4.5).unwrap_err(),
            ValidationError::EmptyId("driver")
        );
        assert_eq!(
            Driver::new("d1", loc(), 0, 4.5).unwrap_err(),
            ValidationError::ZeroMaxWorkload
        );
        assert_eq!(
            Driver::new("d1", loc(), 3, 5.5).unwrap_err(),
            ValidationError::Rating(5.5)
        );
        assert!(Driver::new("d1", loc(), 2, 4.0).unwrap().with_active_orders(3).is_err());
    }

    #[test]
    fn driver_take_order_respects_capacity() {
        let mut driver = Driver::new("d1", loc(), 2, 4.0).unwrap();
        driver.take_order().unwrap();
        driver.take_order().unwrap();
        assert!(!driver.is_eligible());

        let err = driver.take_order().unwrap_err();
        assert!(matches!(err, ValidationError::WorkloadExceeded { active: 2, max: 2, .. }));
        assert_eq!(driver.active_orders(), 2);

        driver.finish_order();
        assert_eq!(driver.active_orders(), 1);
        assert!(driver.is_eligible());
    }

    #[test]
    fn driver_finish_order_saturates() {
        let mut driver = Driver::new("d1", loc(), 2, 4.0).unwrap();
        driver.finish_order();
        assert_eq!(driver.active_orders(), 0);
    }

    #[test]
    fn unavailable_driver_is_not_eligible() {
        let driver = Driver::new("d1", loc(), 2, 4.0).unwrap().with_availability(false);
        assert!(!driver.is_eligible());
        assert_eq!(driver.free_slots(), 2);
    }

    #[test]
    fn driver_deserialize_validates_workload() {
        let json = r#"{
            "id": "d1",
            "location": {"latitude": 12.97, "longitude": 77.59},
            "active_orders": 4,
            "max_workload": 3,
            "rating": 4.2
        }"#;
        let err = serde_json::from_str::<Driver>(json).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn driver_serialization_round_trip() {
        let driver = Driver::new("d1", loc(), 3, 4.6)
            .unwrap()
            .with_name("Asha")
            .with_active_orders(1)
            .unwrap();
        let json = serde_json::to_string(&driver).unwrap();
        let back: Driver = serde_json::from_str(&json).unwrap();
        assert_eq!(back, driver);
    }

    #[test]
    fn order_lifecycle_transitions() {
        let mut order = Order::new("o1", loc(), loc(), Priority::High, 100).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);

        assert!(order.transition(OrderStatus::Delivered).is_err());
        assert!(order.transition(OrderStatus::Assigned).is_err());

        order.assign("d1").unwrap();
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert_eq!(order.assigned_driver(), Some("d1"));
        assert!(order.assign("d2").is_err());
        assert_eq!(order.assigned_driver(), Some("d1"));

        order.transition(OrderStatus::InTransit).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert!(order.status().is_terminal());
        assert!(order.transition(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn pending_order_can_be_cancelled() {
        let mut order = Order::new("o1", loc(), loc(), Priority::Low, 0).unwrap();
        order.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.assigned_driver().is_none());
    }

    #[test]
    fn order_deserialize_checks_driver_consistency() {
        let pending_with_driver = r#"{
            "id": "o1",
            "pickup": {"latitude": 1.0, "longitude": 1.0},
            "delivery": {"latitude": 1.1, "longitude": 1.1},
            "status": "pending",
            "assigned_driver": "d1"
        }"#;
        assert!(serde_json::from_str::<Order>(pending_with_driver).is_err());

        let assigned_without_driver = r#"{
            "id": "o1",
            "pickup": {"latitude": 1.0, "longitude": 1.0},
            "delivery": {"latitude": 1.1, "longitude": 1.1},
            "status": "assigned"
        }"#;
        assert!(serde_json::from_str::<Order>(assigned_without_driver).is_err());

        let minimal = r#"{
            "id": "o1",
            "pickup": {"latitude": 1.0, "longitude": 1.0},
            "delivery": {"latitude": 1.1, "longitude": 1.1},
            "priority": "High"
        }"#;
        let order: Order = serde_json::from_str(minimal).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.priority(), Priority::High);
    }
}
