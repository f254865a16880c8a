//! crates/bitacora_core/src/expense.rs
//!
//! Fuel expense arithmetic: the performance indicator and the three fuel
//! inputs (amount, liters, unit price) that derive each other while a form
//! is being filled.

use crate::domain::{Expense, ExpenseCategory, NewExpense, SessionContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unit price used when the form has none yet.
pub const AVERAGE_DIESEL_PRICE: f64 = 24.50;

/// Reference tank size the performance indicator is normalised against.
pub const REFERENCE_TANK_LITERS: f64 = 50.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `(odometer / 1000) / (liters / 50)`, rounded to two decimals.
///
/// This is a comparative index, not literal km per liter. Returns `None`
/// when there are no liters to divide by.
pub fn fuel_performance(diesel_liters: f64, odometer: f64) -> Option<f64> {
    if !(diesel_liters > 0.0) || !odometer.is_finite() {
        return None;
    }
    Some(round2(
        (odometer / 1000.0) / (diesel_liters / REFERENCE_TANK_LITERS),
    ))
}

//=========================================================================================
// Fuel Form Auto-Derivation
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FuelField {
    Amount,
    Liters,
    UnitPrice,
}

/// The three fuel inputs of an expense form, kept as typed text the way the
/// user entered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuelInputs {
    pub amount: String,
    pub diesel_liters: String,
    pub unit_price: String,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format2(value: f64) -> String {
    format!("{:.2}", value)
}

impl FuelInputs {
    /// The stored unit price, or the average price when it is missing or zero.
    fn effective_unit_price(&self) -> f64 {
        parse_number(&self.unit_price)
            .filter(|p| *p != 0.0)
            .unwrap_or(AVERAGE_DIESEL_PRICE)
    }

    /// Applies one edit and recomputes the dependent input. The last edited
    /// field wins. Non-numeric input leaves the form untouched.
    pub fn edit(&self, field: FuelField, raw: &str) -> FuelInputs {
        let value = match parse_number(raw) {
            Some(v) => v,
            None => return self.clone(),
        };
        let mut next = self.clone();

        match field {
            FuelField::Liters => {
                let unit_price = self.effective_unit_price();
                next.diesel_liters = raw.to_string();
                next.amount = format2(value * unit_price);
                next.unit_price = unit_price.to_string();
            }
            FuelField::Amount => {
                let unit_price = self.effective_unit_price();
                next.amount = raw.to_string();
                next.diesel_liters = format2(value / unit_price);
                next.unit_price = unit_price.to_string();
            }
            FuelField::UnitPrice => {
                next.unit_price = raw.to_string();
                if let Some(liters) = parse_number(&self.diesel_liters).filter(|l| *l > 0.0) {
                    next.amount = format2(liters * value);
                }
            }
        }
        next
    }
}

//=========================================================================================
// Expense Submission
//=========================================================================================

/// An expense as an operator submits it. Only fuel expenses carry the fuel
/// fields; performance is never accepted from the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseSubmission {
    pub trip_id: String,
    pub category: Option<ExpenseCategory>,
    pub amount: f64,
    pub date: String,
    pub description: String,
    pub unit_price: Option<f64>,
    pub diesel_liters: Option<f64>,
    pub odometer: Option<f64>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpenseError {
    #[error("La categoría del gasto es obligatoria")]
    MissingCategory,
    #[error("El monto debe ser un número positivo")]
    InvalidAmount,
    #[error("La fecha del gasto es obligatoria")]
    MissingDate,
}

impl ExpenseSubmission {
    /// Validates the submission and stamps it with the submitting operator
    /// and the recomputed performance.
    pub fn into_new_expense(self, ctx: &SessionContext) -> Result<NewExpense, ExpenseError> {
        let category = self.category.ok_or(ExpenseError::MissingCategory)?;
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ExpenseError::InvalidAmount);
        }
        if self.date.trim().is_empty() {
            return Err(ExpenseError::MissingDate);
        }

        let performance = match (category, self.diesel_liters, self.odometer) {
            (ExpenseCategory::Fuel, Some(liters), Some(odometer)) => {
                fuel_performance(liters, odometer)
            }
            _ => None,
        };

        Ok(NewExpense {
            trip_id: self.trip_id,
            operator_id: ctx.user_id.clone(),
            operator_name: ctx.user_name.clone(),
            category,
            amount: self.amount,
            date: self.date,
            description: self.description,
            unit_price: self.unit_price,
            diesel_liters: self.diesel_liters,
            odometer: self.odometer,
            performance,
            receipt_url: self.receipt_url,
        })
    }
}

/// Total spent per operator, keyed by the operator's first name as shown on
/// the admin chart.
pub fn totals_by_operator(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        let name = expense
            .operator_name
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();
        *totals.entry(name).or_insert(0.0) += expense.amount;
    }
    totals
}

/// Mean of the recorded performance of fuel expenses, if any.
pub fn average_performance(expenses: &[Expense]) -> Option<f64> {
    let values: Vec<f64> = expenses
        .iter()
        .filter(|e| e.category == ExpenseCategory::Fuel)
        .filter_map(|e| e.performance)
        .filter(|p| *p > 0.0)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(round2(values.iter().sum::<f64>() / values.len() as f64))
}
