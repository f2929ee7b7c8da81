// Copyright 2024 WOPR Fleet (wopr.network).
//
// This file is part of the WOPR fleet platform.
// WOPR Fleet is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).
// WOPR Fleet is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! Typed monetary units.
//!
//! The ledger and every tenant-facing charge use [`Cents`], integer
//! cents. Wholesale provider costs are tracked as [`CostCents`], which
//! allows fractional cents, and only become integer cents at the
//! charge boundary via [`CostCents::charge`]. Dollars exist solely at
//! user-facing edges through the explicit conversion helpers; the two
//! wrappers make it a type error to mix the units anywhere else.

use std::{
	fmt,
	iter::Sum,
	ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

/// Signed amount of integer cents.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
	pub const ZERO: Cents = Cents(0);

	pub const fn new(cents: i64) -> Self {
		Self(cents)
	}

	pub const fn get(self) -> i64 {
		self.0
	}

	pub const fn is_zero(self) -> bool {
		self.0 == 0
	}

	pub const fn is_positive(self) -> bool {
		self.0 > 0
	}

	pub const fn is_negative(self) -> bool {
		self.0 < 0
	}

	pub fn checked_add(self, other: Cents) -> Option<Cents> {
		self.0.checked_add(other.0).map(Cents)
	}

	pub fn checked_sub(self, other: Cents) -> Option<Cents> {
		self.0.checked_sub(other.0).map(Cents)
	}

	pub fn saturating_sub(self, other: Cents) -> Cents {
		Cents(self.0.saturating_sub(other.0))
	}

	/// User-facing conversion. Never feed the result back into the
	/// ledger; parse dollars with [`Cents::from_dollars`] instead.
	pub fn to_dollars(self) -> f64 {
		self.0 as f64 / 100.0
	}

	pub fn from_dollars(dollars: f64) -> Cents {
		Cents((dollars * 100.0).round() as i64)
	}
}

impl fmt::Display for Cents {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}¢", self.0)
	}
}

impl Add for Cents {
	type Output = Cents;

	fn add(self, rhs: Cents) -> Cents {
		Cents(self.0 + rhs.0)
	}
}

impl Sub for Cents {
	type Output = Cents;

	fn sub(self, rhs: Cents) -> Cents {
		Cents(self.0 - rhs.0)
	}
}

impl Neg for Cents {
	type Output = Cents;

	fn neg(self) -> Cents {
		Cents(-self.0)
	}
}

impl AddAssign for Cents {
	fn add_assign(&mut self, rhs: Cents) {
		self.0 += rhs.0;
	}
}

impl SubAssign for Cents {
	fn sub_assign(&mut self, rhs: Cents) {
		self.0 -= rhs.0;
	}
}

impl Sum for Cents {
	fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
		Cents(iter.map(|c| c.0).sum())
	}
}

/// Wholesale cost in fractional cents, as reported or estimated for an
/// upstream call. Storage keeps the fraction; tenants are only ever
/// billed the rounded [`Cents`] produced by [`CostCents::charge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostCents(f64);

impl CostCents {
	pub const ZERO: CostCents = CostCents(0.0);

	pub const fn new(cents: f64) -> Self {
		Self(cents)
	}

	pub const fn get(self) -> f64 {
		self.0
	}

	pub fn is_zero(self) -> bool {
		self.0 == 0.0
	}

	/// Tenant charge for this cost: `round(cost * margin)`, with a
	/// floor of one cent for any non-zero cost so that sub-cent calls
	/// are never free.
	pub fn charge(self, margin: f64) -> Cents {
		if self.0 <= 0.0 {
			return Cents::ZERO;
		}
		let charged = (self.0 * margin).round() as i64;
		Cents::new(charged.max(1))
	}
}

impl fmt::Display for CostCents {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:.4}¢", self.0)
	}
}

impl Add for CostCents {
	type Output = CostCents;

	fn add(self, rhs: CostCents) -> CostCents {
		CostCents(self.0 + rhs.0)
	}
}

impl AddAssign for CostCents {
	fn add_assign(&mut self, rhs: CostCents) {
		self.0 += rhs.0;
	}
}

impl Sum for CostCents {
	fn sum<I: Iterator<Item = CostCents>>(iter: I) -> CostCents {
		CostCents(iter.map(|c| c.0).sum())
	}
}

impl From<Cents> for CostCents {
	fn from(cents: Cents) -> Self {
		CostCents(cents.get() as f64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn charge_rounds_to_nearest_cent() {
		assert_eq!(CostCents::new(10.0).charge(1.3), Cents::new(13));
		assert_eq!(CostCents::new(0.5).charge(1.3), Cents::new(1));
		assert_eq!(CostCents::new(3.4).charge(1.0), Cents::new(3));
	}

	#[test]
	fn charge_floors_nonzero_cost_at_one_cent() {
		assert_eq!(CostCents::new(0.01).charge(1.3), Cents::new(1));
		assert_eq!(CostCents::ZERO.charge(1.3), Cents::ZERO);
	}

	#[test]
	fn dollars_round_trip_at_the_edge() {
		assert_eq!(Cents::new(2500).to_dollars(), 25.0);
		assert_eq!(Cents::from_dollars(25.0), Cents::new(2500));
		assert_eq!(Cents::from_dollars(0.015), Cents::new(2));
	}

	#[test]
	fn cents_arithmetic_is_signed() {
		let balance = Cents::new(100);
		assert_eq!(balance - Cents::new(150), Cents::new(-50));
		assert_eq!(-Cents::new(30), Cents::new(-30));
		assert_eq!(
			vec![Cents::new(10), Cents::new(-4)].into_iter().sum::<Cents>(),
			Cents::new(6)
		);
	}

	#[test]
	fn serde_is_transparent() {
		assert_eq!(serde_json::to_string(&Cents::new(42)).unwrap(), "42");
		assert_eq!(serde_json::from_str::<Cents>("-7").unwrap(), Cents::new(-7));
	}
}
