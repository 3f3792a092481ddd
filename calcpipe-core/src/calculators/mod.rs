//! Built-in calculators.

pub mod aaa;
pub mod grading;
pub mod passthrough;

pub use aaa::AaaCalculator;
pub use passthrough::PassthroughCalculator;

use crate::components::{Calculator, FactoryError, RegistryBuilder};

/// Register `aaa` and `passthrough`.
pub fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), FactoryError> {
    builder
        .register_calculator("aaa", |args| {
            Ok(Box::new(AaaCalculator::from_args(args)?) as Box<dyn Calculator>)
        })?
        .register_calculator("passthrough", |args| {
            Ok(Box::new(PassthroughCalculator::from_args(args)?) as Box<dyn Calculator>)
        })?;
    Ok(())
}
