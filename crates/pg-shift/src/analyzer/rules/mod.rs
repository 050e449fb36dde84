//! Built-in danger detection rules.

mod add_column;
mod add_constraint;
mod alter_column_type;
mod create_index;
mod drop_table;
mod lock_table;
mod rename;
mod set_not_null;
mod vacuum_full;

pub use add_column::AddColumnRule;
pub use add_constraint::AddConstraintRule;
pub use alter_column_type::AlterColumnTypeRule;
pub use create_index::CreateIndexRule;
pub use drop_table::DropTableRule;
pub use lock_table::LockTableRule;
pub use rename::RenameRule;
pub use set_not_null::SetNotNullRule;
pub use vacuum_full::VacuumFullRule;

use super::Registry;

/// A registry populated with all built-in detection rules, in the order
/// findings are reported.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Box::new(CreateIndexRule));
    registry.register(Box::new(AddColumnRule));
    registry.register(Box::new(AddConstraintRule));
    registry.register(Box::new(AlterColumnTypeRule));
    registry.register(Box::new(SetNotNullRule));
    registry.register(Box::new(DropTableRule));
    registry.register(Box::new(VacuumFullRule));
    registry.register(Box::new(LockTableRule));
    registry.register(Box::new(RenameRule));
    registry
}
